use rusqlite::params;
use serde::Serialize;

use crate::db::DbPool;

pub const COMPONENT_TYPES: &[&str] = &["header", "footer", "body", "signature"];

#[derive(Debug, Serialize, Clone)]
pub struct EmailComponent {
    pub id: i64,
    pub component_type: String,
    pub component_name: String,
    pub html_content: String,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct EmailComponentForm {
    pub id: Option<i64>,
    pub component_type: String,
    pub component_name: String,
    pub html_content: String,
    pub is_default: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct TemplateVariable {
    pub variable_name: String,
    pub description: String,
    pub sample_value: String,
}

impl EmailComponent {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(EmailComponent {
            id: row.get(0)?,
            component_type: row.get(1)?,
            component_name: row.get(2)?,
            html_content: row.get(3)?,
            is_default: row.get::<_, i64>(4)? != 0,
            is_active: row.get::<_, i64>(5)? != 0,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    const SELECT_COLS: &'static str =
        "id, component_type, component_name, html_content, is_default, is_active, created_at, updated_at";

    pub fn get_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("SELECT {} FROM email_components WHERE id = ?1", Self::SELECT_COLS),
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(&format!(
            "SELECT {} FROM email_components
             ORDER BY component_type, is_default DESC, created_at DESC, id DESC",
            Self::SELECT_COLS
        )) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    /// The active default of a type, falling back to the newest active one.
    pub fn get_for_type(pool: &DbPool, component_type: &str) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM email_components
                 WHERE component_type = ?1 AND is_active = 1
                 ORDER BY is_default DESC, created_at DESC, id DESC LIMIT 1",
                Self::SELECT_COLS
            ),
            params![component_type],
            Self::from_row,
        )
        .ok()
    }

    /// Insert or update. Marking a component default clears the flag on its siblings.
    pub fn save(pool: &DbPool, form: &EmailComponentForm) -> Result<i64, String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;

        if form.is_default {
            tx.execute(
                "UPDATE email_components SET is_default = 0 WHERE component_type = ?1 AND id != ?2",
                params![form.component_type, form.id.unwrap_or(0)],
            )
            .map_err(|e| e.to_string())?;
        }

        let id = match form.id {
            Some(id) => {
                let n = tx
                    .execute(
                        "UPDATE email_components SET component_type = ?1, component_name = ?2,
                             html_content = ?3, is_default = ?4, updated_at = CURRENT_TIMESTAMP
                         WHERE id = ?5",
                        params![
                            form.component_type,
                            form.component_name,
                            form.html_content,
                            form.is_default as i64,
                            id
                        ],
                    )
                    .map_err(|e| e.to_string())?;
                if n == 0 {
                    return Err("Component not found".to_string());
                }
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO email_components (component_type, component_name, html_content, is_default, is_active)
                     VALUES (?1, ?2, ?3, ?4, 1)",
                    params![
                        form.component_type,
                        form.component_name,
                        form.html_content,
                        form.is_default as i64
                    ],
                )
                .map_err(|e| e.to_string())?;
                tx.last_insert_rowid()
            }
        };

        tx.commit().map_err(|e| e.to_string())?;
        Ok(id)
    }

    pub fn delete(pool: &DbPool, id: i64) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute("DELETE FROM email_components WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }

    pub fn toggle_active(pool: &DbPool, id: i64) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute(
                "UPDATE email_components SET is_active = NOT is_active, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?1",
                params![id],
            )
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }
}

impl TemplateVariable {
    pub fn list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT variable_name, description, sample_value FROM email_template_variables
             ORDER BY variable_name",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], |row| {
            Ok(TemplateVariable {
                variable_name: row.get(0)?,
                description: row.get(1)?,
                sample_value: row.get(2)?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }
}
