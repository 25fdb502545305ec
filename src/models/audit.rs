use chrono::NaiveDateTime;
use rusqlite::params;
use serde::Serialize;

use crate::db::DbPool;

#[derive(Debug, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub entity_title: Option<String>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub created_at: NaiveDateTime,
}

/// One state change performed by an administrator.
#[derive(Debug, Clone, Default)]
pub struct AuditEvent {
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub action: String,
    pub entity_type: Option<String>,
    pub entity_id: Option<i64>,
    pub entity_title: Option<String>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
}

impl AuditEvent {
    pub fn new(action: &str, entity_type: &str) -> Self {
        AuditEvent {
            action: action.to_string(),
            entity_type: Some(entity_type.to_string()),
            ..Default::default()
        }
    }

    pub fn by(mut self, user_id: i64, user_name: &str, ip: &str) -> Self {
        self.user_id = Some(user_id);
        self.user_name = Some(user_name.to_string());
        self.ip_address = Some(ip.to_string());
        self
    }

    pub fn entity(mut self, id: Option<i64>, title: &str) -> Self {
        self.entity_id = id;
        self.entity_title = Some(title.to_string());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl AuditEntry {
    pub fn log(pool: &DbPool, event: &AuditEvent) {
        if let Ok(conn) = pool.get() {
            if let Err(e) = conn.execute(
                "INSERT INTO audit_log (user_id, user_name, action, entity_type, entity_id, entity_title, details, ip_address)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    event.user_id,
                    event.user_name,
                    event.action,
                    event.entity_type,
                    event.entity_id,
                    event.entity_title,
                    event.details,
                    event.ip_address
                ],
            ) {
                log::error!("audit log write failed for {}: {}", event.action, e);
            }
        }
    }

    pub fn list(pool: &DbPool, entity_filter: Option<&str>, limit: i64, offset: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };

        let mut sql = "SELECT * FROM audit_log".to_string();
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(e) = entity_filter {
            sql.push_str(" WHERE entity_type = ?1");
            params_vec.push(Box::new(e.to_string()));
        }
        let idx = params_vec.len() + 1;
        sql.push_str(&format!(" ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}", idx, idx + 1));
        params_vec.push(Box::new(limit));
        params_vec.push(Box::new(offset));

        let param_refs: Vec<&dyn rusqlite::types::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        conn.prepare(&sql)
            .and_then(|mut stmt| {
                stmt.query_map(param_refs.as_slice(), |row| {
                    Ok(AuditEntry {
                        id: row.get("id")?,
                        user_id: row.get("user_id")?,
                        user_name: row.get("user_name")?,
                        action: row.get("action")?,
                        entity_type: row.get("entity_type")?,
                        entity_id: row.get("entity_id")?,
                        entity_title: row.get("entity_title")?,
                        details: row.get("details")?,
                        ip_address: row.get("ip_address")?,
                        created_at: row.get("created_at")?,
                    })
                })
                .map(|rows| rows.filter_map(|r| r.ok()).collect())
            })
            .unwrap_or_default()
    }

    pub fn count(pool: &DbPool, entity_filter: Option<&str>) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        match entity_filter {
            Some(e) => conn.query_row(
                "SELECT COUNT(*) FROM audit_log WHERE entity_type = ?1",
                params![e],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0)),
        }
        .unwrap_or(0)
    }

    pub fn cleanup(pool: &DbPool, max_age_days: i64) -> Result<usize, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let deleted = conn
            .execute(
                "DELETE FROM audit_log WHERE created_at < datetime('now', ?1)",
                params![format!("-{} days", max_age_days)],
            )
            .map_err(|e| e.to_string())?;
        Ok(deleted)
    }
}
