use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const COUNTRIES: &[(&str, &str)] = &[
    ("US", "United States"),
    ("CA", "Canada"),
    ("AU", "Australia"),
    ("GB", "United Kingdom"),
    ("DE", "Germany"),
    ("FR", "France"),
    ("IT", "Italy"),
    ("ES", "Spain"),
    ("NL", "Netherlands"),
    ("BE", "Belgium"),
    ("CH", "Switzerland"),
    ("AT", "Austria"),
    ("SE", "Sweden"),
    ("NO", "Norway"),
    ("DK", "Denmark"),
    ("FI", "Finland"),
];

pub const PAYMENT_METHODS: &[(&str, &str)] = &[
    ("wire_transfer", "Wire Transfer"),
    ("crypto", "Cryptocurrency"),
    ("e_transfer", "e-Transfer"),
    ("credit_card", "Credit Card"),
];

pub fn country_name(code: &str) -> Option<&'static str> {
    COUNTRIES.iter().find(|(c, _)| *c == code).map(|(_, n)| *n)
}

pub fn method_name(key: &str) -> Option<&'static str> {
    PAYMENT_METHODS.iter().find(|(k, _)| *k == key).map(|(_, n)| *n)
}

/// Which proof-of-payment fields the customer must fill in.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RequiredFields {
    #[serde(default)]
    pub amount_sent: bool,
    #[serde(default)]
    pub date_sent: bool,
    #[serde(default)]
    pub transaction_reference: bool,
}

#[derive(Debug, Serialize, Clone)]
pub struct FeeTemplate {
    pub id: i64,
    pub country: String,
    pub payment_method: String,
    pub template_name: String,
    pub instructions: String,
    pub email_template: String,
    pub required_fields: RequiredFields,
    pub is_active: bool,
    pub created_by: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct FeeTemplateForm {
    pub country: String,
    pub payment_method: String,
    pub template_name: String,
    pub instructions: String,
    pub email_template: String,
    pub required_fields: RequiredFields,
    pub is_active: bool,
}

pub const DUPLICATE_TEMPLATE: &str = "A template for this country and payment method already exists.";

impl FeeTemplate {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        let fields: String = row.get(6)?;
        Ok(FeeTemplate {
            id: row.get(0)?,
            country: row.get(1)?,
            payment_method: row.get(2)?,
            template_name: row.get(3)?,
            instructions: row.get(4)?,
            email_template: row.get(5)?,
            required_fields: serde_json::from_str(&fields).unwrap_or_default(),
            is_active: row.get::<_, i64>(7)? != 0,
            created_by: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    const SELECT_COLS: &'static str =
        "id, country, payment_method, template_name, instructions, email_template, required_fields, \
         is_active, created_by, created_at, updated_at";

    pub fn get_by_id(pool: &DbPool, id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("SELECT {} FROM fee_form_templates WHERE id = ?1", Self::SELECT_COLS),
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
            "SELECT {} FROM fee_form_templates ORDER BY country, payment_method",
            Self::SELECT_COLS
        )) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn create(pool: &DbPool, form: &FeeTemplateForm, created_by: i64) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let fields = serde_json::to_string(&form.required_fields).map_err(|e| e.to_string())?;
        let result = conn.execute(
            "INSERT INTO fee_form_templates
                 (country, payment_method, template_name, instructions, email_template, required_fields, is_active, created_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                form.country,
                form.payment_method,
                form.template_name,
                form.instructions,
                form.email_template,
                fields,
                form.is_active as i64,
                created_by
            ],
        );
        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(DUPLICATE_TEMPLATE.to_string())
            }
            Err(e) => Err(e.to_string()),
        }
    }

    /// Country and payment method are fixed once created.
    pub fn update(pool: &DbPool, id: i64, form: &FeeTemplateForm) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let fields = serde_json::to_string(&form.required_fields).map_err(|e| e.to_string())?;
        let n = conn
            .execute(
                "UPDATE fee_form_templates SET template_name = ?1, instructions = ?2, email_template = ?3,
                     required_fields = ?4, is_active = ?5, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?6",
                params![
                    form.template_name,
                    form.instructions,
                    form.email_template,
                    fields,
                    form.is_active as i64,
                    id
                ],
            )
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }

    pub fn toggle_active(pool: &DbPool, id: i64) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute(
                "UPDATE fee_form_templates SET is_active = NOT is_active, updated_at = CURRENT_TIMESTAMP
                 WHERE id = ?1",
                params![id],
            )
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }

    /// Number of sent fee forms that were built from this template's country and method.
    pub fn usage_count(pool: &DbPool, country: &str, payment_method: &str) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM fee_sent_forms WHERE country = ?1 AND payment_method = ?2",
            params![country, payment_method],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    /// Refuses while sent fee forms still reference the template.
    pub fn delete(pool: &DbPool, id: i64) -> Result<(), String> {
        let template = Self::get_by_id(pool, id).ok_or_else(|| "Template not found".to_string())?;
        let used = Self::usage_count(pool, &template.country, &template.payment_method);
        if used > 0 {
            return Err(format!(
                "Cannot delete template: it is being used by {} fee forms.",
                used
            ));
        }
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM fee_form_templates WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

/// Sample values used by the template preview.
pub const PREVIEW_SAMPLE: &[(&str, &str)] = &[
    ("user_name", "John Doe"),
    ("application_id", "LA-2024-001"),
    ("amount", "$2,500.00"),
    ("bank_name", "Sample Bank"),
    ("account_number", "1234567890"),
    ("routing_number", "021000021"),
    ("wallet_address", "1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"),
    ("network", "Bitcoin"),
];
