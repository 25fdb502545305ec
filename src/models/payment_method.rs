use rusqlite::params;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::db::DbPool;

/// Kind of value a config field carries, with its default.
#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    Text(&'static str),
    Flag,
    Number(i64),
}

pub struct ConfigField {
    pub name: &'static str,
    pub kind: FieldKind,
    pub secret: bool,
}

const fn text(name: &'static str) -> ConfigField {
    ConfigField { name, kind: FieldKind::Text(""), secret: false }
}

const fn text_or(name: &'static str, default: &'static str) -> ConfigField {
    ConfigField { name, kind: FieldKind::Text(default), secret: false }
}

const fn secret(name: &'static str) -> ConfigField {
    ConfigField { name, kind: FieldKind::Text(""), secret: true }
}

const fn flag(name: &'static str) -> ConfigField {
    ConfigField { name, kind: FieldKind::Flag, secret: false }
}

const fn number(name: &'static str, default: i64) -> ConfigField {
    ConfigField { name, kind: FieldKind::Number(default), secret: false }
}

const WIRE_TRANSFER: &[ConfigField] = &[
    text("bank_name"),
    text("account_name"),
    text("account_number"),
    text("routing_number"),
    text("swift_code"),
    text("bank_address"),
    flag("auto_email_instructions"),
    flag("require_confirmation"),
    flag("require_image_upload"),
    number("max_file_size", 10),
    text_or("allowed_file_types", "jpg,jpeg,png,pdf"),
    number("confirmation_timeout", 72),
];

const CRYPTO: &[ConfigField] = &[
    text("wallet_address"),
    text_or("currency_type", "BTC"),
    text("network"),
    text("qr_code_url"),
    flag("auto_complete_enabled"),
    flag("auto_email_instructions"),
    flag("show_qr_code"),
    number("required_confirmations", 3),
    number("payment_timeout", 30),
    flag("manual_verification"),
];

const E_TRANSFER: &[ConfigField] = &[
    text("email_address"),
    text("security_question"),
    secret("security_answer"),
    text("recipient_name"),
    flag("auto_email_instructions"),
    flag("require_confirmation"),
    flag("allow_manual_details"),
    flag("require_image_upload"),
    number("max_file_size", 10),
    text_or("allowed_file_types", "jpg,jpeg,png,pdf"),
    number("confirmation_timeout", 24),
    flag("auto_accept_known"),
];

const CREDIT_CARD: &[ConfigField] = &[
    text("stripe_publishable_key"),
    secret("stripe_secret_key"),
    text("paypal_client_id"),
    secret("paypal_secret"),
    flag("auto_email_instructions"),
    flag("require_3d_secure"),
    flag("save_card_option"),
    number("payment_timeout", 15),
];

/// Config schema for a payment method key, or None for unknown methods.
pub fn config_fields(method: &str) -> Option<&'static [ConfigField]> {
    match method {
        "wire_transfer" => Some(WIRE_TRANSFER),
        "crypto" => Some(CRYPTO),
        "e_transfer" => Some(E_TRANSFER),
        "credit_card" => Some(CREDIT_CARD),
        _ => None,
    }
}

/// Default `config_data` for a method.
pub fn default_config(method: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for field in config_fields(method).unwrap_or(&[]) {
        let value = match field.kind {
            FieldKind::Text(d) => Value::String(d.to_string()),
            FieldKind::Flag => Value::Bool(false),
            FieldKind::Number(n) => Value::from(n),
        };
        map.insert(field.name.to_string(), value);
    }
    map
}

#[derive(Debug, Serialize, Clone)]
pub struct PaymentMethodConfig {
    pub method_name: String,
    pub is_enabled: bool,
    pub allowed_countries: Vec<String>,
    pub config_data: Map<String, Value>,
    pub instructions: String,
    pub email_template: String,
    pub updated_at: Option<String>,
}

impl PaymentMethodConfig {
    /// Stored row for `method`, or the defaults when nothing has been saved yet.
    /// Stored config is overlaid on the defaults so new fields always appear.
    pub fn get(pool: &DbPool, method: &str) -> PaymentMethodConfig {
        let defaults = PaymentMethodConfig {
            method_name: method.to_string(),
            is_enabled: false,
            allowed_countries: vec![],
            config_data: default_config(method),
            instructions: String::new(),
            email_template: String::new(),
            updated_at: None,
        };
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return defaults,
        };
        let row = conn.query_row(
            "SELECT is_enabled, allowed_countries, config_data, instructions, email_template, updated_at
             FROM payment_method_config WHERE method_name = ?1",
            params![method],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            },
        );
        match row {
            Ok((enabled, countries, config, instructions, email_template, updated_at)) => {
                let mut config_data = defaults.config_data;
                if let Ok(Value::Object(stored)) = serde_json::from_str::<Value>(&config) {
                    config_data.extend(stored);
                }
                PaymentMethodConfig {
                    method_name: method.to_string(),
                    is_enabled: enabled != 0,
                    allowed_countries: serde_json::from_str(&countries).unwrap_or_default(),
                    config_data,
                    instructions,
                    email_template,
                    updated_at,
                }
            }
            Err(_) => defaults,
        }
    }

    pub fn upsert(pool: &DbPool, config: &PaymentMethodConfig) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let countries = serde_json::to_string(&config.allowed_countries).map_err(|e| e.to_string())?;
        let data = serde_json::to_string(&config.config_data).map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO payment_method_config
                 (method_name, is_enabled, allowed_countries, config_data, instructions, email_template, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, CURRENT_TIMESTAMP)
             ON CONFLICT(method_name) DO UPDATE SET
                 is_enabled = ?2, allowed_countries = ?3, config_data = ?4,
                 instructions = ?5, email_template = ?6, updated_at = CURRENT_TIMESTAMP",
            params![
                config.method_name,
                config.is_enabled as i64,
                countries,
                data,
                config.instructions,
                config.email_template
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// `config_data` without secret fields, for audit details.
    pub fn redacted_config(&self) -> Map<String, Value> {
        let secrets: Vec<&str> = config_fields(&self.method_name)
            .unwrap_or(&[])
            .iter()
            .filter(|f| f.secret)
            .map(|f| f.name)
            .collect();
        self.config_data
            .iter()
            .filter(|(k, _)| !secrets.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

// ── Payment schemes ──

#[derive(Debug, Serialize, Clone)]
pub struct PaymentScheme {
    pub user_id: i64,
    pub scheme_type: String,
    pub assigned_by: i64,
    pub requires_2fa: bool,
    pub created_at: String,
}

impl PaymentScheme {
    pub fn get_for_user(pool: &DbPool, user_id: i64) -> Option<Self> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT user_id, scheme_type, assigned_by, requires_2fa, created_at
             FROM user_payment_schemes WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(PaymentScheme {
                    user_id: row.get(0)?,
                    scheme_type: row.get(1)?,
                    assigned_by: row.get(2)?,
                    requires_2fa: row.get::<_, i64>(3)? != 0,
                    created_at: row.get(4)?,
                })
            },
        )
        .ok()
    }

    /// Replace whatever scheme the user had with a subscription scheme.
    pub fn assign_subscription(pool: &DbPool, user_id: i64, assigned_by: i64) -> Result<(), String> {
        let mut conn = pool.get().map_err(|e| e.to_string())?;
        let tx = conn.transaction().map_err(|e| e.to_string())?;
        tx.execute(
            "DELETE FROM user_payment_schemes WHERE user_id = ?1",
            params![user_id],
        )
        .map_err(|e| e.to_string())?;
        tx.execute(
            "INSERT INTO user_payment_schemes (user_id, scheme_type, assigned_by, requires_2fa)
             VALUES (?1, 'subscription', ?2, 1)",
            params![user_id, assigned_by],
        )
        .map_err(|e| e.to_string())?;
        tx.commit().map_err(|e| e.to_string())
    }
}

// ── Statistics ──

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PaymentGroup {
    pub key: String,
    pub count: i64,
    pub total_amount: f64,
}

#[derive(Debug, Serialize, Default)]
pub struct PaymentStats {
    pub by_status: Vec<PaymentGroup>,
    pub by_method: Vec<PaymentGroup>,
    pub by_type: Vec<PaymentGroup>,
}

fn group_payments(pool: &DbPool, column: &str) -> Vec<PaymentGroup> {
    let conn = match pool.get() {
        Ok(c) => c,
        Err(_) => return vec![],
    };
    let sql = format!(
        "SELECT {0}, COUNT(*), COALESCE(SUM(amount), 0) FROM payments GROUP BY {0} ORDER BY {0}",
        column
    );
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(_) => return vec![],
    };
    stmt.query_map([], |row| {
        Ok(PaymentGroup {
            key: row.get(0)?,
            count: row.get(1)?,
            total_amount: row.get(2)?,
        })
    })
    .map(|rows| rows.filter_map(|r| r.ok()).collect())
    .unwrap_or_default()
}

pub fn payment_stats(pool: &DbPool) -> PaymentStats {
    PaymentStats {
        by_status: group_payments(pool, "status"),
        by_method: group_payments(pool, "payment_method"),
        by_type: group_payments(pool, "payment_type"),
    }
}
