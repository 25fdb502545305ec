use chrono::{NaiveDateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

pub const ROLES: &[&str] = &["admin", "manager", "agent", "user"];
pub const EDITABLE_STATUSES: &[&str] = &["active", "inactive"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password_hash: String,
    pub role: String,   // admin, manager, agent, user
    pub status: String, // active, inactive, locked, deleted
    pub failed_login_attempts: i64,
    pub last_failed_login: Option<String>,
    pub locked_until: Option<String>,
    pub last_login: Option<String>,
    pub password_changed: bool,
    pub password_reset_required: bool,
    pub two_factor_enabled: bool,
    pub two_factor_secret: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields an administrator may set on an account.
#[derive(Debug, Clone, Default)]
pub struct UserForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
    pub status: String,
}

/// Listing filters. Empty strings mean "no filter".
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub search: String,
    pub role: String,
    pub status: String,
}

#[derive(Debug, Serialize, Default, PartialEq)]
pub struct UserStats {
    pub total: i64,
    pub active: i64,
    pub locked: i64,
    pub new_today: i64,
}

impl User {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(User {
            id: row.get(0)?,
            first_name: row.get(1)?,
            last_name: row.get(2)?,
            email: row.get(3)?,
            phone: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            password_hash: row.get(5)?,
            role: row.get(6)?,
            status: row.get(7)?,
            failed_login_attempts: row.get(8)?,
            last_failed_login: row.get(9)?,
            locked_until: row.get(10)?,
            last_login: row.get(11)?,
            password_changed: row.get::<_, i64>(12)? != 0,
            password_reset_required: row.get::<_, i64>(13)? != 0,
            two_factor_enabled: row.get::<_, i64>(14)? != 0,
            two_factor_secret: row.get::<_, Option<String>>(15)?.unwrap_or_default(),
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }

    const SELECT_COLS: &'static str =
        "id, first_name, last_name, email, phone, password_hash, role, status, failed_login_attempts, \
         last_failed_login, locked_until, last_login, password_changed, password_reset_required, \
         two_factor_enabled, two_factor_secret, created_at, updated_at";

    // ── Lookups ──

    pub fn get_by_id(pool: &DbPool, id: i64) -> Option<User> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", Self::SELECT_COLS),
            params![id],
            Self::from_row,
        )
        .ok()
    }

    pub fn get_by_email(pool: &DbPool, email: &str) -> Option<User> {
        let conn = pool.get().ok()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM users WHERE email = ?1 COLLATE NOCASE",
                Self::SELECT_COLS
            ),
            params![email],
            Self::from_row,
        )
        .ok()
    }

    /// True when another account (optionally other than `exclude_id`) already uses `email`.
    pub fn email_taken(pool: &DbPool, email: &str, exclude_id: Option<i64>) -> bool {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return false,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1 COLLATE NOCASE AND id != ?2",
            params![email, exclude_id.unwrap_or(0)],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n > 0)
        .unwrap_or(false)
    }

    fn filter_clause(filter: &UserFilter) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
        let mut sql = " WHERE status != 'deleted'".to_string();
        let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if !filter.search.is_empty() {
            let like = format!("%{}%", filter.search);
            let idx = params_vec.len() + 1;
            sql.push_str(&format!(
                " AND (first_name LIKE ?{0} OR last_name LIKE ?{0} OR email LIKE ?{0})",
                idx
            ));
            params_vec.push(Box::new(like));
        }
        if !filter.role.is_empty() {
            sql.push_str(&format!(" AND role = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(filter.role.clone()));
        }
        if !filter.status.is_empty() {
            sql.push_str(&format!(" AND status = ?{}", params_vec.len() + 1));
            params_vec.push(Box::new(filter.status.clone()));
        }
        (sql, params_vec)
    }

    pub fn list_filtered(pool: &DbPool, filter: &UserFilter, limit: i64, offset: i64) -> Vec<User> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let (where_sql, mut params_vec) = Self::filter_clause(filter);
        let idx = params_vec.len() + 1;
        let sql = format!(
            "SELECT {} FROM users{} ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            Self::SELECT_COLS,
            where_sql,
            idx,
            idx + 1
        );
        params_vec.push(Box::new(limit));
        params_vec.push(Box::new(offset));

        let mut stmt = match conn.prepare(&sql) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        stmt.query_map(params_refs.as_slice(), Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    pub fn count_filtered(pool: &DbPool, filter: &UserFilter) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        let (where_sql, params_vec) = Self::filter_clause(filter);
        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();
        conn.query_row(
            &format!("SELECT COUNT(*) FROM users{}", where_sql),
            params_refs.as_slice(),
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    pub fn stats(pool: &DbPool) -> UserStats {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return UserStats::default(),
        };
        conn.query_row(
            "SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN status = 'active' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN status = 'locked' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN date(created_at) = date('now') THEN 1 ELSE 0 END), 0)
             FROM users WHERE status != 'deleted'",
            [],
            |row| {
                Ok(UserStats {
                    total: row.get(0)?,
                    active: row.get(1)?,
                    locked: row.get(2)?,
                    new_today: row.get(3)?,
                })
            },
        )
        .unwrap_or_default()
    }

    pub fn count_active_admins(pool: &DbPool) -> i64 {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return 0,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM users WHERE role = 'admin' AND status = 'active'",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0)
    }

    // ── Create / update ──

    pub fn create(pool: &DbPool, form: &UserForm, password_hash: &str) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO users (first_name, last_name, email, phone, password_hash, role, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                form.first_name,
                form.last_name,
                form.email,
                form.phone,
                password_hash,
                form.role,
                form.status
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn update(pool: &DbPool, id: i64, form: &UserForm) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET first_name = ?1, last_name = ?2, email = ?3, phone = ?4, role = ?5,
                 status = ?6, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?7 AND status != 'deleted'",
            params![
                form.first_name,
                form.last_name,
                form.email,
                form.phone,
                form.role,
                form.status,
                id
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Store a new hash. An administrator-issued password (`reset_required`)
    /// forces a change at the next login; a self-chosen one clears that flag.
    pub fn set_password(pool: &DbPool, id: i64, password_hash: &str, reset_required: bool) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let (reset, changed) = if reset_required { (1, 0) } else { (0, 1) };
        conn.execute(
            "UPDATE users SET password_hash = ?1, password_reset_required = ?2, password_changed = ?3,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?4",
            params![password_hash, reset, changed, id],
        )
        .map_err(|e| e.to_string())?;
        if reset_required {
            conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    pub fn set_status(pool: &DbPool, id: i64, status: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2 AND status != 'deleted'",
            params![status, id],
        )
        .map_err(|e| e.to_string())?;
        if status != "active" {
            conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])
                .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    /// Soft delete: the row stays for audit history but disappears from listings.
    pub fn soft_delete(pool: &DbPool, id: i64) -> Result<(), String> {
        Self::set_status(pool, id, "deleted")
    }

    pub fn unlock(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET status = 'active', failed_login_attempts = 0, locked_until = NULL,
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1 AND status != 'deleted'",
            params![id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Login accounting ──

    /// Count a failed password check. Returns the new attempt count; the account
    /// is locked for `lockout_minutes` once the count reaches `max_attempts`.
    pub fn record_failed_login(
        pool: &DbPool,
        id: i64,
        max_attempts: i64,
        lockout_minutes: i64,
    ) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET failed_login_attempts = failed_login_attempts + 1,
                 last_failed_login = CURRENT_TIMESTAMP
             WHERE id = ?1",
            params![id],
        )
        .map_err(|e| e.to_string())?;
        let attempts: i64 = conn
            .query_row(
                "SELECT failed_login_attempts FROM users WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .map_err(|e| e.to_string())?;
        if attempts >= max_attempts {
            conn.execute(
                "UPDATE users SET status = 'locked', locked_until = datetime('now', ?1)
                 WHERE id = ?2 AND status = 'active'",
                params![format!("+{} minutes", lockout_minutes), id],
            )
            .map_err(|e| e.to_string())?;
        }
        Ok(attempts)
    }

    pub fn record_successful_login(pool: &DbPool, id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET failed_login_attempts = 0, last_failed_login = NULL, locked_until = NULL,
                 last_login = CURRENT_TIMESTAMP
             WHERE id = ?1",
            params![id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Release a lock whose `locked_until` has passed. Returns true when released.
    pub fn release_expired_lock(pool: &DbPool, id: i64) -> Result<bool, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        let n = conn
            .execute(
                "UPDATE users SET status = 'active', failed_login_attempts = 0, locked_until = NULL
                 WHERE id = ?1 AND status = 'locked' AND locked_until IS NOT NULL
                   AND locked_until <= datetime('now')",
                params![id],
            )
            .map_err(|e| e.to_string())?;
        Ok(n > 0)
    }

    // ── 2FA ──

    pub fn update_two_factor(pool: &DbPool, id: i64, enabled: bool, secret: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE users SET two_factor_enabled = ?1, two_factor_secret = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?3",
            params![enabled as i64, secret, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Helpers ──

    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }

    pub fn is_active(&self) -> bool {
        self.status == "active"
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    pub fn must_change_password(&self) -> bool {
        !self.password_changed || self.password_reset_required
    }

    /// Locked status, or too many recent failures within the lockout window.
    pub fn is_locked_out(&self, max_attempts: i64, lockout_minutes: i64, now: NaiveDateTime) -> bool {
        if self.status == "locked" {
            return true;
        }
        if self.failed_login_attempts < max_attempts {
            return false;
        }
        self.last_failed_login
            .as_deref()
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
            .map(|t| now.signed_duration_since(t).num_minutes() < lockout_minutes)
            .unwrap_or(false)
    }

    /// "high" / "medium" / "low" from recent login, failed attempts and status.
    pub fn security_level(&self, now: NaiveDateTime) -> &'static str {
        let mut score = 0;
        let recent_login = self
            .last_login
            .as_deref()
            .and_then(|s| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok())
            .map(|t| now.signed_duration_since(t).num_days() <= 30)
            .unwrap_or(false);
        if recent_login {
            score += 1;
        }
        if self.failed_login_attempts < 3 {
            score += 1;
        }
        if self.is_active() {
            score += 1;
        }
        match score {
            3 => "high",
            2 => "medium",
            _ => "low",
        }
    }

    /// Return a safe version without secrets for templates, JSON and exports
    pub fn safe_json(&self) -> serde_json::Value {
        serde_json::json!({
            "id": self.id,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "email": self.email,
            "phone": self.phone,
            "role": self.role,
            "status": self.status,
            "failed_login_attempts": self.failed_login_attempts,
            "last_login": self.last_login,
            "two_factor_enabled": self.two_factor_enabled,
            "security_level": self.security_level(Utc::now().naive_utc()),
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}
