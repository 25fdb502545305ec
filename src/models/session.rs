use rusqlite::params;

use crate::db::DbPool;

/// A live admin session. `csrf_token` is bound to the session for its whole lifetime.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub csrf_token: String,
    pub expires_at: String,
}

impl Session {
    pub fn create(
        pool: &DbPool,
        id: &str,
        user_id: i64,
        csrf_token: &str,
        expires_at: &str,
        ip_hash: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO sessions (id, user_id, csrf_token, ip_address, user_agent, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'), ?6)",
            params![id, user_id, csrf_token, ip_hash, user_agent, expires_at],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Unexpired session by id.
    pub fn get(pool: &DbPool, id: &str) -> Option<Session> {
        let conn = pool.get().ok()?;
        conn.query_row(
            "SELECT id, user_id, csrf_token, expires_at FROM sessions
             WHERE id = ?1 AND expires_at > datetime('now')",
            params![id],
            |row| {
                Ok(Session {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    csrf_token: row.get(2)?,
                    expires_at: row.get(3)?,
                })
            },
        )
        .ok()
    }

    /// Slide the expiry forward; `session_timeout` is an inactivity timeout.
    pub fn touch(pool: &DbPool, id: &str, expires_at: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "UPDATE sessions SET expires_at = ?1 WHERE id = ?2",
            params![expires_at, id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete(pool: &DbPool, id: &str) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn delete_for_user(pool: &DbPool, user_id: i64) -> Result<(), String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn cleanup_expired(pool: &DbPool) -> Result<usize, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute("DELETE FROM sessions WHERE expires_at <= datetime('now')", [])
            .map_err(|e| e.to_string())
    }
}
