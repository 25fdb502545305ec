use rusqlite::params;
use serde::Serialize;

use crate::db::DbPool;

#[derive(Debug, Serialize, Clone)]
pub struct BackupLog {
    pub id: i64,
    pub backup_name: String,
    pub backup_type: String,
    pub files_count: i64,
    pub total_size: i64,
    pub compressed_size: i64,
    pub status: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewBackupLog {
    pub backup_name: String,
    pub backup_type: String,
    pub files_count: i64,
    pub total_size: i64,
    pub compressed_size: i64,
    pub status: String,
}

impl BackupLog {
    pub fn insert(pool: &DbPool, entry: &NewBackupLog) -> Result<i64, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO backup_logs (backup_name, backup_type, files_count, total_size, compressed_size, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.backup_name,
                entry.backup_type,
                entry.files_count,
                entry.total_size,
                entry.compressed_size,
                entry.status
            ],
        )
        .map_err(|e| e.to_string())?;
        Ok(conn.last_insert_rowid())
    }

    pub fn recent(pool: &DbPool, limit: i64) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT id, backup_name, backup_type, files_count, total_size, compressed_size, status, created_at
             FROM backup_logs ORDER BY created_at DESC, id DESC LIMIT ?1",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![limit], |row| {
            Ok(BackupLog {
                id: row.get(0)?,
                backup_name: row.get(1)?,
                backup_type: row.get(2)?,
                files_count: row.get(3)?,
                total_size: row.get(4)?,
                compressed_size: row.get(5)?,
                status: row.get(6)?,
                created_at: row.get(7)?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    /// True when a completed backup of `backup_type` was logged within `hours`.
    pub fn exists_since(pool: &DbPool, backup_type: &str, hours: i64) -> bool {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return false,
        };
        conn.query_row(
            "SELECT COUNT(*) FROM backup_logs
             WHERE backup_type = ?1 AND status = 'completed' AND created_at > datetime('now', ?2)",
            params![backup_type, format!("-{} hours", hours)],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n > 0)
        .unwrap_or(false)
    }
}
