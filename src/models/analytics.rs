use rusqlite::params;
use serde::Serialize;

use crate::db::DbPool;
use crate::export::Records;

#[derive(Debug, Serialize, Default, PartialEq)]
pub struct LoanOverview {
    pub total_loans: i64,
    pub total_amount: f64,
    pub total_customers: i64,
    pub default_rate: f64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MonthlyRevenue {
    pub month: String,
    pub total_amount: f64,
    pub loans: i64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExportCategory {
    Loans,
    Customers,
    All,
}

impl ExportCategory {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "loans" => Some(ExportCategory::Loans),
            "customers" => Some(ExportCategory::Customers),
            "" | "all" => Some(ExportCategory::All),
            _ => None,
        }
    }
}

/// Inclusive `YYYY-MM-DD` bounds on `created_at`.
#[derive(Debug, Clone, Default)]
pub struct DateRange {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub struct LoanAnalytics;

impl LoanAnalytics {
    pub fn overview(pool: &DbPool) -> LoanOverview {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return LoanOverview::default(),
        };

        let (total_loans, total_amount): (i64, f64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(loan_amount), 0.0) FROM loan_applications
                 WHERE application_status = 'approved'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap_or((0, 0.0));

        let total_customers: i64 = conn
            .query_row(
                "SELECT COUNT(DISTINCT email) FROM loan_applications",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        let defaulted: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM loan_applications WHERE application_status = 'defaulted'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        LoanOverview {
            total_loans,
            total_amount,
            total_customers,
            default_rate: default_rate(defaulted, total_loans),
        }
    }

    /// Approved loan volume per calendar month over the last `months` months, oldest first.
    pub fn revenue_trend(pool: &DbPool, months: i64) -> Vec<MonthlyRevenue> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT strftime('%Y-%m', created_at) AS month, COALESCE(SUM(loan_amount), 0.0), COUNT(*)
             FROM loan_applications
             WHERE application_status = 'approved' AND created_at >= datetime('now', ?1)
             GROUP BY month ORDER BY month",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![format!("-{} months", months)], |row| {
            Ok(MonthlyRevenue {
                month: row.get(0)?,
                total_amount: row.get(1)?,
                loans: row.get(2)?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    pub fn status_distribution(pool: &DbPool) -> Vec<StatusCount> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT application_status, COUNT(*) FROM loan_applications
             GROUP BY application_status ORDER BY COUNT(*) DESC, application_status",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map([], |row| {
            Ok(StatusCount {
                status: row.get(0)?,
                count: row.get(1)?,
            })
        })
        .map(|rows| rows.filter_map(|r| r.ok()).collect())
        .unwrap_or_default()
    }

    pub fn export(pool: &DbPool, category: ExportCategory, range: &DateRange) -> Result<Records, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;

        let mut where_sql = String::new();
        let mut bounds: Vec<String> = Vec::new();
        // The full dump ignores the date range.
        if let (Some(from), Some(to), false) = (&range.from, &range.to, category == ExportCategory::All) {
            where_sql.push_str(" WHERE created_at BETWEEN ?1 AND ?2");
            bounds.push(from.clone());
            bounds.push(format!("{} 23:59:59", to));
        }

        let sql = match category {
            ExportCategory::Loans => format!(
                "SELECT id, first_name, last_name, email, phone, loan_amount, application_status, created_at
                 FROM loan_applications{} ORDER BY created_at DESC, id DESC",
                where_sql
            ),
            ExportCategory::Customers => format!(
                "SELECT email, first_name, last_name, phone, MIN(created_at) AS created_at
                 FROM loan_applications{} GROUP BY email ORDER BY created_at DESC",
                where_sql
            ),
            ExportCategory::All => format!(
                "SELECT * FROM loan_applications{} ORDER BY created_at DESC, id DESC LIMIT 1000",
                where_sql
            ),
        };

        let params_refs: Vec<&dyn rusqlite::types::ToSql> =
            bounds.iter().map(|b| b as &dyn rusqlite::types::ToSql).collect();
        Records::query(&conn, &sql, params_refs.as_slice()).map_err(|e| e.to_string())
    }
}

/// Defaulted loans as a percentage of approved loans, two decimals.
pub fn default_rate(defaulted: i64, approved: i64) -> f64 {
    if approved == 0 {
        return 0.0;
    }
    let rate = defaulted as f64 / approved as f64 * 100.0;
    (rate * 100.0).round() / 100.0
}
