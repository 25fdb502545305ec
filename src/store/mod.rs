use chrono::{NaiveDateTime, Utc};
use std::collections::HashMap;

use crate::export::Records;
use crate::models::analytics::{DateRange, ExportCategory, LoanOverview, MonthlyRevenue, StatusCount};
use crate::models::audit::{AuditEntry, AuditEvent};
use crate::models::backup_log::{BackupLog, NewBackupLog};
use crate::models::email_component::{EmailComponent, EmailComponentForm, TemplateVariable};
use crate::models::fee_template::{FeeTemplate, FeeTemplateForm};
use crate::models::payment_method::{PaymentMethodConfig, PaymentScheme, PaymentStats};
use crate::models::seo::SeoActivity;
use crate::models::session::Session;
use crate::models::settings::{is_truthy, wall_clock};
use crate::models::user::{User, UserFilter, UserForm, UserStats};

pub mod sqlite;

/// Unified data-access trait. Every database operation from a handler goes through here.
pub trait Store: Send + Sync {
    // ── Lifecycle ───────────────────────────────────────────────────
    /// `SELECT 1` plus engine version and database size in bytes.
    fn ping(&self) -> Result<(String, u64), String>;
    /// Consistent copy of the live database at `dest`.
    fn snapshot_to(&self, dest: &str) -> Result<(), String>;

    // ── Settings ────────────────────────────────────────────────────
    fn setting_get(&self, key: &str) -> Option<String>;
    fn setting_get_or(&self, key: &str, default: &str) -> String {
        self.setting_get(key).unwrap_or_else(|| default.to_string())
    }
    fn setting_get_bool(&self, key: &str) -> bool {
        self.setting_get(key).map(|v| is_truthy(&v)).unwrap_or(false)
    }
    fn setting_get_i64(&self, key: &str) -> i64 {
        self.setting_get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }
    /// Current time in the site's configured timezone.
    fn site_now(&self) -> NaiveDateTime {
        wall_clock(&self.setting_get_or("timezone", "America/New_York"), Utc::now())
    }
    fn setting_set(&self, key: &str, value: &str, updated_by: Option<i64>) -> Result<(), String>;
    fn setting_set_many(
        &self,
        settings: &HashMap<String, String>,
        updated_by: Option<i64>,
    ) -> Result<(), String>;
    fn setting_get_group(&self, prefix: &str) -> HashMap<String, String>;
    fn setting_all(&self) -> HashMap<String, String>;

    // ── Users ───────────────────────────────────────────────────────
    fn user_get_by_id(&self, id: i64) -> Option<User>;
    fn user_get_by_email(&self, email: &str) -> Option<User>;
    fn user_email_taken(&self, email: &str, exclude_id: Option<i64>) -> bool;
    fn user_list_filtered(&self, filter: &UserFilter, limit: i64, offset: i64) -> Vec<User>;
    fn user_count_filtered(&self, filter: &UserFilter) -> i64;
    fn user_stats(&self) -> UserStats;
    fn user_count_active_admins(&self) -> i64;
    fn user_create(&self, form: &UserForm, password_hash: &str) -> Result<i64, String>;
    fn user_update(&self, id: i64, form: &UserForm) -> Result<(), String>;
    fn user_set_password(&self, id: i64, password_hash: &str, reset_required: bool) -> Result<(), String>;
    fn user_set_status(&self, id: i64, status: &str) -> Result<(), String>;
    fn user_soft_delete(&self, id: i64) -> Result<(), String>;
    fn user_unlock(&self, id: i64) -> Result<(), String>;
    fn user_record_failed_login(&self, id: i64, max_attempts: i64, lockout_minutes: i64) -> Result<i64, String>;
    fn user_record_successful_login(&self, id: i64) -> Result<(), String>;
    fn user_release_expired_lock(&self, id: i64) -> Result<bool, String>;
    fn user_update_two_factor(&self, id: i64, enabled: bool, secret: &str) -> Result<(), String>;

    // ── Sessions ────────────────────────────────────────────────────
    fn session_create(
        &self,
        id: &str,
        user_id: i64,
        csrf_token: &str,
        expires_at: &str,
        ip_hash: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), String>;
    fn session_get(&self, id: &str) -> Option<Session>;
    fn session_get_user(&self, id: &str) -> Option<(Session, User)> {
        let session = self.session_get(id)?;
        let user = self.user_get_by_id(session.user_id)?;
        Some((session, user))
    }
    fn session_touch(&self, id: &str, expires_at: &str) -> Result<(), String>;
    fn session_delete(&self, id: &str) -> Result<(), String>;
    fn session_delete_for_user(&self, user_id: i64) -> Result<(), String>;
    fn session_cleanup_expired(&self) -> Result<usize, String>;

    // ── Audit log ───────────────────────────────────────────────────
    fn audit_log(&self, event: &AuditEvent);
    fn audit_list(&self, entity_filter: Option<&str>, limit: i64, offset: i64) -> Vec<AuditEntry>;
    fn audit_count(&self, entity_filter: Option<&str>) -> i64;
    fn audit_cleanup(&self, max_age_days: i64) -> Result<usize, String>;

    // ── Email components ────────────────────────────────────────────
    fn email_component_get(&self, id: i64) -> Option<EmailComponent>;
    fn email_component_list(&self) -> Vec<EmailComponent>;
    fn email_component_for_type(&self, component_type: &str) -> Option<EmailComponent>;
    fn email_component_save(&self, form: &EmailComponentForm) -> Result<i64, String>;
    fn email_component_delete(&self, id: i64) -> Result<bool, String>;
    fn email_component_toggle(&self, id: i64) -> Result<bool, String>;
    fn email_variables(&self) -> Vec<TemplateVariable>;

    // ── Fee templates ───────────────────────────────────────────────
    fn fee_template_get(&self, id: i64) -> Option<FeeTemplate>;
    fn fee_template_list(&self) -> Vec<FeeTemplate>;
    fn fee_template_create(&self, form: &FeeTemplateForm, created_by: i64) -> Result<i64, String>;
    fn fee_template_update(&self, id: i64, form: &FeeTemplateForm) -> Result<bool, String>;
    fn fee_template_toggle(&self, id: i64) -> Result<bool, String>;
    fn fee_template_delete(&self, id: i64) -> Result<(), String>;

    // ── Payment methods ─────────────────────────────────────────────
    fn payment_config_get(&self, method: &str) -> PaymentMethodConfig;
    fn payment_config_upsert(&self, config: &PaymentMethodConfig) -> Result<(), String>;
    fn payment_scheme_get(&self, user_id: i64) -> Option<PaymentScheme>;
    fn payment_scheme_assign_subscription(&self, user_id: i64, assigned_by: i64) -> Result<(), String>;
    fn payment_stats(&self) -> PaymentStats;

    // ── SEO ─────────────────────────────────────────────────────────
    fn seo_activity_record(&self, title: &str, description: &str) -> Result<i64, String>;
    fn seo_activity_recent(&self, limit: i64) -> Vec<SeoActivity>;

    // ── Backups ─────────────────────────────────────────────────────
    fn backup_log_insert(&self, entry: &NewBackupLog) -> Result<i64, String>;
    fn backup_log_recent(&self, limit: i64) -> Vec<BackupLog>;
    fn backup_log_exists_since(&self, backup_type: &str, hours: i64) -> bool;

    // ── Loan analytics ──────────────────────────────────────────────
    fn analytics_overview(&self) -> LoanOverview;
    fn analytics_revenue_trend(&self, months: i64) -> Vec<MonthlyRevenue>;
    fn analytics_status_distribution(&self) -> Vec<StatusCount>;
    fn analytics_export(&self, category: ExportCategory, range: &DateRange) -> Result<Records, String>;
}
