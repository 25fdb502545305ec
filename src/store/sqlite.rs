use std::collections::HashMap;

use rusqlite::params;

use crate::db::DbPool;
use crate::export::Records;
use crate::models::analytics::{
    DateRange, ExportCategory, LoanAnalytics, LoanOverview, MonthlyRevenue, StatusCount,
};
use crate::models::audit::{AuditEntry, AuditEvent};
use crate::models::backup_log::{BackupLog, NewBackupLog};
use crate::models::email_component::{EmailComponent, EmailComponentForm, TemplateVariable};
use crate::models::fee_template::{FeeTemplate, FeeTemplateForm};
use crate::models::payment_method::{self, PaymentMethodConfig, PaymentScheme, PaymentStats};
use crate::models::seo::SeoActivity;
use crate::models::session::Session;
use crate::models::settings::Setting;
use crate::models::user::{User, UserFilter, UserForm, UserStats};

use super::Store;

/// SQLite-backed implementation of the Store trait.
/// Wraps the r2d2 connection pool and delegates to model methods.
pub struct SqliteStore {
    pub pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl Store for SqliteStore {
    // ── Lifecycle ───────────────────────────────────────────────────

    fn ping(&self) -> Result<(String, u64), String> {
        let conn = self.pool.get().map_err(|e| e.to_string())?;
        let one: i64 = conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(|e| e.to_string())?;
        if one != 1 {
            return Err("Unexpected response from database".to_string());
        }
        let version: String = conn
            .query_row("SELECT sqlite_version()", [], |row| row.get(0))
            .map_err(|e| e.to_string())?;
        let pages: i64 = conn
            .query_row("PRAGMA page_count", [], |row| row.get(0))
            .map_err(|e| e.to_string())?;
        let page_size: i64 = conn
            .query_row("PRAGMA page_size", [], |row| row.get(0))
            .map_err(|e| e.to_string())?;
        Ok((version, (pages * page_size).max(0) as u64))
    }

    fn snapshot_to(&self, dest: &str) -> Result<(), String> {
        let conn = self.pool.get().map_err(|e| e.to_string())?;
        conn.execute("VACUUM INTO ?1", params![dest])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    // ── Settings ────────────────────────────────────────────────────

    fn setting_get(&self, key: &str) -> Option<String> {
        Setting::get(&self.pool, key)
    }

    fn setting_set(&self, key: &str, value: &str, updated_by: Option<i64>) -> Result<(), String> {
        Setting::set(&self.pool, key, value, updated_by)
    }

    fn setting_set_many(
        &self,
        settings: &HashMap<String, String>,
        updated_by: Option<i64>,
    ) -> Result<(), String> {
        Setting::set_many(&self.pool, settings, updated_by)
    }

    fn setting_get_group(&self, prefix: &str) -> HashMap<String, String> {
        Setting::get_group(&self.pool, prefix)
    }

    fn setting_all(&self) -> HashMap<String, String> {
        Setting::all(&self.pool)
    }

    // ── Users ───────────────────────────────────────────────────────

    fn user_get_by_id(&self, id: i64) -> Option<User> {
        User::get_by_id(&self.pool, id)
    }

    fn user_get_by_email(&self, email: &str) -> Option<User> {
        User::get_by_email(&self.pool, email)
    }

    fn user_email_taken(&self, email: &str, exclude_id: Option<i64>) -> bool {
        User::email_taken(&self.pool, email, exclude_id)
    }

    fn user_list_filtered(&self, filter: &UserFilter, limit: i64, offset: i64) -> Vec<User> {
        User::list_filtered(&self.pool, filter, limit, offset)
    }

    fn user_count_filtered(&self, filter: &UserFilter) -> i64 {
        User::count_filtered(&self.pool, filter)
    }

    fn user_stats(&self) -> UserStats {
        User::stats(&self.pool)
    }

    fn user_count_active_admins(&self) -> i64 {
        User::count_active_admins(&self.pool)
    }

    fn user_create(&self, form: &UserForm, password_hash: &str) -> Result<i64, String> {
        User::create(&self.pool, form, password_hash)
    }

    fn user_update(&self, id: i64, form: &UserForm) -> Result<(), String> {
        User::update(&self.pool, id, form)
    }

    fn user_set_password(&self, id: i64, password_hash: &str, reset_required: bool) -> Result<(), String> {
        User::set_password(&self.pool, id, password_hash, reset_required)
    }

    fn user_set_status(&self, id: i64, status: &str) -> Result<(), String> {
        User::set_status(&self.pool, id, status)
    }

    fn user_soft_delete(&self, id: i64) -> Result<(), String> {
        User::soft_delete(&self.pool, id)
    }

    fn user_unlock(&self, id: i64) -> Result<(), String> {
        User::unlock(&self.pool, id)
    }

    fn user_record_failed_login(&self, id: i64, max_attempts: i64, lockout_minutes: i64) -> Result<i64, String> {
        User::record_failed_login(&self.pool, id, max_attempts, lockout_minutes)
    }

    fn user_record_successful_login(&self, id: i64) -> Result<(), String> {
        User::record_successful_login(&self.pool, id)
    }

    fn user_release_expired_lock(&self, id: i64) -> Result<bool, String> {
        User::release_expired_lock(&self.pool, id)
    }

    fn user_update_two_factor(&self, id: i64, enabled: bool, secret: &str) -> Result<(), String> {
        User::update_two_factor(&self.pool, id, enabled, secret)
    }

    // ── Sessions ────────────────────────────────────────────────────

    fn session_create(
        &self,
        id: &str,
        user_id: i64,
        csrf_token: &str,
        expires_at: &str,
        ip_hash: Option<&str>,
        user_agent: Option<&str>,
    ) -> Result<(), String> {
        Session::create(&self.pool, id, user_id, csrf_token, expires_at, ip_hash, user_agent)
    }

    fn session_get(&self, id: &str) -> Option<Session> {
        Session::get(&self.pool, id)
    }

    fn session_touch(&self, id: &str, expires_at: &str) -> Result<(), String> {
        Session::touch(&self.pool, id, expires_at)
    }

    fn session_delete(&self, id: &str) -> Result<(), String> {
        Session::delete(&self.pool, id)
    }

    fn session_delete_for_user(&self, user_id: i64) -> Result<(), String> {
        Session::delete_for_user(&self.pool, user_id)
    }

    fn session_cleanup_expired(&self) -> Result<usize, String> {
        Session::cleanup_expired(&self.pool)
    }

    // ── Audit log ───────────────────────────────────────────────────

    fn audit_log(&self, event: &AuditEvent) {
        if !Setting::get(&self.pool, "enable_audit_log")
            .map(|v| crate::models::settings::is_truthy(&v))
            .unwrap_or(true)
        {
            return;
        }
        AuditEntry::log(&self.pool, event)
    }

    fn audit_list(&self, entity_filter: Option<&str>, limit: i64, offset: i64) -> Vec<AuditEntry> {
        AuditEntry::list(&self.pool, entity_filter, limit, offset)
    }

    fn audit_count(&self, entity_filter: Option<&str>) -> i64 {
        AuditEntry::count(&self.pool, entity_filter)
    }

    fn audit_cleanup(&self, max_age_days: i64) -> Result<usize, String> {
        AuditEntry::cleanup(&self.pool, max_age_days)
    }

    // ── Email components ────────────────────────────────────────────

    fn email_component_get(&self, id: i64) -> Option<EmailComponent> {
        EmailComponent::get_by_id(&self.pool, id)
    }

    fn email_component_list(&self) -> Vec<EmailComponent> {
        EmailComponent::list(&self.pool)
    }

    fn email_component_for_type(&self, component_type: &str) -> Option<EmailComponent> {
        EmailComponent::get_for_type(&self.pool, component_type)
    }

    fn email_component_save(&self, form: &EmailComponentForm) -> Result<i64, String> {
        EmailComponent::save(&self.pool, form)
    }

    fn email_component_delete(&self, id: i64) -> Result<bool, String> {
        EmailComponent::delete(&self.pool, id)
    }

    fn email_component_toggle(&self, id: i64) -> Result<bool, String> {
        EmailComponent::toggle_active(&self.pool, id)
    }

    fn email_variables(&self) -> Vec<TemplateVariable> {
        TemplateVariable::list(&self.pool)
    }

    // ── Fee templates ───────────────────────────────────────────────

    fn fee_template_get(&self, id: i64) -> Option<FeeTemplate> {
        FeeTemplate::get_by_id(&self.pool, id)
    }

    fn fee_template_list(&self) -> Vec<FeeTemplate> {
        FeeTemplate::list(&self.pool)
    }

    fn fee_template_create(&self, form: &FeeTemplateForm, created_by: i64) -> Result<i64, String> {
        FeeTemplate::create(&self.pool, form, created_by)
    }

    fn fee_template_update(&self, id: i64, form: &FeeTemplateForm) -> Result<bool, String> {
        FeeTemplate::update(&self.pool, id, form)
    }

    fn fee_template_toggle(&self, id: i64) -> Result<bool, String> {
        FeeTemplate::toggle_active(&self.pool, id)
    }

    fn fee_template_delete(&self, id: i64) -> Result<(), String> {
        FeeTemplate::delete(&self.pool, id)
    }

    // ── Payment methods ─────────────────────────────────────────────

    fn payment_config_get(&self, method: &str) -> PaymentMethodConfig {
        PaymentMethodConfig::get(&self.pool, method)
    }

    fn payment_config_upsert(&self, config: &PaymentMethodConfig) -> Result<(), String> {
        PaymentMethodConfig::upsert(&self.pool, config)
    }

    fn payment_scheme_get(&self, user_id: i64) -> Option<PaymentScheme> {
        PaymentScheme::get_for_user(&self.pool, user_id)
    }

    fn payment_scheme_assign_subscription(&self, user_id: i64, assigned_by: i64) -> Result<(), String> {
        PaymentScheme::assign_subscription(&self.pool, user_id, assigned_by)
    }

    fn payment_stats(&self) -> PaymentStats {
        payment_method::payment_stats(&self.pool)
    }

    // ── SEO ─────────────────────────────────────────────────────────

    fn seo_activity_record(&self, title: &str, description: &str) -> Result<i64, String> {
        SeoActivity::record(&self.pool, title, description)
    }

    fn seo_activity_recent(&self, limit: i64) -> Vec<SeoActivity> {
        SeoActivity::recent(&self.pool, limit)
    }

    // ── Backups ─────────────────────────────────────────────────────

    fn backup_log_insert(&self, entry: &NewBackupLog) -> Result<i64, String> {
        BackupLog::insert(&self.pool, entry)
    }

    fn backup_log_recent(&self, limit: i64) -> Vec<BackupLog> {
        BackupLog::recent(&self.pool, limit)
    }

    fn backup_log_exists_since(&self, backup_type: &str, hours: i64) -> bool {
        BackupLog::exists_since(&self.pool, backup_type, hours)
    }

    // ── Loan analytics ──────────────────────────────────────────────

    fn analytics_overview(&self) -> LoanOverview {
        LoanAnalytics::overview(&self.pool)
    }

    fn analytics_revenue_trend(&self, months: i64) -> Vec<MonthlyRevenue> {
        LoanAnalytics::revenue_trend(&self.pool, months)
    }

    fn analytics_status_distribution(&self) -> Vec<StatusCount> {
        LoanAnalytics::status_distribution(&self.pool)
    }

    fn analytics_export(&self, category: ExportCategory, range: &DateRange) -> Result<Records, String> {
        LoanAnalytics::export(&self.pool, category, range)
    }
}
