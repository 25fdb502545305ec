use rocket::form::Form;
use rocket::http::{ContentType, Status};
use rocket::request::FlashMessage;
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::{audit_event, is_valid_email, page_context, FlashResult, FormData, PanelRedirect, INVALID_ACTION};
use crate::backup::{self, BackupKind};
use crate::config::AppConfig;
use crate::email;
use crate::email::smtp::Encryption;
use crate::export::Download;
use crate::security::auth::{AdminUser, ClientIp};
use crate::security::csrf;
use crate::store::Store;
use crate::AdminSlug;

const CACHE_DIR: &str = "website/cache";

pub const SECTIONS: &[&str] = &["general", "email", "security", "payment", "captcha", "backup", "maintenance"];

pub const DATE_FORMATS: &[&str] = &["Y-m-d", "m/d/Y", "d/m/Y", "d.m.Y", "M j, Y", "F j, Y"];

/// Settings that are never rendered back or written to the audit log. A blank
/// submission keeps the stored value.
pub const SECRET_KEYS: &[&str] = &[
    "smtp_password",
    "paypal_client_secret",
    "stripe_secret_key",
    "stripe_webhook_secret",
    "recaptcha_secret_key",
    "hcaptcha_secret_key",
];

const COMMON_TIMEZONES: &[&str] = &[
    "America/New_York",
    "America/Chicago",
    "America/Denver",
    "America/Los_Angeles",
    "America/Toronto",
    "Europe/London",
    "Europe/Berlin",
    "Europe/Paris",
    "Australia/Sydney",
    "UTC",
];

type Rows = HashMap<String, String>;

fn flag(b: bool) -> String {
    if b { "1" } else { "0" }.to_string()
}

fn or_default(form: &FormData, key: &str, default: &str) -> String {
    let v = form.text(key);
    if v.is_empty() {
        default.to_string()
    } else {
        v
    }
}

fn int_in_range(form: &FormData, key: &str, default: i64, min: i64, max: i64, label: &str) -> Result<String, String> {
    let raw = or_default(form, key, &default.to_string());
    match raw.parse::<i64>() {
        Ok(n) if (min..=max).contains(&n) => Ok(n.to_string()),
        _ => Err(format!("{} must be between {} and {}.", label, min, max)),
    }
}

/// Copy secret fields only when something was typed.
fn keep_secret(rows: &mut Rows, form: &FormData, key: &str) {
    let v = form.text(key);
    if !v.is_empty() {
        rows.insert(key.to_string(), v);
    }
}

pub(crate) fn general_rows(form: &FormData) -> Result<Rows, String> {
    let site_name = form.text("site_name");
    if site_name.is_empty() {
        return Err("Site name is required.".into());
    }
    let site_email = or_default(form, "site_email", "admin@loanflow.com");
    let admin_email = or_default(form, "admin_email", "admin@loanflow.com");
    if !is_valid_email(&site_email) || !is_valid_email(&admin_email) {
        return Err("Please enter valid email addresses.".into());
    }
    let timezone = or_default(form, "timezone", "America/New_York");
    if timezone.parse::<chrono_tz::Tz>().is_err() {
        return Err("Unknown timezone.".into());
    }
    let date_format = or_default(form, "date_format", "Y-m-d");
    if !DATE_FORMATS.contains(&date_format.as_str()) {
        return Err("Unsupported date format.".into());
    }
    let currency = or_default(form, "currency", "USD").to_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err("Currency must be a 3-letter code.".into());
    }

    let mut rows = Rows::new();
    rows.insert("site_name".into(), site_name);
    rows.insert("site_email".into(), site_email);
    rows.insert("admin_email".into(), admin_email);
    rows.insert("timezone".into(), timezone);
    rows.insert("date_format".into(), date_format);
    rows.insert("currency".into(), currency);
    rows.insert("maintenance_mode".into(), flag(form.checkbox("maintenance_mode")));
    Ok(rows)
}

pub(crate) fn email_rows(form: &FormData) -> Result<Rows, String> {
    let port = int_in_range(form, "smtp_port", 587, 1, 65535, "SMTP port")?;
    let encryption = or_default(form, "smtp_encryption", "tls").to_lowercase();
    if Encryption::parse(&encryption).is_none() {
        return Err("Encryption must be none, ssl or tls.".into());
    }
    let from_address = form.text("mail_from_address");
    if !from_address.is_empty() && !is_valid_email(&from_address) {
        return Err("Please enter a valid sender address.".into());
    }

    let mut rows = Rows::new();
    rows.insert("smtp_host".into(), form.text("smtp_host"));
    rows.insert("smtp_port".into(), port);
    rows.insert("smtp_username".into(), form.text("smtp_username"));
    rows.insert("smtp_encryption".into(), encryption);
    rows.insert("mail_from_name".into(), form.text("mail_from_name"));
    rows.insert("mail_from_address".into(), from_address);
    keep_secret(&mut rows, form, "smtp_password");
    Ok(rows)
}

pub(crate) fn security_rows(form: &FormData) -> Result<Rows, String> {
    let whitelist = form.text("ip_whitelist");
    let ips: Vec<&str> = whitelist.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if let Some(bad) = ips.iter().find(|ip| ip.parse::<std::net::IpAddr>().is_err()) {
        return Err(format!("Invalid IP address in whitelist: {}", bad));
    }

    let mut rows = Rows::new();
    rows.insert(
        "max_login_attempts".into(),
        int_in_range(form, "max_login_attempts", 5, 1, 100, "Max login attempts")?,
    );
    rows.insert(
        "lockout_duration".into(),
        int_in_range(form, "lockout_duration", 30, 1, 1440, "Lockout duration")?,
    );
    rows.insert(
        "session_timeout".into(),
        int_in_range(form, "session_timeout", 30, 5, 1440, "Session timeout")?,
    );
    rows.insert(
        "password_min_length".into(),
        int_in_range(form, "password_min_length", 8, 6, 128, "Password minimum length")?,
    );
    rows.insert("require_2fa".into(), flag(form.checkbox("require_2fa")));
    rows.insert("ip_whitelist".into(), ips.join(","));
    rows.insert("enable_audit_log".into(), flag(form.checkbox("enable_audit_log")));
    Ok(rows)
}

pub(crate) fn payment_rows(form: &FormData) -> Rows {
    let mut rows = Rows::new();
    for key in ["paypal_enabled", "paypal_sandbox", "stripe_enabled"] {
        rows.insert(key.into(), flag(form.checkbox(key)));
    }
    for key in ["paypal_client_id", "stripe_publishable_key"] {
        rows.insert(key.into(), form.text(key));
    }
    for key in ["paypal_client_secret", "stripe_secret_key", "stripe_webhook_secret"] {
        keep_secret(&mut rows, form, key);
    }
    rows
}

pub(crate) fn captcha_rows(form: &FormData) -> Result<Rows, String> {
    let provider = or_default(form, "captcha_provider", "custom");
    if !["custom", "recaptcha", "hcaptcha"].contains(&provider.as_str()) {
        return Err("Unknown captcha provider.".into());
    }
    let mut rows = Rows::new();
    rows.insert("captcha_enabled".into(), flag(form.checkbox("captcha_enabled")));
    rows.insert("captcha_provider".into(), provider);
    rows.insert("recaptcha_site_key".into(), form.text("recaptcha_site_key"));
    rows.insert("hcaptcha_site_key".into(), form.text("hcaptcha_site_key"));
    let forms: Vec<String> = form
        .text("captcha_protected_forms")
        .split(',')
        .map(|f| f.trim().to_lowercase())
        .filter(|f| !f.is_empty())
        .collect();
    rows.insert("captcha_protected_forms".into(), forms.join(","));
    keep_secret(&mut rows, form, "recaptcha_secret_key");
    keep_secret(&mut rows, form, "hcaptcha_secret_key");
    Ok(rows)
}

pub(crate) fn backup_rows(form: &FormData) -> Result<Rows, String> {
    let day = or_default(form, "backup_schedule_day", "sunday").to_lowercase();
    if backup::parse_weekday(&day).is_none() {
        return Err("Invalid backup day.".into());
    }
    let time = or_default(form, "backup_schedule_time", "02:00");
    if backup::parse_schedule_time(&time).is_none() {
        return Err("Backup time must be HH:MM.".into());
    }
    let mut rows = Rows::new();
    rows.insert(
        "backup_max_retention".into(),
        int_in_range(form, "backup_max_retention", 4, 0, 52, "Backup retention")?,
    );
    rows.insert("backup_email_notifications".into(), flag(form.checkbox("backup_email_notifications")));
    rows.insert("backup_weekly_schedule".into(), flag(form.checkbox("backup_weekly_schedule")));
    rows.insert("backup_schedule_day".into(), day);
    rows.insert("backup_schedule_time".into(), time);
    Ok(rows)
}

/// Audit details for a settings write: the changed keys, secrets left out.
pub(crate) fn audit_keys(rows: &Rows) -> String {
    let mut keys: Vec<&str> = rows
        .keys()
        .map(String::as_str)
        .filter(|k| !SECRET_KEYS.contains(k))
        .collect();
    keys.sort_unstable();
    keys.join(", ")
}

/// Delete every file under `dir`, returning how many were removed.
pub(crate) fn clear_dir(dir: &str) -> Result<usize, String> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.to_string()),
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let result = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("Could not remove {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}

#[get("/system-settings?<section>")]
pub fn settings_page(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    config: &State<AppConfig>,
    section: Option<&str>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = &**store.inner();
    let mut context = page_context(&admin, slug, s, "System Settings", "system_settings", flash);

    let section = section.filter(|v| SECTIONS.contains(v)).unwrap_or("general");
    let mut settings = s.setting_all();
    for key in SECRET_KEYS {
        let set = settings.remove(*key).map(|v| !v.is_empty()).unwrap_or(false);
        settings.insert(format!("{}_set", key), flag(set));
    }

    context["section"] = json!(section);
    context["sections"] = json!(SECTIONS);
    context["settings"] = json!(settings);
    context["date_formats"] = json!(DATE_FORMATS);
    context["timezones"] = json!(COMMON_TIMEZONES);
    context["backups"] = json!(backup::list_backups(&config.backup_dir));
    context["backup_logs"] = json!(s.backup_log_recent(10));
    match s.ping() {
        Ok((version, size)) => {
            context["db_version"] = json!(version);
            context["db_size"] = json!(backup::human_bytes(size));
        }
        Err(e) => log::warn!("Database ping failed: {}", e),
    }
    context["app_version"] = json!(env!("CARGO_PKG_VERSION"));
    Template::render("admin/system_settings", &context)
}

fn create_backup(store: &dyn Store, config: &AppConfig) -> Result<backup::BackupOutcome, String> {
    backup::create_complete_backup(store, &config.backup_dir, &config.backup_sources, BackupKind::Manual)
}

#[post("/system-settings", data = "<form>")]
pub fn settings_action(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    config: &State<AppConfig>,
    client_ip: ClientIp,
    form: Form<HashMap<String, String>>,
) -> FlashResult {
    let s: &dyn Store = &**store.inner();
    let form = FormData(form.into_inner());
    let action = form.action();
    let section = match action.as_str() {
        "update_email" | "test_email" => "email",
        "update_security" => "security",
        "update_payment" => "payment",
        "update_captcha" => "captcha",
        "create_complete_backup" | "update_backup_settings" | "delete_backup" => "backup",
        "clear_cache" | "test_database" => "maintenance",
        _ => "general",
    };
    let back = PanelRedirect::new(slug, &format!("system-settings?section={}", section));

    if !form.csrf_ok(&admin) {
        return back.error(csrf::INVALID_TOKEN);
    }

    let save = |rows: Result<Rows, String>, audit_action: &str, done: &str| -> FlashResult {
        let rows = match rows {
            Ok(r) => r,
            Err(msg) => return back.error(msg),
        };
        if let Err(e) = s.setting_set_many(&rows, Some(admin.user.id)) {
            return back.failed(&format!("Error on {}", audit_action), &e);
        }
        s.audit_log(&audit_event(&admin, &client_ip.0, audit_action, "system_settings").details(audit_keys(&rows)));
        back.success(done)
    };

    match action.as_str() {
        "update_general" => save(general_rows(&form), "general_settings_updated", "General settings updated successfully!"),
        "update_email" => save(email_rows(&form), "email_settings_updated", "Email settings updated successfully!"),
        "update_security" => save(security_rows(&form), "security_settings_updated", "Security settings updated successfully!"),
        "update_payment" => save(Ok(payment_rows(&form)), "payment_settings_updated", "Payment settings updated successfully!"),
        "update_captcha" => save(captcha_rows(&form), "captcha_settings_updated", "Captcha settings updated successfully!"),
        "update_backup_settings" => save(backup_rows(&form), "backup_settings_updated", "Backup settings updated successfully!"),
        "test_email" => {
            let to = {
                let typed = form.text("test_email_address");
                if typed.is_empty() {
                    s.setting_get_or("admin_email", "")
                } else {
                    typed
                }
            };
            if !is_valid_email(&to) {
                return back.error("Please enter a valid email address for the test message.");
            }
            match email::send_test_email(s, &to) {
                Ok(()) => {
                    s.audit_log(&audit_event(&admin, &client_ip.0, "test_email_sent", "system_settings").details(to.clone()));
                    back.success(format!("Test email sent to {}.", to))
                }
                Err(e) => {
                    log::warn!("Test email to {} failed: {}", to, e);
                    back.error(format!("Test email failed: {}", e))
                }
            }
        }
        "create_complete_backup" => match create_backup(s, config) {
            Ok(outcome) => {
                s.audit_log(
                    &audit_event(&admin, &client_ip.0, "complete_backup_created", "system").details(outcome.name.clone()),
                );
                back.success(format!(
                    "Complete backup created: {} ({})",
                    outcome.name,
                    backup::human_bytes(outcome.compressed_size)
                ))
            }
            Err(e) => back.error(format!("Backup failed: {}", e)),
        },
        "delete_backup" => {
            let name = form.text("backup_name");
            if !backup::is_valid_backup_name(&name) {
                return back.error("Invalid backup name.");
            }
            match backup::delete_backup(&config.backup_dir, &name) {
                Ok(()) => {
                    s.audit_log(&audit_event(&admin, &client_ip.0, "backup_deleted", "system").details(name));
                    back.success("Backup deleted successfully!")
                }
                Err(e) => back.error(e),
            }
        }
        "clear_cache" => match clear_dir(CACHE_DIR) {
            Ok(n) => {
                s.audit_log(&audit_event(&admin, &client_ip.0, "cache_cleared", "system").details(format!("{} entries", n)));
                back.success(format!("Cache cleared: {} entries removed.", n))
            }
            Err(e) => back.failed("Error clearing cache", &e),
        },
        "test_database" => match s.ping() {
            Ok((version, size)) => back.success(format!(
                "Database connection successful: SQLite {}, {}",
                version,
                backup::human_bytes(size)
            )),
            Err(e) => back.error(format!("Database connection failed: {}", e)),
        },
        _ => back.error(INVALID_ACTION),
    }
}

#[get("/system-settings/backups/<name>/download")]
pub fn backup_download(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    config: &State<AppConfig>,
    client_ip: ClientIp,
    name: &str,
) -> Result<Download, Status> {
    let path = backup::backup_path(&config.backup_dir, name).ok_or(Status::NotFound)?;
    let body = std::fs::read(&path).map_err(|e| {
        log::error!("Failed to read backup {}: {}", path.display(), e);
        Status::InternalServerError
    })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("{}.zip", name));
    store.audit_log(&audit_event(&admin, &client_ip.0, "backup_downloaded", "system").details(filename.clone()));
    Ok(Download {
        filename,
        content_type: ContentType::ZIP,
        body,
    })
}
