#![cfg(test)]

use chrono::{NaiveDate, NaiveDateTime};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::backup;
use crate::config::AppConfig;
use crate::db::{run_migrations, seed_defaults, DbPool};
use crate::email::compose;
use crate::export::{self, ExportFormat, Records};
use crate::models::analytics::{default_rate, DateRange, ExportCategory};
use crate::models::audit::AuditEvent;
use crate::models::email_component::EmailComponentForm;
use crate::models::fee_template::{FeeTemplateForm, RequiredFields, DUPLICATE_TEMPLATE};
use crate::models::payment_method::{default_config, PaymentMethodConfig};
use crate::models::session::Session;
use crate::models::settings::{is_truthy, wall_clock, Setting};
use crate::models::user::{User, UserFilter, UserForm};
use crate::rate_limit::RateLimiter;
use crate::routes::admin::{self, FormData};
use crate::security::auth::{self, AdminUser};
use crate::security::{captcha, csrf, mfa};
use crate::seo::{self, sitemap};
use crate::store::sqlite::SqliteStore;
use crate::store::Store;

/// Atomic counter for unique shared-cache DB names so parallel tests don't collide.
static TEST_DB_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Fresh in-memory SQLite pool with migrations and default settings applied.
/// Uses a named shared-cache in-memory DB so every pooled connection sees the same data.
fn test_pool() -> DbPool {
    let id = TEST_DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let uri = format!("file:loanflow_testdb_{}?mode=memory&cache=shared", id);
    let manager = SqliteConnectionManager::file(uri);
    let pool = Pool::builder()
        .max_size(2)
        .build(manager)
        .expect("Failed to create test pool");
    {
        let conn = pool.get().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    }
    run_migrations(&pool).expect("Failed to run migrations");
    seed_defaults(&pool).expect("Failed to seed defaults");
    pool
}

fn test_store() -> Arc<dyn Store> {
    Arc::new(SqliteStore::new(test_pool()))
}

/// Fast bcrypt hash for tests (cost=4 instead of DEFAULT_COST=12).
fn fast_hash(password: &str) -> String {
    bcrypt::hash(password, 4).unwrap()
}

fn form(pairs: &[(&str, &str)]) -> FormData {
    FormData(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

fn user_form_for(email: &str, role: &str, status: &str) -> UserForm {
    UserForm {
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: email.to_string(),
        phone: String::new(),
        role: role.to_string(),
        status: status.to_string(),
    }
}

fn create_user(store: &dyn Store, email: &str, role: &str) -> i64 {
    store
        .user_create(&user_form_for(email, role, "active"), &fast_hash("password123"))
        .unwrap()
}

fn admin_guard(store: &dyn Store, id: i64) -> AdminUser {
    AdminUser {
        user: store.user_get_by_id(id).unwrap(),
        session: Session {
            id: "test-session".to_string(),
            user_id: id,
            csrf_token: "token".to_string(),
            expires_at: "2099-01-01 00:00:00".to_string(),
        },
    }
}

fn ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Unique scratch directory under the system temp dir.
fn scratch_dir(label: &str) -> String {
    let id = TEST_DB_COUNTER.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("loanflow_{}_{}_{}", label, std::process::id(), id));
    std::fs::create_dir_all(&dir).unwrap();
    dir.to_string_lossy().into_owned()
}

fn test_user(status: &str, failed: i64, last_failed: Option<&str>, last_login: Option<&str>) -> User {
    User {
        id: 1,
        first_name: "Jane".to_string(),
        last_name: "Doe".to_string(),
        email: "jane@example.com".to_string(),
        phone: String::new(),
        password_hash: "hash".to_string(),
        role: "admin".to_string(),
        status: status.to_string(),
        failed_login_attempts: failed,
        last_failed_login: last_failed.map(String::from),
        locked_until: None,
        last_login: last_login.map(String::from),
        password_changed: true,
        password_reset_required: false,
        two_factor_enabled: false,
        two_factor_secret: String::new(),
        created_at: "2024-01-01 00:00:00".to_string(),
        updated_at: "2024-01-01 00:00:00".to_string(),
    }
}

// ═══════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════

#[test]
fn settings_set_and_get() {
    let pool = test_pool();
    Setting::set(&pool, "test_key", "hello", None).unwrap();
    assert_eq!(Setting::get(&pool, "test_key"), Some("hello".to_string()));
    assert_eq!(Setting::get_or(&pool, "missing", "fallback"), "fallback");
}

#[test]
fn settings_defaults_are_seeded() {
    let pool = test_pool();
    assert_eq!(Setting::get(&pool, "site_name"), Some("LoanFlow".to_string()));
    assert_eq!(Setting::get_i64(&pool, "max_login_attempts"), 5);
    assert!(!Setting::get_bool(&pool, "captcha_enabled"));
    assert_eq!(Setting::get(&pool, "seo_auto_backlinks"), Some("0".to_string()));
}

#[test]
fn settings_seed_does_not_overwrite() {
    let pool = test_pool();
    Setting::set(&pool, "site_name", "Acme Loans", None).unwrap();
    seed_defaults(&pool).unwrap();
    assert_eq!(Setting::get(&pool, "site_name"), Some("Acme Loans".to_string()));
}

#[test]
fn settings_set_many_records_author() {
    let pool = test_pool();
    let mut map = HashMap::new();
    map.insert("k1".to_string(), "v1".to_string());
    map.insert("k2".to_string(), "v2".to_string());
    Setting::set_many(&pool, &map, Some(7)).unwrap();
    assert_eq!(Setting::get(&pool, "k1"), Some("v1".to_string()));
    let conn = pool.get().unwrap();
    let by: Option<i64> = conn
        .query_row("SELECT updated_by FROM settings WHERE key = 'k2'", [], |r| r.get(0))
        .unwrap();
    assert_eq!(by, Some(7));
}

#[test]
fn settings_group_matches_literal_prefix() {
    let pool = test_pool();
    Setting::set(&pool, "edge_cache_level", "basic", None).unwrap();
    Setting::set(&pool, "edgeXcache", "nope", None).unwrap();
    let group = Setting::get_group(&pool, "edge_");
    assert_eq!(group.get("edge_cache_level"), Some(&"basic".to_string()));
    assert!(!group.contains_key("edgeXcache"));
}

#[test]
fn settings_wall_clock_follows_timezone() {
    use chrono::TimeZone;
    let utc = chrono::Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
    assert_eq!(wall_clock("America/New_York", utc), ts("2024-07-01 08:00:00"));
    assert_eq!(wall_clock("Asia/Tokyo", utc), ts("2024-07-01 21:00:00"));
    assert_eq!(wall_clock("Mars/Olympus", utc), utc.with_timezone(&chrono::Local).naive_local());

    let store = test_store();
    store.setting_set("timezone", "Pacific/Kiritimati", None).unwrap();
    let expected = wall_clock("Pacific/Kiritimati", chrono::Utc::now());
    assert!((store.site_now() - expected).num_seconds().abs() < 5);
}

#[test]
fn truthy_values() {
    for v in ["1", "true", "on", "yes"] {
        assert!(is_truthy(v), "{} should be truthy", v);
    }
    for v in ["0", "false", "", "off"] {
        assert!(!is_truthy(v), "{} should be falsy", v);
    }
}

// ═══════════════════════════════════════════════════════════
// Config
// ═══════════════════════════════════════════════════════════

#[test]
fn config_from_toml() {
    let cfg = AppConfig::from_toml_str(
        r#"
        [server]
        admin_slug = "/back-office/"
        [database]
        path = "/var/lib/loanflow/app.db"
        [backup]
        dir = "/var/backups/loanflow"
        sources = ["website", " ", "extra/docs"]
        "#,
    );
    assert_eq!(cfg.admin_slug, "back-office");
    assert_eq!(cfg.db_path, "/var/lib/loanflow/app.db");
    assert_eq!(cfg.backup_dir, "/var/backups/loanflow");
    assert_eq!(cfg.backup_sources, vec!["website", "extra/docs"]);
    assert_eq!(cfg.admin_email, AppConfig::default().admin_email);
}

#[test]
fn config_invalid_toml_falls_back_to_defaults() {
    let cfg = AppConfig::from_toml_str("this is [not toml");
    assert_eq!(cfg.admin_slug, "admin");
    assert_eq!(cfg.db_path, AppConfig::default().db_path);
    assert_eq!(cfg.backup_sources, vec!["website", "Rocket.toml", "loanflow.toml"]);
}

#[test]
fn config_blank_slug_keeps_default() {
    let cfg = AppConfig::from_toml_str("[server]\nadmin_slug = \"  \"\n");
    assert_eq!(cfg.admin_slug, "admin");
}

// ═══════════════════════════════════════════════════════════
// Users
// ═══════════════════════════════════════════════════════════

#[test]
fn user_crud() {
    let store = test_store();
    let id = create_user(&*store, "alice@example.com", "agent");
    let user = store.user_get_by_id(id).unwrap();
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.role, "agent");
    assert!(user.is_active());

    let mut update = user_form_for("alice@example.com", "manager", "inactive");
    update.first_name = "Alice".to_string();
    store.user_update(id, &update).unwrap();
    let user = store.user_get_by_id(id).unwrap();
    assert_eq!(user.first_name, "Alice");
    assert_eq!(user.role, "manager");
    assert_eq!(user.status, "inactive");

    store.user_soft_delete(id).unwrap();
    assert_eq!(store.user_get_by_id(id).unwrap().status, "deleted");
    assert_eq!(store.user_count_filtered(&UserFilter::default()), 0);
}

#[test]
fn user_email_taken_ignores_case_and_self() {
    let store = test_store();
    let id = create_user(&*store, "bob@example.com", "user");
    assert!(store.user_email_taken("BOB@example.com", None));
    assert!(!store.user_email_taken("bob@example.com", Some(id)));
    assert!(!store.user_email_taken("carol@example.com", None));
}

#[test]
fn user_filtered_listing() {
    let store = test_store();
    create_user(&*store, "agent1@example.com", "agent");
    create_user(&*store, "agent2@example.com", "agent");
    let mgr = create_user(&*store, "manager@example.com", "manager");
    store.user_set_status(mgr, "inactive").unwrap();

    let agents = UserFilter { role: "agent".into(), ..Default::default() };
    assert_eq!(store.user_count_filtered(&agents), 2);

    let inactive = UserFilter { status: "inactive".into(), ..Default::default() };
    let found = store.user_list_filtered(&inactive, 10, 0);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].email, "manager@example.com");

    let search = UserFilter { search: "agent2".into(), ..Default::default() };
    assert_eq!(store.user_count_filtered(&search), 1);

    assert_eq!(store.user_list_filtered(&UserFilter::default(), 2, 0).len(), 2);
    assert_eq!(store.user_list_filtered(&UserFilter::default(), 2, 2).len(), 1);
}

#[test]
fn user_stats_counts() {
    let store = test_store();
    create_user(&*store, "a@example.com", "user");
    let b = create_user(&*store, "b@example.com", "user");
    let c = create_user(&*store, "c@example.com", "user");
    store.user_set_status(b, "locked").unwrap();
    store.user_soft_delete(c).unwrap();

    let stats = store.user_stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.active, 1);
    assert_eq!(stats.locked, 1);
    assert_eq!(stats.new_today, 2);
}

#[test]
fn user_failed_logins_lock_and_unlock() {
    let store = test_store();
    let id = create_user(&*store, "lock@example.com", "user");
    for _ in 0..2 {
        store.user_record_failed_login(id, 3, 30).unwrap();
    }
    assert_eq!(store.user_get_by_id(id).unwrap().status, "active");
    let attempts = store.user_record_failed_login(id, 3, 30).unwrap();
    assert_eq!(attempts, 3);
    let user = store.user_get_by_id(id).unwrap();
    assert_eq!(user.status, "locked");
    assert!(user.locked_until.is_some());
    assert!(!store.user_release_expired_lock(id).unwrap());

    store.user_unlock(id).unwrap();
    let user = store.user_get_by_id(id).unwrap();
    assert_eq!(user.status, "active");
    assert_eq!(user.failed_login_attempts, 0);
}

#[test]
fn user_successful_login_resets_counter() {
    let store = test_store();
    let id = create_user(&*store, "ok@example.com", "user");
    store.user_record_failed_login(id, 5, 30).unwrap();
    store.user_record_successful_login(id).unwrap();
    let user = store.user_get_by_id(id).unwrap();
    assert_eq!(user.failed_login_attempts, 0);
    assert!(user.last_login.is_some());
}

#[test]
fn user_lockout_window() {
    let now = ts("2024-06-01 12:00:00");
    let recent = test_user("active", 5, Some("2024-06-01 11:50:00"), None);
    assert!(recent.is_locked_out(5, 30, now));
    let expired = test_user("active", 5, Some("2024-06-01 11:00:00"), None);
    assert!(!expired.is_locked_out(5, 30, now));
    let few = test_user("active", 2, Some("2024-06-01 11:59:00"), None);
    assert!(!few.is_locked_out(5, 30, now));
    assert!(test_user("locked", 0, None, None).is_locked_out(5, 30, now));
}

#[test]
fn user_security_level() {
    let now = ts("2024-06-01 12:00:00");
    assert_eq!(test_user("active", 0, None, Some("2024-05-20 09:00:00")).security_level(now), "high");
    assert_eq!(test_user("active", 0, None, None).security_level(now), "medium");
    assert_eq!(test_user("locked", 4, None, None).security_level(now), "low");
}

#[test]
fn user_safe_json_hides_secrets() {
    let user = test_user("active", 0, None, None);
    let v = user.safe_json();
    assert!(v.get("password_hash").is_none());
    assert!(v.get("two_factor_secret").is_none());
    assert_eq!(v["email"], "jane@example.com");
    assert!(v.get("security_level").is_some());
}

#[test]
fn user_must_change_password() {
    let mut user = test_user("active", 0, None, None);
    assert!(!user.must_change_password());
    user.password_reset_required = true;
    assert!(user.must_change_password());
}

// ═══════════════════════════════════════════════════════════
// Users panel helpers
// ═══════════════════════════════════════════════════════════

#[test]
fn users_form_defaults_role_and_status() {
    let f = form(&[("first_name", "Ann"), ("last_name", "Lee"), ("email", "ANN@Example.com")]);
    let u = admin::users::user_form(&f).unwrap();
    assert_eq!(u.email, "ann@example.com");
    assert_eq!(u.role, "user");
    assert_eq!(u.status, "active");
}

#[test]
fn users_form_rejects_bad_input() {
    let missing = form(&[("first_name", "Ann"), ("email", "ann@example.com")]);
    assert!(admin::users::user_form(&missing).is_err());

    let bad_email = form(&[("first_name", "A"), ("last_name", "B"), ("email", "not-an-email")]);
    assert_eq!(admin::users::user_form(&bad_email).unwrap_err(), "Please enter a valid email address.");

    let bad_role = form(&[("first_name", "A"), ("last_name", "B"), ("email", "a@b.co"), ("role", "root")]);
    assert_eq!(admin::users::user_form(&bad_role).unwrap_err(), "Invalid role.");

    let locked = form(&[("first_name", "A"), ("last_name", "B"), ("email", "a@b.co"), ("status", "locked")]);
    assert_eq!(admin::users::user_form(&locked).unwrap_err(), "Invalid status.");
}

#[test]
fn users_parse_ids() {
    assert_eq!(admin::users::parse_ids("3, 1,3,abc,,-2,7"), vec![3, 1, 7]);
    assert!(admin::users::parse_ids("").is_empty());
}

#[test]
fn users_total_pages() {
    assert_eq!(admin::users::total_pages(0, 20), 1);
    assert_eq!(admin::users::total_pages(20, 20), 1);
    assert_eq!(admin::users::total_pages(21, 20), 2);
}

#[test]
fn users_last_admin_is_protected() {
    let store = test_store();
    let only = create_user(&*store, "root@example.com", "admin");
    let target = store.user_get_by_id(only).unwrap();
    assert!(admin::users::removes_last_admin(&*store, &target, "manager", "active"));
    assert!(admin::users::removes_last_admin(&*store, &target, "admin", "inactive"));
    assert!(!admin::users::removes_last_admin(&*store, &target, "admin", "active"));

    create_user(&*store, "second@example.com", "admin");
    assert!(!admin::users::removes_last_admin(&*store, &target, "user", "active"));
}

#[test]
fn users_bulk_skips_acting_admin() {
    let store = test_store();
    let me = create_user(&*store, "me@example.com", "admin");
    let a = create_user(&*store, "a@example.com", "user");
    let b = create_user(&*store, "b@example.com", "user");
    let guard = admin_guard(&*store, me);

    let done = admin::users::run_bulk(&store, &guard, "deactivate", &[me, a, b, 999]);
    assert_eq!(done, 2);
    assert_eq!(store.user_get_by_id(me).unwrap().status, "active");
    assert_eq!(store.user_get_by_id(a).unwrap().status, "inactive");

    let done = admin::users::run_bulk(&store, &guard, "activate", &[a, b]);
    assert_eq!(done, 2);
    assert_eq!(store.user_get_by_id(b).unwrap().status, "active");

    let done = admin::users::run_bulk(&store, &guard, "delete", &[b]);
    assert_eq!(done, 1);
    assert_eq!(store.user_get_by_id(b).unwrap().status, "deleted");
}

#[test]
fn users_bulk_keeps_one_admin() {
    let store = test_store();
    let me = create_user(&*store, "me@example.com", "admin");
    let other = create_user(&*store, "other@example.com", "admin");
    let guard = admin_guard(&*store, me);
    // Deactivating `other` leaves `me` as the active admin, so it is allowed.
    assert_eq!(admin::users::run_bulk(&store, &guard, "deactivate", &[other]), 1);

    store.user_set_status(me, "inactive").unwrap();
    store.user_set_status(other, "active").unwrap();
    assert_eq!(admin::users::run_bulk(&store, &guard, "delete", &[other]), 0);
    assert_eq!(store.user_get_by_id(other).unwrap().status, "active");
}

#[test]
fn users_deleted_account_stays_deleted() {
    let store = test_store();
    let me = create_user(&*store, "me@example.com", "admin");
    let gone = create_user(&*store, "gone@example.com", "user");
    let guard = admin_guard(&*store, me);
    store.user_soft_delete(gone).unwrap();

    assert!(admin::users::live_user(&*store, gone).is_none());
    for op in ["unlock", "activate", "deactivate", "delete"] {
        assert_eq!(admin::users::run_bulk(&store, &guard, op, &[gone]), 0, "{}", op);
    }
    store.user_unlock(gone).unwrap();
    store.user_set_status(gone, "active").unwrap();
    store
        .user_update(gone, &user_form_for("gone@example.com", "user", "active"))
        .unwrap();

    assert_eq!(store.user_get_by_id(gone).unwrap().status, "deleted");
    let listed = store.user_list_filtered(&UserFilter::default(), 50, 0);
    assert!(listed.iter().all(|u| u.id != gone));
}

// ═══════════════════════════════════════════════════════════
// Sessions, CSRF, auth helpers
// ═══════════════════════════════════════════════════════════

#[test]
fn session_create_get_delete() {
    let store = test_store();
    let uid = create_user(&*store, "s@example.com", "admin");
    store
        .session_create("sess1", uid, "csrf-abc", "2099-01-01 00:00:00", Some("iphash"), Some("ua"))
        .unwrap();
    let (session, user) = store.session_get_user("sess1").unwrap();
    assert_eq!(session.csrf_token, "csrf-abc");
    assert_eq!(user.id, uid);

    store.session_delete_for_user(uid).unwrap();
    assert!(store.session_get("sess1").is_none());
}

#[test]
fn session_expired_is_invisible_and_cleaned() {
    let store = test_store();
    let uid = create_user(&*store, "old@example.com", "admin");
    store
        .session_create("old", uid, "t", "2000-01-01 00:00:00", None, None)
        .unwrap();
    assert!(store.session_get("old").is_none());
    assert_eq!(store.session_cleanup_expired().unwrap(), 1);
}

#[test]
fn csrf_verify() {
    let session = Session {
        id: "s".into(),
        user_id: 1,
        csrf_token: csrf::generate_token(),
        expires_at: String::new(),
    };
    let token = session.csrf_token.clone();
    assert_eq!(token.len(), 64);
    assert!(csrf::verify(&session, Some(token.as_str())));
    assert!(!csrf::verify(&session, Some("wrong")));
    assert!(!csrf::verify(&session, Some("")));
    assert!(!csrf::verify(&session, None));
}

#[test]
fn auth_ip_whitelist() {
    assert!(auth::ip_allowed("", "10.0.0.1"));
    assert!(auth::ip_allowed("10.0.0.1, 192.168.1.5", "192.168.1.5"));
    assert!(!auth::ip_allowed("10.0.0.1", "10.0.0.2"));
}

#[test]
fn auth_temp_password_and_hashing() {
    let pw = auth::generate_temp_password();
    assert_eq!(pw.chars().count(), 12);
    let hash = fast_hash(&pw);
    assert!(auth::verify_password(&pw, &hash));
    assert!(!auth::verify_password("wrong", &hash));
    assert_eq!(auth::hash_ip("1.2.3.4"), auth::hash_ip("1.2.3.4"));
    assert_ne!(auth::hash_ip("1.2.3.4"), "1.2.3.4");
}

#[test]
fn auth_password_min_length_is_clamped() {
    let store = test_store();
    assert_eq!(auth::password_min_length(&*store), 8);
    store.setting_set("password_min_length", "2", None).unwrap();
    assert_eq!(auth::password_min_length(&*store), 6);
}

// ═══════════════════════════════════════════════════════════
// MFA
// ═══════════════════════════════════════════════════════════

#[test]
fn mfa_verify_current_code() {
    let secret = mfa::generate_secret();
    let code = mfa::current_code(&secret);
    assert_eq!(code.len(), 6);
    assert!(mfa::verify_code(&secret, &code));
}

#[test]
fn mfa_rejects_malformed_codes() {
    let secret = mfa::generate_secret();
    assert!(!mfa::verify_code(&secret, "12345"));
    assert!(!mfa::verify_code(&secret, "abcdef"));
    assert!(!mfa::verify_code("not base32 !!", "123456"));
}

#[test]
fn mfa_qr_is_png_data_uri() {
    let secret = mfa::generate_secret();
    let uri = mfa::qr_data_uri(&secret, "admin@loanflow.com").unwrap();
    assert!(uri.starts_with("data:image/png;base64,"));
}

// ═══════════════════════════════════════════════════════════
// Captcha & rate limiting
// ═══════════════════════════════════════════════════════════

#[test]
fn captcha_math_answer() {
    assert!(captcha::check_math_answer(Some("7:1000"), " 7 ", 1100));
    assert!(!captcha::check_math_answer(Some("7:1000"), "8", 1100));
    assert!(!captcha::check_math_answer(Some("7:1000"), "7", 1400));
    assert!(!captcha::check_math_answer(Some("garbage"), "7", 1000));
    assert!(!captcha::check_math_answer(None, "7", 1000));
}

#[test]
fn captcha_math_challenge_is_consistent() {
    for _ in 0..50 {
        let c = captcha::generate_math_challenge();
        assert!(c.answer >= 0 && c.answer <= 20);
        let parts: Vec<&str> = c.question.split(' ').collect();
        let (a, b): (i64, i64) = (parts[0].parse().unwrap(), parts[2].parse().unwrap());
        let expected = if parts[1] == "+" { a + b } else { a - b };
        assert_eq!(expected, c.answer);
    }
}

#[test]
fn captcha_config_from_settings() {
    let mut s = HashMap::new();
    s.insert("captcha_enabled".to_string(), "1".to_string());
    s.insert("captcha_provider".to_string(), "hcaptcha".to_string());
    s.insert("hcaptcha_site_key".to_string(), "site".to_string());
    s.insert("hcaptcha_secret_key".to_string(), "secret".to_string());
    s.insert("captcha_protected_forms".to_string(), "login, contact".to_string());
    let cfg = captcha::CaptchaConfig::from_settings(&s);
    assert_eq!(cfg.provider, "hcaptcha");
    assert_eq!(cfg.site_key, "site");
    assert!(cfg.protects("login"));
    assert!(cfg.protects("contact"));
    assert!(!cfg.protects("register"));

    s.insert("captcha_provider".to_string(), "unknown".to_string());
    assert_eq!(captcha::CaptchaConfig::from_settings(&s).provider, "custom");
    s.insert("captcha_enabled".to_string(), "0".to_string());
    assert!(!captcha::CaptchaConfig::from_settings(&s).protects("login"));
}

#[test]
fn rate_limiter_blocks_after_limit() {
    let rl = RateLimiter::new();
    let window = Duration::from_secs(60);
    for _ in 0..3 {
        assert!(rl.check_and_record("login:ip", 3, window));
    }
    assert!(!rl.check_and_record("login:ip", 3, window));
    assert_eq!(rl.remaining("login:ip", 3, window), 0);
    assert_eq!(rl.remaining("login:other", 3, window), 3);

    rl.reset("login:ip");
    assert!(rl.check_and_record("login:ip", 3, window));
}

#[test]
fn rate_limiter_cleanup_drops_stale_keys() {
    let rl = RateLimiter::new();
    rl.check_and_record("a", 5, Duration::from_secs(60));
    assert_eq!(rl.cleanup(Duration::from_secs(60)), 1);
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(rl.cleanup(Duration::from_millis(1)), 0);
}

// ═══════════════════════════════════════════════════════════
// Audit log
// ═══════════════════════════════════════════════════════════

#[test]
fn audit_log_and_filter() {
    let store = test_store();
    store.audit_log(
        &AuditEvent::new("update_user", "user")
            .by(1, "Admin", "127.0.0.1")
            .entity(Some(5), "x@example.com")
            .details("role admin"),
    );
    store.audit_log(&AuditEvent::new("clear_cache", "system").by(1, "Admin", "127.0.0.1"));

    assert_eq!(store.audit_count(None), 2);
    let users = store.audit_list(Some("user"), 10, 0);
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].action, "update_user");
    assert_eq!(users[0].entity_id, Some(5));
    assert_eq!(users[0].details.as_deref(), Some("role admin"));
    assert_eq!(users[0].user_name.as_deref(), Some("Admin"));
}

#[test]
fn audit_cleanup_keeps_recent() {
    let store = test_store();
    store.audit_log(&AuditEvent::new("login", "user"));
    assert_eq!(store.audit_cleanup(90).unwrap(), 0);
    assert_eq!(store.audit_count(None), 1);
}

// ═══════════════════════════════════════════════════════════
// Export
// ═══════════════════════════════════════════════════════════

fn sample_records() -> Records {
    Records {
        columns: vec!["id".into(), "name".into(), "loan amount".into()],
        rows: vec![
            vec![json!(1), json!("Doe, John"), json!(2500.5)],
            vec![json!(2), json!("A & B <Co>"), Value::Null],
        ],
    }
}

#[test]
fn export_format_parse() {
    assert_eq!(ExportFormat::parse(""), Some(ExportFormat::Csv));
    assert_eq!(ExportFormat::parse("json"), Some(ExportFormat::Json));
    assert_eq!(ExportFormat::parse("xml"), Some(ExportFormat::Xml));
    assert_eq!(ExportFormat::parse("pdf"), None);
}

#[test]
fn export_csv_quotes_and_nulls() {
    let csv = export::to_csv(&sample_records()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "id,name,loan amount");
    assert_eq!(lines[1], "1,\"Doe, John\",2500.5");
    assert_eq!(lines[2], "2,A & B <Co>,");
}

#[test]
fn export_csv_empty() {
    assert_eq!(export::to_csv(&Records::default()).unwrap(), export::EMPTY_CSV);
}

#[test]
fn export_json_keeps_column_names() {
    let out = export::to_json(&sample_records()).unwrap();
    let parsed: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(parsed[0]["name"], "Doe, John");
    assert_eq!(parsed[0]["loan amount"], 2500.5);
    assert!(parsed[1]["loan amount"].is_null());
}

#[test]
fn export_xml_sanitizes_and_escapes() {
    let xml = export::to_xml(&sample_records(), "analytics_export").unwrap();
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
    assert!(xml.contains("<analytics_export>"));
    assert!(xml.contains("<loan_amount>2500.5</loan_amount>"));
    assert!(xml.contains("A &amp; B &lt;Co&gt;"));
    assert_eq!(xml.matches("<record>").count(), 2);
}

#[test]
fn export_records_from_json_rows() {
    let items = vec![json!({"id": 1, "email": "a@b.co", "secret": "x"})];
    let r = Records::from_json_rows(&["id", "email", "missing"], &items);
    assert_eq!(r.columns, vec!["id", "email", "missing"]);
    assert_eq!(r.rows[0], vec![json!(1), json!("a@b.co"), Value::Null]);
}

#[test]
fn export_filename_format() {
    let now = ts("2024-03-05 14:07:09");
    assert_eq!(
        export::export_filename("users_export", now, ExportFormat::Xml),
        "users_export_2024-03-05_14-07-09.xml"
    );
}

#[test]
fn users_export_columns_exclude_secrets() {
    assert!(!admin::users::EXPORT_COLUMNS.contains(&"password_hash"));
    assert!(!admin::users::EXPORT_COLUMNS.contains(&"two_factor_secret"));
}

// ═══════════════════════════════════════════════════════════
// Analytics
// ═══════════════════════════════════════════════════════════

fn insert_loan(pool: &DbPool, email: &str, amount: f64, status: &str, created: &str) {
    let conn = pool.get().unwrap();
    conn.execute(
        "INSERT INTO loan_applications (first_name, last_name, email, loan_amount, application_status, created_at)
         VALUES ('F', 'L', ?1, ?2, ?3, ?4)",
        rusqlite::params![email, amount, status, created],
    )
    .unwrap();
}

#[test]
fn analytics_default_rate() {
    assert_eq!(default_rate(0, 0), 0.0);
    assert_eq!(default_rate(1, 3), 33.33);
    assert_eq!(default_rate(1, 4), 25.0);
}

#[test]
fn analytics_overview_and_distribution() {
    let pool = test_pool();
    insert_loan(&pool, "a@x.com", 1000.0, "approved", "2024-01-10 10:00:00");
    insert_loan(&pool, "a@x.com", 3000.0, "approved", "2024-02-10 10:00:00");
    insert_loan(&pool, "b@x.com", 500.0, "defaulted", "2024-02-11 10:00:00");
    insert_loan(&pool, "c@x.com", 700.0, "pending", "2024-02-12 10:00:00");
    let store = SqliteStore::new(pool);

    let o = store.analytics_overview();
    assert_eq!(o.total_loans, 2);
    assert_eq!(o.total_amount, 4000.0);
    assert_eq!(o.total_customers, 3);
    assert_eq!(o.default_rate, 50.0);

    let dist = store.analytics_status_distribution();
    let total: i64 = dist.iter().map(|d| d.count).sum();
    assert_eq!(total, 4);
}

#[test]
fn analytics_export_by_category_and_range() {
    let pool = test_pool();
    insert_loan(&pool, "a@x.com", 1000.0, "approved", "2024-01-10 10:00:00");
    insert_loan(&pool, "a@x.com", 3000.0, "approved", "2024-02-10 10:00:00");
    insert_loan(&pool, "b@x.com", 500.0, "pending", "2024-03-01 10:00:00");
    let store = SqliteStore::new(pool);

    let all = store.analytics_export(ExportCategory::Loans, &DateRange::default()).unwrap();
    assert_eq!(all.rows.len(), 3);
    assert_eq!(all.columns[0], "id");

    let feb = DateRange { from: Some("2024-02-01".into()), to: Some("2024-02-29".into()) };
    assert_eq!(store.analytics_export(ExportCategory::Loans, &feb).unwrap().rows.len(), 1);

    let customers = store.analytics_export(ExportCategory::Customers, &DateRange::default()).unwrap();
    assert_eq!(customers.rows.len(), 2);
    assert_eq!(store.analytics_export(ExportCategory::All, &feb).unwrap().rows.len(), 3);
}

#[test]
fn analytics_export_params() {
    assert_eq!(ExportCategory::parse(""), Some(ExportCategory::All));
    assert_eq!(ExportCategory::parse("loans"), Some(ExportCategory::Loans));
    assert_eq!(ExportCategory::parse("all"), Some(ExportCategory::All));
    assert_eq!(ExportCategory::parse("payments"), None);

    use crate::routes::admin::analytics::parse_range;
    assert!(parse_range(None, None).unwrap().from.is_none());
    assert!(parse_range(Some("2024-01-01"), None).is_none());
    assert!(parse_range(Some("2024-01-01"), Some("2024-13-01")).is_none());
    let r = parse_range(Some(" 2024-01-01 "), Some("2024-01-31")).unwrap();
    assert_eq!(r.from.as_deref(), Some("2024-01-01"));
}

// ═══════════════════════════════════════════════════════════
// Edge network
// ═══════════════════════════════════════════════════════════

#[test]
fn edge_effective_defaults() {
    let s = admin::edge_network::effective_settings(&HashMap::new());
    assert_eq!(s["enabled"], json!(true));
    assert_eq!(s["cache_level"], json!("standard"));
    assert_eq!(s["hsts_max_age"], json!(31536000));
}

#[test]
fn edge_effective_overlays_stored() {
    let mut stored = HashMap::new();
    stored.insert("edge_enabled".to_string(), "0".to_string());
    stored.insert("edge_hsts_max_age".to_string(), "600".to_string());
    let s = admin::edge_network::effective_settings(&stored);
    assert_eq!(s["enabled"], json!(false));
    assert_eq!(s["hsts_max_age"], json!(600));
}

#[test]
fn edge_validate_form() {
    let f = form(&[("enabled", "1"), ("cache_level", "aggressive"), ("hsts_max_age", "")]);
    let rows = admin::edge_network::validate_edge_form(&f).unwrap();
    assert_eq!(rows["edge_enabled"], "1");
    assert_eq!(rows["edge_auto_scaling"], "0");
    assert_eq!(rows["edge_cache_level"], "aggressive");
    assert_eq!(rows["edge_compression_level"], "balanced");
    assert_eq!(rows["edge_hsts_max_age"], "31536000");

    let bad = form(&[("cache_level", "turbo")]);
    assert_eq!(admin::edge_network::validate_edge_form(&bad).unwrap_err(), "Invalid cache level.");
    let bad = form(&[("min_tls_version", "0.9")]);
    assert_eq!(
        admin::edge_network::validate_edge_form(&bad).unwrap_err(),
        "Invalid minimum TLS version."
    );
    let bad = form(&[("hsts_max_age", "-1")]);
    assert!(admin::edge_network::validate_edge_form(&bad).is_err());
}

// ═══════════════════════════════════════════════════════════
// Email components & composition
// ═══════════════════════════════════════════════════════════

fn component(kind: &str, name: &str, html: &str, is_default: bool) -> EmailComponentForm {
    EmailComponentForm {
        id: None,
        component_type: kind.to_string(),
        component_name: name.to_string(),
        html_content: html.to_string(),
        is_default,
    }
}

#[test]
fn email_component_default_is_exclusive() {
    let store = test_store();
    let a = store.email_component_save(&component("header", "A", "<h1>A</h1>", true)).unwrap();
    let b = store.email_component_save(&component("header", "B", "<h1>B</h1>", true)).unwrap();
    assert!(!store.email_component_get(a).unwrap().is_default);
    assert!(store.email_component_get(b).unwrap().is_default);
    assert_eq!(store.email_component_for_type("header").unwrap().id, b);
}

#[test]
fn email_component_update_toggle_delete() {
    let store = test_store();
    let id = store.email_component_save(&component("footer", "F", "<p>f</p>", false)).unwrap();
    let mut edit = component("footer", "F2", "<p>f2</p>", false);
    edit.id = Some(id);
    assert_eq!(store.email_component_save(&edit).unwrap(), id);
    assert_eq!(store.email_component_get(id).unwrap().component_name, "F2");

    let mut missing = edit.clone();
    missing.id = Some(9999);
    assert!(store.email_component_save(&missing).is_err());

    store.email_component_toggle(id).unwrap();
    assert!(store.email_component_for_type("footer").is_none());
    assert!(store.email_component_delete(id).unwrap());
    assert!(!store.email_component_delete(id).unwrap());
}

#[test]
fn email_component_form_validation() {
    let ok = form(&[
        ("component_type", "body"),
        ("component_name", "Main"),
        ("html_content", "  <p>Hi {customer_name}</p>\n"),
        ("is_default", "1"),
        ("component_id", "4"),
    ]);
    let c = admin::email_templates::component_form(&ok).unwrap();
    assert_eq!(c.id, Some(4));
    assert!(c.is_default);
    assert_eq!(c.html_content, "  <p>Hi {customer_name}</p>\n");

    let bad = form(&[("component_type", "banner"), ("component_name", "x"), ("html_content", "y")]);
    assert_eq!(admin::email_templates::component_form(&bad).unwrap_err(), "Invalid component type.");
    let blank = form(&[("component_type", "body"), ("component_name", "x"), ("html_content", "   ")]);
    assert_eq!(admin::email_templates::component_form(&blank).unwrap_err(), "HTML content is required.");
}

#[test]
fn email_variables_are_seeded() {
    let store = test_store();
    let vars = store.email_variables();
    assert!(vars.iter().any(|v| v.variable_name == "customer_name"));
    assert!(vars.iter().any(|v| v.variable_name == "current_year"));
}

#[test]
fn email_fill_placeholders() {
    let vars = vec![
        ("name".to_string(), "Jo".to_string()),
        ("company_name".to_string(), "LoanFlow".to_string()),
    ];
    assert_eq!(
        compose::fill_placeholders("Hi {name} from {company_name}, {unknown}", &vars),
        "Hi Jo from LoanFlow, {unknown}"
    );
}

#[test]
fn email_preview_document_width() {
    assert_eq!(compose::device_width("mobile"), 320);
    assert_eq!(compose::device_width("tablet"), 768);
    assert_eq!(compose::device_width("watch"), 1200);
    let doc = compose::preview_document("<p>x</p>", "mobile");
    assert!(doc.contains("max-width: 320px"));
    assert!(doc.contains("<p>x</p>"));
}

#[test]
fn email_preview_variables_use_site_settings() {
    let store = test_store();
    store.setting_set("site_name", "Acme Loans", None).unwrap();
    let vars = compose::preview_variables(&*store, ts("2024-07-04 15:30:00"));
    let get = |k: &str| vars.iter().find(|(n, _)| n == k).map(|(_, v)| v.clone()).unwrap();
    assert_eq!(get("company_name"), "Acme Loans");
    assert_eq!(get("inquiry_id"), "INQ-20240704-001");
    assert_eq!(get("current_year"), "2024");
    assert_eq!(get("inquiry_time"), "3:30 PM");
}

#[test]
fn email_complete_wraps_header_and_footer() {
    let store = test_store();
    store.email_component_save(&component("header", "H", "<header>{company_name}</header>", true)).unwrap();
    store.email_component_save(&component("footer", "F", "<footer>bye</footer>", true)).unwrap();
    let html = compose::build_complete_email(&*store, "<p>body</p>");
    assert!(html.contains("<header>LoanFlow</header>"));
    assert!(html.contains("<p>body</p>"));
    assert!(html.contains("<footer>bye</footer>"));
    assert!(html.find("<header>").unwrap() < html.find("<footer>").unwrap());
}

// ═══════════════════════════════════════════════════════════
// Fee templates
// ═══════════════════════════════════════════════════════════

fn fee_form(country: &str, method: &str) -> FeeTemplateForm {
    FeeTemplateForm {
        country: country.to_string(),
        payment_method: method.to_string(),
        template_name: "Processing fee".to_string(),
        instructions: "Send {amount} to {bank_name}".to_string(),
        email_template: "Dear {user_name}".to_string(),
        required_fields: RequiredFields { amount_sent: true, ..Default::default() },
        is_active: true,
    }
}

#[test]
fn fee_template_crud() {
    let store = test_store();
    let id = store.fee_template_create(&fee_form("US", "wire_transfer"), 1).unwrap();
    let t = store.fee_template_get(id).unwrap();
    assert!(t.required_fields.amount_sent);
    assert!(!t.required_fields.date_sent);
    assert!(t.is_active);

    let mut edit = fee_form("CA", "crypto");
    edit.template_name = "Renamed".to_string();
    edit.is_active = false;
    assert!(store.fee_template_update(id, &edit).unwrap());
    let t = store.fee_template_get(id).unwrap();
    assert_eq!(t.template_name, "Renamed");
    assert_eq!(t.country, "US");
    assert!(!t.is_active);

    store.fee_template_toggle(id).unwrap();
    assert!(store.fee_template_get(id).unwrap().is_active);
    store.fee_template_delete(id).unwrap();
    assert!(store.fee_template_get(id).is_none());
}

#[test]
fn fee_template_duplicate_pair_rejected() {
    let store = test_store();
    store.fee_template_create(&fee_form("US", "crypto"), 1).unwrap();
    assert_eq!(
        store.fee_template_create(&fee_form("US", "crypto"), 1).unwrap_err(),
        DUPLICATE_TEMPLATE
    );
    assert!(store.fee_template_create(&fee_form("GB", "crypto"), 1).is_ok());
}

#[test]
fn fee_template_in_use_cannot_be_deleted() {
    let pool = test_pool();
    {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO fee_sent_forms (country, payment_method, amount) VALUES ('DE', 'e_transfer', 50)",
            [],
        )
        .unwrap();
    }
    let store = SqliteStore::new(pool);
    let id = store.fee_template_create(&fee_form("DE", "e_transfer"), 1).unwrap();
    let err = store.fee_template_delete(id).unwrap_err();
    assert!(err.contains("1 fee forms"));
    assert!(store.fee_template_get(id).is_some());
}

#[test]
fn fee_template_form_validation() {
    let base = [
        ("country", "us"),
        ("payment_method", "wire_transfer"),
        ("template_name", "T"),
        ("instructions", "I"),
        ("email_template", "E"),
        ("require_date_sent", "1"),
    ];
    let t = admin::fee_templates::template_form(&form(&base), true).unwrap();
    assert_eq!(t.country, "US");
    assert!(t.is_active);
    assert!(t.required_fields.date_sent);
    assert!(!t.required_fields.amount_sent);

    let update = admin::fee_templates::template_form(&form(&base), false).unwrap();
    assert!(!update.is_active);

    let mut bad = base.to_vec();
    bad[0] = ("country", "ZZ");
    assert_eq!(
        admin::fee_templates::template_form(&form(&bad), true).unwrap_err(),
        "Invalid country selected."
    );
    // Updates never look at the target pair.
    assert!(admin::fee_templates::template_form(&form(&bad), false).is_ok());
}

#[test]
fn fee_template_preview_substitution() {
    let sample = admin::fee_templates::preview_sample();
    let out = compose::fill_placeholders("Pay {amount} to {bank_name} for {application_id}", &sample);
    assert_eq!(out, "Pay $2,500.00 to Sample Bank for LA-2024-001");
}

// ═══════════════════════════════════════════════════════════
// Payment methods
// ═══════════════════════════════════════════════════════════

fn unsaved_config(method: &str) -> PaymentMethodConfig {
    PaymentMethodConfig {
        method_name: method.into(),
        is_enabled: false,
        allowed_countries: vec![],
        config_data: default_config(method),
        instructions: String::new(),
        email_template: String::new(),
        updated_at: None,
    }
}

#[test]
fn payment_config_defaults_when_unsaved() {
    let store = test_store();
    let cfg = store.payment_config_get("wire_transfer");
    assert!(!cfg.is_enabled);
    assert_eq!(cfg.config_data["max_file_size"], json!(10));
    assert_eq!(cfg.config_data["allowed_file_types"], json!("jpg,jpeg,png,pdf"));
}

#[test]
fn payment_config_upsert_roundtrip() {
    let store = test_store();
    let f = form(&[("wallet_address", "bc1qxyz"), ("show_qr_code", "1"), ("required_confirmations", "6")]);
    let data = admin::payment_methods::build_config_data("crypto", &f, &store.payment_config_get("crypto")).unwrap();
    let cfg = PaymentMethodConfig {
        method_name: "crypto".into(),
        is_enabled: true,
        allowed_countries: vec!["US".into(), "CA".into()],
        config_data: data,
        instructions: "Send BTC".into(),
        email_template: String::new(),
        updated_at: None,
    };
    store.payment_config_upsert(&cfg).unwrap();
    let loaded = store.payment_config_get("crypto");
    assert!(loaded.is_enabled);
    assert_eq!(loaded.allowed_countries, vec!["US", "CA"]);
    assert_eq!(loaded.config_data["show_qr_code"], json!(true));
    assert_eq!(loaded.config_data["auto_complete_enabled"], json!(false));
    assert_eq!(loaded.config_data["required_confirmations"], json!(6));
    assert_eq!(loaded.config_data["currency_type"], json!("BTC"));
    assert!(loaded.updated_at.is_some());
}

#[test]
fn payment_config_data_validation() {
    let bad = form(&[("payment_timeout", "soon")]);
    assert_eq!(
        admin::payment_methods::build_config_data("credit_card", &bad, &unsaved_config("credit_card")).unwrap_err(),
        "Field payment_timeout must be a whole number."
    );
    assert_eq!(
        admin::payment_methods::build_config_data("cash", &form(&[]), &unsaved_config("cash")).unwrap_err(),
        "Invalid payment method."
    );
}

#[test]
fn payment_config_redacts_secrets() {
    let f = form(&[("stripe_secret_key", "sk_live_1"), ("stripe_publishable_key", "pk_1")]);
    let mut cfg = unsaved_config("credit_card");
    cfg.config_data = admin::payment_methods::build_config_data("credit_card", &f, &cfg).unwrap();
    let redacted = cfg.redacted_config();
    assert!(!redacted.contains_key("stripe_secret_key"));
    assert!(!redacted.contains_key("paypal_secret"));
    assert_eq!(redacted["stripe_publishable_key"], json!("pk_1"));
}

#[test]
fn payment_secrets_are_not_rendered_and_blank_keeps_stored() {
    let store = test_store();
    let first = form(&[("stripe_secret_key", "sk_live_123"), ("stripe_publishable_key", "pk_1")]);
    let mut cfg = store.payment_config_get("credit_card");
    cfg.config_data = admin::payment_methods::build_config_data("credit_card", &first, &cfg).unwrap();
    store.payment_config_upsert(&cfg).unwrap();

    let saved = store.payment_config_get("credit_card");
    let fields = admin::payment_methods::form_fields(&saved);
    let secret = fields.iter().find(|f| f["name"] == "stripe_secret_key").unwrap();
    assert_eq!(secret["kind"], json!("secret"));
    assert_eq!(secret["is_set"], json!(true));
    assert!(secret.get("value").is_none());
    let paypal = fields.iter().find(|f| f["name"] == "paypal_secret").unwrap();
    assert_eq!(paypal["is_set"], json!(false));
    let public = fields.iter().find(|f| f["name"] == "stripe_publishable_key").unwrap();
    assert_eq!(public["value"], json!("pk_1"));
    assert!(!serde_json::to_string(&fields).unwrap().contains("sk_live_123"));

    let resubmit = form(&[("stripe_publishable_key", "pk_2")]);
    let data = admin::payment_methods::build_config_data("credit_card", &resubmit, &saved).unwrap();
    assert_eq!(data["stripe_secret_key"], json!("sk_live_123"));
    assert_eq!(data["stripe_publishable_key"], json!("pk_2"));

    let replaced = form(&[("stripe_secret_key", "sk_live_456")]);
    let data = admin::payment_methods::build_config_data("credit_card", &replaced, &saved).unwrap();
    assert_eq!(data["stripe_secret_key"], json!("sk_live_456"));
}

#[test]
fn payment_parse_countries() {
    assert_eq!(
        admin::payment_methods::parse_countries("us, ca,US,,gb").unwrap(),
        vec!["US", "CA", "GB"]
    );
    assert_eq!(
        admin::payment_methods::parse_countries("US,XX").unwrap_err(),
        "Unknown country code: XX"
    );
    assert!(admin::payment_methods::parse_countries("").unwrap().is_empty());
}

#[test]
fn payment_subscription_replaces_scheme() {
    let store = test_store();
    let admin_id = create_user(&*store, "boss@example.com", "admin");
    let customer = create_user(&*store, "cust@example.com", "user");
    store.payment_scheme_assign_subscription(customer, admin_id).unwrap();
    store.payment_scheme_assign_subscription(customer, admin_id).unwrap();
    let scheme = store.payment_scheme_get(customer).unwrap();
    assert_eq!(scheme.scheme_type, "subscription");
    assert_eq!(scheme.assigned_by, admin_id);
    assert!(scheme.requires_2fa);
}

#[test]
fn payment_stats_grouping() {
    let pool = test_pool();
    {
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "INSERT INTO payments (amount, payment_method, payment_type, status) VALUES (100, 'crypto', 'fee', 'completed');
             INSERT INTO payments (amount, payment_method, payment_type, status) VALUES (50, 'crypto', 'fee', 'pending');
             INSERT INTO payments (amount, payment_method, payment_type, status) VALUES (25, 'wire_transfer', 'subscription', 'completed');",
        )
        .unwrap();
    }
    let stats = SqliteStore::new(pool).payment_stats();
    let crypto = stats.by_method.iter().find(|g| g.key == "crypto").unwrap();
    assert_eq!(crypto.count, 2);
    assert_eq!(crypto.total_amount, 150.0);
    let completed = stats.by_status.iter().find(|g| g.key == "completed").unwrap();
    assert_eq!(completed.count, 2);
    assert_eq!(stats.by_type.len(), 2);
}

#[test]
fn payment_two_factor_pending_secret() {
    let store = test_store();
    let id = create_user(&*store, "tfa@example.com", "admin");
    let secret = mfa::generate_secret();
    store.user_update_two_factor(id, false, &secret).unwrap();
    let user = store.user_get_by_id(id).unwrap();
    assert!(!user.two_factor_enabled);
    assert!(mfa::verify_code(&user.two_factor_secret, &mfa::current_code(&secret)));
    store.user_update_two_factor(id, true, &secret).unwrap();
    assert!(store.user_get_by_id(id).unwrap().two_factor_enabled);
}

// ═══════════════════════════════════════════════════════════
// SEO automation
// ═══════════════════════════════════════════════════════════

#[test]
fn seo_activity_lookup() {
    let (title, _) = seo::activity_for("generate_sitemap").unwrap();
    assert!(!title.is_empty());
    assert!(seo::activity_for("update_seo_settings").is_none());
    assert!(seo::activity_for("hack_google").is_none());
}

#[test]
fn seo_activity_record_and_recent() {
    let store = test_store();
    store.seo_activity_record("First", "one").unwrap();
    store.seo_activity_record("Second", "two").unwrap();
    let recent = store.seo_activity_recent(1);
    assert_eq!(recent.len(), 1);
    assert_eq!(store.seo_activity_recent(10).len(), 2);
}

#[test]
fn seo_settings_rows_keep_blank_secrets_out() {
    let f = form(&[
        ("seo_auto_backlinks", "1"),
        ("seo_target_keywords", "personal loans, quick loans"),
        ("seo_semrush_api_key", ""),
        ("seo_ahrefs_api_key", "ahrefs-key"),
    ]);
    let rows = admin::seo_automation::seo_settings_rows(&f);
    assert_eq!(rows["seo_auto_backlinks"], "1");
    assert_eq!(rows["seo_auto_technical_fixes"], "0");
    assert_eq!(rows["seo_target_keywords"], "personal loans, quick loans");
    assert!(!rows.contains_key("seo_semrush_api_key"));
    assert_eq!(rows["seo_ahrefs_api_key"], "ahrefs-key");
}

#[test]
fn sitemap_lists_public_pages() {
    let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let xml = sitemap::generate_sitemap("https://loans.example.com/", day);
    assert!(xml.starts_with("<?xml"));
    assert_eq!(xml.matches("<url>").count(), sitemap::PUBLIC_PAGES.len());
    assert!(xml.contains("<loc>https://loans.example.com/</loc>"));
    assert!(xml.contains("<loc>https://loans.example.com/apply</loc>"));
    assert!(xml.contains("<lastmod>2024-05-01</lastmod>"));
}

#[test]
fn sitemap_escapes_site_url() {
    let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let xml = sitemap::generate_sitemap("https://example.com/?a=1&b=2", day);
    assert!(xml.contains("a=1&amp;b=2"));
}

#[test]
fn sitemap_written_to_disk() {
    let dir = scratch_dir("sitemap");
    let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let path = sitemap::write_sitemap(&dir, "https://x.example", day).unwrap();
    let body = std::fs::read_to_string(&path).unwrap();
    assert!(body.contains("https://x.example/rates"));
    std::fs::remove_dir_all(&dir).ok();
}

// ═══════════════════════════════════════════════════════════
// System settings
// ═══════════════════════════════════════════════════════════

#[test]
fn system_general_rows() {
    use crate::routes::admin::system_settings::general_rows;
    let ok = form(&[
        ("site_name", "LoanFlow"),
        ("site_email", "info@loanflow.com"),
        ("timezone", "Europe/Berlin"),
        ("currency", "eur"),
        ("maintenance_mode", "1"),
    ]);
    let rows = general_rows(&ok).unwrap();
    assert_eq!(rows["currency"], "EUR");
    assert_eq!(rows["maintenance_mode"], "1");
    assert_eq!(rows["date_format"], "Y-m-d");

    assert!(general_rows(&form(&[("site_name", "")])).is_err());
    assert_eq!(
        general_rows(&form(&[("site_name", "X"), ("timezone", "Mars/Olympus")])).unwrap_err(),
        "Unknown timezone."
    );
    assert!(general_rows(&form(&[("site_name", "X"), ("currency", "EURO")])).is_err());
    assert!(general_rows(&form(&[("site_name", "X"), ("date_format", "YYYY")])).is_err());
}

#[test]
fn system_email_rows() {
    use crate::routes::admin::system_settings::email_rows;
    let rows = email_rows(&form(&[("smtp_host", "smtp.example.com"), ("smtp_encryption", "SSL")])).unwrap();
    assert_eq!(rows["smtp_port"], "587");
    assert_eq!(rows["smtp_encryption"], "ssl");
    assert!(!rows.contains_key("smtp_password"));

    let rows = email_rows(&form(&[("smtp_password", "hunter2")])).unwrap();
    assert_eq!(rows["smtp_password"], "hunter2");

    assert!(email_rows(&form(&[("smtp_port", "70000")])).is_err());
    assert!(email_rows(&form(&[("smtp_encryption", "starttls")])).is_err());
}

#[test]
fn system_security_rows() {
    use crate::routes::admin::system_settings::security_rows;
    let rows = security_rows(&form(&[("ip_whitelist", " 10.0.0.1 ,::1,"), ("require_2fa", "1")])).unwrap();
    assert_eq!(rows["ip_whitelist"], "10.0.0.1,::1");
    assert_eq!(rows["require_2fa"], "1");
    assert_eq!(rows["enable_audit_log"], "0");
    assert_eq!(rows["max_login_attempts"], "5");

    assert_eq!(
        security_rows(&form(&[("ip_whitelist", "10.0.0.300")])).unwrap_err(),
        "Invalid IP address in whitelist: 10.0.0.300"
    );
    assert!(security_rows(&form(&[("session_timeout", "2")])).is_err());
    assert!(security_rows(&form(&[("password_min_length", "200")])).is_err());
}

#[test]
fn system_captcha_and_backup_rows() {
    use crate::routes::admin::system_settings::{backup_rows, captcha_rows};
    let rows = captcha_rows(&form(&[("captcha_provider", "recaptcha"), ("captcha_protected_forms", "Login, CONTACT")])).unwrap();
    assert_eq!(rows["captcha_protected_forms"], "login,contact");
    assert!(captcha_rows(&form(&[("captcha_provider", "turnstile")])).is_err());

    let rows = backup_rows(&form(&[("backup_schedule_day", "Friday"), ("backup_max_retention", "0")])).unwrap();
    assert_eq!(rows["backup_schedule_day"], "friday");
    assert_eq!(rows["backup_max_retention"], "0");
    assert_eq!(rows["backup_schedule_time"], "02:00");
    assert!(backup_rows(&form(&[("backup_max_retention", "53")])).is_err());
    assert!(backup_rows(&form(&[("backup_schedule_time", "25:00")])).is_err());
    assert!(backup_rows(&form(&[("backup_schedule_day", "someday")])).is_err());
}

#[test]
fn system_payment_rows_and_audit_keys() {
    use crate::routes::admin::system_settings::{audit_keys, payment_rows};
    let rows = payment_rows(&form(&[("stripe_enabled", "1"), ("stripe_secret_key", "sk"), ("paypal_client_secret", "")]));
    assert_eq!(rows["stripe_enabled"], "1");
    assert_eq!(rows["paypal_sandbox"], "0");
    assert!(rows.contains_key("stripe_secret_key"));
    assert!(!rows.contains_key("paypal_client_secret"));

    let keys = audit_keys(&rows);
    assert!(keys.contains("stripe_enabled"));
    assert!(!keys.contains("stripe_secret_key"));
}

#[test]
fn system_clear_dir() {
    use crate::routes::admin::system_settings::clear_dir;
    let dir = scratch_dir("cache");
    std::fs::write(format!("{}/a.cache", dir), "x").unwrap();
    std::fs::create_dir_all(format!("{}/nested", dir)).unwrap();
    std::fs::write(format!("{}/nested/b.cache", dir), "y").unwrap();
    assert_eq!(clear_dir(&dir).unwrap(), 2);
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
    std::fs::remove_dir_all(&dir).ok();
    assert_eq!(clear_dir(&dir).unwrap(), 0);
}

#[test]
fn store_ping_reports_version() {
    let store = test_store();
    let (version, size) = store.ping().unwrap();
    assert!(version.starts_with('3'));
    assert!(size > 0);
}

// ═══════════════════════════════════════════════════════════
// Backups
// ═══════════════════════════════════════════════════════════

#[test]
fn backup_naming() {
    let name = backup::backup_name(ts("2024-02-03 04:05:06"));
    assert_eq!(name, "loanflow_complete_2024-02-03_04-05-06");
    assert!(backup::is_valid_backup_name(&name));
    assert!(backup::is_valid_backup_name(&format!("{}.zip", name)));
    assert!(!backup::is_valid_backup_name("loanflow_complete_"));
    assert!(!backup::is_valid_backup_name("../etc/passwd"));
    assert!(!backup::is_valid_backup_name("loanflow_complete_../../x"));
    assert!(!backup::is_valid_backup_name("other_2024.zip"));
}

#[test]
fn backup_schedule_parsing() {
    assert_eq!(backup::parse_weekday("Sunday"), Some(chrono::Weekday::Sun));
    assert_eq!(backup::parse_weekday("funday"), None);
    assert!(backup::parse_schedule_time("23:59").is_some());
    assert!(backup::parse_schedule_time("24:00").is_none());
    assert!(backup::parse_schedule_time("2:00").is_none());
}

#[test]
fn backup_weekly_due_window() {
    let mut s = HashMap::new();
    s.insert("backup_weekly_schedule".to_string(), "1".to_string());
    s.insert("backup_schedule_day".to_string(), "monday".to_string());
    s.insert("backup_schedule_time".to_string(), "02:00".to_string());

    // 2024-06-03 is a Monday.
    assert!(backup::weekly_backup_due(&s, ts("2024-06-03 02:00:00"), false));
    assert!(backup::weekly_backup_due(&s, ts("2024-06-03 02:09:00"), false));
    assert!(!backup::weekly_backup_due(&s, ts("2024-06-03 02:10:00"), false));
    assert!(!backup::weekly_backup_due(&s, ts("2024-06-03 01:59:00"), false));
    assert!(!backup::weekly_backup_due(&s, ts("2024-06-04 02:00:00"), false));
    assert!(!backup::weekly_backup_due(&s, ts("2024-06-03 02:00:00"), true));

    s.insert("backup_weekly_schedule".to_string(), "0".to_string());
    assert!(!backup::weekly_backup_due(&s, ts("2024-06-03 02:00:00"), false));
}

#[test]
fn backup_human_bytes() {
    assert_eq!(backup::human_bytes(512), "512 B");
    assert_eq!(backup::human_bytes(2048), "2.0 KB");
    assert_eq!(backup::human_bytes(5 * 1_048_576), "5.0 MB");
}

#[test]
fn backup_listing_and_retention() {
    let dir = scratch_dir("backups");
    for n in ["loanflow_complete_a", "loanflow_complete_b", "loanflow_complete_c"] {
        std::fs::write(format!("{}/{}.zip", dir, n), "zip").unwrap();
    }
    std::fs::write(format!("{}/notes.txt", dir), "ignored").unwrap();

    let listed = backup::list_backups(&dir);
    assert_eq!(listed.len(), 3);
    assert!(listed.iter().all(|b| b.name.ends_with(".zip")));

    assert_eq!(backup::apply_retention(&dir, 2, SystemTime::now()), 1);
    assert_eq!(backup::list_backups(&dir).len(), 2);

    // Zero keeps anything younger than a day.
    assert_eq!(backup::apply_retention(&dir, 0, SystemTime::now()), 0);
    let later = SystemTime::now() + Duration::from_secs(2 * 24 * 3600);
    assert_eq!(backup::apply_retention(&dir, 0, later), 2);
    assert!(std::path::Path::new(&format!("{}/notes.txt", dir)).exists());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn backup_delete_validates_name() {
    let dir = scratch_dir("backups_del");
    std::fs::write(format!("{}/loanflow_complete_x.zip", dir), "zip").unwrap();
    assert!(backup::delete_backup(&dir, "../loanflow_complete_x").is_err());
    assert!(backup::delete_backup(&dir, "loanflow_complete_missing").is_err());
    backup::delete_backup(&dir, "loanflow_complete_x").unwrap();
    assert!(backup::list_backups(&dir).is_empty());
    std::fs::remove_dir_all(&dir).ok();
}

/// Small project tree: two kept files, plus a log, a tmp file, a cache dir and a db dir.
fn project_tree(label: &str) -> String {
    let root = scratch_dir(label);
    let site = format!("{}/site", root);
    for sub in ["templates", "cache", "db", "temp"] {
        std::fs::create_dir_all(format!("{}/{}", site, sub)).unwrap();
    }
    std::fs::write(format!("{}/templates/page.tera", site), "<p>hello</p>").unwrap();
    std::fs::write(format!("{}/cache/page.html", site), "cached").unwrap();
    std::fs::write(format!("{}/db/live.db", site), "db").unwrap();
    std::fs::write(format!("{}/temp/upload.bin", site), "tmp").unwrap();
    std::fs::write(format!("{}/server.log", site), "log line").unwrap();
    std::fs::write(format!("{}/notes.TMP", site), "scratch").unwrap();
    std::fs::write(format!("{}/app.toml", root), "[server]").unwrap();
    root
}

#[test]
fn backup_project_files_skip_excluded_paths() {
    let root = project_tree("backup_tree");
    // A backup directory nested in the tree under a name the exclusion list misses.
    let nested_backups = format!("{}/site/archives", root);
    std::fs::create_dir_all(&nested_backups).unwrap();
    std::fs::write(format!("{}/loanflow_complete_old.zip", nested_backups), "zip").unwrap();

    let sources = vec![
        format!("{}/site", root),
        format!("{}/app.toml", root),
        format!("{}/missing.toml", root),
    ];
    let files = backup::collect_project_files(&sources, &nested_backups);
    let entries: Vec<&str> = files.iter().map(|f| f.entry.as_str()).collect();
    assert_eq!(entries, vec!["files/app.toml", "files/site/templates/page.tera"]);
    assert_eq!(files.iter().map(|f| f.size).sum::<u64>(), 8 + 12);
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn backup_complete_archive_is_logged() {
    let store = test_store();
    let root = project_tree("backup_src");
    let dir = scratch_dir("backups_full");
    let sources = vec![format!("{}/site", root), format!("{}/app.toml", root)];
    let outcome = backup::create_complete_backup(&*store, &dir, &sources, backup::BackupKind::Manual).unwrap();
    assert!(backup::is_valid_backup_name(&outcome.name));
    assert_eq!(outcome.files_count, 4);
    assert!(outcome.compressed_size > 0);

    let path = backup::backup_path(&dir, &outcome.name).unwrap();
    let mut archive = zip::ZipArchive::new(std::fs::File::open(&path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(String::from).collect();
    names.sort();
    assert_eq!(
        names,
        vec!["database.sqlite", "files/app.toml", "files/site/templates/page.tera", "manifest.json"]
    );

    let manifest: Value = {
        let mut entry = archive.by_name("manifest.json").unwrap();
        let mut raw = String::new();
        std::io::Read::read_to_string(&mut entry, &mut raw).unwrap();
        serde_json::from_str(&raw).unwrap()
    };
    assert_eq!(manifest["files_count"], json!(4));
    assert_eq!(manifest["type"], json!("manual"));
    let db_size = archive.by_name("database.sqlite").unwrap().size();
    assert_eq!(manifest["total_size"], json!(db_size + 20));

    let logs = store.backup_log_recent(5);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, "completed");
    assert_eq!(logs[0].backup_type, "manual");
    assert!(!store.backup_log_exists_since("automatic", 23));
    assert!(store.backup_log_exists_since("manual", 23));

    assert_eq!(logs[0].files_count, 4);
    assert_eq!(logs[0].total_size as u64, outcome.total_size);

    // No staging directory left behind.
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 1);
    std::fs::remove_dir_all(&dir).ok();
    std::fs::remove_dir_all(&root).ok();
}

// ═══════════════════════════════════════════════════════════
// Routes (local client)
// ═══════════════════════════════════════════════════════════

fn test_client(store: &Arc<dyn Store>) -> rocket::local::blocking::Client {
    rocket::local::blocking::Client::tracked(crate::build_rocket(store.clone(), AppConfig::default()))
        .expect("valid rocket instance")
}

/// Live session for `user_id`; returns the session id and its CSRF token.
fn login_as(store: &dyn Store, user_id: i64) -> (String, String) {
    let sid = auth::create_session(store, user_id, Some("127.0.0.1"), Some("tests")).unwrap();
    let (session, _) = store.session_get_user(&sid).unwrap();
    (sid, session.csrf_token)
}

fn session_cookie(sid: &str) -> rocket::http::Cookie<'static> {
    rocket::http::Cookie::new(auth::SESSION_COOKIE, sid.to_string())
}

fn flash_text(response: &rocket::local::blocking::LocalResponse<'_>) -> String {
    response
        .cookies()
        .get("_flash")
        .map(|c| c.value().to_string())
        .unwrap_or_default()
}

#[test]
fn routes_redirect_anonymous_pages_to_login() {
    let store = test_store();
    let client = test_client(&store);

    let response = client.get("/admin/users").dispatch();
    assert_eq!(response.status(), rocket::http::Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/admin/login"));

    let response = client.get("/admin/system-settings").dispatch();
    assert_eq!(response.headers().get_one("Location"), Some("/admin/login"));
}

#[test]
fn routes_reject_non_admin_sessions() {
    let store = test_store();
    let customer = create_user(&*store, "cust@example.com", "user");
    let (sid, _) = login_as(&*store, customer);
    let client = test_client(&store);

    let response = client.get("/admin/users").private_cookie(session_cookie(&sid)).dispatch();
    assert_eq!(response.status(), rocket::http::Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/admin/login"));
}

#[test]
fn routes_anonymous_json_post_gets_401_envelope() {
    let store = test_store();
    let client = test_client(&store);

    let response = client
        .post("/admin/analytics/api")
        .header(rocket::http::ContentType::JSON)
        .body(r#"{"action":"overview"}"#)
        .dispatch();
    assert_eq!(response.status(), rocket::http::Status::Unauthorized);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Authentication required"));
}

#[test]
fn routes_form_post_without_csrf_token_writes_nothing() {
    let store = test_store();
    let admin_id = create_user(&*store, "boss@example.com", "admin");
    let (sid, _) = login_as(&*store, admin_id);
    let client = test_client(&store);

    let response = client
        .post("/admin/users")
        .private_cookie(session_cookie(&sid))
        .header(rocket::http::ContentType::Form)
        .body("action=create_user&first_name=New&last_name=Person&email=new%40example.com&password=longpassword1")
        .dispatch();
    assert_eq!(response.status(), rocket::http::Status::SeeOther);
    assert_eq!(response.headers().get_one("Location"), Some("/admin/users"));
    assert!(flash_text(&response).contains(csrf::INVALID_TOKEN));
    assert!(!store.user_email_taken("new@example.com", None));

    let response = client
        .post("/admin/fee-templates")
        .private_cookie(session_cookie(&sid))
        .header(rocket::http::ContentType::Form)
        .body("action=create_template&csrf_token=forged&template_name=Standard")
        .dispatch();
    assert!(flash_text(&response).contains(csrf::INVALID_TOKEN));
    assert!(store.fee_template_list().is_empty());
}

#[test]
fn routes_form_post_with_csrf_token_is_applied() {
    let store = test_store();
    let admin_id = create_user(&*store, "boss@example.com", "admin");
    let locked = create_user(&*store, "locked@example.com", "user");
    store.user_set_status(locked, "locked").unwrap();
    let (sid, token) = login_as(&*store, admin_id);
    let client = test_client(&store);

    let response = client
        .post("/admin/users")
        .private_cookie(session_cookie(&sid))
        .header(rocket::http::ContentType::Form)
        .body(format!("action=unlock_account&csrf_token={}&user_id={}", token, locked))
        .dispatch();
    assert_eq!(response.status(), rocket::http::Status::SeeOther);
    assert!(flash_text(&response).contains("Account unlocked successfully!"));
    assert_eq!(store.user_get_by_id(locked).unwrap().status, "active");
}

#[test]
fn routes_json_post_without_csrf_token_is_forbidden() {
    let store = test_store();
    let admin_id = create_user(&*store, "boss@example.com", "admin");
    let (sid, token) = login_as(&*store, admin_id);
    let client = test_client(&store);

    let response = client
        .post("/admin/analytics/api")
        .private_cookie(session_cookie(&sid))
        .header(rocket::http::ContentType::JSON)
        .body(r#"{"action":"overview"}"#)
        .dispatch();
    assert_eq!(response.status(), rocket::http::Status::Forbidden);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!(csrf::INVALID_TOKEN));

    let response = client
        .post("/admin/analytics/api")
        .private_cookie(session_cookie(&sid))
        .header(rocket::http::ContentType::JSON)
        .body(json!({"action": "get_dashboard_data", "csrf_token": token}).to_string())
        .dispatch();
    assert_eq!(response.status(), rocket::http::Status::Ok);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["success"], json!(true));
}

#[test]
fn routes_user_detail_hides_deleted_accounts() {
    let store = test_store();
    let admin_id = create_user(&*store, "boss@example.com", "admin");
    let customer = create_user(&*store, "cust@example.com", "user");
    store.payment_scheme_assign_subscription(customer, admin_id).unwrap();
    let (sid, _) = login_as(&*store, admin_id);
    let client = test_client(&store);

    let response = client
        .get(format!("/admin/users/{}", customer))
        .private_cookie(session_cookie(&sid))
        .dispatch();
    assert_eq!(response.status(), rocket::http::Status::Ok);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["user"]["email"], json!("cust@example.com"));
    assert!(body["user"].get("password_hash").is_none());
    assert_eq!(body["payment_scheme"]["scheme_type"], json!("subscription"));

    store.user_soft_delete(customer).unwrap();
    let response = client
        .get(format!("/admin/users/{}", customer))
        .private_cookie(session_cookie(&sid))
        .dispatch();
    assert_eq!(response.status(), rocket::http::Status::NotFound);
}

// ═══════════════════════════════════════════════════════════
// Form helpers
// ═══════════════════════════════════════════════════════════

#[test]
fn form_data_accessors() {
    let f = form(&[("name", "  Ann  "), ("flag", "on"), ("id", " 12 "), ("bad_id", "x")]);
    assert_eq!(f.text("name"), "Ann");
    assert_eq!(f.text("missing"), "");
    assert!(f.checkbox("flag"));
    assert!(!f.checkbox("missing"));
    assert_eq!(f.id("id"), Some(12));
    assert_eq!(f.id("bad_id"), None);
}

#[test]
fn email_address_check() {
    assert!(admin::is_valid_email("a@b.co"));
    assert!(!admin::is_valid_email("a@b"));
    assert!(!admin::is_valid_email("a b@c.de"));
    assert!(!admin::is_valid_email(""));
}
