use rocket::form::Form;
use rocket::http::CookieJar;
use rocket::request::FlashMessage;
use rocket::response::Redirect;
use rocket::State;
use rocket_dyn_templates::Template;
use std::collections::HashMap;
use std::sync::Arc;

use super::super::NoCacheTemplate;
use crate::models::audit::AuditEvent;
use crate::models::user::User;
use crate::rate_limit::{RateLimiter, LOGIN_MAX_ATTEMPTS, LOGIN_WINDOW};
use crate::security::auth::{self, AdminUser, ClientIp, UserAgent};
use crate::security::captcha::{self, CaptchaConfig};
use crate::store::Store;
use crate::AdminSlug;

const GENERIC_ERROR: &str = "An error occurred. Please try again.";

#[derive(Debug, FromForm)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub captcha_response: Option<String>,
}

#[get("/login")]
pub fn login_page(
    store: &State<Arc<dyn Store>>,
    admin_slug: &State<AdminSlug>,
    cookies: &CookieJar<'_>,
    admin: Option<AdminUser>,
    flash: Option<FlashMessage<'_>>,
) -> Result<NoCacheTemplate, Redirect> {
    if admin.is_some() {
        return Err(Redirect::to(format!("/{}", admin_slug.get())));
    }
    let s: &dyn Store = &**store.inner();
    let mut ctx = base_context(s, admin_slug.get());
    if let Some(f) = flash {
        let key = if f.kind() == "success" { "notice" } else { "error" };
        ctx.insert(key.to_string(), f.message().to_string());
    }
    inject_captcha_context(s, cookies, &mut ctx);
    Ok(NoCacheTemplate(Template::render("admin/login", &ctx)))
}

#[post("/login", data = "<form>")]
pub fn login_submit(
    form: Form<LoginForm>,
    store: &State<Arc<dyn Store>>,
    admin_slug: &State<AdminSlug>,
    limiter: &State<Arc<RateLimiter>>,
    cookies: &CookieJar<'_>,
    client_ip: ClientIp,
    user_agent: UserAgent,
) -> Result<Redirect, NoCacheTemplate> {
    let s: &dyn Store = &**store.inner();
    let ip = client_ip.0.as_str();
    let email = form.email.trim();
    let rate_key = format!("login:{}", auth::hash_ip(ip));

    let make_err = |msg: &str| -> NoCacheTemplate {
        let mut ctx = base_context(s, admin_slug.get());
        ctx.insert("error".to_string(), msg.to_string());
        ctx.insert("email".to_string(), email.to_string());
        inject_captcha_context(s, cookies, &mut ctx);
        NoCacheTemplate(Template::render("admin/login", &ctx))
    };

    // 1. Per-IP throttle
    if !limiter.check_and_record(&rate_key, LOGIN_MAX_ATTEMPTS, LOGIN_WINDOW) {
        log::warn!("Login rate limit hit for {}", ip);
        return Err(make_err("Too many login attempts. Please try again in 15 minutes."));
    }

    // 2. Captcha
    let captcha_cfg = CaptchaConfig::from_settings(&s.setting_all());
    if captcha_cfg.protects("login") {
        let response = form.captcha_response.as_deref().unwrap_or("");
        if !captcha::verify(&captcha_cfg, cookies, response, Some(ip)) {
            log::warn!("Login captcha failed for {}", ip);
            return Err(make_err("Captcha verification failed. Please try again."));
        }
    }

    if email.is_empty() || form.password.is_empty() {
        return Err(make_err("Email and password are required."));
    }

    // 3. User lookup
    let Some(mut user) = s.user_get_by_email(email) else {
        log::warn!("Login attempt for unknown account from {}", ip);
        return Err(make_err("Invalid email or password."));
    };

    // 4. Lockout
    let max_attempts = positive_or(s.setting_get_i64("max_login_attempts"), 5);
    let lockout_minutes = positive_or(s.setting_get_i64("lockout_duration"), 30);
    match s.user_release_expired_lock(user.id) {
        Ok(true) => {
            if let Some(u) = s.user_get_by_id(user.id) {
                user = u;
            }
        }
        Ok(false) => {}
        Err(e) => log::error!("Failed to release lock for user {}: {}", user.id, e),
    }
    let now = chrono::Utc::now().naive_utc();
    if user.is_locked_out(max_attempts, lockout_minutes, now) {
        log::warn!("Login refused for locked account {}", user.email);
        return Err(make_err(&locked_message(lockout_minutes)));
    }

    // 5. Status
    if !user.is_active() {
        return Err(make_err("This account is inactive. Contact an administrator."));
    }

    // 6. Password
    if !auth::verify_password(&form.password, &user.password_hash) {
        let attempts = match s.user_record_failed_login(user.id, max_attempts, lockout_minutes) {
            Ok(n) => n,
            Err(e) => {
                log::error!("Failed to record failed login for {}: {}", user.email, e);
                return Err(make_err(GENERIC_ERROR));
            }
        };
        log::warn!("Failed login for {} from {} ({} attempt(s))", user.email, ip, attempts);
        audit(s, &user, "login_failed", ip, format!("Wrong password, attempt {}", attempts));
        if attempts >= max_attempts {
            return Err(make_err(&locked_message(lockout_minutes)));
        }
        return Err(make_err("Invalid email or password."));
    }

    // 7. Role
    if !user.is_admin() {
        log::warn!("Non-admin {} tried to sign in to the back-office", user.email);
        audit(s, &user, "login_denied", ip, "Administrator role required");
        return Err(make_err("Access denied. Administrator privileges required."));
    }

    // 8. Session
    if let Err(e) = s.user_record_successful_login(user.id) {
        log::error!("Failed to reset login counters for {}: {}", user.email, e);
    }
    let session_id = match auth::create_session(s, user.id, Some(ip), user_agent.0.as_deref()) {
        Ok(id) => id,
        Err(e) => {
            log::error!("Session creation failed for {}: {}", user.email, e);
            return Err(make_err(GENERIC_ERROR));
        }
    };
    auth::set_session_cookie_secure(cookies, &session_id, s);
    limiter.reset(&rate_key);
    audit(s, &user, "login", ip, "Signed in");
    log::info!("Admin {} signed in", user.email);

    // 9. Forced password change
    if user.must_change_password() {
        Ok(Redirect::to(format!("/{}/change-password", admin_slug.get())))
    } else {
        Ok(Redirect::to(format!("/{}", admin_slug.get())))
    }
}

fn positive_or(value: i64, default: i64) -> i64 {
    if value > 0 {
        value
    } else {
        default
    }
}

fn locked_message(minutes: i64) -> String {
    format!(
        "Too many failed attempts. Your account is locked for {} minutes.",
        minutes
    )
}

fn audit(s: &dyn Store, user: &User, action: &str, ip: &str, details: impl Into<String>) {
    s.audit_log(
        &AuditEvent::new(action, "user")
            .by(user.id, &user.full_name(), ip)
            .entity(Some(user.id), &user.email)
            .details(details),
    );
}

fn base_context(s: &dyn Store, slug: &str) -> HashMap<String, String> {
    let mut ctx = HashMap::new();
    ctx.insert("admin_slug".to_string(), slug.to_string());
    ctx.insert("site_name".to_string(), s.setting_get_or("site_name", "LoanFlow"));
    ctx
}

/// Add the captcha widget data when the login form is protected.
pub fn inject_captcha_context(s: &dyn Store, cookies: &CookieJar<'_>, ctx: &mut HashMap<String, String>) {
    let cfg = CaptchaConfig::from_settings(&s.setting_all());
    if !cfg.protects("login") {
        return;
    }
    ctx.insert("captcha_provider".to_string(), cfg.provider.clone());
    if cfg.provider == "custom" {
        ctx.insert("captcha_question".to_string(), captcha::issue_math_challenge(cookies));
    } else {
        ctx.insert("captcha_site_key".to_string(), cfg.site_key);
    }
}
