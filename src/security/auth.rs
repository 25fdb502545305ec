use chrono::{Duration, Utc};
use rand::Rng;
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::models::session::Session;
use crate::models::user::User;
use crate::security::csrf;
use crate::store::Store;

pub const SESSION_COOKIE: &str = "loanflow_session";

const TEMP_PASSWORD_CHARS: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!@#$%^&*";

// ── Client IP request guard ──

/// Extracts the real client IP from the request.
/// Checks headers in priority order:
///   1. X-Real-IP (nginx proxy_set_header)
///   2. X-Forwarded-For (first IP in the chain = original client)
///   3. Rocket's client_ip() (socket peer address)
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let headers = request.headers();

        if let Some(ip) = headers.get_one("X-Real-IP") {
            let ip = ip.trim();
            if !ip.is_empty() {
                return Outcome::Success(ClientIp(ip.to_string()));
            }
        }

        if let Some(forwarded) = headers.get_one("X-Forwarded-For") {
            if let Some(ip) = forwarded.split(',').next() {
                let ip = ip.trim();
                if !ip.is_empty() {
                    return Outcome::Success(ClientIp(ip.to_string()));
                }
            }
        }

        let ip = request
            .client_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

/// The request's `User-Agent` header, if any.
pub struct UserAgent(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserAgent {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let ua = request
            .headers()
            .get_one("User-Agent")
            .map(|s| s.chars().take(255).collect());
        Outcome::Success(UserAgent(ua))
    }
}

// ── Authenticated user guard (any active user with a valid session) ──

/// Guard: any active account with a live session, including admins that
/// still owe a password change.
pub struct AuthenticatedUser {
    pub user: User,
    pub session: Session,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_session_user(request).await {
            Some((session, user)) => Outcome::Success(AuthenticatedUser { user, session }),
            None => Outcome::Forward(Status::Unauthorized),
        }
    }
}

// ── Admin guard ──

/// Guard: role = admin with no pending forced password change.
pub struct AdminUser {
    pub user: User,
    pub session: Session,
}

impl AdminUser {
    pub fn csrf_token(&self) -> &str {
        &self.session.csrf_token
    }

    pub fn verify_csrf(&self, submitted: Option<&str>) -> bool {
        csrf::verify(&self.session, submitted)
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match resolve_session_user(request).await {
            Some((session, user)) if user.is_admin() && !user.must_change_password() => {
                Outcome::Success(AdminUser { user, session })
            }
            Some(_) => Outcome::Forward(Status::Forbidden),
            None => Outcome::Forward(Status::Unauthorized),
        }
    }
}

// ── Shared session resolution ──

async fn resolve_session_user(request: &Request<'_>) -> Option<(Session, User)> {
    let store = request
        .guard::<&State<Arc<dyn Store>>>()
        .await
        .succeeded()?;
    let whitelist = store.setting_get_or("ip_whitelist", "");
    if !whitelist.trim().is_empty() {
        let ip = request.guard::<ClientIp>().await.succeeded()?;
        if !ip_allowed(&whitelist, &ip.0) {
            log::warn!("admin request from non-whitelisted ip {}", ip.0);
            return None;
        }
    }

    let cookies = request.cookies();
    let session_id = cookies.get_private(SESSION_COOKIE)?.value().to_string();

    match store.session_get_user(&session_id) {
        Some((session, user)) if user.is_active() => {
            let expires = session_expiry(&**store.inner());
            if let Err(e) = store.session_touch(&session.id, &expires) {
                log::error!("session refresh failed: {}", e);
            }
            Some((session, user))
        }
        _ => {
            cookies.remove_private(Cookie::from(SESSION_COOKIE));
            None
        }
    }
}

// ── Password utilities ──

pub fn hash_password(password: &str) -> Result<String, String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| e.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// 12 random characters from letters, digits and `!@#$%^&*`.
pub fn generate_temp_password() -> String {
    let mut rng = rand::thread_rng();
    (0..12)
        .map(|_| TEMP_PASSWORD_CHARS[rng.gen_range(0..TEMP_PASSWORD_CHARS.len())] as char)
        .collect()
}

pub fn password_min_length(store: &dyn Store) -> usize {
    store.setting_get_i64("password_min_length").clamp(6, 128) as usize
}

// ── Session management ──

/// Expiry timestamp for a session touched now; `session_timeout` is in minutes.
pub fn session_expiry(store: &dyn Store) -> String {
    let minutes = match store.setting_get_i64("session_timeout") {
        m if m > 0 => m,
        _ => 30,
    };
    let expires = Utc::now().naive_utc() + Duration::minutes(minutes);
    expires.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn create_session(
    store: &dyn Store,
    user_id: i64,
    ip: Option<&str>,
    ua: Option<&str>,
) -> Result<String, String> {
    let session_id = uuid::Uuid::new_v4().to_string();
    let csrf_token = csrf::generate_token();
    let expires = session_expiry(store);
    let ip_hash = ip.map(hash_ip);

    store.session_create(&session_id, user_id, &csrf_token, &expires, ip_hash.as_deref(), ua)?;

    Ok(session_id)
}

pub fn destroy_session(store: &dyn Store, session_id: &str) -> Result<(), String> {
    store.session_delete(session_id)
}

/// Set the session cookie with proper security flags.
/// `Secure` follows the scheme of the configured site_url.
pub fn set_session_cookie_secure(cookies: &CookieJar<'_>, session_id: &str, store: &dyn Store) {
    let is_secure = store.setting_get_or("site_url", "").starts_with("https://");

    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Strict);
    cookie.set_path("/");
    if is_secure {
        cookie.set_secure(true);
    }
    cookies.add_private(cookie);
}

pub fn clear_session_cookie(cookies: &CookieJar<'_>) {
    cookies.remove_private(Cookie::from(SESSION_COOKIE));
}

pub fn hash_ip(ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hex::encode(hasher.finalize())
}

/// True when the IP may use the back-office. An empty whitelist allows everyone.
pub fn ip_allowed(whitelist: &str, ip: &str) -> bool {
    let entries: Vec<&str> = whitelist
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    entries.is_empty() || entries.iter().any(|e| *e == ip)
}
