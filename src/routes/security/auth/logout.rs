use rocket::http::{ContentType, CookieJar, Status};
use rocket::response::{Flash, Redirect};
use rocket::serde::json::Json;
use rocket::State;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::models::audit::AuditEvent;
use crate::security::auth::{self, AuthenticatedUser, ClientIp, SESSION_COOKIE};
use crate::store::Store;
use crate::AdminSlug;

#[get("/logout")]
pub fn logout(
    store: &State<Arc<dyn Store>>,
    admin_slug: &State<AdminSlug>,
    cookies: &CookieJar<'_>,
    user: Option<AuthenticatedUser>,
    client_ip: ClientIp,
) -> Flash<Redirect> {
    let s: &dyn Store = &**store.inner();
    if let Some(u) = user {
        s.audit_log(
            &AuditEvent::new("logout", "user")
                .by(u.user.id, &u.user.full_name(), &client_ip.0)
                .entity(Some(u.user.id), &u.user.email),
        );
    }
    if let Some(cookie) = cookies.get_private(SESSION_COOKIE) {
        if let Err(e) = auth::destroy_session(s, cookie.value()) {
            log::error!("Failed to destroy session: {}", e);
        }
    }
    auth::clear_session_cookie(cookies);
    Flash::success(
        Redirect::to(format!("/{}/login", admin_slug.get())),
        "You have been signed out.",
    )
}

/// Catch-all for any /<admin_slug>/* page that failed the AdminUser guard.
/// Admins owing a password change are sent to the change form instead.
#[get("/<_path..>", rank = 99)]
pub fn admin_redirect_to_login(
    _path: std::path::PathBuf,
    user: Option<AuthenticatedUser>,
    admin_slug: &State<AdminSlug>,
) -> Redirect {
    match user {
        Some(u) if u.user.is_admin() && u.user.must_change_password() => {
            Redirect::to(format!("/{}/change-password", admin_slug.get()))
        }
        _ => Redirect::to(format!("/{}/login", admin_slug.get())),
    }
}

/// POST counterpart: JSON callers get a 401 envelope, forms go back to the login page.
#[post("/<_path..>", rank = 99)]
pub fn admin_post_unauthorized(
    _path: std::path::PathBuf,
    content_type: Option<&ContentType>,
    admin_slug: &State<AdminSlug>,
) -> Result<Flash<Redirect>, (Status, Json<Value>)> {
    if content_type.map(|ct| ct.is_json()).unwrap_or(false) {
        return Err((
            Status::Unauthorized,
            Json(json!({"success": false, "message": "Authentication required"})),
        ));
    }
    Ok(Flash::error(
        Redirect::to(format!("/{}/login", admin_slug.get())),
        "Your session has expired. Please sign in again.",
    ))
}
