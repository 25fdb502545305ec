use rocket::form::Form;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use std::collections::HashMap;
use std::sync::Arc;

use super::super::NoCacheTemplate;
use crate::models::audit::AuditEvent;
use crate::security::auth::{self, AuthenticatedUser, ClientIp};
use crate::security::csrf;
use crate::store::Store;
use crate::AdminSlug;

#[derive(Debug, FromForm)]
pub struct ChangePasswordForm {
    pub csrf_token: Option<String>,
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

fn render(
    s: &dyn Store,
    user: &AuthenticatedUser,
    slug: &str,
    error: Option<&str>,
) -> NoCacheTemplate {
    let mut ctx = HashMap::new();
    ctx.insert("admin_slug".to_string(), slug.to_string());
    ctx.insert("site_name".to_string(), s.setting_get_or("site_name", "LoanFlow"));
    ctx.insert("csrf_token".to_string(), user.session.csrf_token.clone());
    ctx.insert("min_length".to_string(), auth::password_min_length(s).to_string());
    if user.user.must_change_password() {
        ctx.insert("forced".to_string(), "true".to_string());
    }
    if let Some(msg) = error {
        ctx.insert("error".to_string(), msg.to_string());
    }
    NoCacheTemplate(Template::render("admin/change_password", &ctx))
}

#[get("/change-password")]
pub fn change_password_page(
    user: AuthenticatedUser,
    store: &State<Arc<dyn Store>>,
    admin_slug: &State<AdminSlug>,
) -> NoCacheTemplate {
    render(&**store.inner(), &user, admin_slug.get(), None)
}

#[post("/change-password", data = "<form>")]
pub fn change_password_submit(
    user: AuthenticatedUser,
    form: Form<ChangePasswordForm>,
    store: &State<Arc<dyn Store>>,
    admin_slug: &State<AdminSlug>,
    client_ip: ClientIp,
) -> Result<Flash<Redirect>, NoCacheTemplate> {
    let s: &dyn Store = &**store.inner();
    let make_err = |msg: &str| render(s, &user, admin_slug.get(), Some(msg));

    if !csrf::verify(&user.session, form.csrf_token.as_deref()) {
        log::warn!("CSRF check failed on password change for {}", user.user.email);
        return Err(make_err(csrf::INVALID_TOKEN));
    }
    if !auth::verify_password(&form.current_password, &user.user.password_hash) {
        return Err(make_err("Current password is incorrect."));
    }
    let min = auth::password_min_length(s);
    if form.new_password.chars().count() < min {
        return Err(make_err(&format!("Password must be at least {} characters.", min)));
    }
    if form.new_password != form.confirm_password {
        return Err(make_err("Passwords do not match."));
    }
    if form.new_password == form.current_password {
        return Err(make_err("The new password must differ from the current one."));
    }

    let hash = match auth::hash_password(&form.new_password) {
        Ok(h) => h,
        Err(e) => {
            log::error!("Password hashing failed: {}", e);
            return Err(make_err("An error occurred. Please try again."));
        }
    };
    if let Err(e) = s.user_set_password(user.user.id, &hash, false) {
        log::error!("Failed to store new password for {}: {}", user.user.email, e);
        return Err(make_err("An error occurred. Please try again."));
    }

    s.audit_log(
        &AuditEvent::new("password_changed", "user")
            .by(user.user.id, &user.user.full_name(), &client_ip.0)
            .entity(Some(user.user.id), &user.user.email),
    );

    Ok(Flash::success(
        Redirect::to(format!("/{}", admin_slug.get())),
        "Password updated.",
    ))
}
