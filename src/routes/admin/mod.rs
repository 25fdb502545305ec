use std::collections::HashMap;

use rocket::http::Status;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::serde::json::Json;
use serde_json::{json, Value};

use crate::models::audit::AuditEvent;
use crate::security::auth::AdminUser;
use crate::security::csrf;
use crate::store::Store;
use crate::AdminSlug;

pub mod analytics;
pub mod dashboard;
pub mod edge_network;
pub mod email_templates;
pub mod fee_templates;
pub mod payment_methods;
pub mod seo_automation;
pub mod system_settings;
pub mod users;

pub(crate) const GENERIC_ERROR: &str = "An error occurred. Please try again.";
pub(crate) const INVALID_ACTION: &str = "Invalid action";

/// Outcome of a form POST: a flash message plus a redirect back to the panel.
pub(crate) type FlashResult = Result<Flash<Redirect>, Flash<Redirect>>;

/// JSON envelope with an explicit status, for AJAX endpoints.
pub(crate) type JsonResult = (Status, Json<Value>);

/// Helper: get the admin base path from managed state
pub(crate) fn admin_base(slug: &AdminSlug) -> String {
    format!("/{}", slug.0)
}

pub(crate) fn json_ok(message: &str, extra: Value) -> JsonResult {
    let mut body = json!({"success": true, "message": message});
    merge(&mut body, extra);
    (Status::Ok, Json(body))
}

pub(crate) fn json_fail(status: Status, message: &str) -> JsonResult {
    (status, Json(json!({"success": false, "message": message})))
}

fn merge(body: &mut Value, extra: Value) {
    if let (Some(target), Value::Object(extra)) = (body.as_object_mut(), extra) {
        for (k, v) in extra {
            target.insert(k, v);
        }
    }
}

/// Context shared by every panel page: slug, user, csrf token, flash.
pub(crate) fn page_context(
    admin: &AdminUser,
    slug: &AdminSlug,
    store: &dyn Store,
    page_title: &str,
    active: &str,
    flash: Option<FlashMessage<'_>>,
) -> Value {
    let mut ctx = json!({
        "page_title": page_title,
        "active_page": active,
        "admin_slug": slug.get(),
        "site_name": store.setting_get_or("site_name", "LoanFlow"),
        "current_user": admin.user.safe_json(),
        "csrf_token": admin.csrf_token(),
    });
    if let Some(f) = flash {
        ctx["flash_kind"] = json!(f.kind());
        ctx["flash_msg"] = json!(f.message());
    }
    ctx
}

/// Form fields, trimmed. Missing fields read as empty.
pub(crate) struct FormData(pub HashMap<String, String>);

impl FormData {
    pub fn text(&self, key: &str) -> String {
        self.0.get(key).map(|v| v.trim().to_string()).unwrap_or_default()
    }

    /// Checkbox semantics: absent means false.
    pub fn checkbox(&self, key: &str) -> bool {
        self.0
            .get(key)
            .map(|v| crate::models::settings::is_truthy(v.trim()))
            .unwrap_or(false)
    }

    pub fn id(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn action(&self) -> String {
        self.text("action")
    }

    pub fn csrf_ok(&self, admin: &AdminUser) -> bool {
        admin.verify_csrf(self.0.get(csrf::CSRF_FIELD).map(|s| s.as_str()))
    }
}

/// Flash helpers bound to one panel URL.
pub(crate) struct PanelRedirect(pub String);

impl PanelRedirect {
    pub fn new(slug: &AdminSlug, path: &str) -> Self {
        PanelRedirect(format!("{}/{}", admin_base(slug), path))
    }

    pub fn success(&self, msg: impl Into<String>) -> FlashResult {
        Ok(Flash::success(Redirect::to(self.0.clone()), msg.into()))
    }

    pub fn error(&self, msg: impl Into<String>) -> FlashResult {
        Err(Flash::error(Redirect::to(self.0.clone()), msg.into()))
    }

    /// Log a store failure and answer with the generic message.
    pub fn failed(&self, context: &str, err: &str) -> FlashResult {
        log::error!("{}: {}", context, err);
        self.error(GENERIC_ERROR)
    }
}

/// Audit event attributed to the acting admin.
pub(crate) fn audit_event(admin: &AdminUser, ip: &str, action: &str, entity_type: &str) -> AuditEvent {
    AuditEvent::new(action, entity_type).by(admin.user.id, &admin.user.full_name(), ip)
}

pub(crate) fn is_valid_email(s: &str) -> bool {
    regex::Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
        .map(|re| re.is_match(s))
        .unwrap_or(false)
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        dashboard::dashboard,
        analytics::analytics_page,
        analytics::analytics_api,
        analytics::analytics_export,
        edge_network::edge_page,
        edge_network::edge_action,
        email_templates::email_templates_page,
        email_templates::email_templates_action,
        email_templates::email_variables,
        email_templates::email_preview,
        fee_templates::fee_templates_page,
        fee_templates::fee_templates_action,
        fee_templates::fee_template_preview,
        payment_methods::payment_methods_page,
        payment_methods::payment_methods_action,
        payment_methods::two_factor_setup,
        payment_methods::two_factor_enable,
        seo_automation::seo_page,
        seo_automation::seo_action,
        system_settings::settings_page,
        system_settings::settings_action,
        system_settings::backup_download,
        users::users_list,
        users::users_action,
        users::users_export,
        users::user_detail,
    ]
}
