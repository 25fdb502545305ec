use rocket::form::Form;
use rocket::http::Status;
use rocket::request::FlashMessage;
use rocket::serde::json::Json;
use rocket::State;
use rocket_dyn_templates::Template;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::{audit_event, json_fail, page_context, FlashResult, FormData, JsonResult, PanelRedirect, INVALID_ACTION};
use crate::email::compose;
use crate::models::email_component::{EmailComponentForm, COMPONENT_TYPES};
use crate::security::auth::{AdminUser, ClientIp};
use crate::security::csrf::{self, CsrfHeader};
use crate::store::Store;
use crate::AdminSlug;

#[get("/email-templates")]
pub fn email_templates_page(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = &**store.inner();
    let mut context = page_context(&admin, slug, s, "Email Templates", "email_templates", flash);
    context["components"] = json!(s.email_component_list());
    context["variables"] = json!(s.email_variables());
    context["component_types"] = json!(COMPONENT_TYPES);
    Template::render("admin/email_templates", &context)
}

/// Build a component form from posted fields, rejecting missing or unknown values.
pub(crate) fn component_form(form: &FormData) -> Result<EmailComponentForm, &'static str> {
    let component_type = form.text("component_type");
    if !COMPONENT_TYPES.contains(&component_type.as_str()) {
        return Err("Invalid component type.");
    }
    let component_name = form.text("component_name");
    if component_name.is_empty() {
        return Err("Component name is required.");
    }
    // Raw html: trimming only, markup is stored as written.
    let html_content = form.0.get("html_content").cloned().unwrap_or_default();
    if html_content.trim().is_empty() {
        return Err("HTML content is required.");
    }
    Ok(EmailComponentForm {
        id: form.id("component_id"),
        component_type,
        component_name,
        html_content,
        is_default: form.checkbox("is_default"),
    })
}

#[post("/email-templates", data = "<form>")]
pub fn email_templates_action(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    client_ip: ClientIp,
    form: Form<HashMap<String, String>>,
) -> FlashResult {
    let s: &dyn Store = &**store.inner();
    let form = FormData(form.into_inner());
    let back = PanelRedirect::new(slug, "email-templates");

    if !form.csrf_ok(&admin) {
        return back.error(csrf::INVALID_TOKEN);
    }

    match form.action().as_str() {
        "save_component" => {
            let component = match component_form(&form) {
                Ok(c) => c,
                Err(msg) => return back.error(msg),
            };
            if let Some(id) = component.id {
                if s.email_component_get(id).is_none() {
                    return back.error("Component not found.");
                }
            }
            match s.email_component_save(&component) {
                Ok(id) => {
                    let verb = if component.id.is_some() { "updated" } else { "created" };
                    s.audit_log(
                        &audit_event(&admin, &client_ip.0, "save_component", "email_component")
                            .entity(Some(id), &component.component_name)
                            .details(format!("{} {}", verb, component.component_type)),
                    );
                    back.success("Email component saved successfully!")
                }
                Err(e) => back.failed("Error saving email component", &e),
            }
        }
        "delete_component" => {
            let Some(id) = form.id("component_id") else {
                return back.error("Component not found.");
            };
            let title = s
                .email_component_get(id)
                .map(|c| c.component_name)
                .unwrap_or_default();
            match s.email_component_delete(id) {
                Ok(true) => {
                    s.audit_log(
                        &audit_event(&admin, &client_ip.0, "delete_component", "email_component")
                            .entity(Some(id), &title),
                    );
                    back.success("Email component deleted successfully!")
                }
                Ok(false) => back.error("Component not found."),
                Err(e) => back.failed("Error deleting email component", &e),
            }
        }
        "toggle_active" => {
            let Some(id) = form.id("component_id") else {
                return back.error("Component not found.");
            };
            match s.email_component_toggle(id) {
                Ok(true) => {
                    s.audit_log(
                        &audit_event(&admin, &client_ip.0, "toggle_component", "email_component")
                            .entity(Some(id), ""),
                    );
                    back.success("Component status updated!")
                }
                Ok(false) => back.error("Component not found."),
                Err(e) => back.failed("Error toggling email component", &e),
            }
        }
        _ => back.error(INVALID_ACTION),
    }
}

#[get("/email-templates/variables")]
pub fn email_variables(_admin: AdminUser, store: &State<Arc<dyn Store>>) -> Json<Value> {
    Json(json!({"success": true, "variables": store.email_variables()}))
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[post("/email-templates/preview", format = "json", data = "<body>")]
pub fn email_preview(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    csrf_header: CsrfHeader,
    body: Json<PreviewRequest>,
) -> JsonResult {
    let s: &dyn Store = &**store.inner();
    let body = body.into_inner();
    let token = csrf_header.0.or(body.csrf_token);
    if !admin.verify_csrf(token.as_deref()) {
        return json_fail(Status::Forbidden, csrf::INVALID_TOKEN);
    }

    let vars = compose::preview_variables(s, s.site_now());
    let filled = compose::fill_placeholders(&body.content, &vars);
    let html = compose::preview_document(&filled, &body.device);
    (Status::Ok, Json(json!({"success": true, "html": html})))
}
