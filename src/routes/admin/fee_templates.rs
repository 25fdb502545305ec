use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::{audit_event, page_context, FlashResult, FormData, PanelRedirect, INVALID_ACTION};
use crate::email::fill_placeholders;
use crate::models::fee_template::{
    country_name, method_name, FeeTemplateForm, RequiredFields, COUNTRIES, PAYMENT_METHODS, PREVIEW_SAMPLE,
};
use crate::security::auth::{AdminUser, ClientIp};
use crate::security::csrf;
use crate::store::Store;
use crate::AdminSlug;

#[get("/fee-templates")]
pub fn fee_templates_page(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = &**store.inner();
    let mut context = page_context(&admin, slug, s, "Fee Templates", "fee_templates", flash);
    let templates: Vec<_> = s
        .fee_template_list()
        .into_iter()
        .map(|t| {
            let mut v = json!(t);
            v["country_name"] = json!(country_name(&t.country).unwrap_or(t.country.as_str()));
            v["method_name"] = json!(method_name(&t.payment_method).unwrap_or(t.payment_method.as_str()));
            v
        })
        .collect();
    context["templates"] = json!(templates);
    context["countries"] = json!(COUNTRIES.iter().map(|(c, n)| json!({"code": c, "name": n})).collect::<Vec<_>>());
    context["methods"] = json!(PAYMENT_METHODS.iter().map(|(k, n)| json!({"key": k, "name": n})).collect::<Vec<_>>());
    Template::render("admin/fee_templates", &context)
}

/// Text fields plus required-field checkboxes. Country and method are only checked when
/// `with_target` is set; updates keep the stored pair.
pub(crate) fn template_form(form: &FormData, with_target: bool) -> Result<FeeTemplateForm, &'static str> {
    let country = form.text("country").to_uppercase();
    let payment_method = form.text("payment_method");
    if with_target {
        if country_name(&country).is_none() {
            return Err("Invalid country selected.");
        }
        if method_name(&payment_method).is_none() {
            return Err("Invalid payment method selected.");
        }
    }
    let template_name = form.text("template_name");
    let instructions = form.text("instructions");
    let email_template = form.text("email_template");
    if template_name.is_empty() || instructions.is_empty() || email_template.is_empty() {
        return Err("Template name, instructions and email template are required.");
    }
    Ok(FeeTemplateForm {
        country,
        payment_method,
        template_name,
        instructions,
        email_template,
        required_fields: RequiredFields {
            amount_sent: form.checkbox("require_amount_sent"),
            date_sent: form.checkbox("require_date_sent"),
            transaction_reference: form.checkbox("require_transaction_reference"),
        },
        is_active: if with_target { true } else { form.checkbox("is_active") },
    })
}

#[post("/fee-templates", data = "<form>")]
pub fn fee_templates_action(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    client_ip: ClientIp,
    form: Form<HashMap<String, String>>,
) -> FlashResult {
    let s: &dyn Store = &**store.inner();
    let form = FormData(form.into_inner());
    let back = PanelRedirect::new(slug, "fee-templates");

    if !form.csrf_ok(&admin) {
        return back.error(csrf::INVALID_TOKEN);
    }

    match form.action().as_str() {
        "create_template" => {
            let tpl = match template_form(&form, true) {
                Ok(t) => t,
                Err(msg) => return back.error(msg),
            };
            match s.fee_template_create(&tpl, admin.user.id) {
                Ok(id) => {
                    s.audit_log(
                        &audit_event(&admin, &client_ip.0, "create_fee_template", "fee_template")
                            .entity(Some(id), &tpl.template_name)
                            .details(format!("{} / {}", tpl.country, tpl.payment_method)),
                    );
                    back.success("Fee template created successfully!")
                }
                // Duplicate pair reaches the admin verbatim; anything else is logged.
                Err(e) if e == crate::models::fee_template::DUPLICATE_TEMPLATE => back.error(e),
                Err(e) => back.failed("Error creating fee template", &e),
            }
        }
        "update_template" => {
            let Some(id) = form.id("template_id") else {
                return back.error("Template not found.");
            };
            let tpl = match template_form(&form, false) {
                Ok(t) => t,
                Err(msg) => return back.error(msg),
            };
            match s.fee_template_update(id, &tpl) {
                Ok(true) => {
                    s.audit_log(
                        &audit_event(&admin, &client_ip.0, "update_fee_template", "fee_template")
                            .entity(Some(id), &tpl.template_name),
                    );
                    back.success("Fee template updated successfully!")
                }
                Ok(false) => back.error("Template not found."),
                Err(e) => back.failed("Error updating fee template", &e),
            }
        }
        "delete_template" => {
            let Some(id) = form.id("template_id") else {
                return back.error("Template not found.");
            };
            let title = s.fee_template_get(id).map(|t| t.template_name).unwrap_or_default();
            match s.fee_template_delete(id) {
                Ok(()) => {
                    s.audit_log(
                        &audit_event(&admin, &client_ip.0, "delete_fee_template", "fee_template")
                            .entity(Some(id), &title),
                    );
                    back.success("Fee template deleted successfully!")
                }
                // Not-found and in-use refusals are user-facing.
                Err(e) => back.error(e),
            }
        }
        "toggle_template" => {
            let Some(id) = form.id("template_id") else {
                return back.error("Template not found.");
            };
            match s.fee_template_toggle(id) {
                Ok(true) => {
                    s.audit_log(
                        &audit_event(&admin, &client_ip.0, "toggle_fee_template", "fee_template")
                            .entity(Some(id), ""),
                    );
                    back.success("Template status updated!")
                }
                Ok(false) => back.error("Template not found."),
                Err(e) => back.failed("Error toggling fee template", &e),
            }
        }
        _ => back.error(INVALID_ACTION),
    }
}

/// Sample substitutions shown on the preview page.
pub fn preview_sample() -> Vec<(String, String)> {
    PREVIEW_SAMPLE
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[get("/fee-templates/<id>/preview")]
pub fn fee_template_preview(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    id: i64,
) -> Result<Template, Flash<Redirect>> {
    let s: &dyn Store = &**store.inner();
    let Some(tpl) = s.fee_template_get(id) else {
        return Err(Flash::error(
            Redirect::to(PanelRedirect::new(slug, "fee-templates").0),
            "Template not found.",
        ));
    };
    let sample = preview_sample();
    let mut context = page_context(&admin, slug, s, "Fee Template Preview", "fee_templates", None);
    context["template"] = json!(tpl);
    context["country_name"] = json!(country_name(&tpl.country).unwrap_or(tpl.country.as_str()));
    context["method_name"] = json!(method_name(&tpl.payment_method).unwrap_or(tpl.payment_method.as_str()));
    context["instructions_preview"] = json!(fill_placeholders(&tpl.instructions, &sample));
    context["email_preview"] = json!(fill_placeholders(&tpl.email_template, &sample));
    Ok(Template::render("admin/fee_template_preview", &context))
}
