use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::{audit_event, page_context, FlashResult, FormData, PanelRedirect, INVALID_ACTION};
use crate::models::fee_template::{country_name, COUNTRIES, PAYMENT_METHODS};
use crate::models::payment_method::{config_fields, FieldKind, PaymentMethodConfig};
use crate::security::auth::{AdminUser, ClientIp};
use crate::security::{csrf, mfa};
use crate::store::Store;
use crate::AdminSlug;

#[get("/payment-methods")]
pub fn payment_methods_page(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = &**store.inner();
    let mut context = page_context(&admin, slug, s, "Payment Methods", "payment_methods", flash);
    let configs: Vec<Value> = PAYMENT_METHODS
        .iter()
        .map(|(key, name)| {
            let config = s.payment_config_get(key);
            let mut v = json!(config);
            v["config_data"] = Value::Object(config.redacted_config());
            v["display_name"] = json!(name);
            v["fields"] = json!(form_fields(&config));
            v
        })
        .collect();
    context["configs"] = json!(configs);
    context["payment_stats"] = json!(s.payment_stats());
    context["countries"] = json!(COUNTRIES.iter().map(|(c, n)| json!({"code": c, "name": n})).collect::<Vec<_>>());
    context["admin_two_factor"] = json!(admin.user.two_factor_enabled);
    Template::render("admin/payment_methods", &context)
}

/// Field list for the edit form: name, input kind and current value.
/// Secrets carry only an `is_set` flag.
pub(crate) fn form_fields(config: &PaymentMethodConfig) -> Vec<Value> {
    config_fields(&config.method_name)
        .unwrap_or(&[])
        .iter()
        .map(|f| {
            let stored = config.config_data.get(f.name).cloned().unwrap_or(Value::Null);
            let kind = match f.kind {
                FieldKind::Flag => "flag",
                FieldKind::Number(_) => "number",
                FieldKind::Text(_) if f.secret => "secret",
                FieldKind::Text(_) => "text",
            };
            let mut field = json!({
                "name": f.name,
                "label": f.name.replace('_', " "),
                "kind": kind,
            });
            if f.secret {
                field["is_set"] = json!(stored.as_str().is_some_and(|v| !v.is_empty()));
            } else {
                field["value"] = stored;
            }
            field
        })
        .collect()
}

/// `config_data` for `method` from posted fields. Flags use checkbox semantics, numbers
/// must parse, blank values fall back to the field default. A blank secret keeps the
/// value stored in `current`.
pub(crate) fn build_config_data(
    method: &str,
    form: &FormData,
    current: &PaymentMethodConfig,
) -> Result<Map<String, Value>, String> {
    let fields = config_fields(method).ok_or_else(|| "Invalid payment method.".to_string())?;
    let mut data = Map::new();
    for field in fields {
        let value = match field.kind {
            FieldKind::Flag => Value::Bool(form.checkbox(field.name)),
            FieldKind::Text(_) if field.secret && form.text(field.name).is_empty() => current
                .config_data
                .get(field.name)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new())),
            FieldKind::Text(default) => {
                let v = form.text(field.name);
                Value::String(if v.is_empty() { default.to_string() } else { v })
            }
            FieldKind::Number(default) => {
                let v = form.text(field.name);
                if v.is_empty() {
                    Value::from(default)
                } else {
                    let n: i64 = v
                        .parse()
                        .map_err(|_| format!("Field {} must be a whole number.", field.name))?;
                    Value::from(n)
                }
            }
        };
        data.insert(field.name.to_string(), value);
    }
    Ok(data)
}

/// Comma-separated country codes, deduplicated. Unknown codes are rejected.
pub(crate) fn parse_countries(raw: &str) -> Result<Vec<String>, String> {
    let mut out: Vec<String> = Vec::new();
    for code in raw.split(',').map(|c| c.trim().to_uppercase()).filter(|c| !c.is_empty()) {
        if country_name(&code).is_none() {
            return Err(format!("Unknown country code: {}", code));
        }
        if !out.contains(&code) {
            out.push(code);
        }
    }
    Ok(out)
}

#[post("/payment-methods", data = "<form>")]
pub fn payment_methods_action(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    client_ip: ClientIp,
    form: Form<HashMap<String, String>>,
) -> FlashResult {
    let s: &dyn Store = &**store.inner();
    let form = FormData(form.into_inner());
    let back = PanelRedirect::new(slug, "payment-methods");

    if !form.csrf_ok(&admin) {
        return back.error(csrf::INVALID_TOKEN);
    }

    match form.action().as_str() {
        "update_payment_method" => {
            let method = form.text("method_name");
            let config_data = match build_config_data(&method, &form, &s.payment_config_get(&method)) {
                Ok(d) => d,
                Err(msg) => return back.error(msg),
            };
            let allowed_countries = match parse_countries(&form.text("allowed_countries")) {
                Ok(c) => c,
                Err(msg) => return back.error(msg),
            };
            let config = PaymentMethodConfig {
                method_name: method.clone(),
                is_enabled: form.checkbox("is_enabled"),
                allowed_countries,
                config_data,
                instructions: form.text("instructions"),
                email_template: form.text("email_template"),
                updated_at: None,
            };
            if let Err(e) = s.payment_config_upsert(&config) {
                return back.failed("Error updating payment method", &e);
            }
            s.audit_log(
                &audit_event(&admin, &client_ip.0, "update_payment_method", "payment_method")
                    .entity(None, &method)
                    .details(Value::Object(config.redacted_config()).to_string()),
            );
            back.success("Payment method configuration updated successfully!")
        }
        "assign_subscription" => {
            let Some(user_id) = form.id("user_id") else {
                return back.error("User ID is required.");
            };
            let code = form.text("admin_2fa_code");
            if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
                return back.error("A 6-digit two-factor code is required.");
            }
            if !admin.user.two_factor_enabled || admin.user.two_factor_secret.is_empty() {
                return back.error("Enable two-factor authentication before assigning subscriptions.");
            }
            if !mfa::verify_code(&admin.user.two_factor_secret, &code) {
                log::warn!("Invalid 2FA code from {} on subscription assignment", admin.user.email);
                return back.error("Invalid two-factor authentication code.");
            }
            let Some(target) = s.user_get_by_id(user_id) else {
                return back.error("User not found.");
            };
            if let Err(e) = s.payment_scheme_assign_subscription(user_id, admin.user.id) {
                return back.failed("Error assigning subscription", &e);
            }
            s.audit_log(
                &audit_event(&admin, &client_ip.0, "assign_subscription", "user")
                    .entity(Some(user_id), &target.email),
            );
            back.success(format!("Subscription scheme assigned to {}.", target.full_name()))
        }
        _ => back.error(INVALID_ACTION),
    }
}

#[get("/payment-methods/2fa/setup")]
pub fn two_factor_setup(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = &**store.inner();
    let mut context = page_context(&admin, slug, s, "Two-Factor Authentication", "payment_methods", flash);
    context["enabled"] = json!(admin.user.two_factor_enabled);

    if !admin.user.two_factor_enabled {
        // Pending secret lives on the user row until a code confirms it.
        let secret = mfa::generate_secret();
        match s.user_update_two_factor(admin.user.id, false, &secret) {
            Ok(()) => match mfa::qr_data_uri(&secret, &admin.user.email) {
                Ok(qr) => {
                    context["qr"] = json!(qr);
                    context["secret"] = json!(secret);
                }
                Err(e) => log::error!("QR generation failed: {}", e),
            },
            Err(e) => log::error!("Failed to store pending 2FA secret: {}", e),
        }
    }
    Template::render("admin/payment_2fa", &context)
}

#[post("/payment-methods/2fa/enable", data = "<form>")]
pub fn two_factor_enable(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    client_ip: ClientIp,
    form: Form<HashMap<String, String>>,
) -> FlashResult {
    let s: &dyn Store = &**store.inner();
    let form = FormData(form.into_inner());
    let back = PanelRedirect::new(slug, "payment-methods/2fa/setup");

    if !form.csrf_ok(&admin) {
        return back.error(csrf::INVALID_TOKEN);
    }
    if admin.user.two_factor_enabled {
        return back.error("Two-factor authentication is already enabled.");
    }
    if admin.user.two_factor_secret.is_empty() {
        return back.error("No pending setup. Reload the page to start again.");
    }
    if !mfa::verify_code(&admin.user.two_factor_secret, &form.text("code")) {
        return back.error("Invalid code. Please try again.");
    }
    if let Err(e) = s.user_update_two_factor(admin.user.id, true, &admin.user.two_factor_secret) {
        return back.failed("Error enabling 2FA", &e);
    }
    s.audit_log(
        &audit_event(&admin, &client_ip.0, "enable_2fa", "user").entity(Some(admin.user.id), &admin.user.email),
    );
    PanelRedirect::new(slug, "payment-methods").success("Two-factor authentication enabled.")
}
