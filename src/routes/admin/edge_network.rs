use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

use super::{audit_event, page_context, FlashResult, FormData, PanelRedirect, INVALID_ACTION};
use crate::models::settings::is_truthy;
use crate::security::auth::{AdminUser, ClientIp};
use crate::security::csrf;
use crate::store::Store;
use crate::AdminSlug;

pub const EDGE_PREFIX: &str = "edge_";

const BOOL_KEYS: &[&str] = &["enabled", "auto_scaling", "load_balancing", "ddos_protection", "waf_enabled"];

const DEFAULTS: &[(&str, &str)] = &[
    ("enabled", "1"),
    ("auto_scaling", "1"),
    ("load_balancing", "1"),
    ("cache_level", "standard"),
    ("compression_level", "balanced"),
    ("min_tls_version", "1.2"),
    ("hsts_max_age", "31536000"),
    ("ddos_protection", "1"),
    ("ddos_sensitivity", "medium"),
    ("waf_enabled", "1"),
    ("waf_level", "medium"),
];

const CACHE_LEVELS: &[&str] = &["basic", "standard", "aggressive"];
const COMPRESSION_LEVELS: &[&str] = &["none", "balanced", "maximum"];
const TLS_VERSIONS: &[&str] = &["1.0", "1.1", "1.2", "1.3"];

/// Acknowledge-only actions: (action, button label, flash message).
const ACKNOWLEDGED: &[(&str, &str, &str)] = &[
    ("configure_cdn", "Configure CDN", "CDN configuration updated successfully!"),
    ("update_security_rules", "Update security rules", "Security rules updated successfully!"),
    ("configure_caching", "Configure caching", "Caching configuration updated successfully!"),
    ("update_ssl_settings", "Update SSL", "SSL settings updated successfully!"),
    ("configure_load_balancer", "Configure load balancer", "Load balancer configuration updated successfully!"),
    ("update_firewall_rules", "Update firewall rules", "Firewall rules updated successfully!"),
    ("configure_ddos_protection", "Configure DDoS protection", "DDoS protection configuration updated successfully!"),
];

/// Defaults overlaid with the stored `edge_*` group. Flags come back as JSON booleans,
/// `hsts_max_age` as a number.
pub fn effective_settings(stored: &HashMap<String, String>) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, default) in DEFAULTS {
        let raw = stored
            .get(&format!("{}{}", EDGE_PREFIX, key))
            .map(String::as_str)
            .unwrap_or(*default);
        let value = if BOOL_KEYS.contains(key) {
            Value::Bool(is_truthy(raw))
        } else if *key == "hsts_max_age" {
            raw.parse::<i64>().map(Value::from).unwrap_or_else(|_| json!(31536000))
        } else {
            Value::String(raw.to_string())
        };
        out.insert(key.to_string(), value);
    }
    out
}

/// Validated `edge_*` rows for `update_edge_settings`. Nothing is returned on any error.
pub(crate) fn validate_edge_form(form: &FormData) -> Result<HashMap<String, String>, String> {
    let pick = |key: &str, default: &str| {
        let v = form.text(key);
        if v.is_empty() {
            default.to_string()
        } else {
            v
        }
    };

    let cache_level = pick("cache_level", "standard");
    if !CACHE_LEVELS.contains(&cache_level.as_str()) {
        return Err("Invalid cache level.".into());
    }
    let compression_level = pick("compression_level", "balanced");
    if !COMPRESSION_LEVELS.contains(&compression_level.as_str()) {
        return Err("Invalid compression level.".into());
    }
    let min_tls_version = pick("min_tls_version", "1.2");
    if !TLS_VERSIONS.contains(&min_tls_version.as_str()) {
        return Err("Invalid minimum TLS version.".into());
    }
    let hsts_max_age = match pick("hsts_max_age", "31536000").parse::<i64>() {
        Ok(n) if n >= 0 => n,
        _ => return Err("HSTS max age must be a non-negative integer.".into()),
    };

    let flag = |b: bool| if b { "1" } else { "0" }.to_string();
    let mut rows = HashMap::new();
    for key in ["enabled", "auto_scaling", "load_balancing"] {
        rows.insert(format!("{}{}", EDGE_PREFIX, key), flag(form.checkbox(key)));
    }
    rows.insert(format!("{}cache_level", EDGE_PREFIX), cache_level);
    rows.insert(format!("{}compression_level", EDGE_PREFIX), compression_level);
    rows.insert(format!("{}min_tls_version", EDGE_PREFIX), min_tls_version);
    rows.insert(format!("{}hsts_max_age", EDGE_PREFIX), hsts_max_age.to_string());
    Ok(rows)
}

#[get("/edge-network")]
pub fn edge_page(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = &**store.inner();
    let mut context = page_context(&admin, slug, s, "Edge Network", "edge_network", flash);
    context["edge"] = Value::Object(effective_settings(&s.setting_get_group(EDGE_PREFIX)));
    context["cache_levels"] = json!(CACHE_LEVELS);
    context["compression_levels"] = json!(COMPRESSION_LEVELS);
    context["tls_versions"] = json!(TLS_VERSIONS);
    context["actions"] = json!(ACKNOWLEDGED
        .iter()
        .map(|(action, label, _)| json!({"action": action, "label": label}))
        .collect::<Vec<_>>());
    Template::render("admin/edge_network", &context)
}

#[post("/edge-network", data = "<form>")]
pub fn edge_action(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    client_ip: ClientIp,
    form: Form<HashMap<String, String>>,
) -> FlashResult {
    let s: &dyn Store = &**store.inner();
    let form = FormData(form.into_inner());
    let back = PanelRedirect::new(slug, "edge-network");

    if !form.csrf_ok(&admin) {
        return back.error(csrf::INVALID_TOKEN);
    }

    let action = form.action();
    if action == "update_edge_settings" {
        let rows = match validate_edge_form(&form) {
            Ok(rows) => rows,
            Err(msg) => return back.error(msg),
        };
        if let Err(e) = s.setting_set_many(&rows, Some(admin.user.id)) {
            return back.failed("Error updating edge settings", &e);
        }
        let mut keys: Vec<&str> = rows.keys().map(String::as_str).collect();
        keys.sort_unstable();
        s.audit_log(
            &audit_event(&admin, &client_ip.0, "update_edge_settings", "settings")
                .details(keys.join(", ")),
        );
        return back.success("Edge network settings updated successfully!");
    }

    match ACKNOWLEDGED.iter().find(|(name, _, _)| *name == action) {
        Some((name, _, message)) => {
            s.audit_log(&audit_event(&admin, &client_ip.0, name, "edge_network"));
            back.success(*message)
        }
        None => back.error(INVALID_ACTION),
    }
}
