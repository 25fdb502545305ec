use rocket::form::Form;
use rocket::request::FlashMessage;
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

use super::{audit_event, page_context, FlashResult, FormData, PanelRedirect, INVALID_ACTION};
use crate::seo::{self, sitemap, SEO_FLAGS, SEO_SECRETS, SEO_TEXT};
use crate::security::auth::{AdminUser, ClientIp};
use crate::security::csrf;
use crate::store::Store;
use crate::AdminSlug;

const SITEMAP_DIR: &str = "website/static";

#[get("/seo-automation")]
pub fn seo_page(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = &**store.inner();
    let mut context = page_context(&admin, slug, s, "SEO Automation", "seo_automation", flash);

    let mut settings = s.setting_get_group("seo_");
    // Secrets are never echoed back; the page only shows whether one is set.
    for key in SEO_SECRETS {
        let set = settings.remove(*key).map(|v| !v.is_empty()).unwrap_or(false);
        settings.insert(format!("{}_set", key), if set { "1" } else { "0" }.to_string());
    }
    context["settings"] = json!(settings);
    context["activities"] = json!(s.seo_activity_recent(10));
    context["actions"] = json!(seo::SEO_ACTIVITIES
        .iter()
        .map(|(action, title, _)| json!({"action": action, "title": title}))
        .collect::<Vec<_>>());
    Template::render("admin/seo_automation", &context)
}

/// Rows written by `update_seo_settings`. Blank secrets are left out so the stored
/// value survives.
pub(crate) fn seo_settings_rows(form: &FormData) -> HashMap<String, String> {
    let mut rows = HashMap::new();
    for key in SEO_FLAGS {
        rows.insert(key.to_string(), if form.checkbox(key) { "1" } else { "0" }.to_string());
    }
    for key in SEO_TEXT {
        rows.insert(key.to_string(), form.text(key));
    }
    for key in SEO_SECRETS {
        let v = form.text(key);
        if !v.is_empty() {
            rows.insert(key.to_string(), v);
        }
    }
    rows
}

#[post("/seo-automation", data = "<form>")]
pub fn seo_action(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    client_ip: ClientIp,
    form: Form<HashMap<String, String>>,
) -> FlashResult {
    let s: &dyn Store = &**store.inner();
    let form = FormData(form.into_inner());
    let back = PanelRedirect::new(slug, "seo-automation");

    if !form.csrf_ok(&admin) {
        return back.error(csrf::INVALID_TOKEN);
    }

    let action = form.action();
    if action == "update_seo_settings" {
        let rows = seo_settings_rows(&form);
        if let Err(e) = s.setting_set_many(&rows, Some(admin.user.id)) {
            return back.failed("Error updating SEO settings", &e);
        }
        let mut audited: Vec<&str> = rows
            .keys()
            .map(String::as_str)
            .filter(|k| !SEO_SECRETS.contains(k))
            .collect();
        audited.sort_unstable();
        s.audit_log(
            &audit_event(&admin, &client_ip.0, "update_seo_settings", "settings").details(audited.join(", ")),
        );
        return back.success("SEO settings updated successfully!");
    }

    let Some((title, description)) = seo::activity_for(&action) else {
        return back.error(INVALID_ACTION);
    };

    if action == "generate_sitemap" {
        let site_url = s.setting_get_or("site_url", "http://localhost:8000");
        let today = s.site_now().date();
        match sitemap::write_sitemap(SITEMAP_DIR, &site_url, today) {
            Ok(path) => log::info!("Sitemap written to {}", path),
            Err(e) => return back.failed("Error writing sitemap", &e),
        }
    }

    if let Err(e) = s.seo_activity_record(title, description) {
        return back.failed("Error recording SEO activity", &e);
    }
    s.audit_log(&audit_event(&admin, &client_ip.0, &action, "seo"));
    back.success(format!("{} completed successfully!", title))
}
