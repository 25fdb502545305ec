use rocket::request::FlashMessage;
use rocket::State;
use rocket_dyn_templates::Template;
use std::sync::Arc;

use super::page_context;
use crate::security::auth::AdminUser;
use crate::store::Store;
use crate::AdminSlug;

// ── Dashboard ──────────────────────────────────────────

#[get("/")]
pub fn dashboard(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = &**store.inner();
    let mut context = page_context(&admin, slug, s, "Dashboard", "dashboard", flash);

    context["overview"] = serde_json::json!(s.analytics_overview());
    context["user_stats"] = serde_json::json!(s.user_stats());
    context["payment_stats"] = serde_json::json!(s.payment_stats());
    context["recent_activity"] = serde_json::json!(s.audit_list(None, 10, 0));
    context["recent_backups"] = serde_json::json!(s.backup_log_recent(5));

    Template::render("admin/dashboard", &context)
}
