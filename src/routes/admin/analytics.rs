use rocket::http::Status;
use rocket::request::FlashMessage;
use rocket::serde::json::Json;
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{audit_event, json_fail, json_ok, page_context, JsonResult, GENERIC_ERROR, INVALID_ACTION};
use crate::export::{self, Download, ExportFormat};
use crate::models::analytics::{DateRange, ExportCategory};
use crate::security::auth::{AdminUser, ClientIp};
use crate::security::csrf::{self, CsrfHeader};
use crate::store::Store;
use crate::AdminSlug;

const TREND_MONTHS: i64 = 6;

#[get("/analytics")]
pub fn analytics_page(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = &**store.inner();
    let mut context = page_context(&admin, slug, s, "Advanced Analytics", "analytics", flash);
    context["overview"] = json!(s.analytics_overview());
    context["revenue_trend"] = json!(s.analytics_revenue_trend(TREND_MONTHS));
    context["status_distribution"] = json!(s.analytics_status_distribution());
    Template::render("admin/analytics", &context)
}

/// AJAX: `{action: "get_dashboard_data" | "generate_report"}`.
#[post("/analytics/api", format = "json", data = "<body>")]
pub fn analytics_api(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    csrf_header: CsrfHeader,
    client_ip: ClientIp,
    body: Json<Value>,
) -> JsonResult {
    let s: &dyn Store = &**store.inner();
    let token = csrf_header
        .0
        .or_else(|| body.get(csrf::CSRF_FIELD).and_then(|v| v.as_str()).map(String::from));
    if !admin.verify_csrf(token.as_deref()) {
        log::warn!("CSRF check failed on analytics api for {}", admin.user.email);
        return json_fail(Status::Forbidden, csrf::INVALID_TOKEN);
    }

    match body.get("action").and_then(|v| v.as_str()).unwrap_or("") {
        "get_dashboard_data" => {
            let data = json!({
                "revenue_trend": s.analytics_revenue_trend(TREND_MONTHS),
                "status_distribution": s.analytics_status_distribution(),
                "overview": s.analytics_overview(),
            });
            (Status::Ok, Json(json!({"success": true, "data": data})))
        }
        "generate_report" => {
            let report_id = format!("report_{}", uuid::Uuid::new_v4().simple());
            s.audit_log(
                &audit_event(&admin, &client_ip.0, "generate_report", "analytics")
                    .details(report_id.clone()),
            );
            json_ok(
                "Report generation started",
                json!({"report_id": report_id, "estimated_time": "2-3 minutes"}),
            )
        }
        _ => json_fail(Status::BadRequest, INVALID_ACTION),
    }
}

#[get("/analytics/export?<category>&<format>&<date_from>&<date_to>")]
pub fn analytics_export(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    client_ip: ClientIp,
    category: Option<&str>,
    format: Option<&str>,
    date_from: Option<&str>,
    date_to: Option<&str>,
) -> Result<Download, JsonResult> {
    let s: &dyn Store = &**store.inner();
    let invalid = || json_fail(Status::BadRequest, "Invalid export parameters");

    let category = ExportCategory::parse(category.unwrap_or("").trim()).ok_or_else(invalid)?;
    let fmt = ExportFormat::parse(format.unwrap_or("").trim()).ok_or_else(invalid)?;
    let range = parse_range(date_from, date_to).ok_or_else(invalid)?;

    let records = s.analytics_export(category, &range).map_err(|e| {
        log::error!("Analytics export failed: {}", e);
        json_fail(Status::InternalServerError, GENERIC_ERROR)
    })?;
    let body = export::render(&records, fmt, "analytics_export").map_err(|e| {
        log::error!("Analytics export rendering failed: {}", e);
        json_fail(Status::InternalServerError, GENERIC_ERROR)
    })?;

    s.audit_log(
        &audit_event(&admin, &client_ip.0, "export", "analytics")
            .details(format!("{} rows as {}", records.rows.len(), fmt.extension())),
    );

    Ok(Download {
        filename: export::export_filename("analytics_export", s.site_now(), fmt),
        content_type: fmt.content_type(),
        body: body.into_bytes(),
    })
}

/// Both bounds or neither; each must be `YYYY-MM-DD`.
pub(crate) fn parse_range(from: Option<&str>, to: Option<&str>) -> Option<DateRange> {
    let clean = |v: Option<&str>| v.map(str::trim).filter(|s| !s.is_empty()).map(String::from);
    let (from, to) = (clean(from), clean(to));
    let valid = |d: &String| chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").is_ok();
    match (&from, &to) {
        (None, None) => Some(DateRange::default()),
        (Some(f), Some(t)) if valid(f) && valid(t) => Some(DateRange { from, to }),
        _ => None,
    }
}
