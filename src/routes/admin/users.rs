use std::collections::HashMap;
use std::sync::Arc;

use rocket::form::Form;
use rocket::http::Status;
use rocket::request::FlashMessage;
use rocket::serde::json::Json;
use rocket::State;
use rocket_dyn_templates::Template;
use serde_json::{json, Value};

use super::{
    audit_event, is_valid_email, json_fail, page_context, FlashResult, FormData, JsonResult, PanelRedirect,
    GENERIC_ERROR, INVALID_ACTION,
};
use crate::email;
use crate::export::{self, Download, ExportFormat, Records};
use crate::models::user::{User, UserFilter, UserForm, EDITABLE_STATUSES, ROLES};
use crate::security::auth::{self, AdminUser, ClientIp};
use crate::security::csrf;
use crate::store::Store;
use crate::AdminSlug;

const PER_PAGE: i64 = 20;
const EXPORT_LIMIT: i64 = 100_000;
const LAST_ADMIN: &str = "At least one active administrator must remain.";

/// Columns written by the user export. Secrets are not in the list.
pub const EXPORT_COLUMNS: &[&str] = &[
    "id",
    "first_name",
    "last_name",
    "email",
    "phone",
    "role",
    "status",
    "failed_login_attempts",
    "last_login",
    "two_factor_enabled",
    "security_level",
    "created_at",
];

pub const BULK_OPERATIONS: &[&str] = &["activate", "deactivate", "unlock", "reset_password", "delete"];

fn filter_from(search: Option<&str>, role: Option<&str>, status: Option<&str>) -> UserFilter {
    let clean = |v: Option<&str>| v.map(str::trim).unwrap_or("").to_string();
    UserFilter {
        search: clean(search),
        role: clean(role),
        status: clean(status),
    }
}

pub(crate) fn total_pages(total: i64, per_page: i64) -> i64 {
    if total <= 0 {
        1
    } else {
        (total + per_page - 1) / per_page
    }
}

#[get("/users?<search>&<role>&<status>&<page>")]
#[allow(clippy::too_many_arguments)]
pub fn users_list(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    search: Option<&str>,
    role: Option<&str>,
    status: Option<&str>,
    page: Option<i64>,
    flash: Option<FlashMessage<'_>>,
) -> Template {
    let s: &dyn Store = &**store.inner();
    let filter = filter_from(search, role, status);
    let current_page = page.unwrap_or(1).max(1);
    let offset = (current_page - 1) * PER_PAGE;

    let users = s.user_list_filtered(&filter, PER_PAGE, offset);
    let total = s.user_count_filtered(&filter);

    let mut context = page_context(&admin, slug, s, "User Management", "users", flash);
    context["users"] = json!(users.iter().map(User::safe_json).collect::<Vec<_>>());
    context["stats"] = json!(s.user_stats());
    context["total"] = json!(total);
    context["current_page"] = json!(current_page);
    context["total_pages"] = json!(total_pages(total, PER_PAGE));
    context["filter"] = json!({"search": filter.search, "role": filter.role, "status": filter.status});
    context["roles"] = json!(ROLES);
    context["statuses"] = json!(EDITABLE_STATUSES);
    context["min_password_length"] = json!(auth::password_min_length(s));
    Template::render("admin/users", &context)
}

/// Account fields shared by create and update.
pub(crate) fn user_form(form: &FormData) -> Result<UserForm, &'static str> {
    let first_name = form.text("first_name");
    let last_name = form.text("last_name");
    let email = form.text("email").to_lowercase();
    if first_name.is_empty() || last_name.is_empty() || email.is_empty() {
        return Err("First name, last name and email are required.");
    }
    if !is_valid_email(&email) {
        return Err("Please enter a valid email address.");
    }
    let role = match form.text("role") {
        r if r.is_empty() => "user".to_string(),
        r if ROLES.contains(&r.as_str()) => r,
        _ => return Err("Invalid role."),
    };
    let status = match form.text("status") {
        st if st.is_empty() => "active".to_string(),
        st if EDITABLE_STATUSES.contains(&st.as_str()) => st,
        _ => return Err("Invalid status."),
    };
    Ok(UserForm {
        first_name,
        last_name,
        email,
        phone: form.text("phone"),
        role,
        status,
    })
}

/// True when changing `target` to `role`/`status` would leave no active admin.
pub(crate) fn removes_last_admin(store: &dyn Store, target: &User, role: &str, status: &str) -> bool {
    let stays_admin = role == "admin" && status == "active";
    target.is_admin() && target.is_active() && !stays_admin && store.user_count_active_admins() <= 1
}

/// Reset a password to a temporary one and mail it. Sessions are dropped.
fn reset_user_password(store: &Arc<dyn Store>, target: &User) -> Result<(), String> {
    let s: &dyn Store = &**store;
    let temp = auth::generate_temp_password();
    let hash = auth::hash_password(&temp)?;
    s.user_set_password(target.id, &hash, true)?;
    s.session_delete_for_user(target.id)?;
    email::send_password_reset_email(store.clone(), target.email.clone(), target.first_name.clone(), temp);
    Ok(())
}

/// Lookup for account actions. Soft-deleted rows count as missing.
pub(crate) fn live_user(store: &dyn Store, id: i64) -> Option<User> {
    store.user_get_by_id(id).filter(|u| u.status != "deleted")
}

/// Soft delete plus session teardown.
fn delete_user(store: &dyn Store, id: i64) -> Result<(), String> {
    store.user_soft_delete(id)?;
    store.session_delete_for_user(id)
}

#[post("/users", data = "<form>")]
pub fn users_action(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    slug: &State<AdminSlug>,
    client_ip: ClientIp,
    form: Form<HashMap<String, String>>,
) -> FlashResult {
    let shared: &Arc<dyn Store> = store.inner();
    let s: &dyn Store = &**shared;
    let form = FormData(form.into_inner());
    let back = PanelRedirect::new(slug, "users");

    if !form.csrf_ok(&admin) {
        return back.error(csrf::INVALID_TOKEN);
    }

    match form.action().as_str() {
        "create_user" => {
            let account = match user_form(&form) {
                Ok(a) => a,
                Err(msg) => return back.error(msg),
            };
            let password = form.0.get("password").cloned().unwrap_or_default();
            if password.is_empty() {
                return back.error("Password is required.");
            }
            let min = auth::password_min_length(s);
            if password.chars().count() < min {
                return back.error(format!("Password must be at least {} characters.", min));
            }
            if s.user_email_taken(&account.email, None) {
                return back.error("A user with this email already exists.");
            }
            let hash = match auth::hash_password(&password) {
                Ok(h) => h,
                Err(e) => return back.failed("Password hashing failed", &e),
            };
            match s.user_create(&account, &hash) {
                Ok(id) => {
                    s.audit_log(
                        &audit_event(&admin, &client_ip.0, "create_user", "user")
                            .entity(Some(id), &account.email)
                            .details(format!("role {}", account.role)),
                    );
                    email::send_welcome_email(
                        shared.clone(),
                        account.email.clone(),
                        account.first_name.clone(),
                        password,
                    );
                    back.success("User created successfully!")
                }
                Err(e) => back.failed("Error creating user", &e),
            }
        }
        "update_user" => {
            let Some(target) = form.id("user_id").and_then(|id| live_user(s, id)) else {
                return back.error("User not found.");
            };
            let account = match user_form(&form) {
                Ok(a) => a,
                Err(msg) => return back.error(msg),
            };
            if s.user_email_taken(&account.email, Some(target.id)) {
                return back.error("A user with this email already exists.");
            }
            if removes_last_admin(s, &target, &account.role, &account.status) {
                return back.error(LAST_ADMIN);
            }
            match s.user_update(target.id, &account) {
                Ok(()) => {
                    s.audit_log(
                        &audit_event(&admin, &client_ip.0, "update_user", "user").entity(Some(target.id), &account.email),
                    );
                    back.success("User updated successfully!")
                }
                Err(e) => back.failed("Error updating user", &e),
            }
        }
        "delete_user" => {
            let Some(target) = form.id("user_id").and_then(|id| live_user(s, id)) else {
                return back.error("User not found.");
            };
            if target.id == admin.user.id {
                return back.error("You cannot delete your own account.");
            }
            if removes_last_admin(s, &target, "", "deleted") {
                return back.error(LAST_ADMIN);
            }
            match delete_user(s, target.id) {
                Ok(()) => {
                    s.audit_log(
                        &audit_event(&admin, &client_ip.0, "delete_user", "user").entity(Some(target.id), &target.email),
                    );
                    back.success("User deleted successfully!")
                }
                Err(e) => back.failed("Error deleting user", &e),
            }
        }
        "reset_password" => {
            let Some(target) = form.id("user_id").and_then(|id| live_user(s, id)) else {
                return back.error("User not found.");
            };
            match reset_user_password(shared, &target) {
                Ok(()) => {
                    s.audit_log(
                        &audit_event(&admin, &client_ip.0, "reset_password", "user").entity(Some(target.id), &target.email),
                    );
                    back.success(format!("Password reset. A temporary password was sent to {}.", target.email))
                }
                Err(e) => back.failed("Error resetting password", &e),
            }
        }
        "unlock_account" => {
            let Some(target) = form.id("user_id").and_then(|id| live_user(s, id)) else {
                return back.error("User not found.");
            };
            match s.user_unlock(target.id) {
                Ok(()) => {
                    s.audit_log(
                        &audit_event(&admin, &client_ip.0, "unlock_account", "user").entity(Some(target.id), &target.email),
                    );
                    back.success("Account unlocked successfully!")
                }
                Err(e) => back.failed("Error unlocking account", &e),
            }
        }
        "bulk_action" => {
            let operation = form.text("bulk_operation");
            if !BULK_OPERATIONS.contains(&operation.as_str()) {
                return back.error("Invalid bulk operation.");
            }
            let ids = parse_ids(&form.text("user_ids"));
            if ids.is_empty() {
                return back.error("No users selected.");
            }
            let done = run_bulk(shared, &admin, &operation, &ids);
            s.audit_log(
                &audit_event(&admin, &client_ip.0, "bulk_action", "user")
                    .details(format!("{} on {} of {} users", operation, done, ids.len())),
            );
            back.success(format!("Bulk {} applied to {} users.", operation.replace('_', " "), done))
        }
        _ => back.error(INVALID_ACTION),
    }
}

/// Comma list of ids; junk entries and duplicates are dropped.
pub(crate) fn parse_ids(raw: &str) -> Vec<i64> {
    let mut ids: Vec<i64> = Vec::new();
    for id in raw.split(',').filter_map(|p| p.trim().parse::<i64>().ok()) {
        if id > 0 && !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

/// Apply a bulk operation; the acting admin is always skipped. Returns the success count.
pub(crate) fn run_bulk(store: &Arc<dyn Store>, admin: &AdminUser, operation: &str, ids: &[i64]) -> usize {
    let s: &dyn Store = &**store;
    let mut done = 0;
    for &id in ids {
        if id == admin.user.id {
            continue;
        }
        let Some(target) = live_user(s, id) else {
            continue;
        };
        let result = match operation {
            "activate" => s.user_set_status(id, "active"),
            "deactivate" if removes_last_admin(s, &target, &target.role, "inactive") => Err(LAST_ADMIN.to_string()),
            "deactivate" => s.user_set_status(id, "inactive").and_then(|_| s.session_delete_for_user(id)),
            "unlock" => s.user_unlock(id),
            "reset_password" => reset_user_password(store, &target),
            "delete" if removes_last_admin(s, &target, "", "deleted") => Err(LAST_ADMIN.to_string()),
            "delete" => delete_user(s, id),
            _ => Err(INVALID_ACTION.to_string()),
        };
        match result {
            Ok(()) => done += 1,
            Err(e) => log::warn!("Bulk {} skipped user {}: {}", operation, id, e),
        }
    }
    done
}

#[get("/users/export?<format>&<search>&<role>&<status>")]
pub fn users_export(
    admin: AdminUser,
    store: &State<Arc<dyn Store>>,
    client_ip: ClientIp,
    format: Option<&str>,
    search: Option<&str>,
    role: Option<&str>,
    status: Option<&str>,
) -> Result<Download, JsonResult> {
    let s: &dyn Store = &**store.inner();
    let fmt = ExportFormat::parse(format.unwrap_or("csv").trim())
        .ok_or_else(|| json_fail(Status::BadRequest, "Invalid export format"))?;
    let filter = filter_from(search, role, status);
    let users: Vec<Value> = s
        .user_list_filtered(&filter, EXPORT_LIMIT, 0)
        .iter()
        .map(User::safe_json)
        .collect();
    let records = Records::from_json_rows(EXPORT_COLUMNS, &users);
    let body = export::render(&records, fmt, "users_export").map_err(|e| {
        log::error!("User export rendering failed: {}", e);
        json_fail(Status::InternalServerError, GENERIC_ERROR)
    })?;

    s.audit_log(
        &audit_event(&admin, &client_ip.0, "export", "user")
            .details(format!("{} users as {}", records.rows.len(), fmt.extension())),
    );

    Ok(Download {
        filename: export::export_filename("users_export", s.site_now(), fmt),
        content_type: fmt.content_type(),
        body: body.into_bytes(),
    })
}

#[get("/users/<id>", rank = 2)]
pub fn user_detail(_admin: AdminUser, store: &State<Arc<dyn Store>>, id: i64) -> JsonResult {
    let s: &dyn Store = &**store.inner();
    match live_user(s, id) {
        Some(user) => (
            Status::Ok,
            Json(json!({
                "success": true,
                "user": user.safe_json(),
                "payment_scheme": s.payment_scheme_get(user.id),
            })),
        ),
        None => json_fail(Status::NotFound, "User not found"),
    }
}
