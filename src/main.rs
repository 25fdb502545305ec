#[macro_use]
extern crate rocket;

use std::sync::Arc;

use rocket::fairing::{Fairing, Info, Kind};
use rocket::fs::FileServer;
use rocket::http::Header;
use rocket::response::content::RawHtml;
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;

mod backup;
mod boot;
mod config;
mod db;
mod email;
mod export;
mod models;
mod rate_limit;
mod routes;
mod security;
mod seo;
mod store;
mod tasks;

#[cfg(test)]
mod tests;

use config::AppConfig;
use rate_limit::RateLimiter;
use store::sqlite::SqliteStore;
use store::Store;

/// Holds the admin URL slug, read from `loanflow.toml` at startup.
/// Shared via Rocket managed state so routes, fairings, and templates can access it.
pub struct AdminSlug(pub String);

impl AdminSlug {
    pub fn get(&self) -> &str {
        &self.0
    }
}

pub struct NoCacheAdmin;

#[rocket::async_trait]
impl Fairing for NoCacheAdmin {
    fn info(&self) -> Info {
        Info { name: "No-Cache Admin Pages", kind: Kind::Response }
    }

    async fn on_response<'r>(&self, req: &'r rocket::Request<'_>, res: &mut rocket::Response<'r>) {
        let slug = req.rocket().state::<AdminSlug>()
            .map(|s| s.0.as_str())
            .unwrap_or("admin");
        let prefix = format!("/{}", slug);
        if req.uri().path().starts_with(&*prefix) {
            res.set_header(Header::new("Cache-Control", "no-store, no-cache, must-revalidate, max-age=0"));
            res.set_header(Header::new("Pragma", "no-cache"));
        }
    }
}

#[catch(404)]
fn not_found() -> RawHtml<String> {
    RawHtml("<html><body style='font-family:sans-serif;text-align:center;padding:80px'><h1>404</h1><p>Page not found.</p></body></html>".to_string())
}

#[catch(500)]
fn server_error() -> RawHtml<String> {
    RawHtml("<html><body style='font-family:sans-serif;text-align:center;padding:80px'><h1>500</h1><p>Internal server error.</p></body></html>".to_string())
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    let config = AppConfig::load();

    // Boot check: create directories, validate critical files
    boot::run(&config);

    let pool = db::init_pool(&config.db_path).expect("Failed to initialize database pool");
    db::run_migrations(&pool).expect("Failed to run database migrations");
    db::seed_defaults(&pool).expect("Failed to seed default settings");
    if db::seed_admin(&pool, &config.admin_email, &config.admin_password)
        .expect("Failed to seed the first administrator")
    {
        log::warn!(
            "Created initial administrator {}; the password must be changed at first login",
            config.admin_email
        );
    }

    let store: Arc<dyn Store> = Arc::new(SqliteStore::new(pool));
    log::info!("Admin panel mounted at: /{}", config.admin_slug);

    build_rocket(store, config).attach(tasks::BackgroundTasks)
}

/// Managed state, fairings, routes and catchers around an initialized store.
fn build_rocket(store: Arc<dyn Store>, config: AppConfig) -> Rocket<Build> {
    let admin_mount = format!("/{}", config.admin_slug);
    rocket::build()
        .manage(store)
        .manage(Arc::new(RateLimiter::new()))
        .manage(AdminSlug(config.admin_slug.clone()))
        .manage(config)
        .attach(Template::fairing())
        .attach(NoCacheAdmin)
        .mount("/static", FileServer::from("website/static"))
        .mount(&admin_mount, routes::security::routes())
        .mount(&admin_mount, routes::admin::routes())
        .register("/", catchers![not_found, server_error])
}
