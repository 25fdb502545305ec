use rocket::fairing::{Fairing, Info, Kind};
use rocket::tokio;
use rocket::{Orbit, Rocket};
use std::sync::Arc;
use std::time::Duration;

use crate::backup::{self, BackupKind};
use crate::config::AppConfig;
use crate::rate_limit::RateLimiter;
use crate::store::Store;

const BACKUP_CHECK_INTERVAL: Duration = Duration::from_secs(5 * 60);

pub struct BackgroundTasks;

#[rocket::async_trait]
impl Fairing for BackgroundTasks {
    fn info(&self) -> Info {
        Info {
            name: "Background Tasks",
            kind: Kind::Liftoff,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (Some(store), Some(limiter), Some(config)) = (
            rocket.state::<Arc<dyn Store>>(),
            rocket.state::<Arc<RateLimiter>>(),
            rocket.state::<AppConfig>(),
        ) else {
            log::error!("[task] Managed state missing; background tasks not started");
            return;
        };

        // Session cleanup task
        let s = Arc::clone(store);
        let rl = Arc::clone(limiter);
        tokio::spawn(async move {
            loop {
                let interval = get_interval(&*s, "task_session_cleanup_interval", 30);
                tokio::time::sleep(Duration::from_secs(interval * 60)).await;
                match s.session_cleanup_expired() {
                    Ok(count) => {
                        if count > 0 {
                            log::info!("[task] Cleaned up {} expired sessions", count);
                        }
                    }
                    Err(e) => log::error!("[task] Session cleanup failed: {}", e),
                }
                rl.cleanup(crate::rate_limit::LOGIN_WINDOW);
            }
        });

        // Audit log cleanup task
        let s = Arc::clone(store);
        tokio::spawn(async move {
            loop {
                let interval = get_interval(&*s, "task_audit_log_cleanup_interval", 1440);
                tokio::time::sleep(Duration::from_secs(interval * 60)).await;
                let max_age = get_setting_i64(&*s, "task_audit_log_max_age_days", 90);
                match s.audit_cleanup(max_age) {
                    Ok(count) => {
                        if count > 0 {
                            log::info!("[task] Cleaned up {} old audit log entries", count);
                        }
                    }
                    Err(e) => log::error!("[task] Audit log cleanup failed: {}", e),
                }
            }
        });

        // Weekly backup check
        let s = Arc::clone(store);
        let backup_dir = config.backup_dir.clone();
        let backup_sources = config.backup_sources.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(BACKUP_CHECK_INTERVAL).await;
                let now = s.site_now();
                let ran_recently = s.backup_log_exists_since(BackupKind::Automatic.as_str(), 23);
                if !backup::weekly_backup_due(&s.setting_all(), now, ran_recently) {
                    continue;
                }
                let s2 = Arc::clone(&s);
                let dir = backup_dir.clone();
                let sources = backup_sources.clone();
                let result = tokio::task::spawn_blocking(move || {
                    backup::create_complete_backup(&*s2, &dir, &sources, BackupKind::Automatic)
                })
                .await;
                match result {
                    Ok(Ok(outcome)) => log::info!("[task] Weekly backup {} created", outcome.name),
                    Ok(Err(e)) => log::error!("[task] Weekly backup failed: {}", e),
                    Err(e) => log::error!("[task] Weekly backup worker panicked: {}", e),
                }
            }
        });

        log::info!("[task] Background tasks started");
    }
}

fn get_interval(store: &dyn Store, key: &str, default: u64) -> u64 {
    store
        .setting_get_or(key, &default.to_string())
        .parse::<u64>()
        .unwrap_or(default)
        .max(1)
}

fn get_setting_i64(store: &dyn Store, key: &str, default: i64) -> i64 {
    store
        .setting_get_or(key, &default.to_string())
        .parse::<i64>()
        .unwrap_or(default)
}
