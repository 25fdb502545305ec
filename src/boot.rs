use log::{error, info, warn};
use std::fs;
use std::path::Path;
use std::process;

use crate::config::AppConfig;

/// Required directories that will be created if missing
const REQUIRED_DIRS: &[&str] = &[
    "website",
    "website/db",
    "website/cache",
    "website/static",
    "website/static/css",
    "website/templates",
    "website/templates/admin",
];

/// Critical template files; the server cannot function without these
const CRITICAL_TEMPLATES: &[&str] = &[
    "website/templates/admin/base.html.tera",
    "website/templates/admin/login.html.tera",
    "website/templates/admin/dashboard.html.tera",
];

/// Templates for individual panels; a missing one only breaks that page
const PANEL_TEMPLATES: &[&str] = &[
    "website/templates/admin/analytics.html.tera",
    "website/templates/admin/change_password.html.tera",
    "website/templates/admin/edge_network.html.tera",
    "website/templates/admin/email_templates.html.tera",
    "website/templates/admin/fee_templates.html.tera",
    "website/templates/admin/fee_template_preview.html.tera",
    "website/templates/admin/payment_methods.html.tera",
    "website/templates/admin/payment_2fa.html.tera",
    "website/templates/admin/seo_automation.html.tera",
    "website/templates/admin/system_settings.html.tera",
    "website/templates/admin/users.html.tera",
];

/// Critical static assets
const CRITICAL_STATIC: &[&str] = &["website/static/css/admin.css"];

/// Run all boot checks. Call this before Rocket launches.
/// Creates missing directories, warns about missing files, and
/// aborts if critical dependencies are absent.
pub fn run(config: &AppConfig) {
    info!("LoanFlow boot check starting...");

    let mut warnings = 0u32;
    let mut errors = 0u32;

    // ── 1. Directories ─────────────────────────────────
    let backup_dir = config.backup_dir.as_str();
    for dir in REQUIRED_DIRS.iter().copied().chain(std::iter::once(backup_dir)) {
        let path = Path::new(dir);
        if !path.exists() {
            match fs::create_dir_all(path) {
                Ok(_) => info!("  Created directory: {}", dir),
                Err(e) => {
                    error!("  FAILED to create directory {}: {}", dir, e);
                    errors += 1;
                }
            }
        }
    }

    // ── 2. Critical templates ──────────────────────────
    for file in CRITICAL_TEMPLATES {
        if !Path::new(file).exists() {
            error!("  MISSING critical template: {}", file);
            errors += 1;
        }
    }

    // ── 3. Panel templates ─────────────────────────────
    for file in PANEL_TEMPLATES {
        if !Path::new(file).exists() {
            warn!("  Missing template: {} (that panel will 500)", file);
            warnings += 1;
        }
    }

    // ── 4. Critical static assets ──────────────────────
    for file in CRITICAL_STATIC {
        if !Path::new(file).exists() {
            warn!("  Missing static asset: {} (admin UI will be unstyled)", file);
            warnings += 1;
        }
    }

    // ── 5. Writable data directories ───────────────────
    let db_dir = Path::new(&config.db_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if !dir_writable(db_dir) {
        error!("  Database directory not writable: {}", db_dir.display());
        errors += 1;
    }
    if !dir_writable(Path::new(backup_dir)) {
        warn!("  Backup directory not writable: {} (backups will fail)", backup_dir);
        warnings += 1;
    }

    // ── 6. Rocket.toml exists ───────────────────────────
    if !Path::new("Rocket.toml").exists() {
        warn!("  Rocket.toml not found, using default config");
        warnings += 1;
    }

    // ── Summary ─────────────────────────────────────────
    if errors > 0 {
        error!(
            "Boot check FAILED: {} error(s), {} warning(s). Aborting.",
            errors, warnings
        );
        process::exit(1);
    }

    if warnings > 0 {
        warn!(
            "Boot check passed with {} warning(s). Some features may not work correctly.",
            warnings
        );
    } else {
        info!("Boot check passed. All systems go.");
    }
}

fn dir_writable(dir: &Path) -> bool {
    if !dir.exists() {
        return false;
    }
    let test_file = dir.join(".write_test");
    match fs::write(&test_file, "test") {
        Ok(_) => {
            let _ = fs::remove_file(&test_file);
            true
        }
        Err(_) => false,
    }
}
