use std::path::Path;

const CONFIG_FILE: &str = "loanflow.toml";

/// Process-level configuration from `loanflow.toml`. Everything else lives in the
/// `settings` table.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub admin_slug: String,
    pub db_path: String,
    pub backup_dir: String,
    /// Project paths copied under `files/` in a complete backup.
    pub backup_sources: Vec<String>,
    pub admin_email: String,
    pub admin_password: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            admin_slug: "admin".to_string(),
            db_path: "website/db/loanflow.db".to_string(),
            backup_dir: "website/backups".to_string(),
            backup_sources: vec![
                "website".to_string(),
                "Rocket.toml".to_string(),
                CONFIG_FILE.to_string(),
            ],
            admin_email: "admin@loanflow.com".to_string(),
            admin_password: "admin123".to_string(),
        }
    }
}

impl AppConfig {
    /// Read `loanflow.toml` from the working directory. A missing or unparsable file
    /// yields the defaults.
    pub fn load() -> Self {
        if !Path::new(CONFIG_FILE).exists() {
            return Self::default();
        }
        match std::fs::read_to_string(CONFIG_FILE) {
            Ok(s) => Self::from_toml_str(&s),
            Err(e) => {
                log::warn!("Could not read {}: {}", CONFIG_FILE, e);
                Self::default()
            }
        }
    }

    pub fn from_toml_str(s: &str) -> Self {
        let value = match s.parse::<toml::Value>() {
            Ok(v) => v,
            Err(e) => {
                log::warn!("Invalid {}: {}", CONFIG_FILE, e);
                return Self::default();
            }
        };
        let get = |section: &str, key: &str| -> Option<String> {
            value
                .get(section)?
                .get(key)?
                .as_str()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let defaults = Self::default();
        AppConfig {
            admin_slug: get("server", "admin_slug")
                .map(|s| s.trim_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.admin_slug),
            db_path: get("database", "path").unwrap_or(defaults.db_path),
            backup_dir: get("backup", "dir").unwrap_or(defaults.backup_dir),
            backup_sources: value
                .get("backup")
                .and_then(|b| b.get("sources"))
                .and_then(|v| v.as_array())
                .map(|list| {
                    list.iter()
                        .filter_map(|v| v.as_str())
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.backup_sources),
            admin_email: get("admin", "email").unwrap_or(defaults.admin_email),
            admin_password: get("admin", "password").unwrap_or(defaults.admin_password),
        }
    }
}
