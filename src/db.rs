use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn init_pool(path: &str) -> Result<DbPool, Box<dyn std::error::Error>> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    let manager = SqliteConnectionManager::file(path)
        .with_init(|c| c.execute_batch("PRAGMA foreign_keys=ON;"));
    let pool = Pool::builder().max_size(10).build(manager)?;

    // WAL gives readers a consistent view while a writer holds the lock
    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    conn.execute_batch(
        "
        -- Key/value configuration (system settings, edge_*, seo_*, backup_*)
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL DEFAULT '',
            updated_by INTEGER,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Back-office and customer accounts
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            phone TEXT NOT NULL DEFAULT '',
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            status TEXT NOT NULL DEFAULT 'active',
            failed_login_attempts INTEGER NOT NULL DEFAULT 0,
            last_failed_login DATETIME,
            locked_until DATETIME,
            last_login DATETIME,
            password_changed INTEGER NOT NULL DEFAULT 1,
            password_reset_required INTEGER NOT NULL DEFAULT 0,
            two_factor_enabled INTEGER NOT NULL DEFAULT 0,
            two_factor_secret TEXT NOT NULL DEFAULT '',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            csrf_token TEXT NOT NULL,
            ip_address TEXT,
            user_agent TEXT,
            created_at DATETIME NOT NULL,
            expires_at DATETIME NOT NULL
        );

        CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY,
            user_id INTEGER,
            user_name TEXT,
            action TEXT NOT NULL,
            entity_type TEXT,
            entity_id INTEGER,
            entity_title TEXT,
            details TEXT,
            ip_address TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Reusable email building blocks
        CREATE TABLE IF NOT EXISTS email_components (
            id INTEGER PRIMARY KEY,
            component_type TEXT NOT NULL,
            component_name TEXT NOT NULL,
            html_content TEXT NOT NULL,
            is_default INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS email_template_variables (
            id INTEGER PRIMARY KEY,
            variable_name TEXT UNIQUE NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            sample_value TEXT NOT NULL DEFAULT ''
        );

        -- Fee payment form templates, one per country and payment method
        CREATE TABLE IF NOT EXISTS fee_form_templates (
            id INTEGER PRIMARY KEY,
            country TEXT NOT NULL,
            payment_method TEXT NOT NULL,
            template_name TEXT NOT NULL,
            instructions TEXT NOT NULL,
            email_template TEXT NOT NULL,
            required_fields TEXT NOT NULL DEFAULT '{}',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_by INTEGER,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(country, payment_method)
        );

        CREATE TABLE IF NOT EXISTS fee_sent_forms (
            id INTEGER PRIMARY KEY,
            user_id INTEGER,
            application_id INTEGER,
            country TEXT NOT NULL,
            payment_method TEXT NOT NULL,
            amount REAL NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'sent',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS payment_method_config (
            id INTEGER PRIMARY KEY,
            method_name TEXT UNIQUE NOT NULL,
            is_enabled INTEGER NOT NULL DEFAULT 0,
            allowed_countries TEXT NOT NULL DEFAULT '[]',
            config_data TEXT NOT NULL DEFAULT '{}',
            instructions TEXT NOT NULL DEFAULT '',
            email_template TEXT NOT NULL DEFAULT '',
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS user_payment_schemes (
            id INTEGER PRIMARY KEY,
            user_id INTEGER UNIQUE NOT NULL,
            scheme_type TEXT NOT NULL,
            assigned_by INTEGER NOT NULL,
            requires_2fa INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS payments (
            id INTEGER PRIMARY KEY,
            user_id INTEGER,
            amount REAL NOT NULL DEFAULT 0,
            payment_method TEXT NOT NULL,
            payment_type TEXT NOT NULL DEFAULT 'fee',
            status TEXT NOT NULL DEFAULT 'pending',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS loan_applications (
            id INTEGER PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT NOT NULL,
            phone TEXT NOT NULL DEFAULT '',
            loan_amount REAL NOT NULL DEFAULT 0,
            application_status TEXT NOT NULL DEFAULT 'pending',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS seo_activities (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS backup_logs (
            id INTEGER PRIMARY KEY,
            backup_name TEXT NOT NULL,
            backup_type TEXT NOT NULL,
            files_count INTEGER NOT NULL DEFAULT 0,
            total_size INTEGER NOT NULL DEFAULT 0,
            compressed_size INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_users_status ON users(status);
        CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
        CREATE INDEX IF NOT EXISTS idx_audit_created ON audit_log(created_at);
        CREATE INDEX IF NOT EXISTS idx_loans_status ON loan_applications(application_status);
        CREATE INDEX IF NOT EXISTS idx_payments_status ON payments(status);
        ",
    )?;

    Ok(())
}

pub fn seed_defaults(pool: &DbPool) -> Result<(), Box<dyn std::error::Error>> {
    let conn = pool.get()?;

    let defaults = vec![
        // General
        ("site_name", "LoanFlow"),
        ("site_email", "admin@loanflow.com"),
        ("admin_email", "admin@loanflow.com"),
        ("site_url", "http://localhost:8000"),
        ("timezone", "America/New_York"),
        ("date_format", "Y-m-d"),
        ("currency", "USD"),
        ("maintenance_mode", "0"),
        // Email
        ("smtp_host", ""),
        ("smtp_port", "587"),
        ("smtp_username", ""),
        ("smtp_password", ""),
        ("smtp_encryption", "tls"),
        ("mail_from_name", "LoanFlow"),
        ("mail_from_address", "noreply@loanflow.com"),
        // Security
        ("max_login_attempts", "5"),
        ("lockout_duration", "30"),
        ("session_timeout", "30"),
        ("password_min_length", "8"),
        ("require_2fa", "0"),
        ("ip_whitelist", ""),
        ("enable_audit_log", "1"),
        // Payment gateways
        ("paypal_enabled", "0"),
        ("paypal_client_id", ""),
        ("paypal_client_secret", ""),
        ("paypal_sandbox", "1"),
        ("stripe_enabled", "0"),
        ("stripe_publishable_key", ""),
        ("stripe_secret_key", ""),
        ("stripe_webhook_secret", ""),
        // Captcha
        ("captcha_enabled", "0"),
        ("captcha_provider", "custom"),
        ("recaptcha_site_key", ""),
        ("recaptcha_secret_key", ""),
        ("hcaptcha_site_key", ""),
        ("hcaptcha_secret_key", ""),
        ("captcha_protected_forms", "login,register,contact,loan_application"),
        // SEO automation
        ("seo_auto_backlinks", "0"),
        ("seo_auto_content_optimization", "0"),
        ("seo_auto_technical_fixes", "0"),
        ("seo_target_keywords", ""),
        ("seo_competitor_domains", ""),
        ("seo_semrush_api_key", ""),
        ("seo_ahrefs_api_key", ""),
        // Backups
        ("backup_max_retention", "4"),
        ("backup_email_notifications", "0"),
        ("backup_weekly_schedule", "0"),
        ("backup_schedule_day", "sunday"),
        ("backup_schedule_time", "02:00"),
        // Background tasks (minutes / days)
        ("task_session_cleanup_interval", "30"),
        ("task_audit_log_cleanup_interval", "1440"),
        ("task_audit_log_max_age_days", "90"),
    ];

    for (key, value) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
    }

    let variables = vec![
        ("customer_name", "Recipient full name", "John Doe"),
        ("customer_email", "Recipient email address", "customer@example.com"),
        ("company_name", "Site name", "LoanFlow"),
        ("company_email", "Site contact email", "admin@loanflow.com"),
        ("company_phone", "Support phone number", "+1 (555) 123-4567"),
        ("company_address", "Postal address", "123 Business Street, City, State 12345"),
        ("inquiry_id", "Reference of the inquiry", "INQ-20240101-001"),
        ("inquiry_date", "Date of the inquiry", "January 1, 2024"),
        ("inquiry_time", "Time of the inquiry", "9:00 AM"),
        ("message_content", "Body text of the message", "Your message content."),
        ("current_year", "Current year", "2024"),
    ];

    for (name, description, sample) in variables {
        conn.execute(
            "INSERT OR IGNORE INTO email_template_variables (variable_name, description, sample_value)
             VALUES (?1, ?2, ?3)",
            params![name, description, sample],
        )?;
    }

    Ok(())
}

/// Create the first administrator when the users table is empty.
/// The account must change its password at first login.
pub fn seed_admin(pool: &DbPool, email: &str, password: &str) -> Result<bool, Box<dyn std::error::Error>> {
    let conn = pool.get()?;
    let user_count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    if user_count > 0 {
        return Ok(false);
    }

    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    conn.execute(
        "INSERT INTO users (first_name, last_name, email, password_hash, role, status, password_changed)
         VALUES ('System', 'Administrator', ?1, ?2, 'admin', 'active', 0)",
        params![email, hash],
    )?;
    Ok(true)
}
