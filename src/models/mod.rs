pub mod analytics;
pub mod audit;
pub mod backup_log;
pub mod email_component;
pub mod fee_template;
pub mod payment_method;
pub mod seo;
pub mod session;
pub mod settings;
pub mod user;
