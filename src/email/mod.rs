pub mod compose;
pub mod smtp;

use std::sync::Arc;

use crate::store::Store;

pub use compose::{build_complete_email, fill_placeholders};
use smtp::{send_smtp, SmtpSettings};

/// Wrap `content` in the header/footer components and send it through the configured SMTP.
pub fn send_via_settings(store: &dyn Store, to: &str, subject: &str, content: &str) -> Result<(), String> {
    let cfg = SmtpSettings::from_settings(&store.setting_all())?;
    let html = build_complete_email(store, content);
    send_smtp(&cfg, to, subject, &html)
}

/// Synchronous; System Settings reports the transport error to the admin.
pub fn send_test_email(store: &dyn Store, to: &str) -> Result<(), String> {
    let site_name = store.setting_get_or("site_name", "LoanFlow");
    let body = format!(
        "<h2>SMTP test</h2><p>This is a test message from {}. If you can read it, outgoing mail works.</p>",
        html_escape(&site_name)
    );
    send_via_settings(store, to, &format!("Test email from {}", site_name), &body)
}

/// Mail the account details to a newly created user in the background.
pub fn send_welcome_email(store: Arc<dyn Store>, to: String, first_name: String, password: String) {
    std::thread::spawn(move || {
        let site_name = store.setting_get_or("site_name", "LoanFlow");
        let body = format!(
            "<h2>Welcome, {}!</h2>\
             <p>An account has been created for you at {}.</p>\
             <p>Email: <strong>{}</strong><br>Temporary password: <strong>{}</strong></p>\
             <p>You will be asked to choose a new password after signing in.</p>",
            html_escape(&first_name),
            html_escape(&site_name),
            html_escape(&to),
            html_escape(&password),
        );
        let subject = format!("Welcome to {}", site_name);
        match send_via_settings(&*store, &to, &subject, &body) {
            Ok(()) => log::info!("[email] Welcome email sent to {}", to),
            Err(e) => log::error!("[email] Failed to send welcome email to {}: {}", to, e),
        }
    });
}

/// Mail a temporary password after an admin reset, in the background.
pub fn send_password_reset_email(store: Arc<dyn Store>, to: String, first_name: String, temp_password: String) {
    std::thread::spawn(move || {
        let site_name = store.setting_get_or("site_name", "LoanFlow");
        let body = format!(
            "<h2>Password reset</h2>\
             <p>Hello {},</p>\
             <p>An administrator has reset your password. Your temporary password is \
             <strong>{}</strong>.</p>\
             <p>You must change it the next time you sign in.</p>",
            html_escape(&first_name),
            html_escape(&temp_password),
        );
        let subject = format!("Your {} password has been reset", site_name);
        match send_via_settings(&*store, &to, &subject, &body) {
            Ok(()) => log::info!("[email] Password reset email sent to {}", to),
            Err(e) => log::error!("[email] Failed to send password reset email to {}: {}", to, e),
        }
    });
}

/// Notify admin_email of a finished backup. Called from the backup worker itself.
pub fn send_backup_notification(store: &dyn Store, backup_name: &str, ok: bool, detail: &str) {
    let to = store.setting_get_or("admin_email", "");
    if to.is_empty() {
        return;
    }
    let (subject, body) = if ok {
        (
            format!("Backup completed: {}", backup_name),
            format!(
                "<p>The backup <strong>{}</strong> completed successfully.</p><p>{}</p>",
                html_escape(backup_name),
                html_escape(detail)
            ),
        )
    } else {
        (
            format!("Backup failed: {}", backup_name),
            format!(
                "<p>The backup <strong>{}</strong> failed.</p><p>Error: {}</p>",
                html_escape(backup_name),
                html_escape(detail)
            ),
        )
    };
    if let Err(e) = send_via_settings(store, &to, &subject, &body) {
        log::error!("[email] Failed to send backup notification: {}", e);
    }
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
