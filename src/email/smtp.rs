use std::collections::HashMap;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};

/// Transport security for the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    None,
    Ssl,
    Tls,
}

impl Encryption {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Encryption::None),
            "ssl" => Some(Encryption::Ssl),
            "tls" => Some(Encryption::Tls),
            _ => None,
        }
    }
}

/// SMTP parameters as stored under System Settings → Email.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub encryption: Encryption,
    pub from_name: String,
    pub from_address: String,
}

impl SmtpSettings {
    pub fn from_settings(settings: &HashMap<String, String>) -> Result<Self, String> {
        let get = |k: &str| settings.get(k).cloned().unwrap_or_default();
        let host = get("smtp_host");
        if host.is_empty() {
            return Err("SMTP host not configured".into());
        }
        let from_address = get("mail_from_address");
        if from_address.is_empty() {
            return Err("Sender address not configured".into());
        }
        Ok(SmtpSettings {
            host,
            port: get("smtp_port").parse().unwrap_or(587),
            username: get("smtp_username"),
            password: get("smtp_password"),
            encryption: Encryption::parse(&get("smtp_encryption")).unwrap_or(Encryption::Tls),
            from_name: get("mail_from_name"),
            from_address,
        })
    }

    fn sender(&self) -> Result<Mailbox, String> {
        let addr = self
            .from_address
            .parse::<Address>()
            .map_err(|e| format!("Invalid from address: {}", e))?;
        let name = if self.from_name.is_empty() {
            None
        } else {
            Some(self.from_name.clone())
        };
        Ok(Mailbox::new(name, addr))
    }
}

/// Send one HTML message over SMTP.
pub fn send_smtp(cfg: &SmtpSettings, to: &str, subject: &str, html_body: &str) -> Result<(), String> {
    let email = Message::builder()
        .from(cfg.sender()?)
        .to(to.parse::<Mailbox>().map_err(|e| format!("Invalid to address: {}", e))?)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html_body.to_string())
        .map_err(|e| format!("Failed to build email: {}", e))?;

    let builder = match cfg.encryption {
        Encryption::Ssl => SmtpTransport::relay(&cfg.host)
            .map_err(|e| format!("SMTP relay error: {}", e))?,
        Encryption::Tls => SmtpTransport::starttls_relay(&cfg.host)
            .map_err(|e| format!("SMTP relay error: {}", e))?,
        Encryption::None => SmtpTransport::builder_dangerous(&cfg.host),
    };

    let mut builder = builder.port(cfg.port);
    if !cfg.username.is_empty() {
        builder = builder.credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()));
    }

    builder
        .build()
        .send(&email)
        .map_err(|e| format!("SMTP send error: {}", e))?;
    Ok(())
}
