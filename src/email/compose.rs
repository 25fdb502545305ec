use chrono::{Datelike, NaiveDateTime};

use crate::store::Store;

/// Replace every `{name}` with its value. Unknown placeholders are left alone.
pub fn fill_placeholders(text: &str, vars: &[(String, String)]) -> String {
    vars.iter().fold(text.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}

/// Sample values used by the component preview.
pub fn preview_variables(store: &dyn Store, now: NaiveDateTime) -> Vec<(String, String)> {
    let pairs = [
        ("customer_name", "John Doe".to_string()),
        ("company_name", store.setting_get_or("site_name", "LoanFlow")),
        ("company_email", store.setting_get_or("site_email", "admin@loanflow.com")),
        ("company_phone", "+1 (555) 123-4567".to_string()),
        ("company_address", "123 Business Street, City, State 12345".to_string()),
        ("inquiry_id", format!("INQ-{}-001", now.format("%Y%m%d"))),
        ("current_year", now.year().to_string()),
        (
            "message_content",
            "This is a sample message content for preview purposes. It demonstrates how your email template will look with actual content."
                .to_string(),
        ),
        ("customer_email", "customer@example.com".to_string()),
        ("inquiry_date", now.format("%B %-d, %Y").to_string()),
        ("inquiry_time", now.format("%-I:%M %p").to_string()),
    ];
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Viewport width in pixels for a preview device. Unknown devices render as desktop.
pub fn device_width(device: &str) -> u32 {
    match device {
        "mobile" => 320,
        "tablet" => 768,
        _ => 1200,
    }
}

/// Standalone HTML document for the preview iframe.
pub fn preview_document(content: &str, device: &str) -> String {
    let width = device_width(device);
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width={w}, initial-scale=1.0\">\n\
         <style>body {{ margin: 0; padding: 20px; font-family: Arial, sans-serif; max-width: {w}px; }}</style>\n\
         </head>\n<body>\n{content}\n</body>\n</html>\n",
        w = width,
        content = content
    )
}

/// Wrap body content in the current header and footer components.
pub fn build_complete_email(store: &dyn Store, content: &str) -> String {
    let header = store
        .email_component_for_type("header")
        .map(|c| c.html_content)
        .unwrap_or_default();
    let footer = store
        .email_component_for_type("footer")
        .map(|c| c.html_content)
        .unwrap_or_default();

    let html = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>Email from {{company_name}}</title>\n\
         <style>\n\
         body {{ margin: 0; padding: 0; font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}\n\
         .email-container {{ max-width: 600px; margin: 0 auto; background-color: #ffffff; }}\n\
         .email-content {{ padding: 20px; }}\n\
         </style>\n</head>\n<body>\n<div class=\"email-container\">\n{header}\n\
         <div class=\"email-content\">\n{content}\n</div>\n{footer}\n</div>\n</body>\n</html>\n",
        header = header,
        content = content,
        footer = footer
    );

    let vars = vec![
        ("company_name".to_string(), store.setting_get_or("site_name", "LoanFlow")),
        ("company_email".to_string(), store.setting_get_or("site_email", "")),
        ("current_year".to_string(), chrono::Utc::now().year().to_string()),
    ];
    fill_placeholders(&html, &vars)
}
