use chrono::NaiveDate;
use quick_xml::escape::escape;

/// Public pages listed in sitemap.xml: (path, changefreq, priority).
pub const PUBLIC_PAGES: &[(&str, &str, &str)] = &[
    ("/", "weekly", "1.0"),
    ("/apply", "monthly", "0.9"),
    ("/rates", "weekly", "0.8"),
    ("/about", "monthly", "0.7"),
    ("/contact", "monthly", "0.7"),
    ("/privacy", "yearly", "0.5"),
    ("/terms", "yearly", "0.5"),
];

/// Generate sitemap.xml content for `site_url`.
pub fn generate_sitemap(site_url: &str, lastmod: NaiveDate) -> String {
    let base = site_url.trim().trim_end_matches('/');
    let lastmod = lastmod.format("%Y-%m-%d").to_string();

    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
"#,
    );
    for (path, changefreq, priority) in PUBLIC_PAGES {
        let loc = format!("{}{}", base, path);
        xml.push_str(&format!(
            "  <url><loc>{}</loc><lastmod>{}</lastmod><changefreq>{}</changefreq><priority>{}</priority></url>\n",
            escape(loc.as_str()),
            lastmod,
            changefreq,
            priority
        ));
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Write the sitemap under `static_dir`, returning the file path.
pub fn write_sitemap(static_dir: &str, site_url: &str, lastmod: NaiveDate) -> Result<String, String> {
    std::fs::create_dir_all(static_dir).map_err(|e| e.to_string())?;
    let path = std::path::Path::new(static_dir).join("sitemap.xml");
    std::fs::write(&path, generate_sitemap(site_url, lastmod)).map_err(|e| e.to_string())?;
    Ok(path.to_string_lossy().into_owned())
}
