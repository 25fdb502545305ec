pub mod sitemap;

/// Flags stored by the SEO automation panel.
pub const SEO_FLAGS: &[&str] = &[
    "seo_auto_backlinks",
    "seo_auto_content_optimization",
    "seo_auto_technical_fixes",
];

/// Free-text SEO settings.
pub const SEO_TEXT: &[&str] = &["seo_target_keywords", "seo_competitor_domains"];

/// API keys. Blank submissions keep the stored value and they never reach the audit log.
pub const SEO_SECRETS: &[&str] = &["seo_semrush_api_key", "seo_ahrefs_api_key"];

/// Automation actions: (action, activity title, activity description).
pub const SEO_ACTIVITIES: &[(&str, &str, &str)] = &[
    ("run_seo_audit", "SEO Audit", "Comprehensive SEO audit completed"),
    ("generate_backlinks", "Backlink Generation", "New backlink opportunities identified"),
    ("optimize_content", "Content Optimization", "Content optimized for target keywords"),
    ("analyze_competitors", "Competitor Analysis", "Competitor analysis report generated"),
    ("update_meta_tags", "Meta Tags Update", "Meta tags updated across site pages"),
    ("generate_sitemap", "Sitemap Generation", "XML sitemap generated and submitted"),
    ("submit_to_search_engines", "Search Engine Submission", "Site submitted to major search engines"),
];

pub fn activity_for(action: &str) -> Option<(&'static str, &'static str)> {
    SEO_ACTIVITIES
        .iter()
        .find(|(a, _, _)| *a == action)
        .map(|(_, title, desc)| (*title, *desc))
}
