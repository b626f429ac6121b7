//! Sitemap XML export for the generated address space.
//!
//! Every URL gets a priority and change frequency from its path tier. Sets
//! larger than [`MAX_URLS_PER_FILE`] are split into numbered files next to the
//! requested path, which then holds a sitemap index.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

use crate::normalize::{normalize_absolute_url, normalize_path, NormalizeError};

/// sitemaps.org limit per file
pub const MAX_URLS_PER_FILE: usize = 50_000;

const CONVERSION_PATHS: &[&str] = &[
    "/",
    "/soc-2-readiness-index",
    "/soc-2-readiness-calculator",
    "/soc-2-cost",
    "/soc-2-cost-calculator",
    "/soc-2-timeline",
    "/auditor-match",
    "/iso-42001-calculator",
    "/ai-governance-readiness-index",
    "/compliance-roi-calculator",
    "/pci-dss-readiness-calculator",
];

const HUB_PATHS: &[&str] = &[
    "/soc-2",
    "/penetration-testing",
    "/vendor-risk-assessment",
    "/compare",
    "/tools",
    "/ai-governance",
    "/ai-compliance",
];

static DIRECT_COMPARISON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/compare/[^/]+-vs-[^/]+$").expect("valid regex"));
static ALTERNATIVES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/compare/[^/]+-alternatives$").expect("valid regex"));
static COST_BY_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/soc-2-cost/(fintech|saas|healthcare|startups)$").expect("valid regex"));
static FRAMEWORK_MATRIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/(soc-2|iso-27001|hipaa|gdpr|pci-dss)/[^/]+/[^/]+$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFreq {
    Daily,
    Weekly,
    Monthly,
}

impl ChangeFreq {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
        }
    }
}

/// Priority and change frequency for a site path
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tier {
    pub priority: f32,
    pub changefreq: ChangeFreq,
}

impl Tier {
    const fn new(priority: f32, changefreq: ChangeFreq) -> Self {
        Self { priority, changefreq }
    }
}

/// Classify a normalized path into its sitemap tier.
pub fn classify(path: &str) -> Tier {
    if CONVERSION_PATHS.contains(&path) {
        return Tier::new(1.0, ChangeFreq::Daily);
    }

    if HUB_PATHS.contains(&path) || DIRECT_COMPARISON.is_match(path) || ALTERNATIVES.is_match(path) {
        return Tier::new(0.9, ChangeFreq::Weekly);
    }

    if path.contains("/soc-2/industries/")
        || path.contains("/pricing/")
        || path.contains("/compliance/migrate/")
        || COST_BY_SEGMENT.is_match(path)
    {
        return Tier::new(0.85, ChangeFreq::Weekly);
    }

    if FRAMEWORK_MATRIX.is_match(path) || path.contains("/for/") || path.contains("/auditor-directory/") {
        return Tier::new(0.8, ChangeFreq::Weekly);
    }

    if path.contains("/compliance/directory/") || path.contains("/soc-2-evidence/") {
        return Tier::new(0.75, ChangeFreq::Weekly);
    }

    if path.contains("/learn/") || path.contains("/glossary/") {
        return Tier::new(0.7, ChangeFreq::Monthly);
    }

    if path == "/privacy" || path == "/terms" {
        return Tier::new(0.3, ChangeFreq::Monthly);
    }

    Tier::new(0.7, ChangeFreq::Weekly)
}

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    /// `YYYY-MM-DD`
    pub lastmod: String,
    pub tier: Tier,
}

/// Reduce a store timestamp to a W3C date. Unparsable values yield `None`.
fn lastmod_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc).format("%Y-%m-%d").to_string());
    }
    // Postgres `timestamptz` text without the `T`
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(ts.with_timezone(&Utc).format("%Y-%m-%d").to_string());
    }
    raw.get(..10)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
}

/// Build sitemap entries for `paths`. Paths without a known modification
/// time get `fallback_date`.
pub fn entries(
    paths: &[String],
    base: &Url,
    last_modified: &BTreeMap<String, String>,
    fallback_date: &str,
) -> Result<Vec<SitemapEntry>, NormalizeError> {
    paths
        .iter()
        .map(|raw| -> Result<SitemapEntry, NormalizeError> {
            let path = normalize_path(raw);
            let lastmod = last_modified
                .get(&path)
                .and_then(|ts| lastmod_date(ts))
                .unwrap_or_else(|| fallback_date.to_string());
            Ok(SitemapEntry {
                loc: normalize_absolute_url(&path, base)?,
                lastmod,
                tier: classify(&path),
            })
        })
        .collect()
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Render one `<urlset>` document
pub fn render_urlset(entries: &[SitemapEntry]) -> String {
    let mut content = String::new();
    content.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    content.push_str("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");

    for entry in entries {
        content.push_str("  <url>\n");
        content.push_str(&format!("    <loc>{}</loc>\n", escape_xml(&entry.loc)));
        content.push_str(&format!("    <lastmod>{}</lastmod>\n", entry.lastmod));
        content.push_str(&format!("    <changefreq>{}</changefreq>\n", entry.tier.changefreq.as_str()));
        content.push_str(&format!("    <priority>{:.2}</priority>\n", entry.tier.priority));
        content.push_str("  </url>\n");
    }

    content.push_str("</urlset>\n");
    content
}

/// Render a `<sitemapindex>` document pointing at `locations`
pub fn render_index(locations: &[String], lastmod: &str) -> String {
    let mut content = String::new();
    content.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    content.push_str("<sitemapindex xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n");

    for loc in locations {
        content.push_str("  <sitemap>\n");
        content.push_str(&format!("    <loc>{}</loc>\n", escape_xml(loc)));
        content.push_str(&format!("    <lastmod>{}</lastmod>\n", lastmod));
        content.push_str("  </sitemap>\n");
    }

    content.push_str("</sitemapindex>\n");
    content
}

/// `sitemap.xml` -> `sitemap-3.xml`
fn part_path(file: &Path, index: usize) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sitemap".to_string());
    let ext = file
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "xml".to_string());
    file.with_file_name(format!("{}-{}.{}", stem, index, ext))
}

/// Write the sitemap for `entries` to `file`, splitting when needed.
///
/// Returns every file written; with a split the index at `file` comes first.
/// Part files are referenced from the index as `{base}/{file name}`.
pub fn write_sitemaps(entries: &[SitemapEntry], file: &Path, base: &Url) -> Result<Vec<PathBuf>> {
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create sitemap directory: {}", parent.display()))?;
    }

    if entries.len() <= MAX_URLS_PER_FILE {
        fs::write(file, render_urlset(entries))
            .with_context(|| format!("Failed to write sitemap: {}", file.display()))?;
        info!("Wrote sitemap with {} URLs to {}", entries.len(), file.display());
        return Ok(vec![file.to_path_buf()]);
    }

    let today = Utc::now().format("%Y-%m-%d").to_string();
    let mut written = vec![file.to_path_buf()];
    let mut locations = Vec::new();

    for (i, chunk) in entries.chunks(MAX_URLS_PER_FILE).enumerate() {
        let part = part_path(file, i + 1);
        fs::write(&part, render_urlset(chunk))
            .with_context(|| format!("Failed to write sitemap part: {}", part.display()))?;
        debug!("Wrote sitemap part {} ({} URLs)", part.display(), chunk.len());

        let name = part
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        locations.push(normalize_absolute_url(&name, base)?);
        written.push(part);
    }

    fs::write(file, render_index(&locations, &today))
        .with_context(|| format!("Failed to write sitemap index: {}", file.display()))?;
    info!(
        "Wrote sitemap index {} covering {} URLs in {} files",
        file.display(),
        entries.len(),
        locations.len()
    );

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://risclens.com").unwrap()
    }

    #[test]
    fn test_tiers() {
        assert_eq!(classify("/").priority, 1.0);
        assert_eq!(classify("/").changefreq, ChangeFreq::Daily);
        assert_eq!(classify("/compare").priority, 0.9);
        assert_eq!(classify("/compare/drata-vs-vanta").priority, 0.9);
        assert_eq!(classify("/compare/vanta-alternatives").priority, 0.9);
        assert_eq!(classify("/compare/vanta-alternatives/for/fintech").priority, 0.8);
        assert_eq!(classify("/compare/drata-vs-vanta/for/fintech").priority, 0.8);
        assert_eq!(classify("/pricing/vanta").priority, 0.85);
        assert_eq!(classify("/soc-2-cost/saas").priority, 0.85);
        assert_eq!(classify("/compliance/migrate/soc-2-to-iso-27001").priority, 0.85);
        assert_eq!(classify("/soc-2/cost/fintech").priority, 0.8);
        assert_eq!(classify("/iso-27001/for/cto/saas").priority, 0.8);
        assert_eq!(classify("/auditor-directory/austin").priority, 0.8);
        assert_eq!(classify("/compliance/directory/acme").priority, 0.75);
        assert_eq!(classify("/glossary/soc-2").changefreq, ChangeFreq::Monthly);
        assert_eq!(classify("/privacy").priority, 0.3);
        assert_eq!(classify("/ai-governance/eu-ai-act/cost/fintech").priority, 0.7);
        assert_eq!(classify("/ai-governance/eu-ai-act/cost/fintech").changefreq, ChangeFreq::Weekly);
    }

    #[test]
    fn test_lastmod_parsing() {
        assert_eq!(lastmod_date("2024-03-05T10:00:00Z").as_deref(), Some("2024-03-05"));
        assert_eq!(lastmod_date("2024-03-05T23:30:00-02:00").as_deref(), Some("2024-03-06"));
        assert_eq!(lastmod_date("2024-03-05 10:00:00.123+00").as_deref(), Some("2024-03-05"));
        assert_eq!(lastmod_date("2024-03-05").as_deref(), Some("2024-03-05"));
        assert_eq!(lastmod_date("yesterday"), None);
    }

    #[test]
    fn test_entries_use_known_lastmod() {
        let mut known = BTreeMap::new();
        known.insert("/compliance/directory/acme".to_string(), "2024-01-02T00:00:00Z".to_string());
        let paths = vec!["/compliance/directory/acme".to_string(), "/".to_string()];
        let out = entries(&paths, &base(), &known, "2025-01-01").unwrap();
        assert_eq!(out[0].loc, "https://risclens.com/compliance/directory/acme");
        assert_eq!(out[0].lastmod, "2024-01-02");
        assert_eq!(out[1].loc, "https://risclens.com/");
        assert_eq!(out[1].lastmod, "2025-01-01");
    }

    #[test]
    fn test_render_escapes_and_formats() {
        let entry = SitemapEntry {
            loc: "https://x.com/a?b=1&c=2".to_string(),
            lastmod: "2024-01-01".to_string(),
            tier: classify("/a"),
        };
        let xml = render_urlset(&[entry]);
        assert!(xml.contains("<loc>https://x.com/a?b=1&amp;c=2</loc>"));
        assert!(xml.contains("<priority>0.70</priority>"));
        assert!(xml.contains("<changefreq>weekly</changefreq>"));
        assert!(xml.ends_with("</urlset>\n"));
    }

    #[test]
    fn test_part_path() {
        assert_eq!(part_path(Path::new("out/sitemap.xml"), 2), PathBuf::from("out/sitemap-2.xml"));
    }

    #[test]
    fn test_split_writes_index() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("sitemap.xml");
        let entries: Vec<SitemapEntry> = (0..MAX_URLS_PER_FILE + 1)
            .map(|i| SitemapEntry {
                loc: format!("https://risclens.com/p/{}", i),
                lastmod: "2024-01-01".to_string(),
                tier: Tier::new(0.7, ChangeFreq::Weekly),
            })
            .collect();

        let written = write_sitemaps(&entries, &file, &base()).unwrap();
        assert_eq!(written.len(), 3);

        let index = fs::read_to_string(&file).unwrap();
        assert!(index.contains("<sitemapindex"));
        assert!(index.contains("<loc>https://risclens.com/sitemap-1.xml</loc>"));
        assert!(index.contains("<loc>https://risclens.com/sitemap-2.xml</loc>"));

        let second = fs::read_to_string(tmp.path().join("sitemap-2.xml")).unwrap();
        assert_eq!(second.matches("<url>").count(), 1);
    }
}
