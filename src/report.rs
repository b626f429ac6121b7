//! Reporter: JSON artifacts for the generated URL set and verification results.
//!
//! Both artifacts are pretty-printed UTF-8 JSON with a trailing newline and are
//! overwritten in place. Parent directories are created as needed.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use csv::Writer;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::model::{Dimension, SiteData};
use crate::paths::{RouteFamilyCounts, UnmappedPage};
use crate::verify::VerifyResult;

/// Row counts per dimension plus the URL total
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputTotals {
    pub urls: usize,
    pub frameworks: usize,
    pub decisions: usize,
    pub industries: usize,
    pub roles: usize,
    pub companies: usize,
    pub migrations: usize,
    pub pseo_pages: usize,
    pub locations: usize,
    pub tools: usize,
}

impl InputTotals {
    pub fn new(urls: usize, data: &SiteData) -> Self {
        Self {
            urls,
            frameworks: data.count(Dimension::Frameworks),
            decisions: data.count(Dimension::Decisions),
            industries: data.count(Dimension::Industries),
            roles: data.count(Dimension::Roles),
            companies: data.count(Dimension::Companies),
            migrations: data.count(Dimension::Migrations),
            pseo_pages: data.count(Dimension::ContentPages),
            locations: data.count(Dimension::Locations),
            tools: data.count(Dimension::Tools),
        }
    }
}

/// The generated URL list with provenance counts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSnapshot {
    pub generated_at: String,
    pub base_url: String,
    pub totals: InputTotals,
    pub route_family_counts: RouteFamilyCounts,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unmapped_pages: Vec<UnmappedPage>,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportOptions {
    pub concurrency: usize,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VerificationTotals {
    pub checked: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

/// Aggregated verification outcome
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub generated_at: String,
    pub base_url: String,
    pub options: ReportOptions,
    pub totals: VerificationTotals,
    pub unresolved: Vec<VerifyResult>,
}

impl ValidationReport {
    /// Aggregate results. Order of `results` does not affect the totals.
    pub fn from_results(base_url: &str, options: ReportOptions, results: Vec<VerifyResult>) -> Self {
        let checked = results.len();
        let unresolved: Vec<VerifyResult> = results.into_iter().filter(|r| !r.ok).collect();
        Self {
            generated_at: timestamp(),
            base_url: base_url.to_string(),
            options,
            totals: VerificationTotals {
                checked,
                resolved: checked - unresolved.len(),
                unresolved: unresolved.len(),
            },
            unresolved,
        }
    }

    pub fn all_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }

    /// Process exit code for this report
    pub fn exit_code(&self) -> i32 {
        if self.all_resolved() {
            0
        } else {
            1
        }
    }
}

/// ISO-8601 UTC timestamp with milliseconds
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Write `value` as pretty JSON plus trailing newline, creating parent dirs.
pub fn write_json_artifact<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let mut json = serde_json::to_string_pretty(value).context("Failed to serialize artifact")?;
    json.push('\n');

    fs::write(path, json).with_context(|| format!("Failed to write artifact: {}", path.display()))?;
    debug!("Wrote {}", path.display());
    Ok(())
}

/// Export unresolved entries to CSV
pub fn export_unresolved_csv(report: &ValidationReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {}", parent.display()))?;
    }

    let mut wtr = Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
    wtr.write_record(["url", "status", "reason", "final_url", "redirected"])?;

    for entry in &report.unresolved {
        let status = entry.status.map(|s| s.to_string()).unwrap_or_default();
        let redirected = entry.redirected.map(|r| r.to_string()).unwrap_or_default();
        wtr.write_record([
            entry.url.as_str(),
            status.as_str(),
            entry.reason.as_str(),
            entry.final_url.as_deref().unwrap_or(""),
            redirected.as_str(),
        ])?;
    }

    wtr.flush()?;
    info!("Exported {} unresolved URLs to CSV: {}", report.unresolved.len(), path.display());
    Ok(())
}

/// Lines describing up to `limit` unresolved URLs
pub fn failure_sample(report: &ValidationReport, limit: usize) -> Vec<String> {
    report
        .unresolved
        .iter()
        .take(limit)
        .map(|entry| {
            let status = entry
                .status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            format!("{} | status={} | reason={}", entry.url, status, entry.reason)
        })
        .collect()
}

/// Print the final summary and failure sample to stdout.
pub fn print_summary(report: &ValidationReport, output_file: &Path, sample_size: usize) {
    println!("Validation report: {}", output_file.display());
    println!("Resolved: {}", report.totals.resolved);
    println!("Unresolved: {}", report.totals.unresolved);

    if !report.all_resolved() {
        println!("Top unresolved URLs:");
        for line in failure_sample(report, sample_size) {
            println!("{}", line);
        }
    }
}

/// URLs to re-verify from a previous artifact.
///
/// Accepts an input snapshot (`urls`) or a validation report
/// (`unresolved[].url`).
pub fn read_recheck_urls(path: &Path) -> Result<Vec<String>> {
    #[derive(Deserialize)]
    struct UrlOnly {
        url: String,
    }

    #[derive(Deserialize)]
    struct Artifact {
        #[serde(default)]
        urls: Option<Vec<String>>,
        #[serde(default)]
        unresolved: Option<Vec<UrlOnly>>,
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read artifact: {}", path.display()))?;
    let artifact: Artifact = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse artifact: {}", path.display()))?;

    match (artifact.urls, artifact.unresolved) {
        (Some(urls), _) => Ok(urls),
        (None, Some(entries)) => Ok(entries.into_iter().map(|e| e.url).collect()),
        (None, None) => anyhow::bail!(
            "{} is neither an input snapshot (urls) nor a validation report (unresolved)",
            path.display()
        ),
    }
}
