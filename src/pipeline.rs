//! Run orchestration: fetch, build, snapshot, verify, report.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use url::Url;

use crate::cli::RunSettings;
use crate::config::AppConfig;
use crate::fetch::{fetch_with_retry, SiteDataSource};
use crate::logger::RunLogger;
use crate::normalize::{normalize_absolute_url, parse_base_url};
use crate::paths::{build_paths, BuildOutput, RuleSet};
use crate::report::{
    export_unresolved_csv, print_summary, read_recheck_urls, timestamp, write_json_artifact, InputSnapshot,
    InputTotals, ReportOptions, ValidationReport,
};
use crate::sitemap;
use crate::verify::UrlVerifier;

/// The generated address space for one run
#[derive(Debug, Clone)]
pub struct AddressSpace {
    pub snapshot: InputSnapshot,
    pub build: BuildOutput,
}

pub struct Pipeline<'a> {
    config: &'a AppConfig,
    settings: &'a RunSettings,
    logger: &'a RunLogger,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a AppConfig, settings: &'a RunSettings, logger: &'a RunLogger) -> Self {
        Self {
            config,
            settings,
            logger,
        }
    }

    fn base(&self) -> Result<Url> {
        parse_base_url(&self.settings.base_url).context("Invalid base URL")
    }

    fn base_label(&self) -> String {
        self.settings.base_url.trim_end_matches('/').to_string()
    }

    /// Fetch site data, build the path set and write the input snapshot.
    pub async fn build<S: SiteDataSource>(&self, source: &S) -> Result<AddressSpace> {
        let base = self.base()?;

        self.logger.log_fetch_start(&source.describe());
        let data = fetch_with_retry(source, &self.config.retry.fetch_policy())
            .await
            .context("Failed to fetch site data")?;
        self.logger.log_fetch_complete(&data);

        let rules = RuleSet::from_config(self.config);
        let build = build_paths(&data, &rules);

        let urls = build
            .paths
            .iter()
            .map(|path| normalize_absolute_url(path, &base))
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to resolve generated paths against base URL")?;

        self.logger
            .log_build_complete(urls.len(), &build.counts, build.unmapped.len());

        let snapshot = InputSnapshot {
            generated_at: timestamp(),
            base_url: self.base_label(),
            totals: InputTotals::new(urls.len(), &data),
            route_family_counts: build.counts.clone(),
            unmapped_pages: build.unmapped.clone(),
            urls,
        };

        write_json_artifact(&snapshot, &self.settings.snapshot_file)
            .context("Failed to write input snapshot")?;
        self.logger.log_snapshot_written(&self.settings.snapshot_file);

        Ok(AddressSpace { snapshot, build })
    }

    /// Verify `urls` and write the validation report.
    pub async fn verify(&self, urls: Vec<String>) -> Result<ValidationReport> {
        let options = self.settings.verify_options(self.config);
        let verifier = UrlVerifier::new(options).context("Failed to build HTTP client")?;
        let total = urls.len();

        self.logger
            .log_verify_start(total, self.settings.concurrency, self.settings.timeout_ms);
        self.logger.start_progress(
            total as u64,
            self.settings.concurrency,
            self.settings.progress_every_batches,
        );

        let logger = self.logger;
        let results = verifier
            .verify_all(urls, self.settings.concurrency, |done, total| {
                logger.advance_progress(done, total)
            })
            .await;
        self.logger.finish_progress();

        let report = ValidationReport::from_results(
            &self.base_label(),
            ReportOptions {
                concurrency: self.settings.concurrency,
                timeout_ms: self.settings.timeout_ms,
            },
            results,
        );

        write_json_artifact(&report, &self.settings.output_file).context("Failed to write validation report")?;
        self.logger.log_export_success("Validation report", &self.settings.output_file);

        if let Some(csv_path) = &self.settings.unresolved_csv {
            export_unresolved_csv(&report, csv_path).context("Failed to export unresolved URLs")?;
            self.logger.log_export_success("Unresolved CSV", csv_path);
        }

        Ok(report)
    }

    fn finish(&self, report: &ValidationReport) -> i32 {
        self.logger.print_final_summary();
        print_summary(report, &self.settings.output_file, self.settings.failure_sample_size);
        report.exit_code()
    }

    /// Full run. Returns the process exit code.
    pub async fn run<S: SiteDataSource>(&self, source: &S) -> Result<i32> {
        self.logger.start_run(&self.settings.base_url);
        let space = self.build(source).await?;
        let report = self.verify(space.snapshot.urls).await?;
        Ok(self.finish(&report))
    }

    /// Build and snapshot only, optionally writing a sitemap.
    pub async fn run_build<S: SiteDataSource>(&self, source: &S, sitemap_file: Option<&Path>) -> Result<i32> {
        self.logger.start_run(&self.settings.base_url);
        let space = self.build(source).await?;

        if let Some(file) = sitemap_file {
            let base = self.base()?;
            let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
            let entries = sitemap::entries(&space.build.paths, &base, &space.build.last_modified, &today)
                .context("Failed to build sitemap entries")?;
            for written in sitemap::write_sitemaps(&entries, file, &base)? {
                self.logger.log_export_success("Sitemap", &written);
            }
        }

        self.logger.finish_progress();
        self.logger.print_final_summary();
        println!("Input snapshot: {}", self.settings.snapshot_file.display());
        println!("URLs: {}", space.snapshot.urls.len());
        Ok(0)
    }

    /// Re-verify URLs from a previous snapshot or report.
    pub async fn run_recheck(&self, file: &Path) -> Result<i32> {
        self.logger.start_run(&self.settings.base_url);
        let base = self.base()?;

        let urls = read_recheck_urls(file)?
            .iter()
            .map(|url| normalize_absolute_url(url, &base))
            .collect::<Result<BTreeSet<_>, _>>()
            .context("Failed to normalize URLs for recheck")?;
        self.logger
            .info(&format!("Rechecking {} URLs from {}", urls.len(), file.display()));

        let report = self.verify(urls.into_iter().collect()).await?;
        Ok(self.finish(&report))
    }
}
