use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::AppConfig;
use crate::logger::VerbosityLevel;
use crate::verify::VerifyOptions;

#[derive(Parser, Debug)]
#[command(name = "urlmatrix")]
#[command(about = "Enumerate every public URL of the compliance site and verify that each one resolves")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Create default configuration file at ./config/urlmatrix.toml
    #[arg(long, global = true)]
    pub init: bool,

    /// Configuration file (defaults to ./config/urlmatrix.toml, then built-in defaults)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Read site data from a JSON dataset file instead of the content store
    #[arg(long, value_name = "FILE", global = true)]
    pub dataset: Option<PathBuf>,

    /// Site origin to verify against (overrides environment and config)
    #[arg(long, value_name = "URL", global = true)]
    pub base_url: Option<String>,

    /// Maximum concurrent verification requests
    #[arg(long, value_name = "N", global = true)]
    pub concurrency: Option<usize>,

    /// Per-request timeout in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    pub timeout_ms: Option<u64>,

    /// Validation report path
    #[arg(long, value_name = "FILE", global = true)]
    pub output: Option<PathBuf>,

    /// Input snapshot path
    #[arg(long, value_name = "FILE", global = true)]
    pub input_snapshot: Option<PathBuf>,

    /// Also export unresolved URLs as CSV
    #[arg(long, value_name = "FILE", global = true)]
    pub unresolved_csv: Option<PathBuf>,

    /// Export execution logs to a file
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Verbose logging (use -v for INFO, -vv for DEBUG)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only print errors and the final summary
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable the interactive progress bar
    #[arg(long, global = true)]
    pub no_progress: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Fetch site data, build the URL set and write the input snapshot without verifying
    Build {
        /// Also write a sitemap (split with an index above 50,000 URLs)
        #[arg(long, value_name = "FILE")]
        sitemap: Option<PathBuf>,
    },

    /// Re-verify the URLs listed in a previous snapshot or validation report
    Recheck {
        /// Input snapshot (`urls`) or validation report (`unresolved[].url`)
        file: PathBuf,
    },
}

impl Cli {
    pub fn verbosity(&self) -> VerbosityLevel {
        if self.quiet {
            VerbosityLevel::Silent
        } else {
            VerbosityLevel::from_verbose_count(self.verbose)
        }
    }
}

/// Effective settings for one run: flags over environment over config.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub base_url: String,
    pub concurrency: usize,
    pub timeout_ms: u64,
    pub output_file: PathBuf,
    pub snapshot_file: PathBuf,
    pub unresolved_csv: Option<PathBuf>,
    pub dataset: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub verbosity: VerbosityLevel,
    pub progress_bar: bool,
    pub progress_every_batches: usize,
    pub failure_sample_size: usize,
}

impl RunSettings {
    /// Resolve against the process environment.
    pub fn resolve(cli: &Cli, config: &AppConfig) -> Result<Self, String> {
        Self::resolve_with_env(cli, config, |name| std::env::var(name).ok())
    }

    pub fn resolve_with_env<E>(cli: &Cli, config: &AppConfig, env: E) -> Result<Self, String>
    where
        E: Fn(&str) -> Option<String>,
    {
        let base_url = cli
            .base_url
            .clone()
            .or_else(|| env(&config.site.base_url_env).filter(|v| !v.trim().is_empty()))
            .unwrap_or_else(|| config.site.base_url.clone());

        let settings = Self {
            base_url: base_url.trim().to_string(),
            concurrency: cli.concurrency.unwrap_or(config.http.concurrency),
            timeout_ms: cli.timeout_ms.unwrap_or(config.http.timeout_ms),
            output_file: cli.output.clone().unwrap_or_else(|| config.report.output_file.clone()),
            snapshot_file: cli
                .input_snapshot
                .clone()
                .unwrap_or_else(|| config.report.snapshot_file.clone()),
            unresolved_csv: cli.unresolved_csv.clone(),
            dataset: cli.dataset.clone(),
            log_file: cli.log_file.clone(),
            verbosity: cli.verbosity(),
            progress_bar: !cli.no_progress,
            progress_every_batches: config.http.progress_every_batches,
            failure_sample_size: config.report.failure_sample_size,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), String> {
        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => return Err(format!("Base URL must be an absolute http(s) URL, got '{}'", self.base_url)),
        }

        if self.concurrency == 0 {
            return Err("Concurrency must be greater than 0".to_string());
        }

        if self.timeout_ms == 0 {
            return Err("Timeout must be greater than 0 milliseconds".to_string());
        }

        if self.output_file.as_os_str().is_empty() || self.snapshot_file.as_os_str().is_empty() {
            return Err("Output paths cannot be empty".to_string());
        }

        Ok(())
    }

    /// Verifier options from config with this run's timeout applied
    pub fn verify_options(&self, config: &AppConfig) -> VerifyOptions {
        let mut options = VerifyOptions::from_config(config);
        options.timeout = Duration::from_millis(self.timeout_ms);
        options
    }
}
