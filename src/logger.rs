use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

use crate::model::{Dimension, SiteData};
use crate::paths::RouteFamilyCounts;
use crate::pool::progress_due;

#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub enum VerbosityLevel {
    Silent = 0,    // Errors and the final summary only
    Summary = 1,   // Phase progress (default)
    Detailed = 2,  // Warnings and per-phase detail
    Debug = 3,     // Everything
}

impl VerbosityLevel {
    pub fn from_verbose_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Summary,
            1 => VerbosityLevel::Detailed,
            2.. => VerbosityLevel::Debug,
        }
    }
}

#[derive(Clone)]
pub struct RunLogger {
    verbosity: VerbosityLevel,
    show_progress: bool,
    progress_bar: Arc<RwLock<Option<ProgressBar>>>,
    run_metadata: Arc<Mutex<RunMetadata>>,
    log_buffer: Arc<Mutex<Vec<String>>>,
    log_file_path: Option<PathBuf>,
}

#[derive(Default, Clone)]
struct RunMetadata {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    base_url: String,
    urls_generated: usize,
    unmapped_pages: usize,
    batch_size: usize,
    progress_every_batches: usize,
    artifacts: Vec<PathBuf>,
}

impl RunLogger {
    pub fn new(verbosity: VerbosityLevel) -> Self {
        Self {
            verbosity,
            show_progress: true,
            progress_bar: Arc::new(RwLock::new(None)),
            run_metadata: Arc::new(Mutex::new(RunMetadata::default())),
            log_buffer: Arc::new(Mutex::new(Vec::new())),
            log_file_path: None,
        }
    }

    pub fn with_log_file(verbosity: VerbosityLevel, log_file_path: impl Into<PathBuf>) -> Self {
        Self {
            log_file_path: Some(log_file_path.into()),
            ..Self::new(verbosity)
        }
    }

    /// Disable the interactive progress bar (progress lines are still logged)
    pub fn without_progress_bar(mut self) -> Self {
        self.show_progress = false;
        self
    }

    pub fn verbosity(&self) -> VerbosityLevel {
        self.verbosity
    }

    pub fn info(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Summary {
            self.print_message("INFO", message);
        }
    }

    pub fn warn(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Detailed {
            self.print_message("WARN", message);
        }
    }

    pub fn error(&self, message: &str) {
        // Errors are never filtered
        self.print_message("ERROR", message);
    }

    pub fn debug(&self, message: &str) {
        if self.verbosity >= VerbosityLevel::Debug {
            self.print_message("DEBUG", message);
        }
    }

    fn print_message(&self, level: &str, message: &str) {
        let msg = format!("[{}] {}: {}", Self::timestamp(), level, message);

        if self.log_file_path.is_some() {
            if let Ok(mut buffer) = self.log_buffer.lock() {
                buffer.push(msg.clone());
            }
        }

        // Print above an active bar; a hidden bar swallows println
        if let Ok(guard) = self.progress_bar.try_read() {
            if let Some(pb) = guard.as_ref().filter(|pb| !pb.is_hidden()) {
                pb.println(msg);
                return;
            }
        }

        eprintln!("{}", msg);
    }

    fn timestamp() -> String {
        Local::now().format("%H:%M:%S%.3f").to_string()
    }

    fn with_metadata(&self, update: impl FnOnce(&mut RunMetadata)) {
        if let Ok(mut metadata) = self.run_metadata.lock() {
            update(&mut metadata);
        }
    }

    pub fn start_run(&self, base_url: &str) {
        self.with_metadata(|m| {
            m.start_time = Some(Instant::now());
            m.base_url = base_url.to_string();
        });
        self.info(&format!("Starting URL validation for {}", base_url));
    }

    /// Start verification progress tracking for `total` URLs.
    pub fn start_progress(&self, total: u64, batch_size: usize, every_batches: usize) {
        self.with_metadata(|m| {
            m.batch_size = batch_size;
            m.progress_every_batches = every_batches;
        });

        if !self.show_progress || total == 0 {
            return;
        }

        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        pb.set_message("Validating...");

        if let Ok(mut guard) = self.progress_bar.write() {
            *guard = Some(pb);
        }
    }

    /// Record one settled URL. Logs `Validated {done} / {total}` when due.
    pub fn advance_progress(&self, done: usize, total: usize) {
        if let Ok(guard) = self.progress_bar.read() {
            if let Some(pb) = guard.as_ref() {
                pb.set_position(done as u64);
            }
        }

        let (batch_size, every) = self
            .run_metadata
            .lock()
            .map(|m| (m.batch_size, m.progress_every_batches))
            .unwrap_or((1, 1));
        if progress_due(done, total, batch_size, every) {
            self.info(&format!("Validated {} / {}", done, total));
        }
    }

    pub fn finish_progress(&self) {
        if let Ok(mut guard) = self.progress_bar.write() {
            if let Some(pb) = guard.take() {
                pb.finish_and_clear();
            }
        }
        self.with_metadata(|m| m.end_time = Some(Instant::now()));
    }

    pub fn record_artifact(&self, path: &Path) {
        self.with_metadata(|m| m.artifacts.push(path.to_path_buf()));
    }

    // Phase logging

    pub fn log_fetch_start(&self, source: &str) {
        self.info(&format!("Fetching site data from {}", source));
    }

    pub fn log_fetch_complete(&self, data: &SiteData) {
        let counts: Vec<String> = Dimension::ALL
            .iter()
            .map(|d| format!("{} {}", data.count(*d), d.table()))
            .collect();
        self.info(&format!("Site data loaded: {}", counts.join(", ")));
    }

    pub fn log_build_complete(&self, urls: usize, counts: &RouteFamilyCounts, unmapped: usize) {
        self.with_metadata(|m| {
            m.urls_generated = urls;
            m.unmapped_pages = unmapped;
        });
        self.info(&format!("Generated {} unique URLs", urls));
        self.debug(&format!(
            "Route families: static={} directory={} migrations={} locations={} pages={} matrix={} roles={} compare_industry={} compare_tools={}",
            counts.static_routes,
            counts.directory_companies,
            counts.migrations,
            counts.auditor_locations,
            counts.pseo_mapped,
            counts.framework_matrix,
            counts.role_matrix,
            counts.compare_industry_matrix,
            counts.compare_tool_core,
        ));
        if unmapped > 0 {
            self.warn(&format!("{} content pages had no route template and were skipped", unmapped));
        }
    }

    pub fn log_snapshot_written(&self, path: &Path) {
        self.record_artifact(path);
        self.info(&format!("Input snapshot: {}", path.display()));
    }

    pub fn log_verify_start(&self, total: usize, concurrency: usize, timeout_ms: u64) {
        self.info(&format!(
            "Verifying {} URLs (concurrency {}, timeout {}ms)",
            total, concurrency, timeout_ms
        ));
    }

    pub fn log_export_success(&self, kind: &str, path: &Path) {
        self.record_artifact(path);
        self.info(&format!("{} written: {}", kind, path.display()));
    }

    /// Run summary block, printed regardless of verbosity
    pub fn print_final_summary(&self) {
        let metadata = match self.run_metadata.lock() {
            Ok(m) => m.clone(),
            Err(_) => return,
        };

        // Clear any progress bar remnants
        print!("\x1b[2K\r");
        let _ = io::stdout().flush();

        println!("\n=== URL VALIDATION SUMMARY ===");
        if let (Some(start), Some(end)) = (metadata.start_time, metadata.end_time) {
            println!("Run Duration: {:.2}s", end.duration_since(start).as_secs_f64());
        }
        if !metadata.base_url.is_empty() {
            println!("Base URL: {}", metadata.base_url);
        }
        if metadata.urls_generated > 0 {
            println!("URLs Generated: {}", metadata.urls_generated);
        }
        if metadata.unmapped_pages > 0 {
            println!("Unmapped Content Pages: {}", metadata.unmapped_pages);
        }
        for artifact in &metadata.artifacts {
            println!("Artifact: {}", artifact.display());
        }
        println!("==============================\n");
    }

    /// Write every buffered log line to the log file, if one was configured.
    pub fn export_logs(&self) -> anyhow::Result<()> {
        let Some(path) = self.log_file_path.as_ref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
        if let Ok(buffer) = self.log_buffer.lock() {
            for entry in buffer.iter() {
                writeln!(file, "{}", entry)?;
            }
        }
        file.flush()?;
        Ok(())
    }

    pub fn is_log_export_enabled(&self) -> bool {
        self.log_file_path.is_some()
    }

    pub fn log_count(&self) -> usize {
        self.log_buffer.lock().map(|b| b.len()).unwrap_or(0)
    }
}
