use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use urlmatrix::cli::{Cli, Commands, RunSettings};
use urlmatrix::config::AppConfig;
use urlmatrix::fetch::{JsonDatasetSource, PostgrestSource};
use urlmatrix::logger::RunLogger;
use urlmatrix::pipeline::Pipeline;

fn init_tracing(cli: &Cli) {
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("urlmatrix={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn dispatch(cli: &Cli, config: &AppConfig, settings: &RunSettings, logger: &RunLogger) -> Result<i32> {
    let pipeline = Pipeline::new(config, settings, logger);

    if let Some(Commands::Recheck { file }) = &cli.command {
        return pipeline.run_recheck(file).await;
    }

    let sitemap = match &cli.command {
        Some(Commands::Build { sitemap }) => Some(sitemap.as_deref()),
        _ => None,
    };

    match &settings.dataset {
        Some(path) => {
            let source = JsonDatasetSource::new(path);
            match sitemap {
                Some(file) => pipeline.run_build(&source, file).await,
                None => pipeline.run(&source).await,
            }
        }
        None => {
            let source = PostgrestSource::from_env(&config.store)?;
            match sitemap {
                Some(file) => pipeline.run_build(&source, file).await,
                None => pipeline.run(&source).await,
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // .env.local wins over .env; real environment wins over both
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    init_tracing(&cli);

    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run urlmatrix again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    let config = match AppConfig::resolve(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let settings = match RunSettings::resolve(&cli, &config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    let logger = match &settings.log_file {
        Some(path) => RunLogger::with_log_file(settings.verbosity, path),
        None => RunLogger::new(settings.verbosity),
    };
    let logger = if settings.progress_bar {
        logger
    } else {
        logger.without_progress_bar()
    };

    let outcome = dispatch(&cli, &config, &settings, &logger).await;
    if let Err(e) = &outcome {
        logger.error(&format!("❌ Run failed: {:#}", e));
    }

    if let Err(e) = logger.export_logs() {
        eprintln!("⚠️  Failed to export logs: {}", e);
    }

    std::process::exit(outcome.unwrap_or(1));
}
