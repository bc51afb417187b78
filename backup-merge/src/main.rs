//! Backup Merge - Main entry point
//!
//! Merges a primary course backup into a target course backup.

use anyhow::Result;
use backup_merge::archive::store::TarGzStore;
use backup_merge::{config::Config, utils, MergeOrchestrator};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Backup supplying the extra content (overrides config)
    #[arg(long, value_name = "ARCHIVE")]
    primary: Option<PathBuf>,

    /// Backup whose course identity is kept (overrides config)
    #[arg(long, value_name = "ARCHIVE")]
    target: Option<PathBuf>,

    /// Merged archive to write (overrides config)
    #[arg(short, long, value_name = "ARCHIVE")]
    output: Option<PathBuf>,

    /// Write a JSON run report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    if let Some(primary) = args.primary {
        config.archives.primary = primary;
    }
    if let Some(target) = args.target {
        config.archives.target = target;
    }
    if let Some(output) = args.output {
        config.archives.output = output;
    }
    config.validate()?;

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::info!(
        "Starting backup-merge v{} ({} + {} -> {})",
        env!("CARGO_PKG_VERSION"),
        config.archives.primary.display(),
        config.archives.target.display(),
        config.archives.output.display()
    );

    let store = TarGzStore::new(config.archives.compression_level);
    let orchestrator = MergeOrchestrator::new(config, store);

    let report = match orchestrator.run() {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Merge failed: {}", e);
            return Err(e.into());
        }
    };
    report.log_summary();

    if let Some(path) = args.report {
        report.write_json(&path)?;
        tracing::info!("Report written to {}", path.display());
    }

    Ok(())
}
