//! dir-sizer - Concurrent Directory-Size Calculator
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use dir_sizer::config::{CliArgs, SizeConfig};
use dir_sizer::progress::{print_header, print_json, print_summary, ProgressReporter};
use dir_sizer::sizer::{Cancellation, DirSizer};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose);

    // Validate and create config
    let config = SizeConfig::from_args(args).context("Invalid configuration")?;

    let fs = config
        .local_fs()
        .with_context(|| format!("Failed to inspect '{}'", config.root.display()))?;
    let sizer = DirSizer::new(Arc::new(fs), config.sizer);

    let cancel = match config.timeout {
        Some(timeout) => Cancellation::with_timeout(timeout),
        None => Cancellation::new(),
    };

    // Setup signal handler for graceful shutdown
    let interrupt = cancel.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, shutting down...");
        interrupt.cancel();
    })
    .context("Failed to set signal handler")?;

    if config.show_progress {
        print_header(&config.root, config.sizer.budget());
    }

    let start = Instant::now();
    let root = config.root.clone();

    let outcome = if config.show_progress {
        let reporter = ProgressReporter::new();
        let display = reporter.clone();
        let outcome = sizer.size_with_progress(root, &cancel, move |progress| {
            display.update(&progress)
        });
        reporter.finish_and_clear();
        outcome
    } else {
        sizer.size(root, &cancel)
    };
    let result = outcome.context("Size run failed")?;

    let duration = start.elapsed();
    info!(
        files = result.file_count,
        bytes = result.total_size,
        "Done"
    );

    if config.json {
        print_json(&config.root, result, duration).context("Failed to write JSON")?;
    } else {
        print_summary(result, duration);
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("dir_sizer=debug,warn")
    } else {
        EnvFilter::new("dir_sizer=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
