//! Progress reporting for the directory sizer
//!
//! Provides a live spinner using indicatif and the final summary output.

use crate::sizer::{SizeProgress, SizeResult};
use console::style;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Progress reporter that displays run status
#[derive(Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();

        // The template is a literal; a parse failure falls back to the default style
        if let Ok(spinner) = ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            bar.set_style(spinner.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Update the progress display
    pub fn update(&self, progress: &SizeProgress) {
        let msg = format!(
            "Dirs: {} | Files: {} | Size: {} | Rate: {:.0}/s",
            format_number(progress.dirs),
            format_number(progress.files),
            format_size(progress.bytes, BINARY),
            progress.files_per_second(),
        );

        self.bar.set_message(msg);
    }

    /// Finish and clear the progress display
    pub fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousands separators
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();

    let chunks: Vec<String> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();

    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Machine-readable result of a run
#[derive(Debug, Serialize)]
pub struct Summary<'a> {
    pub root: &'a Path,
    #[serde(flatten)]
    pub result: SizeResult,
    pub duration_ms: u128,
}

/// Print the result as a JSON document
pub fn print_json(root: &Path, result: SizeResult, duration: Duration) -> serde_json::Result<()> {
    let summary = Summary {
        root,
        result,
        duration_ms: duration.as_millis(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Print a summary of the run
pub fn print_summary(result: SizeResult, duration: Duration) {
    let duration_secs = duration.as_secs_f64();
    let rate = if duration_secs > 0.0 {
        result.file_count as f64 / duration_secs
    } else {
        0.0
    };

    println!();
    println!("{}", style("Size Complete").green().bold());
    println!("{}", style("─".repeat(50)).dim());
    println!(
        "  {} {}",
        style("Files:").bold(),
        format_number(result.file_count)
    );
    println!(
        "  {} {} ({} bytes)",
        style("Total Size:").bold(),
        format_size(result.total_size, BINARY),
        format_number(result.total_size)
    );
    println!(
        "  {} {:.1}s ({:.0} files/sec)",
        style("Duration:").bold(),
        duration_secs,
        rate
    );
    println!();
}

/// Print a header at the start of the run
pub fn print_header(root: &Path, budget: usize) {
    println!();
    println!(
        "{} {}",
        style("dir-sizer").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!("{}", style("─".repeat(50)).dim());
    println!("  {} {}", style("Root:").bold(), root.display());
    println!("  {} {}", style("Budget:").bold(), budget);
    println!();
}
