//! Configuration types for dir-sizer
//!
//! This module defines:
//! - CLI argument parsing using clap derive macros
//! - Runtime configuration with validation

use crate::error::ConfigError;
use crate::fs::LocalFs;
use crate::sizer::{SizerConfig, MAX_BUDGET};
use clap::Parser;
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;

/// Concurrent directory-size calculator
#[derive(Parser, Debug, Clone)]
#[command(
    name = "dir-sizer",
    version,
    about = "Concurrent directory-size calculator",
    long_about = "Walks a directory tree with a bounded pool of listing threads and sums\n\
                  file sizes on a separate pool of stat workers.\n\n\
                  Any listing or stat failure aborts the whole run.",
    after_help = "EXAMPLES:\n    \
        dir-sizer /var/log\n    \
        dir-sizer /data -b 64 -x\n    \
        dir-sizer /home --exclude '\\.cache' --timeout 30 --json"
)]
pub struct CliArgs {
    /// Directory to size
    #[arg(value_name = "PATH")]
    pub root: PathBuf,

    /// Concurrency budget (half listing threads, half stat workers)
    #[arg(
        short = 'b',
        long,
        default_value_t = default_budget(),
        value_name = "NUM"
    )]
    pub budget: usize,

    /// Abort the run after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Exclude paths matching pattern (can be repeated)
    #[arg(long = "exclude", value_name = "PATTERN", action = clap::ArgAction::Append)]
    pub exclude_patterns: Vec<String>,

    /// Do not descend into directories on other filesystems
    #[arg(short = 'x', long)]
    pub one_file_system: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,

    /// Quiet mode - suppress progress output
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn default_budget() -> usize {
    // Listing and stat are I/O bound
    (num_cpus::get() * 2).min(MAX_BUDGET)
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct SizeConfig {
    /// Root directory
    pub root: PathBuf,

    /// Concurrency settings
    pub sizer: SizerConfig,

    /// Optional run timeout
    pub timeout: Option<Duration>,

    /// Compiled exclude patterns
    pub exclude_patterns: Vec<Regex>,

    /// Stay on the root's filesystem
    pub one_file_system: bool,

    /// JSON output
    pub json: bool,

    /// Show progress indicator
    pub show_progress: bool,
}

impl SizeConfig {
    /// Create and validate configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Result<Self, ConfigError> {
        let sizer = SizerConfig::new(args.budget)?;

        let timeout = match args.timeout {
            Some(0) => return Err(ConfigError::InvalidTimeout),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        match std::fs::metadata(&args.root) {
            Ok(metadata) if metadata.is_dir() => {}
            Ok(_) => {
                return Err(ConfigError::InvalidRoot {
                    path: args.root,
                    reason: "not a directory".to_string(),
                })
            }
            Err(e) => {
                return Err(ConfigError::InvalidRoot {
                    path: args.root,
                    reason: e.to_string(),
                })
            }
        }

        let exclude_patterns = args
            .exclude_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidExcludePattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            root: args.root,
            sizer,
            timeout,
            exclude_patterns,
            one_file_system: args.one_file_system,
            json: args.json,
            show_progress: !args.quiet && !args.json,
        })
    }

    /// Build the local filesystem view this configuration describes
    pub fn local_fs(&self) -> std::io::Result<LocalFs> {
        let fs = LocalFs::new().with_excludes(self.exclude_patterns.clone());
        if self.one_file_system {
            fs.one_file_system(&self.root)
        } else {
            Ok(fs)
        }
    }
}
