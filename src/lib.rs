//! dir-sizer - Concurrent Directory-Size Aggregator
//!
//! Computes the total byte size and file count of a directory tree with
//! bounded concurrency.
//!
//! # Features
//!
//! - **Bounded Traversal**: a fixed pool of listing threads pulls directories
//!   from a shared queue, so a wide or deep tree never spawns more threads.
//!
//! - **Backpressure**: file batches travel on a bounded channel; slow stat
//!   workers throttle directory discovery instead of queueing without limit.
//!
//! - **Fail Fast**: the first listing or stat failure wins, cancels the run,
//!   and is returned to the caller. No partial totals accompany an error.
//!
//! - **Cooperative Cancellation**: a cancellation token with an optional
//!   deadline wakes every blocked thread through `crossbeam_channel::select!`.
//!
//! # Example
//!
//! ```no_run
//! use dir_sizer::fs::LocalFs;
//! use dir_sizer::sizer::{Cancellation, DirSizer, SizerConfig};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let sizer = DirSizer::new(Arc::new(LocalFs::new()), SizerConfig::new(16)?);
//! let result = sizer.size(PathBuf::from("/var/log"), &Cancellation::new())?;
//! println!("{} files, {} bytes", result.file_count, result.total_size);
//! # Ok::<(), dir_sizer::SizerError>(())
//! ```

pub mod config;
pub mod error;
pub mod fs;
pub mod progress;
pub mod sizer;

pub use config::{CliArgs, SizeConfig};
pub use error::{FsError, Result, SizerError};
pub use fs::{FileSystem, Listing};
pub use sizer::{Cancellation, DirSizer, SizeResult, SizerConfig};
