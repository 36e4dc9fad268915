//! Filesystem views
//!
//! The sizer never touches the disk itself. It walks a tree through the
//! [`FileSystem`] trait, which supplies exactly two operations:
//!
//! - `list`: the immediate subdirectories and files of one directory
//! - `stat`: the size in bytes of one file
//!
//! Two views ship with the crate:
//!
//! - [`LocalFs`]: backed by `std::fs`, with optional exclusion patterns and
//!   a same-device restriction
//! - [`MemoryFs`]: an in-memory tree with injectable failures and latency,
//!   used by tests and benchmarks

pub mod local;
pub mod memory;

pub use local::LocalFs;
pub use memory::{MemDir, MemFile, MemoryFs};

use crate::error::FsResult;

/// Children of one directory, as returned by a single listing call
#[derive(Debug, Clone)]
pub struct Listing<D, F> {
    /// Immediate subdirectories
    pub dirs: Vec<D>,

    /// Immediate files
    pub files: Vec<F>,
}

impl<D, F> Listing<D, F> {
    /// A listing with no children
    pub fn empty() -> Self {
        Self {
            dirs: Vec::new(),
            files: Vec::new(),
        }
    }
}

/// Read-only view of a directory tree
///
/// Handles are opaque to the sizer: it only moves them between threads and
/// hands them back to the view. Implementations must be safe to call from
/// many threads at once.
pub trait FileSystem: Send + Sync + 'static {
    /// Handle for one directory
    type Dir: Send + 'static;

    /// Handle for one file
    type File: Send + 'static;

    /// List the immediate children of a directory
    fn list(&self, dir: &Self::Dir) -> FsResult<Listing<Self::Dir, Self::File>>;

    /// Size of a file in bytes
    fn stat(&self, file: &Self::File) -> FsResult<u64>;
}
