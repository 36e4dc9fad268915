//! In-memory filesystem view
//!
//! A tree built node by node, with per-node call counters and injectable
//! failures. Every operation can be slowed down by a fixed latency to widen
//! race windows in concurrency tests.

use crate::error::{FsError, FsResult};
use crate::fs::{FileSystem, Listing};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

/// Handle for a directory in a [`MemoryFs`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemDir(usize);

/// Handle for a file in a [`MemoryFs`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemFile(usize);

#[derive(Debug)]
struct DirNode {
    path: String,
    dirs: Vec<MemDir>,
    files: Vec<MemFile>,
    fail: bool,
    list_calls: AtomicUsize,
}

#[derive(Debug)]
struct FileNode {
    path: String,
    size: u64,
    fail: bool,
    stat_calls: AtomicUsize,
}

/// In-memory directory tree
#[derive(Debug)]
pub struct MemoryFs {
    dirs: Vec<DirNode>,
    files: Vec<FileNode>,
    latency: Option<Duration>,
}

impl MemoryFs {
    /// Create a tree holding only an empty root directory
    pub fn new() -> Self {
        Self {
            dirs: vec![DirNode {
                path: "/".to_string(),
                dirs: Vec::new(),
                files: Vec::new(),
                fail: false,
                list_calls: AtomicUsize::new(0),
            }],
            files: Vec::new(),
            latency: None,
        }
    }

    /// Build a uniform tree: every directory down to `depth` has `fanout`
    /// subdirectories and `files_per_dir` files of `file_size` bytes
    pub fn uniform(fanout: usize, depth: usize, files_per_dir: usize, file_size: u64) -> Self {
        let mut fs = Self::new();
        let mut level = vec![fs.root()];

        for current in 0..=depth {
            let mut next = Vec::new();
            for dir in level {
                for i in 0..files_per_dir {
                    fs.add_file(dir, &format!("f{}", i), file_size);
                }
                if current < depth {
                    for i in 0..fanout {
                        next.push(fs.add_dir(dir, &format!("d{}", i)));
                    }
                }
            }
            level = next;
        }

        fs
    }

    /// Delay every list and stat call by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// The root directory
    pub fn root(&self) -> MemDir {
        MemDir(0)
    }

    /// Add a subdirectory under `parent`
    pub fn add_dir(&mut self, parent: MemDir, name: &str) -> MemDir {
        let path = join(&self.dirs[parent.0].path, name);
        let id = MemDir(self.dirs.len());
        self.dirs.push(DirNode {
            path,
            dirs: Vec::new(),
            files: Vec::new(),
            fail: false,
            list_calls: AtomicUsize::new(0),
        });
        self.dirs[parent.0].dirs.push(id);
        id
    }

    /// Add a file of `size` bytes under `parent`
    pub fn add_file(&mut self, parent: MemDir, name: &str, size: u64) -> MemFile {
        let path = join(&self.dirs[parent.0].path, name);
        let id = MemFile(self.files.len());
        self.files.push(FileNode {
            path,
            size,
            fail: false,
            stat_calls: AtomicUsize::new(0),
        });
        self.dirs[parent.0].files.push(id);
        id
    }

    /// Make every listing of `dir` fail
    pub fn fail_list(&mut self, dir: MemDir) {
        self.dirs[dir.0].fail = true;
    }

    /// Make every stat of `file` fail
    pub fn fail_stat(&mut self, file: MemFile) {
        self.files[file.0].fail = true;
    }

    /// All directory handles, root first
    pub fn dirs(&self) -> impl Iterator<Item = MemDir> + '_ {
        (0..self.dirs.len()).map(MemDir)
    }

    /// All file handles in insertion order
    pub fn files(&self) -> impl Iterator<Item = MemFile> + '_ {
        (0..self.files.len()).map(MemFile)
    }

    /// Path of a directory, for diagnostics
    pub fn dir_path(&self, dir: MemDir) -> &str {
        &self.dirs[dir.0].path
    }

    /// Number of times `dir` has been listed
    pub fn list_calls(&self, dir: MemDir) -> usize {
        self.dirs[dir.0].list_calls.load(Ordering::SeqCst)
    }

    /// Number of times `file` has been stat-ed
    pub fn stat_calls(&self, file: MemFile) -> usize {
        self.files[file.0].stat_calls.load(Ordering::SeqCst)
    }

    /// Number of directories, root included
    pub fn dir_count(&self) -> usize {
        self.dirs.len()
    }

    /// Number of files
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Sum of all file sizes
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    fn pause(&self) {
        if let Some(latency) = self.latency {
            thread::sleep(latency);
        }
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemoryFs {
    type Dir = MemDir;
    type File = MemFile;

    fn list(&self, dir: &MemDir) -> FsResult<Listing<MemDir, MemFile>> {
        let node = &self.dirs[dir.0];
        node.list_calls.fetch_add(1, Ordering::SeqCst);
        self.pause();

        if node.fail {
            return Err(FsError::list(
                node.path.clone(),
                io::Error::new(io::ErrorKind::Other, "injected listing failure"),
            ));
        }

        Ok(Listing {
            dirs: node.dirs.clone(),
            files: node.files.clone(),
        })
    }

    fn stat(&self, file: &MemFile) -> FsResult<u64> {
        let node = &self.files[file.0];
        node.stat_calls.fetch_add(1, Ordering::SeqCst);
        self.pause();

        if node.fail {
            return Err(FsError::stat(
                node.path.clone(),
                io::Error::new(io::ErrorKind::Other, "injected stat failure"),
            ));
        }

        Ok(node.size)
    }
}

fn join(parent: &str, name: &str) -> String {
    if parent == "/" {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent, name)
    }
}
