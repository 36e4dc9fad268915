//! Local filesystem view backed by `std::fs`
//!
//! Directories and files are plain paths. Symlinks, sockets, FIFOs and
//! device nodes are neither followed nor counted, so the walked tree is
//! always acyclic.

use crate::error::{FsError, FsResult};
use crate::fs::{FileSystem, Listing};
use regex::Regex;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::trace;

/// `std::fs` backed filesystem view
#[derive(Debug, Clone, Default)]
pub struct LocalFs {
    /// Paths matching any of these are skipped entirely
    exclude_patterns: Vec<Regex>,

    /// When set, subdirectories on another device are not descended into
    device: Option<u64>,
}

impl LocalFs {
    /// View with no exclusions that crosses mount points
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip every path matching one of `patterns`
    pub fn with_excludes(mut self, patterns: Vec<Regex>) -> Self {
        self.exclude_patterns = patterns;
        self
    }

    /// Stay on the device that holds `root`
    pub fn one_file_system(mut self, root: &Path) -> io::Result<Self> {
        let metadata = fs::symlink_metadata(root)?;
        self.device = Some(metadata.dev());
        Ok(self)
    }

    /// Check if a path should be excluded
    pub fn is_excluded(&self, path: &Path) -> bool {
        if self.exclude_patterns.is_empty() {
            return false;
        }
        let path = path.to_string_lossy();
        self.exclude_patterns.iter().any(|re| re.is_match(&path))
    }

    fn crosses_device(&self, path: &Path) -> io::Result<bool> {
        match self.device {
            Some(dev) => Ok(fs::symlink_metadata(path)?.dev() != dev),
            None => Ok(false),
        }
    }
}

impl FileSystem for LocalFs {
    type Dir = PathBuf;
    type File = PathBuf;

    fn list(&self, dir: &PathBuf) -> FsResult<Listing<PathBuf, PathBuf>> {
        let display = || dir.display().to_string();
        let entries = fs::read_dir(dir).map_err(|e| FsError::list(display(), e))?;

        let mut listing = Listing::empty();

        for entry in entries {
            let entry = entry.map_err(|e| FsError::list(display(), e))?;
            let path = entry.path();

            if self.is_excluded(&path) {
                trace!(path = %path.display(), "Excluded");
                continue;
            }

            // file_type() does not follow symlinks
            let file_type = entry
                .file_type()
                .map_err(|e| FsError::list(path.display().to_string(), e))?;

            if file_type.is_dir() {
                let foreign = self
                    .crosses_device(&path)
                    .map_err(|e| FsError::list(path.display().to_string(), e))?;
                if foreign {
                    trace!(path = %path.display(), "Skipping mount point");
                    continue;
                }
                listing.dirs.push(path);
            } else if file_type.is_file() {
                listing.files.push(path);
            }
        }

        Ok(listing)
    }

    fn stat(&self, file: &PathBuf) -> FsResult<u64> {
        fs::symlink_metadata(file)
            .map(|metadata| metadata.len())
            .map_err(|e| FsError::stat(file.display().to_string(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_list_splits_dirs_and_files() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a"), vec![0u8; 10]).unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let view = LocalFs::new();
        let listing = view.list(&dir.path().to_path_buf()).unwrap();

        assert_eq!(listing.files, vec![dir.path().join("a")]);
        assert_eq!(listing.dirs, vec![dir.path().join("sub")]);
        assert_eq!(view.stat(&listing.files[0]).unwrap(), 10);
    }

    #[test]
    fn test_symlinks_are_not_counted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("real"), b"abc").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let listing = LocalFs::new().list(&dir.path().to_path_buf()).unwrap();

        assert_eq!(listing.files.len(), 1);
        assert!(listing.dirs.is_empty());
    }

    #[test]
    fn test_exclude_pattern() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".snapshot")).unwrap();
        fs::write(dir.path().join("keep.txt"), b"x").unwrap();

        let view = LocalFs::new().with_excludes(vec![Regex::new(r"\.snapshot").unwrap()]);
        let listing = view.list(&dir.path().to_path_buf()).unwrap();

        assert!(listing.dirs.is_empty());
        assert_eq!(listing.files.len(), 1);
        assert!(view.is_excluded(Path::new("/data/.snapshot/hourly.0")));
        assert!(!view.is_excluded(Path::new("/data/myfile.txt")));
    }

    #[test]
    fn test_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("gone");

        let err = LocalFs::new().list(&missing).unwrap_err();
        assert!(matches!(err, FsError::ListFailed { .. }));
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let err = LocalFs::new().stat(&missing).unwrap_err();
        assert!(matches!(err, FsError::StatFailed { .. }));
    }

    #[test]
    fn test_one_file_system_keeps_same_device_dirs() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let view = LocalFs::new().one_file_system(dir.path()).unwrap();
        let listing = view.list(&dir.path().to_path_buf()).unwrap();

        assert_eq!(listing.dirs, vec![dir.path().join("nested")]);
    }
}
