//! Integration tests for dir-sizer
//!
//! Fault-injection and concurrency tests run against the in-memory view;
//! the local view is exercised on real trees under a temp directory.

use dir_sizer::error::FsResult;
use dir_sizer::fs::{LocalFs, MemDir, MemFile, MemoryFs};
use dir_sizer::sizer::{Cancellation, DirSizer, SizeResult, SizerConfig};
use dir_sizer::{FileSystem, Listing, SizerError};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::tempdir;

fn sizer(fs: MemoryFs, budget: usize) -> DirSizer<MemoryFs> {
    DirSizer::new(Arc::new(fs), SizerConfig::new(budget).unwrap())
}

/// Uneven tree: a deep chain, a wide fan, and files of varying sizes
fn mixed_tree() -> MemoryFs {
    let mut fs = MemoryFs::new();
    let root = fs.root();

    let mut chain = root;
    for depth in 0..12 {
        chain = fs.add_dir(chain, &format!("deep{}", depth));
        fs.add_file(chain, "leaf", depth as u64 + 1);
    }

    let wide = fs.add_dir(root, "wide");
    for i in 0..40 {
        let dir = fs.add_dir(wide, &format!("w{}", i));
        for j in 0..(i % 5) {
            fs.add_file(dir, &format!("f{}", j), (i * 100 + j) as u64);
        }
    }

    fs.add_file(root, "top", 4096);
    fs
}

/// Wraps a `MemoryFs`, tracking concurrent listings and how far listing
/// runs ahead of stat
struct InstrumentedFs {
    inner: MemoryFs,
    stat_delay: Duration,
    live_lists: AtomicUsize,
    max_live_lists: AtomicUsize,
    lists: AtomicUsize,
    stats: AtomicUsize,
    max_lead: AtomicUsize,
}

impl InstrumentedFs {
    fn new(inner: MemoryFs, stat_delay: Duration) -> Self {
        Self {
            inner,
            stat_delay,
            live_lists: AtomicUsize::new(0),
            max_live_lists: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
            stats: AtomicUsize::new(0),
            max_lead: AtomicUsize::new(0),
        }
    }
}

impl FileSystem for InstrumentedFs {
    type Dir = MemDir;
    type File = MemFile;

    fn list(&self, dir: &MemDir) -> FsResult<Listing<MemDir, MemFile>> {
        let live = self.live_lists.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live_lists.fetch_max(live, Ordering::SeqCst);

        let listed = self.lists.fetch_add(1, Ordering::SeqCst) + 1;
        let lead = listed.saturating_sub(self.stats.load(Ordering::SeqCst));
        self.max_lead.fetch_max(lead, Ordering::SeqCst);

        let listing = self.inner.list(dir);
        self.live_lists.fetch_sub(1, Ordering::SeqCst);
        listing
    }

    fn stat(&self, file: &MemFile) -> FsResult<u64> {
        self.stats.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.stat_delay);
        self.inner.stat(file)
    }
}

#[test]
fn test_concrete_scenario() {
    let mut fs = MemoryFs::new();
    let root = fs.root();
    fs.add_file(root, "a", 10);
    let sub = fs.add_dir(root, "sub");
    fs.add_file(sub, "b", 20);

    let result = sizer(fs, 10).size(root, &Cancellation::new()).unwrap();
    assert_eq!(
        result,
        SizeResult {
            total_size: 30,
            file_count: 2
        }
    );
}

#[test]
fn test_totals_match_tree_for_every_budget() {
    let fs = Arc::new(mixed_tree());
    let expected = SizeResult {
        total_size: fs.total_size(),
        file_count: fs.file_count() as u64,
    };

    for budget in [1, 2, 3, 8, 64] {
        let sizer = DirSizer::new(Arc::clone(&fs), SizerConfig::new(budget).unwrap());
        let result = sizer.size(fs.root(), &Cancellation::new()).unwrap();
        assert_eq!(result, expected, "budget {}", budget);
    }
}

#[test]
fn test_budget_one_and_sixty_four_agree() {
    let low = sizer(MemoryFs::uniform(4, 3, 3, 17), 1);
    let high = sizer(MemoryFs::uniform(4, 3, 3, 17), 64);

    let a = low.size(low.fs().root(), &Cancellation::new()).unwrap();
    let b = high.size(high.fs().root(), &Cancellation::new()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_repeated_calls_are_idempotent() {
    let sizer = sizer(mixed_tree(), 8);
    let root = sizer.fs().root();

    let first = sizer.size(root, &Cancellation::new()).unwrap();
    for _ in 0..5 {
        assert_eq!(sizer.size(root, &Cancellation::new()).unwrap(), first);
    }
}

#[test]
fn test_every_directory_listed_once() {
    let sizer = sizer(MemoryFs::uniform(5, 3, 1, 1), 16);
    let fs = Arc::clone(sizer.fs());

    sizer.size(fs.root(), &Cancellation::new()).unwrap();
    for dir in fs.dirs() {
        assert_eq!(fs.list_calls(dir), 1, "{}", fs.dir_path(dir));
    }
}

#[test]
fn test_empty_root() {
    let fs = MemoryFs::new();
    let root = fs.root();

    let result = sizer(fs, 4).size(root, &Cancellation::new()).unwrap();
    assert_eq!(result, SizeResult::default());
}

#[test]
fn test_single_stat_failure_fails_run() {
    for budget in [1, 4, 32] {
        let mut fs = MemoryFs::uniform(3, 3, 4, 10);
        let victim = fs.files().nth(37).unwrap();
        fs.fail_stat(victim);
        let root = fs.root();

        let started = Instant::now();
        let err = sizer(fs, budget)
            .size(root, &Cancellation::new())
            .unwrap_err();

        assert!(matches!(err, SizerError::Fs(_)), "budget {}: {}", budget, err);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

#[test]
fn test_listing_failure_fails_run() {
    let mut fs = mixed_tree();
    let victim = fs.dirs().nth(5).unwrap();
    fs.fail_list(victim);
    let root = fs.root();

    let err = sizer(fs, 6).size(root, &Cancellation::new()).unwrap_err();
    match err {
        SizerError::Fs(fs_err) => assert!(fs_err.path().starts_with("/deep0")),
        other => panic!("expected a listing failure, got {}", other),
    }
}

#[test]
fn test_fault_stops_other_units() {
    // With a stat failure on the very first file, cancellation should stop
    // the run long before the slow tree is exhausted
    let mut fs = MemoryFs::uniform(4, 4, 2, 1).with_latency(Duration::from_millis(2));
    let first = fs.files().next().unwrap();
    fs.fail_stat(first);
    let total_dirs = fs.dir_count();

    let sizer = sizer(fs, 4);
    let root = sizer.fs().root();
    assert!(sizer.size(root, &Cancellation::new()).is_err());

    let listed = sizer
        .fs()
        .dirs()
        .filter(|dir| sizer.fs().list_calls(*dir) > 0)
        .count();
    assert!(listed < total_dirs, "listed {} of {}", listed, total_dirs);
}

#[test]
fn test_cancel_mid_run() {
    let fs = MemoryFs::uniform(4, 5, 2, 1).with_latency(Duration::from_millis(5));
    let sizer = sizer(fs, 4);
    let root = sizer.fs().root();
    let cancel = Cancellation::new();

    let trigger = {
        let cancel = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        })
    };

    let started = Instant::now();
    let err = sizer.size(root, &cancel).unwrap_err();
    trigger.join().unwrap();

    assert!(matches!(err, SizerError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));

    // Every unit has been joined: no more calls reach the view
    let calls = |fs: &MemoryFs| -> usize {
        fs.dirs().map(|d| fs.list_calls(d)).sum::<usize>()
            + fs.files().map(|f| fs.stat_calls(f)).sum::<usize>()
    };
    let before = calls(sizer.fs());
    thread::sleep(Duration::from_millis(50));
    assert_eq!(calls(sizer.fs()), before);
}

#[test]
fn test_deadline_exceeded() {
    let fs = MemoryFs::uniform(4, 5, 2, 1).with_latency(Duration::from_millis(5));
    let sizer = sizer(fs, 4);
    let root = sizer.fs().root();

    let err = sizer
        .size(root, &Cancellation::with_timeout(Duration::from_millis(40)))
        .unwrap_err();
    assert!(matches!(err, SizerError::DeadlineExceeded));
}

#[test]
fn test_local_tree() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a"), vec![b'a'; 10]).unwrap();
    fs::create_dir_all(dir.path().join("sub/nested")).unwrap();
    fs::write(dir.path().join("sub/b"), vec![b'b'; 20]).unwrap();
    fs::write(dir.path().join("sub/nested/c"), vec![b'c'; 5]).unwrap();
    fs::create_dir(dir.path().join("empty")).unwrap();

    let sizer = DirSizer::new(Arc::new(LocalFs::new()), SizerConfig::new(4).unwrap());
    let result = sizer
        .size(dir.path().to_path_buf(), &Cancellation::new())
        .unwrap();

    assert_eq!(
        result,
        SizeResult {
            total_size: 35,
            file_count: 3
        }
    );
}

#[test]
fn test_local_missing_root_fails() {
    let dir = tempdir().unwrap();
    let missing: PathBuf = dir.path().join("missing");

    let sizer = DirSizer::new(Arc::new(LocalFs::new()), SizerConfig::default());
    let err = sizer.size(missing, &Cancellation::new()).unwrap_err();
    assert!(matches!(err, SizerError::Fs(_)));
}

#[test]
fn test_live_listings_bounded_by_budget() {
    for budget in [1, 4, 16] {
        let fs = Arc::new(InstrumentedFs::new(
            MemoryFs::uniform(3, 3, 2, 7).with_latency(Duration::from_millis(1)),
            Duration::ZERO,
        ));
        let config = SizerConfig::new(budget).unwrap();
        let sizer = DirSizer::new(Arc::clone(&fs), config);

        let result = sizer.size(fs.inner.root(), &Cancellation::new()).unwrap();
        assert_eq!(result.file_count, fs.inner.file_count() as u64);

        let max_live = fs.max_live_lists.load(Ordering::SeqCst);
        assert!(max_live >= 1);
        assert!(
            max_live <= config.traversal_units() && max_live <= budget,
            "budget {}: {} concurrent listings",
            budget,
            max_live
        );
    }
}

#[test]
fn test_slow_workers_throttle_discovery() {
    // One file per directory, so every listing produces exactly one batch
    let tree = MemoryFs::uniform(3, 4, 1, 5);
    let dir_count = tree.dir_count();
    let fs = Arc::new(InstrumentedFs::new(tree, Duration::from_millis(2)));

    let config = SizerConfig::new(2).unwrap();
    let sizer = DirSizer::new(Arc::clone(&fs), config);
    let result = sizer.size(fs.inner.root(), &Cancellation::new()).unwrap();
    assert_eq!(result.file_count, dir_count as u64);

    // A listed directory's batch is either being stat-ed, held by a worker,
    // buffered in the channel, or waiting on a blocked traversal unit
    let bound =
        config.channel_capacity() + config.traversal_units() + config.aggregation_workers();
    let max_lead = fs.max_lead.load(Ordering::SeqCst);
    assert!(
        max_lead <= bound,
        "listing ran {} directories ahead of stat (bound {}, tree {})",
        max_lead,
        bound,
        dir_count
    );
}
