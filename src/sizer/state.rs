//! Shared aggregation state for one size run
//!
//! Totals are accumulated per aggregation worker: each worker owns one
//! mutex-guarded `(total_size, file_count)` pair and is the only writer, so
//! the lock is uncontended except for progress snapshots. A snapshot always
//! sees both halves of a pair from the same fold. The per-worker pairs are
//! combined once the run has joined.

use crate::error::SizerError;
use crate::sizer::cancel::Cancellation;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Size and file count of a directory tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SizeResult {
    /// Sum of file sizes in bytes
    pub total_size: u64,

    /// Number of files
    pub file_count: u64,
}

impl SizeResult {
    /// Fold one file into the totals
    pub fn add_file(&mut self, size: u64) {
        self.total_size += size;
        self.file_count += 1;
    }

    /// Combine with another set of totals
    pub fn merge(&mut self, other: SizeResult) {
        self.total_size += other.total_size;
        self.file_count += other.file_count;
    }
}

/// Totals owned by a single aggregation worker
#[derive(Debug, Default)]
pub struct WorkerTotals {
    totals: Mutex<SizeResult>,
}

impl WorkerTotals {
    /// Add one file's size and bump the file count as a single update
    pub fn fold(&self, size: u64) {
        self.totals.lock().add_file(size);
    }

    /// Consistent copy of the pair
    pub fn snapshot(&self) -> SizeResult {
        *self.totals.lock()
    }
}

/// Write-once holder for the first fault of a run
///
/// Recording the first fault cancels the run's token, so every other unit
/// stops at its next suspension point. Later faults are discarded.
#[derive(Debug)]
pub struct FaultSlot {
    fault: Mutex<Option<SizerError>>,
    cancel: Cancellation,
}

impl FaultSlot {
    /// Empty slot broadcasting on `cancel`
    pub fn new(cancel: Cancellation) -> Self {
        Self {
            fault: Mutex::new(None),
            cancel,
        }
    }

    /// Store `err` unless a fault is already present
    ///
    /// Returns true if this call won the slot.
    pub fn record(&self, err: impl Into<SizerError>) -> bool {
        let err = err.into();
        {
            let mut slot = self.fault.lock();
            if slot.is_some() {
                debug!(error = %err, "Discarding later fault");
                return false;
            }
            *slot = Some(err);
        }
        self.cancel.cancel();
        true
    }

    /// Returns true once a fault has been recorded
    pub fn is_set(&self) -> bool {
        self.fault.lock().is_some()
    }

    /// Remove the recorded fault
    pub fn take(&self) -> Option<SizerError> {
        self.fault.lock().take()
    }
}

/// Live progress of a size run
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SizeProgress {
    /// Directories listed so far
    pub dirs: u64,

    /// Files stat-ed so far
    pub files: u64,

    /// Bytes accumulated so far
    pub bytes: u64,

    /// Time since the run started
    pub elapsed: Duration,
}

impl SizeProgress {
    /// Calculate files per second rate
    pub fn files_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.files as f64 / secs
        } else {
            0.0
        }
    }
}

/// Everything the units of one run share
#[derive(Debug)]
pub struct RunState {
    /// First fault of the run
    pub fault: FaultSlot,

    dirs_listed: AtomicU64,

    workers: Vec<Arc<WorkerTotals>>,
}

impl RunState {
    /// Fresh state for `workers` aggregation workers
    pub fn new(cancel: Cancellation, workers: usize) -> Self {
        Self {
            fault: FaultSlot::new(cancel),
            dirs_listed: AtomicU64::new(0),
            workers: (0..workers)
                .map(|_| Arc::new(WorkerTotals::default()))
                .collect(),
        }
    }

    /// Totals slot for worker `id`
    pub fn worker_totals(&self, id: usize) -> Arc<WorkerTotals> {
        Arc::clone(&self.workers[id])
    }

    /// Record one successful directory listing
    pub fn record_dir(&self) {
        self.dirs_listed.fetch_add(1, Ordering::Relaxed);
    }

    /// Directories listed so far
    pub fn dirs_listed(&self) -> u64 {
        self.dirs_listed.load(Ordering::Relaxed)
    }

    /// Combined totals across all workers
    pub fn totals(&self) -> SizeResult {
        let mut combined = SizeResult::default();
        for worker in &self.workers {
            combined.merge(worker.snapshot());
        }
        combined
    }

    /// Progress snapshot
    pub fn progress(&self, elapsed: Duration) -> SizeProgress {
        let totals = self.totals();
        SizeProgress {
            dirs: self.dirs_listed(),
            files: totals.file_count,
            bytes: totals.total_size,
            elapsed,
        }
    }
}
