//! Size coordinator - orchestrates one size run
//!
//! A run is a short state machine:
//!
//! ```text
//! SPAWN_WORKERS → SPAWN_TRAVERSAL → AWAIT_TRAVERSAL → CLOSE_CHANNEL
//!               → AWAIT_WORKERS → CANCEL → RETURN
//! ```
//!
//! The hand-off channel is closed by dropping the coordinator's sender once
//! every traversal unit has been joined, so nothing can send on it
//! afterwards. The run works on a child of the caller's cancellation token;
//! the final CANCEL releases anything still parked on it without touching
//! the caller's token.

use crate::error::{ConfigError, Result, SizerError};
use crate::fs::FileSystem;
use crate::sizer::cancel::Cancellation;
use crate::sizer::queue::{DirQueue, FileBatch};
use crate::sizer::state::{RunState, SizeProgress, SizeResult};
use crate::sizer::traversal::spawn_traversal;
use crate::sizer::worker::{spawn_aggregator, Worker};
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Default concurrency budget
pub const DEFAULT_BUDGET: usize = 10;

/// Maximum reasonable concurrency budget
pub const MAX_BUDGET: usize = 512;

/// Interval between progress callbacks
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Concurrency settings for a [`DirSizer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizerConfig {
    budget: usize,
}

impl SizerConfig {
    /// Validate a concurrency budget
    pub fn new(budget: usize) -> std::result::Result<Self, ConfigError> {
        if budget == 0 || budget > MAX_BUDGET {
            return Err(ConfigError::InvalidBudget {
                budget,
                max: MAX_BUDGET,
            });
        }
        Ok(Self { budget })
    }

    /// Cap on concurrently running traversal units
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Traversal units in the pool: half the budget, at least one
    pub fn traversal_units(&self) -> usize {
        (self.budget / 2).max(1)
    }

    /// Aggregation workers in the pool: half the budget, at least one
    pub fn aggregation_workers(&self) -> usize {
        (self.budget / 2).max(1)
    }

    /// Buffered batches between traversal and aggregation
    pub fn channel_capacity(&self) -> usize {
        self.budget
    }
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
        }
    }
}

type ProgressCallback = Box<dyn Fn(SizeProgress) + Send>;

/// Computes the total size and file count of a directory tree
pub struct DirSizer<F: FileSystem> {
    fs: Arc<F>,
    config: SizerConfig,
}

impl<F: FileSystem> DirSizer<F> {
    /// Create a sizer over `fs`
    pub fn new(fs: Arc<F>, config: SizerConfig) -> Self {
        Self { fs, config }
    }

    /// The filesystem view
    pub fn fs(&self) -> &Arc<F> {
        &self.fs
    }

    /// Concurrency settings
    pub fn config(&self) -> &SizerConfig {
        &self.config
    }

    /// Size the tree under `root`
    ///
    /// Returns the first fault of the run, if any. No partial totals are
    /// returned alongside an error.
    pub fn size(&self, root: F::Dir, cancel: &Cancellation) -> Result<SizeResult> {
        self.run(root, cancel, None)
    }

    /// Same as [`size`](Self::size), reporting progress about every 100 ms
    pub fn size_with_progress<P>(
        &self,
        root: F::Dir,
        cancel: &Cancellation,
        progress_callback: P,
    ) -> Result<SizeResult>
    where
        P: Fn(SizeProgress) + Send + 'static,
    {
        self.run(root, cancel, Some(Box::new(progress_callback)))
    }

    fn run(
        &self,
        root: F::Dir,
        cancel: &Cancellation,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<SizeResult> {
        let start = Instant::now();

        if let Some(interrupt) = cancel.interrupted() {
            return Err(interrupt.into());
        }

        let run_cancel = cancel.child();
        let worker_count = self.config.aggregation_workers();
        let unit_count = self.config.traversal_units();
        let state = Arc::new(RunState::new(run_cancel.clone(), worker_count));
        let queue = Arc::new(DirQueue::new());
        let (batch_tx, batch_rx) = bounded::<FileBatch<F::File>>(self.config.channel_capacity());

        info!(
            budget = self.config.budget(),
            traversal_units = unit_count,
            workers = worker_count,
            "Starting size run"
        );

        let reporter = progress_callback
            .and_then(|callback| spawn_reporter(Arc::clone(&state), start, callback));

        // SPAWN_WORKERS
        let mut workers = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            match spawn_aggregator(
                id,
                Arc::clone(&self.fs),
                batch_rx.clone(),
                Arc::clone(&state),
                run_cancel.clone(),
            ) {
                Ok(worker) => workers.push(worker),
                Err(e) => {
                    state.fault.record(e);
                    break;
                }
            }
        }
        // Only the workers hold receivers from here on
        drop(batch_rx);

        // SPAWN_TRAVERSAL
        let mut units = Vec::with_capacity(unit_count);
        if !state.fault.is_set() {
            queue.push(root);
            for id in 0..unit_count {
                match spawn_traversal(
                    id,
                    Arc::clone(&self.fs),
                    Arc::clone(&queue),
                    batch_tx.clone(),
                    Arc::clone(&state),
                    run_cancel.clone(),
                ) {
                    Ok(unit) => units.push(unit),
                    Err(e) => {
                        state.fault.record(e);
                        break;
                    }
                }
            }
        }
        debug!(units = units.len(), workers = workers.len(), "Pools started");

        // AWAIT_TRAVERSAL
        join_all(units, &state);

        // CLOSE_CHANNEL
        drop(batch_tx);

        // AWAIT_WORKERS
        join_all(workers, &state);

        // CANCEL
        run_cancel.cancel();

        if let Some(reporter) = reporter {
            reporter.stop();
        }

        // RETURN
        let elapsed = start.elapsed();
        let stats = queue.stats();
        if let Some(fault) = state.fault.take() {
            if fault.is_interrupt() {
                info!(
                    reason = %fault,
                    dirs = state.dirs_listed(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Size run interrupted"
                );
            } else {
                // abandoned: directories queued but never listed
                warn!(
                    error = %fault,
                    dirs = state.dirs_listed(),
                    abandoned = queue.outstanding(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Size run failed"
                );
            }
            return Err(fault);
        }

        let result = state.totals();
        info!(
            dirs = state.dirs_listed(),
            enqueued = stats.enqueued.load(Ordering::Relaxed),
            dequeued = stats.dequeued.load(Ordering::Relaxed),
            files = result.file_count,
            bytes = result.total_size,
            elapsed_ms = elapsed.as_millis() as u64,
            "Size run completed"
        );

        Ok(result)
    }
}

/// Join every thread, recording panics in the fault slot
fn join_all(workers: Vec<Worker>, state: &RunState) {
    for worker in workers {
        let (role, id) = (worker.role(), worker.id());
        if let Err(e) = worker.join() {
            warn!(role, id, error = %e, "Thread failed to join cleanly");
            state.fault.record(SizerError::Worker(e));
        }
    }
}

/// Thread invoking the progress callback until stopped
struct Reporter {
    stop: crossbeam_channel::Sender<()>,
    worker: Worker,
}

impl Reporter {
    /// Stop the reporter after one final callback
    fn stop(self) {
        drop(self.stop);
        if let Err(e) = self.worker.join() {
            warn!(error = %e, "Progress reporter failed");
        }
    }
}

fn spawn_reporter(
    state: Arc<RunState>,
    start: Instant,
    callback: ProgressCallback,
) -> Option<Reporter> {
    let (stop, stopped) = bounded::<()>(0);

    let spawned = Worker::spawn("progress", 0, move || loop {
        match stopped.recv_timeout(PROGRESS_INTERVAL) {
            Err(RecvTimeoutError::Timeout) => callback(state.progress(start.elapsed())),
            _ => {
                callback(state.progress(start.elapsed()));
                break;
            }
        }
    });

    match spawned {
        Ok(worker) => Some(Reporter { stop, worker }),
        Err(e) => {
            // Progress is cosmetic; the run goes ahead without it
            warn!(error = %e, "Progress reporter unavailable");
            None
        }
    }
}
