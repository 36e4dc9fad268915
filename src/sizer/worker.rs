//! Aggregation workers
//!
//! Each worker:
//! - Waits for the next file batch or the run's cancellation signal
//! - Stats every file in the batch through the filesystem view
//! - Folds each size into its own totals pair
//! - Stops on channel closure, on cancellation, or on its first stat failure
//!
//! A stat failure goes to the fault slot, which cancels the run, so the
//! remaining workers stop at their next suspension point instead of draining
//! batches for a result that is already doomed.
//!
//! [`Worker`] is also the thread handle used for traversal units.

use crate::error::{SizerError, WorkerError};
use crate::fs::FileSystem;
use crate::sizer::cancel::{Cancellation, Wait};
use crate::sizer::queue::FileBatch;
use crate::sizer::state::{RunState, WorkerTotals};
use crossbeam_channel::Receiver;
use std::any::Any;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

/// A named thread taking part in a size run
pub struct Worker {
    /// Pool the thread belongs to ("aggregator" or "traversal")
    role: &'static str,

    /// Worker ID within its pool
    id: usize,

    /// Thread handle
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn `body` on a thread named `{role}-{id}`
    pub fn spawn<B>(role: &'static str, id: usize, body: B) -> Result<Self, WorkerError>
    where
        B: FnOnce() + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name(format!("{}-{}", role, id))
            .spawn(body)
            .map_err(|e| WorkerError::InitFailed {
                role,
                id,
                reason: e.to_string(),
            })?;

        Ok(Self {
            role,
            id,
            handle: Some(handle),
        })
    }

    /// Get worker ID
    pub fn id(&self) -> usize {
        self.id
    }

    /// Get worker role
    pub fn role(&self) -> &'static str {
        self.role
    }

    /// Wait for the worker to finish
    pub fn join(mut self) -> Result<(), WorkerError> {
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|payload| WorkerError::Panicked {
                role: self.role,
                id: self.id,
                message: panic_message(payload.as_ref()),
            }),
            None => Ok(()),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "thread panicked".to_string()
    }
}

/// Start aggregation worker `id`
pub fn spawn_aggregator<F: FileSystem>(
    id: usize,
    fs: Arc<F>,
    batches: Receiver<FileBatch<F::File>>,
    state: Arc<RunState>,
    cancel: Cancellation,
) -> Result<Worker, WorkerError> {
    let totals = state.worker_totals(id);
    Worker::spawn("aggregator", id, move || {
        aggregate_loop(id, fs, batches, totals, state, cancel)
    })
}

/// Main aggregation loop
fn aggregate_loop<F: FileSystem>(
    id: usize,
    fs: Arc<F>,
    batches: Receiver<FileBatch<F::File>>,
    totals: Arc<WorkerTotals>,
    state: Arc<RunState>,
    cancel: Cancellation,
) {
    debug!(worker = id, "Aggregator starting");

    loop {
        let batch = match cancel.recv(&batches) {
            Wait::Ready(batch) => batch,
            Wait::Closed => break,
            Wait::Interrupted(interrupt) => {
                state.fault.record(interrupt);
                break;
            }
        };

        trace!(worker = id, files = batch.len(), "Batch received");

        if let Err(e) = fold_batch(fs.as_ref(), batch, &totals, &cancel) {
            if state.fault.record(e) {
                warn!(worker = id, "Aggregator stopped on first fault");
            }
            break;
        }
    }

    let done = totals.snapshot();
    debug!(
        worker = id,
        files = done.file_count,
        bytes = done.total_size,
        "Aggregator finished"
    );
}

/// Stat every file of one batch into `totals`
///
/// Stops at the first failure, leaving the rest of the batch unprocessed.
fn fold_batch<F: FileSystem>(
    fs: &F,
    batch: FileBatch<F::File>,
    totals: &WorkerTotals,
    cancel: &Cancellation,
) -> Result<(), SizerError> {
    for file in batch {
        if let Some(interrupt) = cancel.interrupted() {
            return Err(interrupt.into());
        }
        let size = fs.stat(&file)?;
        totals.fold(size);
    }
    Ok(())
}
