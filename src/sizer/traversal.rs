//! Traversal units
//!
//! A fixed pool of units walks the tree breadth-first through the shared
//! [`DirQueue`]. Each unit repeats:
//!
//! 1. take the next directory (or learn that the walk is over)
//! 2. list it through the filesystem view
//! 3. send its files as one batch on the bounded hand-off channel, blocking
//!    while the aggregation workers are behind
//! 4. queue its subdirectories
//!
//! The pool size is the concurrency bound: at most that many listings are in
//! flight, however wide or deep the tree. A listing failure or an interrupt
//! goes to the fault slot and ends the unit; the abandoned subtree is not
//! handed to anyone else.

use crate::error::WorkerError;
use crate::fs::{FileSystem, Listing};
use crate::sizer::cancel::{Cancellation, Wait};
use crate::sizer::queue::{DirQueue, FileBatch, Next, TaskGuard};
use crate::sizer::state::RunState;
use crate::sizer::worker::Worker;
use crossbeam_channel::Sender;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Start traversal unit `id`
pub fn spawn_traversal<F: FileSystem>(
    id: usize,
    fs: Arc<F>,
    queue: Arc<DirQueue<F::Dir>>,
    batches: Sender<FileBatch<F::File>>,
    state: Arc<RunState>,
    cancel: Cancellation,
) -> Result<Worker, WorkerError> {
    Worker::spawn("traversal", id, move || {
        traversal_loop(id, fs, queue, batches, state, cancel)
    })
}

/// Main traversal loop
fn traversal_loop<F: FileSystem>(
    id: usize,
    fs: Arc<F>,
    queue: Arc<DirQueue<F::Dir>>,
    batches: Sender<FileBatch<F::File>>,
    state: Arc<RunState>,
    cancel: Cancellation,
) {
    debug!(unit = id, "Traversal unit starting");
    let mut listed = 0u64;

    loop {
        let dir = match queue.next(&cancel) {
            Next::Task(dir) => dir,
            Next::Done => break,
            Next::Interrupted(interrupt) => {
                state.fault.record(interrupt);
                break;
            }
        };

        // Completes the task on every exit path below
        let _guard = TaskGuard::new(&queue);

        let Listing { dirs, files } = match fs.list(&dir) {
            Ok(listing) => listing,
            Err(e) => {
                if state.fault.record(e) {
                    warn!(unit = id, "Listing failed, abandoning subtree");
                }
                break;
            }
        };
        state.record_dir();
        listed += 1;

        trace!(unit = id, dirs = dirs.len(), files = files.len(), "Directory listed");

        if !files.is_empty() {
            match cancel.send(&batches, FileBatch::new(files)) {
                Wait::Ready(()) => {}
                // Every aggregator is gone; the join reports why
                Wait::Closed => break,
                Wait::Interrupted(interrupt) => {
                    state.fault.record(interrupt);
                    break;
                }
            }
        }

        for subdir in dirs {
            queue.push(subdir);
        }
    }

    debug!(unit = id, dirs = listed, "Traversal unit finished");
}
