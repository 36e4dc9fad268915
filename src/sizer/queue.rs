//! Directory task queue and file batch hand-off
//!
//! Traversal units share one dynamic FIFO of "list this directory" tasks.
//! An outstanding counter covers queued and in-progress tasks; it is bumped
//! before a task is queued and dropped only after the task's subdirectories
//! have been queued, so it can only reach zero once the whole tree has been
//! listed. The unit that brings it to zero disconnects the `done` channel,
//! which wakes every idle unit.
//!
//! File batches travel on a separate bounded channel (see `DirSizer`); its
//! capacity is the backpressure between traversal and aggregation.

use crate::sizer::cancel::{Cancellation, Interrupt};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Files discovered in one directory listing, handed to one worker
#[derive(Debug)]
pub struct FileBatch<F> {
    files: Vec<F>,
}

impl<F> FileBatch<F> {
    /// Wrap the files of one listing
    pub fn new(files: Vec<F>) -> Self {
        Self { files }
    }

    /// Number of files in the batch
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if the batch holds no files
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl<F> IntoIterator for FileBatch<F> {
    type Item = F;
    type IntoIter = std::vec::IntoIter<F>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

/// What a traversal unit gets from [`DirQueue::next`]
#[derive(Debug)]
pub enum Next<D> {
    /// A directory to list
    Task(D),

    /// Every directory has been listed
    Done,

    /// The run was cancelled or timed out
    Interrupted(Interrupt),
}

/// Statistics for the task queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total tasks enqueued
    pub enqueued: AtomicU64,

    /// Total tasks dequeued
    pub dequeued: AtomicU64,
}

/// Shared FIFO of directories waiting to be listed
pub struct DirQueue<D> {
    sender: Sender<D>,
    receiver: Receiver<D>,

    /// Queued plus in-progress tasks
    outstanding: AtomicUsize,

    /// Never sends; dropped when `outstanding` reaches zero
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,

    stats: QueueStats,
}

impl<D> DirQueue<D> {
    /// Create an empty queue
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        let (done_tx, done_rx) = bounded(0);

        Self {
            sender,
            receiver,
            outstanding: AtomicUsize::new(0),
            done_tx: Mutex::new(Some(done_tx)),
            done_rx,
            stats: QueueStats::default(),
        }
    }

    /// Queue a directory for listing
    pub fn push(&self, dir: D) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        // The queue holds its own receiver, so the channel cannot disconnect
        if self.sender.send(dir).is_ok() {
            self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Mark one task as fully processed
    pub fn complete(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.done_tx.lock().take();
        }
    }

    /// Wait for the next directory, the end of the walk, or an interrupt
    pub fn next(&self, cancel: &Cancellation) -> Next<D> {
        if let Some(interrupt) = cancel.interrupted() {
            return Next::Interrupted(interrupt);
        }

        let timer = cancel.deadline_timer();
        select! {
            recv(self.receiver) -> msg => match msg {
                Ok(dir) => {
                    self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                    Next::Task(dir)
                }
                Err(_) => Next::Done,
            },
            recv(self.done_rx) -> _ => Next::Done,
            recv(cancel.signal()) -> _ => Next::Interrupted(Interrupt::Cancelled),
            recv(timer) -> _ => Next::Interrupted(Interrupt::DeadlineExceeded),
        }
    }

    /// Queued plus in-progress tasks
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Get queue statistics
    pub fn stats(&self) -> &QueueStats {
        &self.stats
    }
}

impl<D> Default for DirQueue<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard completing a task when dropped, including on unwind
pub struct TaskGuard<'a, D> {
    queue: &'a DirQueue<D>,
}

impl<'a, D> TaskGuard<'a, D> {
    /// Guard the task just taken from `queue`
    pub fn new(queue: &'a DirQueue<D>) -> Self {
        Self { queue }
    }
}

impl<'a, D> Drop for TaskGuard<'a, D> {
    fn drop(&mut self) {
        self.queue.complete();
    }
}
