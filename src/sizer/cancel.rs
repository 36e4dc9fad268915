//! Cooperative cancellation
//!
//! A [`Cancellation`] is a cloneable token. Cancelling drops the only sender
//! of an internal zero-capacity channel, so every thread parked in a
//! `select!` on the token's signal wakes up at once. An optional deadline
//! takes the same path through a `crossbeam_channel::at` timer.
//!
//! Child tokens are cancelled together with their parent, but cancelling a
//! child leaves the parent untouched. A size run works on a child of the
//! caller's token so it can tear itself down without affecting the caller.

use crate::error::SizerError;
use crossbeam_channel::{at, bounded, never, select, Receiver, Sender};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

/// Why a wait was cut short
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The token (or one of its ancestors) was cancelled
    Cancelled,

    /// The token's deadline passed
    DeadlineExceeded,
}

impl From<Interrupt> for SizerError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => SizerError::Cancelled,
            Interrupt::DeadlineExceeded => SizerError::DeadlineExceeded,
        }
    }
}

/// Outcome of a cancellation-aware channel operation
#[derive(Debug, PartialEq, Eq)]
pub enum Wait<T> {
    /// The operation completed
    Ready(T),

    /// The other side of the channel is gone
    Closed,

    /// Cancellation or the deadline fired first
    Interrupted(Interrupt),
}

struct Inner {
    cancelled: AtomicBool,

    /// Never sends; dropped on cancel to disconnect `signal`
    trigger: Mutex<Option<Sender<()>>>,

    signal: Receiver<()>,

    deadline: Option<Instant>,

    children: Mutex<Vec<Weak<Inner>>>,
}

impl Inner {
    fn new(deadline: Option<Instant>) -> Arc<Self> {
        let (trigger, signal) = bounded(0);
        Arc::new(Self {
            cancelled: AtomicBool::new(false),
            trigger: Mutex::new(Some(trigger)),
            signal,
            deadline,
            children: Mutex::new(Vec::new()),
        })
    }

    fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        self.trigger.lock().take();

        let children = std::mem::take(&mut *self.children.lock());
        for child in children.iter().filter_map(Weak::upgrade) {
            child.cancel();
        }
    }
}

/// Cloneable cancellation token with an optional deadline
#[derive(Clone)]
pub struct Cancellation {
    inner: Arc<Inner>,
}

impl Cancellation {
    /// A token that is only cancelled explicitly
    pub fn new() -> Self {
        Self {
            inner: Inner::new(None),
        }
    }

    /// A token that also fires once `deadline` passes
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            inner: Inner::new(Some(deadline)),
        }
    }

    /// A token that also fires `timeout` from now
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A token cancelled whenever this one is, sharing its deadline
    pub fn child(&self) -> Self {
        let child = Self {
            inner: Inner::new(self.inner.deadline),
        };

        let mut children = self.inner.children.lock();
        if self.inner.cancelled.load(Ordering::SeqCst) {
            drop(children);
            child.cancel();
        } else {
            children.retain(|weak| weak.strong_count() > 0);
            children.push(Arc::downgrade(&child.inner));
        }

        child
    }

    /// Cancel this token and every child; idempotent
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Returns true once `cancel` has been called on this token or an ancestor
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Non-blocking check; cancellation takes precedence over the deadline
    pub fn interrupted(&self) -> Option<Interrupt> {
        if self.is_cancelled() {
            return Some(Interrupt::Cancelled);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(Interrupt::DeadlineExceeded),
            _ => None,
        }
    }

    /// Disconnected once the token is cancelled
    pub(crate) fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// Fires when the deadline passes; never fires without one
    pub(crate) fn deadline_timer(&self) -> Receiver<Instant> {
        match self.inner.deadline {
            Some(deadline) => at(deadline),
            None => never(),
        }
    }

    /// Receive from `rx` unless the token fires first
    pub fn recv<T>(&self, rx: &Receiver<T>) -> Wait<T> {
        if let Some(interrupt) = self.interrupted() {
            return Wait::Interrupted(interrupt);
        }

        let timer = self.deadline_timer();
        select! {
            recv(rx) -> msg => match msg {
                Ok(value) => Wait::Ready(value),
                Err(_) => Wait::Closed,
            },
            recv(self.signal()) -> _ => Wait::Interrupted(Interrupt::Cancelled),
            recv(timer) -> _ => Wait::Interrupted(Interrupt::DeadlineExceeded),
        }
    }

    /// Send `value` on `tx`, blocking while the channel is full, unless the
    /// token fires first
    pub fn send<T>(&self, tx: &Sender<T>, value: T) -> Wait<()> {
        if let Some(interrupt) = self.interrupted() {
            return Wait::Interrupted(interrupt);
        }

        let timer = self.deadline_timer();
        select! {
            send(tx, value) -> res => match res {
                Ok(()) => Wait::Ready(()),
                Err(_) => Wait::Closed,
            },
            recv(self.signal()) -> _ => Wait::Interrupted(Interrupt::Cancelled),
            recv(timer) -> _ => Wait::Interrupted(Interrupt::DeadlineExceeded),
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cancellation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancellation")
            .field("cancelled", &self.is_cancelled())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}
