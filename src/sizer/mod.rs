//! Concurrent directory sizer
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────┐
//!                 │     Directory Queue      │
//!                 │  (dynamic FIFO of dirs)  │
//!                 └────────────┬─────────────┘
//!                              │
//!       ┌──────────────────────┼──────────────────────┐
//!       │                      │                      │
//! ┌─────▼──────┐         ┌─────▼──────┐         ┌─────▼──────┐
//! │Traversal 0 │         │Traversal 1 │   ...   │Traversal N │
//! │   list()   │         │   list()   │         │   list()   │
//! └─────┬──────┘         └─────┬──────┘         └─────┬──────┘
//!       └──────────────────────┼──────────────────────┘
//!                              │ one FileBatch per directory
//!                 ┌────────────▼─────────────┐
//!                 │   Bounded hand-off chan  │
//!                 │  (capacity = budget)     │
//!                 └────────────┬─────────────┘
//!       ┌──────────────────────┼──────────────────────┐
//! ┌─────▼──────┐         ┌─────▼──────┐         ┌─────▼──────┐
//! │Aggregator 0│         │Aggregator 1│   ...   │Aggregator M│
//! │   stat()   │         │   stat()   │         │   stat()   │
//! └─────┬──────┘         └─────┬──────┘         └─────┬──────┘
//!       └──────────────────────┼──────────────────────┘
//!                              ▼
//!                 per-worker totals + fault slot
//! ```

pub mod cancel;
pub mod coordinator;
pub mod queue;
pub mod state;
pub mod traversal;
pub mod worker;

pub use cancel::{Cancellation, Interrupt, Wait};
pub use coordinator::{DirSizer, SizerConfig, DEFAULT_BUDGET, MAX_BUDGET};
pub use queue::{DirQueue, FileBatch};
pub use state::{FaultSlot, SizeProgress, SizeResult};
