//! Conduit - Queue Fabric
//!
//! The bounded queues connecting pipeline stages, and the process-wide
//! registries that route items between them by opaque [`QueueKey`]s.
//!
//! # Architecture
//!
//! ```text
//! [Inputs]                [Processor cohort]               [Sender cohort]
//!    │  push                     │ pop                           │ drain
//!    ▼                          ▼                               ▼
//! ProcessQueueManager ──→ process queue(s) ──→ SenderQueueManager ──→ sender queue(s)
//!         ▲                     (per pipeline)        ▲            (per flusher)
//!         └── feedback: sender queue crosses its low watermark ────┘
//! ```
//!
//! # Key Design
//!
//! - **Watermark admission**: every bounded queue refuses pushes from the
//!   moment it reaches its high watermark until it drains back to its low
//!   watermark, and fires its upstream [`Feedback`]s once per descent.
//! - **Downstream gating**: a process queue refuses to pop while any of
//!   its downstream sender queues is refusing pushes, so pressure
//!   propagates all the way back to the inputs.
//! - **In-place sending**: sender items stay in their queue while a worker
//!   sends them; a retry flips the item back to `Idle` without moving it,
//!   which keeps retries order-preserving per queue.
//! - **Independent locks**: each queue is internally synchronized; the
//!   registries guard only their maps with reader-writer locks and never
//!   hold a map lock across a queue wait.

mod error;
mod exactly_once_manager;
mod exactly_once_queue;
mod feedback;
mod item;
mod key;
mod limiter;
mod metrics;
mod params;
mod process_queue;
mod process_queue_manager;
mod sched;
mod sender_queue;
mod sender_queue_manager;

#[cfg(test)]
pub(crate) mod test_utils;

pub use error::{QueueError, Result};
pub use exactly_once_manager::ExactlyOnceQueueManager;
pub use exactly_once_queue::ExactlyOnceSenderQueue;
pub use feedback::Feedback;
pub use item::{
    InFlightCounter, ProcessQueueItem, SenderQueueItem, SenderTarget, SendingStatus,
};
pub use item::{CheckpointStore, InMemoryCheckpointStore, RangeCheckpoint};
pub use key::{QueueKey, QueueKeyManager};
pub use limiter::{ConcurrencyLimiter, RateLimiter};
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use params::QueueParam;
pub use process_queue::{BoundedProcessQueue, CircularProcessQueue, ProcessQueue};
pub use process_queue_manager::ProcessQueueManager;
pub use sender_queue::{BoundedSenderQueue, SenderQueueInterface};
pub use sender_queue_manager::SenderQueueManager;

/// Outcome of pushing into a managed queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushResult {
    /// Item accepted
    Ok,
    /// Admission refused by watermark or slot policy; caller backs off
    QueueFull,
    /// No queue registered under the key; item dropped
    QueueNotFound,
}

/// Default grace period before an empty, deleted queue is reaped
pub const DEFAULT_QUEUE_GC_THRESHOLD_SECS: u64 = 300;

/// Hard cap on exactly-once range concurrency per pipeline
pub const MAX_EXACTLY_ONCE_CONCURRENCY: usize = 512;
