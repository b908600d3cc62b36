//! Per-queue metrics
//!
//! Atomic counters and gauges, relaxed ordering throughout. Values are
//! eventually consistent; the queue's own lock is the source of truth.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters and gauges exposed by every queue
#[derive(Debug, Default)]
pub struct QueueMetrics {
    /// Items accepted by push
    in_items_total: AtomicU64,

    /// Items that left the queue (pop or remove)
    out_items_total: AtomicU64,

    /// Payload bytes accepted by push
    in_item_data_size_bytes: AtomicU64,

    /// Resident item count (gauge)
    queue_size_total: AtomicU64,

    /// Resident payload bytes (gauge)
    queue_data_size_bytes: AtomicU64,

    /// Admission flag as 0/1 (gauge)
    valid_to_push: AtomicU64,

    /// Items evicted by a circular queue to admit newer ones
    discarded_items_total: AtomicU64,
}

impl QueueMetrics {
    pub const fn new() -> Self {
        Self {
            in_items_total: AtomicU64::new(0),
            out_items_total: AtomicU64::new(0),
            in_item_data_size_bytes: AtomicU64::new(0),
            queue_size_total: AtomicU64::new(0),
            queue_data_size_bytes: AtomicU64::new(0),
            valid_to_push: AtomicU64::new(1),
            discarded_items_total: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_push(&self, data_size: u64) {
        self.in_items_total.fetch_add(1, Ordering::Relaxed);
        self.in_item_data_size_bytes
            .fetch_add(data_size, Ordering::Relaxed);
        self.queue_size_total.fetch_add(1, Ordering::Relaxed);
        self.queue_data_size_bytes
            .fetch_add(data_size, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_out(&self, data_size: u64) {
        self.out_items_total.fetch_add(1, Ordering::Relaxed);
        self.queue_size_total.fetch_sub(1, Ordering::Relaxed);
        self.queue_data_size_bytes
            .fetch_sub(data_size, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_discard(&self, data_size: u64) {
        self.discarded_items_total.fetch_add(1, Ordering::Relaxed);
        self.queue_size_total.fetch_sub(1, Ordering::Relaxed);
        self.queue_data_size_bytes
            .fetch_sub(data_size, Ordering::Relaxed);
    }

    #[inline]
    pub fn set_valid_to_push(&self, valid: bool) {
        self.valid_to_push.store(valid as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            in_items_total: self.in_items_total.load(Ordering::Relaxed),
            out_items_total: self.out_items_total.load(Ordering::Relaxed),
            in_item_data_size_bytes: self.in_item_data_size_bytes.load(Ordering::Relaxed),
            queue_size_total: self.queue_size_total.load(Ordering::Relaxed),
            queue_data_size_bytes: self.queue_data_size_bytes.load(Ordering::Relaxed),
            valid_to_push: self.valid_to_push.load(Ordering::Relaxed) == 1,
            discarded_items_total: self.discarded_items_total.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a queue's metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueMetricsSnapshot {
    pub in_items_total: u64,
    pub out_items_total: u64,
    pub in_item_data_size_bytes: u64,
    pub queue_size_total: u64,
    pub queue_data_size_bytes: u64,
    pub valid_to_push: bool,
    pub discarded_items_total: u64,
}
