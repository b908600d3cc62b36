//! Per-pipeline stage metrics
//!
//! Atomic counters with relaxed ordering; eventually consistent.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Input/output counters of one pipeline's processor and flusher stages
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Events entering the processor chain
    processors_in_events_total: AtomicU64,

    /// Groups entering the processor chain
    processors_in_groups_total: AtomicU64,

    /// Payload bytes entering the processor chain
    processors_in_size_bytes: AtomicU64,

    /// Accumulated processor chain wall time
    process_time_ns: AtomicU64,

    /// Groups handed to flushers by the router
    flushers_in_groups_total: AtomicU64,

    /// Events handed to flushers by the router
    flushers_in_events_total: AtomicU64,

    /// Payload bytes handed to flushers
    flushers_in_size_bytes: AtomicU64,

    /// Sender queue admissions refused during send
    send_rejections_total: AtomicU64,
}

impl PipelineMetrics {
    pub const fn new() -> Self {
        Self {
            processors_in_events_total: AtomicU64::new(0),
            processors_in_groups_total: AtomicU64::new(0),
            processors_in_size_bytes: AtomicU64::new(0),
            process_time_ns: AtomicU64::new(0),
            flushers_in_groups_total: AtomicU64::new(0),
            flushers_in_events_total: AtomicU64::new(0),
            flushers_in_size_bytes: AtomicU64::new(0),
            send_rejections_total: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_process_input(&self, events: u64, groups: u64, bytes: u64) {
        self.processors_in_events_total
            .fetch_add(events, Ordering::Relaxed);
        self.processors_in_groups_total
            .fetch_add(groups, Ordering::Relaxed);
        self.processors_in_size_bytes
            .fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_process_time(&self, duration: Duration) {
        self.process_time_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_flusher_input(&self, events: u64, bytes: u64) {
        self.flushers_in_groups_total.fetch_add(1, Ordering::Relaxed);
        self.flushers_in_events_total
            .fetch_add(events, Ordering::Relaxed);
        self.flushers_in_size_bytes
            .fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_send_rejection(&self) {
        self.send_rejections_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineMetricsSnapshot {
        PipelineMetricsSnapshot {
            processors_in_events_total: self.processors_in_events_total.load(Ordering::Relaxed),
            processors_in_groups_total: self.processors_in_groups_total.load(Ordering::Relaxed),
            processors_in_size_bytes: self.processors_in_size_bytes.load(Ordering::Relaxed),
            process_time_ns: self.process_time_ns.load(Ordering::Relaxed),
            flushers_in_groups_total: self.flushers_in_groups_total.load(Ordering::Relaxed),
            flushers_in_events_total: self.flushers_in_events_total.load(Ordering::Relaxed),
            flushers_in_size_bytes: self.flushers_in_size_bytes.load(Ordering::Relaxed),
            send_rejections_total: self.send_rejections_total.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a pipeline's stage metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineMetricsSnapshot {
    pub processors_in_events_total: u64,
    pub processors_in_groups_total: u64,
    pub processors_in_size_bytes: u64,
    pub process_time_ns: u64,
    pub flushers_in_groups_total: u64,
    pub flushers_in_events_total: u64,
    pub flushers_in_size_bytes: u64,
    pub send_rejections_total: u64,
}
