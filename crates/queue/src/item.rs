//! Queue items and the exactly-once checkpoint types

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;

use conduit_model::EventGroup;

use crate::key::QueueKey;

/// One unit of work in a process queue
#[derive(Debug)]
pub struct ProcessQueueItem {
    pub group: EventGroup,
    /// Which of the pipeline's inputs produced this group
    pub input_index: usize,
    pub enqueue_time: Instant,
}

impl ProcessQueueItem {
    pub fn new(group: EventGroup, input_index: usize) -> Self {
        Self {
            group,
            input_index,
            enqueue_time: Instant::now(),
        }
    }

    #[inline]
    pub fn data_size(&self) -> usize {
        self.group.data_size()
    }
}

/// Send state of a sender queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SendingStatus {
    /// Waiting in the queue
    Idle = 0,
    /// Claimed by a sender worker
    Sending = 1,
    /// Acknowledged; about to be removed
    Sent = 2,
}

impl SendingStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => SendingStatus::Idle,
            1 => SendingStatus::Sending,
            _ => SendingStatus::Sent,
        }
    }
}

/// Outbound transport half of a flusher, as seen by sender workers
///
/// The queue layer is content-opaque: it hands the serialized item to this
/// trait and interprets nothing but the boolean outcome.
pub trait SenderTarget: Send + Sync {
    /// Attempt one delivery; `false` means retry later
    fn send(&self, item: &SenderQueueItem) -> bool;

    /// Flusher plugin name, for logs
    fn name(&self) -> &str;
}

/// Serialized payload parked in a sender queue
///
/// Items are shared between the queue and sender workers, so the mutable
/// parts are atomics. An item stays at its queue position across retries;
/// only successful completion removes it.
pub struct SenderQueueItem {
    /// Serialized payload
    pub data: Bytes,
    /// Payload size before serialization, for rate accounting
    pub raw_size: usize,
    /// Flusher that built this payload and will transport it
    pub target: Arc<dyn SenderTarget>,
    /// Sender queue this item belongs to
    pub queue_key: QueueKey,
    pub enqueue_time: Instant,
    status: AtomicU8,
    attempt_count: AtomicU32,
    /// Exactly-once slot binding, absent on ordinary items
    pub checkpoint: Option<Arc<RangeCheckpoint>>,
}

impl SenderQueueItem {
    pub fn new(data: Bytes, raw_size: usize, target: Arc<dyn SenderTarget>, queue_key: QueueKey) -> Self {
        Self {
            data,
            raw_size,
            target,
            queue_key,
            enqueue_time: Instant::now(),
            status: AtomicU8::new(SendingStatus::Idle as u8),
            attempt_count: AtomicU32::new(0),
            checkpoint: None,
        }
    }

    pub fn with_checkpoint(mut self, checkpoint: Arc<RangeCheckpoint>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    #[inline]
    pub fn status(&self) -> SendingStatus {
        SendingStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    /// Atomically move between states; `false` if the item was not in `from`
    pub fn transition(&self, from: SendingStatus, to: SendingStatus) -> bool {
        self.status
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn record_attempt(&self) {
        self.attempt_count.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for SenderQueueItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderQueueItem")
            .field("queue_key", &self.queue_key)
            .field("raw_size", &self.raw_size)
            .field("status", &self.status())
            .field("attempt_count", &self.attempt_count())
            .field("checkpoint", &self.checkpoint)
            .finish()
    }
}

/// Count of items popped from a process queue but not yet fully enqueued
/// into every target sender queue
///
/// The process queue increments under its own lock before the item becomes
/// visible to the processor stage; the pipeline decrements after routing.
/// Teardown spins on zero, so the pairing discipline is what makes reload
/// observe no item in transit.
#[derive(Debug)]
pub struct InFlightCounter {
    pipeline: String,
    count: AtomicI64,
}

impl InFlightCounter {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            count: AtomicI64::new(0),
        }
    }

    #[inline]
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline
    }

    #[inline]
    pub fn add(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrement, guarding against going negative
    pub fn sub(&self) {
        if self.count.load(Ordering::Acquire) == 0 {
            // should never happen
            tracing::error!(pipeline = %self.pipeline, "in-flight count underflow, sub when 0");
            return;
        }
        self.count.fetch_sub(1, Ordering::AcqRel);
    }

    #[inline]
    pub fn get(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }
}

/// Persistent identity of one exactly-once range slot
///
/// Slots are fixed at pipeline init and reused across restarts by
/// `hash_key`; `sequence_id` advances once per acknowledged send.
#[derive(Debug)]
pub struct RangeCheckpoint {
    /// Slot index inside the pipeline's exactly-once queue
    pub index: usize,
    /// Stable identity of the file range this slot serves
    pub hash_key: String,
    sequence_id: AtomicU64,
    /// Key of the process queue to wake when the slot frees
    pub fb_key: QueueKey,
}

impl RangeCheckpoint {
    pub fn new(index: usize, hash_key: impl Into<String>, sequence_id: u64, fb_key: QueueKey) -> Self {
        Self {
            index,
            hash_key: hash_key.into(),
            sequence_id: AtomicU64::new(sequence_id),
            fb_key,
        }
    }

    #[inline]
    pub fn sequence_id(&self) -> u64 {
        self.sequence_id.load(Ordering::Acquire)
    }

    /// Advance after an acknowledged send; returns the new value
    pub fn advance_sequence(&self) -> u64 {
        self.sequence_id.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// The `hash_key → sequence_id` side-channel behind exactly-once delivery
///
/// Maintained by the flusher; the queue layer only requires that a
/// checkpoint round-trips intact.
pub trait CheckpointStore: Send + Sync {
    fn set(&self, hash_key: &str, sequence_id: u64);
    fn get(&self, hash_key: &str) -> Option<u64>;
}

/// Map-backed store for tests and single-process runs
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    map: RwLock<HashMap<String, u64>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn set(&self, hash_key: &str, sequence_id: u64) {
        self.map.write().insert(hash_key.to_string(), sequence_id);
    }

    fn get(&self, hash_key: &str) -> Option<u64> {
        self.map.read().get(hash_key).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_are_guarded() {
        let item = crate::test_utils::make_item(QueueKey(1), 8);
        assert_eq!(item.status(), SendingStatus::Idle);
        assert!(item.transition(SendingStatus::Idle, SendingStatus::Sending));
        assert!(!item.transition(SendingStatus::Idle, SendingStatus::Sending));
        assert!(item.transition(SendingStatus::Sending, SendingStatus::Idle));
    }

    #[test]
    fn in_flight_counter_never_goes_negative() {
        let counter = InFlightCounter::new("p");
        counter.sub();
        assert_eq!(counter.get(), 0);
        counter.add();
        counter.add();
        counter.sub();
        assert_eq!(counter.get(), 1);
    }

    #[test]
    fn checkpoint_round_trips_through_the_store() {
        let store = InMemoryCheckpointStore::new();
        let cpt = RangeCheckpoint::new(0, "range-0", 7, QueueKey(3));
        assert_eq!(cpt.advance_sequence(), 8);
        store.set(&cpt.hash_key, cpt.sequence_id());
        assert_eq!(store.get("range-0"), Some(8));
        assert_eq!(store.get("range-1"), None);
    }
}
