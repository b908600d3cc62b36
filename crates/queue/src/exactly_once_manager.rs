//! Exactly-once queue registry
//!
//! Parallel registry for exactly-once flows. Each pipeline key owns one
//! bounded process queue (capacity = range concurrency) and one
//! exactly-once sender queue whose slots bind the pipeline's persistent
//! range checkpoints. The ordinary managers consult this registry when a
//! key is not in their own maps, so inputs and workers use a single entry
//! point either way.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use crate::error::{QueueError, Result};
use crate::feedback::Feedback;
use crate::item::{InFlightCounter, ProcessQueueItem, RangeCheckpoint, SenderQueueItem};
use crate::key::QueueKey;
use crate::params::QueueParam;
use crate::process_queue::BoundedProcessQueue;
use crate::exactly_once_queue::ExactlyOnceSenderQueue;
use crate::sched::PriorityBuckets;
use crate::sender_queue::SenderQueueInterface;
use crate::{PushResult, DEFAULT_QUEUE_GC_THRESHOLD_SECS};

struct ExactlyOnceEntry {
    process_queue: Arc<BoundedProcessQueue>,
    sender_queue: Arc<ExactlyOnceSenderQueue>,
    priority: u32,
}

/// Registry of exactly-once process/sender queue pairs
pub struct ExactlyOnceQueueManager {
    entries: RwLock<HashMap<QueueKey, ExactlyOnceEntry>>,
    buckets: Mutex<PriorityBuckets>,
    deletion_times: Mutex<HashMap<QueueKey, Instant>>,
    gc_threshold_secs: AtomicU64,
}

impl Default for ExactlyOnceQueueManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ExactlyOnceQueueManager {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            buckets: Mutex::new(PriorityBuckets::default()),
            deletion_times: Mutex::new(HashMap::new()),
            gc_threshold_secs: AtomicU64::new(DEFAULT_QUEUE_GC_THRESHOLD_SECS),
        }
    }

    /// Create the queue pair for a pipeline, or rebind an existing pair
    ///
    /// An existing pair with the same slot count is reused so that the
    /// checkpoints' sequence state survives a reload; a changed slot count
    /// rebuilds both queues.
    pub fn create_or_update_queue(
        &self,
        key: QueueKey,
        priority: u32,
        checkpoints: Vec<Arc<RangeCheckpoint>>,
        in_flight: Arc<InFlightCounter>,
    ) -> Result<()> {
        if checkpoints.is_empty() {
            return Err(QueueError::NoCheckpoints(key));
        }
        let slot_count = checkpoints.len();
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(&key) {
            if entry.sender_queue.slot_count() == slot_count {
                // Queues reused, checkpoint state preserved. The in-flight
                // binding stays with the running pipeline; its replacement
                // rebinds at start.
                let old_priority = entry.priority;
                entry.priority = priority;
                self.buckets.lock().reassign(old_priority, priority, key);
                self.deletion_times.lock().remove(&key);
                return Ok(());
            }
            self.buckets.lock().remove(entry.priority, key);
        }
        let sender_queue = Arc::new(ExactlyOnceSenderQueue::new(key, checkpoints));
        let process_queue = Arc::new(BoundedProcessQueue::new(
            key,
            Self::process_param(slot_count),
            in_flight,
        ));
        process_queue.set_down_stream_queues(vec![
            Arc::clone(&sender_queue) as Arc<dyn SenderQueueInterface>
        ]);
        entries.insert(
            key,
            ExactlyOnceEntry {
                process_queue,
                sender_queue,
                priority,
            },
        );
        self.buckets.lock().insert(priority, key);
        self.deletion_times.lock().remove(&key);
        Ok(())
    }

    fn process_param(slot_count: usize) -> QueueParam {
        QueueParam::new(slot_count, slot_count.saturating_sub(1), slot_count)
    }

    /// Mark a pair deleted; reaped by [`Self::clear_unused_queues`]
    pub fn delete_queue(&self, key: QueueKey) -> bool {
        // Lock order is map before deletion table; probe and drop.
        let exists = self.entries.read().contains_key(&key);
        if !exists {
            return false;
        }
        let mut deletions = self.deletion_times.lock();
        if deletions.contains_key(&key) {
            return false;
        }
        deletions.insert(key, Instant::now());
        true
    }

    /// Cancel a pending deletion (config returned before GC)
    pub fn reuse_queue(&self, key: QueueKey) -> bool {
        self.deletion_times.lock().remove(&key).is_some()
    }

    /// Reap marked pairs that are empty and past the grace period
    pub fn clear_unused_queues(&self) {
        let threshold = Duration::from_secs(self.gc_threshold_secs.load(Ordering::Relaxed));
        let now = Instant::now();
        let mut entries = self.entries.write();
        let mut deletions = self.deletion_times.lock();
        deletions.retain(|key, marked_at| {
            if now.duration_since(*marked_at) < threshold {
                return true;
            }
            let empty = entries
                .get(key)
                .map(|e| e.process_queue.is_empty() && e.sender_queue.is_empty())
                .unwrap_or(true);
            if !empty {
                return true;
            }
            if let Some(entry) = entries.remove(key) {
                self.buckets.lock().remove(entry.priority, *key);
            }
            false
        });
    }

    pub fn set_gc_threshold_secs(&self, secs: u64) {
        self.gc_threshold_secs.store(secs, Ordering::Relaxed);
    }

    pub fn has_queue(&self, key: QueueKey) -> bool {
        self.entries.read().contains_key(&key)
    }

    /// Checkpoints bound to a pipeline's slots, preserved across reloads
    pub fn checkpoints(&self, key: QueueKey) -> Option<Vec<Arc<RangeCheckpoint>>> {
        self.entries
            .read()
            .get(&key)
            .map(|e| e.sender_queue.checkpoints().to_vec())
    }

    pub fn push_process_queue(&self, key: QueueKey, item: ProcessQueueItem) -> PushResult {
        let entries = self.entries.read();
        match entries.get(&key) {
            Some(entry) => {
                if entry.process_queue.push(item) {
                    PushResult::Ok
                } else {
                    PushResult::QueueFull
                }
            }
            None => PushResult::QueueNotFound,
        }
    }

    pub fn push_sender_queue(&self, key: QueueKey, item: Arc<SenderQueueItem>) -> PushResult {
        let entries = self.entries.read();
        match entries.get(&key) {
            Some(entry) => {
                if entry.sender_queue.push(item) {
                    PushResult::Ok
                } else {
                    PushResult::QueueFull
                }
            }
            None => PushResult::QueueNotFound,
        }
    }

    /// One fair pop attempt at the given priority
    pub(crate) fn pop_process_item(&self, priority: u32) -> Option<(ProcessQueueItem, String)> {
        let entries = self.entries.read();
        self.buckets.lock().round_robin(priority, |key| {
            let entry = entries.get(&key)?;
            let item = entry.process_queue.pop()?;
            Some((item, entry.process_queue.pipeline_name()))
        })
    }

    pub(crate) fn priorities(&self) -> Vec<u32> {
        self.buckets.lock().priorities()
    }

    pub fn get_available_sender_items(
        &self,
        out: &mut Vec<Arc<SenderQueueItem>>,
        limit: i64,
    ) -> usize {
        let queues: Vec<Arc<ExactlyOnceSenderQueue>> = self
            .entries
            .read()
            .values()
            .map(|e| Arc::clone(&e.sender_queue))
            .collect();
        let mut taken = 0usize;
        for queue in queues {
            let remaining = if limit < 0 { -1 } else { limit - taken as i64 };
            if limit >= 0 && remaining <= 0 {
                break;
            }
            taken += queue.available_items(out, remaining);
        }
        taken
    }

    pub fn remove_sender_item(&self, key: QueueKey, item: &Arc<SenderQueueItem>) -> bool {
        let entries = self.entries.read();
        match entries.get(&key) {
            Some(entry) => entry.sender_queue.remove(item),
            None => false,
        }
    }

    pub fn on_sender_item_failed(&self, key: QueueKey, item: &Arc<SenderQueueItem>) {
        if let Some(entry) = self.entries.read().get(&key) {
            entry.sender_queue.on_send_failed(item);
        }
    }

    /// Rebind the process queue's in-flight counter to its current owner
    pub fn set_in_flight(&self, key: QueueKey, in_flight: Arc<InFlightCounter>) -> bool {
        match self.entries.read().get(&key) {
            Some(entry) => {
                entry.process_queue.set_in_flight(in_flight);
                true
            }
            None => false,
        }
    }

    pub fn enable_pop(&self, key: QueueKey) -> bool {
        match self.entries.read().get(&key) {
            Some(entry) => {
                entry.process_queue.enable_pop();
                true
            }
            None => false,
        }
    }

    pub fn disable_pop(&self, key: QueueKey) -> bool {
        match self.entries.read().get(&key) {
            Some(entry) => {
                entry.process_queue.disable_pop();
                true
            }
            None => false,
        }
    }

    pub fn is_valid_to_push_process_queue(&self, key: QueueKey) -> Option<bool> {
        self.entries
            .read()
            .get(&key)
            .map(|e| e.process_queue.is_valid_to_push())
    }

    pub fn set_process_queue_feedbacks(&self, key: QueueKey, feedbacks: Vec<Arc<dyn Feedback>>) {
        if let Some(entry) = self.entries.read().get(&key) {
            entry.process_queue.set_up_stream_feedbacks(feedbacks);
        }
    }

    pub fn set_sender_queue_feedbacks(&self, key: QueueKey, feedbacks: Vec<Arc<dyn Feedback>>) {
        if let Some(entry) = self.entries.read().get(&key) {
            entry.sender_queue.set_up_stream_feedbacks(feedbacks);
        }
    }

    pub fn is_all_process_queue_empty(&self) -> bool {
        self.entries
            .read()
            .values()
            .all(|e| e.process_queue.is_empty())
    }

    pub fn is_all_sender_queue_empty(&self) -> bool {
        self.entries
            .read()
            .values()
            .all(|e| e.sender_queue.is_empty())
    }

    /// Drop everything; test support
    pub fn clear(&self) {
        self.entries.write().clear();
        *self.buckets.lock() = PriorityBuckets::default();
        self.deletion_times.lock().clear();
    }
}

#[cfg(test)]
#[path = "exactly_once_manager_test.rs"]
mod tests;
