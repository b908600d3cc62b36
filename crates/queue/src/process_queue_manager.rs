//! Process queue registry
//!
//! Process-wide map from [`QueueKey`] to a pipeline's intake queue. Push
//! is the only entry point used by inputs; the processor cohort pops
//! through the manager's fairness policy (priority buckets, round-robin
//! within a priority) and parks on its condition variable when nothing is
//! poppable.
//!
//! Reads on the hot path take the map's shared lock; create/delete take
//! the exclusive lock. The queues themselves are independently
//! synchronized, and the map lock is never held across a wait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::exactly_once_manager::ExactlyOnceQueueManager;
use crate::feedback::Feedback;
use crate::item::{InFlightCounter, ProcessQueueItem};
use crate::key::{QueueKey, QueueKeyManager};
use crate::params::QueueParam;
use crate::process_queue::{BoundedProcessQueue, CircularProcessQueue, ProcessQueue};
use crate::sched::PriorityBuckets;
use crate::sender_queue::SenderQueueInterface;
use crate::{PushResult, DEFAULT_QUEUE_GC_THRESHOLD_SECS};

struct ProcessEntry {
    queue: Arc<ProcessQueue>,
    priority: u32,
}

/// Registry and scheduler of all process queues
pub struct ProcessQueueManager {
    key_manager: Arc<QueueKeyManager>,
    exactly_once: Option<Arc<ExactlyOnceQueueManager>>,
    queues: RwLock<HashMap<QueueKey, ProcessEntry>>,
    buckets: Mutex<PriorityBuckets>,
    deletion_times: Mutex<HashMap<QueueKey, Instant>>,
    gc_threshold_secs: AtomicU64,
    default_param: Mutex<QueueParam>,
    wake_flag: Mutex<bool>,
    wake_cond: Condvar,
}

impl ProcessQueueManager {
    pub fn new(
        key_manager: Arc<QueueKeyManager>,
        exactly_once: Option<Arc<ExactlyOnceQueueManager>>,
    ) -> Self {
        Self {
            key_manager,
            exactly_once,
            queues: RwLock::new(HashMap::new()),
            buckets: Mutex::new(PriorityBuckets::default()),
            deletion_times: Mutex::new(HashMap::new()),
            gc_threshold_secs: AtomicU64::new(DEFAULT_QUEUE_GC_THRESHOLD_SECS),
            default_param: Mutex::new(QueueParam::default()),
            wake_flag: Mutex::new(false),
            wake_cond: Condvar::new(),
        }
    }

    /// Default sizing for queues created without explicit parameters
    pub fn set_default_param(&self, param: QueueParam) {
        *self.default_param.lock() = param;
    }

    pub fn default_param(&self) -> QueueParam {
        *self.default_param.lock()
    }

    /// A [`Feedback`] handle that wakes the processor cohort
    ///
    /// Registered on sender queues so a drain past the low watermark
    /// re-wakes gated process pops. Holds a weak reference: a parked
    /// feedback never keeps the registry alive.
    pub fn notifier(this: &Arc<Self>) -> Arc<dyn Feedback> {
        struct Notifier(std::sync::Weak<ProcessQueueManager>);
        impl Feedback for Notifier {
            fn feedback(&self, _key: QueueKey) {
                if let Some(manager) = self.0.upgrade() {
                    manager.trigger();
                }
            }
        }
        Arc::new(Notifier(Arc::downgrade(this)))
    }

    /// Create a bounded queue, or update capacity/watermarks in place
    pub fn create_or_update_bounded_queue(
        &self,
        key: QueueKey,
        priority: u32,
        param: QueueParam,
        in_flight: Arc<InFlightCounter>,
    ) -> crate::Result<()> {
        param.validate()?;
        let mut queues = self.queues.write();
        if let Some(entry) = queues.get_mut(&key) {
            if let ProcessQueue::Bounded(queue) = entry.queue.as_ref() {
                // The in-flight binding stays with the running pipeline;
                // its replacement rebinds at start, after the drain.
                queue.set_param(param);
                let old_priority = entry.priority;
                entry.priority = priority;
                self.buckets.lock().reassign(old_priority, priority, key);
                self.deletion_times.lock().remove(&key);
                return Ok(());
            }
            // Shape change: replace the circular queue outright.
            self.buckets.lock().remove(entry.priority, key);
        }
        let queue = Arc::new(ProcessQueue::Bounded(BoundedProcessQueue::new(
            key, param, in_flight,
        )));
        queues.insert(key, ProcessEntry { queue, priority });
        self.buckets.lock().insert(priority, key);
        self.deletion_times.lock().remove(&key);
        Ok(())
    }

    /// Create a circular queue, or update its capacity in place
    pub fn create_or_update_circular_queue(
        &self,
        key: QueueKey,
        priority: u32,
        capacity: usize,
        in_flight: Arc<InFlightCounter>,
    ) -> crate::Result<()> {
        let mut queues = self.queues.write();
        if let Some(entry) = queues.get_mut(&key) {
            if let ProcessQueue::Circular(queue) = entry.queue.as_ref() {
                queue.set_capacity(capacity);
                let old_priority = entry.priority;
                entry.priority = priority;
                self.buckets.lock().reassign(old_priority, priority, key);
                self.deletion_times.lock().remove(&key);
                return Ok(());
            }
            self.buckets.lock().remove(entry.priority, key);
        }
        let queue = Arc::new(ProcessQueue::Circular(CircularProcessQueue::new(
            key, capacity, in_flight,
        )));
        queues.insert(key, ProcessEntry { queue, priority });
        self.buckets.lock().insert(priority, key);
        self.deletion_times.lock().remove(&key);
        Ok(())
    }

    /// Mark a queue deleted; reaped after the grace period iff empty
    pub fn delete_queue(&self, key: QueueKey) -> bool {
        // Lock order is map before deletion table; probe and drop.
        let exists = self.queues.read().contains_key(&key);
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

    /// Reap marked queues that are empty and past the grace period
    ///
    /// Reaping also retires the queue's name binding.
    pub fn clear_unused_queues(&self) {
        let threshold = Duration::from_secs(self.gc_threshold_secs.load(Ordering::Relaxed));
        let now = Instant::now();
        let mut queues = self.queues.write();
        let mut deletions = self.deletion_times.lock();
        deletions.retain(|key, marked_at| {
            if now.duration_since(*marked_at) < threshold {
                return true;
            }
            let empty = queues.get(key).map(|e| e.queue.is_empty()).unwrap_or(true);
            if !empty {
                return true;
            }
            if let Some(entry) = queues.remove(key) {
                self.buckets.lock().remove(entry.priority, *key);
            }
            self.key_manager.remove_key(*key);
            false
        });
    }

    pub fn set_gc_threshold_secs(&self, secs: u64) {
        self.gc_threshold_secs.store(secs, Ordering::Relaxed);
    }

    /// Sole entry point for inputs
    ///
    /// Keys absent from this registry fall through to the exactly-once
    /// registry before being reported unknown.
    pub fn push_queue(&self, key: QueueKey, item: ProcessQueueItem) -> PushResult {
        let result = {
            let queues = self.queues.read();
            match queues.get(&key) {
                Some(entry) => {
                    if entry.queue.push(item) {
                        PushResult::Ok
                    } else {
                        PushResult::QueueFull
                    }
                }
                None => match &self.exactly_once {
                    Some(eo) => eo.push_process_queue(key, item),
                    None => PushResult::QueueNotFound,
                },
            }
        };
        if result == PushResult::Ok {
            self.trigger();
        }
        result
    }

    /// One fair pop across every process queue, exactly-once ones included
    ///
    /// Returns the item and the owning pipeline's name. Queues whose pop
    /// predicate fails (pop disabled, gated downstream, empty) are
    /// skipped.
    pub fn pop_item(&self) -> Option<(ProcessQueueItem, String)> {
        let mut priorities = self.buckets.lock().priorities();
        if let Some(eo) = &self.exactly_once {
            for priority in eo.priorities() {
                if !priorities.contains(&priority) {
                    priorities.push(priority);
                }
            }
            priorities.sort_unstable();
        }
        for priority in priorities {
            let queues = self.queues.read();
            let popped = self.buckets.lock().round_robin(priority, |key| {
                let entry = queues.get(&key)?;
                let item = entry.queue.pop()?;
                Some((item, entry.queue.pipeline_name()))
            });
            drop(queues);
            if popped.is_some() {
                return popped;
            }
            if let Some(eo) = &self.exactly_once {
                let popped = eo.pop_process_item(priority);
                if popped.is_some() {
                    return popped;
                }
            }
        }
        None
    }

    /// Park the processor cohort until a push or feedback arrives
    ///
    /// Returns whether a wake signal was consumed.
    pub fn wait_for_item(&self, timeout: Duration) -> bool {
        let mut flag = self.wake_flag.lock();
        if !*flag {
            self.wake_cond.wait_for(&mut flag, timeout);
        }
        let woken = *flag;
        *flag = false;
        woken
    }

    /// Wake every parked processor thread
    pub fn trigger(&self) {
        let mut flag = self.wake_flag.lock();
        *flag = true;
        self.wake_cond.notify_all();
    }

    /// Rebind a queue's in-flight counter to its current owner pipeline
    ///
    /// Called from pipeline start, when no pop can be racing: the old
    /// owner disabled pop and drained before the handover.
    pub fn set_in_flight(&self, key: QueueKey, in_flight: Arc<InFlightCounter>) -> bool {
        match self.queues.read().get(&key) {
            Some(entry) => {
                entry.queue.set_in_flight(in_flight);
                true
            }
            None => self
                .exactly_once
                .as_ref()
                .map(|eo| eo.set_in_flight(key, in_flight))
                .unwrap_or(false),
        }
    }

    pub fn enable_pop(&self, key: QueueKey) -> bool {
        match self.queues.read().get(&key) {
            Some(entry) => {
                entry.queue.enable_pop();
                true
            }
            None => self
                .exactly_once
                .as_ref()
                .map(|eo| eo.enable_pop(key))
                .unwrap_or(false),
        }
    }

    pub fn disable_pop(&self, key: QueueKey) -> bool {
        match self.queues.read().get(&key) {
            Some(entry) => {
                entry.queue.disable_pop();
                true
            }
            None => self
                .exactly_once
                .as_ref()
                .map(|eo| eo.disable_pop(key))
                .unwrap_or(false),
        }
    }

    pub fn is_valid_to_push(&self, key: QueueKey) -> bool {
        match self.queues.read().get(&key) {
            Some(entry) => entry.queue.is_valid_to_push(),
            None => self
                .exactly_once
                .as_ref()
                .and_then(|eo| eo.is_valid_to_push_process_queue(key))
                .unwrap_or(false),
        }
    }

    pub fn set_down_stream_queues(
        &self,
        key: QueueKey,
        queues: Vec<Arc<dyn SenderQueueInterface>>,
    ) -> bool {
        match self.queues.read().get(&key) {
            Some(entry) => {
                entry.queue.set_down_stream_queues(queues);
                true
            }
            None => false,
        }
    }

    pub fn set_up_stream_feedbacks(&self, key: QueueKey, feedbacks: Vec<Arc<dyn Feedback>>) -> bool {
        match self.queues.read().get(&key) {
            Some(entry) => {
                entry.queue.set_up_stream_feedbacks(feedbacks);
                true
            }
            None => match &self.exactly_once {
                Some(eo) => {
                    eo.set_process_queue_feedbacks(key, feedbacks);
                    eo.has_queue(key)
                }
                None => false,
            },
        }
    }

    pub fn has_queue(&self, key: QueueKey) -> bool {
        self.queues.read().contains_key(&key)
    }

    pub fn queue_size(&self, key: QueueKey) -> Option<usize> {
        self.queues.read().get(&key).map(|e| e.queue.size())
    }

    pub fn queue(&self, key: QueueKey) -> Option<Arc<ProcessQueue>> {
        self.queues.read().get(&key).map(|e| Arc::clone(&e.queue))
    }

    pub fn is_all_queue_empty(&self) -> bool {
        let own_empty = self.queues.read().values().all(|e| e.queue.is_empty());
        own_empty
            && self
                .exactly_once
                .as_ref()
                .map(|eo| eo.is_all_process_queue_empty())
                .unwrap_or(true)
    }

    /// Drop everything; test support
    pub fn clear(&self) {
        self.queues.write().clear();
        *self.buckets.lock() = PriorityBuckets::default();
        self.deletion_times.lock().clear();
    }
}

#[cfg(test)]
#[path = "process_queue_manager_test.rs"]
mod tests;
