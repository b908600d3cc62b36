//! Sender queue registry
//!
//! Process-wide map from [`QueueKey`] to the outbound queue of one
//! (pipeline, flusher) pair. The sender cohort drains through
//! [`SenderQueueManager::get_available_items`], which sweeps every queue
//! while honoring each queue's limiters and rate budget. Keys absent from
//! this registry fall through to the exactly-once registry, so flushers
//! push through a single entry point either way.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::exactly_once_manager::ExactlyOnceQueueManager;
use crate::feedback::Feedback;
use crate::item::SenderQueueItem;
use crate::key::{QueueKey, QueueKeyManager};
use crate::limiter::ConcurrencyLimiter;
use crate::params::QueueParam;
use crate::sender_queue::{BoundedSenderQueue, SenderQueueInterface};
use crate::{PushResult, DEFAULT_QUEUE_GC_THRESHOLD_SECS};

/// Registry of all bounded sender queues
pub struct SenderQueueManager {
    key_manager: Arc<QueueKeyManager>,
    exactly_once: Option<Arc<ExactlyOnceQueueManager>>,
    queues: RwLock<HashMap<QueueKey, Arc<BoundedSenderQueue>>>,
    deletion_times: Mutex<HashMap<QueueKey, Instant>>,
    gc_threshold_secs: AtomicU64,
    default_param: Mutex<QueueParam>,
    wake_flag: Mutex<bool>,
    wake_cond: Condvar,
}

impl SenderQueueManager {
    pub fn new(
        key_manager: Arc<QueueKeyManager>,
        exactly_once: Option<Arc<ExactlyOnceQueueManager>>,
    ) -> Self {
        Self {
            key_manager,
            exactly_once,
            queues: RwLock::new(HashMap::new()),
            deletion_times: Mutex::new(HashMap::new()),
            gc_threshold_secs: AtomicU64::new(DEFAULT_QUEUE_GC_THRESHOLD_SECS),
            default_param: Mutex::new(QueueParam::default()),
            wake_flag: Mutex::new(false),
            wake_cond: Condvar::new(),
        }
    }

    pub fn set_default_param(&self, param: QueueParam) {
        *self.default_param.lock() = param;
    }

    pub fn default_param(&self) -> QueueParam {
        *self.default_param.lock()
    }

    /// Create a queue, or replace an existing queue's throttling policies
    /// in place
    pub fn create_queue(
        &self,
        key: QueueKey,
        flusher_id: &str,
        concurrency_limiters: Vec<Arc<ConcurrencyLimiter>>,
        max_send_rate: Option<u32>,
    ) -> bool {
        let mut queues = self.queues.write();
        if let Some(queue) = queues.get(&key) {
            queue.set_limiters(concurrency_limiters, max_send_rate);
            return true;
        }
        let param = *self.default_param.lock();
        queues.insert(
            key,
            Arc::new(BoundedSenderQueue::new(
                key,
                flusher_id,
                param,
                concurrency_limiters,
                max_send_rate,
            )),
        );
        true
    }

    pub fn queue(&self, key: QueueKey) -> Option<Arc<BoundedSenderQueue>> {
        self.queues.read().get(&key).cloned()
    }

    /// The queue as a downstream gate for process queues
    pub fn queue_interface(&self, key: QueueKey) -> Option<Arc<dyn SenderQueueInterface>> {
        self.queues
            .read()
            .get(&key)
            .map(|q| Arc::clone(q) as Arc<dyn SenderQueueInterface>)
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

    /// Undo a pending deletion (config returned before GC)
    pub fn reuse_queue(&self, key: QueueKey) -> bool {
        self.deletion_times.lock().remove(&key).is_some()
    }

    /// Reap marked queues that are empty and past the grace period
    pub fn clear_unused_queues(&self) {
        let threshold = Duration::from_secs(self.gc_threshold_secs.load(Ordering::Relaxed));
        let now = Instant::now();
        let mut queues = self.queues.write();
        let mut deletions = self.deletion_times.lock();
        deletions.retain(|key, marked_at| {
            if now.duration_since(*marked_at) < threshold {
                return true;
            }
            let empty = queues.get(key).map(|q| q.is_empty()).unwrap_or(true);
            if !empty {
                return true;
            }
            queues.remove(key);
            self.key_manager.remove_key(*key);
            false
        });
    }

    pub fn set_gc_threshold_secs(&self, secs: u64) {
        self.gc_threshold_secs.store(secs, Ordering::Relaxed);
    }

    /// Push a serialized item; exactly-once keys fall through to that
    /// registry
    pub fn push_queue(&self, key: QueueKey, item: Arc<SenderQueueItem>) -> PushResult {
        let result = {
            let queues = self.queues.read();
            match queues.get(&key) {
                Some(queue) => {
                    if queue.push(item) {
                        PushResult::Ok
                    } else {
                        PushResult::QueueFull
                    }
                }
                None => match &self.exactly_once {
                    Some(eo) => eo.push_sender_queue(key, item),
                    None => PushResult::QueueNotFound,
                },
            }
        };
        if result == PushResult::Ok {
            self.trigger();
        }
        result
    }

    /// Admission check for this registry's own queues only
    ///
    /// Unknown keys (exactly-once ones included) report `false`; their
    /// admission is the slot queue's business.
    pub fn is_valid_to_push(&self, key: QueueKey) -> bool {
        self.queues
            .read()
            .get(&key)
            .map(|q| q.is_valid_to_push())
            .unwrap_or(false)
    }

    /// Global fair sweep: draw items from every queue within its policies
    ///
    /// `limit = -1` means "as many as policies permit". Ordinary queues
    /// are swept first, then the exactly-once registry.
    pub fn get_available_items(&self, out: &mut Vec<Arc<SenderQueueItem>>, limit: i64) -> usize {
        let queues: Vec<Arc<BoundedSenderQueue>> = self.queues.read().values().cloned().collect();
        let mut taken = 0usize;
        for queue in queues {
            let remaining = if limit < 0 { -1 } else { limit - taken as i64 };
            if limit >= 0 && remaining <= 0 {
                return taken;
            }
            taken += queue.available_items(out, remaining);
        }
        if let Some(eo) = &self.exactly_once {
            let remaining = if limit < 0 { -1 } else { limit - taken as i64 };
            if limit < 0 || remaining > 0 {
                taken += eo.get_available_sender_items(out, remaining);
            }
        }
        taken
    }

    /// Drop a completed item by identity
    pub fn remove_item(&self, key: QueueKey, item: &Arc<SenderQueueItem>) -> bool {
        let queue = self.queues.read().get(&key).cloned();
        match queue {
            Some(queue) => queue.remove(item),
            None => self
                .exactly_once
                .as_ref()
                .map(|eo| eo.remove_sender_item(key, item))
                .unwrap_or(false),
        }
    }

    /// Return a failed item to `Idle` for retry
    pub fn on_item_failed(&self, key: QueueKey, item: &Arc<SenderQueueItem>) {
        let queue = self.queues.read().get(&key).cloned();
        match queue {
            Some(queue) => queue.on_send_failed(item),
            None => {
                if let Some(eo) = &self.exactly_once {
                    eo.on_sender_item_failed(key, item);
                }
            }
        }
    }

    /// Both registries drained; the shutdown predicate
    pub fn is_all_queue_empty(&self) -> bool {
        let own_empty = self.queues.read().values().all(|q| q.is_empty());
        own_empty
            && self
                .exactly_once
                .as_ref()
                .map(|eo| eo.is_all_sender_queue_empty())
                .unwrap_or(true)
    }

    pub fn set_up_stream_feedbacks(&self, key: QueueKey, feedbacks: Vec<Arc<dyn Feedback>>) -> bool {
        match self.queues.read().get(&key) {
            Some(queue) => {
                queue.set_up_stream_feedbacks(feedbacks);
                true
            }
            None => match &self.exactly_once {
                Some(eo) => {
                    eo.set_sender_queue_feedbacks(key, feedbacks);
                    eo.has_queue(key)
                }
                None => false,
            },
        }
    }

    /// Park the sender cohort until an item arrives
    pub fn wait_for_items(&self, timeout: Duration) -> bool {
        let mut flag = self.wake_flag.lock();
        if !*flag {
            self.wake_cond.wait_for(&mut flag, timeout);
        }
        let woken = *flag;
        *flag = false;
        woken
    }

    /// Wake every parked sender thread
    pub fn trigger(&self) {
        let mut flag = self.wake_flag.lock();
        *flag = true;
        self.wake_cond.notify_all();
    }

    pub fn has_queue(&self, key: QueueKey) -> bool {
        self.queues.read().contains_key(&key)
    }

    #[cfg(test)]
    pub(crate) fn queue_count(&self) -> usize {
        self.queues.read().len()
    }

    #[cfg(test)]
    pub(crate) fn pending_deletion_count(&self) -> usize {
        self.deletion_times.lock().len()
    }

    /// Drop everything; test support
    pub fn clear(&self) {
        self.queues.write().clear();
        self.deletion_times.lock().clear();
    }
}

#[cfg(test)]
#[path = "sender_queue_manager_test.rs"]
mod tests;
