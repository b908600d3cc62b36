//! Exactly-once sender queue - one slot per persistent range checkpoint
//!
//! Capacity is fixed at the pipeline's configured range concurrency. Each
//! slot binds one [`RangeCheckpoint`]; an item lands in the slot named by
//! its checkpoint index and the slot stays occupied until the send is
//! acknowledged, at which point the checkpoint's sequence advances.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::feedback::Feedback;
use crate::item::{RangeCheckpoint, SenderQueueItem, SendingStatus};
use crate::key::QueueKey;
use crate::limiter::{ConcurrencyLimiter, RateLimiter};
use crate::metrics::QueueMetrics;
use crate::sender_queue::SenderQueueInterface;

struct SlotState {
    slots: Vec<Option<Arc<SenderQueueItem>>>,
    occupied: usize,
    data_size: usize,
    concurrency_limiters: Vec<Arc<ConcurrencyLimiter>>,
    rate_limiter: Option<RateLimiter>,
}

/// Fixed-capacity sender queue enforcing one in-flight item per range slot
pub struct ExactlyOnceSenderQueue {
    key: QueueKey,
    checkpoints: Vec<Arc<RangeCheckpoint>>,
    state: Mutex<SlotState>,
    feedbacks: Mutex<Vec<Arc<dyn Feedback>>>,
    metrics: QueueMetrics,
}

impl ExactlyOnceSenderQueue {
    pub fn new(key: QueueKey, checkpoints: Vec<Arc<RangeCheckpoint>>) -> Self {
        let slot_count = checkpoints.len();
        Self {
            key,
            checkpoints,
            state: Mutex::new(SlotState {
                slots: (0..slot_count).map(|_| None).collect(),
                occupied: 0,
                data_size: 0,
                concurrency_limiters: Vec::new(),
                rate_limiter: None,
            }),
            feedbacks: Mutex::new(Vec::new()),
            metrics: QueueMetrics::new(),
        }
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.checkpoints.len()
    }

    #[inline]
    pub fn checkpoints(&self) -> &[Arc<RangeCheckpoint>] {
        &self.checkpoints
    }

    pub fn set_limiters(
        &self,
        concurrency_limiters: Vec<Arc<ConcurrencyLimiter>>,
        max_send_rate: Option<u32>,
    ) {
        let mut state = self.state.lock();
        state.concurrency_limiters = concurrency_limiters;
        state.rate_limiter = max_send_rate.map(RateLimiter::new);
    }

    pub fn set_up_stream_feedbacks(&self, feedbacks: Vec<Arc<dyn Feedback>>) {
        *self.feedbacks.lock() = feedbacks;
    }

    fn fire_feedbacks(&self, fb_key: QueueKey) {
        for feedback in self.feedbacks.lock().iter() {
            feedback.feedback(fb_key);
        }
    }
}

impl SenderQueueInterface for ExactlyOnceSenderQueue {
    fn key(&self) -> QueueKey {
        self.key
    }

    fn is_valid_to_push(&self) -> bool {
        let state = self.state.lock();
        state.occupied < state.slots.len()
    }

    fn push(&self, item: Arc<SenderQueueItem>) -> bool {
        let checkpoint = match item.checkpoint.as_ref() {
            Some(c) => Arc::clone(c),
            None => {
                tracing::error!(key = %self.key, "exactly-once push without checkpoint");
                return false;
            }
        };
        let mut state = self.state.lock();
        let slot = match state.slots.get_mut(checkpoint.index) {
            Some(s) => s,
            None => {
                tracing::error!(
                    key = %self.key,
                    index = checkpoint.index,
                    slots = self.checkpoints.len(),
                    "exactly-once checkpoint index out of range"
                );
                return false;
            }
        };
        if slot.is_some() {
            // At most one in-flight item per slot.
            return false;
        }
        *slot = Some(Arc::clone(&item));
        state.occupied += 1;
        state.data_size += item.raw_size;
        self.metrics.record_push(item.raw_size as u64);
        self.metrics
            .set_valid_to_push(state.occupied < state.slots.len());
        true
    }

    fn available_items(&self, out: &mut Vec<Arc<SenderQueueItem>>, limit: i64) -> usize {
        let mut state = self.state.lock();
        let SlotState {
            slots,
            concurrency_limiters,
            rate_limiter,
            ..
        } = &mut *state;
        let mut taken = 0usize;
        for slot in slots.iter() {
            let item = match slot {
                Some(i) => i,
                None => continue,
            };
            if limit >= 0 && taken as i64 >= limit {
                break;
            }
            if item.status() != SendingStatus::Idle {
                continue;
            }
            if !concurrency_limiters.iter().all(|l| l.is_valid_to_pop()) {
                break;
            }
            if let Some(rate) = rate_limiter.as_mut() {
                if !rate.is_valid_to_pop(item.raw_size) {
                    break;
                }
                rate.post_pop(item.raw_size);
            }
            if !item.transition(SendingStatus::Idle, SendingStatus::Sending) {
                continue;
            }
            for limiter in concurrency_limiters.iter() {
                limiter.post_pop();
            }
            item.record_attempt();
            out.push(Arc::clone(item));
            taken += 1;
        }
        taken
    }

    fn remove(&self, item: &Arc<SenderQueueItem>) -> bool {
        let mut state = self.state.lock();
        let position = match state
            .slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|i| Arc::ptr_eq(i, item)))
        {
            Some(p) => p,
            None => return false,
        };
        let removed = state.slots[position].take().expect("slot just matched");
        state.occupied -= 1;
        state.data_size -= removed.raw_size;
        self.metrics.record_out(removed.raw_size as u64);
        self.metrics
            .set_valid_to_push(state.occupied < state.slots.len());
        if removed.transition(SendingStatus::Sending, SendingStatus::Sent) {
            for limiter in state.concurrency_limiters.iter() {
                limiter.on_send_done();
                limiter.on_success();
            }
        }
        // The slot's sequence advances before it is handed out again; the
        // flusher persists the new value through its checkpoint store.
        let fb_key = match removed.checkpoint.as_ref() {
            Some(checkpoint) => {
                checkpoint.advance_sequence();
                checkpoint.fb_key
            }
            None => self.key,
        };
        drop(state);
        self.fire_feedbacks(fb_key);
        true
    }

    fn on_send_failed(&self, item: &Arc<SenderQueueItem>) {
        let state = self.state.lock();
        if item.transition(SendingStatus::Sending, SendingStatus::Idle) {
            for limiter in state.concurrency_limiters.iter() {
                limiter.on_send_done();
                limiter.on_fail();
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.state.lock().occupied == 0
    }

    fn size(&self) -> usize {
        self.state.lock().occupied
    }

    fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }
}

#[cfg(test)]
#[path = "exactly_once_queue_test.rs"]
mod tests;
