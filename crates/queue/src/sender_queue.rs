//! Sender queues - the outbound FIFO per (pipeline, flusher)
//!
//! Items are serialized payloads waiting for a sender worker. Popping
//! marks an item `Sending` in place; only acknowledged completion removes
//! it, so a retry re-exposes the item at its original position and send
//! order always equals enqueue order.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::feedback::Feedback;
use crate::item::{SenderQueueItem, SendingStatus};
use crate::key::QueueKey;
use crate::limiter::{ConcurrencyLimiter, RateLimiter};
use crate::metrics::QueueMetrics;
use crate::params::QueueParam;

/// Common surface of bounded and exactly-once sender queues
///
/// Process queues gate their pop on `is_valid_to_push` of every downstream
/// sender queue, so both variants sit behind this trait.
pub trait SenderQueueInterface: Send + Sync {
    fn key(&self) -> QueueKey;

    /// Whether a push would currently be admitted
    fn is_valid_to_push(&self) -> bool;

    /// Enqueue a serialized item; `false` is a watermark/slot refusal
    fn push(&self, item: Arc<SenderQueueItem>) -> bool;

    /// Claim up to `limit` idle items (`-1` = as many as policies permit),
    /// marking each `Sending`; never reorders
    fn available_items(&self, out: &mut Vec<Arc<SenderQueueItem>>, limit: i64) -> usize;

    /// Drop a completed item by identity; releases limiter tokens
    fn remove(&self, item: &Arc<SenderQueueItem>) -> bool;

    /// Return a failed item to `Idle` at its current position
    fn on_send_failed(&self, item: &Arc<SenderQueueItem>);

    fn is_empty(&self) -> bool;

    fn size(&self) -> usize;

    fn metrics(&self) -> &QueueMetrics;
}

struct SenderState {
    items: VecDeque<Arc<SenderQueueItem>>,
    valid_to_push: bool,
    data_size: usize,
    concurrency_limiters: Vec<Arc<ConcurrencyLimiter>>,
    rate_limiter: Option<RateLimiter>,
}

/// Watermark-bounded sender queue with send-token throttling
pub struct BoundedSenderQueue {
    key: QueueKey,
    flusher_id: String,
    param: QueueParam,
    state: Mutex<SenderState>,
    feedbacks: Mutex<Vec<Arc<dyn Feedback>>>,
    metrics: QueueMetrics,
}

impl BoundedSenderQueue {
    pub fn new(
        key: QueueKey,
        flusher_id: impl Into<String>,
        param: QueueParam,
        concurrency_limiters: Vec<Arc<ConcurrencyLimiter>>,
        max_send_rate: Option<u32>,
    ) -> Self {
        Self {
            key,
            flusher_id: flusher_id.into(),
            param,
            state: Mutex::new(SenderState {
                items: VecDeque::with_capacity(param.capacity),
                valid_to_push: true,
                data_size: 0,
                concurrency_limiters,
                rate_limiter: max_send_rate.map(RateLimiter::new),
            }),
            feedbacks: Mutex::new(Vec::new()),
            metrics: QueueMetrics::new(),
        }
    }

    #[inline]
    pub fn flusher_id(&self) -> &str {
        &self.flusher_id
    }

    /// Replace throttling policies in place (config reuse path)
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

    #[cfg(test)]
    pub(crate) fn rate_limit(&self) -> Option<u32> {
        self.state
            .lock()
            .rate_limiter
            .as_ref()
            .map(|r| r.max_send_bytes_per_sec)
    }

    #[cfg(test)]
    pub(crate) fn limiter_count(&self) -> usize {
        self.state.lock().concurrency_limiters.len()
    }

    fn fire_feedbacks(&self) {
        for feedback in self.feedbacks.lock().iter() {
            feedback.feedback(self.key);
        }
    }
}

impl SenderQueueInterface for BoundedSenderQueue {
    fn key(&self) -> QueueKey {
        self.key
    }

    fn is_valid_to_push(&self) -> bool {
        self.state.lock().valid_to_push
    }

    fn push(&self, item: Arc<SenderQueueItem>) -> bool {
        let mut state = self.state.lock();
        if !state.valid_to_push {
            return false;
        }
        state.data_size += item.raw_size;
        self.metrics.record_push(item.raw_size as u64);
        state.items.push_back(item);
        if state.items.len() >= self.param.high_watermark {
            state.valid_to_push = false;
            self.metrics.set_valid_to_push(false);
        }
        true
    }

    fn available_items(&self, out: &mut Vec<Arc<SenderQueueItem>>, limit: i64) -> usize {
        let mut state = self.state.lock();
        let SenderState {
            items,
            concurrency_limiters,
            rate_limiter,
            ..
        } = &mut *state;
        let mut taken = 0usize;
        for item in items.iter() {
            if limit >= 0 && taken as i64 >= limit {
                break;
            }
            if item.status() != SendingStatus::Idle {
                continue;
            }
            // Limiters are queue-wide: once one is exhausted, later items
            // in this queue cannot proceed either.
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
        let position = match state.items.iter().position(|i| Arc::ptr_eq(i, item)) {
            Some(p) => p,
            None => return false,
        };
        let removed = state.items.remove(position).expect("position just found");
        state.data_size -= removed.raw_size;
        self.metrics.record_out(removed.raw_size as u64);
        if removed.transition(SendingStatus::Sending, SendingStatus::Sent) {
            for limiter in state.concurrency_limiters.iter() {
                limiter.on_send_done();
                limiter.on_success();
            }
        }
        if !state.valid_to_push && state.items.len() <= self.param.low_watermark {
            state.valid_to_push = true;
            self.metrics.set_valid_to_push(true);
            drop(state);
            self.fire_feedbacks();
        }
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
        self.state.lock().items.is_empty()
    }

    fn size(&self) -> usize {
        self.state.lock().items.len()
    }

    fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }
}

#[cfg(test)]
#[path = "sender_queue_test.rs"]
mod tests;
