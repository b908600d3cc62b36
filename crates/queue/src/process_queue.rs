//! Process queues - the per-pipeline intake FIFO for the processor stage
//!
//! A bounded queue applies watermark admission and refuses to pop while
//! any downstream sender queue is refusing pushes, so saturation at the
//! flushers propagates back to the inputs instead of stranding work in the
//! middle of the pipeline. The circular variant trades completeness for
//! liveness: when full it evicts the oldest item to admit the new one.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::feedback::Feedback;
use crate::item::{InFlightCounter, ProcessQueueItem};
use crate::key::QueueKey;
use crate::metrics::QueueMetrics;
use crate::params::QueueParam;
use crate::sender_queue::SenderQueueInterface;

struct ProcessState {
    items: VecDeque<ProcessQueueItem>,
    enable_pop: bool,
    valid_to_push: bool,
    data_size: usize,
    down_stream_queues: Vec<Arc<dyn SenderQueueInterface>>,
    up_stream_feedbacks: Vec<Arc<dyn Feedback>>,
}

impl ProcessState {
    fn new() -> Self {
        Self {
            items: VecDeque::new(),
            enable_pop: false,
            valid_to_push: true,
            data_size: 0,
            down_stream_queues: Vec::new(),
            up_stream_feedbacks: Vec::new(),
        }
    }

    fn downstream_admits(&self) -> bool {
        self.down_stream_queues.iter().all(|q| q.is_valid_to_push())
    }
}

/// Watermark-bounded process queue
pub struct BoundedProcessQueue {
    key: QueueKey,
    param: Mutex<QueueParam>,
    in_flight: Mutex<Arc<InFlightCounter>>,
    state: Mutex<ProcessState>,
    metrics: QueueMetrics,
}

impl BoundedProcessQueue {
    pub fn new(key: QueueKey, param: QueueParam, in_flight: Arc<InFlightCounter>) -> Self {
        Self {
            key,
            param: Mutex::new(param),
            in_flight: Mutex::new(in_flight),
            state: Mutex::new(ProcessState::new()),
            metrics: QueueMetrics::new(),
        }
    }

    #[inline]
    pub fn key(&self) -> QueueKey {
        self.key
    }

    pub fn pipeline_name(&self) -> String {
        self.in_flight.lock().pipeline_name().to_string()
    }

    /// Enqueue iff the watermark flag admits
    pub fn push(&self, item: ProcessQueueItem) -> bool {
        let mut state = self.state.lock();
        if !state.valid_to_push {
            return false;
        }
        let size = item.data_size();
        state.data_size += size;
        self.metrics.record_push(size as u64);
        state.items.push_back(item);
        if state.items.len() >= self.param.lock().high_watermark {
            state.valid_to_push = false;
            self.metrics.set_valid_to_push(false);
        }
        true
    }

    /// Oldest item, iff pop is enabled, every downstream queue admits, and
    /// the queue is non-empty
    ///
    /// The owning pipeline's in-flight count is incremented under the
    /// queue lock, before the item is visible to the processor stage.
    pub fn pop(&self) -> Option<ProcessQueueItem> {
        let mut state = self.state.lock();
        if !state.enable_pop || state.items.is_empty() || !state.downstream_admits() {
            return None;
        }
        let item = state.items.pop_front().expect("checked non-empty");
        self.in_flight.lock().add();
        let size = item.data_size();
        state.data_size -= size;
        self.metrics.record_out(size as u64);
        if !state.valid_to_push && state.items.len() <= self.param.lock().low_watermark {
            state.valid_to_push = true;
            self.metrics.set_valid_to_push(true);
            for feedback in state.up_stream_feedbacks.iter() {
                feedback.feedback(self.key);
            }
        }
        Some(item)
    }

    /// Resize in place without draining (config update path)
    pub fn set_param(&self, param: QueueParam) {
        *self.param.lock() = param;
    }

    /// Rebind the in-flight counter (pipeline replacement path)
    pub fn set_in_flight(&self, in_flight: Arc<InFlightCounter>) {
        *self.in_flight.lock() = in_flight;
    }

    pub fn set_down_stream_queues(&self, queues: Vec<Arc<dyn SenderQueueInterface>>) {
        self.state.lock().down_stream_queues = queues;
    }

    pub fn set_up_stream_feedbacks(&self, feedbacks: Vec<Arc<dyn Feedback>>) {
        self.state.lock().up_stream_feedbacks = feedbacks;
    }

    pub fn enable_pop(&self) {
        self.state.lock().enable_pop = true;
    }

    pub fn disable_pop(&self) {
        self.state.lock().enable_pop = false;
    }

    pub fn is_valid_to_push(&self) -> bool {
        self.state.lock().valid_to_push
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn size(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }
}

/// Process queue that evicts the oldest item when full
///
/// Used where liveness beats completeness, e.g. high-volume debug inputs.
pub struct CircularProcessQueue {
    key: QueueKey,
    capacity: Mutex<usize>,
    in_flight: Mutex<Arc<InFlightCounter>>,
    state: Mutex<ProcessState>,
    metrics: QueueMetrics,
}

impl CircularProcessQueue {
    pub fn new(key: QueueKey, capacity: usize, in_flight: Arc<InFlightCounter>) -> Self {
        Self {
            key,
            capacity: Mutex::new(capacity.max(1)),
            in_flight: Mutex::new(in_flight),
            state: Mutex::new(ProcessState::new()),
            metrics: QueueMetrics::new(),
        }
    }

    #[inline]
    pub fn key(&self) -> QueueKey {
        self.key
    }

    pub fn pipeline_name(&self) -> String {
        self.in_flight.lock().pipeline_name().to_string()
    }

    /// Always admits; a full queue drops its oldest item, counted as
    /// discarded
    pub fn push(&self, item: ProcessQueueItem) -> bool {
        let mut state = self.state.lock();
        let capacity = *self.capacity.lock();
        while state.items.len() >= capacity {
            let evicted = state.items.pop_front().expect("len checked");
            let size = evicted.data_size();
            state.data_size -= size;
            self.metrics.record_discard(size as u64);
        }
        let size = item.data_size();
        state.data_size += size;
        self.metrics.record_push(size as u64);
        state.items.push_back(item);
        true
    }

    /// Same pop gating as the bounded queue
    pub fn pop(&self) -> Option<ProcessQueueItem> {
        let mut state = self.state.lock();
        if !state.enable_pop || state.items.is_empty() || !state.downstream_admits() {
            return None;
        }
        let item = state.items.pop_front().expect("checked non-empty");
        self.in_flight.lock().add();
        let size = item.data_size();
        state.data_size -= size;
        self.metrics.record_out(size as u64);
        Some(item)
    }

    pub fn set_capacity(&self, capacity: usize) {
        *self.capacity.lock() = capacity.max(1);
    }

    pub fn set_in_flight(&self, in_flight: Arc<InFlightCounter>) {
        *self.in_flight.lock() = in_flight;
    }

    pub fn set_down_stream_queues(&self, queues: Vec<Arc<dyn SenderQueueInterface>>) {
        self.state.lock().down_stream_queues = queues;
    }

    pub fn set_up_stream_feedbacks(&self, feedbacks: Vec<Arc<dyn Feedback>>) {
        self.state.lock().up_stream_feedbacks = feedbacks;
    }

    pub fn enable_pop(&self) {
        self.state.lock().enable_pop = true;
    }

    pub fn disable_pop(&self) {
        self.state.lock().enable_pop = false;
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn size(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }
}

/// The two process queue shapes behind one dispatch surface
pub enum ProcessQueue {
    Bounded(BoundedProcessQueue),
    Circular(CircularProcessQueue),
}

impl ProcessQueue {
    pub fn key(&self) -> QueueKey {
        match self {
            ProcessQueue::Bounded(q) => q.key(),
            ProcessQueue::Circular(q) => q.key(),
        }
    }

    pub fn pipeline_name(&self) -> String {
        match self {
            ProcessQueue::Bounded(q) => q.pipeline_name(),
            ProcessQueue::Circular(q) => q.pipeline_name(),
        }
    }

    pub fn push(&self, item: ProcessQueueItem) -> bool {
        match self {
            ProcessQueue::Bounded(q) => q.push(item),
            ProcessQueue::Circular(q) => q.push(item),
        }
    }

    pub fn pop(&self) -> Option<ProcessQueueItem> {
        match self {
            ProcessQueue::Bounded(q) => q.pop(),
            ProcessQueue::Circular(q) => q.pop(),
        }
    }

    pub fn set_in_flight(&self, in_flight: Arc<InFlightCounter>) {
        match self {
            ProcessQueue::Bounded(q) => q.set_in_flight(in_flight),
            ProcessQueue::Circular(q) => q.set_in_flight(in_flight),
        }
    }

    pub fn set_down_stream_queues(&self, queues: Vec<Arc<dyn SenderQueueInterface>>) {
        match self {
            ProcessQueue::Bounded(q) => q.set_down_stream_queues(queues),
            ProcessQueue::Circular(q) => q.set_down_stream_queues(queues),
        }
    }

    pub fn set_up_stream_feedbacks(&self, feedbacks: Vec<Arc<dyn Feedback>>) {
        match self {
            ProcessQueue::Bounded(q) => q.set_up_stream_feedbacks(feedbacks),
            ProcessQueue::Circular(q) => q.set_up_stream_feedbacks(feedbacks),
        }
    }

    pub fn enable_pop(&self) {
        match self {
            ProcessQueue::Bounded(q) => q.enable_pop(),
            ProcessQueue::Circular(q) => q.enable_pop(),
        }
    }

    pub fn disable_pop(&self) {
        match self {
            ProcessQueue::Bounded(q) => q.disable_pop(),
            ProcessQueue::Circular(q) => q.disable_pop(),
        }
    }

    /// Circular queues always admit
    pub fn is_valid_to_push(&self) -> bool {
        match self {
            ProcessQueue::Bounded(q) => q.is_valid_to_push(),
            ProcessQueue::Circular(_) => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ProcessQueue::Bounded(q) => q.is_empty(),
            ProcessQueue::Circular(q) => q.is_empty(),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            ProcessQueue::Bounded(q) => q.size(),
            ProcessQueue::Circular(q) => q.size(),
        }
    }

    pub fn metrics(&self) -> &QueueMetrics {
        match self {
            ProcessQueue::Bounded(q) => q.metrics(),
            ProcessQueue::Circular(q) => q.metrics(),
        }
    }
}

#[cfg(test)]
#[path = "process_queue_test.rs"]
mod tests;
