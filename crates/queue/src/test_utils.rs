//! Shared helpers for queue tests

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use conduit_model::{EventGroup, Timestamp};

use crate::feedback::Feedback;
use crate::item::{ProcessQueueItem, SenderQueueItem, SenderTarget};
use crate::key::QueueKey;

/// Feedback double recording every fired key
#[derive(Default)]
pub(crate) struct MockFeedback {
    keys: Mutex<Vec<QueueKey>>,
}

impl MockFeedback {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn has_feedback(&self, key: QueueKey) -> bool {
        self.keys.lock().contains(&key)
    }

    pub(crate) fn feedback_count(&self) -> usize {
        self.keys.lock().len()
    }
}

impl Feedback for MockFeedback {
    fn feedback(&self, key: QueueKey) {
        self.keys.lock().push(key);
    }
}

/// Transport double that accepts everything
pub(crate) struct NoopTarget;

impl SenderTarget for NoopTarget {
    fn send(&self, _item: &SenderQueueItem) -> bool {
        true
    }

    fn name(&self) -> &str {
        "noop"
    }
}

pub(crate) fn make_group() -> EventGroup {
    let mut group = EventGroup::new();
    group.add_log_event(Timestamp::from_secs(1), &[(b"key", b"value")]);
    group
}

pub(crate) fn make_process_item() -> ProcessQueueItem {
    ProcessQueueItem::new(make_group(), 0)
}

pub(crate) fn make_item(queue_key: QueueKey, raw_size: usize) -> Arc<SenderQueueItem> {
    Arc::new(SenderQueueItem::new(
        Bytes::from_static(b"content"),
        raw_size,
        Arc::new(NoopTarget),
        queue_key,
    ))
}
