//! Tests for the bounded sender queue: throttling, retries, accounting

use std::sync::Arc;

use crate::item::SendingStatus;
use crate::key::QueueKey;
use crate::limiter::ConcurrencyLimiter;
use crate::params::QueueParam;
use crate::sender_queue::{BoundedSenderQueue, SenderQueueInterface};
use crate::test_utils::make_item;

const KEY: QueueKey = QueueKey(5);

fn queue_with(
    limiters: Vec<Arc<ConcurrencyLimiter>>,
    max_rate: Option<u32>,
) -> BoundedSenderQueue {
    BoundedSenderQueue::new(KEY, "flusher_1", QueueParam::new(6, 2, 4), limiters, max_rate)
}

#[test]
fn watermark_gates_push() {
    let queue = queue_with(Vec::new(), None);
    for _ in 0..4 {
        assert!(queue.push(make_item(KEY, 10)));
    }
    assert!(!queue.is_valid_to_push());
    assert!(!queue.push(make_item(KEY, 10)));

    let mut items = Vec::new();
    queue.available_items(&mut items, -1);
    assert!(queue.remove(&items[0]));
    assert!(!queue.is_valid_to_push());
    assert!(queue.remove(&items[1]));
    // back at the low watermark
    assert!(queue.is_valid_to_push());
    assert!(queue.push(make_item(KEY, 10)));
}

#[test]
fn available_items_respects_concurrency_tokens() {
    let limiter = Arc::new(ConcurrencyLimiter::new("region", 80));
    let queue = queue_with(vec![Arc::clone(&limiter)], None);
    for _ in 0..3 {
        queue.push(make_item(KEY, 10));
    }

    limiter.set_current_limit(3);
    limiter.set_in_sending(2);
    let mut items = Vec::new();
    assert_eq!(queue.available_items(&mut items, 80), 1);
    assert_eq!(limiter.in_sending(), 3);
    assert_eq!(items[0].status(), SendingStatus::Sending);
    assert_eq!(items[0].attempt_count(), 1);

    // no more tokens: nothing further is claimed
    let mut more = Vec::new();
    assert_eq!(queue.available_items(&mut more, 80), 0);
}

#[test]
fn available_items_respects_the_rate_budget() {
    let queue = queue_with(Vec::new(), Some(25));
    for _ in 0..3 {
        queue.push(make_item(KEY, 10));
    }

    let mut items = Vec::new();
    // 25 bytes/sec admits two 10-byte items, not three
    assert_eq!(queue.available_items(&mut items, -1), 2);
}

#[test]
fn max_count_limits_the_claim() {
    let queue = queue_with(Vec::new(), None);
    for _ in 0..4 {
        queue.push(make_item(KEY, 1));
    }
    let mut items = Vec::new();
    assert_eq!(queue.available_items(&mut items, 2), 2);
    assert_eq!(items.len(), 2);
}

#[test]
fn retry_keeps_the_item_at_its_position() {
    let queue = queue_with(Vec::new(), None);
    let first = make_item(KEY, 1);
    queue.push(Arc::clone(&first));
    queue.push(make_item(KEY, 1));

    let mut items = Vec::new();
    queue.available_items(&mut items, -1);
    assert_eq!(items.len(), 2);

    // the head item fails; the second succeeds and is removed
    queue.on_send_failed(&items[0]);
    assert_eq!(first.status(), SendingStatus::Idle);
    assert!(queue.remove(&items[1]));

    // the retried head is claimed again, first
    let mut retried = Vec::new();
    assert_eq!(queue.available_items(&mut retried, -1), 1);
    assert!(Arc::ptr_eq(&retried[0], &first));
    assert_eq!(first.attempt_count(), 2);
}

#[test]
fn remove_rejects_unknown_handles_and_fixes_accounting() {
    let queue = queue_with(Vec::new(), None);
    let item = make_item(KEY, 10);
    queue.push(Arc::clone(&item));

    let stranger = make_item(KEY, 10);
    assert!(!queue.remove(&stranger));

    assert!(queue.remove(&item));
    assert!(!queue.remove(&item));
    let snapshot = queue.metrics().snapshot();
    assert_eq!(snapshot.out_items_total, 1);
    assert_eq!(snapshot.queue_size_total, 0);
    assert_eq!(snapshot.queue_data_size_bytes, 0);
}

#[test]
fn completion_releases_limiter_tokens() {
    let limiter = Arc::new(ConcurrencyLimiter::new("region", 4));
    let queue = queue_with(vec![Arc::clone(&limiter)], None);
    queue.push(make_item(KEY, 1));
    queue.push(make_item(KEY, 1));

    let mut items = Vec::new();
    queue.available_items(&mut items, -1);
    assert_eq!(limiter.in_sending(), 2);

    queue.remove(&items[0]);
    assert_eq!(limiter.in_sending(), 1);

    queue.on_send_failed(&items[1]);
    assert_eq!(limiter.in_sending(), 0);
    // the failure halved the ceiling
    assert_eq!(limiter.current_limit(), 2);
}
