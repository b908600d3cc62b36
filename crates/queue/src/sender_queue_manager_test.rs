//! Tests for the sender queue registry, including the exactly-once
//! fall-through paths

use std::sync::Arc;

use bytes::Bytes;

use crate::exactly_once_manager::ExactlyOnceQueueManager;
use crate::item::{InFlightCounter, RangeCheckpoint, SenderQueueItem};
use crate::key::{QueueKey, QueueKeyManager};
use crate::limiter::ConcurrencyLimiter;
use crate::params::QueueParam;
use crate::sender_queue_manager::SenderQueueManager;
use crate::test_utils::NoopTarget;
use crate::PushResult;

const MAX_RATE: u32 = 100;

struct Fixture {
    manager: SenderQueueManager,
    keys: Arc<QueueKeyManager>,
    eo: Arc<ExactlyOnceQueueManager>,
}

fn fixture() -> Fixture {
    let keys = Arc::new(QueueKeyManager::new());
    let eo = Arc::new(ExactlyOnceQueueManager::new());
    let manager = SenderQueueManager::new(Arc::clone(&keys), Some(Arc::clone(&eo)));
    manager.set_default_param(QueueParam::new(3, 1, 2));
    Fixture { manager, keys, eo }
}

fn limiter() -> Arc<ConcurrencyLimiter> {
    Arc::new(ConcurrencyLimiter::new("region", 80))
}

fn make_item(key: QueueKey) -> Arc<SenderQueueItem> {
    Arc::new(SenderQueueItem::new(
        Bytes::from_static(b"content"),
        10,
        Arc::new(NoopTarget),
        key,
    ))
}

fn make_eo_item(key: QueueKey, checkpoint: &Arc<RangeCheckpoint>) -> Arc<SenderQueueItem> {
    Arc::new(
        SenderQueueItem::new(Bytes::from_static(b"content"), 10, Arc::new(NoopTarget), key)
            .with_checkpoint(Arc::clone(checkpoint)),
    )
}

fn setup_eo_queue(fx: &Fixture, key: QueueKey, slots: usize) -> Vec<Arc<RangeCheckpoint>> {
    let checkpoints: Vec<_> = (0..slots)
        .map(|i| Arc::new(RangeCheckpoint::new(i, format!("range-{i}"), 0, key)))
        .collect();
    fx.eo
        .create_or_update_queue(
            key,
            0,
            checkpoints.clone(),
            Arc::new(InFlightCounter::new("eo")),
        )
        .unwrap();
    checkpoints
}

#[test]
fn create_queue_then_reuse_replaces_policies() {
    let fx = fixture();
    let key = QueueKey(0);
    assert!(fx.manager.create_queue(key, "flusher_1", vec![limiter()], Some(MAX_RATE)));
    assert_eq!(fx.manager.queue_count(), 1);
    let queue = fx.manager.queue(key).unwrap();
    assert_eq!(queue.limiter_count(), 1);
    assert_eq!(queue.rate_limit(), Some(MAX_RATE));

    // reused queue: same object, new policies
    assert!(fx.manager.create_queue(key, "flusher_1", vec![limiter()], Some(10)));
    assert_eq!(fx.manager.queue_count(), 1);
    let queue = fx.manager.queue(key).unwrap();
    assert_eq!(queue.rate_limit(), Some(10));
}

#[test]
fn delete_queue_marks_then_gc_reaps_empty_only() {
    let fx = fixture();
    fx.manager.set_gc_threshold_secs(0);

    // queue not existing
    assert!(!fx.manager.delete_queue(QueueKey(0)));

    let key1 = fx.keys.get_key("name_1");
    let key2 = fx.keys.get_key("name_2");
    fx.manager.create_queue(key1, "f", vec![limiter()], Some(MAX_RATE));
    fx.manager.create_queue(key2, "f", vec![limiter()], Some(MAX_RATE));
    fx.manager.push_queue(key2, make_item(key2));

    assert!(fx.manager.delete_queue(key1));
    assert!(fx.manager.delete_queue(key2));
    assert_eq!(fx.manager.pending_deletion_count(), 2);

    // already marked
    assert!(!fx.manager.delete_queue(key1));

    // key1 is reaped, key2 still holds an item
    fx.manager.clear_unused_queues();
    assert_eq!(fx.manager.queue_count(), 1);
    assert_eq!(fx.manager.pending_deletion_count(), 1);
    assert_eq!(fx.keys.get_name(key1), "");

    // a returning config takes its queue off the GC list
    assert!(fx.manager.reuse_queue(key2));
    assert_eq!(fx.manager.pending_deletion_count(), 0);
}

#[test]
fn push_routes_to_both_registries() {
    let fx = fixture();
    let key = QueueKey(0);
    let eo_key = QueueKey(1);
    fx.manager.create_queue(key, "f", vec![limiter()], Some(MAX_RATE));
    let checkpoints = setup_eo_queue(&fx, eo_key, 2);

    // ordinary queue
    assert!(fx.manager.is_valid_to_push(key));
    assert_eq!(fx.manager.push_queue(key, make_item(key)), PushResult::Ok);

    // exactly-once key: admission belongs to the slot queue
    assert!(!fx.manager.is_valid_to_push(eo_key));
    assert_eq!(
        fx.manager.push_queue(eo_key, make_eo_item(eo_key, &checkpoints[0])),
        PushResult::Ok
    );

    // no queue at all
    assert!(!fx.manager.is_valid_to_push(QueueKey(2)));
    assert_eq!(
        fx.manager.push_queue(QueueKey(2), make_item(QueueKey(2))),
        PushResult::QueueNotFound
    );

    // high watermark of 2 reached after one more push
    assert_eq!(fx.manager.push_queue(key, make_item(key)), PushResult::Ok);
    assert_eq!(
        fx.manager.push_queue(key, make_item(key)),
        PushResult::QueueFull
    );
    // occupied slot refuses
    assert_eq!(
        fx.manager.push_queue(eo_key, make_eo_item(eo_key, &checkpoints[0])),
        PushResult::QueueFull
    );
}

#[test]
fn available_items_sweeps_both_registries_under_limits() {
    let fx = fixture();
    let key = QueueKey(0);
    let eo_key = QueueKey(1);
    let region = limiter();
    fx.manager.create_queue(key, "f", vec![Arc::clone(&region)], Some(MAX_RATE));
    for _ in 0..2 {
        fx.manager.push_queue(key, make_item(key));
    }
    let checkpoints = setup_eo_queue(&fx, eo_key, 2);
    for cpt in &checkpoints {
        fx.manager.push_queue(eo_key, make_eo_item(eo_key, cpt));
    }

    {
        // no limits
        let mut items = Vec::new();
        fx.manager.get_available_items(&mut items, -1);
        assert_eq!(items.len(), 4);
        for item in &items {
            fx.manager.on_item_failed(item.queue_key, item);
        }
    }
    {
        // limited by the concurrency ceiling
        region.set_current_limit(3);
        region.set_in_sending(2);
        let mut items = Vec::new();
        fx.manager.get_available_items(&mut items, 80);
        // one token for the ordinary queue, then the unlimited EO queue
        assert_eq!(region.in_sending(), 3);
        assert_eq!(items.len(), 3);
    }
}

#[test]
fn remove_item_handles_both_registries_and_unknown_keys() {
    let fx = fixture();
    let key = QueueKey(0);
    let eo_key = QueueKey(1);
    fx.manager.create_queue(key, "f", vec![limiter()], Some(MAX_RATE));
    let checkpoints = setup_eo_queue(&fx, eo_key, 2);

    let item = make_item(key);
    fx.manager.push_queue(key, Arc::clone(&item));
    assert!(fx.manager.remove_item(key, &item));
    assert!(!fx.manager.remove_item(key, &item));

    let eo_item = make_eo_item(eo_key, &checkpoints[0]);
    fx.manager.push_queue(eo_key, Arc::clone(&eo_item));
    assert!(fx.manager.remove_item(eo_key, &eo_item));
    assert!(!fx.manager.remove_item(eo_key, &eo_item));

    let orphan = make_item(QueueKey(2));
    assert!(!fx.manager.remove_item(QueueKey(2), &orphan));
}

#[test]
fn all_queue_empty_spans_both_registries() {
    let fx = fixture();
    let key = QueueKey(0);
    let eo_key = QueueKey(2);
    fx.manager.create_queue(key, "f", vec![limiter()], Some(MAX_RATE));
    let checkpoints = setup_eo_queue(&fx, eo_key, 2);
    assert!(fx.manager.is_all_queue_empty());

    let item = make_item(key);
    fx.manager.push_queue(key, Arc::clone(&item));
    assert!(!fx.manager.is_all_queue_empty());
    fx.manager.remove_item(key, &item);
    assert!(fx.manager.is_all_queue_empty());

    let eo_item = make_eo_item(eo_key, &checkpoints[0]);
    fx.manager.push_queue(eo_key, Arc::clone(&eo_item));
    assert!(!fx.manager.is_all_queue_empty());
    fx.manager.remove_item(eo_key, &eo_item);
    assert!(fx.manager.is_all_queue_empty());
}
