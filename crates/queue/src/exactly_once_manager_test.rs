//! Tests for the exactly-once registry: reuse across reloads and GC

use std::sync::Arc;

use bytes::Bytes;

use crate::exactly_once_manager::ExactlyOnceQueueManager;
use crate::item::{InFlightCounter, RangeCheckpoint, SenderQueueItem};
use crate::key::QueueKey;
use crate::test_utils::{make_process_item, NoopTarget};
use crate::PushResult;

const KEY: QueueKey = QueueKey(4);

fn checkpoints(count: usize) -> Vec<Arc<RangeCheckpoint>> {
    (0..count)
        .map(|i| Arc::new(RangeCheckpoint::new(i, format!("range-{i}"), 0, KEY)))
        .collect()
}

fn in_flight() -> Arc<InFlightCounter> {
    Arc::new(InFlightCounter::new("eo_pipeline"))
}

fn eo_item(checkpoint: &Arc<RangeCheckpoint>) -> Arc<SenderQueueItem> {
    Arc::new(
        SenderQueueItem::new(Bytes::from_static(b"content"), 5, Arc::new(NoopTarget), KEY)
            .with_checkpoint(Arc::clone(checkpoint)),
    )
}

#[test]
fn create_requires_checkpoints() {
    let manager = ExactlyOnceQueueManager::new();
    assert!(manager
        .create_or_update_queue(KEY, 0, Vec::new(), in_flight())
        .is_err());
}

#[test]
fn same_slot_count_reuses_the_queues() {
    let manager = ExactlyOnceQueueManager::new();
    let cpts = checkpoints(2);
    manager
        .create_or_update_queue(KEY, 0, cpts.clone(), in_flight())
        .unwrap();

    // one acknowledged send advances slot 0
    let item = eo_item(&cpts[0]);
    assert_eq!(manager.push_sender_queue(KEY, Arc::clone(&item)), PushResult::Ok);
    let mut claimed = Vec::new();
    manager.get_available_sender_items(&mut claimed, -1);
    assert!(manager.remove_sender_item(KEY, &item));
    assert_eq!(cpts[0].sequence_id(), 1);

    // a reload with the same concurrency keeps the sequence state
    manager
        .create_or_update_queue(KEY, 1, checkpoints(2), in_flight())
        .unwrap();
    let preserved = manager.checkpoints(KEY).unwrap();
    assert_eq!(preserved[0].sequence_id(), 1);

    // a changed concurrency rebuilds the slots
    manager
        .create_or_update_queue(KEY, 1, checkpoints(3), in_flight())
        .unwrap();
    let rebuilt = manager.checkpoints(KEY).unwrap();
    assert_eq!(rebuilt.len(), 3);
    assert_eq!(rebuilt[0].sequence_id(), 0);
}

#[test]
fn process_queue_pops_only_while_a_slot_is_free() {
    let manager = ExactlyOnceQueueManager::new();
    let cpts = checkpoints(1);
    manager
        .create_or_update_queue(KEY, 0, cpts.clone(), in_flight())
        .unwrap();
    manager.enable_pop(KEY);

    assert_eq!(manager.push_process_queue(KEY, make_process_item()), PushResult::Ok);
    assert!(manager.pop_process_item(0).is_some());

    // occupy the single slot: the next pop is gated
    manager.push_sender_queue(KEY, eo_item(&cpts[0]));
    manager.push_process_queue(KEY, make_process_item());
    assert!(manager.pop_process_item(0).is_none());
}

#[test]
fn gc_reaps_only_empty_marked_pairs() {
    let manager = ExactlyOnceQueueManager::new();
    manager.set_gc_threshold_secs(0);
    let cpts = checkpoints(1);
    manager
        .create_or_update_queue(KEY, 0, cpts.clone(), in_flight())
        .unwrap();

    let item = eo_item(&cpts[0]);
    manager.push_sender_queue(KEY, Arc::clone(&item));
    assert!(manager.delete_queue(KEY));
    manager.clear_unused_queues();
    assert!(manager.has_queue(KEY));

    let mut claimed = Vec::new();
    manager.get_available_sender_items(&mut claimed, -1);
    manager.remove_sender_item(KEY, &item);
    manager.clear_unused_queues();
    assert!(!manager.has_queue(KEY));
}

#[test]
fn recreate_after_delete_cancels_the_pending_gc() {
    let manager = ExactlyOnceQueueManager::new();
    manager.set_gc_threshold_secs(0);
    manager
        .create_or_update_queue(KEY, 0, checkpoints(1), in_flight())
        .unwrap();
    assert!(manager.delete_queue(KEY));

    manager
        .create_or_update_queue(KEY, 0, checkpoints(1), in_flight())
        .unwrap();
    manager.clear_unused_queues();
    assert!(manager.has_queue(KEY));
}
