//! End-to-end pipeline tests: init wiring, the process/send cycle with
//! in-flight accounting, exactly-once slot binding, and stop semantics

use std::sync::Arc;

use conduit_config::PipelineConfig;
use conduit_model::{EventGroup, Timestamp};
use conduit_queue::SenderTarget;

use crate::context::QueueContext;
use crate::pipeline::{CollectionPipeline, PipelineState};
use crate::plugin::default_registry;

fn parse(name: &str, body: &str) -> PipelineConfig {
    PipelineConfig::from_json(name, body).unwrap()
}

fn simple_config(name: &str, group_count: u64) -> PipelineConfig {
    parse(
        name,
        &format!(
            r#"{{
                "inputs": [{{ "Type": "input_mock", "GroupCount": {group_count} }}],
                "processors": [{{ "Type": "processor_tag", "Key": "env", "Value": "test" }}],
                "flushers": [{{ "Type": "flusher_null" }}]
            }}"#
        ),
    )
}

fn exactly_once_config(name: &str) -> PipelineConfig {
    parse(
        name,
        r#"{
            "inputs": [{ "Type": "input_mock", "GroupCount": 0, "EnableExactlyOnce": 2 }],
            "flushers": [{ "Type": "flusher_null" }]
        }"#,
    )
}

fn log_group() -> EventGroup {
    let mut group = EventGroup::new();
    group.add_log_event(Timestamp::from_secs(1), &[(b"msg", b"hello")]);
    group
}

/// Run the processor and sender stages to exhaustion, like the worker
/// cohorts would
fn drain(queues: &QueueContext, pipeline: &CollectionPipeline) {
    while let Some((item, name)) = queues.process_queues.pop_item() {
        assert_eq!(name, pipeline.name());
        let mut groups = vec![item.group];
        pipeline.process(&mut groups, item.input_index);
        pipeline.send(groups);
        pipeline.sub_in_process_cnt();
    }
    let mut items = Vec::new();
    queues.sender_queues.get_available_items(&mut items, -1);
    for item in items {
        assert!(item.target.send(item.as_ref()));
        assert!(queues.sender_queues.remove_item(item.queue_key, &item));
    }
}

#[test]
fn init_registers_queues_and_start_is_idempotent() {
    let queues = QueueContext::new();
    let registry = default_registry();
    let pipeline =
        CollectionPipeline::init(simple_config("app_logs", 3), &queues, &registry).unwrap();
    assert_eq!(pipeline.state(), PipelineState::Initialized);
    assert!(queues.process_queues.has_queue(pipeline.queue_key()));

    pipeline.start();
    assert_eq!(pipeline.state(), PipelineState::Running);
    // the mock input pushed its groups on start
    assert_eq!(
        queues.process_queues.queue_size(pipeline.queue_key()),
        Some(3)
    );
    // a second start does not re-run the inputs
    pipeline.start();
    assert_eq!(
        queues.process_queues.queue_size(pipeline.queue_key()),
        Some(3)
    );
}

#[test]
fn unknown_plugin_fails_init_before_any_queue_exists() {
    let queues = QueueContext::new();
    let registry = default_registry();
    let config = parse(
        "broken",
        r#"{
            "inputs": [{ "Type": "input_mock" }],
            "processors": [{ "Type": "processor_nonexistent" }],
            "flushers": [{ "Type": "flusher_null" }]
        }"#,
    );
    assert!(CollectionPipeline::init(config, &queues, &registry).is_err());
    let key = queues.key_manager.get_key("broken");
    assert!(!queues.process_queues.has_queue(key));
}

#[test]
fn process_send_cycle_returns_in_flight_to_zero() {
    let queues = QueueContext::new();
    let registry = default_registry();
    let pipeline =
        Arc::new(CollectionPipeline::init(simple_config("cycle", 5), &queues, &registry).unwrap());
    pipeline.start();

    drain(&queues, &pipeline);

    assert_eq!(pipeline.in_process_cnt(), 0);
    assert!(queues.process_queues.is_all_queue_empty());
    assert!(queues.sender_queues.is_all_queue_empty());

    let snapshot = pipeline.metrics().snapshot();
    assert_eq!(snapshot.processors_in_groups_total, 5);
    assert_eq!(snapshot.flushers_in_groups_total, 5);
    assert_eq!(snapshot.send_rejections_total, 0);

    pipeline.stop(false);
    assert_eq!(pipeline.state(), PipelineState::Stopped);
    assert_eq!(pipeline.in_process_cnt(), 0);
}

#[test]
fn processed_groups_carry_the_tag() {
    let queues = QueueContext::new();
    let registry = default_registry();
    let pipeline =
        CollectionPipeline::init(simple_config("tagging", 0), &queues, &registry).unwrap();
    pipeline.start();

    let mut groups = vec![log_group()];
    pipeline.process(&mut groups, 0);
    assert_eq!(groups[0].get_tag(b"env").unwrap().as_ref(), b"test");
}

#[test]
fn exactly_once_send_binds_free_slots_and_refuses_when_full() {
    let queues = QueueContext::new();
    let registry = default_registry();
    let pipeline =
        CollectionPipeline::init(exactly_once_config("eo"), &queues, &registry).unwrap();
    pipeline.start();

    // two slots accept two groups
    assert!(pipeline.send(vec![log_group()]));
    assert!(pipeline.send(vec![log_group()]));
    // both slots in flight: the third group is refused
    assert!(!pipeline.send(vec![log_group()]));
    assert_eq!(pipeline.metrics().snapshot().send_rejections_total, 1);

    // completing one send frees its slot and advances the checkpoint
    let mut items = Vec::new();
    queues.sender_queues.get_available_items(&mut items, 1);
    assert_eq!(items.len(), 1);
    assert!(queues.sender_queues.remove_item(items[0].queue_key, &items[0]));
    let checkpoints = queues.exactly_once.checkpoints(pipeline.queue_key()).unwrap();
    assert_eq!(checkpoints.iter().map(|c| c.sequence_id()).sum::<u64>(), 1);

    assert!(pipeline.send(vec![log_group()]));
}

#[test]
fn stop_false_preserves_queues_and_stop_true_releases_them() {
    let queues = QueueContext::new();
    queues.process_queues.set_gc_threshold_secs(0);
    queues.sender_queues.set_gc_threshold_secs(0);
    queues.exactly_once.set_gc_threshold_secs(0);
    let registry = default_registry();

    // reload path: queues survive
    let pipeline =
        CollectionPipeline::init(simple_config("keep", 0), &queues, &registry).unwrap();
    let key = pipeline.queue_key();
    pipeline.start();
    pipeline.stop(false);
    queues.process_queues.clear_unused_queues();
    queues.sender_queues.clear_unused_queues();
    assert!(queues.process_queues.has_queue(key));

    // removal path: queues are reaped once empty
    let pipeline =
        CollectionPipeline::init(simple_config("drop", 0), &queues, &registry).unwrap();
    let key = pipeline.queue_key();
    let flusher_key = pipeline.flushers()[0].queue_key();
    pipeline.start();
    pipeline.stop(true);
    queues.process_queues.clear_unused_queues();
    queues.sender_queues.clear_unused_queues();
    assert!(!queues.process_queues.has_queue(key));
    assert!(!queues.sender_queues.has_queue(flusher_key));
}

#[test]
fn exactly_once_stop_true_releases_the_slots() {
    let queues = QueueContext::new();
    queues.exactly_once.set_gc_threshold_secs(0);
    let registry = default_registry();
    let pipeline =
        CollectionPipeline::init(exactly_once_config("eo_drop"), &queues, &registry).unwrap();
    let key = pipeline.queue_key();
    pipeline.start();

    pipeline.stop(true);
    queues.exactly_once.clear_unused_queues();
    assert!(!queues.exactly_once.has_queue(key));
}
