//! Runtime tests: end-to-end flow through both worker cohorts

use std::time::{Duration, Instant};

use conduit_config::PipelineConfig;

use crate::runtime::{AgentRuntime, RuntimeOptions};

fn config(name: &str, group_count: u64) -> PipelineConfig {
    PipelineConfig::from_json(
        name,
        &format!(
            r#"{{
                "inputs": [{{ "Type": "input_mock", "GroupCount": {group_count} }}],
                "processors": [{{ "Type": "processor_tag", "Key": "env", "Value": "test" }}],
                "flushers": [{{ "Type": "flusher_null" }}]
            }}"#
        ),
    )
    .unwrap()
}

fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    predicate()
}

#[test]
fn groups_flow_through_both_cohorts() {
    let runtime = AgentRuntime::new(RuntimeOptions::default());
    runtime.start();
    runtime.apply_configs(vec![config("flow", 5)]);

    let drained = wait_until(Duration::from_secs(5), || {
        runtime.queues().process_queues.is_all_queue_empty()
            && runtime.queues().sender_queues.is_all_queue_empty()
    });
    assert!(drained, "workers must drain all queues");

    let pipeline = runtime.pipeline_manager().find_pipeline_by_name("flow").unwrap();
    assert!(wait_until(Duration::from_secs(1), || {
        pipeline.in_process_cnt() == 0
    }));
    let snapshot = pipeline.metrics().snapshot();
    assert_eq!(snapshot.processors_in_groups_total, 5);
    assert_eq!(snapshot.flushers_in_groups_total, 5);

    runtime.shutdown();
}

#[test]
fn shutdown_is_clean_with_idle_pipelines() {
    let runtime = AgentRuntime::new(RuntimeOptions {
        processor_threads: 1,
        sender_threads: 1,
        shutdown_drain_secs: 2,
    });
    runtime.start();
    runtime.apply_configs(vec![config("idle", 0)]);
    runtime.shutdown();
    assert_eq!(runtime.pipeline_manager().pipeline_count(), 0);
}

#[test]
fn apply_configs_twice_is_stable() {
    let runtime = AgentRuntime::new(RuntimeOptions::default());
    runtime.start();
    runtime.apply_configs(vec![config("stable", 0)]);
    let before = runtime
        .pipeline_manager()
        .find_pipeline_by_name("stable")
        .unwrap();
    runtime.apply_configs(vec![config("stable", 0)]);
    let after = runtime
        .pipeline_manager()
        .find_pipeline_by_name("stable")
        .unwrap();
    assert!(std::sync::Arc::ptr_eq(&before, &after));
    runtime.shutdown();
}
