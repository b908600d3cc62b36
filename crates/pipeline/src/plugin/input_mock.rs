//! Mock input - deterministic group generator
//!
//! Stands in for the real input plugins (file tailing, container stdout,
//! eBPF probes) in tests and demo pipelines. On start it synchronously
//! pushes a configured number of log groups and backs off on `QueueFull`
//! like a real input would.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde_json::Value;

use conduit_model::{EventGroup, Timestamp};
use conduit_queue::PushResult;

use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::plugin::{Input, InputCollector, InputFactory, PluginParams};

pub struct MockInput {
    group_count: u64,
    events_per_group: u64,
    content: String,
    started: AtomicBool,
    pushed: AtomicU64,
    rejected: AtomicU64,
}

impl MockInput {
    fn make_group(&self, sequence: u64) -> EventGroup {
        let mut group = EventGroup::new();
        for event_index in 0..self.events_per_group {
            group.add_log_event(
                Timestamp::from_secs((sequence * self.events_per_group + event_index) as i64),
                &[(b"content", self.content.as_bytes())],
            );
        }
        group
    }

    pub fn pushed(&self) -> u64 {
        self.pushed.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

impl Input for MockInput {
    fn start(&self, collector: InputCollector) -> Result<()> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for sequence in 0..self.group_count {
            match collector.push_group(self.make_group(sequence)) {
                PushResult::Ok => {
                    self.pushed.fetch_add(1, Ordering::Relaxed);
                }
                PushResult::QueueFull => {
                    self.rejected.fetch_add(1, Ordering::Relaxed);
                }
                PushResult::QueueNotFound => {
                    return Err(PipelineError::Internal(
                        "mock input pushed to an unregistered queue".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn stop(&self, _is_removing: bool) {
        self.started.store(false, Ordering::Release);
    }

    fn name(&self) -> &'static str {
        "input_mock"
    }
}

pub struct MockInputFactory;

impl InputFactory for MockInputFactory {
    fn create(&self, params: &PluginParams, _ctx: &PipelineContext) -> Result<Box<dyn Input>> {
        let group_count = params
            .get("GroupCount")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let events_per_group = params
            .get("EventsPerGroup")
            .and_then(Value::as_u64)
            .unwrap_or(1)
            .max(1);
        let content = params
            .get("Content")
            .and_then(Value::as_str)
            .unwrap_or("mock event")
            .to_string();
        Ok(Box::new(MockInput {
            group_count,
            events_per_group,
            content,
            started: AtomicBool::new(false),
            pushed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }))
    }

    fn name(&self) -> &'static str {
        "input_mock"
    }
}
