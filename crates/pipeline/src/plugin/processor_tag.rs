//! Tag processor - stamps a group-level tag on everything passing through
//!
//! The minimal useful processor: pipelines use it to mark provenance
//! (topic, environment) before routing, and the tag-condition tests use
//! it as the natural producer of routable groups.

use serde_json::Value;

use conduit_model::EventGroup;

use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};
use crate::plugin::{PluginParams, Processor, ProcessorFactory};

pub struct TagProcessor {
    key: String,
    value: String,
}

impl Processor for TagProcessor {
    fn process(&self, groups: &mut Vec<EventGroup>) {
        for group in groups.iter_mut() {
            group.set_tag(self.key.as_bytes(), self.value.as_bytes());
        }
    }

    fn name(&self) -> &'static str {
        "processor_tag"
    }
}

pub struct TagProcessorFactory;

impl ProcessorFactory for TagProcessorFactory {
    fn create(&self, params: &PluginParams, ctx: &PipelineContext) -> Result<Box<dyn Processor>> {
        let key = params
            .get("Key")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                PipelineError::config(ctx.name(), "processor_tag requires a non-empty Key")
            })?;
        let value = params
            .get("Value")
            .and_then(Value::as_str)
            .ok_or_else(|| PipelineError::config(ctx.name(), "processor_tag requires a Value"))?;
        Ok(Box::new(TagProcessor {
            key: key.to_string(),
            value: value.to_string(),
        }))
    }

    fn name(&self) -> &'static str {
        "processor_tag"
    }
}
