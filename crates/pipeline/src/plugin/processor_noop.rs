//! No-op processor - pass-through for testing and benchmarking

use crate::context::PipelineContext;
use crate::error::Result;
use crate::plugin::{PluginParams, Processor, ProcessorFactory};

use conduit_model::EventGroup;

pub struct NoopProcessor;

impl Processor for NoopProcessor {
    fn process(&self, _groups: &mut Vec<EventGroup>) {}

    fn name(&self) -> &'static str {
        "processor_noop"
    }
}

pub struct NoopProcessorFactory;

impl ProcessorFactory for NoopProcessorFactory {
    fn create(&self, _params: &PluginParams, _ctx: &PipelineContext) -> Result<Box<dyn Processor>> {
        Ok(Box::new(NoopProcessor))
    }

    fn name(&self) -> &'static str {
        "processor_noop"
    }
}
