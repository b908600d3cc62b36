//! Plugin model - inputs, processors, flushers
//!
//! Plugin kinds are closed sets behind small dispatch traits. Instances
//! wrap the plugin with its pipeline-assigned [`PluginMeta`]; the registry
//! maps config type names to factories so pipeline init is entirely
//! config-driven.

mod flusher_null;
mod flusher_stdout;
mod input_mock;
mod processor_noop;
mod processor_tag;
mod serialize;

pub use flusher_null::{NullFlusher, NullFlusherFactory};
pub use flusher_stdout::{StdoutFlusher, StdoutFlusherFactory};
pub use input_mock::{MockInput, MockInputFactory};
pub use processor_noop::{NoopProcessor, NoopProcessorFactory};
pub use processor_tag::{TagProcessor, TagProcessorFactory};
pub use serialize::group_to_json;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::Value;

use conduit_model::EventGroup;
use conduit_queue::{
    ProcessQueueItem, ProcessQueueManager, PushResult, QueueKey, SenderQueueItem, SenderTarget,
};

use crate::context::PipelineContext;
use crate::error::{PipelineError, Result};

/// Raw plugin parameters from the config block
pub type PluginParams = serde_json::Map<String, Value>;

/// Identity a pipeline assigns to each plugin at init
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PluginMeta {
    pub plugin_id: u16,
}

impl fmt::Display for PluginMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.plugin_id)
    }
}

/// Handle through which inputs feed the pipeline
///
/// Inputs never see pipeline internals; they push complete groups and
/// back off on `QueueFull`.
#[derive(Clone)]
pub struct InputCollector {
    queue_key: QueueKey,
    input_index: usize,
    process_queues: Arc<ProcessQueueManager>,
}

impl InputCollector {
    pub fn new(
        queue_key: QueueKey,
        input_index: usize,
        process_queues: Arc<ProcessQueueManager>,
    ) -> Self {
        Self {
            queue_key,
            input_index,
            process_queues,
        }
    }

    /// Push one group into the pipeline's process queue
    pub fn push_group(&self, group: EventGroup) -> PushResult {
        self.process_queues
            .push_queue(self.queue_key, ProcessQueueItem::new(group, self.input_index))
    }

    #[inline]
    pub fn input_index(&self) -> usize {
        self.input_index
    }
}

/// An event source
pub trait Input: Send + Sync {
    /// Begin producing into the collector; must be idempotent-safe under
    /// the pipeline's start guard
    fn start(&self, collector: InputCollector) -> Result<()>;

    /// Stop producing; `is_removing` releases external registrations
    /// instead of preserving them
    fn stop(&self, is_removing: bool);

    fn name(&self) -> &'static str;
}

/// A synchronous `EventGroup → EventGroup` transform
pub trait Processor: Send + Sync {
    fn process(&self, groups: &mut Vec<EventGroup>);

    fn name(&self) -> &'static str;
}

/// An outbound destination: serialization plus transport
pub trait Flusher: Send + Sync {
    /// Build the wire payload for one routed group
    fn serialize(&self, group: &EventGroup) -> Bytes;

    /// One delivery attempt; `false` means retry later
    fn send(&self, item: &SenderQueueItem) -> bool;

    fn start(&self) {}

    /// Push any batched-but-unsent data toward the sender queue
    fn flush(&self) {}

    fn stop(&self, _is_removing: bool) {}

    fn name(&self) -> &'static str;
}

/// Input plugin plus its pipeline-assigned identity
pub struct InputInstance {
    plugin: Arc<dyn Input>,
    meta: PluginMeta,
}

impl InputInstance {
    pub fn new(plugin: Box<dyn Input>, meta: PluginMeta) -> Self {
        Self {
            plugin: Arc::from(plugin),
            meta,
        }
    }

    #[inline]
    pub fn plugin(&self) -> &Arc<dyn Input> {
        &self.plugin
    }

    #[inline]
    pub fn meta(&self) -> PluginMeta {
        self.meta
    }
}

/// Processor plugin plus its pipeline-assigned identity
pub struct ProcessorInstance {
    plugin: Box<dyn Processor>,
    meta: PluginMeta,
}

impl ProcessorInstance {
    pub fn new(plugin: Box<dyn Processor>, meta: PluginMeta) -> Self {
        Self { plugin, meta }
    }

    #[inline]
    pub fn plugin(&self) -> &dyn Processor {
        self.plugin.as_ref()
    }

    #[inline]
    pub fn meta(&self) -> PluginMeta {
        self.meta
    }
}

/// Flusher plugin bound to its sender queue
///
/// The instance is the [`SenderTarget`] carried by queue items, so the
/// sender cohort reaches the plugin without another lookup.
pub struct FlusherInstance {
    plugin: Arc<dyn Flusher>,
    meta: PluginMeta,
    queue_key: QueueKey,
}

impl FlusherInstance {
    pub fn new(plugin: Box<dyn Flusher>, meta: PluginMeta, queue_key: QueueKey) -> Self {
        Self {
            plugin: Arc::from(plugin),
            meta,
            queue_key,
        }
    }

    #[inline]
    pub fn plugin(&self) -> &Arc<dyn Flusher> {
        &self.plugin
    }

    #[inline]
    pub fn meta(&self) -> PluginMeta {
        self.meta
    }

    /// Key of this flusher's sender queue
    #[inline]
    pub fn queue_key(&self) -> QueueKey {
        self.queue_key
    }
}

impl SenderTarget for FlusherInstance {
    fn send(&self, item: &SenderQueueItem) -> bool {
        self.plugin.send(item)
    }

    fn name(&self) -> &str {
        self.plugin.name()
    }
}

/// Factory for one input type
pub trait InputFactory: Send + Sync {
    fn create(&self, params: &PluginParams, ctx: &PipelineContext) -> Result<Box<dyn Input>>;

    fn name(&self) -> &'static str;
}

/// Factory for one processor type
pub trait ProcessorFactory: Send + Sync {
    fn create(&self, params: &PluginParams, ctx: &PipelineContext) -> Result<Box<dyn Processor>>;

    fn name(&self) -> &'static str;
}

/// Factory for one flusher type
pub trait FlusherFactory: Send + Sync {
    fn create(&self, params: &PluginParams, ctx: &PipelineContext) -> Result<Box<dyn Flusher>>;

    fn name(&self) -> &'static str;
}

/// Registry mapping config type names to plugin factories
pub struct PluginRegistry {
    inputs: HashMap<String, Box<dyn InputFactory>>,
    processors: HashMap<String, Box<dyn ProcessorFactory>>,
    flushers: HashMap<String, Box<dyn FlusherFactory>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            inputs: HashMap::new(),
            processors: HashMap::new(),
            flushers: HashMap::new(),
        }
    }

    pub fn register_input<F: InputFactory + 'static>(&mut self, factory: F) {
        self.inputs.insert(factory.name().to_string(), Box::new(factory));
    }

    pub fn register_processor<F: ProcessorFactory + 'static>(&mut self, factory: F) {
        self.processors
            .insert(factory.name().to_string(), Box::new(factory));
    }

    pub fn register_flusher<F: FlusherFactory + 'static>(&mut self, factory: F) {
        self.flushers
            .insert(factory.name().to_string(), Box::new(factory));
    }

    pub fn create_input(
        &self,
        plugin_type: &str,
        params: &PluginParams,
        ctx: &PipelineContext,
    ) -> Result<Box<dyn Input>> {
        match self.inputs.get(plugin_type) {
            Some(factory) => factory.create(params, ctx),
            None => Err(PipelineError::config(
                ctx.name(),
                format!("unknown input type '{plugin_type}'"),
            )),
        }
    }

    pub fn create_processor(
        &self,
        plugin_type: &str,
        params: &PluginParams,
        ctx: &PipelineContext,
    ) -> Result<Box<dyn Processor>> {
        match self.processors.get(plugin_type) {
            Some(factory) => factory.create(params, ctx),
            None => Err(PipelineError::config(
                ctx.name(),
                format!("unknown processor type '{plugin_type}'"),
            )),
        }
    }

    pub fn create_flusher(
        &self,
        plugin_type: &str,
        params: &PluginParams,
        ctx: &PipelineContext,
    ) -> Result<Box<dyn Flusher>> {
        match self.flushers.get(plugin_type) {
            Some(factory) => factory.create(params, ctx),
            None => Err(PipelineError::config(
                ctx.name(),
                format!("unknown flusher type '{plugin_type}'"),
            )),
        }
    }

    pub fn has_input(&self, plugin_type: &str) -> bool {
        self.inputs.contains_key(plugin_type)
    }

    pub fn has_flusher(&self, plugin_type: &str) -> bool {
        self.flushers.contains_key(plugin_type)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with every built-in plugin registered
pub fn default_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register_input(MockInputFactory);
    registry.register_processor(NoopProcessorFactory);
    registry.register_processor(TagProcessorFactory);
    registry.register_flusher(StdoutFlusherFactory);
    registry.register_flusher(NullFlusherFactory);
    registry
}
