//! CollectionPipeline - one configured ingest-transform-egress unit
//!
//! Lifecycle: `Initialized → Running → Stopping → Stopped`. Construction
//! is `init`: plugins are built through the registry, queues are created
//! and wired, and any failure aborts this pipeline without touching the
//! registries beyond keys already minted.
//!
//! The in-flight discipline is what makes reload sound: the process queue
//! increments the counter under its own lock before an item surfaces, and
//! the worker decrements only after the item landed in every target
//! sender queue, so a `stop` that observes zero has no item in transit.

use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;

use conduit_config::PipelineConfig;
use conduit_model::EventGroup;
use conduit_queue::{
    ConcurrencyLimiter, InFlightCounter, PushResult, QueueKey, RangeCheckpoint, SenderQueueItem,
    SenderTarget, MAX_EXACTLY_ONCE_CONCURRENCY,
};

use crate::context::{PipelineContext, QueueContext};
use crate::error::{PipelineError, Result};
use crate::metrics::PipelineMetrics;
use crate::plugin::{
    FlusherInstance, InputCollector, InputInstance, PluginMeta, PluginRegistry, ProcessorInstance,
};
use crate::router::Router;

const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 10;
const DRAIN_WARN_INTERVAL: Duration = Duration::from_secs(1);
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Pipeline lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Initialized = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => PipelineState::Initialized,
            1 => PipelineState::Running,
            2 => PipelineState::Stopping,
            _ => PipelineState::Stopped,
        }
    }
}

/// The assembled pipeline object
pub struct CollectionPipeline {
    name: String,
    config: PipelineConfig,
    context: Arc<PipelineContext>,
    queues: QueueContext,
    queue_key: QueueKey,
    inputs: Vec<InputInstance>,
    processors: Vec<ProcessorInstance>,
    flushers: Vec<Arc<FlusherInstance>>,
    router: Router,
    plugin_id: AtomicU16,
    in_flight: Arc<InFlightCounter>,
    state: AtomicU8,
    metrics: PipelineMetrics,
    exactly_once: usize,
    drain_timeout: Duration,
}

impl CollectionPipeline {
    /// Build the pipeline from a validated config
    ///
    /// Plugin construction happens before any queue is created, so a
    /// refused plugin leaves the registries untouched. Queue creation is
    /// idempotent per key, which is what lets a reload recover preserved
    /// state (exactly-once checkpoints among it).
    pub fn init(
        config: PipelineConfig,
        queues: &QueueContext,
        registry: &PluginRegistry,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| PipelineError::config(&config.name, e.to_string()))?;

        let name = config.name.clone();
        let queue_key = queues.key_manager.get_key(&name);
        let in_flight = Arc::new(InFlightCounter::new(&name));
        let context = Arc::new(PipelineContext::new(
            &name,
            queue_key,
            config.global.clone(),
            Arc::clone(&in_flight),
        ));

        let plugin_id = AtomicU16::new(0);
        let next_meta = || PluginMeta {
            plugin_id: plugin_id.fetch_add(1, Ordering::Relaxed) + 1,
        };

        let exactly_once = config
            .exactly_once_concurrency()
            .min(MAX_EXACTLY_ONCE_CONCURRENCY);

        let mut inputs = Vec::with_capacity(config.inputs.len());
        for input_config in &config.inputs {
            let plugin =
                registry.create_input(&input_config.plugin_type, &input_config.params, &context)?;
            inputs.push(InputInstance::new(plugin, next_meta()));
        }

        let mut processors = Vec::with_capacity(config.processors.len());
        for processor_config in &config.processors {
            let plugin = registry.create_processor(
                &processor_config.plugin_type,
                &processor_config.params,
                &context,
            )?;
            processors.push(ProcessorInstance::new(plugin, next_meta()));
        }

        let mut flushers = Vec::with_capacity(config.flushers.len());
        for (index, flusher_config) in config.flushers.iter().enumerate() {
            let plugin = registry.create_flusher(
                &flusher_config.plugin_type,
                &flusher_config.params,
                &context,
            )?;
            // Exactly-once flows share the pipeline's slot queue; ordinary
            // flushers each own a sender queue.
            let flusher_queue_key = if exactly_once > 0 {
                queue_key
            } else {
                queues.key_manager.get_key(&format!(
                    "{name}/flusher/{index}/{}",
                    flusher_config.plugin_type
                ))
            };
            flushers.push(Arc::new(FlusherInstance::new(
                plugin,
                next_meta(),
                flusher_queue_key,
            )));
        }

        let router = Router::init(&name, config.route.as_deref(), flushers.len())?;

        // All plugins built; create and wire the queues.
        let priority = config.global.priority;
        if exactly_once > 0 {
            let checkpoints: Vec<Arc<RangeCheckpoint>> = (0..exactly_once)
                .map(|index| {
                    Arc::new(RangeCheckpoint::new(
                        index,
                        format!("{name}-range-{index}"),
                        0,
                        queue_key,
                    ))
                })
                .collect();
            queues
                .exactly_once
                .create_or_update_queue(queue_key, priority, checkpoints, Arc::clone(&in_flight))
                .map_err(|e| PipelineError::config(&name, e.to_string()))?;
            queues.exactly_once.set_sender_queue_feedbacks(
                queue_key,
                vec![conduit_queue::ProcessQueueManager::notifier(
                    &queues.process_queues,
                )],
            );
        } else {
            queues
                .process_queues
                .create_or_update_bounded_queue(
                    queue_key,
                    priority,
                    queues.process_queues.default_param(),
                    Arc::clone(&in_flight),
                )
                .map_err(|e| PipelineError::config(&name, e.to_string()))?;

            let mut downstream = Vec::with_capacity(flushers.len());
            for (index, instance) in flushers.iter().enumerate() {
                let flusher_config = &config.flushers[index];
                let max_rate = flusher_config.param_u64("MaxSendRate").map(|v| v as u32);
                let limiters = match flusher_config.param_u64("MaxConcurrency") {
                    Some(max) => vec![Arc::new(ConcurrencyLimiter::new(
                        format!("{name}/{}", flusher_config.plugin_type),
                        max as u32,
                    ))],
                    None => Vec::new(),
                };
                let flusher_key = instance.queue_key();
                queues.sender_queues.reuse_queue(flusher_key);
                queues.sender_queues.create_queue(
                    flusher_key,
                    &flusher_config.plugin_type,
                    limiters,
                    max_rate,
                );
                queues.sender_queues.set_up_stream_feedbacks(
                    flusher_key,
                    vec![conduit_queue::ProcessQueueManager::notifier(
                        &queues.process_queues,
                    )],
                );
                let gate = queues.sender_queues.queue_interface(flusher_key).ok_or_else(|| {
                    PipelineError::Internal(format!("sender queue {flusher_key} vanished during init"))
                })?;
                downstream.push(gate);
            }
            queues
                .process_queues
                .set_down_stream_queues(queue_key, downstream);
        }

        let drain_timeout = Duration::from_secs(
            config
                .global
                .drain_timeout_secs
                .unwrap_or(DEFAULT_DRAIN_TIMEOUT_SECS),
        );

        tracing::info!(
            pipeline = %name,
            inputs = inputs.len(),
            processors = processors.len(),
            flushers = flushers.len(),
            exactly_once = exactly_once,
            "pipeline initialized"
        );

        Ok(Self {
            name,
            config,
            context,
            queues: queues.clone(),
            queue_key,
            inputs,
            processors,
            flushers,
            router,
            plugin_id,
            in_flight,
            state: AtomicU8::new(PipelineState::Initialized as u8),
            metrics: PipelineMetrics::new(),
            exactly_once,
            drain_timeout,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    #[inline]
    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.context
    }

    #[inline]
    pub fn queue_key(&self) -> QueueKey {
        self.queue_key
    }

    #[inline]
    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    #[inline]
    pub fn flushers(&self) -> &[Arc<FlusherInstance>] {
        &self.flushers
    }

    /// Next monotonically increasing plugin identity
    pub fn gen_next_plugin_meta(&self) -> PluginMeta {
        PluginMeta {
            plugin_id: self.plugin_id.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }

    pub fn add_in_process_cnt(&self) {
        self.in_flight.add();
    }

    /// Call after the item has been pushed to every target sender queue
    pub fn sub_in_process_cnt(&self) {
        self.in_flight.sub();
    }

    #[inline]
    pub fn in_process_cnt(&self) -> i64 {
        self.in_flight.get()
    }

    /// Enable pop, start flushers, then inputs; idempotent
    pub fn start(&self) {
        if self
            .state
            .compare_exchange(
                PipelineState::Initialized as u8,
                PipelineState::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }
        self.context.set_stopping(false);

        for flusher in &self.flushers {
            flusher.plugin().start();
        }
        // Take over the in-flight binding from any predecessor before the
        // first pop can happen.
        self.queues
            .process_queues
            .set_in_flight(self.queue_key, Arc::clone(&self.in_flight));
        self.queues.process_queues.enable_pop(self.queue_key);
        for (index, input) in self.inputs.iter().enumerate() {
            let collector = InputCollector::new(
                self.queue_key,
                index,
                Arc::clone(&self.queues.process_queues),
            );
            if let Err(error) = input.plugin().start(collector) {
                tracing::error!(
                    pipeline = %self.name,
                    input = input.plugin().name(),
                    %error,
                    "input failed to start"
                );
            }
        }
        tracing::info!(pipeline = %self.name, "pipeline started");
    }

    /// Run the processor chain synchronously on the caller's thread
    pub fn process(&self, groups: &mut Vec<EventGroup>, input_index: usize) {
        let events: u64 = groups.iter().map(|g| g.len() as u64).sum();
        let bytes: u64 = groups.iter().map(|g| g.data_size() as u64).sum();
        self.metrics
            .record_process_input(events, groups.len() as u64, bytes);

        let start = Instant::now();
        for processor in &self.processors {
            processor.plugin().process(groups);
        }
        self.metrics.record_process_time(start.elapsed());
        tracing::trace!(
            pipeline = %self.name,
            input_index,
            groups = groups.len(),
            "processor chain ran"
        );
    }

    /// Route and enqueue serialized groups; `false` on any refusal
    pub fn send(&self, groups: Vec<EventGroup>) -> bool {
        let mut all_accepted = true;
        for group in groups {
            for (flusher_index, routed) in self.router.route(group) {
                let instance = &self.flushers[flusher_index];
                self.metrics
                    .record_flusher_input(routed.len() as u64, routed.data_size() as u64);
                if !self.send_to_flusher(instance, &routed) {
                    all_accepted = false;
                }
            }
        }
        all_accepted
    }

    fn send_to_flusher(&self, instance: &Arc<FlusherInstance>, group: &EventGroup) -> bool {
        let data = instance.plugin().serialize(group);
        let raw_size = group.data_size();
        if self.exactly_once > 0 {
            self.send_exactly_once(instance, data, raw_size)
        } else {
            let item = Arc::new(SenderQueueItem::new(
                data,
                raw_size,
                Arc::clone(instance) as Arc<dyn SenderTarget>,
                instance.queue_key(),
            ));
            match self
                .queues
                .sender_queues
                .push_queue(instance.queue_key(), item)
            {
                PushResult::Ok => true,
                PushResult::QueueFull => {
                    self.metrics.record_send_rejection();
                    false
                }
                PushResult::QueueNotFound => {
                    tracing::error!(
                        pipeline = %self.name,
                        flusher = instance.plugin().name(),
                        key = %instance.queue_key(),
                        "sender queue not found, dropping group"
                    );
                    false
                }
            }
        }
    }

    /// Bind the item to the first free range slot
    fn send_exactly_once(
        &self,
        instance: &Arc<FlusherInstance>,
        data: Bytes,
        raw_size: usize,
    ) -> bool {
        let checkpoints = self
            .queues
            .exactly_once
            .checkpoints(self.queue_key)
            .unwrap_or_default();
        for checkpoint in checkpoints {
            let item = Arc::new(
                SenderQueueItem::new(
                    data.clone(),
                    raw_size,
                    Arc::clone(instance) as Arc<dyn SenderTarget>,
                    self.queue_key,
                )
                .with_checkpoint(checkpoint),
            );
            match self.queues.sender_queues.push_queue(self.queue_key, item) {
                PushResult::Ok => return true,
                PushResult::QueueFull => continue,
                PushResult::QueueNotFound => break,
            }
        }
        self.metrics.record_send_rejection();
        false
    }

    /// Stop producing, drain in-flight work, stop flushers
    ///
    /// `is_removing = false` (reload) preserves external registrations,
    /// the exactly-once checkpoints among them; `true` releases
    /// everything this pipeline registered.
    pub fn stop(&self, is_removing: bool) {
        let previous = self.state.swap(PipelineState::Stopping as u8, Ordering::AcqRel);
        if previous == PipelineState::Stopped as u8 {
            self.state
                .store(PipelineState::Stopped as u8, Ordering::Release);
            return;
        }
        self.context.set_stopping(true);
        self.queues.process_queues.disable_pop(self.queue_key);

        for input in &self.inputs {
            input.plugin().stop(is_removing);
        }

        self.wait_all_items_in_process_finished();

        for flusher in &self.flushers {
            flusher.plugin().flush();
            flusher.plugin().stop(is_removing);
        }

        if is_removing {
            if self.exactly_once > 0 {
                self.queues.exactly_once.delete_queue(self.queue_key);
            } else {
                self.queues.process_queues.delete_queue(self.queue_key);
                for flusher in &self.flushers {
                    self.queues.sender_queues.delete_queue(flusher.queue_key());
                }
            }
        }

        self.state
            .store(PipelineState::Stopped as u8, Ordering::Release);
        tracing::info!(pipeline = %self.name, is_removing, "pipeline stopped");
    }

    /// Bounded wait for the in-flight count to reach zero
    ///
    /// Escalates to warnings while waiting and proceeds after the drain
    /// budget; in-flight items are then the flushers' retry problem, never
    /// force-aborted.
    fn wait_all_items_in_process_finished(&self) {
        let deadline = Instant::now() + self.drain_timeout;
        let mut last_warn = Instant::now();
        while self.in_flight.get() > 0 {
            if Instant::now() >= deadline {
                tracing::warn!(
                    pipeline = %self.name,
                    in_flight = self.in_flight.get(),
                    "drain budget exhausted, proceeding with items in flight"
                );
                break;
            }
            if last_warn.elapsed() >= DRAIN_WARN_INTERVAL {
                tracing::warn!(
                    pipeline = %self.name,
                    in_flight = self.in_flight.get(),
                    "waiting for in-flight items to finish"
                );
                last_warn = Instant::now();
            }
            std::thread::sleep(DRAIN_POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;
