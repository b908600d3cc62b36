//! AgentRuntime - the process lifecycle object
//!
//! Owns the process-wide singletons as an explicit value, constructed in
//! dependency order and torn down in reverse after all pipelines have
//! stopped: queue registries first, the plugin registry, then the
//! pipeline registry on top. Spawns the two worker cohorts:
//!
//! - processor threads park on the process-queue condvar, pop fairly
//!   across all pipelines, run the processor chain, and route;
//! - sender threads park on the sender-queue condvar, drain available
//!   items within each queue's policies, and drive flusher transport
//!   with retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use conduit_config::{ConfigDiff, PipelineConfig};
use conduit_pipeline::{
    default_registry, CollectionPipelineManager, PluginRegistry, QueueContext,
};
use conduit_queue::{CheckpointStore, InMemoryCheckpointStore, SenderTarget};

const WORKER_WAIT: Duration = Duration::from_millis(200);

/// Worker cohort sizing and shutdown budget
#[derive(Debug, Clone)]
pub struct RuntimeOptions {
    pub processor_threads: usize,
    pub sender_threads: usize,
    /// Bound on waiting for sender queues to empty at shutdown
    pub shutdown_drain_secs: u64,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            processor_threads: 2,
            sender_threads: 2,
            shutdown_drain_secs: 10,
        }
    }
}

/// The top-level runtime value owning registries and worker threads
pub struct AgentRuntime {
    queues: QueueContext,
    pipeline_manager: Arc<CollectionPipelineManager>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    options: RuntimeOptions,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AgentRuntime {
    pub fn new(options: RuntimeOptions) -> Self {
        Self::with_registry(options, default_registry())
    }

    /// Bring up the runtime with a custom plugin registry
    pub fn with_registry(options: RuntimeOptions, registry: PluginRegistry) -> Self {
        let queues = QueueContext::new();
        let pipeline_manager = Arc::new(CollectionPipelineManager::new(
            queues.clone(),
            Arc::new(registry),
        ));
        Self {
            queues,
            pipeline_manager,
            checkpoint_store: Arc::new(InMemoryCheckpointStore::new()),
            options,
            shutdown: Arc::new(AtomicBool::new(false)),
            workers: Mutex::new(Vec::new()),
        }
    }

    #[inline]
    pub fn queues(&self) -> &QueueContext {
        &self.queues
    }

    #[inline]
    pub fn pipeline_manager(&self) -> &Arc<CollectionPipelineManager> {
        &self.pipeline_manager
    }

    /// Reconcile the full desired config set against the running one
    pub fn apply_configs(&self, configs: Vec<PipelineConfig>) {
        let diff = ConfigDiff::compute(&self.pipeline_manager.current_configs(), configs);
        if diff.is_empty() {
            tracing::debug!("config set unchanged");
            return;
        }
        tracing::info!(
            added = diff.added.len(),
            modified = diff.modified.len(),
            removed = diff.removed.len(),
            "applying config diff"
        );
        self.pipeline_manager.update_configs(diff);
    }

    /// Spawn the worker cohorts; idempotent per runtime
    pub fn start(&self) {
        let mut workers = self.workers.lock();
        if !workers.is_empty() {
            return;
        }
        for worker_id in 0..self.options.processor_threads {
            let queues = self.queues.clone();
            let manager = Arc::clone(&self.pipeline_manager);
            let shutdown = Arc::clone(&self.shutdown);
            workers.push(
                std::thread::Builder::new()
                    .name(format!("processor-{worker_id}"))
                    .spawn(move || processor_loop(queues, manager, shutdown))
                    .expect("spawn processor worker"),
            );
        }
        for worker_id in 0..self.options.sender_threads {
            let queues = self.queues.clone();
            let store = Arc::clone(&self.checkpoint_store);
            let shutdown = Arc::clone(&self.shutdown);
            workers.push(
                std::thread::Builder::new()
                    .name(format!("sender-{worker_id}"))
                    .spawn(move || sender_loop(queues, store, shutdown))
                    .expect("spawn sender worker"),
            );
        }
        tracing::info!(
            processor_threads = self.options.processor_threads,
            sender_threads = self.options.sender_threads,
            "worker cohorts started"
        );
    }

    /// Stop pipelines, drain outbound work, join workers, GC registries
    pub fn shutdown(&self) {
        tracing::info!("runtime shutting down");
        self.pipeline_manager.stop_all_pipelines();

        let deadline = Instant::now() + Duration::from_secs(self.options.shutdown_drain_secs);
        while !self.queues.sender_queues.is_all_queue_empty() {
            if Instant::now() >= deadline {
                tracing::warn!("shutdown drain budget exhausted, sender queues not empty");
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }

        self.shutdown.store(true, Ordering::Release);
        self.queues.process_queues.trigger();
        self.queues.sender_queues.trigger();
        for worker in self.workers.lock().drain(..) {
            let _ = worker.join();
        }

        self.queues.process_queues.clear_unused_queues();
        self.queues.sender_queues.clear_unused_queues();
        self.queues.exactly_once.clear_unused_queues();
        tracing::info!("runtime stopped");
    }
}

fn processor_loop(
    queues: QueueContext,
    manager: Arc<CollectionPipelineManager>,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        match queues.process_queues.pop_item() {
            Some((item, pipeline_name)) => {
                let pipeline = match manager.find_pipeline_by_name(&pipeline_name) {
                    Some(p) => p,
                    None => {
                        // Raced a removal past its drain; nothing left to
                        // account against.
                        tracing::warn!(pipeline = %pipeline_name, "pipeline gone, dropping item");
                        continue;
                    }
                };
                let mut groups = vec![item.group];
                pipeline.process(&mut groups, item.input_index);
                if !pipeline.send(groups) {
                    tracing::debug!(
                        pipeline = %pipeline_name,
                        "sender queue refused routed groups"
                    );
                }
                pipeline.sub_in_process_cnt();
            }
            None => {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                queues.process_queues.wait_for_item(WORKER_WAIT);
            }
        }
    }
}

fn sender_loop(queues: QueueContext, store: Arc<dyn CheckpointStore>, shutdown: Arc<AtomicBool>) {
    loop {
        let mut items = Vec::new();
        queues.sender_queues.get_available_items(&mut items, -1);
        if items.is_empty() {
            if shutdown.load(Ordering::Acquire) {
                break;
            }
            queues.sender_queues.wait_for_items(WORKER_WAIT);
            continue;
        }
        for item in items {
            if item.target.send(item.as_ref()) {
                queues.sender_queues.remove_item(item.queue_key, &item);
                if let Some(checkpoint) = &item.checkpoint {
                    // The slot advanced its sequence on removal; persist
                    // the new value through the side-channel.
                    store.set(&checkpoint.hash_key, checkpoint.sequence_id());
                }
            } else {
                tracing::warn!(
                    flusher = item.target.name(),
                    attempts = item.attempt_count(),
                    "send failed, item returned for retry"
                );
                queues.sender_queues.on_item_failed(item.queue_key, &item);
            }
        }
    }
}

#[cfg(test)]
#[path = "runtime_test.rs"]
mod tests;
