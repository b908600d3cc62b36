//! Pipeline context and the shared queue-registry handles

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use conduit_config::GlobalConfig;
use conduit_queue::{
    ExactlyOnceQueueManager, InFlightCounter, ProcessQueueManager, QueueKey, QueueKeyManager,
    SenderQueueManager,
};

/// Handles to the process-wide queue registries
///
/// Owned by the runtime and cloned into every pipeline; the registries
/// themselves are the singletons, this is just the bundle of references.
#[derive(Clone)]
pub struct QueueContext {
    pub key_manager: Arc<QueueKeyManager>,
    pub process_queues: Arc<ProcessQueueManager>,
    pub sender_queues: Arc<SenderQueueManager>,
    pub exactly_once: Arc<ExactlyOnceQueueManager>,
}

impl QueueContext {
    /// Wire up a fresh registry set, in dependency order
    pub fn new() -> Self {
        let key_manager = Arc::new(QueueKeyManager::new());
        let exactly_once = Arc::new(ExactlyOnceQueueManager::new());
        let process_queues = Arc::new(ProcessQueueManager::new(
            Arc::clone(&key_manager),
            Some(Arc::clone(&exactly_once)),
        ));
        let sender_queues = Arc::new(SenderQueueManager::new(
            Arc::clone(&key_manager),
            Some(Arc::clone(&exactly_once)),
        ));
        Self {
            key_manager,
            process_queues,
            sender_queues,
            exactly_once,
        }
    }
}

impl Default for QueueContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-pipeline state shared immutably across its threads after init
///
/// Post-init mutation is limited to the designated atomics.
pub struct PipelineContext {
    name: String,
    process_queue_key: QueueKey,
    global: GlobalConfig,
    in_flight: Arc<InFlightCounter>,
    stopping: AtomicBool,
}

impl PipelineContext {
    pub fn new(
        name: impl Into<String>,
        process_queue_key: QueueKey,
        global: GlobalConfig,
        in_flight: Arc<InFlightCounter>,
    ) -> Self {
        Self {
            name: name.into(),
            process_queue_key,
            global,
            in_flight,
            stopping: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn process_queue_key(&self) -> QueueKey {
        self.process_queue_key
    }

    #[inline]
    pub fn global(&self) -> &GlobalConfig {
        &self.global
    }

    #[inline]
    pub fn in_flight(&self) -> &Arc<InFlightCounter> {
        &self.in_flight
    }

    /// Inputs poll this to stop producing cooperatively
    #[inline]
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    pub(crate) fn set_stopping(&self, stopping: bool) {
        self.stopping.store(stopping, Ordering::Release);
    }
}
