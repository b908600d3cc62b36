//! CollectionPipelineManager - the registry of live pipelines
//!
//! Reconciles config diffs into pipeline lifecycles. The reload protocol
//! is build-before-tear-down: a replacement pipeline is initialized to
//! completion before the old one stops, so a config name present before
//! and after a reload never has an empty window, and an init failure
//! leaves the old pipeline running untouched.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use conduit_config::{ConfigDiff, PipelineConfig};

use crate::context::QueueContext;
use crate::pipeline::CollectionPipeline;
use crate::plugin::PluginRegistry;

/// Owner of every running pipeline
pub struct CollectionPipelineManager {
    queues: QueueContext,
    registry: Arc<PluginRegistry>,
    pipelines: RwLock<HashMap<String, Arc<CollectionPipeline>>>,
}

impl CollectionPipelineManager {
    pub fn new(queues: QueueContext, registry: Arc<PluginRegistry>) -> Self {
        Self {
            queues,
            registry,
            pipelines: RwLock::new(HashMap::new()),
        }
    }

    /// Atomic per-name reconciliation of one config diff
    ///
    /// - added: init then start; an init failure discards the config.
    /// - removed: `stop(true)` and detach; registrations are released.
    /// - modified: init the replacement first; only on success does the
    ///   old pipeline `stop(false)` (preserving checkpoints) before the
    ///   new one starts and recovers them.
    pub fn update_configs(&self, diff: ConfigDiff) {
        for name in &diff.removed {
            let pipeline = self.pipelines.read().get(name).cloned();
            match pipeline {
                Some(pipeline) => {
                    // Stop while still registered so workers draining the
                    // process queue can resolve the pipeline by name.
                    pipeline.stop(true);
                    self.pipelines.write().remove(name);
                    tracing::info!(pipeline = %name, "pipeline removed");
                }
                None => {
                    tracing::warn!(pipeline = %name, "removal requested for unknown pipeline");
                }
            }
        }

        for config in diff.modified {
            let name = config.name.clone();
            match CollectionPipeline::init(config, &self.queues, &self.registry) {
                Ok(replacement) => {
                    let replacement = Arc::new(replacement);
                    let old = self.pipelines.read().get(&name).cloned();
                    if let Some(old) = old {
                        old.stop(false);
                    }
                    // Registered before start so workers can resolve it
                    // the moment its first item pops.
                    self.pipelines
                        .write()
                        .insert(name.clone(), Arc::clone(&replacement));
                    replacement.start();
                    tracing::info!(pipeline = %name, "pipeline updated");
                }
                Err(error) => {
                    tracing::error!(
                        pipeline = %name,
                        %error,
                        "replacement pipeline failed to init, keeping the running one"
                    );
                }
            }
        }

        for config in diff.added {
            let name = config.name.clone();
            match CollectionPipeline::init(config, &self.queues, &self.registry) {
                Ok(pipeline) => {
                    let pipeline = Arc::new(pipeline);
                    self.pipelines
                        .write()
                        .insert(name.clone(), Arc::clone(&pipeline));
                    pipeline.start();
                    tracing::info!(pipeline = %name, "pipeline added");
                }
                Err(error) => {
                    tracing::error!(pipeline = %name, %error, "pipeline failed to init");
                }
            }
        }
    }

    pub fn find_pipeline_by_name(&self, name: &str) -> Option<Arc<CollectionPipeline>> {
        self.pipelines.read().get(name).cloned()
    }

    /// Config bodies of the running pipelines, for reload diffing
    pub fn current_configs(&self) -> HashMap<String, PipelineConfig> {
        self.pipelines
            .read()
            .iter()
            .map(|(name, pipeline)| (name.clone(), pipeline.config().clone()))
            .collect()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.read().len()
    }

    pub fn pipeline_names(&self) -> Vec<String> {
        self.pipelines.read().keys().cloned().collect()
    }

    /// Stop every pipeline, preserving checkpoints (process exit path)
    pub fn stop_all_pipelines(&self) {
        let pipelines: Vec<Arc<CollectionPipeline>> =
            self.pipelines.read().values().cloned().collect();
        for pipeline in pipelines {
            pipeline.stop(false);
        }
        self.pipelines.write().clear();
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
