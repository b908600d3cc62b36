//! Conduit - Pipeline
//!
//! The pipeline layer: plugin model, router, lifecycle, and the
//! reload-capable registry of live pipelines.
//!
//! # Architecture
//!
//! ```text
//! [Inputs]          [Processor cohort]           [Sender cohort]
//!    │ push               │ pop                       │ drain
//!    ▼                    ▼                           ▼
//! process queue ──→ processor chain ──→ Router ──→ sender queue(s) ──→ Flusher
//!   (per pipeline)    (synchronous)    (conditions)  (per flusher)
//! ```
//!
//! # Key Design
//!
//! - **Config-driven plugins**: inputs, processors, and flushers are
//!   closed sets created through [`PluginRegistry`] factories.
//! - **Build-before-tear-down reload**: [`CollectionPipelineManager`]
//!   initializes a replacement pipeline completely before stopping the
//!   old one, so reloads never open an ingestion gap.
//! - **Drain-aware stop**: `stop` disables pop, stops inputs, and waits
//!   for the in-flight count to return to zero before flushers go down.

mod condition;
mod context;
mod error;
mod manager;
mod metrics;
mod pipeline;
pub mod plugin;
mod router;

pub use condition::{Condition, EventTypeCondition, TagCondition};
pub use context::{PipelineContext, QueueContext};
pub use error::{PipelineError, Result};
pub use manager::CollectionPipelineManager;
pub use metrics::{PipelineMetrics, PipelineMetricsSnapshot};
pub use pipeline::{CollectionPipeline, PipelineState};
pub use plugin::{default_registry, PluginRegistry};
pub use router::Router;
