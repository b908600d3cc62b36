//! Conduit - Configuration
//!
//! JSON pipeline configuration: plugin arrays, routing table, global
//! knobs, plus the diffing used by coordinated reloads.
//!
//! Configs are validated structurally here; plugin-specific validation
//! (unknown types, malformed conditions) happens at pipeline init so a
//! bad plugin aborts only its own pipeline.

mod compression;
mod diff;
mod error;
mod input_ebpf;
mod input_file;
mod input_prometheus;
mod pipeline;

pub use compression::{CompressType, CompressionParams};
pub use diff::ConfigDiff;
pub use error::{ConfigError, Result};
pub use input_ebpf::{EbpfSecurityParams, NetworkAddrFilter, SecurityProbeConfig};
pub use input_file::{FileInputParams, MultilineConfig};
pub use input_prometheus::{PrometheusInputParams, ScrapeConfig};
pub use pipeline::{GlobalConfig, PipelineConfig, PluginConfig, RouteEntry};
