//! Pipeline configuration
//!
//! A pipeline config is one JSON object: plugin arrays (`inputs`,
//! `processors`, `flushers`), an optional `route` table, and pipeline-level
//! `global` knobs. Plugin blocks keep their parameters as raw JSON; the
//! plugin factory interprets them.
//!
//! # Example
//!
//! ```json
//! {
//!   "inputs": [
//!     { "Type": "input_file", "FilePaths": ["/var/log/app/*.log"], "EnableExactlyOnce": 2 }
//!   ],
//!   "processors": [
//!     { "Type": "processor_noop" }
//!   ],
//!   "flushers": [
//!     { "Type": "flusher_stdout" }
//!   ],
//!   "route": [
//!     { "Condition": { "Type": "event_type", "Value": "log" }, "FlusherIndex": 0 }
//!   ],
//!   "global": { "EnableTimestampNanosecond": true, "Priority": 1 }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result};

/// One plugin block: a type name plus opaque parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin type name, resolved through the plugin registry
    #[serde(rename = "Type")]
    pub plugin_type: String,

    /// Remaining parameters, handed to the plugin factory untouched
    #[serde(flatten)]
    pub params: serde_json::Map<String, Value>,
}

impl PluginConfig {
    pub fn new(plugin_type: impl Into<String>) -> Self {
        Self {
            plugin_type: plugin_type.into(),
            params: serde_json::Map::new(),
        }
    }

    /// Typed lookup of a single parameter
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Integer parameter, when present and integral
    pub fn param_u64(&self, name: &str) -> Option<u64> {
        self.params.get(name).and_then(Value::as_u64)
    }
}

/// One `route` table entry
///
/// The condition is kept as raw JSON on purpose: the router validates it
/// at pipeline init, so a malformed condition fails the pipeline rather
/// than the config load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEntry {
    #[serde(rename = "Condition")]
    pub condition: Value,

    #[serde(rename = "FlusherIndex")]
    pub flusher_index: usize,
}

/// Pipeline-level knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Where the group topic tag comes from
    #[serde(rename = "TopicType")]
    pub topic_type: Option<String>,

    /// Carry nanosecond timestamps on events
    #[serde(rename = "EnableTimestampNanosecond")]
    pub enable_timestamp_nanosecond: bool,

    /// Process queue scheduling priority; lower pops first
    #[serde(rename = "Priority")]
    pub priority: u32,

    /// Bound on the stop-time drain wait, in seconds
    #[serde(rename = "DrainTimeoutSecs")]
    pub drain_timeout_secs: Option<u64>,
}

/// A complete pipeline definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Config name; assigned from the file name, not the JSON body
    #[serde(skip)]
    pub name: String,

    pub inputs: Vec<PluginConfig>,

    #[serde(default)]
    pub processors: Vec<PluginConfig>,

    pub flushers: Vec<PluginConfig>,

    /// Absent means "every group goes to all flushers"
    #[serde(default)]
    pub route: Option<Vec<RouteEntry>>,

    #[serde(default)]
    pub global: GlobalConfig,
}

impl PipelineConfig {
    /// Parse and validate one config body
    pub fn from_json(name: &str, body: &str) -> Result<Self> {
        let mut config: PipelineConfig =
            serde_json::from_str(body).map_err(|source| ConfigError::ParseError {
                name: name.to_string(),
                source,
            })?;
        config.name = name.to_string();
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that do not need the plugin registry
    pub fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(ConfigError::MissingSection {
                name: self.name.clone(),
                section: "inputs",
            });
        }
        if self.flushers.is_empty() {
            return Err(ConfigError::MissingSection {
                name: self.name.clone(),
                section: "flushers",
            });
        }
        for input in &self.inputs {
            if input.plugin_type.is_empty() {
                return Err(ConfigError::InvalidValue {
                    name: self.name.clone(),
                    field: "inputs",
                    message: "plugin Type must not be empty".into(),
                });
            }
        }
        if let Some(route) = &self.route {
            for (entry_index, entry) in route.iter().enumerate() {
                if entry.flusher_index >= self.flushers.len() {
                    return Err(ConfigError::RouteIndexOutOfRange {
                        name: self.name.clone(),
                        entry: entry_index,
                        index: entry.flusher_index,
                        count: self.flushers.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The configured exactly-once range concurrency, zero when disabled
    ///
    /// Read from the first input carrying `EnableExactlyOnce`; the runtime
    /// caps the value.
    pub fn exactly_once_concurrency(&self) -> usize {
        self.inputs
            .iter()
            .find_map(|input| input.param_u64("EnableExactlyOnce"))
            .unwrap_or(0) as usize
    }
}
