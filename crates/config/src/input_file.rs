//! Typed view of the file-input parameter block
//!
//! The file input itself lives behind the `Input` trait; these types exist
//! because the runtime reads `EnableExactlyOnce` and validation wants to
//! catch malformed multiline settings before a pipeline starts.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::pipeline::PluginConfig;

/// Multiline assembly settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultilineConfig {
    /// `custom` (pattern-driven) or `JSON`
    #[serde(rename = "Mode")]
    pub mode: String,

    #[serde(rename = "StartPattern")]
    pub start_pattern: Option<String>,

    #[serde(rename = "ContinuePattern")]
    pub continue_pattern: Option<String>,

    #[serde(rename = "EndPattern")]
    pub end_pattern: Option<String>,

    /// `single_line` or `discard`
    #[serde(rename = "UnmatchedContentTreatment")]
    pub unmatched_content_treatment: String,

    #[serde(rename = "IgnoringUnmatchWarning")]
    pub ignoring_unmatch_warning: bool,
}

impl Default for MultilineConfig {
    fn default() -> Self {
        Self {
            mode: "custom".into(),
            start_pattern: None,
            continue_pattern: None,
            end_pattern: None,
            unmatched_content_treatment: "single_line".into(),
            ignoring_unmatch_warning: false,
        }
    }
}

impl MultilineConfig {
    fn validate(&self, config_name: &str) -> Result<()> {
        match self.mode.as_str() {
            "custom" => {
                if self.start_pattern.is_none()
                    && self.continue_pattern.is_none()
                    && self.end_pattern.is_none()
                {
                    return Err(ConfigError::InvalidValue {
                        name: config_name.to_string(),
                        field: "Multiline",
                        message: "custom mode requires at least one pattern".into(),
                    });
                }
            }
            "JSON" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    name: config_name.to_string(),
                    field: "Multiline.Mode",
                    message: format!("unknown mode '{other}'"),
                });
            }
        }
        match self.unmatched_content_treatment.as_str() {
            "single_line" | "discard" => Ok(()),
            other => Err(ConfigError::InvalidValue {
                name: config_name.to_string(),
                field: "Multiline.UnmatchedContentTreatment",
                message: format!("unknown treatment '{other}'"),
            }),
        }
    }
}

/// Recognized parameters of the `input_file` plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileInputParams {
    #[serde(rename = "FilePaths")]
    pub file_paths: Vec<String>,

    #[serde(rename = "EnableContainerDiscovery")]
    pub enable_container_discovery: bool,

    #[serde(rename = "MaxCheckpointDirSearchDepth")]
    pub max_checkpoint_dir_search_depth: u32,

    #[serde(rename = "Multiline")]
    pub multiline: Option<MultilineConfig>,

    /// Exactly-once range concurrency; zero disables the feature
    #[serde(rename = "EnableExactlyOnce")]
    pub enable_exactly_once: usize,
}

impl FileInputParams {
    /// Extract and validate from an `input_file` plugin block
    pub fn from_plugin(config_name: &str, plugin: &PluginConfig) -> Result<Self> {
        let value = serde_json::Value::Object(plugin.params.clone());
        let params: FileInputParams =
            serde_json::from_value(value).map_err(|source| ConfigError::ParseError {
                name: config_name.to_string(),
                source,
            })?;
        if params.file_paths.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: config_name.to_string(),
                field: "FilePaths",
                message: "at least one path is required".into(),
            });
        }
        if let Some(multiline) = &params.multiline {
            multiline.validate(config_name)?;
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;

    fn file_input(body: &str) -> PluginConfig {
        let config = PipelineConfig::from_json(
            "t",
            &format!(
                r#"{{ "inputs": [{body}], "flushers": [{{ "Type": "flusher_null" }}] }}"#
            ),
        )
        .unwrap();
        config.inputs[0].clone()
    }

    #[test]
    fn parses_recognized_options() {
        let plugin = file_input(
            r#"{
                "Type": "input_file",
                "FilePaths": ["/var/log/a.log"],
                "EnableContainerDiscovery": true,
                "MaxCheckpointDirSearchDepth": 3,
                "Multiline": { "Mode": "custom", "StartPattern": "^\\d{4}" },
                "EnableExactlyOnce": 4
            }"#,
        );
        let params = FileInputParams::from_plugin("t", &plugin).unwrap();
        assert_eq!(params.file_paths, vec!["/var/log/a.log"]);
        assert!(params.enable_container_discovery);
        assert_eq!(params.max_checkpoint_dir_search_depth, 3);
        assert_eq!(params.enable_exactly_once, 4);
        assert_eq!(params.multiline.unwrap().start_pattern.unwrap(), "^\\d{4}");
    }

    #[test]
    fn custom_multiline_without_patterns_is_rejected() {
        let plugin = file_input(
            r#"{
                "Type": "input_file",
                "FilePaths": ["/var/log/a.log"],
                "Multiline": { "Mode": "custom" }
            }"#,
        );
        assert!(FileInputParams::from_plugin("t", &plugin).is_err());
    }

    #[test]
    fn empty_file_paths_are_rejected() {
        let plugin = file_input(r#"{ "Type": "input_file" }"#);
        assert!(FileInputParams::from_plugin("t", &plugin).is_err());
    }
}
