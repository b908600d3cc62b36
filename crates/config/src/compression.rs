//! Flusher payload compression parameters
//!
//! Compression runs inside the flusher's serialization, past the queue
//! layer (queues stay content-opaque). The knob is typed here so every
//! flusher block spells it the same way.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::pipeline::PluginConfig;

/// Wire compression applied to serialized payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressType {
    #[default]
    None,
    Lz4,
    Zstd,
}

/// Recognized compression parameters of a flusher block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionParams {
    #[serde(rename = "CompressType")]
    pub compress_type: CompressType,

    /// Codec-specific level; only meaningful for zstd
    #[serde(rename = "CompressionLevel")]
    pub level: i32,
}

impl Default for CompressionParams {
    fn default() -> Self {
        Self {
            compress_type: CompressType::None,
            level: 1,
        }
    }
}

impl CompressionParams {
    /// Extract and validate from a flusher plugin block
    pub fn from_plugin(config_name: &str, plugin: &PluginConfig) -> Result<Self> {
        let value = serde_json::Value::Object(plugin.params.clone());
        let params: CompressionParams =
            serde_json::from_value(value).map_err(|source| ConfigError::ParseError {
                name: config_name.to_string(),
                source,
            })?;
        if params.compress_type != CompressType::Zstd && params.level != 1 {
            return Err(ConfigError::InvalidValue {
                name: config_name.to_string(),
                field: "CompressionLevel",
                message: "level applies to zstd only".into(),
            });
        }
        if params.compress_type == CompressType::Zstd && !(1..=22).contains(&params.level) {
            return Err(ConfigError::InvalidValue {
                name: config_name.to_string(),
                field: "CompressionLevel",
                message: format!("zstd level {} out of range 1..=22", params.level),
            });
        }
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;

    fn flusher(body: &str) -> PluginConfig {
        let config = PipelineConfig::from_json(
            "t",
            &format!(
                r#"{{ "inputs": [{{ "Type": "input_mock" }}], "flushers": [{body}] }}"#
            ),
        )
        .unwrap();
        config.flushers[0].clone()
    }

    #[test]
    fn defaults_to_no_compression() {
        let plugin = flusher(r#"{ "Type": "flusher_stdout" }"#);
        let params = CompressionParams::from_plugin("t", &plugin).unwrap();
        assert_eq!(params.compress_type, CompressType::None);
        assert_eq!(params.level, 1);
    }

    #[test]
    fn parses_zstd_with_level() {
        let plugin = flusher(
            r#"{ "Type": "flusher_stdout", "CompressType": "zstd", "CompressionLevel": 3 }"#,
        );
        let params = CompressionParams::from_plugin("t", &plugin).unwrap();
        assert_eq!(params.compress_type, CompressType::Zstd);
        assert_eq!(params.level, 3);
    }

    #[test]
    fn rejects_misapplied_or_out_of_range_levels() {
        let plugin = flusher(
            r#"{ "Type": "flusher_stdout", "CompressType": "lz4", "CompressionLevel": 5 }"#,
        );
        assert!(CompressionParams::from_plugin("t", &plugin).is_err());

        let plugin = flusher(
            r#"{ "Type": "flusher_stdout", "CompressType": "zstd", "CompressionLevel": 40 }"#,
        );
        assert!(CompressionParams::from_plugin("t", &plugin).is_err());
    }

    #[test]
    fn unknown_codec_fails_to_parse() {
        let plugin = flusher(r#"{ "Type": "flusher_stdout", "CompressType": "brotli" }"#);
        assert!(CompressionParams::from_plugin("t", &plugin).is_err());
    }
}
