//! Typed view of the Prometheus scrape input parameter block
//!
//! The scrape scheduler itself is a collaborator behind the `Input`
//! trait; the `ScrapeConfig` shape is typed here so interval/timeout and
//! scheme mistakes surface at config validation. Field names follow the
//! Prometheus convention the scrape subsystem speaks (snake_case).

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::pipeline::PluginConfig;

/// One scrape job definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub job_name: String,

    /// Prometheus duration string, e.g. `30s` or `1m`
    pub scrape_interval: String,

    pub scrape_timeout: String,

    pub metrics_path: String,

    /// `http` or `https`
    pub scheme: String,

    pub honor_timestamps: bool,

    pub follow_redirects: bool,

    pub enable_http2: bool,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            job_name: String::new(),
            scrape_interval: "60s".into(),
            scrape_timeout: "10s".into(),
            metrics_path: "/metrics".into(),
            scheme: "http".into(),
            honor_timestamps: true,
            follow_redirects: true,
            enable_http2: true,
        }
    }
}

impl ScrapeConfig {
    pub fn interval_secs(&self) -> Option<u64> {
        parse_duration_secs(&self.scrape_interval)
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        parse_duration_secs(&self.scrape_timeout)
    }

    fn validate(&self, config_name: &str) -> Result<()> {
        if self.job_name.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: config_name.to_string(),
                field: "ScrapeConfig.job_name",
                message: "job_name is required".into(),
            });
        }
        match self.scheme.as_str() {
            "http" | "https" => {}
            other => {
                return Err(ConfigError::InvalidValue {
                    name: config_name.to_string(),
                    field: "ScrapeConfig.scheme",
                    message: format!("unknown scheme '{other}'"),
                });
            }
        }
        let interval = self.interval_secs().ok_or_else(|| ConfigError::InvalidValue {
            name: config_name.to_string(),
            field: "ScrapeConfig.scrape_interval",
            message: format!("not a duration: '{}'", self.scrape_interval),
        })?;
        let timeout = self.timeout_secs().ok_or_else(|| ConfigError::InvalidValue {
            name: config_name.to_string(),
            field: "ScrapeConfig.scrape_timeout",
            message: format!("not a duration: '{}'", self.scrape_timeout),
        })?;
        if timeout > interval {
            return Err(ConfigError::InvalidValue {
                name: config_name.to_string(),
                field: "ScrapeConfig.scrape_timeout",
                message: format!("timeout {timeout}s exceeds interval {interval}s"),
            });
        }
        Ok(())
    }
}

/// Recognized parameters of the `input_prometheus` plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PrometheusInputParams {
    #[serde(rename = "ScrapeConfig")]
    pub scrape_config: ScrapeConfig,
}

impl PrometheusInputParams {
    /// Extract and validate from an `input_prometheus` plugin block
    pub fn from_plugin(config_name: &str, plugin: &PluginConfig) -> Result<Self> {
        let value = serde_json::Value::Object(plugin.params.clone());
        let params: PrometheusInputParams =
            serde_json::from_value(value).map_err(|source| ConfigError::ParseError {
                name: config_name.to_string(),
                source,
            })?;
        params.scrape_config.validate(config_name)?;
        Ok(params)
    }
}

/// Parse `30s` / `2m` / `1h` style durations into seconds
fn parse_duration_secs(value: &str) -> Option<u64> {
    let (digits, unit) = value.split_at(value.len().checked_sub(1)?);
    let amount: u64 = digits.parse().ok()?;
    match unit {
        "s" => Some(amount),
        "m" => Some(amount * 60),
        "h" => Some(amount * 3600),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;

    fn prometheus_input(body: &str) -> PluginConfig {
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
    fn parses_a_scrape_block() {
        let plugin = prometheus_input(
            r#"{
                "Type": "input_prometheus",
                "ScrapeConfig": {
                    "job_name": "kube-state-metrics",
                    "scrape_interval": "30s",
                    "scrape_timeout": "30s",
                    "metrics_path": "/metrics",
                    "scheme": "http",
                    "honor_timestamps": false
                }
            }"#,
        );
        let params = PrometheusInputParams::from_plugin("t", &plugin).unwrap();
        let scrape = &params.scrape_config;
        assert_eq!(scrape.job_name, "kube-state-metrics");
        assert_eq!(scrape.interval_secs(), Some(30));
        assert_eq!(scrape.timeout_secs(), Some(30));
        assert!(!scrape.honor_timestamps);
        assert!(scrape.follow_redirects);
    }

    #[test]
    fn missing_job_name_is_rejected() {
        let plugin = prometheus_input(
            r#"{ "Type": "input_prometheus", "ScrapeConfig": { "scrape_interval": "30s" } }"#,
        );
        assert!(PrometheusInputParams::from_plugin("t", &plugin).is_err());
    }

    #[test]
    fn timeout_beyond_interval_is_rejected() {
        let plugin = prometheus_input(
            r#"{
                "Type": "input_prometheus",
                "ScrapeConfig": {
                    "job_name": "j",
                    "scrape_interval": "10s",
                    "scrape_timeout": "1m"
                }
            }"#,
        );
        assert!(PrometheusInputParams::from_plugin("t", &plugin).is_err());
    }

    #[test]
    fn durations_parse_in_all_units() {
        assert_eq!(parse_duration_secs("45s"), Some(45));
        assert_eq!(parse_duration_secs("2m"), Some(120));
        assert_eq!(parse_duration_secs("1h"), Some(3600));
        assert_eq!(parse_duration_secs("10"), None);
        assert_eq!(parse_duration_secs(""), None);
    }
}
