//! Typed view of the eBPF security input parameter blocks
//!
//! The probe inputs (`input_network_security`, `input_process_security`,
//! `input_file_security`) live behind the `Input` trait like every other
//! source; their kernel-event plumbing is a collaborator. The parameter
//! shape is typed here so a malformed probe filter fails the config,
//! not the pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::pipeline::PluginConfig;

/// Address/port filter of one network security probe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NetworkAddrFilter {
    #[serde(rename = "DestAddrList")]
    pub dest_addr_list: Vec<String>,

    #[serde(rename = "DestPortList")]
    pub dest_port_list: Vec<u16>,

    #[serde(rename = "SourceAddrList")]
    pub source_addr_list: Vec<String>,

    #[serde(rename = "SourcePortList")]
    pub source_port_list: Vec<u16>,
}

impl NetworkAddrFilter {
    pub fn is_empty(&self) -> bool {
        self.dest_addr_list.is_empty()
            && self.dest_port_list.is_empty()
            && self.source_addr_list.is_empty()
            && self.source_port_list.is_empty()
    }
}

/// One probe entry: which kernel call sites, filtered how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SecurityProbeConfig {
    /// Kernel call names the probe attaches to (e.g. `tcp_connect`)
    #[serde(rename = "CallNameFilter")]
    pub call_name_filter: Vec<String>,

    /// Network-probe address filtering; absent for process/file probes
    #[serde(rename = "AddrFilter")]
    pub addr_filter: Option<NetworkAddrFilter>,
}

/// Recognized parameters of the eBPF security input plugins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EbpfSecurityParams {
    #[serde(rename = "ProbeConfig")]
    pub probe_config: Vec<SecurityProbeConfig>,
}

impl EbpfSecurityParams {
    /// Extract and validate from a security input plugin block
    pub fn from_plugin(config_name: &str, plugin: &PluginConfig) -> Result<Self> {
        let value = serde_json::Value::Object(plugin.params.clone());
        let params: EbpfSecurityParams =
            serde_json::from_value(value).map_err(|source| ConfigError::ParseError {
                name: config_name.to_string(),
                source,
            })?;
        for probe in &params.probe_config {
            if probe.call_name_filter.iter().any(String::is_empty) {
                return Err(ConfigError::InvalidValue {
                    name: config_name.to_string(),
                    field: "ProbeConfig.CallNameFilter",
                    message: "call names must not be empty".into(),
                });
            }
        }
        Ok(params)
    }
}
