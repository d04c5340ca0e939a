// ABOUTME: Gateway configuration: bind/session parameters plus MO/MT processor tuning
// ABOUTME: Accepts both the nested processor_config shape and a flat legacy shape

use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("conflicting segmentation strategies enabled: {0:?} (exactly one or none may be set)")]
    ConflictingSegmentationFlags(Vec<&'static str>),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_interface_version() -> String {
    "34".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    #[serde(default)]
    pub data_coding_overrides: HashMap<u8, String>,
    #[serde(default = "default_submit_sm_encoding")]
    pub submit_sm_encoding: String,
    #[serde(default)]
    pub submit_sm_data_coding: u8,
    #[serde(default)]
    pub send_long_messages: bool,
    #[serde(default)]
    pub send_multipart_sar: bool,
    #[serde(default)]
    pub send_multipart_udh: bool,
}

fn default_submit_sm_encoding() -> String {
    "utf-8".to_string()
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            data_coding_overrides: HashMap::new(),
            submit_sm_encoding: default_submit_sm_encoding(),
            submit_sm_data_coding: 1,
            send_long_messages: false,
            send_multipart_sar: false,
            send_multipart_udh: false,
        }
    }
}

impl ProcessorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let enabled: Vec<&'static str> = [
            (self.send_long_messages, "send_long_messages"),
            (self.send_multipart_sar, "send_multipart_sar"),
            (self.send_multipart_udh, "send_multipart_udh"),
        ]
        .into_iter()
        .filter_map(|(flag, name)| flag.then_some(name))
        .collect();

        if enabled.len() > 1 {
            return Err(ConfigError::ConflictingSegmentationFlags(enabled));
        }
        Ok(())
    }
}

/// Raw on-disk shape: either nested (`submit_short_message_processor_config = {...}`)
/// or legacy-flat (processor fields at the top level). Deserialized permissively,
/// then reshaped by `GatewayConfig::from_raw` into one canonical form.
#[derive(Debug, Clone, Deserialize, Default)]
struct RawGatewayConfig {
    transport_name: String,
    host: String,
    port: u16,
    system_id: String,
    password: String,
    #[serde(default)]
    system_type: String,
    #[serde(default = "default_interface_version")]
    interface_version: String,
    #[serde(default)]
    address_range: String,
    #[serde(default)]
    bind_type: BindMode,
    #[serde(default)]
    mt_tps: Option<u32>,
    #[serde(default = "default_throttle_delay")]
    throttle_delay_secs: u64,
    #[serde(default = "default_submit_sm_expiry")]
    submit_sm_expiry_secs: u64,
    #[serde(default = "default_third_party_id_expiry")]
    third_party_id_expiry_secs: u64,
    #[serde(default = "default_multipart_expiry")]
    multipart_expiry_secs: u64,

    // Nested shape.
    submit_short_message_processor_config: Option<ProcessorConfig>,
    deliver_short_message_processor_config: Option<ProcessorConfig>,

    // Legacy flat shape: same field names as ProcessorConfig, hoisted to top level.
    #[serde(default)]
    data_coding_overrides: HashMap<u8, String>,
    submit_sm_encoding: Option<String>,
    submit_sm_data_coding: Option<u8>,
    #[serde(default)]
    send_long_messages: bool,
    #[serde(default)]
    send_multipart_sar: bool,
    #[serde(default)]
    send_multipart_udh: bool,
}

fn default_throttle_delay() -> u64 {
    30
}
fn default_submit_sm_expiry() -> u64 {
    24 * 3600
}
fn default_third_party_id_expiry() -> u64 {
    7 * 24 * 3600
}
fn default_multipart_expiry() -> u64 {
    3600
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BindMode {
    Transmitter,
    Receiver,
    #[default]
    Transceiver,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub transport_name: String,
    pub host: String,
    pub port: u16,
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    pub interface_version: String,
    pub address_range: String,
    pub bind_type: BindMode,
    pub mt_tps: Option<u32>,
    pub throttle_delay_secs: u64,
    pub submit_sm_expiry_secs: u64,
    pub third_party_id_expiry_secs: u64,
    pub multipart_expiry_secs: u64,
    pub submit_processor: ProcessorConfig,
    pub deliver_processor: ProcessorConfig,
}

impl GatewayConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawGatewayConfig = toml::from_str(text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawGatewayConfig) -> Result<Self, ConfigError> {
        let legacy_flat = ProcessorConfig {
            data_coding_overrides: raw.data_coding_overrides.clone(),
            submit_sm_encoding: raw
                .submit_sm_encoding
                .clone()
                .unwrap_or_else(default_submit_sm_encoding),
            submit_sm_data_coding: raw.submit_sm_data_coding.unwrap_or(1),
            send_long_messages: raw.send_long_messages,
            send_multipart_sar: raw.send_multipart_sar,
            send_multipart_udh: raw.send_multipart_udh,
        };

        let submit_processor = raw
            .submit_short_message_processor_config
            .clone()
            .unwrap_or_else(|| legacy_flat.clone());
        let deliver_processor = raw
            .deliver_short_message_processor_config
            .unwrap_or(legacy_flat);

        submit_processor.validate()?;

        Ok(GatewayConfig {
            transport_name: raw.transport_name,
            host: raw.host,
            port: raw.port,
            system_id: raw.system_id,
            password: raw.password,
            system_type: raw.system_type,
            interface_version: raw.interface_version,
            address_range: raw.address_range,
            bind_type: raw.bind_type,
            mt_tps: raw.mt_tps,
            throttle_delay_secs: raw.throttle_delay_secs,
            submit_sm_expiry_secs: raw.submit_sm_expiry_secs,
            third_party_id_expiry_secs: raw.third_party_id_expiry_secs,
            multipart_expiry_secs: raw.multipart_expiry_secs,
            submit_processor,
            deliver_processor,
        })
    }

    #[cfg(test)]
    pub fn for_tests(transport_name: &str) -> Self {
        Self {
            transport_name: transport_name.to_string(),
            host: "localhost".to_string(),
            port: 2775,
            system_id: "sid".to_string(),
            password: "pass".to_string(),
            system_type: String::new(),
            interface_version: default_interface_version(),
            address_range: String::new(),
            bind_type: BindMode::Transceiver,
            mt_tps: None,
            throttle_delay_secs: default_throttle_delay(),
            submit_sm_expiry_secs: default_submit_sm_expiry(),
            third_party_id_expiry_secs: default_third_party_id_expiry(),
            multipart_expiry_secs: default_multipart_expiry(),
            submit_processor: ProcessorConfig::default(),
            deliver_processor: ProcessorConfig::default(),
        }
    }
}
