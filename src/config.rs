// MIT License - Copyright (c) 2026 Peter Wright

//! Bridge configuration, loaded from a TOML file.

use serde::Deserialize;

use crate::error::{BridgeError, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker URL, e.g. `mqtt://localhost:1883`.
    pub url: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Topic prefix for device state/command topics.
    #[serde(default = "default_ring_topic")]
    pub ring_topic: String,
    /// Topic prefix for Home Assistant discovery config messages.
    #[serde(default = "default_hass_topic")]
    pub hass_topic: String,
    /// Expose the police/fire panic switches on security panels.
    #[serde(default)]
    pub enable_panic: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ring_topic: default_ring_topic(),
            hass_topic: default_hass_topic(),
            enable_panic: false,
        }
    }
}

fn default_client_id() -> String {
    "ring-bridge".to_string()
}
fn default_ring_topic() -> String {
    "ring".to_string()
}
fn default_hass_topic() -> String {
    "homeassistant".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

/// Parse an MQTT URL like `mqtt://host:port` into (host, port).
pub fn parse_mqtt_url(url: &str) -> Result<(String, u16)> {
    let stripped = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url);

    let (host, port_str) = stripped
        .rsplit_once(':')
        .ok_or_else(|| BridgeError::InvalidMqttUrl {
            details: "expected mqtt://host:port".to_string(),
        })?;

    let port: u16 = port_str.parse().map_err(|_| BridgeError::InvalidMqttUrl {
        details: format!("invalid port: {port_str}"),
    })?;

    Ok((host.to_string(), port))
}
