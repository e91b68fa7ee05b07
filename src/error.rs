// MIT License - Copyright (c) 2026 Peter Wright

/// All errors that can occur in the ring2mqtt bridge core.
///
/// Nothing in this taxonomy is process-fatal: unknown commands and
/// fire-and-forget remote failures are absorbed and logged at the call
/// site; errors only propagate where a caller can meaningfully react
/// (config loading, MQTT client calls).
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("Failed to serialize MQTT payload: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to read config file: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Invalid MQTT URL: {details}")]
    InvalidMqttUrl { details: String },

    /// Failure reported by the remote device API client.
    ///
    /// The wire format of the remote API is outside this crate; trait
    /// implementations fold whatever they produce into a reason string.
    #[error("Remote API call failed: {reason}")]
    Remote { reason: String },
}

impl BridgeError {
    /// Build a remote-call failure from any displayable source.
    pub fn remote(reason: impl std::fmt::Display) -> Self {
        Self::Remote {
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
