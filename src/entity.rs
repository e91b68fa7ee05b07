// MIT License - Copyright (c) 2026 Peter Wright

//! Entity model: one addressable, independently-published property of a
//! device, plus the retained Home Assistant discovery payload that
//! registers it.

use serde::Serialize;

/// Home Assistant component kind for an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    AlarmControlPanel,
    Switch,
    Sensor,
    BinarySensor,
    Number,
}

impl Component {
    /// The component name as it appears in discovery topics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlarmControlPanel => "alarm_control_panel",
            Self::Switch => "switch",
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
            Self::Number => "number",
        }
    }
}

/// One entity of a device.
///
/// Created once at device activation by the pure discovery build step.
/// `last_published` is the change-suppression cache: it is mutated only on a
/// successful state publish and never persisted across restarts.
#[derive(Debug, Clone)]
pub struct Entity {
    pub key: &'static str,
    pub component: Component,
    pub state_topic: String,
    pub command_topic: Option<String>,
    pub config_topic: String,
    pub last_published: Option<String>,
}

/// Device registry block nested inside every discovery payload.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRegistry {
    pub ids: Vec<String>,
    pub name: String,
    pub mf: String,
    pub mdl: String,
}

/// Retained JSON payload published to the discovery config topic.
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveryPayload {
    pub name: String,
    pub unique_id: String,
    pub availability_topic: String,
    pub payload_available: String,
    pub payload_not_available: String,
    pub state_topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<u32>,
    pub device: DeviceRegistry,
}

/// One discovery message: config topic plus serialized payload.
#[derive(Debug, Clone)]
pub struct DiscoveryEntry {
    pub config_topic: String,
    pub payload: DiscoveryPayload,
}
