// MIT License - Copyright (c) 2026 Peter Wright

//! Deterministic MQTT topic derivation.
//!
//! Every topic is a pure function of `(prefix, location id, device id,
//! entity name)` so that rediscovery after a reconnect lands on exactly
//! the same topics as the first activation.

use crate::entity::Component;

/// Base topic for one device: `<prefix>/<locationId>/<kind>/<deviceId>`.
pub fn device_topic(prefix: &str, location_id: &str, kind: &str, device_id: &str) -> String {
    format!("{prefix}/{location_id}/{kind}/{device_id}")
}

/// Availability topic: `<deviceTopic>/status`.
pub fn availability_topic(device_topic: &str) -> String {
    format!("{device_topic}/status")
}

/// State topic for one entity: `<deviceTopic>/<entity>/state`.
pub fn state_topic(device_topic: &str, entity: &str) -> String {
    format!("{device_topic}/{entity}/state")
}

/// Command topic for one entity: `<deviceTopic>/<entity>/command`.
pub fn command_topic(device_topic: &str, entity: &str) -> String {
    format!("{device_topic}/{entity}/command")
}

/// Home Assistant discovery config topic:
/// `<hassPrefix>/<component>/<locationId>/<deviceId>_<entity>/config`.
pub fn config_topic(
    hass_prefix: &str,
    component: Component,
    location_id: &str,
    device_id: &str,
    entity: &str,
) -> String {
    format!(
        "{hass_prefix}/{}/{location_id}/{device_id}_{entity}/config",
        component.as_str()
    )
}
