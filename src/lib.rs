// MIT License - Copyright (c) 2026 Peter Wright
// MQTT bridge core for Ring alarm and chime devices
//
//! # ring2mqtt
//!
//! Bridges a fleet of Ring alarm devices (security panel, sirens, chimes) to
//! an MQTT broker, exposing each device as a set of Home Assistant
//! auto-discoverable entities.
//!
//! The crate provides the generic entity/discovery/availability framework
//! shared by every device plus the security-panel arm/disarm state machine
//! (command confirmation with bounded retries, sensor bypass selection,
//! exit-delay countdown, panic sub-states). The Ring API client itself is an
//! external collaborator: callers implement [`AlarmApi`] / [`ChimeApi`] and
//! hand the bridge a connected `rumqttc` client.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use ring2mqtt::{Bridge, Config, DeviceIdent, SecurityPanel};
//! # use ring2mqtt::api::AlarmApi;
//! # async fn run<A: AlarmApi>(ring: Arc<A>) -> anyhow::Result<()> {
//! let config = Config::from_path("config.toml")?;
//!
//! let (host, port) = ring2mqtt::config::parse_mqtt_url(&config.mqtt.url)?;
//! let opts = rumqttc::MqttOptions::new(&config.mqtt.client_id, host, port);
//! let (client, mut eventloop) = rumqttc::AsyncClient::new(opts, 256);
//! let client = Arc::new(client);
//!
//! let mut bridge = Bridge::new();
//! bridge.add_device(SecurityPanel::spawn(
//!     &config,
//!     Arc::clone(&client),
//!     ring,
//!     DeviceIdent {
//!         device_id: "abc123".into(),
//!         location_id: "loc1".into(),
//!         name: "Home Alarm".into(),
//!     },
//! ));
//!
//! bridge.set_location_connected(true).await;
//! bridge.run(&client, &mut eventloop).await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod bridge;
pub mod config;
pub mod device;
pub mod devices;
pub mod entity;
pub mod error;
pub mod mqtt;
pub mod topics;

#[cfg(test)]
pub(crate) mod testutil;

// Re-exports for convenience
pub use api::{AlarmApi, AlarmData, AlarmState, ArmMode, ChimeApi, ChimeData};
pub use bridge::{Bridge, DeviceHandle};
pub use config::Config;
pub use device::{Availability, DeviceContext, DeviceIdent, DeviceMsg};
pub use devices::chime::Chime;
pub use devices::security_panel::SecurityPanel;
pub use entity::{Component, DiscoveryPayload, Entity};
pub use error::{BridgeError, Result};
pub use mqtt::MqttPublish;
