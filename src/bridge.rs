// MIT License - Copyright (c) 2026 Peter Wright

//! Command routing and the MQTT event loop.
//!
//! Each device runs as its own actor; the bridge holds one [`DeviceHandle`]
//! per device and fans broker traffic out to their mailboxes.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Packet, QoS};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::device::DeviceMsg;

/// Mailbox handle for a spawned device actor.
#[derive(Clone)]
pub struct DeviceHandle {
    tx: mpsc::Sender<DeviceMsg>,
    device_topic: String,
    command_topics: Vec<String>,
}

impl DeviceHandle {
    pub fn new(tx: mpsc::Sender<DeviceMsg>, device_topic: String, command_topics: Vec<String>) -> Self {
        Self {
            tx,
            device_topic,
            command_topics,
        }
    }

    /// Deliver a message to the device actor. A closed mailbox means the
    /// actor has shut down; the message is silently dropped.
    pub async fn send(&self, msg: DeviceMsg) {
        let _ = self.tx.send(msg).await;
    }
}

/// Routes MQTT traffic to device actors.
#[derive(Default)]
pub struct Bridge {
    devices: Vec<DeviceHandle>,
}

impl Bridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&mut self, handle: DeviceHandle) {
        self.devices.push(handle);
    }

    /// Fan out a location connectivity transition to every device.
    pub async fn set_location_connected(&self, connected: bool) {
        for device in &self.devices {
            device.send(DeviceMsg::Activate { connected }).await;
        }
    }

    /// Match an inbound publish against the per-device command topic space
    /// and deliver it to the owning actor.
    pub async fn route_command(&self, topic: &str, payload: &str) {
        for device in &self.devices {
            let Some(rest) = topic.strip_prefix(&device.device_topic) else {
                continue;
            };
            let Some(rest) = rest.strip_prefix('/') else {
                continue;
            };
            let Some(entity) = rest.strip_suffix("/command") else {
                continue;
            };
            device
                .send(DeviceMsg::Command {
                    entity: entity.to_string(),
                    payload: payload.to_string(),
                })
                .await;
            return;
        }
        debug!(topic, "received message to unknown command topic");
    }

    /// Drive the MQTT event loop until the process is shut down.
    ///
    /// Subscriptions are re-established on every ConnAck so that a broker
    /// reconnect restores command delivery without outside help.
    pub async fn run(&self, client: &AsyncClient, eventloop: &mut EventLoop) {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("connected to MQTT broker");
                    for device in &self.devices {
                        for topic in &device.command_topics {
                            if let Err(e) = client.subscribe(topic, QoS::AtLeastOnce).await {
                                error!(topic, "MQTT subscribe failed: {e}");
                            }
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = String::from_utf8_lossy(&publish.payload);
                    self.route_command(&publish.topic, &payload).await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("MQTT connection error: {e}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }
}
