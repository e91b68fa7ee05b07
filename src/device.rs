// MIT License - Copyright (c) 2026 Peter Wright

//! Per-device synchronization context shared by every device type:
//! discovery publishing, the availability state machine, and the
//! change-suppressing state synchronizer.

use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, Duration};
use tracing::debug;

use crate::entity::{DeviceRegistry, DiscoveryEntry, Entity};
use crate::error::Result;
use crate::mqtt::MqttPublish;
use crate::topics;

/// Grace interval after publishing discovery messages, giving Home Assistant
/// time to ingest configuration before any state arrives. Never skipped,
/// including on rediscovery.
pub const DISCOVERY_GRACE: Duration = Duration::from_secs(2);

/// Delay before marking online (absorbs transient reconnect flapping) and
/// after publishing (serializes with discovery-message ingestion).
pub const AVAILABILITY_DELAY: Duration = Duration::from_secs(1);

/// External identity of one device. Owned by the remote API client; the
/// bridge only reads it.
#[derive(Debug, Clone)]
pub struct DeviceIdent {
    pub device_id: String,
    pub location_id: String,
    pub name: String,
}

/// Per-device availability state machine.
///
/// `Init` is entered only once, at construction; afterwards the device
/// cycles freely between `Online` and `Offline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Init,
    Online,
    Offline,
}

/// Mailbox messages for a device actor.
///
/// Each device runs as a single task draining one mpsc queue, so commands,
/// change-event syncs, activation, and timer expiry never interleave.
#[derive(Debug, Clone)]
pub enum DeviceMsg {
    /// Location connectivity changed. `connected = true` triggers discovery,
    /// online transition, and a full state publish.
    Activate { connected: bool },
    /// Inbound command-topic message for one entity.
    Command { entity: String, payload: String },
    /// Remote change-event: some property may have changed, re-read and
    /// publish incrementally.
    ChangeEvent,
    /// The panel's exit-delay timer fired.
    ExitDelayElapsed,
}

/// Entity set, availability, and subscription state for one device.
pub struct DeviceContext<P> {
    publisher: P,
    pub device_topic: String,
    pub availability_topic: String,
    pub registry: DeviceRegistry,
    availability: Availability,
    entities: Vec<Entity>,
    discovery: Vec<DiscoveryEntry>,
    /// Monotonic: set once when change-events and command topics are wired,
    /// preventing duplicate subscription registration on republish.
    pub subscribed: bool,
}

impl<P: MqttPublish> DeviceContext<P> {
    pub fn new(
        publisher: P,
        ring_topic: &str,
        kind: &str,
        ident: &DeviceIdent,
        registry: DeviceRegistry,
        entities: Vec<Entity>,
        discovery: Vec<DiscoveryEntry>,
    ) -> Self {
        let device_topic = topics::device_topic(ring_topic, &ident.location_id, kind, &ident.device_id);
        let availability_topic = topics::availability_topic(&device_topic);
        Self {
            publisher,
            device_topic,
            availability_topic,
            registry,
            availability: Availability::Init,
            entities,
            discovery,
            subscribed: false,
        }
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn entity(&self, key: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.key == key)
    }

    /// Command topics of every writable entity, in build order.
    pub fn command_topics(&self) -> Vec<String> {
        self.entities
            .iter()
            .filter_map(|e| e.command_topic.clone())
            .collect()
    }

    /// Subscribe to every command topic on the broker.
    pub async fn subscribe_command_topics(&self) -> Result<()> {
        for topic in self.command_topics() {
            self.publisher.subscribe(&topic).await?;
        }
        Ok(())
    }

    /// Publish every discovery entry retained, then wait the grace interval
    /// so Home Assistant ingests the configuration before state arrives.
    pub async fn publish_discovery(&self) -> Result<()> {
        if self.availability == Availability::Init {
            debug!(device = %self.device_topic, "publishing new device discovery");
        } else {
            debug!(device = %self.device_topic, "republishing existing device discovery");
        }
        for entry in &self.discovery {
            let payload = serde_json::to_string(&entry.payload)?;
            self.publisher.publish(&entry.config_topic, &payload, true).await?;
        }
        sleep(DISCOVERY_GRACE).await;
        Ok(())
    }

    /// Transition to online and publish the availability topic.
    ///
    /// Returns whether the state actually changed. Repeated re-entry into
    /// `Online` (full rediscovery replays) stays silent in the debug log.
    pub async fn set_online(&mut self) -> Result<bool> {
        let changed = self.availability != Availability::Online;
        sleep(AVAILABILITY_DELAY).await;
        self.availability = Availability::Online;
        if changed {
            debug!(device = %self.device_topic, "device online");
        }
        self.publisher.publish(&self.availability_topic, "online", false).await?;
        sleep(AVAILABILITY_DELAY).await;
        Ok(changed)
    }

    /// Transition to offline immediately and publish the availability topic.
    pub async fn set_offline(&mut self) -> Result<bool> {
        let changed = self.availability != Availability::Offline;
        self.availability = Availability::Offline;
        if changed {
            debug!(device = %self.device_topic, "device offline");
        }
        self.publisher.publish(&self.availability_topic, "offline", false).await?;
        Ok(changed)
    }

    /// Publish one entity's state value.
    ///
    /// Full syncs (`is_change_event = false`) publish unconditionally so the
    /// hub holds authoritative state even if nothing changed. Change-event
    /// syncs publish only when the value differs from the cache: no bus
    /// traffic, no log entry otherwise.
    ///
    /// Returns whether a publish occurred.
    pub async fn publish_state(
        &mut self,
        key: &str,
        value: &str,
        is_change_event: bool,
    ) -> Result<bool> {
        let Some(idx) = self.entities.iter().position(|e| e.key == key) else {
            return Ok(false);
        };
        if is_change_event && self.entities[idx].last_published.as_deref() == Some(value) {
            return Ok(false);
        }
        let state_topic = self.entities[idx].state_topic.clone();
        self.publisher.publish(&state_topic, value, false).await?;
        self.entities[idx].last_published = Some(value.to_string());
        Ok(true)
    }
}

/// Forward remote change events into a device actor's mailbox.
pub(crate) fn spawn_change_forwarder(
    mut events: broadcast::Receiver<()>,
    tx: mpsc::Sender<DeviceMsg>,
) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(()) => {
                    if tx.send(DeviceMsg::ChangeEvent).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
