// MIT License - Copyright (c) 2026 Peter Wright

//! Chime device: the simplest instantiation of the entity framework.
//! Two entities (volume, snooze), no confirmation loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::ChimeApi;
use crate::bridge::DeviceHandle;
use crate::config::Config;
use crate::device::{spawn_change_forwarder, Availability, DeviceContext, DeviceIdent, DeviceMsg};
use crate::entity::{Component, DeviceRegistry, DiscoveryEntry, DiscoveryPayload, Entity};
use crate::error::Result;
use crate::mqtt::MqttPublish;
use crate::topics;

pub const MAX_VOLUME: u8 = 11;

/// Build the chime's entity set and retained discovery messages.
pub fn build_discovery(
    config: &Config,
    ident: &DeviceIdent,
) -> (DeviceRegistry, Vec<Entity>, Vec<DiscoveryEntry>) {
    let registry = DeviceRegistry {
        ids: vec![ident.device_id.clone()],
        name: ident.name.clone(),
        mf: "Ring".to_string(),
        mdl: "Chime".to_string(),
    };
    let device_topic = topics::device_topic(
        &config.bridge.ring_topic,
        &ident.location_id,
        "chime",
        &ident.device_id,
    );
    let availability_topic = topics::availability_topic(&device_topic);

    let volume_state = topics::state_topic(&device_topic, "volume");
    let volume_command = topics::command_topic(&device_topic, "volume");
    let volume_config = topics::config_topic(
        &config.bridge.hass_topic,
        Component::Number,
        &ident.location_id,
        &ident.device_id,
        "volume",
    );
    let snooze_state = topics::state_topic(&device_topic, "snooze");
    let snooze_config = topics::config_topic(
        &config.bridge.hass_topic,
        Component::BinarySensor,
        &ident.location_id,
        &ident.device_id,
        "snooze",
    );

    let entities = vec![
        Entity {
            key: "volume",
            component: Component::Number,
            state_topic: volume_state.clone(),
            command_topic: Some(volume_command.clone()),
            config_topic: volume_config.clone(),
            last_published: None,
        },
        Entity {
            key: "snooze",
            component: Component::BinarySensor,
            state_topic: snooze_state.clone(),
            command_topic: None,
            config_topic: snooze_config.clone(),
            last_published: None,
        },
    ];
    let discovery = vec![
        DiscoveryEntry {
            config_topic: volume_config,
            payload: DiscoveryPayload {
                name: format!("{} Volume", ident.name),
                unique_id: format!("{}_volume", ident.device_id),
                availability_topic: availability_topic.clone(),
                payload_available: "online".to_string(),
                payload_not_available: "offline".to_string(),
                state_topic: volume_state,
                command_topic: Some(volume_command),
                icon: None,
                min: Some(0),
                max: Some(u32::from(MAX_VOLUME)),
                device: registry.clone(),
            },
        },
        DiscoveryEntry {
            config_topic: snooze_config,
            payload: DiscoveryPayload {
                name: format!("{} Snooze Active", ident.name),
                unique_id: format!("{}_snooze", ident.device_id),
                availability_topic,
                payload_available: "online".to_string(),
                payload_not_available: "offline".to_string(),
                state_topic: snooze_state,
                command_topic: None,
                icon: None,
                min: None,
                max: None,
                device: registry.clone(),
            },
        },
    ];

    (registry, entities, discovery)
}

/// The chime actor.
pub struct Chime<A, P> {
    ctx: DeviceContext<P>,
    api: Arc<A>,
    tx: mpsc::Sender<DeviceMsg>,
}

impl<A: ChimeApi, P: MqttPublish> Chime<A, P> {
    /// Build the chime and spawn its actor task.
    pub fn spawn(config: &Config, publisher: P, api: Arc<A>, ident: DeviceIdent) -> DeviceHandle {
        let (tx, rx) = mpsc::channel(64);
        let (registry, entities, discovery) = build_discovery(config, &ident);
        let ctx = DeviceContext::new(
            publisher,
            &config.bridge.ring_topic,
            "chime",
            &ident,
            registry,
            entities,
            discovery,
        );
        let handle = DeviceHandle::new(tx.clone(), ctx.device_topic.clone(), ctx.command_topics());
        let chime = Self { ctx, api, tx };
        tokio::spawn(chime.run(rx));
        handle
    }

    async fn run(mut self, mut rx: mpsc::Receiver<DeviceMsg>) {
        while let Some(msg) = rx.recv().await {
            let result = match msg {
                DeviceMsg::Activate { connected: true } => self.activate().await,
                DeviceMsg::Activate { connected: false } => {
                    self.ctx.set_offline().await.map(|_| ())
                }
                DeviceMsg::Command { entity, payload } => self.dispatch(&entity, &payload).await,
                DeviceMsg::ChangeEvent => {
                    if self.ctx.availability() == Availability::Online {
                        self.publish_data(true).await
                    } else {
                        Ok(())
                    }
                }
                DeviceMsg::ExitDelayElapsed => Ok(()),
            };
            if let Err(e) = result {
                warn!(device = %self.ctx.device_topic, "chime publish failed: {e}");
            }
        }
    }

    async fn activate(&mut self) -> Result<()> {
        self.ctx.publish_discovery().await?;
        self.ctx.set_online().await?;
        if !self.ctx.subscribed {
            self.ctx.subscribe_command_topics().await?;
            spawn_change_forwarder(self.api.subscribe(), self.tx.clone());
            self.ctx.subscribed = true;
        }
        self.publish_data(false).await
    }

    async fn dispatch(&mut self, entity: &str, payload: &str) -> Result<()> {
        match entity {
            "volume" => self.set_volume(payload).await,
            _ => {
                debug!(device = %self.ctx.device_topic, entity, "received message to unknown command topic");
                Ok(())
            }
        }
    }

    async fn publish_data(&mut self, is_change_event: bool) -> Result<()> {
        let data = self.api.chime_data();
        self.ctx
            .publish_state("volume", &data.volume.to_string(), is_change_event)
            .await?;
        let snooze = if data.snooze_seconds_left > 0 { "ON" } else { "OFF" };
        self.ctx.publish_state("snooze", snooze, is_change_event).await?;
        Ok(())
    }

    /// Set the chime volume. The remote call is fire-and-forget; the new
    /// value is published optimistically and corrected by later change
    /// events if the backend disagrees.
    async fn set_volume(&mut self, payload: &str) -> Result<()> {
        let volume = match payload.trim().parse::<u8>() {
            Ok(v) if v <= MAX_VOLUME => v,
            _ => {
                debug!(device = %self.ctx.device_topic, payload, "received invalid command for volume");
                return Ok(());
            }
        };
        debug!(device = %self.ctx.device_topic, volume, "setting chime volume");
        let api = Arc::clone(&self.api);
        tokio::spawn(async move {
            if let Err(e) = api.set_volume(volume).await {
                debug!("set volume failed: {e}");
            }
        });
        self.ctx
            .publish_state("volume", &volume.to_string(), false)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ChimeData;
    use crate::testutil::{FakeChime, RecordingPublisher};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::time::sleep;

    fn test_config() -> Config {
        Config::from_toml("[mqtt]\nurl = \"mqtt://localhost:1883\"").unwrap()
    }

    fn ident() -> DeviceIdent {
        DeviceIdent {
            device_id: "chime1".to_string(),
            location_id: "loc1".to_string(),
            name: "Kitchen Chime".to_string(),
        }
    }

    async fn settle() {
        sleep(Duration::from_secs(10)).await;
    }

    #[test]
    fn test_discovery_is_deterministic() {
        let config = test_config();
        let a = build_discovery(&config, &ident());
        let b = build_discovery(&config, &ident());
        assert_eq!(a.1.len(), b.1.len());
        for (x, y) in a.1.iter().zip(b.1.iter()) {
            assert_eq!(x.state_topic, y.state_topic);
            assert_eq!(x.config_topic, y.config_topic);
            assert_eq!(x.command_topic, y.command_topic);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_publish_and_snooze_derivation() {
        crate::testutil::init_logging();
        let publisher = Arc::new(RecordingPublisher::default());
        let api = Arc::new(FakeChime::new(ChimeData {
            volume: 5,
            snooze_seconds_left: 300,
        }));
        let handle = Chime::spawn(&test_config(), Arc::clone(&publisher), api, ident());

        handle.send(DeviceMsg::Activate { connected: true }).await;
        settle().await;

        assert_eq!(
            publisher.payloads_for("ring/loc1/chime/chime1/volume/state"),
            vec!["5".to_string()]
        );
        assert_eq!(
            publisher.payloads_for("ring/loc1/chime/chime1/snooze/state"),
            vec!["ON".to_string()]
        );
        // Only the volume entity is writable.
        assert_eq!(
            publisher.subscriptions(),
            vec!["ring/loc1/chime/chime1/volume/command".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_event_suppresses_unchanged_values() {
        crate::testutil::init_logging();
        let publisher = Arc::new(RecordingPublisher::default());
        let api = Arc::new(FakeChime::new(ChimeData {
            volume: 5,
            snooze_seconds_left: 0,
        }));
        let handle = Chime::spawn(&test_config(), Arc::clone(&publisher), Arc::clone(&api), ident());

        handle.send(DeviceMsg::Activate { connected: true }).await;
        settle().await;

        api.push_change_event();
        settle().await;
        assert_eq!(
            publisher.payloads_for("ring/loc1/chime/chime1/volume/state"),
            vec!["5".to_string()]
        );

        api.set_data(ChimeData {
            volume: 7,
            snooze_seconds_left: 0,
        });
        api.push_change_event();
        settle().await;
        assert_eq!(
            publisher.payloads_for("ring/loc1/chime/chime1/volume/state"),
            vec!["5".to_string(), "7".to_string()]
        );
        // Snooze stayed OFF the whole time.
        assert_eq!(
            publisher.payloads_for("ring/loc1/chime/chime1/snooze/state"),
            vec!["OFF".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_volume_command_publishes_optimistically() {
        crate::testutil::init_logging();
        let publisher = Arc::new(RecordingPublisher::default());
        let api = Arc::new(FakeChime::new(ChimeData {
            volume: 5,
            snooze_seconds_left: 0,
        }));
        let handle = Chime::spawn(&test_config(), Arc::clone(&publisher), Arc::clone(&api), ident());

        handle.send(DeviceMsg::Activate { connected: true }).await;
        settle().await;
        handle
            .send(DeviceMsg::Command {
                entity: "volume".to_string(),
                payload: "8".to_string(),
            })
            .await;
        settle().await;

        assert_eq!(api.volume_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            publisher.payloads_for("ring/loc1/chime/chime1/volume/state"),
            vec!["5".to_string(), "8".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_volume_payload_is_absorbed() {
        crate::testutil::init_logging();
        let publisher = Arc::new(RecordingPublisher::default());
        let api = Arc::new(FakeChime::new(ChimeData {
            volume: 5,
            snooze_seconds_left: 0,
        }));
        let handle = Chime::spawn(&test_config(), Arc::clone(&publisher), Arc::clone(&api), ident());

        handle.send(DeviceMsg::Activate { connected: true }).await;
        settle().await;
        for payload in ["loud", "12", "-1", ""] {
            handle
                .send(DeviceMsg::Command {
                    entity: "volume".to_string(),
                    payload: payload.to_string(),
                })
                .await;
        }
        settle().await;

        assert_eq!(api.volume_calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            publisher.payloads_for("ring/loc1/chime/chime1/volume/state"),
            vec!["5".to_string()]
        );
    }
}
