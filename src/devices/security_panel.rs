// MIT License - Copyright (c) 2026 Peter Wright

//! Security panel device: arm/disarm state machine with command
//! confirmation, sensor bypass selection, exit-delay countdown, and the
//! optional police/fire panic switches.
//!
//! The panel runs as an actor draining one [`DeviceMsg`] mailbox, so change
//! events, commands, activation, and timer expiry never interleave. The only
//! state shared with a spawned task is the bypass flag, which the
//! confirmation loop re-reads on every attempt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::{AlarmApi, AlarmData, AlarmState, ArmMode, DeviceId, SensorKind};
use crate::bridge::DeviceHandle;
use crate::config::Config;
use crate::device::{spawn_change_forwarder, Availability, DeviceContext, DeviceIdent, DeviceMsg};
use crate::entity::{Component, DeviceRegistry, DiscoveryEntry, DiscoveryPayload, Entity};
use crate::error::Result;
use crate::mqtt::MqttPublish;
use crate::topics;

/// Maximum arm/disarm attempts before giving up.
pub const MAX_ARM_ATTEMPTS: u32 = 5;
/// Wait after issuing an arm command before checking the observed mode.
pub const ARM_CONFIRM_DELAY: StdDuration = StdDuration::from_secs(1);
/// Backoff between failed attempts.
pub const ARM_RETRY_BACKOFF: StdDuration = StdDuration::from_secs(10);

/// Published alarm-panel state, derived each publish cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Disarmed,
    ArmedHome,
    ArmedAway,
    /// Armed away with the exit-delay window still open.
    Arming { remaining: StdDuration },
    /// Entry delay running; alarm will trigger unless disarmed.
    Pending,
    Triggered,
}

impl PanelState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disarmed => "disarmed",
            Self::ArmedHome => "armed_home",
            Self::ArmedAway => "armed_away",
            Self::Arming { .. } => "arming",
            Self::Pending => "pending",
            Self::Triggered => "triggered",
        }
    }
}

/// Derive the published panel state from the device snapshot.
///
/// An active alarm overrides the mode-derived state: entry-delay maps to
/// `pending`, any other active alarm to `triggered`. Otherwise the arming
/// mode decides, with `all` reported as `arming` while the server-provided
/// exit-delay deadline lies in the future.
pub fn derive_panel_state(data: &AlarmData, now: DateTime<Utc>) -> PanelState {
    if let Some(alarm) = data.alarm_info {
        return if alarm == AlarmState::EntryDelay {
            PanelState::Pending
        } else {
            PanelState::Triggered
        };
    }
    match data.mode {
        ArmMode::None => PanelState::Disarmed,
        ArmMode::Some => PanelState::ArmedHome,
        ArmMode::All => match exit_delay_remaining(data, now) {
            Some(remaining) => PanelState::Arming { remaining },
            None => PanelState::ArmedAway,
        },
    }
}

/// Remaining exit-delay window, if one is open.
fn exit_delay_remaining(data: &AlarmData, now: DateTime<Utc>) -> Option<StdDuration> {
    let end = data.transition_delay_end?;
    (end - now).to_std().ok().filter(|d| !d.is_zero())
}

/// Panic sub-states derived from the active alarm, as (police, fire).
///
/// Burglar-family and fire/co-family states are independent; a burglar alarm
/// must not light the fire switch.
fn panic_states(alarm_info: Option<AlarmState>) -> (bool, bool) {
    match alarm_info {
        Some(
            AlarmState::BurglarAlarm
            | AlarmState::UserVerifiedBurglarAlarm
            | AlarmState::BurglarAcceleratedAlarm,
        ) => (true, false),
        Some(
            AlarmState::FireAlarm
            | AlarmState::CoAlarm
            | AlarmState::UserVerifiedCoOrFireAlarm
            | AlarmState::FireAcceleratedAlarm,
        ) => (false, true),
        _ => (false, false),
    }
}

/// Recognized arm/disarm command tokens (case-insensitive on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmCommand {
    Disarm,
    ArmHome,
    ArmAway,
}

impl ArmCommand {
    pub fn parse(payload: &str) -> Option<Self> {
        match payload.to_lowercase().as_str() {
            "disarm" => Some(Self::Disarm),
            "arm_home" => Some(Self::ArmHome),
            "arm_away" => Some(Self::ArmAway),
            _ => None,
        }
    }

    /// The backend mode this command must be confirmed against.
    pub fn target_mode(&self) -> ArmMode {
        match self {
            Self::Disarm => ArmMode::None,
            Self::ArmHome => ArmMode::Some,
            Self::ArmAway => ArmMode::All,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            Self::Disarm => "disarm",
            Self::ArmHome => "arm_home",
            Self::ArmAway => "arm_away",
        }
    }
}

/// Terminal outcome of a confirmation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    Confirmed { attempts: u32 },
    Exhausted,
}

/// Device ids to bypass for one arm attempt: contact-sensor and
/// retrofit-zone devices currently faulted.
pub async fn bypass_candidates<A: AlarmApi>(api: &A) -> Vec<DeviceId> {
    let devices = match api.devices().await {
        Ok(devices) => devices,
        Err(e) => {
            warn!("device enumeration for bypass failed: {e}");
            return Vec::new();
        }
    };
    let faulted: Vec<_> = devices
        .iter()
        .filter(|d| {
            d.faulted && matches!(d.kind, SensorKind::ContactSensor | SensorKind::RetrofitZone)
        })
        .collect();
    if !faulted.is_empty() {
        let names: Vec<&str> = faulted.iter().map(|d| d.name.as_str()).collect();
        debug!("arming bypass mode is enabled, bypassing sensors: {}", names.join(", "));
    }
    faulted.into_iter().map(|d| d.id.clone()).collect()
}

/// Issue an arm/disarm command and poll the observed mode until it matches
/// the target or attempts are exhausted.
///
/// The backend is eventually consistent and may silently ignore a
/// conflicting request, so the remote call's own result is only logged;
/// the observed mode after [`ARM_CONFIRM_DELAY`] is authoritative. Bypass
/// candidates are recomputed on every attempt because sensor fault state may
/// change between retries.
pub async fn confirm_arm_mode<A: AlarmApi>(
    api: &A,
    cmd: ArmCommand,
    bypass_enabled: &AtomicBool,
) -> ArmOutcome {
    for attempt in 1..=MAX_ARM_ATTEMPTS {
        if attempt > 1 {
            sleep(ARM_RETRY_BACKOFF).await;
        }

        let bypass_ids = if cmd != ArmCommand::Disarm && bypass_enabled.load(Ordering::SeqCst) {
            bypass_candidates(api).await
        } else {
            Vec::new()
        };

        let result = match cmd {
            ArmCommand::Disarm => api.disarm().await,
            ArmCommand::ArmHome => api.arm_home(&bypass_ids).await,
            ArmCommand::ArmAway => api.arm_away(&bypass_ids).await,
        };
        if let Err(e) = result {
            debug!("{} command failed: {e}", cmd.token());
        }

        sleep(ARM_CONFIRM_DELAY).await;
        if api.alarm_data().mode == cmd.target_mode() {
            return ArmOutcome::Confirmed { attempts: attempt };
        }
        debug!(attempt, "alarm failed to enter requested {} mode", cmd.token());
    }
    ArmOutcome::Exhausted
}

/// Build the panel's entity set and retained discovery messages.
///
/// Pure function of the device identity and configuration flags, so it can
/// run on first activation and on every reconnect without accumulating
/// state. Panic entities exist only when `enable_panic` is configured; the
/// command dispatch matches against this fixed set.
pub fn build_discovery(
    config: &Config,
    ident: &DeviceIdent,
) -> (DeviceRegistry, Vec<Entity>, Vec<DiscoveryEntry>) {
    let registry = DeviceRegistry {
        ids: vec![ident.device_id.clone()],
        name: ident.name.clone(),
        mf: "Ring".to_string(),
        mdl: "Alarm Control Panel".to_string(),
    };
    let device_topic = topics::device_topic(
        &config.bridge.ring_topic,
        &ident.location_id,
        "alarm",
        &ident.device_id,
    );
    let availability_topic = topics::availability_topic(&device_topic);

    let mut entities = Vec::new();
    let mut discovery = Vec::new();
    let mut add = |key: &'static str, component: Component, name: String, icon: Option<&str>| {
        let state_topic = topics::state_topic(&device_topic, key);
        let command_topic = topics::command_topic(&device_topic, key);
        let config_topic = topics::config_topic(
            &config.bridge.hass_topic,
            component,
            &ident.location_id,
            &ident.device_id,
            key,
        );
        entities.push(Entity {
            key,
            component,
            state_topic: state_topic.clone(),
            command_topic: Some(command_topic.clone()),
            config_topic: config_topic.clone(),
            last_published: None,
        });
        discovery.push(DiscoveryEntry {
            config_topic,
            payload: DiscoveryPayload {
                name,
                unique_id: format!("{}_{key}", ident.device_id),
                availability_topic: availability_topic.clone(),
                payload_available: "online".to_string(),
                payload_not_available: "offline".to_string(),
                state_topic,
                command_topic: Some(command_topic),
                icon: icon.map(str::to_string),
                min: None,
                max: None,
                device: registry.clone(),
            },
        });
    };

    add("alarm", Component::AlarmControlPanel, ident.name.clone(), None);
    add("siren", Component::Switch, format!("{} Siren", ident.name), Some("mdi:alarm-light"));
    add(
        "bypass",
        Component::Switch,
        format!("{} Arming Bypass Mode", ident.name),
        Some("mdi:transit-skip"),
    );
    if config.bridge.enable_panic {
        add(
            "police",
            Component::Switch,
            format!("{} Panic - Police", ident.name),
            Some("mdi:police-badge"),
        );
        add("fire", Component::Switch, format!("{} Panic - Fire", ident.name), Some("mdi:fire"));
    }

    (registry, entities, discovery)
}

/// The security panel actor.
pub struct SecurityPanel<A, P> {
    ctx: DeviceContext<P>,
    api: Arc<A>,
    tx: mpsc::Sender<DeviceMsg>,
    /// Shared with in-flight confirmation loops, which re-read it per attempt.
    bypass_enabled: Arc<AtomicBool>,
    enable_panic: bool,
    exit_delay: Option<JoinHandle<()>>,
    arm_task: Option<JoinHandle<()>>,
}

impl<A: AlarmApi, P: MqttPublish> SecurityPanel<A, P> {
    /// Build the panel and spawn its actor task.
    pub fn spawn(config: &Config, publisher: P, api: Arc<A>, ident: DeviceIdent) -> DeviceHandle {
        let (tx, rx) = mpsc::channel(64);
        let (registry, entities, discovery) = build_discovery(config, &ident);
        let ctx = DeviceContext::new(
            publisher,
            &config.bridge.ring_topic,
            "alarm",
            &ident,
            registry,
            entities,
            discovery,
        );
        let handle = DeviceHandle::new(tx.clone(), ctx.device_topic.clone(), ctx.command_topics());
        let panel = Self {
            ctx,
            api,
            tx,
            bypass_enabled: Arc::new(AtomicBool::new(false)),
            enable_panic: config.bridge.enable_panic,
            exit_delay: None,
            arm_task: None,
        };
        tokio::spawn(panel.run(rx));
        handle
    }

    async fn run(mut self, mut rx: mpsc::Receiver<DeviceMsg>) {
        while let Some(msg) = rx.recv().await {
            let result = match msg {
                DeviceMsg::Activate { connected: true } => self.activate().await,
                DeviceMsg::Activate { connected: false } => {
                    self.ctx.set_offline().await.map(|_| ())
                }
                DeviceMsg::Command { entity, payload } => {
                    self.dispatch(&entity, &payload).await;
                    Ok(())
                }
                DeviceMsg::ChangeEvent => {
                    if self.ctx.availability() == Availability::Online {
                        self.publish_data(true).await
                    } else {
                        Ok(())
                    }
                }
                DeviceMsg::ExitDelayElapsed => self.exit_delay_elapsed().await,
            };
            if let Err(e) = result {
                warn!(device = %self.ctx.device_topic, "panel publish failed: {e}");
            }
        }
        self.cancel_exit_delay();
        if let Some(task) = self.arm_task.take() {
            task.abort();
        }
    }

    /// Location came online: discovery, availability, full state publish,
    /// then wire subscriptions once.
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

    async fn dispatch(&mut self, entity: &str, payload: &str) {
        match entity {
            "alarm" => self.set_alarm_mode(payload),
            "siren" => self.set_siren_mode(payload),
            "bypass" => {
                if let Err(e) = self.set_bypass_mode(payload).await {
                    warn!(device = %self.ctx.device_topic, "bypass republish failed: {e}");
                }
            }
            "police" if self.enable_panic => self.set_police_mode(payload),
            "fire" if self.enable_panic => self.set_fire_mode(payload),
            _ => {
                debug!(device = %self.ctx.device_topic, entity, "received message to unknown command topic");
            }
        }
    }

    /// Publish every entity state, deriving the panel state fresh from the
    /// device snapshot. Incremental cycles suppress unchanged values.
    async fn publish_data(&mut self, is_change_event: bool) -> Result<()> {
        let data = self.api.alarm_data();
        let state = derive_panel_state(&data, Utc::now());

        // While arming, keep a one-shot watcher armed for the remaining exit
        // delay; any cycle resolving to another state cancels it so a stale
        // timer cannot double-publish.
        if let PanelState::Arming { remaining } = state {
            self.schedule_exit_delay(remaining);
        } else {
            self.cancel_exit_delay();
        }

        self.ctx.publish_state("alarm", state.as_str(), is_change_event).await?;
        self.ctx
            .publish_state("siren", on_off(data.siren_on), is_change_event)
            .await?;
        let bypass = self.bypass_enabled.load(Ordering::SeqCst);
        self.ctx.publish_state("bypass", on_off(bypass), is_change_event).await?;

        if self.enable_panic {
            let (police, fire) = panic_states(data.alarm_info);
            if police {
                debug!(device = %self.ctx.device_topic, "burglar alarm is active");
            }
            if fire {
                debug!(device = %self.ctx.device_topic, "fire alarm is active");
            }
            self.ctx.publish_state("police", on_off(police), is_change_event).await?;
            self.ctx.publish_state("fire", on_off(fire), is_change_event).await?;
        }
        Ok(())
    }

    fn schedule_exit_delay(&mut self, remaining: StdDuration) {
        self.cancel_exit_delay();
        let tx = self.tx.clone();
        self.exit_delay = Some(tokio::spawn(async move {
            sleep(remaining).await;
            let _ = tx.send(DeviceMsg::ExitDelayElapsed).await;
        }));
    }

    fn cancel_exit_delay(&mut self) {
        if let Some(task) = self.exit_delay.take() {
            task.abort();
        }
    }

    /// The exit-delay watcher fired. Re-read mode and deadline: no further
    /// change-event is guaranteed to arrive exactly at delay expiry, so this
    /// publishes `armed_away` directly when the window has closed.
    async fn exit_delay_elapsed(&mut self) -> Result<()> {
        self.exit_delay = None;
        // Availability may have flipped while the timer slept.
        if self.ctx.availability() != Availability::Online {
            return Ok(());
        }
        let data = self.api.alarm_data();
        if data.mode == ArmMode::All && exit_delay_remaining(&data, Utc::now()).is_none() {
            self.ctx
                .publish_state("alarm", PanelState::ArmedAway.as_str(), false)
                .await?;
        }
        Ok(())
    }

    /// Start a confirmation loop for an arm/disarm command.
    ///
    /// A new command supersedes any in-flight loop so two retry loops never
    /// race on the same panel's target mode.
    fn set_alarm_mode(&mut self, payload: &str) {
        debug!(device = %self.ctx.device_topic, payload, "received set alarm mode command");
        let Some(cmd) = ArmCommand::parse(payload) else {
            debug!(device = %self.ctx.device_topic, "cannot set alarm mode: unknown command token");
            return;
        };
        if let Some(task) = self.arm_task.take() {
            if !task.is_finished() {
                info!(device = %self.ctx.device_topic, "superseding in-flight arm request");
            }
            task.abort();
        }
        let api = Arc::clone(&self.api);
        let bypass_enabled = Arc::clone(&self.bypass_enabled);
        let device = self.ctx.device_topic.clone();
        self.arm_task = Some(tokio::spawn(async move {
            match confirm_arm_mode(&*api, cmd, &bypass_enabled).await {
                ArmOutcome::Confirmed { attempts } => {
                    debug!(device = %device, attempts, "alarm entered {} mode", cmd.token());
                }
                ArmOutcome::Exhausted => {
                    warn!(
                        device = %device,
                        "alarm could not enter {} mode after {MAX_ARM_ATTEMPTS} attempts, giving up",
                        cmd.token()
                    );
                }
            }
        }));
    }

    fn set_siren_mode(&self, payload: &str) {
        let api = Arc::clone(&self.api);
        match payload.to_lowercase().as_str() {
            "on" => {
                debug!(device = %self.ctx.device_topic, "activating siren");
                tokio::spawn(async move {
                    if let Err(e) = api.sound_siren().await {
                        debug!("sound siren failed: {e}");
                    }
                });
            }
            "off" => {
                debug!(device = %self.ctx.device_topic, "deactivating siren");
                tokio::spawn(async move {
                    if let Err(e) = api.silence_siren().await {
                        debug!("silence siren failed: {e}");
                    }
                });
            }
            _ => debug!(device = %self.ctx.device_topic, "received invalid command for siren"),
        }
    }

    /// Toggle the purely local bypass mode. No remote call: the flag only
    /// affects which bypass ids the next arm attempt computes. A valid
    /// toggle republishes all panel state so the hub reflects the switch
    /// immediately, but only while the device is online.
    async fn set_bypass_mode(&mut self, payload: &str) -> Result<()> {
        match payload.to_lowercase().as_str() {
            "on" => {
                debug!(device = %self.ctx.device_topic, "enabling arming bypass mode");
                self.bypass_enabled.store(true, Ordering::SeqCst);
            }
            "off" => {
                debug!(device = %self.ctx.device_topic, "disabling arming bypass mode");
                self.bypass_enabled.store(false, Ordering::SeqCst);
            }
            _ => {
                debug!(device = %self.ctx.device_topic, "received invalid command for arming bypass mode");
                return Ok(());
            }
        }
        // The flag itself is local and survives offline periods; the
        // republish waits for the next activation.
        if self.ctx.availability() != Availability::Online {
            return Ok(());
        }
        self.publish_data(false).await
    }

    fn set_police_mode(&self, payload: &str) {
        let api = Arc::clone(&self.api);
        match payload.to_lowercase().as_str() {
            "on" => {
                debug!(device = %self.ctx.device_topic, "activating burglar alarm");
                tokio::spawn(async move {
                    if let Err(e) = api.trigger_burglar_alarm().await {
                        debug!("trigger burglar alarm failed: {e}");
                    }
                });
            }
            "off" => {
                debug!(device = %self.ctx.device_topic, "deactivating burglar alarm");
                tokio::spawn(async move {
                    if let Err(e) = api.set_alarm_mode(ArmMode::None).await {
                        debug!("deactivate burglar alarm failed: {e}");
                    }
                });
            }
            _ => debug!(device = %self.ctx.device_topic, "received invalid command for panic"),
        }
    }

    fn set_fire_mode(&self, payload: &str) {
        let api = Arc::clone(&self.api);
        match payload.to_lowercase().as_str() {
            "on" => {
                debug!(device = %self.ctx.device_topic, "activating fire alarm");
                tokio::spawn(async move {
                    if let Err(e) = api.trigger_fire_alarm().await {
                        debug!("trigger fire alarm failed: {e}");
                    }
                });
            }
            "off" => {
                debug!(device = %self.ctx.device_topic, "deactivating fire alarm");
                tokio::spawn(async move {
                    if let Err(e) = api.set_alarm_mode(ArmMode::None).await {
                        debug!("deactivate fire alarm failed: {e}");
                    }
                });
            }
            _ => debug!(device = %self.ctx.device_topic, "received invalid command for panic"),
        }
    }
}

fn on_off(value: bool) -> &'static str {
    if value {
        "ON"
    } else {
        "OFF"
    }
}
