// MIT License - Copyright (c) 2026 Peter Wright

//! Remote device API boundary.
//!
//! The Ring client (network calls, authentication, event push) lives outside
//! this crate. These traits describe exactly what the bridge consumes: typed
//! snapshots of locally-observed device state, asynchronous command methods,
//! and a payload-less change-event subscription that triggers a re-read.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::Result;

pub type DeviceId = String;

/// Arming mode reported by the alarm backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArmMode {
    /// `none` - disarmed
    #[default]
    None,
    /// `some` - armed home (perimeter only)
    Some,
    /// `all` - armed away
    All,
}

impl ArmMode {
    /// The wire token (`none`, `some`, `all`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Some => "some",
            Self::All => "all",
        }
    }

    /// Parse a wire token.
    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "none" => Some(Self::None),
            "some" => Some(Self::Some),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

/// Active alarm states reported via `alarmInfo.state`.
///
/// Any of these overrides the mode-derived panel state: `EntryDelay` maps to
/// `pending`, everything else to `triggered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    EntryDelay,
    BurglarAlarm,
    FireAlarm,
    CoAlarm,
    Panic,
    UserVerifiedBurglarAlarm,
    UserVerifiedCoOrFireAlarm,
    BurglarAcceleratedAlarm,
    FireAcceleratedAlarm,
}

impl AlarmState {
    /// The wire token (kebab-case).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntryDelay => "entry-delay",
            Self::BurglarAlarm => "burglar-alarm",
            Self::FireAlarm => "fire-alarm",
            Self::CoAlarm => "co-alarm",
            Self::Panic => "panic",
            Self::UserVerifiedBurglarAlarm => "user-verified-burglar-alarm",
            Self::UserVerifiedCoOrFireAlarm => "user-verified-co-or-fire-alarm",
            Self::BurglarAcceleratedAlarm => "burglar-accelerated-alarm",
            Self::FireAcceleratedAlarm => "fire-accelerated-alarm",
        }
    }

    /// Parse a wire token.
    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "entry-delay" => Some(Self::EntryDelay),
            "burglar-alarm" => Some(Self::BurglarAlarm),
            "fire-alarm" => Some(Self::FireAlarm),
            "co-alarm" => Some(Self::CoAlarm),
            "panic" => Some(Self::Panic),
            "user-verified-burglar-alarm" => Some(Self::UserVerifiedBurglarAlarm),
            "user-verified-co-or-fire-alarm" => Some(Self::UserVerifiedCoOrFireAlarm),
            "burglar-accelerated-alarm" => Some(Self::BurglarAcceleratedAlarm),
            "fire-accelerated-alarm" => Some(Self::FireAcceleratedAlarm),
            _ => None,
        }
    }
}

/// Locally-observed snapshot of the alarm panel's state.
///
/// `alarm_info` is `None` when the backend omits the field; partial data is
/// the neutral default and never an error.
#[derive(Debug, Clone, Default)]
pub struct AlarmData {
    pub mode: ArmMode,
    pub alarm_info: Option<AlarmState>,
    pub siren_on: bool,
    /// Server-provided deadline at which an `all`-mode exit delay expires.
    pub transition_delay_end: Option<DateTime<Utc>>,
}

/// Locally-observed snapshot of a chime's state.
#[derive(Debug, Clone, Default)]
pub struct ChimeData {
    pub volume: u8,
    /// `do_not_disturb.seconds_left`; non-zero means snooze is active.
    pub snooze_seconds_left: u64,
}

/// Sensor device type, used to select bypass candidates when arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    ContactSensor,
    RetrofitZone,
    MotionSensor,
    Other,
}

/// One device from location-level enumeration.
#[derive(Debug, Clone)]
pub struct SensorSnapshot {
    pub id: DeviceId,
    pub name: String,
    pub kind: SensorKind,
    /// Open/triggered condition; faulted contact and retrofit-zone sensors
    /// are bypassed when arming with bypass mode enabled.
    pub faulted: bool,
}

/// Payload-less change-event channel. A received unit means "some property
/// may have changed, re-read the snapshot".
pub type ChangeEvents = tokio::sync::broadcast::Receiver<()>;

/// Remote API surface for one alarm location.
#[allow(async_fn_in_trait)]
pub trait AlarmApi: Send + Sync + 'static {
    /// Current locally-observed panel snapshot. Synchronous by design: the
    /// client caches pushed state, the bridge never blocks on a network read.
    fn alarm_data(&self) -> AlarmData;

    /// Enumerate all devices at the location (bypass-candidate computation).
    fn devices(&self) -> impl Future<Output = Result<Vec<SensorSnapshot>>> + Send;

    fn disarm(&self) -> impl Future<Output = Result<()>> + Send;
    fn arm_home(&self, bypass_ids: &[DeviceId]) -> impl Future<Output = Result<()>> + Send;
    fn arm_away(&self, bypass_ids: &[DeviceId]) -> impl Future<Output = Result<()>> + Send;
    fn sound_siren(&self) -> impl Future<Output = Result<()>> + Send;
    fn silence_siren(&self) -> impl Future<Output = Result<()>> + Send;
    fn trigger_burglar_alarm(&self) -> impl Future<Output = Result<()>> + Send;
    fn trigger_fire_alarm(&self) -> impl Future<Output = Result<()>> + Send;
    fn set_alarm_mode(&self, mode: ArmMode) -> impl Future<Output = Result<()>> + Send;

    /// Subscribe to change events for this device.
    fn subscribe(&self) -> ChangeEvents;
}

/// Remote API surface for one chime.
#[allow(async_fn_in_trait)]
pub trait ChimeApi: Send + Sync + 'static {
    /// Current locally-observed chime snapshot.
    fn chime_data(&self) -> ChimeData;

    fn set_volume(&self, volume: u8) -> impl Future<Output = Result<()>> + Send;

    /// Subscribe to change events for this device.
    fn subscribe(&self) -> ChangeEvents;
}
