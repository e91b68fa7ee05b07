// MIT License - Copyright (c) 2026 Peter Wright

//! Test doubles shared by the in-module test suites.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::api::{
    AlarmApi, AlarmData, ArmMode, ChangeEvents, ChimeApi, ChimeData, DeviceId, SensorSnapshot,
};
use crate::error::{BridgeError, Result};
use crate::mqtt::MqttPublish;

/// Install a log subscriber for the test run. Every test may call this;
/// only the first call installs anything. `RUST_LOG` overrides the default
/// `debug` filter.
pub fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .try_init();
}

/// Records every publish/subscribe instead of touching a broker.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(String, String, bool)>>,
    subscribed: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    /// All (topic, payload, retain) publishes in order.
    pub fn published(&self) -> Vec<(String, String, bool)> {
        self.published.lock().unwrap().clone()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.subscribed.lock().unwrap().clone()
    }

    /// Payloads published to one topic, in order.
    pub fn payloads_for(&self, topic: &str) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _, _)| t == topic)
            .map(|(_, payload, _)| payload.clone())
            .collect()
    }
}

impl MqttPublish for RecordingPublisher {
    async fn publish(&self, topic: &str, payload: &str, retain: bool) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string(), retain));
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<()> {
        self.subscribed.lock().unwrap().push(topic.to_string());
        Ok(())
    }
}

/// Scripted alarm API: serves a mutable snapshot, counts every call, and can
/// flip the observed mode to a target after a set number of arm commands.
pub struct FakeAlarm {
    data: Mutex<AlarmData>,
    sensors: Mutex<Vec<SensorSnapshot>>,
    events: broadcast::Sender<()>,
    /// After this many arm/disarm calls, the observed mode becomes the
    /// requested target. `None` means the backend never complies.
    pub comply_after: Option<u32>,
    pub arm_calls: AtomicU32,
    pub device_queries: AtomicU32,
    pub siren_calls: AtomicU32,
    pub panic_calls: AtomicU32,
    pub fail_commands: AtomicBool,
    pub last_bypass_ids: Mutex<Vec<DeviceId>>,
}

impl FakeAlarm {
    pub fn new(comply_after: Option<u32>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            data: Mutex::new(AlarmData::default()),
            sensors: Mutex::new(Vec::new()),
            events,
            comply_after,
            arm_calls: AtomicU32::new(0),
            device_queries: AtomicU32::new(0),
            siren_calls: AtomicU32::new(0),
            panic_calls: AtomicU32::new(0),
            fail_commands: AtomicBool::new(false),
            last_bypass_ids: Mutex::new(Vec::new()),
        }
    }

    pub fn set_data(&self, data: AlarmData) {
        *self.data.lock().unwrap() = data;
    }

    pub fn set_sensors(&self, sensors: Vec<SensorSnapshot>) {
        *self.sensors.lock().unwrap() = sensors;
    }

    pub fn push_change_event(&self) {
        let _ = self.events.send(());
    }

    fn record_arm(&self, target: ArmMode, bypass_ids: &[DeviceId]) -> Result<()> {
        let calls = self.arm_calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_bypass_ids.lock().unwrap() = bypass_ids.to_vec();
        if let Some(after) = self.comply_after {
            if calls >= after {
                self.data.lock().unwrap().mode = target;
            }
        }
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(BridgeError::remote("backend rejected command"));
        }
        Ok(())
    }
}

impl AlarmApi for FakeAlarm {
    fn alarm_data(&self) -> AlarmData {
        self.data.lock().unwrap().clone()
    }

    async fn devices(&self) -> Result<Vec<SensorSnapshot>> {
        self.device_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.sensors.lock().unwrap().clone())
    }

    async fn disarm(&self) -> Result<()> {
        self.record_arm(ArmMode::None, &[])
    }

    async fn arm_home(&self, bypass_ids: &[DeviceId]) -> Result<()> {
        self.record_arm(ArmMode::Some, bypass_ids)
    }

    async fn arm_away(&self, bypass_ids: &[DeviceId]) -> Result<()> {
        self.record_arm(ArmMode::All, bypass_ids)
    }

    async fn sound_siren(&self) -> Result<()> {
        self.siren_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn silence_siren(&self) -> Result<()> {
        self.siren_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn trigger_burglar_alarm(&self) -> Result<()> {
        self.panic_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn trigger_fire_alarm(&self) -> Result<()> {
        self.panic_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_alarm_mode(&self, mode: ArmMode) -> Result<()> {
        self.panic_calls.fetch_add(1, Ordering::SeqCst);
        self.data.lock().unwrap().mode = mode;
        Ok(())
    }

    fn subscribe(&self) -> ChangeEvents {
        self.events.subscribe()
    }
}

/// Minimal chime API double.
pub struct FakeChime {
    data: Mutex<ChimeData>,
    events: broadcast::Sender<()>,
    pub volume_calls: AtomicU32,
}

impl FakeChime {
    pub fn new(data: ChimeData) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            data: Mutex::new(data),
            events,
            volume_calls: AtomicU32::new(0),
        }
    }

    pub fn set_data(&self, data: ChimeData) {
        *self.data.lock().unwrap() = data;
    }

    pub fn push_change_event(&self) {
        let _ = self.events.send(());
    }
}

impl ChimeApi for FakeChime {
    fn chime_data(&self) -> ChimeData {
        self.data.lock().unwrap().clone()
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        self.volume_calls.fetch_add(1, Ordering::SeqCst);
        self.data.lock().unwrap().volume = volume;
        Ok(())
    }

    fn subscribe(&self) -> ChangeEvents {
        self.events.subscribe()
    }
}
