//! In-memory agents backing a standalone virtual device.
//!
//! Every agent serializes access to its own state behind a mutex, so a
//! concurrent caller always observes some complete earlier write.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use {
    chrono::{DateTime, Utc},
    tracing::{debug, trace},
};

use crate::{
    BatteryAgent, ChargeStatus, Charger, DisplayRotation, Health, InputAgent, LocationAgent,
    LocationFix, RotationAgent, VmConfig, VmInfoAgent,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Rotation ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryRotation {
    current: Mutex<DisplayRotation>,
}

impl RotationAgent for MemoryRotation {
    fn rotate(&self, rotation: DisplayRotation) {
        trace!(degrees = rotation.degrees(), "rotate");
        *lock(&self.current) = rotation;
    }

    fn rotation(&self) -> DisplayRotation {
        *lock(&self.current)
    }
}

// ── Battery ──────────────────────────────────────────────────────────────────

/// Snapshot of everything the battery agent tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatteryReadings {
    pub has_battery: bool,
    pub present: bool,
    pub charging: bool,
    pub charger: Charger,
    pub charge_level: i32,
    pub health: Health,
    pub status: ChargeStatus,
}

impl Default for BatteryReadings {
    fn default() -> Self {
        Self {
            has_battery: true,
            present: true,
            charging: true,
            charger: Charger::Ac,
            charge_level: 100,
            health: Health::Good,
            status: ChargeStatus::Charging,
        }
    }
}

/// Battery whose charge level is clamped to `0..=100`.
#[derive(Debug, Default)]
pub struct MemoryBattery {
    readings: Mutex<BatteryReadings>,
}

impl MemoryBattery {
    pub fn new(readings: BatteryReadings) -> Self {
        Self {
            readings: Mutex::new(readings),
        }
    }

    pub fn readings(&self) -> BatteryReadings {
        *lock(&self.readings)
    }
}

impl BatteryAgent for MemoryBattery {
    fn set_has_battery(&self, has_battery: bool) {
        lock(&self.readings).has_battery = has_battery;
    }

    fn set_present(&self, present: bool) {
        lock(&self.readings).present = present;
    }

    fn set_charging(&self, charging: bool) {
        lock(&self.readings).charging = charging;
    }

    fn set_charger(&self, charger: Charger) {
        lock(&self.readings).charger = charger;
    }

    fn set_charge_level(&self, percent: i32) {
        let clamped = percent.clamp(0, 100);
        if clamped != percent {
            debug!(requested = percent, applied = clamped, "charge level clamped");
        }
        lock(&self.readings).charge_level = clamped;
    }

    fn set_health(&self, health: Health) {
        lock(&self.readings).health = health;
    }

    fn set_status(&self, status: ChargeStatus) {
        lock(&self.readings).status = status;
    }

    fn has_battery(&self) -> bool {
        lock(&self.readings).has_battery
    }

    fn present(&self) -> bool {
        lock(&self.readings).present
    }

    fn charging(&self) -> bool {
        lock(&self.readings).charging
    }

    fn charger(&self) -> Charger {
        lock(&self.readings).charger
    }

    fn charge_level(&self) -> i32 {
        lock(&self.readings).charge_level
    }

    fn health(&self) -> Health {
        lock(&self.readings).health
    }

    fn status(&self) -> ChargeStatus {
        lock(&self.readings).status
    }
}

// ── Location ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LocationState {
    passive_update: bool,
    fix: LocationFix,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct MemoryLocation {
    state: Mutex<LocationState>,
}

impl MemoryLocation {
    /// Timestamp attached to the most recent fix, if any was sent.
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        lock(&self.state).updated_at
    }
}

impl LocationAgent for MemoryLocation {
    fn set_passive_update(&self, enabled: bool) {
        lock(&self.state).passive_update = enabled;
    }

    fn passive_update(&self) -> bool {
        lock(&self.state).passive_update
    }

    fn send_location(&self, fix: LocationFix, timestamp: DateTime<Utc>) {
        trace!(lat = fix.latitude, lon = fix.longitude, %timestamp, "location fix");
        let mut state = lock(&self.state);
        state.fix = fix;
        state.updated_at = Some(timestamp);
    }

    fn location(&self) -> LocationFix {
        lock(&self.state).fix
    }
}

// ── Input ────────────────────────────────────────────────────────────────────

/// An injected input event, as recorded by [`RecordingInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Touch { is_touching: bool, finger_id: i32 },
    Key { code: i32 },
    Mouse { x: i32, y: i32, z: i32, buttons: i32 },
    Rotary { delta: i32 },
}

const MAX_RECORDED_EVENTS: usize = 1024;

/// Input sink that keeps the most recent events for inspection.
#[derive(Debug, Default)]
pub struct RecordingInput {
    events: Mutex<VecDeque<InputEvent>>,
}

impl RecordingInput {
    /// Recorded events, oldest first.
    pub fn events(&self) -> Vec<InputEvent> {
        lock(&self.events).iter().copied().collect()
    }

    fn record(&self, event: InputEvent) {
        debug!(?event, "input injected");
        let mut events = lock(&self.events);
        if events.len() == MAX_RECORDED_EVENTS {
            events.pop_front();
        }
        events.push_back(event);
    }
}

impl InputAgent for RecordingInput {
    fn set_touch(&self, is_touching: bool, finger_id: i32) {
        self.record(InputEvent::Touch {
            is_touching,
            finger_id,
        });
    }

    fn send_key_code(&self, code: i32) {
        self.record(InputEvent::Key { code });
    }

    fn send_mouse_event(&self, x: i32, y: i32, z: i32, buttons: i32) {
        self.record(InputEvent::Mouse { x, y, z, buttons });
    }

    fn send_rotary_event(&self, delta: i32) {
        self.record(InputEvent::Rotary { delta });
    }
}

// ── VM info ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct StaticVmInfo {
    config: VmConfig,
}

impl StaticVmInfo {
    pub fn new(config: VmConfig) -> Self {
        Self { config }
    }
}

impl VmInfoAgent for StaticVmInfo {
    fn vm_configuration(&self) -> VmConfig {
        self.config
    }
}
