//! Subsystem agents: the components that own a virtual device's state.
//!
//! Each agent is built and owned outside the gateway and shared with it
//! through [`DeviceAgents`]. Agents take care of their own thread-safety; a
//! gateway may call any of them from many tasks at once and never holds a
//! lock around a call.

pub mod memory;

use std::{fmt, str::FromStr, sync::Arc};

use chrono::{DateTime, Utc};

// ── Rotation ─────────────────────────────────────────────────────────────────

/// Display rotation as applied to the device skin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DisplayRotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl DisplayRotation {
    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Only the four right angles map to a rotation.
    pub fn from_degrees(degrees: u16) -> Option<Self> {
        match degrees {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }
}

pub trait RotationAgent: Send + Sync {
    fn rotate(&self, rotation: DisplayRotation);
    fn rotation(&self) -> DisplayRotation;
}

// ── Battery ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Charger {
    #[default]
    None,
    Ac,
    Usb,
    Wireless,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Health {
    #[default]
    Good,
    Failed,
    Dead,
    Overvoltage,
    Overheated,
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChargeStatus {
    #[default]
    Unknown,
    Charging,
    Discharging,
    NotCharging,
    Full,
}

/// Battery setters and getters. Each field is applied on its own; an agent
/// that needs several fields to change as one unit must arrange that itself.
pub trait BatteryAgent: Send + Sync {
    fn set_has_battery(&self, has_battery: bool);
    fn set_present(&self, present: bool);
    fn set_charging(&self, charging: bool);
    fn set_charger(&self, charger: Charger);
    fn set_charge_level(&self, percent: i32);
    fn set_health(&self, health: Health);
    fn set_status(&self, status: ChargeStatus);

    fn has_battery(&self) -> bool;
    fn present(&self) -> bool;
    fn charging(&self) -> bool;
    fn charger(&self) -> Charger;
    fn charge_level(&self) -> i32;
    fn health(&self) -> Health;
    fn status(&self) -> ChargeStatus;
}

// ── Location ─────────────────────────────────────────────────────────────────

/// One GPS fix. The agent must hand out all fields of a fix together.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub speed: f64,
    pub heading: f64,
    pub satellites: i32,
}

pub trait LocationAgent: Send + Sync {
    fn set_passive_update(&self, enabled: bool);
    fn passive_update(&self) -> bool;
    fn send_location(&self, fix: LocationFix, timestamp: DateTime<Utc>);
    fn location(&self) -> LocationFix;
}

// ── Input injection ──────────────────────────────────────────────────────────

/// One-shot input events. Nothing sent here can be read back.
pub trait InputAgent: Send + Sync {
    fn set_touch(&self, is_touching: bool, finger_id: i32);
    fn send_key_code(&self, code: i32);
    fn send_mouse_event(&self, x: i32, y: i32, z: i32, buttons: i32);
    fn send_rotary_event(&self, delta: i32);
}

// ── VM info ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Hypervisor {
    #[default]
    Unknown,
    None,
    Kvm,
    Haxm,
    Hvf,
    Whpx,
    Gvm,
}

impl Hypervisor {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::None => "none",
            Self::Kvm => "kvm",
            Self::Haxm => "haxm",
            Self::Hvf => "hvf",
            Self::Whpx => "whpx",
            Self::Gvm => "gvm",
        }
    }
}

impl fmt::Display for Hypervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hypervisor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "none" => Ok(Self::None),
            "kvm" => Ok(Self::Kvm),
            "haxm" => Ok(Self::Haxm),
            "hvf" => Ok(Self::Hvf),
            "whpx" => Ok(Self::Whpx),
            "gvm" => Ok(Self::Gvm),
            other => Err(format!("unknown hypervisor: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VmConfig {
    pub hypervisor: Hypervisor,
    pub cpu_cores: i32,
    pub ram_bytes: i64,
}

pub trait VmInfoAgent: Send + Sync {
    fn vm_configuration(&self) -> VmConfig;
}

// ── Agent set ────────────────────────────────────────────────────────────────

/// The full set of agents a gateway is bound to.
#[derive(Clone)]
pub struct DeviceAgents {
    pub rotation: Arc<dyn RotationAgent>,
    pub battery: Arc<dyn BatteryAgent>,
    pub location: Arc<dyn LocationAgent>,
    pub input: Arc<dyn InputAgent>,
    pub vm: Arc<dyn VmInfoAgent>,
}

impl DeviceAgents {
    /// A virtual device whose agents keep their state in memory.
    pub fn in_memory(vm: VmConfig) -> Self {
        Self {
            rotation: Arc::new(memory::MemoryRotation::default()),
            battery: Arc::new(memory::MemoryBattery::default()),
            location: Arc::new(memory::MemoryLocation::default()),
            input: Arc::new(memory::RecordingInput::default()),
            vm: Arc::new(memory::StaticVmInfo::new(vm)),
        }
    }
}

impl fmt::Debug for DeviceAgents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceAgents").finish_non_exhaustive()
    }
}
