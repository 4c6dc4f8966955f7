//! Device state adapter: maps wire records onto agent calls and back.
//!
//! Each `apply_*` pushes one request into the agents, each `read_*` builds a
//! reply from what the agents hold at call time. Nothing is cached here.

use {
    chrono::{DateTime, Utc},
    devctl_agents::{
        BatteryAgent, ChargeStatus, Charger, DisplayRotation, Health, Hypervisor, InputAgent,
        LocationAgent, LocationFix, RotationAgent, VmConfig,
    },
    devctl_protocol::{
        BatteryCharger, BatteryHealth, BatteryState, BatteryStatus, GpsState, KeyEvent,
        MouseEvent, RotaryEvent, Rotation, SkinRotation, TouchEvent, VmConfiguration,
        VmHypervisorType,
    },
};

/// Run `apply`, then answer with `read`. Mutating calls reply with the state
/// the agent actually committed, never with the request.
pub fn apply_then_read<T>(apply: impl FnOnce(), read: impl FnOnce() -> T) -> T {
    apply();
    read()
}

// ── Enum conversions ─────────────────────────────────────────────────────────

pub fn rotation_to_agent(rotation: SkinRotation) -> DisplayRotation {
    match rotation {
        SkinRotation::Portrait => DisplayRotation::Deg0,
        SkinRotation::Landscape => DisplayRotation::Deg90,
        SkinRotation::ReversePortrait => DisplayRotation::Deg180,
        SkinRotation::ReverseLandscape => DisplayRotation::Deg270,
    }
}

pub fn rotation_from_agent(rotation: DisplayRotation) -> SkinRotation {
    match rotation {
        DisplayRotation::Deg0 => SkinRotation::Portrait,
        DisplayRotation::Deg90 => SkinRotation::Landscape,
        DisplayRotation::Deg180 => SkinRotation::ReversePortrait,
        DisplayRotation::Deg270 => SkinRotation::ReverseLandscape,
    }
}

pub fn charger_to_agent(charger: BatteryCharger) -> Charger {
    match charger {
        BatteryCharger::None => Charger::None,
        BatteryCharger::Ac => Charger::Ac,
        BatteryCharger::Usb => Charger::Usb,
        BatteryCharger::Wireless => Charger::Wireless,
    }
}

pub fn charger_from_agent(charger: Charger) -> BatteryCharger {
    match charger {
        Charger::None => BatteryCharger::None,
        Charger::Ac => BatteryCharger::Ac,
        Charger::Usb => BatteryCharger::Usb,
        Charger::Wireless => BatteryCharger::Wireless,
    }
}

pub fn health_to_agent(health: BatteryHealth) -> Health {
    match health {
        BatteryHealth::Good => Health::Good,
        BatteryHealth::Failed => Health::Failed,
        BatteryHealth::Dead => Health::Dead,
        BatteryHealth::Overvoltage => Health::Overvoltage,
        BatteryHealth::Overheated => Health::Overheated,
        BatteryHealth::Unknown => Health::Unknown,
    }
}

pub fn health_from_agent(health: Health) -> BatteryHealth {
    match health {
        Health::Good => BatteryHealth::Good,
        Health::Failed => BatteryHealth::Failed,
        Health::Dead => BatteryHealth::Dead,
        Health::Overvoltage => BatteryHealth::Overvoltage,
        Health::Overheated => BatteryHealth::Overheated,
        Health::Unknown => BatteryHealth::Unknown,
    }
}

pub fn status_to_agent(status: BatteryStatus) -> ChargeStatus {
    match status {
        BatteryStatus::Unknown => ChargeStatus::Unknown,
        BatteryStatus::Charging => ChargeStatus::Charging,
        BatteryStatus::Discharging => ChargeStatus::Discharging,
        BatteryStatus::NotCharging => ChargeStatus::NotCharging,
        BatteryStatus::Full => ChargeStatus::Full,
    }
}

pub fn status_from_agent(status: ChargeStatus) -> BatteryStatus {
    match status {
        ChargeStatus::Unknown => BatteryStatus::Unknown,
        ChargeStatus::Charging => BatteryStatus::Charging,
        ChargeStatus::Discharging => BatteryStatus::Discharging,
        ChargeStatus::NotCharging => BatteryStatus::NotCharging,
        ChargeStatus::Full => BatteryStatus::Full,
    }
}

pub fn hypervisor_from_agent(hypervisor: Hypervisor) -> VmHypervisorType {
    match hypervisor {
        Hypervisor::Unknown => VmHypervisorType::Unknown,
        Hypervisor::None => VmHypervisorType::None,
        Hypervisor::Kvm => VmHypervisorType::Kvm,
        Hypervisor::Haxm => VmHypervisorType::Haxm,
        Hypervisor::Hvf => VmHypervisorType::Hvf,
        Hypervisor::Whpx => VmHypervisorType::Whpx,
        Hypervisor::Gvm => VmHypervisorType::Gvm,
    }
}

// ── Rotation ─────────────────────────────────────────────────────────────────

pub fn apply_rotation(agent: &dyn RotationAgent, request: Rotation) {
    agent.rotate(rotation_to_agent(request.rotation));
}

pub fn read_rotation(agent: &dyn RotationAgent) -> Rotation {
    Rotation {
        rotation: rotation_from_agent(agent.rotation()),
    }
}

// ── Battery ──────────────────────────────────────────────────────────────────

/// Applies every field in turn. The agent's charging flag follows `status`.
pub fn apply_battery(agent: &dyn BatteryAgent, request: &BatteryState) {
    agent.set_has_battery(request.has_battery);
    agent.set_present(request.is_present);
    agent.set_charging(request.status == BatteryStatus::Charging);
    agent.set_charger(charger_to_agent(request.charger));
    agent.set_charge_level(request.charge_level);
    agent.set_health(health_to_agent(request.health));
    agent.set_status(status_to_agent(request.status));
}

pub fn read_battery(agent: &dyn BatteryAgent) -> BatteryState {
    BatteryState {
        has_battery: agent.has_battery(),
        is_present: agent.present(),
        charger: charger_from_agent(agent.charger()),
        charge_level: agent.charge_level(),
        health: health_from_agent(agent.health()),
        status: status_from_agent(agent.status()),
    }
}

// ── GPS ──────────────────────────────────────────────────────────────────────

pub fn apply_gps(agent: &dyn LocationAgent, request: &GpsState, timestamp: DateTime<Utc>) {
    agent.set_passive_update(request.passive_update);
    agent.send_location(
        LocationFix {
            latitude: request.latitude,
            longitude: request.longitude,
            elevation: request.elevation,
            speed: request.speed,
            heading: request.heading,
            satellites: request.satellites,
        },
        timestamp,
    );
}

pub fn read_gps(agent: &dyn LocationAgent) -> GpsState {
    let passive_update = agent.passive_update();
    let fix = agent.location();
    GpsState {
        passive_update,
        latitude: fix.latitude,
        longitude: fix.longitude,
        elevation: fix.elevation,
        speed: fix.speed,
        heading: fix.heading,
        satellites: fix.satellites,
    }
}

// ── Input ────────────────────────────────────────────────────────────────────

pub fn send_touch(agent: &dyn InputAgent, event: TouchEvent) {
    agent.set_touch(event.is_touching, event.touch_id);
}

pub fn send_key(agent: &dyn InputAgent, event: KeyEvent) {
    agent.send_key_code(event.key);
}

pub fn send_mouse(agent: &dyn InputAgent, event: MouseEvent) {
    agent.send_mouse_event(event.x, event.y, event.z, event.buttons);
}

pub fn send_rotary(agent: &dyn InputAgent, event: RotaryEvent) {
    agent.send_rotary_event(event.delta);
}

// ── VM ───────────────────────────────────────────────────────────────────────

pub fn vm_configuration(config: VmConfig) -> VmConfiguration {
    VmConfiguration {
        hypervisor_type: hypervisor_from_agent(config.hypervisor),
        number_of_cpu_cores: config.cpu_cores,
        ram_size_bytes: config.ram_bytes,
    }
}
