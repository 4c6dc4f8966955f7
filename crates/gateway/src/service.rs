//! The gateway service: one method per RPC.
//!
//! Methods are synchronous and touch nothing but the bound agents, so any of
//! them may run concurrently with any other. No per-call state survives a
//! call, and no call fails because of what an agent did with it.

use {
    chrono::Utc,
    devctl_agents::DeviceAgents,
    devctl_protocol::{
        BatteryState, Empty, GpsState, KeyEvent, MouseEvent, RotaryEvent, Rotation, TouchEvent,
        VmConfiguration,
    },
    tracing::debug,
};

use crate::adapter::{self, apply_then_read};

#[derive(Debug)]
pub struct GatewayService {
    agents: DeviceAgents,
}

impl GatewayService {
    pub fn new(agents: DeviceAgents) -> Self {
        Self { agents }
    }

    pub fn agents(&self) -> &DeviceAgents {
        &self.agents
    }

    // ── Rotation ─────────────────────────────────────────────────────────

    pub fn set_rotation(&self, request: Rotation) -> Rotation {
        debug!(?request, "SetRotation");
        apply_then_read(
            || adapter::apply_rotation(self.agents.rotation.as_ref(), request),
            || self.get_rotation(),
        )
    }

    pub fn get_rotation(&self) -> Rotation {
        let reply = adapter::read_rotation(self.agents.rotation.as_ref());
        debug!(?reply, "GetRotation");
        reply
    }

    // ── Battery ──────────────────────────────────────────────────────────

    pub fn set_battery(&self, request: BatteryState) -> BatteryState {
        debug!(?request, "SetBattery");
        apply_then_read(
            || adapter::apply_battery(self.agents.battery.as_ref(), &request),
            || self.get_battery(),
        )
    }

    pub fn get_battery(&self) -> BatteryState {
        let reply = adapter::read_battery(self.agents.battery.as_ref());
        debug!(?reply, "GetBattery");
        reply
    }

    // ── GPS ──────────────────────────────────────────────────────────────

    pub fn set_gps(&self, request: GpsState) -> GpsState {
        debug!(?request, "SetGps");
        apply_then_read(
            || adapter::apply_gps(self.agents.location.as_ref(), &request, Utc::now()),
            || self.get_gps(),
        )
    }

    pub fn get_gps(&self) -> GpsState {
        let reply = adapter::read_gps(self.agents.location.as_ref());
        debug!(?reply, "GetGps");
        reply
    }

    // ── Input injection ──────────────────────────────────────────────────

    pub fn send_touch(&self, event: TouchEvent) -> Empty {
        debug!(?event, "SendTouch");
        adapter::send_touch(self.agents.input.as_ref(), event);
        Empty {}
    }

    pub fn send_key(&self, event: KeyEvent) -> Empty {
        debug!(?event, "SendKey");
        adapter::send_key(self.agents.input.as_ref(), event);
        Empty {}
    }

    pub fn send_mouse(&self, event: MouseEvent) -> Empty {
        debug!(?event, "SendMouse");
        adapter::send_mouse(self.agents.input.as_ref(), event);
        Empty {}
    }

    pub fn send_rotary(&self, event: RotaryEvent) -> Empty {
        debug!(?event, "SendRotary");
        adapter::send_rotary(self.agents.input.as_ref(), event);
        Empty {}
    }

    // ── VM ───────────────────────────────────────────────────────────────

    pub fn get_vm_configuration(&self) -> VmConfiguration {
        let reply = adapter::vm_configuration(self.agents.vm.vm_configuration());
        debug!(?reply, "GetVmConfiguration");
        reply
    }
}
