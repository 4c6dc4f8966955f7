//! Device state records exchanged with clients.
//!
//! Every field is optional on the wire and falls back to its zero value, and
//! every enum falls back to its first variant. Enums decode from either their
//! name or their numeric value and always encode as the name.

use std::fmt;

use serde::{
    Deserialize, Deserializer, Serialize,
    de::{self, Unexpected, Visitor},
};

// ── Enum decoding ────────────────────────────────────────────────────────────

struct WireEnumVisitor<T: 'static> {
    kind: &'static str,
    values: &'static [T],
    names: &'static [&'static str],
}

impl<T: Copy> Visitor<'_> for WireEnumVisitor<T> {
    type Value = T;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a {} name or number", self.kind)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<T, E> {
        self.names
            .iter()
            .zip(self.values)
            .find(|(name, _)| **name == v)
            .map(|(_, value)| *value)
            .ok_or_else(|| E::unknown_variant(v, self.names))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<T, E> {
        usize::try_from(v)
            .ok()
            .and_then(|i| self.values.get(i))
            .copied()
            .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(v), &self))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<T, E> {
        match u64::try_from(v) {
            Ok(v) => self.visit_u64(v),
            Err(_) => Err(E::invalid_value(Unexpected::Signed(v), &self)),
        }
    }
}

/// `ALL` and `NAMES` list the variants in numeric order.
macro_rules! decode_by_name_or_number {
    ($ty:ty, $kind:literal) => {
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                deserializer.deserialize_any(WireEnumVisitor {
                    kind: $kind,
                    values: &Self::ALL,
                    names: &Self::NAMES,
                })
            }
        }
    };
}

/// Request of every pure read, reply of every input injection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

// ── Rotation ─────────────────────────────────────────────────────────────────

/// Display orientation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkinRotation {
    /// 0°
    #[default]
    Portrait,
    /// 90°
    Landscape,
    /// 180°
    ReversePortrait,
    /// 270°
    ReverseLandscape,
}

impl SkinRotation {
    pub const ALL: [Self; 4] = [
        Self::Portrait,
        Self::Landscape,
        Self::ReversePortrait,
        Self::ReverseLandscape,
    ];
    pub const NAMES: [&'static str; 4] = [
        "PORTRAIT",
        "LANDSCAPE",
        "REVERSE_PORTRAIT",
        "REVERSE_LANDSCAPE",
    ];
}

decode_by_name_or_number!(SkinRotation, "rotation");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Rotation {
    pub rotation: SkinRotation,
}

// ── Battery ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryCharger {
    #[default]
    None,
    Ac,
    Usb,
    Wireless,
}

impl BatteryCharger {
    pub const ALL: [Self; 4] = [Self::None, Self::Ac, Self::Usb, Self::Wireless];
    pub const NAMES: [&'static str; 4] = ["NONE", "AC", "USB", "WIRELESS"];
}

decode_by_name_or_number!(BatteryCharger, "charger");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryHealth {
    #[default]
    Good,
    Failed,
    Dead,
    Overvoltage,
    Overheated,
    Unknown,
}

impl BatteryHealth {
    pub const ALL: [Self; 6] = [
        Self::Good,
        Self::Failed,
        Self::Dead,
        Self::Overvoltage,
        Self::Overheated,
        Self::Unknown,
    ];
    pub const NAMES: [&'static str; 6] = [
        "GOOD",
        "FAILED",
        "DEAD",
        "OVERVOLTAGE",
        "OVERHEATED",
        "UNKNOWN",
    ];
}

decode_by_name_or_number!(BatteryHealth, "battery health");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryStatus {
    #[default]
    Unknown,
    Charging,
    Discharging,
    NotCharging,
    Full,
}

impl BatteryStatus {
    pub const ALL: [Self; 5] = [
        Self::Unknown,
        Self::Charging,
        Self::Discharging,
        Self::NotCharging,
        Self::Full,
    ];
    pub const NAMES: [&'static str; 5] = [
        "UNKNOWN",
        "CHARGING",
        "DISCHARGING",
        "NOT_CHARGING",
        "FULL",
    ];
}

decode_by_name_or_number!(BatteryStatus, "battery status");

/// Battery readings. When `is_present` is false the other fields still carry
/// the last values the battery agent holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatteryState {
    pub has_battery: bool,
    pub is_present: bool,
    pub charger: BatteryCharger,
    pub charge_level: i32,
    pub health: BatteryHealth,
    pub status: BatteryStatus,
}

// ── GPS ──────────────────────────────────────────────────────────────────────

/// Location fix. Values are passed through to the location agent unchecked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GpsState {
    pub passive_update: bool,
    /// Degrees.
    pub latitude: f64,
    /// Degrees.
    pub longitude: f64,
    /// Meters.
    pub elevation: f64,
    /// Knots.
    pub speed: f64,
    /// Degrees clockwise from north.
    pub heading: f64,
    pub satellites: i32,
}

// ── Input injection ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TouchEvent {
    pub is_touching: bool,
    pub touch_id: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KeyEvent {
    pub key: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MouseEvent {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Bit mask of pressed buttons.
    pub buttons: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RotaryEvent {
    pub delta: i32,
}

// ── VM configuration ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VmHypervisorType {
    #[default]
    Unknown,
    None,
    Kvm,
    Haxm,
    Hvf,
    Whpx,
    Gvm,
}

impl VmHypervisorType {
    pub const ALL: [Self; 7] = [
        Self::Unknown,
        Self::None,
        Self::Kvm,
        Self::Haxm,
        Self::Hvf,
        Self::Whpx,
        Self::Gvm,
    ];
    pub const NAMES: [&'static str; 7] = ["UNKNOWN", "NONE", "KVM", "HAXM", "HVF", "WHPX", "GVM"];
}

decode_by_name_or_number!(VmHypervisorType, "hypervisor");

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VmConfiguration {
    pub hypervisor_type: VmHypervisorType,
    pub number_of_cpu_cores: i32,
    pub ram_size_bytes: i64,
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    #[test]
    fn battery_uses_camel_case_and_enum_names() {
        let state = BatteryState {
            has_battery: true,
            is_present: true,
            charger: BatteryCharger::Ac,
            charge_level: 42,
            health: BatteryHealth::Good,
            status: BatteryStatus::NotCharging,
        };
        assert_eq!(
            serde_json::to_value(state).unwrap(),
            json!({
                "hasBattery": true,
                "isPresent": true,
                "charger": "AC",
                "chargeLevel": 42,
                "health": "GOOD",
                "status": "NOT_CHARGING",
            })
        );
    }

    #[test]
    fn missing_fields_take_zero_values() {
        let state: BatteryState = serde_json::from_value(json!({"chargeLevel": 7})).unwrap();
        assert_eq!(state, BatteryState {
            charge_level: 7,
            ..BatteryState::default()
        });

        let rotation: Rotation = serde_json::from_value(json!({})).unwrap();
        assert_eq!(rotation.rotation, SkinRotation::Portrait);
    }

    #[test]
    fn unknown_enum_name_is_rejected() {
        let result = serde_json::from_value::<Rotation>(json!({"rotation": "SIDEWAYS"}));
        assert!(result.is_err());
    }

    #[test]
    fn enums_decode_from_numbers() {
        let rotation: Rotation = serde_json::from_value(json!({"rotation": 1})).unwrap();
        assert_eq!(rotation.rotation, SkinRotation::Landscape);

        let state: BatteryState =
            serde_json::from_value(json!({"charger": 2, "health": "DEAD", "status": 4})).unwrap();
        assert_eq!(state.charger, BatteryCharger::Usb);
        assert_eq!(state.health, BatteryHealth::Dead);
        assert_eq!(state.status, BatteryStatus::Full);

        for bad in [json!(4), json!(-1), json!(1.5), json!(true)] {
            assert!(serde_json::from_value::<SkinRotation>(bad).is_err());
        }
    }

    #[test]
    fn names_match_encoded_form() {
        fn check<T: Serialize + Copy>(all: &[T], names: &[&str]) {
            assert_eq!(all.len(), names.len());
            for (value, name) in all.iter().zip(names) {
                assert_eq!(serde_json::to_value(value).unwrap(), *name);
            }
        }
        check(&SkinRotation::ALL, &SkinRotation::NAMES);
        check(&BatteryCharger::ALL, &BatteryCharger::NAMES);
        check(&BatteryHealth::ALL, &BatteryHealth::NAMES);
        check(&BatteryStatus::ALL, &BatteryStatus::NAMES);
        check(&VmHypervisorType::ALL, &VmHypervisorType::NAMES);
    }

    #[test]
    fn vm_configuration_field_names() {
        let config = VmConfiguration {
            hypervisor_type: VmHypervisorType::Kvm,
            number_of_cpu_cores: 4,
            ram_size_bytes: 2 << 30,
        };
        let value = serde_json::to_value(config).unwrap();
        assert_eq!(value["hypervisorType"], "KVM");
        assert_eq!(value["numberOfCpuCores"], 4);
        assert_eq!(value["ramSizeBytes"], 2_i64 << 30);
    }
}
