//! Wire protocol for the device control gateway.
//!
//! Clients send a [`RequestFrame`] naming one of the [`methods`] and get back
//! exactly one [`ResponseFrame`] carrying the same `id`. Frames travel as JSON,
//! either as the body of `POST /rpc` or as WebSocket text messages on `/ws`.

pub mod device;

use serde::{Deserialize, Serialize};

pub use device::*;

pub const PROTOCOL_VERSION: u32 = 1;

/// Default listen port of the gateway.
pub const DEFAULT_PORT: u16 = 8554;

// ── Error codes ──────────────────────────────────────────────────────────────

pub mod error_codes {
    /// The frame could not be decoded, or it names an unknown method.
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";
    /// The handler ran but its reply could not be encoded.
    pub const INTERNAL: &str = "INTERNAL";
}

// ── Method names ─────────────────────────────────────────────────────────────

pub mod methods {
    pub const SET_ROTATION: &str = "SetRotation";
    pub const GET_ROTATION: &str = "GetRotation";
    pub const SET_BATTERY: &str = "SetBattery";
    pub const GET_BATTERY: &str = "GetBattery";
    pub const SET_GPS: &str = "SetGps";
    pub const GET_GPS: &str = "GetGps";
    pub const SEND_TOUCH: &str = "SendTouch";
    pub const SEND_KEY: &str = "SendKey";
    pub const SEND_MOUSE: &str = "SendMouse";
    pub const SEND_ROTARY: &str = "SendRotary";
    pub const GET_VM_CONFIGURATION: &str = "GetVmConfiguration";

    /// Every method the gateway serves.
    pub const ALL: &[&str] = &[
        SET_ROTATION,
        GET_ROTATION,
        SET_BATTERY,
        GET_BATTERY,
        SET_GPS,
        GET_GPS,
        SEND_TOUCH,
        SEND_KEY,
        SEND_MOUSE,
        SEND_ROTARY,
        GET_VM_CONFIGURATION,
    ];
}

// ── Frames ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
}

impl ErrorShape {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ErrorShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A single RPC call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: String,
    pub method: String,
    /// Method-specific request record. Absent or `null` means an empty record.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RequestFrame {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params,
        }
    }
}

/// The reply to a [`RequestFrame`], correlated by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    pub fn ok(id: &str, payload: serde_json::Value) -> Self {
        Self {
            id: id.to_string(),
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn err(id: &str, error: ErrorShape) -> Self {
        Self {
            id: id.to_string(),
            ok: false,
            payload: None,
            error: Some(error),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_without_params_decodes_as_null() {
        let frame: RequestFrame =
            serde_json::from_str(r#"{"id":"1","method":"GetRotation"}"#).unwrap();
        assert_eq!(frame.method, methods::GET_ROTATION);
        assert!(frame.params.is_null());
    }

    #[test]
    fn ok_response_omits_error() {
        let frame = ResponseFrame::ok("7", serde_json::json!({}));
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value, serde_json::json!({"id": "7", "ok": true, "payload": {}}));
    }

    #[test]
    fn error_response_omits_payload() {
        let frame = ResponseFrame::err(
            "8",
            ErrorShape::new(error_codes::INVALID_REQUEST, "unknown method: Reboot"),
        );
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["ok"], false);
        assert!(value.get("payload").is_none());
        assert_eq!(value["error"]["code"], "INVALID_REQUEST");
    }

    #[test]
    fn method_names_are_unique() {
        let mut names = methods::ALL.to_vec();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), methods::ALL.len());
    }
}
