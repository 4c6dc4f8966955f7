use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use {
    serde::{Serialize, de::DeserializeOwned},
    tracing::{debug, warn},
};

use devctl_protocol::{Empty, ErrorShape, ResponseFrame, error_codes, methods};

use crate::{service::GatewayService, state::GatewayState};

// ── Types ────────────────────────────────────────────────────────────────────

/// Context passed to every method handler.
pub struct MethodContext {
    pub request_id: String,
    pub method: String,
    pub params: serde_json::Value,
    pub client_conn_id: String,
    pub state: Arc<GatewayState>,
}

/// The result a method handler produces.
pub type MethodResult = Result<serde_json::Value, ErrorShape>;

/// A boxed async method handler.
pub type HandlerFn =
    Box<dyn Fn(MethodContext) -> Pin<Box<dyn Future<Output = MethodResult> + Send>> + Send + Sync>;

/// A service method taking one request record and producing one reply record.
type ServiceCall<Req, Resp> = fn(&GatewayService, Req) -> Resp;

// ── Params ───────────────────────────────────────────────────────────────────

/// Decode the request record. Missing params decode as an empty record.
fn decode_params<T: DeserializeOwned>(method: &str, params: serde_json::Value) -> Result<T, ErrorShape> {
    let params = if params.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        params
    };
    serde_json::from_value(params).map_err(|e| {
        ErrorShape::new(
            error_codes::INVALID_REQUEST,
            format!("invalid params for {method}: {e}"),
        )
    })
}

fn encode_reply<T: Serialize>(method: &str, reply: T) -> MethodResult {
    serde_json::to_value(reply).map_err(|e| {
        ErrorShape::new(
            error_codes::INTERNAL,
            format!("failed to encode {method} reply: {e}"),
        )
    })
}

// ── Method registry ──────────────────────────────────────────────────────────

pub struct MethodRegistry {
    handlers: HashMap<String, HandlerFn>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodRegistry {
    pub fn new() -> Self {
        let mut reg = Self {
            handlers: HashMap::new(),
        };
        reg.register_defaults();
        reg
    }

    pub fn register(&mut self, method: impl Into<String>, handler: HandlerFn) {
        self.handlers.insert(method.into(), handler);
    }

    /// Register a synchronous service method under `method`.
    fn register_call<Req, Resp>(&mut self, method: &'static str, call: ServiceCall<Req, Resp>)
    where
        Req: DeserializeOwned + Send + 'static,
        Resp: Serialize + Send + 'static,
    {
        self.register(
            method,
            Box::new(move |ctx| {
                Box::pin(async move {
                    let request: Req = decode_params(&ctx.method, ctx.params)?;
                    encode_reply(&ctx.method, call(&ctx.state.service, request))
                })
            }),
        );
    }

    pub async fn dispatch(&self, ctx: MethodContext) -> ResponseFrame {
        let method = ctx.method.clone();
        let request_id = ctx.request_id.clone();
        let conn_id = ctx.client_conn_id.clone();

        let Some(handler) = self.handlers.get(&method) else {
            warn!(method, conn_id = %conn_id, "unknown method");
            return ResponseFrame::err(
                &request_id,
                ErrorShape::new(
                    error_codes::INVALID_REQUEST,
                    format!("unknown method: {method}"),
                ),
            );
        };

        debug!(method, request_id = %request_id, conn_id = %conn_id, "dispatching method");
        match handler(ctx).await {
            Ok(payload) => {
                debug!(method, request_id = %request_id, "method ok");
                ResponseFrame::ok(&request_id, payload)
            },
            Err(err) => {
                warn!(method, request_id = %request_id, code = %err.code, msg = %err.message, "method error");
                ResponseFrame::err(&request_id, err)
            },
        }
    }

    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    fn register_defaults(&mut self) {
        self.register_rotation_methods();
        self.register_battery_methods();
        self.register_gps_methods();
        self.register_input_methods();
        self.register_vm_methods();
    }

    fn register_rotation_methods(&mut self) {
        self.register_call(methods::SET_ROTATION, GatewayService::set_rotation);
        self.register_call(methods::GET_ROTATION, |svc: &GatewayService, _: Empty| {
            svc.get_rotation()
        });
    }

    fn register_battery_methods(&mut self) {
        self.register_call(methods::SET_BATTERY, GatewayService::set_battery);
        self.register_call(methods::GET_BATTERY, |svc: &GatewayService, _: Empty| {
            svc.get_battery()
        });
    }

    fn register_gps_methods(&mut self) {
        self.register_call(methods::SET_GPS, GatewayService::set_gps);
        self.register_call(methods::GET_GPS, |svc: &GatewayService, _: Empty| {
            svc.get_gps()
        });
    }

    // Fire-and-forget: each replies with an empty record.
    fn register_input_methods(&mut self) {
        self.register_call(methods::SEND_TOUCH, GatewayService::send_touch);
        self.register_call(methods::SEND_KEY, GatewayService::send_key);
        self.register_call(methods::SEND_MOUSE, GatewayService::send_mouse);
        self.register_call(methods::SEND_ROTARY, GatewayService::send_rotary);
    }

    fn register_vm_methods(&mut self) {
        self.register_call(methods::GET_VM_CONFIGURATION, |svc: &GatewayService, _: Empty| {
            svc.get_vm_configuration()
        });
    }
}
