//! Gateway: exposes a virtual device's control agents as JSON RPC over HTTP
//! and WebSocket.
//!
//! Lifecycle:
//! 1. Bind agents and pick credentials on a [`GatewayBuilder`]
//! 2. `build()` resolves TLS material, binds the listener, starts serving
//! 3. Calls arrive on `POST /rpc` or `GET /ws` and are routed through the
//!    method registry to [`GatewayService`]
//! 4. [`ServiceHandle::stop`] drains in-flight calls and joins the listener
//!
//! Device behavior lives in the agents crate; this crate only translates
//! between wire records and agent calls.

pub mod adapter;
pub mod credentials;
pub mod error;
pub mod methods;
pub mod server;
pub mod service;
pub mod state;
pub mod ws;

pub use {
    credentials::{ServerCredentials, TlsIdentity},
    error::GatewayError,
    server::{GatewayBuilder, ServiceHandle},
    service::GatewayService,
};
