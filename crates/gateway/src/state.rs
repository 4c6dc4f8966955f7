use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Instant,
};

use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::service::GatewayService;

/// Shared gateway runtime state, wrapped in Arc for use across async tasks.
#[derive(Debug)]
pub struct GatewayState {
    /// The service every call is routed to.
    pub service: GatewayService,
    /// Server version string.
    pub version: String,
    /// Hostname reported by `/health`.
    pub hostname: String,
    pub started_at: Instant,
    /// Fired once when the gateway stops; open sessions quit reading on it.
    pub shutdown: CancellationToken,
    /// WebSocket sessions and the calls they dispatched.
    pub sessions: TaskTracker,
    /// Open WebSocket connections.
    connections: AtomicUsize,
}

impl GatewayState {
    pub fn new(service: GatewayService) -> Arc<Self> {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".into());

        Arc::new(Self {
            service,
            version: env!("CARGO_PKG_VERSION").to_string(),
            hostname,
            started_at: Instant::now(),
            shutdown: CancellationToken::new(),
            sessions: TaskTracker::new(),
            connections: AtomicUsize::new(0),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Record a new connection. Returns the number now open.
    pub fn connection_opened(&self) -> usize {
        self.connections.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a closed connection. Returns the number still open.
    pub fn connection_closed(&self) -> usize {
        self.connections.fetch_sub(1, Ordering::Relaxed) - 1
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Relaxed)
    }
}
