use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener},
    sync::Arc,
    time::Duration,
};

use {
    axum::{
        Router,
        body::Bytes,
        extract::{State, WebSocketUpgrade},
        http::StatusCode,
        response::{IntoResponse, Json},
        routing::{get, post},
    },
    axum_server::Handle,
    tokio::task::JoinHandle,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{debug, info, warn},
};

use {
    devctl_agents::DeviceAgents,
    devctl_config::GatewayConfig,
    devctl_protocol::{DEFAULT_PORT, ErrorShape, RequestFrame, ResponseFrame, error_codes},
};

use crate::{
    credentials::ServerCredentials,
    error::GatewayError,
    methods::{MethodContext, MethodRegistry},
    service::GatewayService,
    state::GatewayState,
    ws::handle_connection,
};

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    gateway: Arc<GatewayState>,
    methods: Arc<MethodRegistry>,
}

/// Build the gateway router (shared between the builder and tests).
pub fn build_gateway_app(state: Arc<GatewayState>, methods: Arc<MethodRegistry>) -> Router {
    let app_state = AppState {
        gateway: state,
        methods,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/rpc", post(rpc_handler))
        .route("/ws", get(ws_upgrade_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

// ── Builder ──────────────────────────────────────────────────────────────────

/// Configures and starts a gateway listener.
///
/// ```no_run
/// # async fn run() -> Result<(), devctl_gateway::GatewayError> {
/// use devctl_agents::{DeviceAgents, VmConfig};
/// use devctl_gateway::GatewayBuilder;
///
/// let handle = GatewayBuilder::new()
///     .with_agents(DeviceAgents::in_memory(VmConfig::default()))
///     .with_port(8554)
///     .build()
///     .await?;
/// handle.stop().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct GatewayBuilder {
    agents: Option<DeviceAgents>,
    credentials: ServerCredentials,
    bind: IpAddr,
    port: u16,
    shutdown_grace: Duration,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self {
            agents: None,
            credentials: ServerCredentials::default(),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Seed bind address, port, grace period and credentials from config.
    /// Agents still have to be supplied with [`Self::with_agents`].
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let bind = config
            .bind
            .parse()
            .map_err(|source| GatewayError::InvalidBind {
                bind: config.bind.clone(),
                source,
            })?;
        Ok(Self::new()
            .with_bind(bind)
            .with_port(config.port)
            .with_shutdown_grace(Duration::from_secs(config.shutdown_grace_secs))
            .with_credentials(ServerCredentials::from_config(config.tls.as_ref())))
    }

    pub fn with_agents(mut self, agents: DeviceAgents) -> Self {
        self.agents = Some(agents);
        self
    }

    pub fn with_credentials(mut self, credentials: ServerCredentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Port 0 picks a free port; read it back with [`ServiceHandle::local_addr`].
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_bind(mut self, bind: IpAddr) -> Self {
        self.bind = bind;
        self
    }

    /// How long `stop` lets in-flight calls run before closing connections.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Resolve credentials, bind the listener and start serving.
    pub async fn build(self) -> Result<ServiceHandle, GatewayError> {
        let agents = self.agents.ok_or(GatewayError::MissingAgents)?;
        let tls = self.credentials.resolve().await?;
        let secure = tls.is_some();

        let addr = SocketAddr::new(self.bind, self.port);
        let listener = TcpListener::bind(addr).map_err(|source| GatewayError::Bind { addr, source })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| GatewayError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| GatewayError::Bind { addr, source })?;

        let state = GatewayState::new(GatewayService::new(agents));
        let methods = Arc::new(MethodRegistry::new());
        let app = build_gateway_app(Arc::clone(&state), Arc::clone(&methods));

        let handle = Handle::new();
        let server_handle = handle.clone();
        let task = match tls {
            Some(config) => tokio::spawn(async move {
                axum_server::tls_rustls::from_tcp_rustls(listener, config)
                    .handle(server_handle)
                    .serve(app.into_make_service())
                    .await
            }),
            None => tokio::spawn(async move {
                axum_server::from_tcp(listener)
                    .handle(server_handle)
                    .serve(app.into_make_service())
                    .await
            }),
        };

        // Startup banner.
        let scheme = if secure {
            "tls"
        } else {
            "insecure"
        };
        let lines = [
            format!("devctl gateway v{}", state.version),
            format!(
                "protocol v{}, listening on {}",
                devctl_protocol::PROTOCOL_VERSION,
                local_addr
            ),
            format!("transport: {scheme}"),
            format!("{} methods registered", methods.method_names().len()),
        ];
        let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
        info!("┌{}┐", "─".repeat(width));
        for line in &lines {
            info!("│  {:<w$}│", line, w = width - 2);
        }
        info!("└{}┘", "─".repeat(width));

        Ok(ServiceHandle {
            local_addr,
            secure,
            state,
            handle,
            task: Some(task),
            shutdown_grace: self.shutdown_grace,
        })
    }
}

// ── Service handle ───────────────────────────────────────────────────────────

/// A running gateway. Stop it with [`ServiceHandle::stop`]; dropping it shuts
/// the listener down without waiting.
pub struct ServiceHandle {
    local_addr: SocketAddr,
    secure: bool,
    state: Arc<GatewayState>,
    handle: Handle,
    task: Option<JoinHandle<io::Result<()>>>,
    shutdown_grace: Duration,
}

impl std::fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("local_addr", &self.local_addr)
            .field("secure", &self.secure)
            .field("running", &self.task.is_some())
            .finish()
    }
}

impl ServiceHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn service(&self) -> &GatewayService {
        &self.state.service
    }

    /// WebSocket endpoint URL, with a loopback host when bound to all interfaces.
    pub fn ws_url(&self) -> String {
        let scheme = if self.secure {
            "wss"
        } else {
            "ws"
        };
        let host = if self.local_addr.ip().is_unspecified() {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), self.local_addr.port())
        } else {
            self.local_addr
        };
        format!("{scheme}://{host}/ws")
    }

    /// Stop accepting connections and WebSocket frames, give in-flight calls
    /// the grace period to finish, then wait for the listener task.
    pub async fn stop(mut self) -> Result<(), GatewayError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        info!(addr = %self.local_addr, grace = ?self.shutdown_grace, "stopping gateway");
        self.state.shutdown.cancel();
        self.handle.graceful_shutdown(Some(self.shutdown_grace));

        // Upgraded sessions run outside the listener's connection set.
        self.state.sessions.close();
        if tokio::time::timeout(self.shutdown_grace, self.state.sessions.wait())
            .await
            .is_err()
        {
            warn!(
                addr = %self.local_addr,
                sessions = self.state.sessions.len(),
                "sessions still running after shutdown grace"
            );
        }

        task.await?.map_err(GatewayError::Serve)?;
        debug!(addr = %self.local_addr, "gateway stopped");
        Ok(())
    }
}

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            warn!(addr = %self.local_addr, "service handle dropped without stop, shutting down");
            self.state.shutdown.cancel();
            self.handle.shutdown();
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.gateway.version,
        "protocol": devctl_protocol::PROTOCOL_VERSION,
        "hostname": state.gateway.hostname,
        "connections": state.gateway.connection_count(),
        "methods": state.methods.method_names().len(),
        "uptime_secs": state.gateway.uptime_secs(),
    }))
}

async fn rpc_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let frame: RequestFrame = match serde_json::from_slice(&body) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(error = %e, "http: malformed request frame");
            let error = ErrorShape::new(
                error_codes::INVALID_REQUEST,
                format!("malformed request frame: {e}"),
            );
            return (StatusCode::BAD_REQUEST, Json(ResponseFrame::err("", error)));
        },
    };

    let ctx = MethodContext {
        request_id: frame.id,
        method: frame.method,
        params: frame.params,
        client_conn_id: format!("http-{}", uuid::Uuid::new_v4()),
        state: Arc::clone(&state.gateway),
    };
    (StatusCode::OK, Json(state.methods.dispatch(ctx).await))
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let sessions = state.gateway.sessions.clone();
    ws.on_upgrade(move |socket| {
        sessions.track_future(handle_connection(socket, state.gateway, state.methods))
    })
}
