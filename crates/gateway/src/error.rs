use std::{io, net::SocketAddr};

/// Failures of the gateway lifecycle. Individual calls never produce one of
/// these; they are reported by [`GatewayBuilder::build`] and
/// [`ServiceHandle::stop`].
///
/// [`GatewayBuilder::build`]: crate::server::GatewayBuilder::build
/// [`ServiceHandle::stop`]: crate::server::ServiceHandle::stop
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("no device agents bound")]
    MissingAgents,

    #[error("invalid bind address {bind:?}")]
    InvalidBind {
        bind: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("failed to load TLS credentials")]
    Credentials(#[source] io::Error),

    #[error("failed to generate self-signed certificate")]
    SelfSigned(#[from] rcgen::Error),

    #[error("failed to bind {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("listener failed")]
    Serve(#[source] io::Error),

    #[error("listener task did not finish")]
    Join(#[from] tokio::task::JoinError),
}
