//! Transport credentials for the listener.
//!
//! The builder takes a [`ServerCredentials`] and resolves it before anything
//! is bound, so a rejected certificate never leaves a listener behind. A new
//! security scheme is a new variant here plus its arm in `resolve`.

use std::{fmt, path::PathBuf};

use {axum_server::tls_rustls::RustlsConfig, tracing::info};

use devctl_config::TlsConfig;

use crate::error::GatewayError;

/// How the listener secures its connections.
#[derive(Debug, Clone, Default)]
pub enum ServerCredentials {
    /// Plaintext. Suitable for loopback use only.
    #[default]
    Insecure,
    /// TLS with the given server identity.
    Tls(TlsIdentity),
}

/// Where a TLS certificate and private key come from.
#[derive(Clone)]
pub enum TlsIdentity {
    PemFiles { cert_path: PathBuf, key_path: PathBuf },
    Pem { cert: Vec<u8>, key: Vec<u8> },
    /// Generate a throwaway certificate for these subject alternative names.
    SelfSigned { subject_alt_names: Vec<String> },
}

impl fmt::Debug for TlsIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PemFiles {
                cert_path,
                key_path,
            } => f
                .debug_struct("PemFiles")
                .field("cert_path", cert_path)
                .field("key_path", key_path)
                .finish(),
            Self::Pem { cert, .. } => f
                .debug_struct("Pem")
                .field("cert_len", &cert.len())
                .field("key", &"[REDACTED]")
                .finish(),
            Self::SelfSigned { subject_alt_names } => f
                .debug_struct("SelfSigned")
                .field("subject_alt_names", subject_alt_names)
                .finish(),
        }
    }
}

impl ServerCredentials {
    pub fn insecure() -> Self {
        Self::Insecure
    }

    pub fn tls_from_files(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self::Tls(TlsIdentity::PemFiles {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        })
    }

    pub fn tls_from_pem(cert: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        Self::Tls(TlsIdentity::Pem {
            cert: cert.into(),
            key: key.into(),
        })
    }

    pub fn self_signed<I, S>(subject_alt_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Tls(TlsIdentity::SelfSigned {
            subject_alt_names: subject_alt_names.into_iter().map(Into::into).collect(),
        })
    }

    pub fn from_config(tls: Option<&TlsConfig>) -> Self {
        match tls {
            None => Self::Insecure,
            Some(TlsConfig::Files {
                cert_path,
                key_path,
            }) => Self::tls_from_files(cert_path.clone(), key_path.clone()),
            Some(TlsConfig::SelfSigned { hostnames }) => Self::self_signed(hostnames.clone()),
        }
    }

    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Produce the rustls configuration, or `None` for plaintext.
    pub(crate) async fn resolve(&self) -> Result<Option<RustlsConfig>, GatewayError> {
        let Self::Tls(identity) = self else {
            return Ok(None);
        };

        // Both ring and aws-lc-rs may be compiled in; pin the process default
        // to ring. Fails harmlessly when a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let config = match identity {
            TlsIdentity::PemFiles {
                cert_path,
                key_path,
            } => RustlsConfig::from_pem_file(cert_path, key_path).await,
            TlsIdentity::Pem { cert, key } => RustlsConfig::from_pem(cert.clone(), key.clone()).await,
            TlsIdentity::SelfSigned { subject_alt_names } => {
                let (cert, key) = generate_self_signed(subject_alt_names)?;
                info!(names = ?subject_alt_names, "generated self-signed certificate");
                RustlsConfig::from_pem(cert, key).await
            },
        }
        .map_err(GatewayError::Credentials)?;

        Ok(Some(config))
    }
}

/// PEM-encoded certificate and private key.
fn generate_self_signed(subject_alt_names: &[String]) -> Result<(Vec<u8>, Vec<u8>), GatewayError> {
    let certified = rcgen::generate_simple_self_signed(subject_alt_names.to_vec())?;
    Ok((
        certified.cert.pem().into_bytes(),
        certified.key_pair.serialize_pem().into_bytes(),
    ))
}
