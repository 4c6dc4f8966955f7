//! Config schema: gateway listener settings and the virtual device description.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevctlConfig {
    pub gateway: GatewayConfig,
    pub device: DeviceConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Address to bind. Defaults to all interfaces.
    pub bind: String,
    pub port: u16,
    /// How long in-flight calls may run once shutdown starts.
    pub shutdown_grace_secs: u64,
    /// Transport security. Absent means plaintext.
    pub tls: Option<TlsConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: devctl_protocol::DEFAULT_PORT,
            shutdown_grace_secs: 5,
            tls: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum TlsConfig {
    /// PEM certificate chain and private key on disk.
    Files {
        cert_path: PathBuf,
        key_path: PathBuf,
    },
    /// Certificate generated at startup for the given names.
    SelfSigned {
        #[serde(default = "default_hostnames")]
        hostnames: Vec<String>,
    },
}

fn default_hostnames() -> Vec<String> {
    vec!["localhost".into()]
}

/// Static description of the virtual device served by `devctl serve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// One of: unknown, none, kvm, haxm, hvf, whpx, gvm.
    pub hypervisor: String,
    pub cpu_cores: i32,
    pub ram_bytes: i64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            hypervisor: "kvm".into(),
            cpu_cores: 4,
            ram_bytes: 2 * 1024 * 1024 * 1024,
        }
    }
}
