use std::{
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};

use {
    anyhow::Context,
    tracing::{debug, warn},
};

use crate::{env_subst::substitute_env, schema::DevctlConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["devctl.toml", "devctl.yaml", "devctl.yml", "devctl.json"];

/// Override for the config directory, set via `set_config_dir()`.
static CONFIG_DIR_OVERRIDE: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Restrict discovery to `path`. Each call replaces the previous override.
pub fn set_config_dir(path: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(path);
}

/// Clear the config directory override, restoring default discovery.
pub fn clear_config_dir() {
    *CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = None;
}

fn config_dir_override() -> Option<PathBuf> {
    CONFIG_DIR_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<DevctlConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_config(&substitute_env(&raw), path)
        .with_context(|| format!("failed to parse {}", path.display()))
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. the directory set with [`set_config_dir`], exclusively, when present
/// 2. `./devctl.{toml,yaml,yml,json}`
/// 3. `~/.config/devctl/devctl.{toml,yaml,yml,json}`
///
/// Falls back to `DevctlConfig::default()` when nothing is found or the file
/// fails to load.
pub fn discover_and_load() -> DevctlConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return DevctlConfig::default();
    };

    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            let error = format!("{e:#}");
            warn!(path = %path.display(), %error, "failed to load config, using defaults");
            DevctlConfig::default()
        },
    }
}

fn find_config_file() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return first_existing(&dir);
    }
    first_existing(Path::new(".")).or_else(|| config_dir().and_then(|dir| first_existing(&dir)))
}

fn first_existing(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the config directory: override, or `~/.config/devctl/`.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = config_dir_override() {
        return Some(dir);
    }
    directories::BaseDirs::new().map(|d| d.home_dir().join(".config").join("devctl"))
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<DevctlConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TlsConfig;

    #[test]
    fn loads_toml_with_partial_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devctl.toml");
        std::fs::write(
            &path,
            r#"
[gateway]
port = 9100

[gateway.tls]
mode = "self-signed"

[device]
cpu_cores = 8
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.gateway.port, 9100);
        assert_eq!(config.gateway.bind, "0.0.0.0");
        assert_eq!(
            config.gateway.tls,
            Some(TlsConfig::SelfSigned {
                hostnames: vec!["localhost".into()]
            })
        );
        assert_eq!(config.device.cpu_cores, 8);
        assert_eq!(config.device.hypervisor, "kvm");
    }

    #[test]
    fn loads_yaml_tls_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devctl.yaml");
        std::fs::write(
            &path,
            "gateway:\n  tls:\n    mode: files\n    cert_path: /etc/devctl/cert.pem\n    key_path: /etc/devctl/key.pem\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(
            config.gateway.tls,
            Some(TlsConfig::Files {
                cert_path: "/etc/devctl/cert.pem".into(),
                key_path: "/etc/devctl/key.pem".into(),
            })
        );
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devctl.ini");
        std::fs::write(&path, "port=1").unwrap();
        assert!(load_config(&path).is_err());
    }

    // Both cases share one test so the process-wide override is not raced.
    #[test]
    fn discovery_honours_override() {
        let dir = tempfile::tempdir().unwrap();
        set_config_dir(dir.path().to_path_buf());
        assert_eq!(discover_and_load(), DevctlConfig::default());

        std::fs::write(dir.path().join("devctl.json"), r#"{"gateway":{"port":7001}}"#).unwrap();
        assert_eq!(discover_and_load().gateway.port, 7001);
        clear_config_dir();
    }
}
