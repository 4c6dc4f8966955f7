mod client;

use std::path::PathBuf;

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    devctl_agents::{DeviceAgents, Hypervisor, VmConfig},
    devctl_config::{DeviceConfig, DevctlConfig, TlsConfig},
    devctl_gateway::{GatewayBuilder, methods::MethodRegistry},
    devctl_protocol::DEFAULT_PORT,
};

#[derive(Parser)]
#[command(name = "devctl", about = "devctl: virtual device control gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a virtual device behind the gateway until Ctrl-C.
    Serve {
        /// Bind address (overrides config).
        #[arg(long)]
        bind: Option<String>,
        /// Listen port (overrides config).
        #[arg(long)]
        port: Option<u16>,
        /// PEM certificate chain; enables TLS.
        #[arg(long, requires = "tls_key")]
        tls_cert: Option<PathBuf>,
        /// PEM private key.
        #[arg(long, requires = "tls_cert")]
        tls_key: Option<PathBuf>,
        /// Serve TLS with a generated certificate for localhost.
        #[arg(long, conflicts_with = "tls_cert")]
        self_signed: bool,
        /// Directory to look for devctl.{toml,yaml,json} in.
        #[arg(long)]
        config_dir: Option<PathBuf>,
    },
    /// Send one RPC and print the reply.
    Call {
        /// Method name, e.g. GetBattery.
        method: String,
        /// Request record as JSON.
        #[arg(default_value = "{}")]
        params: String,
        /// Gateway WebSocket endpoint (plaintext).
        #[arg(long)]
        url: Option<String>,
    },
    /// List the RPC methods the gateway serves.
    Methods,
}

struct ServeArgs {
    bind: Option<String>,
    port: Option<u16>,
    tls_cert: Option<PathBuf>,
    tls_key: Option<PathBuf>,
    self_signed: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Flags win over whatever the config file says.
fn apply_overrides(config: &mut DevctlConfig, args: ServeArgs) {
    if let Some(bind) = args.bind {
        config.gateway.bind = bind;
    }
    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let (Some(cert_path), Some(key_path)) = (args.tls_cert, args.tls_key) {
        config.gateway.tls = Some(TlsConfig::Files {
            cert_path,
            key_path,
        });
    } else if args.self_signed {
        config.gateway.tls = Some(TlsConfig::SelfSigned {
            hostnames: vec!["localhost".into()],
        });
    }
}

fn vm_config(device: &DeviceConfig) -> anyhow::Result<VmConfig> {
    let hypervisor: Hypervisor = device
        .hypervisor
        .parse()
        .map_err(anyhow::Error::msg)
        .context("invalid [device] hypervisor")?;
    Ok(VmConfig {
        hypervisor,
        cpu_cores: device.cpu_cores,
        ram_bytes: device.ram_bytes,
    })
}

async fn serve(config_dir: Option<PathBuf>, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(dir) = config_dir {
        devctl_config::set_config_dir(dir);
    }
    let mut config = devctl_config::discover_and_load();
    apply_overrides(&mut config, args);

    let agents = DeviceAgents::in_memory(vm_config(&config.device)?);
    let handle = GatewayBuilder::from_config(&config.gateway)?
        .with_agents(agents)
        .build()
        .await
        .context("failed to start gateway")?;
    info!(url = %handle.ws_url(), "gateway ready, Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    handle.stop().await.context("gateway did not stop cleanly")?;
    Ok(())
}

async fn call(method: &str, params: &str, url: Option<String>) -> anyhow::Result<()> {
    let params: serde_json::Value =
        serde_json::from_str(params).context("params must be a JSON object")?;
    let url = url.unwrap_or_else(|| format!("ws://127.0.0.1:{DEFAULT_PORT}/ws"));

    let frame = client::call(&url, method, params).await?;
    match (frame.payload, frame.error) {
        (_, Some(error)) => anyhow::bail!("{method} failed: {error}"),
        (payload, None) => {
            let payload = payload.unwrap_or(serde_json::Value::Null);
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        },
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "devctl starting");

    match cli.command {
        Commands::Serve {
            bind,
            port,
            tls_cert,
            tls_key,
            self_signed,
            config_dir,
        } => {
            serve(config_dir, ServeArgs {
                bind,
                port,
                tls_cert,
                tls_key,
                self_signed,
            })
            .await
        },
        Commands::Call {
            method,
            params,
            url,
        } => call(&method, &params, url).await,
        Commands::Methods => {
            for name in MethodRegistry::new().method_names() {
                println!("{name}");
            }
            Ok(())
        },
    }
}
