use clap::Parser;

#[cfg(feature = "fast-allocator")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use vpnhub_session_core::access::{AccessBackend, StaticAccessBackend};
use vpnhub_session_core::config::Config;
use vpnhub_session_core::server::Server;
use vpnhub_session_core::{Result, SessionError};

#[derive(Parser, Debug)]
#[command(name = "vpnhub-session-core")]
#[command(about = "VPN broker session core: admission, suppression and reusable client streams", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(long)]
    bind: Option<String>,

    /// Bind port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Generate example configuration file
    #[arg(long, value_name = "FILE")]
    generate_config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides config
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(config_path) = args.generate_config {
        println!("Generating example configuration file: {config_path:?}");
        Config::create_example(&config_path)?;
        println!("Example configuration file created successfully!");
        println!("Edit the file and run: vpnhub-session-core --config {config_path:?}");
        return Ok(());
    }

    let mut config = if let Some(config_path) = args.config {
        Config::from_file(&config_path)?
    } else {
        Config::default()
    };

    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.server.bind_port = port;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "session core starting");

    let backend: Arc<dyn AccessBackend> = match &config.access.static_file {
        Some(path) => {
            info!(%path, "loading static access records");
            Arc::new(
                StaticAccessBackend::from_file(path)
                    .await
                    .map_err(SessionError::Config)?,
            )
        }
        None => {
            info!("no access.static_file configured, starting with no provisioned accounts");
            Arc::new(StaticAccessBackend::empty())
        }
    };

    let server = Arc::new(Server::new(config, backend));

    tokio::select! {
        result = server.clone().run() => {
            if let Err(e) = result {
                error!(error = %e, "server error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("received Ctrl+C, shutting down gracefully");
        }
    }

    server.shutdown().await;
    info!("session core shutdown complete");

    Ok(())
}

fn init_logging(logging: &vpnhub_session_core::config::LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_new(&logging.level)
        .map_err(|e| SessionError::Config(format!("invalid log level: {e}")))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    Ok(())
}
