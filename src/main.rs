//! mcp-control main entry point
//!
//! This binary runs the control server in the foreground and offers a few
//! client commands for talking to a running instance.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mcp_control::{
    client::ControlClient,
    config::Config,
    control::{AssetExecutor, CommandExecutor, CommandRequest, PRINT_STRING},
    controller::Controller,
    APP_NAME, VERSION,
};

/// Embeddable control-plane HTTP server
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version = VERSION, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, default_value = "mcp-control.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the control server until interrupted
    Start {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory assets are written to (in memory when omitted)
        #[arg(long)]
        asset_root: Option<PathBuf>,
    },

    /// Query a running server's status route
    Status {
        /// Server port (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Send a command to a running server
    Send {
        /// Target path, e.g. /Game/MyAsset
        #[arg(short, long)]
        target: String,

        /// Action type
        #[arg(short, long, default_value = PRINT_STRING)]
        action: String,

        /// Server port (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Write a default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Settings decide the default log level, so load them first
    let loaded = load_config(&cli.config);
    let level = loaded
        .as_ref()
        .map(|config| config.logging.filter_directive())
        .unwrap_or("warn");
    init_logging(cli.verbose, level);

    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, config).await {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Load settings, falling back to defaults when the file does not exist
fn load_config(path: &Path) -> mcp_control::Result<Config> {
    if path.exists() {
        Config::from_file(path)
    } else {
        Ok(Config::default())
    }
}

/// Initialize structured logging with tracing
fn init_logging(verbose: bool, level: &str) {
    let fallback = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run the CLI command
async fn run(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Start { port, asset_root } => {
            info!("Starting {} v{}", APP_NAME, VERSION);
            if !cli.config.exists() {
                warn!("No config file at {:?}; using defaults", cli.config);
            }

            let executor: Arc<dyn CommandExecutor> = match asset_root {
                Some(root) => {
                    info!("Writing assets under {:?}", root);
                    Arc::new(AssetExecutor::with_root(root))
                }
                None => Arc::new(AssetExecutor::in_memory()),
            };

            let controller = Controller::new(config, executor)?;
            let mut events = controller.subscribe();
            tokio::spawn(async move {
                while let Ok(change) = events.recv().await {
                    info!("Server status changed: running={} port={}", change.running, change.port);
                }
            });

            controller.start_server(port).await?;
            println!("{}", controller.server_status());

            shutdown_signal().await;

            info!("Shutting down");
            controller.shutdown().await;
            println!("Requests: {}", controller.request_stats());
            Ok(())
        }
        Commands::Status { port } => {
            let client = client_for(&config, port)?;
            let status = client.status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Commands::Send {
            target,
            action,
            port,
        } => {
            let client = client_for(&config, port)?
                .with_command_path(config.server.command_path.clone());
            let reply = client.send(&CommandRequest::new(action, target)).await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
            if !reply.success {
                anyhow::bail!("{}", reply.message);
            }
            Ok(())
        }
        Commands::InitConfig { force } => {
            if cli.config.exists() && !force {
                anyhow::bail!("{:?} already exists (use --force to overwrite)", cli.config);
            }
            Config::default().to_file(&cli.config)?;
            println!("Wrote default configuration to {:?}", cli.config);
            Ok(())
        }
        Commands::Version => {
            println!("{} v{}", APP_NAME, VERSION);
            Ok(())
        }
    }
}

/// Client for the configured server, connecting via loopback for wildcard binds
fn client_for(config: &Config, port: Option<u16>) -> mcp_control::Result<ControlClient> {
    let host = match config.server.bind_ip()? {
        ip if ip.is_unspecified() && ip.is_ipv4() => "127.0.0.1".to_string(),
        ip if ip.is_unspecified() => "[::1]".to_string(),
        ip if ip.is_ipv6() => format!("[{}]", ip),
        ip => ip.to_string(),
    };
    ControlClient::new(&host, port.unwrap_or(config.server.default_port))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
