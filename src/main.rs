//! wg-bridge: WireGuard tunnel data-path bridge
//!
//! This is the main entry point for the bridge daemon.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! ./wg-bridge
//!
//! # Run with custom configuration
//! ./wg-bridge -c /path/to/config.json
//!
//! # Run with environment overrides
//! WG_BRIDGE_LOG_LEVEL=debug ./wg-bridge
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use wg_bridge::config::{load_config_with_env, Config};
use wg_bridge::device::TunnelDevice;
use wg_bridge::engine::{EngineTimer, TunnelEngine, WireGuardEngine};
use wg_bridge::ipc::{IpcHandler, IpcServer};
use wg_bridge::lifecycle::Coordinator;
use wg_bridge::link::{event_channel, LinkEventSender, LinkInterface};
use wg_bridge::stats::TrafficCounter;

/// Command-line arguments
struct Args {
    /// Configuration file path
    config_path: PathBuf,
    /// Generate default configuration
    generate_config: bool,
    /// Check configuration only
    check_config: bool,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config_path = PathBuf::from("/etc/wg-bridge/config.json");
        let mut generate_config = false;
        let mut check_config = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-c" | "--config" => {
                    if let Some(path) = args.next() {
                        config_path = PathBuf::from(path);
                    }
                }
                "-g" | "--generate-config" => {
                    generate_config = true;
                }
                "--check" => {
                    check_config = true;
                }
                "-h" | "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "-v" | "--version" => {
                    println!("wg-bridge v{}", wg_bridge::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", arg);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        Self {
            config_path,
            generate_config,
            check_config,
        }
    }
}

fn print_help() {
    println!(
        r#"wg-bridge v{}

WireGuard tunnel data-path bridge.

USAGE:
    wg-bridge [OPTIONS]

OPTIONS:
    -c, --config <PATH>     Configuration file path [default: /etc/wg-bridge/config.json]
    -g, --generate-config   Generate default configuration and exit
    --check                 Check configuration and exit
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT:
    WG_BRIDGE_PORT          Override the tunnel UDP port
    WG_BRIDGE_LOG_LEVEL     Override log level (trace, debug, info, warn, error)
    WG_BRIDGE_IPC_SOCKET    Override IPC socket path

EXAMPLE:
    wg-bridge -c /etc/wg-bridge/config.json
"#,
        wg_bridge::VERSION
    );
}

/// Initialize logging
fn init_logging(config: &Config) {
    let level = match config.log.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("tokio=warn".parse().expect("static directive"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.log.target);

    if config.log.format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Main application entry point
#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Instant::now();

    let args = Args::parse();

    if args.generate_config {
        wg_bridge::config::create_default_config(&args.config_path)?;
        println!("Generated default configuration at {:?}", args.config_path);
        return Ok(());
    }

    let config = load_config_with_env(&args.config_path).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load configuration from {:?}: {}",
            args.config_path,
            e
        )
    })?;

    if args.check_config {
        println!("Configuration is valid");
        return Ok(());
    }

    init_logging(&config);

    info!("wg-bridge v{}", wg_bridge::VERSION);
    info!("Configuration loaded from {:?}", args.config_path);

    // Tunnel device and engine
    let device = Arc::new(TunnelDevice::new(
        config.tunnel.address,
        config.tunnel.netmask,
    ));
    let engine: Arc<dyn TunnelEngine> = Arc::new(
        WireGuardEngine::new(&config.tunnel)
            .map_err(|e| anyhow::anyhow!("Failed to create tunnel engine: {}", e))?,
    );

    // Attach the physical link the tunnel rides on. Startup continues
    // without one; the send path rejects packets until attached.
    match &config.link.interface {
        Some(name) => device.attach_link(LinkInterface::new(name.clone())),
        None => error!("No physical network interface configured"),
    }

    let counter = Arc::new(TrafficCounter::new());
    let (events_tx, events_rx) = event_channel();

    let timer = EngineTimer::spawn(
        Arc::clone(&engine),
        Arc::clone(&device),
        config.tunnel.timer_period(),
    );

    let coordinator = Coordinator::new(
        Arc::clone(&device),
        Arc::clone(&engine),
        Arc::clone(&counter),
        Some(timer),
        events_rx,
        events_tx.clone(),
        config.listen.port,
        config.stats.interval(),
    );
    let state = coordinator.state_handle();

    // IPC control surface
    let ipc_handler = Arc::new(IpcHandler::new(state, Arc::clone(&counter), events_tx.clone()));
    let ipc_server = IpcServer::new(config.ipc.clone(), ipc_handler);
    let ipc_shutdown = ipc_server.shutdown_sender();
    let ipc_handle = tokio::spawn(async move {
        if let Err(e) = ipc_server.run().await {
            error!("IPC server error: {}", e);
        }
    });

    // Signal handlers feed the same quit path as IPC.
    spawn_signal_handlers(events_tx.clone());

    // Without an external link monitor the configured interface is taken
    // to be up at startup.
    if config.link.assume_up {
        events_tx.link_up();
    }

    info!(
        "Startup complete in {:.2}ms",
        start_time.elapsed().as_secs_f64() * 1000.0
    );

    let result = coordinator.run().await;

    let _ = ipc_shutdown.send(());
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), ipc_handle).await;

    if let Err(e) = &result {
        error!("Bridge exited with error: {}", e);
    }
    result.map_err(|e| anyhow::anyhow!("{}", e))
}

/// Forward SIGINT and SIGTERM to the coordinator as quit requests.
fn spawn_signal_handlers(events: LinkEventSender) {
    let ctrl_c_events = events.clone();
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_ok() {
            info!("Received SIGINT, initiating shutdown...");
            ctrl_c_events.request_quit();
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM, initiating shutdown...");
                events.request_quit();
            }
            Err(e) => warn!("Failed to register SIGTERM handler: {}", e),
        }
    });

    #[cfg(not(unix))]
    drop(events);
}
