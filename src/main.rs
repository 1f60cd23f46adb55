//! Message relay (v1)
//!
//! Accepts short text messages over TCP and UDP, normalizes each into an
//! envelope, and pushes it to every connected WebSocket subscriber. The TCP
//! and UDP listeners are started and stopped at runtime through an HTTP
//! control API.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                      MSG RELAY                       │
//!                 │                                                      │
//!   TCP  :8080 ───┼─▶ net::stream ──┐                                    │
//!                 │                 ├─▶ hub ──▶ http::websocket ─────────┼──▶ WebSocket :8082
//!   UDP  :8081 ───┼─▶ net::datagram ┘                                    │
//!                 │        ▲                                             │
//!                 │        │ start / stop                                │
//!                 │  lifecycle::controller ◀── control ◀── http::server ◀┼─── HTTP :8000
//!                 │                                                      │
//!                 │  config (TOML, optional hot reload) · observability  │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use msg_relay::config::{load_config, watcher::ConfigWatcher, RelayConfig};
use msg_relay::http::{HttpServer, PushServer};
use msg_relay::hub::Hub;
use msg_relay::lifecycle::{signals, LifecycleController, ServerState, Shutdown};
use msg_relay::observability;

#[derive(Parser)]
#[command(name = "msg-relay")]
#[command(about = "TCP/UDP to WebSocket message relay", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes (applies on next start).
    #[arg(long, requires = "config")]
    watch: bool,

    /// Start the TCP/UDP listeners immediately.
    #[arg(long)]
    autostart: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };

    observability::logging::init_tracing(&config.observability.log_level);
    tracing::info!("msg-relay v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        stream = %config.stream.bind_address,
        datagram = %config.datagram.bind_address,
        push = %config.push.bind_address,
        control = %config.control.bind_address,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let hub = Hub::new(config.push.subscriber_buffer);
    let controller = Arc::new(LifecycleController::new(config.clone(), hub.clone()));
    let shutdown = Shutdown::new();

    let push = PushServer::bind(&config.push, hub).await?;
    let push_task = tokio::spawn(push.run(shutdown.subscribe()));

    let control_listener = TcpListener::bind(&config.control.bind_address).await?;
    let control = HttpServer::new(Arc::clone(&controller), &config.control);
    let control_task = tokio::spawn(control.run(control_listener, shutdown.subscribe()));

    // Kept alive for the life of the process.
    let _watcher = match (&args.config, args.watch) {
        (Some(path), true) => Some(ConfigWatcher::new(path, Arc::clone(&controller)).run()?),
        _ => None,
    };

    if args.autostart {
        if let Err(e) = controller.start().await {
            tracing::error!(error = %e, "Autostart failed, waiting for control commands");
        }
    }

    signals::shutdown_signal().await;

    shutdown.trigger();
    if controller.status() == ServerState::Running {
        if let Err(e) = controller.stop().await {
            tracing::error!(error = %e, "Listeners did not stop cleanly");
        }
    }

    match control_task.await {
        Ok(Err(e)) => tracing::error!(error = %e, "Control API exited with error"),
        Err(e) => tracing::error!(error = %e, "Control API task failed"),
        Ok(Ok(())) => {}
    }
    let _ = push_task.await;

    tracing::info!("Shutdown complete");
    Ok(())
}
