//! HTTP interceptor (v1)
//!
//! Runs an HTTP server with the echo transport installed in front of it.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                 INTERCEPTOR                   │
//!     Client Request     │  ┌─────────┐    ┌─────────────┐               │
//!     ───────────────────┼─▶│  http   │───▶│ EventServer │               │
//!                        │  │ server  │    │  handlers   │               │
//!                        │  └─────────┘    └──────┬──────┘               │
//!                        │                        ▼                      │
//!                        │                 ┌─────────────┐   claimed     │
//!                        │                 │ Dispatcher  │──────────┐    │
//!                        │                 │    test     │          ▼    │
//!                        │                 └──────┬──────┘   ┌──────────┐│
//!                        │             unclaimed  │          │transport ││
//!                        │                        ▼          │  (echo)  ││
//!                        │                 ┌─────────────┐   └──────────┘│
//!                        │                 │  previous   │               │
//!                        │                 │  handlers   │               │
//!                        │                 └─────────────┘               │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use http_interceptor::config::{load_config, validate_config, InterceptorConfig};
use http_interceptor::lifecycle::{shutdown_on_signal, Shutdown};
use http_interceptor::observability::{logging, metrics};
use http_interceptor::transports::EchoTransport;
use http_interceptor::{Dispatcher, HttpServer};

#[derive(Parser)]
#[command(name = "http-interceptor")]
#[command(about = "HTTP server with a path-prefix request interceptor", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override dispatch.base_path.
    #[arg(long)]
    base_path: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => InterceptorConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(base_path) = cli.base_path {
        config.dispatch.base_path = base_path;
    }
    if let Err(errors) = validate_config(&config) {
        for error in &errors {
            eprintln!("config error: {error}");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    logging::init_logging(&config.observability)?;
    tracing::info!("http-interceptor v0.1.0 starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        base_path = %config.dispatch.base_path,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validated above.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config.clone());
    Dispatcher::install(server.host(), config.dispatch.base_path.as_str(), EchoTransport::new())?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let signals = shutdown.clone();
    tokio::spawn(async move { shutdown_on_signal(&signals).await });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
