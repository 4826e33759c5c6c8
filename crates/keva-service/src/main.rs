//! # Keva Server
//!
//! Key/value RPC service with live change events.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! keva
//!
//! # Run with environment variables
//! KEVA_RPC_QUEUE=keva.rpc KEVA_METRICS_PORT=9090 keva
//! ```

use anyhow::Result;
use keva_broker::{Broker, MemoryBroker};
use keva_service::dispatcher::DispatcherConfig;
use keva_service::{config, metrics, rpc, RequestDispatcher};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keva_service=debug,keva_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!(queue = %config.rpc.request_queue, "Starting Keva service");

    // Initialize metrics
    metrics::init_metrics();
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            tracing::error!("Failed to start metrics server: {}", e);
        }
    }

    // Wire the in-process broker and dispatcher
    let broker: Arc<dyn Broker> = Arc::new(MemoryBroker::new());
    let dispatcher = Arc::new(RequestDispatcher::with_config(
        broker.clone(),
        DispatcherConfig {
            max_value_size: config.limits.max_value_size,
        },
    ));

    // Serve until the request queue closes
    rpc::serve(broker, dispatcher, &config.rpc.request_queue).await?;

    Ok(())
}
