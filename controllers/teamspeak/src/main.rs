//! Teamspeak Controller
//!
//! Runs Teamspeak game servers declared as `Teamspeak` custom resources:
//! - Allocates an external address from the pool advertised by node annotations
//! - Creates a Pod running the requested server version
//! - Creates a Service exposing the Pod on the allocated address
//!
//! Pods and Services are owned by their Teamspeak and are garbage collected
//! with it.

mod allocator;
mod backoff;
mod config;
mod controller;
mod error;
mod metrics;
mod reconciler;
mod resources;
mod server;
mod watcher;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod allocator_test;

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube's rustls-tls needs a process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("rustls crypto provider already installed");
    }

    info!("Starting Teamspeak Controller");

    // Load configuration from environment variables
    let config = OperatorConfig::from_env()?;

    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Address annotation: {}", config.address_annotation);
    info!("  Image repository: {}", config.image_repository);
    info!("  Metrics address: {}", config.metrics_addr);
    info!(
        "  Concurrency: {}, debounce: {:?}, backoff: {}m..{}m",
        config.concurrency, config.debounce, config.backoff_min_minutes, config.backoff_max_minutes
    );

    // Initialize and run controller
    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
