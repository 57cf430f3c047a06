//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the cluster
//! client, reconciler, watcher and probe server together for the Teamspeak
//! Controller.

use crate::allocator::AddressAllocator;
use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::resources::ImageSettings;
use crate::server::{ProbeState, run_server};
use crate::watcher::Watcher;
use cluster_client::KubeClusterClient;
use crds::Teamspeak;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::{Api, Client};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for Teamspeak resources.
pub struct Controller {
    teamspeak_watcher: JoinHandle<Result<(), ControllerError>>,
    probe_server: JoinHandle<Result<(), ControllerError>>,
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("teamspeak_watcher", &self.teamspeak_watcher)
            .field("probe_server", &self.probe_server)
            .finish()
    }
}

/// Api scoped to `namespace`, or cluster-wide when `None`.
fn scoped_api<K>(client: &Client, namespace: Option<&str>) -> Api<K>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    }
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(config: OperatorConfig) -> Result<Self, ControllerError> {
        info!("Initializing Teamspeak Controller");

        // Create Kubernetes client
        let kube_client = Client::try_default().await?;

        let metrics = Metrics::new()?;
        let ready = Arc::new(AtomicBool::new(false));

        // Create reconciler
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(KubeClusterClient::new(kube_client.clone())),
            AddressAllocator::new(config.address_annotation.clone()),
            ImageSettings {
                repository: config.image_repository.clone(),
            },
            metrics.clone(),
        ));

        // Children live next to their Teamspeak, so they are watched in the same scope
        let namespace = config.namespace.as_deref();
        let watcher_instance = Watcher::new(
            reconciler,
            scoped_api::<Teamspeak>(&kube_client, namespace),
            scoped_api::<Pod>(&kube_client, namespace),
            scoped_api::<Service>(&kube_client, namespace),
            &config,
            ready.clone(),
        );

        // Start watcher and probe server in background tasks
        let teamspeak_watcher = tokio::spawn(async move { watcher_instance.watch_teamspeaks().await });

        let probe_state = ProbeState { metrics, ready };
        let metrics_addr = config.metrics_addr;
        let probe_server = tokio::spawn(async move { run_server(metrics_addr, probe_state).await });

        Ok(Self {
            teamspeak_watcher,
            probe_server,
        })
    }

    /// Runs until the watcher stops (shutdown signal) or the probe server fails.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Teamspeak Controller running");

        tokio::select! {
            result = &mut self.teamspeak_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("Teamspeak watcher panicked: {}", e)))??;
                info!("Teamspeak watcher finished, shutting down");
            }
            result = &mut self.probe_server => {
                result.map_err(|e| ControllerError::Watch(format!("Probe server panicked: {}", e)))??;
                return Err(ControllerError::Watch("Probe server exited unexpectedly".to_string()));
            }
        }

        self.probe_server.abort();
        Ok(())
    }
}
