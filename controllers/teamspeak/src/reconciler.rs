//! Reconciliation logic for Teamspeak CRDs.
//!
//! Each call re-derives everything from live cluster state:
//! 1. Fetch the Teamspeak (gone means deleted; children are garbage collected)
//! 2. Allocate and persist an address if it has none
//! 3. Create the Pod if absent
//! 4. Create the Service if absent
//!
//! Existing children are never compared field by field or updated, and the
//! address is never changed once set. Running the same reconciliation again
//! is always safe.

use crate::allocator::AddressAllocator;
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::resources::{
    ImageSettings, owner_reference, pod_for, pod_name, service_for, service_name, with_owner,
};
use chrono::Utc;
use cluster_client::ClusterClientTrait;
use crds::{Teamspeak, TeamspeakStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The resource no longer exists; nothing to do
    Deleted,
    /// The resource has an address and both children exist
    Converged {
        /// Allocated address (new or previously persisted)
        address: String,
        /// Whether this call created the Pod
        pod_created: bool,
        /// Whether this call created the Service
        service_created: bool,
    },
}

/// Reconciles Teamspeak resources.
pub struct Reconciler {
    client: Arc<dyn ClusterClientTrait>,
    allocator: AddressAllocator,
    image: ImageSettings,
    metrics: Metrics,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("allocator", &self.allocator)
            .field("image", &self.image)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(
        client: Arc<dyn ClusterClientTrait>,
        allocator: AddressAllocator,
        image: ImageSettings,
        metrics: Metrics,
    ) -> Self {
        Self {
            client,
            allocator,
            image,
            metrics,
        }
    }

    /// Metrics recorded by this reconciler.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Reconciles the Teamspeak `namespace/name`.
    ///
    /// Returns `AddressPoolExhausted` without writing anything when no
    /// address is free; any cluster API error is returned unchanged and the
    /// caller is expected to re-run the reconciliation later.
    #[instrument(skip(self))]
    pub async fn reconcile_teamspeak(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, ControllerError> {
        let started = Instant::now();
        let result = self.converge(namespace, name).await;

        let label = match &result {
            Ok(ReconcileOutcome::Deleted) => "deleted",
            Ok(ReconcileOutcome::Converged { .. }) => "success",
            Err(_) => "error",
        };
        self.metrics.reconciled(label, started.elapsed().as_secs_f64());

        result
    }

    async fn converge(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, ControllerError> {
        info!("Reconciling Teamspeak {}/{}", namespace, name);

        let Some(mut teamspeak) = self.client.get_teamspeak(namespace, name).await? else {
            debug!("Teamspeak {}/{} not found, assuming deleted", namespace, name);
            return Ok(ReconcileOutcome::Deleted);
        };

        if teamspeak.assigned_address().is_none() {
            teamspeak = self.assign_address(&teamspeak, namespace, name).await?;
        }
        let address = teamspeak
            .assigned_address()
            .ok_or_else(|| ControllerError::InvalidResource(format!("Teamspeak {}/{} has no address", namespace, name)))?
            .to_string();

        let owner = owner_reference(&teamspeak)?;
        let pod_created = self.reconcile_pod(&teamspeak, namespace, &owner).await?;
        let service_created = self.reconcile_service(&teamspeak, namespace, &owner).await?;

        Ok(ReconcileOutcome::Converged {
            address,
            pod_created,
            service_created,
        })
    }

    /// Allocates a free address and persists it with a single conditional status patch.
    async fn assign_address(&self, teamspeak: &Teamspeak, namespace: &str, name: &str) -> Result<Teamspeak, ControllerError> {
        let Some(allocation) = self.allocator.allocate(self.client.as_ref()).await? else {
            warn!("No free address for Teamspeak {}/{}", namespace, name);
            self.metrics.pool_exhausted();
            return Err(ControllerError::AddressPoolExhausted(format!("{}/{}", namespace, name)));
        };

        info!(
            "Allocated address {} (advertised by node {}) for Teamspeak {}/{}",
            allocation.address, allocation.node, namespace, name
        );

        let status = TeamspeakStatus {
            address: allocation.address,
            node: Some(allocation.node),
            allocated_at: Some(Utc::now()),
        };

        // Fails with a conflict if another writer touched the resource since we read it
        let updated = self
            .client
            .patch_teamspeak_status(namespace, name, teamspeak.metadata.resource_version.as_deref(), &status)
            .await?;
        self.metrics.address_allocated();

        Ok(updated)
    }

    /// Creates the Pod if it does not exist. Returns whether it was created.
    async fn reconcile_pod(&self, teamspeak: &Teamspeak, namespace: &str, owner: &OwnerReference) -> Result<bool, ControllerError> {
        let mut pod = pod_for(teamspeak, &self.image)?;
        with_owner(&mut pod.metadata, owner.clone());
        let name = pod_name(teamspeak)?;

        if self.client.get_pod(namespace, &name).await?.is_some() {
            debug!("Skip reconcile: Pod {}/{} already exists", namespace, name);
            return Ok(false);
        }

        info!("Creating a new Pod {}/{}", namespace, name);
        self.client.create_pod(namespace, &pod).await?;
        self.metrics.child_created("pod");
        Ok(true)
    }

    /// Creates the Service if it does not exist. Returns whether it was created.
    async fn reconcile_service(&self, teamspeak: &Teamspeak, namespace: &str, owner: &OwnerReference) -> Result<bool, ControllerError> {
        let mut service = service_for(teamspeak)?;
        with_owner(&mut service.metadata, owner.clone());
        let name = service_name(teamspeak)?;

        if self.client.get_service(namespace, &name).await?.is_some() {
            debug!("Skip reconcile: Service {}/{} already exists", namespace, name);
            return Ok(false);
        }

        info!("Creating a new Service {}/{}", namespace, name);
        self.client.create_service(namespace, &service).await?;
        self.metrics.child_created("service");
        Ok(true)
    }
}
