//! ClusterClient trait for mocking
//!
//! This trait abstracts the Kubernetes API calls made by the reconcilers.
//! The concrete `KubeClusterClient` implements it over `kube::Api`, and tests
//! use `MockClusterClient`.

use crate::error::ClusterError;
use crds::{Teamspeak, TeamspeakStatus};
use k8s_openapi::api::core::v1::{Node, Pod, Service};

/// Trait for the Kubernetes operations used by the game-server controllers
///
/// `get_*` methods return `Ok(None)` when the object does not exist; every
/// other failure is an error. All methods must be `Send` to work with Tokio's
/// work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterClientTrait: Send + Sync {
    /// Fetches a Teamspeak; `Ok(None)` when it does not exist.
    async fn get_teamspeak(&self, namespace: &str, name: &str) -> Result<Option<Teamspeak>, ClusterError>;

    /// Merge-patches the status subresource.
    ///
    /// When `resource_version` is set the patch only applies if the stored
    /// object still has that version; otherwise it fails with
    /// [`ClusterError::Conflict`].
    async fn patch_teamspeak_status(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        status: &TeamspeakStatus,
    ) -> Result<Teamspeak, ClusterError>;

    /// Lists all Nodes.
    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError>;
    /// Lists Services across all namespaces.
    async fn list_services(&self) -> Result<Vec<Service>, ClusterError>;

    /// Fetches a Pod; `Ok(None)` when it does not exist.
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterError>;
    /// Creates a Pod; fails with [`ClusterError::AlreadyExists`] if the name is taken.
    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ClusterError>;
    /// Fetches a Service; `Ok(None)` when it does not exist.
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, ClusterError>;
    /// Creates a Service; fails with [`ClusterError::AlreadyExists`] if the name is taken.
    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError>;
}
