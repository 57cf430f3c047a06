//! Controller-specific error types.
//!
//! This module defines error types specific to the Teamspeak Controller
//! that are not covered by upstream library errors.

use cluster_client::ClusterError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Teamspeak Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client construction or watch error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Cluster API call failed (transient; the reconciliation is re-run)
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    /// No free address left in the node-advertised pool
    #[error("Cannot find free IP address for {0}")]
    AddressPoolExhausted(String),

    /// Resource is missing a field the controller relies on
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Probe server I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Admission-type failure: the requested address is currently unavailable
    /// and the reconciliation should be retried after a backoff.
    pub fn is_retryable_admission(&self) -> bool {
        matches!(self, Self::AddressPoolExhausted(_))
    }

    /// Short label used for the error metric and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Kube(_) => "kube",
            Self::Cluster(_) => "cluster",
            Self::AddressPoolExhausted(_) => "address_pool_exhausted",
            Self::InvalidResource(_) => "invalid_resource",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Metrics(_) => "metrics",
            Self::Io(_) => "io",
            Self::Watch(_) => "watch",
        }
    }
}
