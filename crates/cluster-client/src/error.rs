//! Cluster client errors

use thiserror::Error;

/// Errors that can occur when talking to the Kubernetes API
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Kubernetes API or transport error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Object to write does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Object already exists, a create raced with another writer (HTTP 409)
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// resourceVersion precondition failed (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Other API failure (used by test doubles)
    #[error("Cluster API error: {0}")]
    Api(String),
}
