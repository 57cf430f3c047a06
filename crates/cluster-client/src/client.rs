//! `kube::Api` backed implementation of [`ClusterClientTrait`].

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crds::{Teamspeak, TeamspeakStatus};
use k8s_openapi::api::core::v1::{Node, Pod, Service};
use kube::api::{ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};
use serde_json::json;
use tracing::debug;

/// Field manager recorded on objects written by the controllers.
pub const FIELD_MANAGER: &str = "gameservers-operator";

/// Cluster client over a live Kubernetes API server.
#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
}

impl std::fmt::Debug for KubeClusterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClusterClient").finish_non_exhaustive()
    }
}

impl KubeClusterClient {
    /// Wraps an existing Kubernetes client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

/// HTTP status of an error response from the API server.
fn api_status(error: &kube::Error) -> Option<u16> {
    match error {
        kube::Error::Api(response) => Some(response.code),
        _ => None,
    }
}

/// Classifies a failed write.
///
/// The API server answers 409 both for a stale resourceVersion and for a
/// name that is already taken; `on_conflict` picks the variant for the call.
fn write_error(error: kube::Error, on_conflict: fn(String) -> ClusterError) -> ClusterError {
    match api_status(&error) {
        Some(404) => ClusterError::NotFound(error.to_string()),
        Some(409) => on_conflict(error.to_string()),
        _ => ClusterError::Kube(error),
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for KubeClusterClient {
    async fn get_teamspeak(&self, namespace: &str, name: &str) -> Result<Option<Teamspeak>, ClusterError> {
        let api: Api<Teamspeak> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn patch_teamspeak_status(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        status: &TeamspeakStatus,
    ) -> Result<Teamspeak, ClusterError> {
        let api: Api<Teamspeak> = Api::namespaced(self.client.clone(), namespace);

        // A resourceVersion in a merge patch turns it into a conditional update
        let mut status_patch = json!({ "status": status });
        if let Some(rv) = resource_version {
            status_patch["metadata"] = json!({ "resourceVersion": rv });
        }

        debug!("Patching Teamspeak {}/{} status: {}", namespace, name, status_patch);
        let pp = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        };
        api.patch_status(name, &pp, &Patch::Merge(&status_patch))
            .await
            .map_err(|e| write_error(e, ClusterError::Conflict))
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_services(&self) -> Result<Vec<Service>, ClusterError> {
        let api: Api<Service> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ClusterError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.create(&Self::post_params(), pod)
            .await
            .map_err(|e| write_error(e, ClusterError::AlreadyExists))
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, ClusterError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError> {
        let api: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        api.create(&Self::post_params(), service)
            .await
            .map_err(|e| write_error(e, ClusterError::AlreadyExists))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(
            serde_json::from_value(json!({
                "kind": "Status",
                "apiVersion": "v1",
                "metadata": {},
                "status": "Failure",
                "message": format!("request failed with {}", reason),
                "reason": reason,
                "code": code,
            }))
            .unwrap(),
        )
    }

    #[test]
    fn test_stale_status_patch_is_conflict() {
        let err = write_error(api_error(409, "Conflict"), ClusterError::Conflict);
        assert!(matches!(err, ClusterError::Conflict(_)));
    }

    #[test]
    fn test_taken_name_is_already_exists() {
        let err = write_error(api_error(409, "AlreadyExists"), ClusterError::AlreadyExists);
        assert!(matches!(err, ClusterError::AlreadyExists(_)));
    }

    #[test]
    fn test_missing_object_is_not_found() {
        let err = write_error(api_error(404, "NotFound"), ClusterError::Conflict);
        assert!(matches!(err, ClusterError::NotFound(_)));
    }

    #[test]
    fn test_other_failures_stay_kube_errors() {
        let err = write_error(api_error(500, "InternalError"), ClusterError::Conflict);
        assert!(matches!(err, ClusterError::Kube(kube::Error::Api(_))));
        assert_eq!(api_status(&api_error(503, "ServiceUnavailable")), Some(503));
    }
}
