//! Mock ClusterClient for unit testing
//!
//! This module provides an in-memory implementation of `ClusterClientTrait`
//! that can be used in unit tests without a running API server.
//!
//! Every write is appended to a log so tests can assert that a
//! reconciliation was (or was not) a no-op, and individual operations can be
//! made to fail to simulate transient API errors.

use crate::cluster_trait::ClusterClientTrait;
use crate::error::ClusterError;
use crds::{Teamspeak, TeamspeakStatus};
use k8s_openapi::api::core::v1::{Node, Pod, Service};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Key = (String, String);

/// Operations of the mock that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    /// `get_teamspeak`
    GetTeamspeak,
    /// `patch_teamspeak_status`
    PatchTeamspeakStatus,
    /// `list_nodes`
    ListNodes,
    /// `list_services`
    ListServices,
    /// `get_pod`
    GetPod,
    /// `create_pod`
    CreatePod,
    /// `get_service`
    GetService,
    /// `create_service`
    CreateService,
}

/// Mock ClusterClient for testing
///
/// Stores objects in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MockClusterClient {
    teamspeaks: Arc<Mutex<BTreeMap<Key, Teamspeak>>>,
    nodes: Arc<Mutex<Vec<Node>>>,
    pods: Arc<Mutex<BTreeMap<Key, Pod>>>,
    services: Arc<Mutex<BTreeMap<Key, Service>>>,
    failures: Arc<Mutex<HashSet<MockOperation>>>,
    writes: Arc<Mutex<Vec<String>>>,
    next_resource_version: Arc<Mutex<u64>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

impl MockClusterClient {
    /// Create an empty mock cluster
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Teamspeak resource (for test setup)
    ///
    /// The stored copy gets a fresh resourceVersion.
    pub fn add_teamspeak(&self, mut teamspeak: Teamspeak) {
        teamspeak.metadata.resource_version = Some(self.bump_resource_version());
        let namespace = teamspeak.metadata.namespace.clone().unwrap_or_default();
        let name = teamspeak.metadata.name.clone().unwrap_or_default();
        lock(&self.teamspeaks).insert(key(&namespace, &name), teamspeak);
    }

    /// Add a node (for test setup)
    pub fn add_node(&self, node: Node) {
        lock(&self.nodes).push(node);
    }

    /// Add a Service (for test setup, not recorded as a write)
    pub fn add_service(&self, service: Service) {
        let namespace = service.metadata.namespace.clone().unwrap_or_default();
        let name = service.metadata.name.clone().unwrap_or_default();
        lock(&self.services).insert(key(&namespace, &name), service);
    }

    /// Add a Pod (for test setup, not recorded as a write)
    pub fn add_pod(&self, pod: Pod) {
        let namespace = pod.metadata.namespace.clone().unwrap_or_default();
        let name = pod.metadata.name.clone().unwrap_or_default();
        lock(&self.pods).insert(key(&namespace, &name), pod);
    }

    /// Remove a Pod, as the garbage collector or a user would
    pub fn remove_pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        lock(&self.pods).remove(&key(namespace, name))
    }

    /// Make every subsequent call of `operation` fail
    pub fn fail_on(&self, operation: MockOperation) {
        lock(&self.failures).insert(operation);
    }

    /// Stop failing `operation`
    pub fn clear_failure(&self, operation: MockOperation) {
        lock(&self.failures).remove(&operation);
    }

    /// Stored Teamspeak
    pub fn teamspeak(&self, namespace: &str, name: &str) -> Option<Teamspeak> {
        lock(&self.teamspeaks).get(&key(namespace, name)).cloned()
    }

    /// Stored Pod
    pub fn pod(&self, namespace: &str, name: &str) -> Option<Pod> {
        lock(&self.pods).get(&key(namespace, name)).cloned()
    }

    /// Stored Service
    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        lock(&self.services).get(&key(namespace, name)).cloned()
    }

    /// Writes issued through the trait, oldest first (e.g. `create pod default/r1-pod`)
    pub fn writes(&self) -> Vec<String> {
        lock(&self.writes).clone()
    }

    /// Forget recorded writes
    pub fn clear_writes(&self) {
        lock(&self.writes).clear();
    }

    fn bump_resource_version(&self) -> String {
        let mut next = lock(&self.next_resource_version);
        *next += 1;
        next.to_string()
    }

    fn check(&self, operation: MockOperation) -> Result<(), ClusterError> {
        if lock(&self.failures).contains(&operation) {
            return Err(ClusterError::Api(format!("injected failure for {:?}", operation)));
        }
        Ok(())
    }

    fn record(&self, write: String) {
        lock(&self.writes).push(write);
    }
}

#[async_trait::async_trait]
impl ClusterClientTrait for MockClusterClient {
    async fn get_teamspeak(&self, namespace: &str, name: &str) -> Result<Option<Teamspeak>, ClusterError> {
        self.check(MockOperation::GetTeamspeak)?;
        Ok(self.teamspeak(namespace, name))
    }

    async fn patch_teamspeak_status(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        status: &TeamspeakStatus,
    ) -> Result<Teamspeak, ClusterError> {
        self.check(MockOperation::PatchTeamspeakStatus)?;
        let new_version = self.bump_resource_version();
        let mut teamspeaks = lock(&self.teamspeaks);
        let stored = teamspeaks
            .get_mut(&key(namespace, name))
            .ok_or_else(|| ClusterError::NotFound(format!("Teamspeak {}/{} not found", namespace, name)))?;

        if let Some(rv) = resource_version {
            if stored.metadata.resource_version.as_deref() != Some(rv) {
                return Err(ClusterError::Conflict(format!(
                    "Teamspeak {}/{} resourceVersion {} is stale",
                    namespace, name, rv
                )));
            }
        }

        stored.status = Some(status.clone());
        stored.metadata.resource_version = Some(new_version);
        let updated = stored.clone();
        drop(teamspeaks);

        self.record(format!("patch teamspeak/status {}/{}", namespace, name));
        Ok(updated)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        self.check(MockOperation::ListNodes)?;
        Ok(lock(&self.nodes).clone())
    }

    async fn list_services(&self) -> Result<Vec<Service>, ClusterError> {
        self.check(MockOperation::ListServices)?;
        Ok(lock(&self.services).values().cloned().collect())
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, ClusterError> {
        self.check(MockOperation::GetPod)?;
        Ok(self.pod(namespace, name))
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, ClusterError> {
        self.check(MockOperation::CreatePod)?;
        let name = pod.metadata.name.clone().unwrap_or_default();
        let mut pods = lock(&self.pods);
        if pods.contains_key(&key(namespace, &name)) {
            return Err(ClusterError::AlreadyExists(format!("Pod {}/{}", namespace, name)));
        }
        let mut created = pod.clone();
        created.metadata.namespace = Some(namespace.to_string());
        pods.insert(key(namespace, &name), created.clone());
        drop(pods);

        self.record(format!("create pod {}/{}", namespace, name));
        Ok(created)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>, ClusterError> {
        self.check(MockOperation::GetService)?;
        Ok(self.service(namespace, name))
    }

    async fn create_service(&self, namespace: &str, service: &Service) -> Result<Service, ClusterError> {
        self.check(MockOperation::CreateService)?;
        let name = service.metadata.name.clone().unwrap_or_default();
        let mut services = lock(&self.services);
        if services.contains_key(&key(namespace, &name)) {
            return Err(ClusterError::AlreadyExists(format!("Service {}/{}", namespace, name)));
        }
        let mut created = service.clone();
        created.metadata.namespace = Some(namespace.to_string());
        services.insert(key(namespace, &name), created.clone());
        drop(services);

        self.record(format!("create service {}/{}", namespace, name));
        Ok(created)
    }
}
