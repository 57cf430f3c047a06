//! Test utilities for unit testing reconcilers
//!
//! This module provides helpers for creating test objects and setting up
//! test scenarios against `MockClusterClient`.

use crate::allocator::AddressAllocator;
use crate::config::DEFAULT_IMAGE_REPOSITORY;
use crate::metrics::Metrics;
use crate::reconciler::Reconciler;
use crate::resources::ImageSettings;
use cluster_client::MockClusterClient;
use crds::{
    DEFAULT_ADDRESS_ANNOTATION, GAMESERVER_TYPE_LABEL, Teamspeak, TeamspeakSpec, TeamspeakStatus,
};
use k8s_openapi::api::core::v1::{Node, Service, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Helper to create a test node advertising `addresses` (comma-separated)
pub fn create_test_node(name: &str, addresses: &str) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            annotations: Some(BTreeMap::from([(
                DEFAULT_ADDRESS_ANNOTATION.to_string(),
                addresses.to_string(),
            )])),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Helper to create a Service that selects game-server Pods of `kind`
pub fn create_test_gameserver_service(namespace: &str, name: &str, kind: &str, external_ips: &[&str]) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(BTreeMap::from([
                ("app".to_string(), name.to_string()),
                (GAMESERVER_TYPE_LABEL.to_string(), kind.to_string()),
            ])),
            external_ips: Some(external_ips.iter().map(|ip| ip.to_string()).collect()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Helper to create a Service unrelated to game servers
pub fn create_test_plain_service(namespace: &str, name: &str, external_ips: &[&str]) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(BTreeMap::from([("app".to_string(), name.to_string())])),
            external_ips: Some(external_ips.iter().map(|ip| ip.to_string()).collect()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Helper to create a test Teamspeak CR, addressed when `address` is non-empty
pub fn create_test_teamspeak(name: &str, namespace: &str, version: &str, address: &str) -> Teamspeak {
    Teamspeak {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            uid: Some(format!("uid-{}-{}", namespace, name)),
            ..Default::default()
        },
        spec: TeamspeakSpec {
            version: version.to_string(),
        },
        status: (!address.is_empty()).then(|| TeamspeakStatus {
            address: address.to_string(),
            ..Default::default()
        }),
    }
}

/// Helper to create a reconciler backed by `mock`, using the default annotation and image
pub fn create_test_reconciler(mock: &MockClusterClient) -> Reconciler {
    Reconciler::new(
        Arc::new(mock.clone()),
        AddressAllocator::new(DEFAULT_ADDRESS_ANNOTATION),
        ImageSettings {
            repository: DEFAULT_IMAGE_REPOSITORY.to_string(),
        },
        Metrics::new().unwrap(),
    )
}
