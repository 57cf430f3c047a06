//! Address allocation from the node-advertised pool.
//!
//! Nodes advertise the external addresses they can serve through a
//! comma-separated annotation. An address is free when no game-server Service
//! (any kind, any namespace) exposes it as its first external IP. The pool
//! is recomputed from live cluster state on every call; nothing is cached.

use cluster_client::{ClusterClientTrait, ClusterError};
use crds::GAMESERVER_TYPE_LABEL;
use k8s_openapi::api::core::v1::{Node, Service};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{debug, warn};

/// A free address and the node that advertised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Node whose annotation listed the address
    pub node: String,
    /// The address itself
    pub address: String,
}

/// Selects free addresses from the pool advertised by cluster nodes.
#[derive(Debug, Clone)]
pub struct AddressAllocator {
    annotation: String,
}

impl AddressAllocator {
    /// Creates an allocator reading the pool from the `annotation` node annotation.
    pub fn new(annotation: impl Into<String>) -> Self {
        Self {
            annotation: annotation.into(),
        }
    }

    /// Finds a free address, or `None` when every advertised address is claimed.
    ///
    /// Read-only against the cluster. API errors are returned unchanged.
    pub async fn allocate(&self, client: &dyn ClusterClientTrait) -> Result<Option<Allocation>, ClusterError> {
        let nodes = client.list_nodes().await?;
        let services = client.list_services().await?;
        Ok(select_free_address(&nodes, &services, &self.annotation))
    }
}

/// Pure selection step of [`AddressAllocator::allocate`].
///
/// When several nodes advertise the same address the last one listed wins.
/// The lowest free address is returned: IP addresses in numeric order first,
/// then any unparseable entries in lexicographic order.
pub fn select_free_address(nodes: &[Node], services: &[Service], annotation: &str) -> Option<Allocation> {
    let mut candidates = advertised_addresses(nodes, annotation);
    debug!("{} addresses advertised by {} nodes", candidates.len(), nodes.len());

    for address in claimed_addresses(services) {
        candidates.remove(address);
    }

    candidates
        .into_iter()
        .min_by(|(a, _), (b, _)| compare_addresses(a, b))
        .map(|(address, node)| Allocation {
            node: node.to_string(),
            address: address.to_string(),
        })
}

/// Builds the `address -> node` map from node annotations (last node wins).
fn advertised_addresses<'a>(nodes: &'a [Node], annotation: &str) -> HashMap<&'a str, &'a str> {
    let mut addresses = HashMap::new();
    for node in nodes {
        let node_name = node.metadata.name.as_deref().unwrap_or_default();
        let Some(list) = node.metadata.annotations.as_ref().and_then(|a| a.get(annotation)) else {
            continue;
        };
        for address in list.split(',').map(str::trim).filter(|a| !a.is_empty()) {
            addresses.insert(address, node_name);
        }
    }
    addresses
}

/// First external IP of every Service selecting game-server Pods.
fn claimed_addresses(services: &[Service]) -> impl Iterator<Item = &str> {
    services.iter().filter_map(|svc| {
        let spec = svc.spec.as_ref()?;
        if !spec.selector.as_ref().is_some_and(|s| s.contains_key(GAMESERVER_TYPE_LABEL)) {
            return None;
        }
        let first = spec.external_ips.as_ref().and_then(|ips| ips.first());
        if first.is_none() {
            warn!(
                "Game-server Service {}/{} has no external IP, it claims no address",
                svc.metadata.namespace.as_deref().unwrap_or_default(),
                svc.metadata.name.as_deref().unwrap_or_default(),
            );
        }
        first.map(String::as_str)
    })
}

fn compare_addresses(a: &str, b: &str) -> Ordering {
    match (a.parse::<IpAddr>(), b.parse::<IpAddr>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
