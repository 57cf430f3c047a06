//! Teamspeak CRD
//!
//! Requests a Teamspeak server of a given version, reachable on an address
//! allocated from the node-advertised pool.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Game-server kind value used in the `chinchilla.gameserver.type` label.
pub const TEAMSPEAK_KIND: &str = "teamspeak";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[kube(
    group = "gameservers.chinchilla.io",
    version = "v1",
    kind = "Teamspeak",
    namespaced,
    status = "TeamspeakStatus",
    shortname = "ts",
    derive = "PartialEq",
    printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Address", "type":"string", "jsonPath":".status.address"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TeamspeakSpec {
    /// Server build to run (image tag)
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TeamspeakStatus {
    /// Allocated external address, empty until allocated
    ///
    /// Set once by the controller and never changed afterwards.
    #[serde(default)]
    pub address: String,

    /// Node that advertised the allocated address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// When the address was allocated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Teamspeak {
    /// Returns the allocated address, or `None` while unaddressed.
    pub fn assigned_address(&self) -> Option<&str> {
        self.status
            .as_ref()
            .map(|s| s.address.as_str())
            .filter(|a| !a.is_empty())
    }
}
