//! Desired Pod and Service for a Teamspeak resource.
//!
//! These builders are pure: the same resource always yields the same
//! objects. Owner references are attached separately by [`with_owner`] so
//! the builders stay independent of the resource's uid.

use crate::error::ControllerError;
use crds::{APP_LABEL, GAMESERVER_TYPE_LABEL, TEAMSPEAK_KIND, Teamspeak};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, Pod, PodSpec, Service, ServicePort, ServiceSpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use std::collections::BTreeMap;

/// TCP port of the server query / file transfer channel.
pub const CONTROL_PORT: i32 = 30033;
/// UDP port carrying voice traffic.
pub const VOICE_PORT: i32 = 9987;

const CONTAINER_NAME: &str = "teamspeak";
const LICENSE_ENV: &str = "TS3SERVER_LICENSE";

/// Image used for game-server Pods; the tag comes from `spec.version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSettings {
    /// Image repository, e.g. `teamspeak` or `registry.local/teamspeak`
    pub repository: String,
}

impl ImageSettings {
    /// Full image reference for `version`.
    pub fn image(&self, version: &str) -> String {
        format!("{}:{}", self.repository, version)
    }
}

/// Name of the Pod serving `teamspeak`.
pub fn pod_name(teamspeak: &Teamspeak) -> Result<String, ControllerError> {
    Ok(format!("{}-pod", name_of(teamspeak)?))
}

/// Name of the Service exposing `teamspeak`.
pub fn service_name(teamspeak: &Teamspeak) -> Result<String, ControllerError> {
    Ok(format!("{}-svc", name_of(teamspeak)?))
}

/// Labels on the Pod, also used as the Service selector.
pub fn pod_labels(teamspeak: &Teamspeak) -> Result<BTreeMap<String, String>, ControllerError> {
    Ok(BTreeMap::from([
        (APP_LABEL.to_string(), name_of(teamspeak)?.to_string()),
        (GAMESERVER_TYPE_LABEL.to_string(), TEAMSPEAK_KIND.to_string()),
    ]))
}

/// Builds the Pod running the server version requested by `teamspeak`.
pub fn pod_for(teamspeak: &Teamspeak, image: &ImageSettings) -> Result<Pod, ControllerError> {
    Ok(Pod {
        metadata: ObjectMeta {
            name: Some(pod_name(teamspeak)?),
            namespace: Some(namespace_of(teamspeak)?.to_string()),
            labels: Some(pod_labels(teamspeak)?),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: CONTAINER_NAME.to_string(),
                image: Some(image.image(&teamspeak.spec.version)),
                env: Some(vec![EnvVar {
                    name: LICENSE_ENV.to_string(),
                    value: Some("accept".to_string()),
                    ..Default::default()
                }]),
                ports: Some(vec![
                    ContainerPort {
                        container_port: CONTROL_PORT,
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    },
                    ContainerPort {
                        container_port: VOICE_PORT,
                        protocol: Some("UDP".to_string()),
                        ..Default::default()
                    },
                ]),
                ..Default::default()
            }],
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Builds the Service exposing the allocated address of `teamspeak`.
///
/// Fails while the resource has no address.
pub fn service_for(teamspeak: &Teamspeak) -> Result<Service, ControllerError> {
    let address = teamspeak.assigned_address().ok_or_else(|| {
        ControllerError::InvalidResource(format!(
            "Teamspeak {} has no address to expose",
            name_of(teamspeak).unwrap_or("<unknown>")
        ))
    })?;

    Ok(Service {
        metadata: ObjectMeta {
            name: Some(service_name(teamspeak)?),
            namespace: Some(namespace_of(teamspeak)?.to_string()),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            selector: Some(pod_labels(teamspeak)?),
            external_ips: Some(vec![address.to_string()]),
            ports: Some(vec![
                ServicePort {
                    name: Some("control".to_string()),
                    protocol: Some("TCP".to_string()),
                    port: CONTROL_PORT,
                    ..Default::default()
                },
                ServicePort {
                    name: Some("voice".to_string()),
                    protocol: Some("UDP".to_string()),
                    port: VOICE_PORT,
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    })
}

/// Controller owner reference pointing at `teamspeak`.
///
/// Children carrying it are garbage collected with the resource.
pub fn owner_reference(teamspeak: &Teamspeak) -> Result<OwnerReference, ControllerError> {
    teamspeak.controller_owner_ref(&()).ok_or_else(|| {
        ControllerError::InvalidResource(format!(
            "Teamspeak {} has no uid, cannot own children",
            name_of(teamspeak).unwrap_or("<unknown>")
        ))
    })
}

/// Attaches `owner` as the only owner reference of `meta`.
pub fn with_owner(meta: &mut ObjectMeta, owner: OwnerReference) {
    meta.owner_references = Some(vec![owner]);
}

fn name_of(teamspeak: &Teamspeak) -> Result<&str, ControllerError> {
    teamspeak
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| ControllerError::InvalidResource("Teamspeak missing name".to_string()))
}

fn namespace_of(teamspeak: &Teamspeak) -> Result<&str, ControllerError> {
    teamspeak.metadata.namespace.as_deref().ok_or_else(|| {
        ControllerError::InvalidResource(format!(
            "Teamspeak {} missing namespace",
            name_of(teamspeak).unwrap_or("<unknown>")
        ))
    })
}
