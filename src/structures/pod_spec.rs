// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pod spec and pod template structures shared by pods and workload controllers.

use crate::constants::service_account;
use crate::schema::{blocks, Attribute, Block, Validator};
use crate::structures::metadata::{
    expand_metadata, flatten_metadata, template_metadata_schema, MetadataModel,
};
use crate::structures::{
    expand_file_mode, expand_quantities, flatten_file_mode, flatten_quantities, non_empty,
    non_empty_map, non_empty_vec, non_zero_i32, non_zero_i64, ptr_to_bool, ptr_to_i32,
    ptr_to_i64, ptr_to_string,
};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, EnvVarSource, HostPathVolumeSource,
    ObjectFieldSelector, PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec,
    ResourceRequirements, SecretVolumeSource, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PodSpecModel {
    pub active_deadline_seconds: i64,
    pub automount_service_account_token: bool,
    pub container: Vec<ContainerModel>,
    pub dns_policy: String,
    pub host_network: bool,
    pub hostname: String,
    pub init_container: Vec<ContainerModel>,
    pub node_name: String,
    pub node_selector: BTreeMap<String, String>,
    pub priority_class_name: String,
    pub restart_policy: String,
    pub service_account_name: String,
    pub termination_grace_period_seconds: i64,
    pub volume: Vec<VolumeModel>,
}

impl Default for PodSpecModel {
    fn default() -> Self {
        PodSpecModel {
            active_deadline_seconds: 0,
            automount_service_account_token: true,
            container: Vec::new(),
            dns_policy: "ClusterFirst".to_string(),
            host_network: false,
            hostname: String::new(),
            init_container: Vec::new(),
            node_name: String::new(),
            node_selector: BTreeMap::new(),
            priority_class_name: String::new(),
            restart_policy: "Always".to_string(),
            service_account_name: String::new(),
            termination_grace_period_seconds: 30,
            volume: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ContainerModel {
    pub args: Vec<String>,
    pub command: Vec<String>,
    pub env: Vec<EnvModel>,
    pub image: String,
    pub image_pull_policy: String,
    pub name: String,
    pub port: Vec<ContainerPortModel>,
    #[serde(with = "blocks::optional")]
    pub resources: Option<ResourcesModel>,
    pub volume_mount: Vec<VolumeMountModel>,
    pub working_dir: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EnvModel {
    pub name: String,
    pub value: String,
    #[serde(with = "blocks::optional")]
    pub value_from: Option<EnvValueFromModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EnvValueFromModel {
    #[serde(with = "blocks::optional")]
    pub field_ref: Option<FieldRefModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct FieldRefModel {
    pub api_version: String,
    pub field_path: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ContainerPortModel {
    pub container_port: i32,
    pub host_ip: String,
    pub host_port: i32,
    pub name: String,
    pub protocol: String,
}

impl Default for ContainerPortModel {
    fn default() -> Self {
        ContainerPortModel {
            container_port: 0,
            host_ip: String::new(),
            host_port: 0,
            name: String::new(),
            protocol: "TCP".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ResourcesModel {
    pub limits: BTreeMap<String, String>,
    pub requests: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct VolumeMountModel {
    pub mount_path: String,
    pub mount_propagation: String,
    pub name: String,
    pub read_only: bool,
    pub sub_path: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct VolumeModel {
    pub name: String,
    #[serde(with = "blocks::optional")]
    pub empty_dir: Option<EmptyDirModel>,
    #[serde(with = "blocks::optional")]
    pub host_path: Option<HostPathModel>,
    #[serde(with = "blocks::optional")]
    pub persistent_volume_claim: Option<PersistentVolumeClaimSourceModel>,
    #[serde(with = "blocks::optional")]
    pub secret: Option<SecretVolumeModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EmptyDirModel {
    pub medium: String,
    pub size_limit: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct HostPathModel {
    pub path: String,
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct PersistentVolumeClaimSourceModel {
    pub claim_name: String,
    pub read_only: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SecretVolumeModel {
    pub default_mode: String,
    pub optional: bool,
    pub secret_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct PodTemplateModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    #[serde(with = "blocks::single")]
    pub spec: PodSpecModel,
}

/// `force_new` unless the surrounding object can roll out spec changes
fn immutable(attr: Attribute, updatable: bool) -> Attribute {
    if updatable {
        attr
    } else {
        attr.force_new()
    }
}

fn container_block(updatable: bool) -> Block {
    let env = Block::new()
        .attr("name", Attribute::string().required().description("Name of the environment variable"))
        .attr("value", Attribute::string().optional())
        .attr(
            "value_from",
            Attribute::single_block(Block::new().attr(
                "field_ref",
                Attribute::single_block(
                    Block::new()
                        .attr("api_version", Attribute::string().optional().default("v1"))
                        .attr("field_path", Attribute::string().optional()),
                )
                .optional(),
            ))
            .optional()
            .description("Source for the environment variable's value"),
        );

    let port = Block::new()
        .attr(
            "container_port",
            Attribute::int().required().validate(Validator::PortNumber),
        )
        .attr("host_ip", Attribute::string().optional().validate(Validator::IpAddress))
        .attr(
            "host_port",
            Attribute::int().optional().validate(Validator::PortNumberOrZero),
        )
        .attr("name", Attribute::string().optional())
        .attr(
            "protocol",
            Attribute::string()
                .optional()
                .default("TCP")
                .validate(Validator::OneOf(&["TCP", "UDP", "SCTP"])),
        );

    let resources = Block::new()
        .attr("limits", Attribute::string_map().optional().computed())
        .attr("requests", Attribute::string_map().optional().computed());

    let volume_mount = Block::new()
        .attr("mount_path", Attribute::string().required())
        .attr(
            "mount_propagation",
            Attribute::string()
                .optional()
                .default("None")
                .validate(Validator::OneOf(&["None", "HostToContainer", "Bidirectional"])),
        )
        .attr("name", Attribute::string().required())
        .attr("read_only", Attribute::bool().optional().default(false))
        .attr("sub_path", Attribute::string().optional());

    Block::new()
        .attr("args", immutable(Attribute::string_list().optional(), updatable))
        .attr("command", immutable(Attribute::string_list().optional(), updatable))
        .attr("env", immutable(Attribute::block_list(env).optional(), updatable))
        .attr(
            "image",
            Attribute::string().optional().computed().description("Container image name"),
        )
        .attr(
            "image_pull_policy",
            immutable(
                Attribute::string()
                    .optional()
                    .computed()
                    .validate(Validator::OneOf(&["Always", "Never", "IfNotPresent"])),
                updatable,
            ),
        )
        .attr(
            "name",
            immutable(
                Attribute::string().required().validate(Validator::DnsLabel),
                updatable,
            ),
        )
        .attr("port", immutable(Attribute::block_list(port).optional(), updatable))
        .attr(
            "resources",
            immutable(Attribute::single_block(resources).optional().computed(), updatable),
        )
        .attr(
            "volume_mount",
            immutable(Attribute::block_list(volume_mount).optional(), updatable),
        )
        .attr("working_dir", immutable(Attribute::string().optional(), updatable))
}

fn volume_block() -> Block {
    Block::new()
        .attr("name", Attribute::string().optional().validate(Validator::DnsLabel))
        .attr(
            "empty_dir",
            Attribute::single_block(
                Block::new()
                    .attr(
                        "medium",
                        Attribute::string()
                            .optional()
                            .default("")
                            .validate(Validator::OneOf(&["", "Memory"])),
                    )
                    .attr("size_limit", Attribute::string().optional()),
            )
            .optional(),
        )
        .attr(
            "host_path",
            Attribute::single_block(
                Block::new()
                    .attr("path", Attribute::string().optional())
                    .attr("type", Attribute::string().optional().default("")),
            )
            .optional(),
        )
        .attr(
            "persistent_volume_claim",
            Attribute::single_block(
                Block::new()
                    .attr("claim_name", Attribute::string().optional())
                    .attr("read_only", Attribute::bool().optional().default(false)),
            )
            .optional(),
        )
        .attr(
            "secret",
            Attribute::single_block(
                Block::new()
                    .attr(
                        "default_mode",
                        Attribute::string()
                            .optional()
                            .default("0644")
                            .validate(Validator::FileMode),
                    )
                    .attr("optional", Attribute::bool().optional())
                    .attr("secret_name", Attribute::string().optional()),
            )
            .optional(),
        )
}

/// Schema of a pod spec. Bare pods cannot change most fields in place.
pub fn pod_spec_block(updatable: bool) -> Block {
    Block::new()
        .attr(
            "active_deadline_seconds",
            Attribute::int().optional().validate(Validator::IntAtLeast(1)),
        )
        .attr(
            "automount_service_account_token",
            immutable(Attribute::bool().optional().default(true), updatable),
        )
        .attr(
            "container",
            Attribute::block_list(container_block(updatable))
                .optional()
                .description("List of containers belonging to the pod"),
        )
        .attr(
            "dns_policy",
            immutable(
                Attribute::string()
                    .optional()
                    .default("ClusterFirst")
                    .validate(Validator::OneOf(&[
                        "ClusterFirst",
                        "ClusterFirstWithHostNet",
                        "Default",
                        "None",
                    ])),
                updatable,
            ),
        )
        .attr(
            "host_network",
            immutable(Attribute::bool().optional().default(false), updatable),
        )
        .attr(
            "hostname",
            immutable(Attribute::string().optional().computed(), updatable),
        )
        .attr(
            "init_container",
            immutable(
                Attribute::block_list(container_block(updatable)).optional(),
                updatable,
            ),
        )
        .attr(
            "node_name",
            immutable(Attribute::string().optional().computed(), updatable),
        )
        .attr(
            "node_selector",
            immutable(Attribute::string_map().optional(), updatable),
        )
        .attr(
            "priority_class_name",
            immutable(Attribute::string().optional().computed(), updatable),
        )
        .attr(
            "restart_policy",
            immutable(
                Attribute::string()
                    .optional()
                    .default("Always")
                    .validate(Validator::OneOf(&["Always", "OnFailure", "Never"])),
                updatable,
            ),
        )
        .attr(
            "service_account_name",
            immutable(Attribute::string().optional().computed(), updatable),
        )
        .attr(
            "termination_grace_period_seconds",
            immutable(
                Attribute::int()
                    .optional()
                    .default(30)
                    .validate(Validator::IntAtLeast(0)),
                updatable,
            ),
        )
        .attr(
            "volume",
            immutable(Attribute::block_list(volume_block()).optional(), updatable),
        )
}

pub fn pod_template_block() -> Block {
    Block::new()
        .attr("metadata", template_metadata_schema())
        .attr(
            "spec",
            Attribute::single_block(pod_spec_block(true))
                .required()
                .description("Spec of the pods owned by this object"),
        )
}

pub fn expand_container(c: &ContainerModel) -> Container {
    Container {
        name: c.name.clone(),
        image: non_empty(&c.image),
        image_pull_policy: non_empty(&c.image_pull_policy),
        args: non_empty_vec(&c.args),
        command: non_empty_vec(&c.command),
        working_dir: non_empty(&c.working_dir),
        env: (!c.env.is_empty()).then(|| c.env.iter().map(expand_env).collect()),
        ports: (!c.port.is_empty()).then(|| c.port.iter().map(expand_container_port).collect()),
        resources: c.resources.as_ref().map(|r| ResourceRequirements {
            limits: expand_quantities(&r.limits),
            requests: expand_quantities(&r.requests),
            ..Default::default()
        }),
        volume_mounts: (!c.volume_mount.is_empty())
            .then(|| c.volume_mount.iter().map(expand_volume_mount).collect()),
        ..Default::default()
    }
}

fn expand_env(e: &EnvModel) -> EnvVar {
    EnvVar {
        name: e.name.clone(),
        value: non_empty(&e.value),
        value_from: e.value_from.as_ref().map(|vf| EnvVarSource {
            field_ref: vf.field_ref.as_ref().map(|f| ObjectFieldSelector {
                api_version: non_empty(&f.api_version),
                field_path: f.field_path.clone(),
            }),
            ..Default::default()
        }),
    }
}

fn expand_container_port(p: &ContainerPortModel) -> ContainerPort {
    ContainerPort {
        container_port: p.container_port,
        host_ip: non_empty(&p.host_ip),
        host_port: non_zero_i32(p.host_port),
        name: non_empty(&p.name),
        protocol: non_empty(&p.protocol),
    }
}

fn expand_volume_mount(v: &VolumeMountModel) -> VolumeMount {
    VolumeMount {
        mount_path: v.mount_path.clone(),
        mount_propagation: non_empty(&v.mount_propagation),
        name: v.name.clone(),
        read_only: v.read_only.then_some(true),
        sub_path: non_empty(&v.sub_path),
        ..Default::default()
    }
}

pub fn expand_volume(v: &VolumeModel) -> Volume {
    Volume {
        name: v.name.clone(),
        empty_dir: v.empty_dir.as_ref().map(|e| EmptyDirVolumeSource {
            medium: non_empty(&e.medium),
            size_limit: non_empty(&e.size_limit).map(Quantity),
        }),
        host_path: v.host_path.as_ref().map(|h| HostPathVolumeSource {
            path: h.path.clone(),
            type_: non_empty(&h.type_),
        }),
        persistent_volume_claim: v.persistent_volume_claim.as_ref().map(|p| {
            PersistentVolumeClaimVolumeSource {
                claim_name: p.claim_name.clone(),
                read_only: p.read_only.then_some(true),
            }
        }),
        secret: v.secret.as_ref().map(|s| SecretVolumeSource {
            default_mode: expand_file_mode(&s.default_mode),
            optional: s.optional.then_some(true),
            secret_name: non_empty(&s.secret_name),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn expand_pod_spec(m: &PodSpecModel) -> PodSpec {
    PodSpec {
        active_deadline_seconds: non_zero_i64(m.active_deadline_seconds),
        automount_service_account_token: Some(m.automount_service_account_token),
        containers: m.container.iter().map(expand_container).collect(),
        dns_policy: non_empty(&m.dns_policy),
        host_network: m.host_network.then_some(true),
        hostname: non_empty(&m.hostname),
        init_containers: (!m.init_container.is_empty())
            .then(|| m.init_container.iter().map(expand_container).collect()),
        node_name: non_empty(&m.node_name),
        node_selector: non_empty_map(&m.node_selector),
        priority_class_name: non_empty(&m.priority_class_name),
        restart_policy: non_empty(&m.restart_policy),
        service_account_name: non_empty(&m.service_account_name),
        termination_grace_period_seconds: Some(m.termination_grace_period_seconds),
        volumes: (!m.volume.is_empty()).then(|| m.volume.iter().map(expand_volume).collect()),
        ..Default::default()
    }
}

pub fn expand_pod_template(m: &PodTemplateModel) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(expand_metadata(&m.metadata)),
        spec: Some(expand_pod_spec(&m.spec)),
    }
}

/// Volumes the API server mounts for the service account token
fn is_service_account_volume(name: &str) -> bool {
    service_account::VOLUME_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

pub fn flatten_container(c: &Container, configured_volumes: &[String]) -> ContainerModel {
    ContainerModel {
        args: c.args.clone().unwrap_or_default(),
        command: c.command.clone().unwrap_or_default(),
        env: c
            .env
            .iter()
            .flatten()
            .map(|e| EnvModel {
                name: e.name.clone(),
                value: ptr_to_string(&e.value),
                value_from: e.value_from.as_ref().map(|vf| EnvValueFromModel {
                    field_ref: vf.field_ref.as_ref().map(|f| FieldRefModel {
                        api_version: ptr_to_string(&f.api_version),
                        field_path: f.field_path.clone(),
                    }),
                }),
            })
            .collect(),
        image: ptr_to_string(&c.image),
        image_pull_policy: ptr_to_string(&c.image_pull_policy),
        name: c.name.clone(),
        port: c
            .ports
            .iter()
            .flatten()
            .map(|p| ContainerPortModel {
                container_port: p.container_port,
                host_ip: ptr_to_string(&p.host_ip),
                host_port: ptr_to_i32(p.host_port),
                name: ptr_to_string(&p.name),
                protocol: ptr_to_string(&p.protocol),
            })
            .collect(),
        resources: c.resources.as_ref().map(|r| ResourcesModel {
            limits: flatten_quantities(&r.limits),
            requests: flatten_quantities(&r.requests),
        }),
        volume_mount: c
            .volume_mounts
            .iter()
            .flatten()
            .filter(|m| {
                configured_volumes.contains(&m.name)
                    || !(is_service_account_volume(&m.name)
                        || m.mount_path == service_account::MOUNT_PATH)
            })
            .map(|m| VolumeMountModel {
                mount_path: m.mount_path.clone(),
                mount_propagation: ptr_to_string(&m.mount_propagation),
                name: m.name.clone(),
                read_only: ptr_to_bool(m.read_only),
                sub_path: ptr_to_string(&m.sub_path),
            })
            .collect(),
        working_dir: ptr_to_string(&c.working_dir),
    }
}

pub fn flatten_volume(v: &Volume) -> VolumeModel {
    VolumeModel {
        name: v.name.clone(),
        empty_dir: v.empty_dir.as_ref().map(|e| EmptyDirModel {
            medium: ptr_to_string(&e.medium),
            size_limit: e.size_limit.as_ref().map(|q| q.0.clone()).unwrap_or_default(),
        }),
        host_path: v.host_path.as_ref().map(|h| HostPathModel {
            path: h.path.clone(),
            type_: ptr_to_string(&h.type_),
        }),
        persistent_volume_claim: v.persistent_volume_claim.as_ref().map(|p| {
            PersistentVolumeClaimSourceModel {
                claim_name: p.claim_name.clone(),
                read_only: ptr_to_bool(p.read_only),
            }
        }),
        secret: v.secret.as_ref().map(|s| SecretVolumeModel {
            default_mode: flatten_file_mode(s.default_mode),
            optional: ptr_to_bool(s.optional),
            secret_name: ptr_to_string(&s.secret_name),
        }),
    }
}

/// Flatten a pod spec, hiding service account token volumes the user did not declare
pub fn flatten_pod_spec(spec: &PodSpec, configured: &PodSpecModel) -> PodSpecModel {
    let configured_volumes: Vec<String> =
        configured.volume.iter().map(|v| v.name.clone()).collect();

    PodSpecModel {
        active_deadline_seconds: ptr_to_i64(spec.active_deadline_seconds),
        automount_service_account_token: spec.automount_service_account_token.unwrap_or(true),
        container: spec
            .containers
            .iter()
            .map(|c| flatten_container(c, &configured_volumes))
            .collect(),
        dns_policy: ptr_to_string(&spec.dns_policy),
        host_network: ptr_to_bool(spec.host_network),
        hostname: ptr_to_string(&spec.hostname),
        init_container: spec
            .init_containers
            .iter()
            .flatten()
            .map(|c| flatten_container(c, &configured_volumes))
            .collect(),
        node_name: ptr_to_string(&spec.node_name),
        node_selector: spec.node_selector.clone().unwrap_or_default(),
        priority_class_name: ptr_to_string(&spec.priority_class_name),
        restart_policy: ptr_to_string(&spec.restart_policy),
        service_account_name: ptr_to_string(&spec.service_account_name),
        termination_grace_period_seconds: ptr_to_i64(spec.termination_grace_period_seconds),
        volume: spec
            .volumes
            .iter()
            .flatten()
            .filter(|v| configured_volumes.contains(&v.name) || !is_service_account_volume(&v.name))
            .map(flatten_volume)
            .collect(),
    }
}

pub fn flatten_pod_template(t: &PodTemplateSpec, configured: &PodTemplateModel) -> PodTemplateModel {
    PodTemplateModel {
        metadata: t
            .metadata
            .as_ref()
            .map(|m| flatten_metadata(m, &configured.metadata))
            .unwrap_or_default(),
        spec: t
            .spec
            .as_ref()
            .map(|s| flatten_pod_spec(s, &configured.spec))
            .unwrap_or_default(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn nginx_spec() -> PodSpecModel {
        PodSpecModel {
            container: vec![ContainerModel {
                name: "nginx".to_string(),
                image: "nginx:1.27".to_string(),
                port: vec![ContainerPortModel {
                    container_port: 80,
                    ..Default::default()
                }],
                env: vec![EnvModel {
                    name: "POD_IP".to_string(),
                    value_from: Some(EnvValueFromModel {
                        field_ref: Some(FieldRefModel {
                            api_version: "v1".to_string(),
                            field_path: "status.podIP".to_string(),
                        }),
                    }),
                    ..Default::default()
                }],
                resources: Some(ResourcesModel {
                    limits: BTreeMap::from([("cpu".to_string(), "500m".to_string())]),
                    requests: BTreeMap::new(),
                }),
                volume_mount: vec![VolumeMountModel {
                    mount_path: "/cache".to_string(),
                    name: "cache".to_string(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            volume: vec![VolumeModel {
                name: "cache".to_string(),
                empty_dir: Some(EmptyDirModel::default()),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_pod_spec_round_trip() {
        let m = nginx_spec();
        assert_eq!(flatten_pod_spec(&expand_pod_spec(&m), &m), m);
    }

    #[test]
    fn test_expand_pod_spec() {
        let spec = expand_pod_spec(&nginx_spec());
        assert_eq!(spec.containers.len(), 1);
        assert_eq!(spec.containers[0].image.as_deref(), Some("nginx:1.27"));
        assert_eq!(spec.restart_policy.as_deref(), Some("Always"));
        assert_eq!(spec.termination_grace_period_seconds, Some(30));
        assert!(spec.init_containers.is_none());
        let ports = spec.containers[0].ports.as_ref().unwrap();
        assert_eq!(ports[0].protocol.as_deref(), Some("TCP"));
    }

    #[test]
    fn test_flatten_hides_service_account_token_volume() {
        let m = nginx_spec();
        let mut spec = expand_pod_spec(&m);
        spec.volumes.get_or_insert_with(Vec::new).push(Volume {
            name: "kube-api-access-x7k2p".to_string(),
            ..Default::default()
        });
        spec.containers[0]
            .volume_mounts
            .get_or_insert_with(Vec::new)
            .push(VolumeMount {
                name: "kube-api-access-x7k2p".to_string(),
                mount_path: service_account::MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            });

        let flat = flatten_pod_spec(&spec, &m);
        assert_eq!(flat.volume.len(), 1);
        assert_eq!(flat.container[0].volume_mount.len(), 1);
    }

    #[test]
    fn test_secret_volume_mode() {
        let v = VolumeModel {
            name: "creds".to_string(),
            secret: Some(SecretVolumeModel {
                default_mode: "0600".to_string(),
                optional: false,
                secret_name: "creds".to_string(),
            }),
            ..Default::default()
        };
        let expanded = expand_volume(&v);
        assert_eq!(expanded.secret.as_ref().unwrap().default_mode, Some(0o600));
        assert_eq!(flatten_volume(&expanded), v);
    }

    #[test]
    fn test_pod_template_wire_shape() {
        let t = PodTemplateModel {
            metadata: MetadataModel {
                labels: BTreeMap::from([("app".to_string(), "web".to_string())]),
                ..Default::default()
            },
            spec: nginx_spec(),
        };
        let value = serde_json::to_value(&t).unwrap();
        assert_eq!(value["metadata"][0]["labels"], json!({"app": "web"}));
        assert_eq!(value["spec"][0]["container"][0]["name"], "nginx");
        assert_eq!(value["spec"][0]["container"][0]["resources"][0]["limits"]["cpu"], "500m");
    }

    #[test]
    fn test_pod_spec_schema_accepts_template_config() {
        let config = json!({
            "container": [{
                "name": "nginx",
                "image": "nginx",
                "port": [{"container_port": 80}]
            }]
        });
        assert!(pod_spec_block(true).validate(&config).is_empty());
    }

    #[test]
    fn test_bare_pod_schema_is_mostly_immutable() {
        let block = pod_spec_block(false);
        assert!(block.get("restart_policy").unwrap().force_new);
        assert!(!block.get("active_deadline_seconds").unwrap().force_new);
    }
}
