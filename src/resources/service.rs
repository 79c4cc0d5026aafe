// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{ProviderError, Result};
use crate::kubernetes::{object_warnings, KubeClientsets};
use crate::patch::PatchOperations;
use crate::resources::{
    delete_object, get_object, namespace_or_default, object_exists, Resource, ResourceData,
};
use crate::schema::{blocks, Attribute, Block, Validator};
use crate::structures::metadata::{
    expand_metadata, flatten_metadata, metadata_schema, patch_metadata, MetadataModel,
};
use crate::structures::{
    build_id, expand_int_or_string, flatten_int_or_string, id_parts, non_empty, non_empty_map,
    non_empty_vec, non_zero_i32, ptr_to_bool, ptr_to_i32, ptr_to_string,
};
use crate::wait::{retry, with_events, RetryError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec, ServiceStatus};
use kube::api::{DeleteParams, PatchParams, PostParams};
use kube::Api;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ServiceModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    #[serde(with = "blocks::single")]
    pub spec: ServiceSpecModel,
    pub status: Vec<ServiceStatusModel>,
    pub wait_for_load_balancer: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ServiceSpecModel {
    pub cluster_ip: String,
    pub external_ips: Vec<String>,
    pub external_name: String,
    pub external_traffic_policy: String,
    pub health_check_node_port: i32,
    pub load_balancer_ip: String,
    pub load_balancer_source_ranges: Vec<String>,
    pub port: Vec<ServicePortModel>,
    pub publish_not_ready_addresses: bool,
    pub selector: BTreeMap<String, String>,
    pub session_affinity: String,
    #[serde(rename = "type")]
    pub type_: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ServicePortModel {
    pub app_protocol: String,
    pub name: String,
    pub node_port: i32,
    pub port: i32,
    pub protocol: String,
    pub target_port: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ServiceStatusModel {
    pub load_balancer: Vec<LoadBalancerStatusModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct LoadBalancerStatusModel {
    pub ingress: Vec<LoadBalancerIngressModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct LoadBalancerIngressModel {
    pub hostname: String,
    pub ip: String,
}

pub struct ServiceResource;

fn service_spec_block() -> Block {
    let port = Block::new()
        .attr(
            "app_protocol",
            Attribute::string()
                .optional()
                .description("The application protocol for this port"),
        )
        .attr(
            "name",
            Attribute::string()
                .optional()
                .description("The name of this port within the service"),
        )
        .attr(
            "node_port",
            Attribute::int()
                .optional()
                .computed()
                .description("The port on each node on which this service is exposed"),
        )
        .attr(
            "port",
            Attribute::int()
                .required()
                .validate(Validator::PortNumber)
                .description("The port that will be exposed by this service"),
        )
        .attr(
            "protocol",
            Attribute::string()
                .optional()
                .default("TCP")
                .validate(Validator::OneOf(&["TCP", "UDP", "SCTP"])),
        )
        .attr(
            "target_port",
            Attribute::string()
                .optional()
                .computed()
                .validate(Validator::PortNameOrNumber)
                .description("Number or name of the port to access on the pods targeted by the service"),
        );

    Block::new()
        .attr(
            "cluster_ip",
            Attribute::string()
                .optional()
                .computed()
                .force_new()
                .description("The IP address of the service, \"None\" for a headless service"),
        )
        .attr(
            "external_ips",
            Attribute::string_set()
                .optional()
                .validate(Validator::IpAddress),
        )
        .attr("external_name", Attribute::string().optional())
        .attr(
            "external_traffic_policy",
            Attribute::string()
                .optional()
                .computed()
                .validate(Validator::OneOf(&["Local", "Cluster"])),
        )
        .attr(
            "health_check_node_port",
            Attribute::int()
                .optional()
                .computed()
                .force_new()
                .validate(Validator::PortNumberOrZero),
        )
        .attr("load_balancer_ip", Attribute::string().optional())
        .attr(
            "load_balancer_source_ranges",
            Attribute::string_set().optional().validate(Validator::Cidr),
        )
        .attr(
            "port",
            Attribute::block_list(port)
                .optional()
                .description("The list of ports that are exposed by this service"),
        )
        .attr(
            "publish_not_ready_addresses",
            Attribute::bool().optional().default(false),
        )
        .attr(
            "selector",
            Attribute::string_map()
                .optional()
                .description("Route service traffic to pods with label keys and values matching this selector"),
        )
        .attr(
            "session_affinity",
            Attribute::string()
                .optional()
                .default("None")
                .validate(Validator::OneOf(&["ClientIP", "None"])),
        )
        .attr(
            "type",
            Attribute::string()
                .optional()
                .default("ClusterIP")
                .validate(Validator::OneOf(&[
                    "ClusterIP",
                    "ExternalName",
                    "NodePort",
                    "LoadBalancer",
                ])),
        )
}

fn status_block() -> Block {
    let ingress = Block::new()
        .attr("hostname", Attribute::string().computed())
        .attr("ip", Attribute::string().computed());
    let load_balancer = Block::new().attr("ingress", Attribute::block_list(ingress).computed());
    Block::new().attr("load_balancer", Attribute::block_list(load_balancer).computed())
}

pub fn expand_service_ports(ports: &[ServicePortModel]) -> Vec<ServicePort> {
    ports
        .iter()
        .map(|p| ServicePort {
            app_protocol: non_empty(&p.app_protocol),
            name: non_empty(&p.name),
            node_port: non_zero_i32(p.node_port),
            port: p.port,
            protocol: non_empty(&p.protocol),
            target_port: expand_int_or_string(&p.target_port),
        })
        .collect()
}

pub fn flatten_service_ports(ports: &[ServicePort]) -> Vec<ServicePortModel> {
    ports
        .iter()
        .map(|p| ServicePortModel {
            app_protocol: ptr_to_string(&p.app_protocol),
            name: ptr_to_string(&p.name),
            node_port: ptr_to_i32(p.node_port),
            port: p.port,
            protocol: ptr_to_string(&p.protocol),
            target_port: flatten_int_or_string(&p.target_port),
        })
        .collect()
}

fn expand_service_spec(m: &ServiceSpecModel) -> ServiceSpec {
    ServiceSpec {
        cluster_ip: non_empty(&m.cluster_ip),
        external_ips: non_empty_vec(&m.external_ips),
        external_name: non_empty(&m.external_name),
        external_traffic_policy: non_empty(&m.external_traffic_policy),
        health_check_node_port: non_zero_i32(m.health_check_node_port),
        load_balancer_ip: non_empty(&m.load_balancer_ip),
        load_balancer_source_ranges: non_empty_vec(&m.load_balancer_source_ranges),
        ports: non_empty_vec(&expand_service_ports(&m.port)),
        publish_not_ready_addresses: m.publish_not_ready_addresses.then_some(true),
        selector: non_empty_map(&m.selector),
        session_affinity: non_empty(&m.session_affinity),
        type_: non_empty(&m.type_),
        ..Default::default()
    }
}

fn flatten_service_spec(spec: &ServiceSpec) -> ServiceSpecModel {
    ServiceSpecModel {
        cluster_ip: ptr_to_string(&spec.cluster_ip),
        external_ips: spec.external_ips.clone().unwrap_or_default(),
        external_name: ptr_to_string(&spec.external_name),
        external_traffic_policy: ptr_to_string(&spec.external_traffic_policy),
        health_check_node_port: ptr_to_i32(spec.health_check_node_port),
        load_balancer_ip: ptr_to_string(&spec.load_balancer_ip),
        load_balancer_source_ranges: spec.load_balancer_source_ranges.clone().unwrap_or_default(),
        port: flatten_service_ports(spec.ports.as_deref().unwrap_or_default()),
        publish_not_ready_addresses: ptr_to_bool(spec.publish_not_ready_addresses),
        selector: spec.selector.clone().unwrap_or_default(),
        session_affinity: ptr_to_string(&spec.session_affinity),
        type_: ptr_to_string(&spec.type_),
    }
}

fn flatten_service_status(status: &ServiceStatus) -> Vec<ServiceStatusModel> {
    let ingress = status
        .load_balancer
        .iter()
        .flat_map(|lb| lb.ingress.iter().flatten())
        .map(|i| LoadBalancerIngressModel {
            hostname: ptr_to_string(&i.hostname),
            ip: ptr_to_string(&i.ip),
        })
        .collect();

    vec![ServiceStatusModel {
        load_balancer: vec![LoadBalancerStatusModel { ingress }],
    }]
}

fn has_load_balancer_ingress(svc: &Service) -> bool {
    svc.status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .is_some_and(|i| !i.is_empty())
}

fn patch_service_spec(old: &ServiceSpecModel, new: &ServiceSpecModel) -> Result<PatchOperations> {
    let mut ops = PatchOperations::new();
    let str_opt = |s: &String| non_empty(s);

    if old.selector != new.selector {
        ops.set_optional(
            "/spec/selector",
            non_empty_map(&old.selector).as_ref(),
            non_empty_map(&new.selector).as_ref(),
        )?;
    }
    if old.type_ != new.type_ {
        ops.replace("/spec/type", &new.type_)?;
    }
    if old.session_affinity != new.session_affinity {
        ops.replace("/spec/sessionAffinity", &new.session_affinity)?;
    }
    if old.load_balancer_ip != new.load_balancer_ip {
        ops.set_optional(
            "/spec/loadBalancerIP",
            str_opt(&old.load_balancer_ip).as_ref(),
            str_opt(&new.load_balancer_ip).as_ref(),
        )?;
    }
    if old.load_balancer_source_ranges != new.load_balancer_source_ranges {
        ops.set_optional(
            "/spec/loadBalancerSourceRanges",
            non_empty_vec(&old.load_balancer_source_ranges).as_ref(),
            non_empty_vec(&new.load_balancer_source_ranges).as_ref(),
        )?;
    }
    if old.port != new.port {
        ops.replace("/spec/ports", expand_service_ports(&new.port))?;
    }
    if old.external_ips != new.external_ips {
        ops.set_optional(
            "/spec/externalIPs",
            non_empty_vec(&old.external_ips).as_ref(),
            non_empty_vec(&new.external_ips).as_ref(),
        )?;
    }
    if old.external_name != new.external_name {
        ops.set_optional(
            "/spec/externalName",
            str_opt(&old.external_name).as_ref(),
            str_opt(&new.external_name).as_ref(),
        )?;
    }
    if old.external_traffic_policy != new.external_traffic_policy && !new.external_traffic_policy.is_empty() {
        ops.replace("/spec/externalTrafficPolicy", &new.external_traffic_policy)?;
    }
    if old.publish_not_ready_addresses != new.publish_not_ready_addresses {
        ops.replace("/spec/publishNotReadyAddresses", new.publish_not_ready_addresses)?;
    }
    Ok(ops)
}

#[async_trait]
impl Resource for ServiceResource {
    type Model = ServiceModel;

    const TYPE_NAME: &'static str = "kubernetes_service";

    fn schema(&self) -> Block {
        Block::new()
            .attr("metadata", metadata_schema(true))
            .attr(
                "spec",
                Attribute::single_block(service_spec_block())
                    .required()
                    .description("Spec defines the behavior of a service"),
            )
            .attr("status", Attribute::block_list(status_block()).computed())
            .attr(
                "wait_for_load_balancer",
                Attribute::bool()
                    .optional()
                    .default(true)
                    .description("Wait for the load balancer to have at least 1 endpoint before proceeding"),
            )
    }

    #[instrument(skip_all)]
    async fn create(&self, meta: &dyn KubeClientsets, data: &ResourceData<ServiceModel>) -> Result<String> {
        let namespace = namespace_or_default(meta, &data.planned.metadata);
        let mut metadata = expand_metadata(&data.planned.metadata);
        metadata.namespace = Some(namespace.clone());
        let svc = Service {
            metadata,
            spec: Some(expand_service_spec(&data.planned.spec)),
            ..Default::default()
        };

        info!("Creating new service: {:?}", svc.metadata.name);
        let api: Api<Service> = Api::namespaced(meta.main_clientset()?, &namespace);
        let out = api
            .create(&PostParams::default(), &svc)
            .await
            .map_err(|e| ProviderError::api("Failed to create service", e))?;
        let name = out.metadata.name.clone().unwrap_or_default();
        info!("Submitted new service: {}", name);

        if data.planned.spec.type_ == "LoadBalancer" && data.planned.wait_for_load_balancer {
            info!("Waiting for load balancer to assign IP/hostname");
            let waited = retry(data.timeouts.create, meta.poll_interval(), || async {
                let svc = api
                    .get(&name)
                    .await
                    .map_err(|e| ProviderError::api("Failed to read service", e))?;
                if has_load_balancer_ingress(&svc) {
                    Ok(())
                } else {
                    Err(RetryError::pending(format!(
                        "Waiting for service {:?} to assign IP/hostname for a load balancer",
                        name
                    )))
                }
            })
            .await;

            if let Err(e) = waited {
                let events =
                    object_warnings(&meta.main_clientset()?, Some(&namespace), "Service", &name).await;
                return Err(with_events(e, events));
            }
        }

        Ok(build_id(&out.metadata))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn read(&self, meta: &dyn KubeClientsets, data: &ResourceData<ServiceModel>) -> Result<Option<ServiceModel>> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Service> = Api::namespaced(meta.main_clientset()?, &namespace);

        Ok(get_object(&api, &name).await?.map(|svc| ServiceModel {
            metadata: flatten_metadata(&svc.metadata, &data.planned.metadata),
            spec: flatten_service_spec(&svc.spec.clone().unwrap_or_default()),
            status: flatten_service_status(&svc.status.clone().unwrap_or_default()),
            wait_for_load_balancer: data.planned.wait_for_load_balancer,
        }))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn update(&self, meta: &dyn KubeClientsets, data: &ResourceData<ServiceModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let prior = data.prior.clone().unwrap_or_default();

        let mut ops = patch_metadata("/metadata/", &prior.metadata, &data.planned.metadata)?;
        ops.extend(patch_service_spec(&prior.spec, &data.planned.spec)?);
        if ops.is_empty() {
            return Ok(());
        }

        info!("Updating service {:?}: {} operation(s)", name, ops.len());
        let api: Api<Service> = Api::namespaced(meta.main_clientset()?, &namespace);
        api.patch(&name, &PatchParams::default(), &ops.to_patch()?)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to update service {}", data.id), e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn delete(&self, meta: &dyn KubeClientsets, data: &ResourceData<ServiceModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Service> = Api::namespaced(meta.main_clientset()?, &namespace);
        delete_object(&api, &name, &DeleteParams::default()).await
    }

    async fn exists(&self, meta: &dyn KubeClientsets, data: &ResourceData<ServiceModel>) -> Result<bool> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Service> = Api::namespaced(meta.main_clientset()?, &namespace);
        object_exists(&api, &name).await
    }
}
