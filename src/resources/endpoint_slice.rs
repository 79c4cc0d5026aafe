// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{ProviderError, Result};
use crate::kubernetes::KubeClientsets;
use crate::resources::{
    delete_object, get_object, namespace_or_default, object_exists, Resource, ResourceData,
};
use crate::schema::{blocks, Attribute, Block, Validator};
use crate::structures::metadata::{
    expand_metadata, flatten_metadata, metadata_schema, patch_metadata, MetadataModel,
};
use crate::structures::{build_id, id_parts, non_empty, non_empty_vec, ptr_to_bool, ptr_to_string};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use k8s_openapi::api::discovery::v1::{Endpoint, EndpointConditions, EndpointPort, EndpointSlice};
use kube::api::{DeleteParams, PatchParams, PostParams};
use kube::Api;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EndpointSliceModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    pub address_type: String,
    pub endpoint: Vec<EndpointModel>,
    pub port: Vec<EndpointSlicePortModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EndpointModel {
    pub addresses: Vec<String>,
    #[serde(with = "blocks::optional")]
    pub condition: Option<EndpointConditionModel>,
    pub hostname: String,
    pub node_name: String,
    #[serde(with = "blocks::optional")]
    pub target_ref: Option<ObjectReferenceModel>,
    pub zone: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EndpointConditionModel {
    pub ready: bool,
    pub serving: bool,
    pub terminating: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ObjectReferenceModel {
    pub field_path: String,
    pub name: String,
    pub namespace: String,
    pub resource_version: String,
    pub uid: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EndpointSlicePortModel {
    pub app_protocol: String,
    pub name: String,
    pub port: i32,
    pub protocol: String,
}

pub struct EndpointSliceResource;

fn endpoint_block() -> Block {
    let condition = Block::new()
        .attr("ready", Attribute::bool().optional().description("Endpoint is ready to receive traffic"))
        .attr("serving", Attribute::bool().optional())
        .attr("terminating", Attribute::bool().optional());

    let target_ref = Block::new()
        .attr("field_path", Attribute::string().optional())
        .attr("name", Attribute::string().required())
        .attr("namespace", Attribute::string().optional())
        .attr("resource_version", Attribute::string().optional())
        .attr("uid", Attribute::string().optional());

    Block::new()
        .attr(
            "addresses",
            Attribute::string_list()
                .required()
                .min_items(1)
                .max_items(100)
                .description("Addresses of this endpoint, interpreted according to the slice's address type"),
        )
        .attr("condition", Attribute::single_block(condition).optional())
        .attr("hostname", Attribute::string().optional().validate(Validator::DnsLabel))
        .attr("node_name", Attribute::string().optional())
        .attr(
            "target_ref",
            Attribute::single_block(target_ref)
                .optional()
                .description("Reference to the object providing this endpoint"),
        )
        .attr("zone", Attribute::string().optional())
}

fn port_block() -> Block {
    Block::new()
        .attr("app_protocol", Attribute::string().optional())
        .attr("name", Attribute::string().optional())
        .attr(
            "port",
            Attribute::int().required().validate(Validator::PortNumber),
        )
        .attr(
            "protocol",
            Attribute::string()
                .optional()
                .default("TCP")
                .validate(Validator::OneOf(&["TCP", "UDP", "SCTP"])),
        )
}

fn expand_endpoints(endpoints: &[EndpointModel]) -> Vec<Endpoint> {
    endpoints
        .iter()
        .map(|e| Endpoint {
            addresses: e.addresses.clone(),
            conditions: e.condition.as_ref().map(|c| EndpointConditions {
                ready: Some(c.ready),
                serving: Some(c.serving),
                terminating: Some(c.terminating),
            }),
            hostname: non_empty(&e.hostname),
            node_name: non_empty(&e.node_name),
            target_ref: e.target_ref.as_ref().map(|r| ObjectReference {
                field_path: non_empty(&r.field_path),
                name: non_empty(&r.name),
                namespace: non_empty(&r.namespace),
                resource_version: non_empty(&r.resource_version),
                uid: non_empty(&r.uid),
                ..Default::default()
            }),
            zone: non_empty(&e.zone),
            ..Default::default()
        })
        .collect()
}

fn flatten_endpoints(endpoints: &[Endpoint]) -> Vec<EndpointModel> {
    endpoints
        .iter()
        .map(|e| EndpointModel {
            addresses: e.addresses.clone(),
            condition: e.conditions.as_ref().map(|c| EndpointConditionModel {
                ready: ptr_to_bool(c.ready),
                serving: ptr_to_bool(c.serving),
                terminating: ptr_to_bool(c.terminating),
            }),
            hostname: ptr_to_string(&e.hostname),
            node_name: ptr_to_string(&e.node_name),
            target_ref: e.target_ref.as_ref().map(|r| ObjectReferenceModel {
                field_path: ptr_to_string(&r.field_path),
                name: ptr_to_string(&r.name),
                namespace: ptr_to_string(&r.namespace),
                resource_version: ptr_to_string(&r.resource_version),
                uid: ptr_to_string(&r.uid),
            }),
            zone: ptr_to_string(&e.zone),
        })
        .collect()
}

fn expand_ports(ports: &[EndpointSlicePortModel]) -> Vec<EndpointPort> {
    ports
        .iter()
        .map(|p| EndpointPort {
            app_protocol: non_empty(&p.app_protocol),
            name: non_empty(&p.name),
            port: Some(p.port),
            protocol: non_empty(&p.protocol),
        })
        .collect()
}

fn flatten_ports(ports: &[EndpointPort]) -> Vec<EndpointSlicePortModel> {
    ports
        .iter()
        .map(|p| EndpointSlicePortModel {
            app_protocol: ptr_to_string(&p.app_protocol),
            name: ptr_to_string(&p.name),
            port: p.port.unwrap_or_default(),
            protocol: ptr_to_string(&p.protocol),
        })
        .collect()
}

#[async_trait]
impl Resource for EndpointSliceResource {
    type Model = EndpointSliceModel;

    const TYPE_NAME: &'static str = "kubernetes_endpoint_slice_v1";

    fn schema(&self) -> Block {
        Block::new()
            .attr("metadata", metadata_schema(true))
            .attr(
                "address_type",
                Attribute::string()
                    .required()
                    .force_new()
                    .validate(Validator::OneOf(&["IPv4", "IPv6", "FQDN"]))
                    .description("Type of address carried by this endpoint slice"),
            )
            .attr(
                "endpoint",
                Attribute::block_list(endpoint_block())
                    .required()
                    .max_items(1000)
                    .description("A list of unique endpoints in this slice"),
            )
            .attr(
                "port",
                Attribute::block_list(port_block())
                    .required()
                    .description("Network ports exposed by each endpoint in this slice"),
            )
    }

    #[instrument(skip_all)]
    async fn create(&self, meta: &dyn KubeClientsets, data: &ResourceData<EndpointSliceModel>) -> Result<String> {
        let namespace = namespace_or_default(meta, &data.planned.metadata);
        let mut metadata = expand_metadata(&data.planned.metadata);
        metadata.namespace = Some(namespace.clone());
        let slice = EndpointSlice {
            metadata,
            address_type: data.planned.address_type.clone(),
            endpoints: expand_endpoints(&data.planned.endpoint),
            ports: non_empty_vec(&expand_ports(&data.planned.port)),
        };

        info!("Creating new endpoint slice: {:?}", slice.metadata.name);
        let api: Api<EndpointSlice> = Api::namespaced(meta.main_clientset()?, &namespace);
        let out = api
            .create(&PostParams::default(), &slice)
            .await
            .map_err(|e| ProviderError::api("Failed to create endpoint slice", e))?;

        Ok(build_id(&out.metadata))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn read(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<EndpointSliceModel>,
    ) -> Result<Option<EndpointSliceModel>> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<EndpointSlice> = Api::namespaced(meta.main_clientset()?, &namespace);

        Ok(get_object(&api, &name).await?.map(|s| EndpointSliceModel {
            metadata: flatten_metadata(&s.metadata, &data.planned.metadata),
            address_type: s.address_type.clone(),
            endpoint: flatten_endpoints(&s.endpoints),
            port: flatten_ports(s.ports.as_deref().unwrap_or_default()),
        }))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn update(&self, meta: &dyn KubeClientsets, data: &ResourceData<EndpointSliceModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let prior = data.prior.clone().unwrap_or_default();

        let mut ops = patch_metadata("/metadata/", &prior.metadata, &data.planned.metadata)?;
        if prior.endpoint != data.planned.endpoint {
            ops.replace("/endpoints", expand_endpoints(&data.planned.endpoint))?;
        }
        if prior.port != data.planned.port {
            ops.replace("/ports", expand_ports(&data.planned.port))?;
        }
        if ops.is_empty() {
            return Ok(());
        }

        let api: Api<EndpointSlice> = Api::namespaced(meta.main_clientset()?, &namespace);
        api.patch(&name, &PatchParams::default(), &ops.to_patch()?)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to update endpoint slice {}", data.id), e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn delete(&self, meta: &dyn KubeClientsets, data: &ResourceData<EndpointSliceModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<EndpointSlice> = Api::namespaced(meta.main_clientset()?, &namespace);
        delete_object(&api, &name, &DeleteParams::default()).await
    }

    async fn exists(&self, meta: &dyn KubeClientsets, data: &ResourceData<EndpointSliceModel>) -> Result<bool> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<EndpointSlice> = Api::namespaced(meta.main_clientset()?, &namespace);
        object_exists(&api, &name).await
    }
}
