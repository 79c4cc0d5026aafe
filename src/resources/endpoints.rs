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
use crate::structures::{build_id, id_parts, non_empty, non_empty_vec, ptr_to_string};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{EndpointAddress, EndpointPort, EndpointSubset, Endpoints};
use kube::api::{DeleteParams, PatchParams, PostParams};
use kube::Api;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EndpointsModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    pub subset: Vec<EndpointSubsetModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EndpointSubsetModel {
    pub address: Vec<EndpointAddressModel>,
    pub not_ready_address: Vec<EndpointAddressModel>,
    pub port: Vec<EndpointPortModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EndpointAddressModel {
    pub hostname: String,
    pub ip: String,
    pub node_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EndpointPortModel {
    pub name: String,
    pub port: i32,
    pub protocol: String,
}

pub struct EndpointsResource;

fn address_block() -> Block {
    Block::new()
        .attr(
            "hostname",
            Attribute::string()
                .optional()
                .description("The Hostname of this endpoint"),
        )
        .attr(
            "ip",
            Attribute::string()
                .required()
                .validate(Validator::IpAddress)
                .description("The IP of this endpoint"),
        )
        .attr(
            "node_name",
            Attribute::string()
                .optional()
                .description("Node hosting this endpoint"),
        )
}

fn subset_block() -> Block {
    let port = Block::new()
        .attr("name", Attribute::string().optional().validate(Validator::DnsLabel))
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
        );

    Block::new()
        .attr(
            "address",
            Attribute::block_list(address_block())
                .optional()
                .description("IP addresses which offer the related ports and are ready to accept traffic"),
        )
        .attr(
            "not_ready_address",
            Attribute::block_list(address_block())
                .optional()
                .description("IP addresses which offer the related ports but are not currently marked as ready"),
        )
        .attr(
            "port",
            Attribute::block_list(port)
                .optional()
                .description("Port numbers available on the related IP addresses"),
        )
}

pub fn expand_endpoint_addresses(addresses: &[EndpointAddressModel]) -> Vec<EndpointAddress> {
    addresses
        .iter()
        .map(|a| EndpointAddress {
            hostname: non_empty(&a.hostname),
            ip: a.ip.clone(),
            node_name: non_empty(&a.node_name),
            ..Default::default()
        })
        .collect()
}

pub fn flatten_endpoint_addresses(addresses: &[EndpointAddress]) -> Vec<EndpointAddressModel> {
    addresses
        .iter()
        .map(|a| EndpointAddressModel {
            hostname: ptr_to_string(&a.hostname),
            ip: a.ip.clone(),
            node_name: ptr_to_string(&a.node_name),
        })
        .collect()
}

fn expand_endpoint_ports(ports: &[EndpointPortModel]) -> Vec<EndpointPort> {
    ports
        .iter()
        .map(|p| EndpointPort {
            name: non_empty(&p.name),
            port: p.port,
            protocol: non_empty(&p.protocol),
            ..Default::default()
        })
        .collect()
}

fn flatten_endpoint_ports(ports: &[EndpointPort]) -> Vec<EndpointPortModel> {
    ports
        .iter()
        .map(|p| EndpointPortModel {
            name: ptr_to_string(&p.name),
            port: p.port,
            protocol: ptr_to_string(&p.protocol),
        })
        .collect()
}

fn expand_subsets(subsets: &[EndpointSubsetModel]) -> Vec<EndpointSubset> {
    subsets
        .iter()
        .map(|s| EndpointSubset {
            addresses: non_empty_vec(&expand_endpoint_addresses(&s.address)),
            not_ready_addresses: non_empty_vec(&expand_endpoint_addresses(&s.not_ready_address)),
            ports: non_empty_vec(&expand_endpoint_ports(&s.port)),
        })
        .collect()
}

fn flatten_subsets(subsets: &[EndpointSubset]) -> Vec<EndpointSubsetModel> {
    subsets
        .iter()
        .map(|s| EndpointSubsetModel {
            address: flatten_endpoint_addresses(s.addresses.as_deref().unwrap_or_default()),
            not_ready_address: flatten_endpoint_addresses(
                s.not_ready_addresses.as_deref().unwrap_or_default(),
            ),
            port: flatten_endpoint_ports(s.ports.as_deref().unwrap_or_default()),
        })
        .collect()
}

#[async_trait]
impl Resource for EndpointsResource {
    type Model = EndpointsModel;

    const TYPE_NAME: &'static str = "kubernetes_endpoints";

    fn schema(&self) -> Block {
        Block::new().attr("metadata", metadata_schema(true)).attr(
            "subset",
            Attribute::block_list(subset_block())
                .optional()
                .description("Sets of addresses and ports that comprise a service"),
        )
    }

    #[instrument(skip_all)]
    async fn create(&self, meta: &dyn KubeClientsets, data: &ResourceData<EndpointsModel>) -> Result<String> {
        let namespace = namespace_or_default(meta, &data.planned.metadata);
        let mut metadata = expand_metadata(&data.planned.metadata);
        metadata.namespace = Some(namespace.clone());
        let endpoints = Endpoints {
            metadata,
            subsets: non_empty_vec(&expand_subsets(&data.planned.subset)),
        };

        info!("Creating new endpoints: {:?}", endpoints.metadata.name);
        let api: Api<Endpoints> = Api::namespaced(meta.main_clientset()?, &namespace);
        let out = api
            .create(&PostParams::default(), &endpoints)
            .await
            .map_err(|e| ProviderError::api("Failed to create endpoints", e))?;

        Ok(build_id(&out.metadata))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn read(&self, meta: &dyn KubeClientsets, data: &ResourceData<EndpointsModel>) -> Result<Option<EndpointsModel>> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Endpoints> = Api::namespaced(meta.main_clientset()?, &namespace);

        Ok(get_object(&api, &name).await?.map(|ep| EndpointsModel {
            metadata: flatten_metadata(&ep.metadata, &data.planned.metadata),
            subset: flatten_subsets(ep.subsets.as_deref().unwrap_or_default()),
        }))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn update(&self, meta: &dyn KubeClientsets, data: &ResourceData<EndpointsModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let prior = data.prior.clone().unwrap_or_default();

        let mut ops = patch_metadata("/metadata/", &prior.metadata, &data.planned.metadata)?;
        if prior.subset != data.planned.subset {
            ops.replace("/subsets", expand_subsets(&data.planned.subset))?;
        }
        if ops.is_empty() {
            return Ok(());
        }

        let api: Api<Endpoints> = Api::namespaced(meta.main_clientset()?, &namespace);
        api.patch(&name, &PatchParams::default(), &ops.to_patch()?)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to update endpoints {}", data.id), e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn delete(&self, meta: &dyn KubeClientsets, data: &ResourceData<EndpointsModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Endpoints> = Api::namespaced(meta.main_clientset()?, &namespace);
        delete_object(&api, &name, &DeleteParams::default()).await
    }

    async fn exists(&self, meta: &dyn KubeClientsets, data: &ResourceData<EndpointsModel>) -> Result<bool> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Endpoints> = Api::namespaced(meta.main_clientset()?, &namespace);
        object_exists(&api, &name).await
    }
}
