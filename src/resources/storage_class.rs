// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{ProviderError, Result};
use crate::kubernetes::KubeClientsets;
use crate::resources::{delete_object, get_object, object_exists, Resource, ResourceData};
use crate::schema::{blocks, Attribute, Block, Validator};
use crate::structures::metadata::{
    expand_metadata, flatten_metadata, metadata_schema, patch_metadata, MetadataModel,
};
use crate::structures::{non_empty, non_empty_map, non_empty_vec, ptr_to_bool, ptr_to_string};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{TopologySelectorLabelRequirement, TopologySelectorTerm};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{DeleteParams, PatchParams, PostParams};
use kube::Api;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct StorageClassModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    pub allow_volume_expansion: bool,
    #[serde(with = "blocks::optional")]
    pub allowed_topologies: Option<TopologyModel>,
    pub mount_options: Vec<String>,
    pub parameters: BTreeMap<String, String>,
    pub reclaim_policy: String,
    pub storage_provisioner: String,
    pub volume_binding_mode: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct TopologyModel {
    pub match_label_expressions: Vec<TopologyRequirementModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct TopologyRequirementModel {
    pub key: String,
    pub values: Vec<String>,
}

pub struct StorageClassResource;

fn expand_storage_class(m: &StorageClassModel) -> StorageClass {
    StorageClass {
        metadata: expand_metadata(&m.metadata),
        allow_volume_expansion: Some(m.allow_volume_expansion),
        allowed_topologies: m.allowed_topologies.as_ref().map(|t| {
            vec![TopologySelectorTerm {
                match_label_expressions: Some(
                    t.match_label_expressions
                        .iter()
                        .map(|r| TopologySelectorLabelRequirement {
                            key: r.key.clone(),
                            values: r.values.clone(),
                        })
                        .collect(),
                ),
            }]
        }),
        mount_options: non_empty_vec(&m.mount_options),
        parameters: non_empty_map(&m.parameters),
        provisioner: m.storage_provisioner.clone(),
        reclaim_policy: non_empty(&m.reclaim_policy),
        volume_binding_mode: non_empty(&m.volume_binding_mode),
    }
}

fn flatten_storage_class(sc: &StorageClass, configured: &StorageClassModel) -> StorageClassModel {
    let allowed_topologies = sc
        .allowed_topologies
        .as_ref()
        .filter(|terms| !terms.is_empty())
        .map(|terms| TopologyModel {
            match_label_expressions: terms
                .iter()
                .flat_map(|t| t.match_label_expressions.iter().flatten())
                .map(|r| TopologyRequirementModel {
                    key: r.key.clone(),
                    values: r.values.clone(),
                })
                .collect(),
        });

    StorageClassModel {
        metadata: flatten_metadata(&sc.metadata, &configured.metadata),
        allow_volume_expansion: ptr_to_bool(sc.allow_volume_expansion),
        allowed_topologies,
        mount_options: sc.mount_options.clone().unwrap_or_default(),
        parameters: sc.parameters.clone().unwrap_or_default(),
        reclaim_policy: ptr_to_string(&sc.reclaim_policy),
        storage_provisioner: sc.provisioner.clone(),
        volume_binding_mode: ptr_to_string(&sc.volume_binding_mode),
    }
}

#[async_trait]
impl Resource for StorageClassResource {
    type Model = StorageClassModel;

    const TYPE_NAME: &'static str = "kubernetes_storage_class";

    fn schema(&self) -> Block {
        let requirement = Block::new()
            .attr("key", Attribute::string().optional().force_new())
            .attr("values", Attribute::string_set().optional().force_new());

        Block::new()
            .attr("metadata", metadata_schema(false))
            .attr(
                "allow_volume_expansion",
                Attribute::bool()
                    .optional()
                    .default(true)
                    .description("Indicates whether the storage class allows volume expansion"),
            )
            .attr(
                "allowed_topologies",
                Attribute::single_block(Block::new().attr(
                    "match_label_expressions",
                    Attribute::block_list(requirement).optional().force_new(),
                ))
                .optional()
                .force_new()
                .description("Restrict the node topologies where volumes can be dynamically provisioned"),
            )
            .attr(
                "mount_options",
                Attribute::string_set()
                    .optional()
                    .force_new()
                    .description("Persistent volumes created by this storage class will have these mount options"),
            )
            .attr(
                "parameters",
                Attribute::string_map()
                    .optional()
                    .force_new()
                    .description("The parameters for the provisioner"),
            )
            .attr(
                "reclaim_policy",
                Attribute::string()
                    .optional()
                    .default("Delete")
                    .force_new()
                    .validate(Validator::OneOf(&["Delete", "Retain"])),
            )
            .attr(
                "storage_provisioner",
                Attribute::string()
                    .required()
                    .force_new()
                    .description("Indicates the type of the provisioner"),
            )
            .attr(
                "volume_binding_mode",
                Attribute::string()
                    .optional()
                    .default("Immediate")
                    .force_new()
                    .validate(Validator::OneOf(&["Immediate", "WaitForFirstConsumer"])),
            )
    }

    #[instrument(skip_all)]
    async fn create(&self, meta: &dyn KubeClientsets, data: &ResourceData<StorageClassModel>) -> Result<String> {
        let sc = expand_storage_class(&data.planned);

        info!("Creating new storage class: {:?}", sc.metadata.name);
        let api: Api<StorageClass> = Api::all(meta.main_clientset()?);
        let out = api
            .create(&PostParams::default(), &sc)
            .await
            .map_err(|e| ProviderError::api("Failed to create storage class", e))?;

        Ok(out.metadata.name.unwrap_or_default())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn read(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<StorageClassModel>,
    ) -> Result<Option<StorageClassModel>> {
        let api: Api<StorageClass> = Api::all(meta.main_clientset()?);
        Ok(get_object(&api, &data.id)
            .await?
            .map(|sc| flatten_storage_class(&sc, &data.planned)))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn update(&self, meta: &dyn KubeClientsets, data: &ResourceData<StorageClassModel>) -> Result<()> {
        let prior = data.prior.clone().unwrap_or_default();

        let mut ops = patch_metadata("/metadata/", &prior.metadata, &data.planned.metadata)?;
        if prior.allow_volume_expansion != data.planned.allow_volume_expansion {
            ops.replace("/allowVolumeExpansion", data.planned.allow_volume_expansion)?;
        }
        if ops.is_empty() {
            return Ok(());
        }

        let api: Api<StorageClass> = Api::all(meta.main_clientset()?);
        api.patch(&data.id, &PatchParams::default(), &ops.to_patch()?)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to update storage class {}", data.id), e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn delete(&self, meta: &dyn KubeClientsets, data: &ResourceData<StorageClassModel>) -> Result<()> {
        let api: Api<StorageClass> = Api::all(meta.main_clientset()?);
        delete_object(&api, &data.id, &DeleteParams::default()).await
    }

    async fn exists(&self, meta: &dyn KubeClientsets, data: &ResourceData<StorageClassModel>) -> Result<bool> {
        let api: Api<StorageClass> = Api::all(meta.main_clientset()?);
        object_exists(&api, &data.id).await
    }
}
