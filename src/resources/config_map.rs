// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{ProviderError, Result};
use crate::kubernetes::KubeClientsets;
use crate::patch::{diff_string_map, PatchOperations};
use crate::resources::{
    delete_object, get_object, namespace_or_default, object_exists, Resource, ResourceData,
};
use crate::schema::{blocks, Attribute, Block};
use crate::structures::metadata::{
    expand_metadata, flatten_metadata, metadata_schema, patch_metadata, MetadataModel,
};
use crate::structures::{
    build_id, expand_base64_map, flatten_base64_map, id_parts, non_empty_map,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{DeleteParams, PatchParams, PostParams};
use kube::Api;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct ConfigMapModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    /// Base64 encoded values
    pub binary_data: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
    pub immutable: bool,
}

pub struct ConfigMapResource;

fn expand_config_map(m: &ConfigMapModel) -> Result<ConfigMap> {
    Ok(ConfigMap {
        metadata: expand_metadata(&m.metadata),
        binary_data: expand_base64_map(&m.binary_data)?,
        data: non_empty_map(&m.data),
        immutable: m.immutable.then_some(true),
    })
}

fn flatten_config_map(cm: &ConfigMap, configured: &ConfigMapModel) -> Result<ConfigMapModel> {
    Ok(ConfigMapModel {
        metadata: flatten_metadata(&cm.metadata, &configured.metadata),
        binary_data: flatten_base64_map(&cm.binary_data)?,
        data: cm.data.clone().unwrap_or_default(),
        immutable: cm.immutable.unwrap_or_default(),
    })
}

fn patch_config_map(old: &ConfigMapModel, new: &ConfigMapModel) -> Result<PatchOperations> {
    let mut ops = patch_metadata("/metadata/", &old.metadata, &new.metadata)?;
    if old.data != new.data {
        ops.extend(diff_string_map("/data", &old.data, &new.data)?);
    }
    if old.binary_data != new.binary_data {
        ops.extend(diff_string_map("/binaryData", &old.binary_data, &new.binary_data)?);
    }
    if old.immutable != new.immutable {
        ops.replace("/immutable", new.immutable)?;
    }
    Ok(ops)
}

#[async_trait]
impl Resource for ConfigMapResource {
    type Model = ConfigMapModel;

    const TYPE_NAME: &'static str = "kubernetes_config_map";

    fn schema(&self) -> Block {
        Block::new()
            .attr("metadata", metadata_schema(true))
            .attr(
                "binary_data",
                Attribute::string_map()
                    .optional()
                    .description("Binary data with base64 encoded values"),
            )
            .attr(
                "data",
                Attribute::string_map()
                    .optional()
                    .description("Configuration data for pods to consume"),
            )
            .attr(
                "immutable",
                Attribute::bool()
                    .optional()
                    .description("Ensures the data stored in the config map cannot be updated"),
            )
    }

    #[instrument(skip_all)]
    async fn create(&self, meta: &dyn KubeClientsets, data: &ResourceData<ConfigMapModel>) -> Result<String> {
        let namespace = namespace_or_default(meta, &data.planned.metadata);
        let mut cm = expand_config_map(&data.planned)?;
        cm.metadata.namespace = Some(namespace.clone());

        info!("Creating new config map: {:?}", cm.metadata.name);
        let api: Api<ConfigMap> = Api::namespaced(meta.main_clientset()?, &namespace);
        let out = api
            .create(&PostParams::default(), &cm)
            .await
            .map_err(|e| ProviderError::api("Failed to create config map", e))?;

        Ok(build_id(&out.metadata))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn read(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<ConfigMapModel>,
    ) -> Result<Option<ConfigMapModel>> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<ConfigMap> = Api::namespaced(meta.main_clientset()?, &namespace);

        get_object(&api, &name)
            .await?
            .map(|cm| flatten_config_map(&cm, &data.planned))
            .transpose()
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn update(&self, meta: &dyn KubeClientsets, data: &ResourceData<ConfigMapModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let prior = data.prior.clone().unwrap_or_default();
        let ops = patch_config_map(&prior, &data.planned)?;
        if ops.is_empty() {
            return Ok(());
        }

        info!("Updating config map {:?}: {} operation(s)", name, ops.len());
        let api: Api<ConfigMap> = Api::namespaced(meta.main_clientset()?, &namespace);
        api.patch(&name, &PatchParams::default(), &ops.to_patch()?)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to update config map {}", data.id), e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn delete(&self, meta: &dyn KubeClientsets, data: &ResourceData<ConfigMapModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<ConfigMap> = Api::namespaced(meta.main_clientset()?, &namespace);
        delete_object(&api, &name, &DeleteParams::default()).await
    }

    async fn exists(&self, meta: &dyn KubeClientsets, data: &ResourceData<ConfigMapModel>) -> Result<bool> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<ConfigMap> = Api::namespaced(meta.main_clientset()?, &namespace);
        object_exists(&api, &name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Handler, Operation, ResourceHandler};
    use crate::test_utils::{status_success_json, MockService};
    use serde_json::json;

    const PATH: &str = "/api/v1/namespaces/default/configmaps";

    fn config_map_json() -> String {
        json!({
            "apiVersion": "v1",
            "kind": "ConfigMap",
            "metadata": {
                "name": "settings",
                "namespace": "default",
                "uid": "7f1c",
                "resourceVersion": "12",
                "annotations": {"kubectl.kubernetes.io/last-applied-configuration": "{}"}
            },
            "data": {"mode": "fast"},
            "binaryData": {"blob": "aGVsbG8="}
        })
        .to_string()
    }

    fn model() -> ConfigMapModel {
        ConfigMapModel {
            metadata: MetadataModel {
                name: "settings".to_string(),
                ..Default::default()
            },
            data: BTreeMap::from([("mode".to_string(), "fast".to_string())]),
            ..Default::default()
        }
    }

    #[test]
    fn test_patch_config_map_single_change() {
        let old = model();
        let mut new = model();
        new.data.insert("mode".to_string(), "slow".to_string());

        let ops = patch_config_map(&old, &new).unwrap();
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([{"op": "replace", "path": "/data/mode", "value": "slow"}])
        );
        assert!(patch_config_map(&old, &old).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let mock = MockService::new()
            .on_post(PATH, 201, &config_map_json())
            .on_get(&format!("{}/settings", PATH), 200, &config_map_json());
        let meta = mock.clone().into_meta();

        let state = Handler(ConfigMapResource)
            .create(
                &meta,
                Operation {
                    config: Some(json!({
                        "metadata": [{"name": "settings"}],
                        "data": {"mode": "fast"},
                        "binary_data": {"blob": "aGVsbG8="}
                    })),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(state.id, "default/settings");
        let state = state.state.unwrap();
        assert_eq!(state["metadata"][0]["uid"], "7f1c");
        assert_eq!(state["metadata"][0]["annotations"], json!({}));
        assert_eq!(state["binary_data"]["blob"], "aGVsbG8=");

        let posted = &mock.requests_with_method("POST")[0];
        assert_eq!(posted.json()["metadata"]["namespace"], "default");
        assert_eq!(posted.json()["binaryData"]["blob"], "aGVsbG8=");
    }

    #[tokio::test]
    async fn test_update_sends_json_patch() {
        let mock = MockService::new()
            .on_patch(&format!("{}/settings", PATH), 200, &config_map_json())
            .on_get(&format!("{}/settings", PATH), 200, &config_map_json());
        let meta = mock.clone().into_meta();

        let prior = serde_json::to_value(model()).unwrap();
        Handler(ConfigMapResource)
            .update(
                &meta,
                Operation {
                    id: "default/settings".to_string(),
                    prior_state: Some(prior),
                    config: Some(json!({
                        "metadata": [{"name": "settings", "labels": {"app": "web"}}],
                        "data": {"mode": "fast"}
                    })),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let patch = &mock.requests_with_method("PATCH")[0];
        assert_eq!(
            patch.content_type.as_deref(),
            Some("application/json-patch+json")
        );
        assert_eq!(
            patch.json(),
            json!([{"op": "add", "path": "/metadata/labels", "value": {"app": "web"}}])
        );
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let mock = MockService::new()
            .on_delete(&format!("{}/settings", PATH), 200, &status_success_json())
            .on_get(&format!("{}/settings", PATH), 200, &config_map_json());
        let meta = mock.into_meta();
        let data = ResourceData::for_id("default/settings");

        ConfigMapResource.delete(&meta, &data).await.unwrap();
        assert!(ConfigMapResource.exists(&meta, &data).await.unwrap());
        assert!(!ConfigMapResource
            .exists(&meta, &ResourceData::for_id("default/other"))
            .await
            .unwrap());
    }
}
