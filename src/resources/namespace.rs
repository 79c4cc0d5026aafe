// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{is_not_found, ProviderError, Result};
use crate::kubernetes::KubeClientsets;
use crate::resources::{delete_object, get_object, object_exists, Resource, ResourceData};
use crate::schema::{blocks, Attribute, Block};
use crate::structures::metadata::{
    expand_metadata, flatten_metadata, metadata_schema, patch_metadata, MetadataModel,
};
use crate::wait::{retry, wait_for_deletion, with_events, RetryError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, ServiceAccount};
use kube::api::{DeleteParams, PatchParams, PostParams};
use kube::Api;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct NamespaceModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    pub wait_for_default_service_account: bool,
}

pub struct NamespaceResource;

#[async_trait]
impl Resource for NamespaceResource {
    type Model = NamespaceModel;

    const TYPE_NAME: &'static str = "kubernetes_namespace";

    fn schema(&self) -> Block {
        Block::new().attr("metadata", metadata_schema(false)).attr(
            "wait_for_default_service_account",
            Attribute::bool()
                .optional()
                .default(false)
                .description("Wait for the default service account to be created in the namespace"),
        )
    }

    #[instrument(skip_all)]
    async fn create(&self, meta: &dyn KubeClientsets, data: &ResourceData<NamespaceModel>) -> Result<String> {
        let ns = Namespace {
            metadata: expand_metadata(&data.planned.metadata),
            ..Default::default()
        };

        info!("Creating new namespace: {:?}", ns.metadata.name);
        let api: Api<Namespace> = Api::all(meta.main_clientset()?);
        let out = api
            .create(&PostParams::default(), &ns)
            .await
            .map_err(|e| ProviderError::api("Failed to create namespace", e))?;
        let name = out.metadata.name.unwrap_or_default();
        info!("Submitted new namespace: {}", name);

        if data.planned.wait_for_default_service_account {
            wait_for_default_service_account(meta, &name, data).await?;
        }

        Ok(name)
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn read(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<NamespaceModel>,
    ) -> Result<Option<NamespaceModel>> {
        let api: Api<Namespace> = Api::all(meta.main_clientset()?);
        Ok(get_object(&api, &data.id).await?.map(|ns| NamespaceModel {
            metadata: flatten_metadata(&ns.metadata, &data.planned.metadata),
            wait_for_default_service_account: data.planned.wait_for_default_service_account,
        }))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn update(&self, meta: &dyn KubeClientsets, data: &ResourceData<NamespaceModel>) -> Result<()> {
        let prior = data.prior.clone().unwrap_or_default();
        let ops = patch_metadata("/metadata/", &prior.metadata, &data.planned.metadata)?;
        if ops.is_empty() {
            return Ok(());
        }

        let api: Api<Namespace> = Api::all(meta.main_clientset()?);
        api.patch(&data.id, &PatchParams::default(), &ops.to_patch()?)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to update namespace {}", data.id), e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn delete(&self, meta: &dyn KubeClientsets, data: &ResourceData<NamespaceModel>) -> Result<()> {
        let api: Api<Namespace> = Api::all(meta.main_clientset()?);
        delete_object(&api, &data.id, &DeleteParams::default()).await?;

        // Namespaces linger in Terminating until their content is gone
        wait_for_deletion(&api, &data.id, data.timeouts.delete, meta.delete_poll_interval()).await?;
        info!("Namespace {} deleted", data.id);
        Ok(())
    }

    async fn exists(&self, meta: &dyn KubeClientsets, data: &ResourceData<NamespaceModel>) -> Result<bool> {
        let api: Api<Namespace> = Api::all(meta.main_clientset()?);
        object_exists(&api, &data.id).await
    }
}

async fn wait_for_default_service_account(
    meta: &dyn KubeClientsets,
    namespace: &str,
    data: &ResourceData<NamespaceModel>,
) -> Result<()> {
    let accounts: Api<ServiceAccount> = Api::namespaced(meta.main_clientset()?, namespace);

    retry(data.timeouts.create, meta.poll_interval(), || async {
        match accounts.get("default").await {
            Ok(_) => Ok(()),
            Err(e) if is_not_found(&e) => {
                debug!("Default service account in {} not created yet", namespace);
                Err(RetryError::pending(format!(
                    "Waiting for default service account in namespace {}",
                    namespace
                )))
            }
            Err(e) => Err(ProviderError::api("Failed to read default service account", e).into()),
        }
    })
    .await
    .map_err(|e| with_events(e, Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{not_found_json, status_success_json, MockService};
    use serde_json::json;

    const PATH: &str = "/api/v1/namespaces/team-a";

    fn namespace_json() -> String {
        json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": "team-a", "uid": "u-1", "labels": {"kubernetes.io/metadata.name": "team-a"}},
            "status": {"phase": "Active"}
        })
        .to_string()
    }

    fn data(wait: bool) -> ResourceData<NamespaceModel> {
        ResourceData {
            planned: NamespaceModel {
                metadata: MetadataModel {
                    name: "team-a".to_string(),
                    ..Default::default()
                },
                wait_for_default_service_account: wait,
            },
            ..ResourceData::for_id("")
        }
    }

    #[tokio::test]
    async fn test_create_uses_name_as_id() {
        let mock = MockService::new().on_post("/api/v1/namespaces", 201, &namespace_json());
        let meta = mock.clone().into_meta();

        let id = NamespaceResource.create(&meta, &data(false)).await.unwrap();
        assert_eq!(id, "team-a");
        assert_eq!(mock.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_create_waits_for_default_service_account() {
        let sa = json!({"apiVersion": "v1", "kind": "ServiceAccount", "metadata": {"name": "default"}});
        let mock = MockService::new()
            .on_post("/api/v1/namespaces", 201, &namespace_json())
            .on_get(
                "/api/v1/namespaces/team-a/serviceaccounts/default",
                404,
                &not_found_json("serviceaccounts", "default"),
            )
            .on_get(
                "/api/v1/namespaces/team-a/serviceaccounts/default",
                200,
                &sa.to_string(),
            );
        let meta = mock.clone().into_meta();

        NamespaceResource.create(&meta, &data(true)).await.unwrap();
        assert_eq!(mock.requests_with_method("GET").len(), 2);
    }

    #[tokio::test]
    async fn test_read_drops_internal_labels() {
        let meta = MockService::new()
            .on_get(PATH, 200, &namespace_json())
            .into_meta();
        let mut d = data(false);
        d.id = "team-a".to_string();

        let model = NamespaceResource.read(&meta, &d).await.unwrap().unwrap();
        assert!(model.metadata.labels.is_empty());
        assert_eq!(model.metadata.uid, "u-1");
    }

    #[tokio::test]
    async fn test_delete_waits_until_gone() {
        let mock = MockService::new()
            .on_delete(PATH, 200, &status_success_json())
            .on_get(PATH, 200, &namespace_json())
            .on_get(PATH, 404, &not_found_json("namespaces", "team-a"));
        let meta = mock.clone().into_meta();

        NamespaceResource
            .delete(&meta, &ResourceData::for_id("team-a"))
            .await
            .unwrap();
        assert_eq!(mock.requests_with_method("GET").len(), 2);
    }
}
