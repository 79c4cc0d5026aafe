// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{ProviderError, Result};
use crate::kubernetes::{object_warnings, KubeClientsets};
use crate::resources::{
    delete_object, get_object, namespace_or_default, object_exists, Resource, ResourceData,
};
use crate::schema::{blocks, Attribute, Block};
use crate::structures::metadata::{
    expand_metadata, flatten_metadata, metadata_schema, patch_metadata, MetadataModel,
};
use crate::structures::persistent_volume_claim::{
    expand_persistent_volume_claim_spec, flatten_persistent_volume_claim_spec,
    persistent_volume_claim_spec_block, PersistentVolumeClaimSpecModel,
};
use crate::structures::{build_id, expand_quantities, id_parts};
use crate::wait::{retry, wait_for_deletion, with_events, RetryError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::{DeleteParams, PatchParams, PostParams};
use kube::{Api, Client};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct PersistentVolumeClaimModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    #[serde(with = "blocks::single")]
    pub spec: PersistentVolumeClaimSpecModel,
    pub wait_until_bound: bool,
}

pub struct PersistentVolumeClaimResource;

fn claim_phase(claim: &PersistentVolumeClaim) -> &str {
    claim
        .status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or_default()
}

/// Warnings for the claim, falling back to those of its volume
async fn claim_warnings(client: &Client, namespace: &str, name: &str, volume_name: Option<&str>) -> Vec<String> {
    let events = object_warnings(client, Some(namespace), "PersistentVolumeClaim", name).await;
    match volume_name {
        Some(volume) if events.is_empty() && !volume.is_empty() => {
            object_warnings(client, None, "PersistentVolume", volume).await
        }
        _ => events,
    }
}

#[async_trait]
impl Resource for PersistentVolumeClaimResource {
    type Model = PersistentVolumeClaimModel;

    const TYPE_NAME: &'static str = "kubernetes_persistent_volume_claim";

    fn schema(&self) -> Block {
        Block::new()
            .attr("metadata", metadata_schema(true))
            .attr(
                "spec",
                Attribute::single_block(persistent_volume_claim_spec_block())
                    .required()
                    .description("Spec defines the desired characteristics of a volume requested by a pod author"),
            )
            .attr(
                "wait_until_bound",
                Attribute::bool()
                    .optional()
                    .default(true)
                    .description("Whether to wait for the claim to reach `Bound` state (to find volume in which to claim the space)"),
            )
    }

    #[instrument(skip_all)]
    async fn create(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<PersistentVolumeClaimModel>,
    ) -> Result<String> {
        let namespace = namespace_or_default(meta, &data.planned.metadata);
        let mut metadata = expand_metadata(&data.planned.metadata);
        metadata.namespace = Some(namespace.clone());
        let claim = PersistentVolumeClaim {
            metadata,
            spec: Some(expand_persistent_volume_claim_spec(&data.planned.spec)),
            ..Default::default()
        };

        info!("Creating new persistent volume claim: {:?}", claim.metadata.name);
        let client = meta.main_clientset()?;
        let api: Api<PersistentVolumeClaim> = Api::namespaced(client.clone(), &namespace);
        let out = api
            .create(&PostParams::default(), &claim)
            .await
            .map_err(|e| ProviderError::api("Failed to create persistent volume claim", e))?;
        let name = out.metadata.name.clone().unwrap_or_default();
        info!("Submitted new persistent volume claim: {}", name);

        if data.planned.wait_until_bound {
            let waited = retry(data.timeouts.create, meta.poll_interval(), || async {
                let claim = api
                    .get(&name)
                    .await
                    .map_err(|e| ProviderError::api("Failed to read persistent volume claim", e))?;

                match claim_phase(&claim) {
                    "Bound" => Ok(()),
                    phase => Err(RetryError::pending(format!(
                        "Persistent volume claim {} is not bound yet (phase {:?})",
                        name, phase
                    ))),
                }
            })
            .await;

            if let Err(e) = waited {
                let volume_name = api
                    .get(&name)
                    .await
                    .ok()
                    .and_then(|c| c.spec)
                    .and_then(|s| s.volume_name);
                let events = claim_warnings(&client, &namespace, &name, volume_name.as_deref()).await;
                return Err(with_events(e, events));
            }
            info!("Persistent volume claim {} is bound", name);
        }

        Ok(build_id(&out.metadata))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn read(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<PersistentVolumeClaimModel>,
    ) -> Result<Option<PersistentVolumeClaimModel>> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<PersistentVolumeClaim> = Api::namespaced(meta.main_clientset()?, &namespace);

        Ok(get_object(&api, &name).await?.map(|claim| PersistentVolumeClaimModel {
            metadata: flatten_metadata(&claim.metadata, &data.planned.metadata),
            spec: flatten_persistent_volume_claim_spec(&claim.spec.unwrap_or_default()),
            wait_until_bound: data.planned.wait_until_bound,
        }))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn update(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<PersistentVolumeClaimModel>,
    ) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let prior = data.prior.clone().unwrap_or_default();

        let mut ops = patch_metadata("/metadata/", &prior.metadata, &data.planned.metadata)?;
        let requests = &data.planned.spec.resources.requests;
        if prior.spec.resources.requests != *requests {
            ops.replace("/spec/resources/requests", expand_quantities(requests))?;
        }
        if ops.is_empty() {
            return Ok(());
        }

        let api: Api<PersistentVolumeClaim> = Api::namespaced(meta.main_clientset()?, &namespace);
        api.patch(&name, &PatchParams::default(), &ops.to_patch()?)
            .await
            .map_err(|e| {
                ProviderError::api(format!("Failed to update persistent volume claim {}", data.id), e)
            })?;
        Ok(())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn delete(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<PersistentVolumeClaimModel>,
    ) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<PersistentVolumeClaim> = Api::namespaced(meta.main_clientset()?, &namespace);
        delete_object(&api, &name, &DeleteParams::default()).await?;

        wait_for_deletion(&api, &name, data.timeouts.delete, meta.delete_poll_interval()).await
    }

    async fn exists(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<PersistentVolumeClaimModel>,
    ) -> Result<bool> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<PersistentVolumeClaim> = Api::namespaced(meta.main_clientset()?, &namespace);
        object_exists(&api, &name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::persistent_volume_claim::VolumeResourcesModel;
    use crate::test_utils::{event_list_json, MockService};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;

    const PATH: &str = "/api/v1/namespaces/default/persistentvolumeclaims";

    fn claim_json(phase: &str) -> String {
        json!({
            "apiVersion": "v1",
            "kind": "PersistentVolumeClaim",
            "metadata": {"name": "data", "namespace": "default"},
            "spec": {
                "accessModes": ["ReadWriteOnce"],
                "resources": {"requests": {"storage": "5Gi"}},
                "volumeName": "pv-123"
            },
            "status": {"phase": phase}
        })
        .to_string()
    }

    fn data() -> ResourceData<PersistentVolumeClaimModel> {
        ResourceData {
            planned: PersistentVolumeClaimModel {
                metadata: MetadataModel {
                    name: "data".to_string(),
                    ..Default::default()
                },
                spec: PersistentVolumeClaimSpecModel {
                    access_modes: vec!["ReadWriteOnce".to_string()],
                    resources: VolumeResourcesModel {
                        requests: BTreeMap::from([("storage".to_string(), "5Gi".to_string())]),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                wait_until_bound: true,
            },
            ..ResourceData::for_id("")
        }
    }

    #[tokio::test]
    async fn test_create_waits_until_bound() {
        let mock = MockService::new()
            .on_post(PATH, 201, &claim_json("Pending"))
            .on_get(&format!("{}/data", PATH), 200, &claim_json("Pending"))
            .on_get(&format!("{}/data", PATH), 200, &claim_json("Bound"));
        let meta = mock.clone().into_meta();

        let id = PersistentVolumeClaimResource.create(&meta, &data()).await.unwrap();
        assert_eq!(id, "default/data");
        assert_eq!(mock.requests_with_method("GET").len(), 2);
    }

    #[tokio::test]
    async fn test_bind_timeout_falls_back_to_volume_events() {
        let mock = MockService::new()
            .on_post(PATH, 201, &claim_json("Pending"))
            .on_get(&format!("{}/data", PATH), 200, &claim_json("Pending"))
            .on_get("/api/v1/namespaces/default/events", 200, &event_list_json(&[]))
            .on_get(
                "/api/v1/events",
                200,
                &event_list_json(&[("VolumeFailedMount", "disk unavailable", "2026-01-01T10:00:00Z")]),
            );
        let meta = mock.into_meta();
        let mut d = data();
        d.timeouts.create = Duration::from_millis(50);

        let err = PersistentVolumeClaimResource.create(&meta, &d).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("is not bound yet"));
        assert!(msg.contains("VolumeFailedMount: disk unavailable"));
    }

    #[tokio::test]
    async fn test_update_replaces_storage_request() {
        let mock = MockService::new().on_patch(&format!("{}/data", PATH), 200, &claim_json("Bound"));
        let meta = mock.clone().into_meta();

        let mut d = data();
        d.id = "default/data".to_string();
        d.prior = Some(d.planned.clone());
        d.planned
            .spec
            .resources
            .requests
            .insert("storage".to_string(), "10Gi".to_string());

        PersistentVolumeClaimResource.update(&meta, &d).await.unwrap();
        assert_eq!(
            mock.requests_with_method("PATCH")[0].json(),
            json!([{"op": "replace", "path": "/spec/resources/requests", "value": {"storage": "10Gi"}}])
        );
    }
}
