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
use crate::structures::pod_spec::{expand_pod_spec, flatten_pod_spec, pod_spec_block, PodSpecModel};
use crate::structures::{build_id, id_parts, non_zero_i64};
use crate::wait::{retry, wait_for_deletion, with_events, RetryError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, PatchParams, PostParams};
use kube::Api;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PodModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    #[serde(with = "blocks::single")]
    pub spec: PodSpecModel,
    pub target_state: String,
}

impl Default for PodModel {
    fn default() -> Self {
        PodModel {
            metadata: MetadataModel::default(),
            spec: PodSpecModel::default(),
            target_state: "Running".to_string(),
        }
    }
}

pub struct PodResource;

fn pod_phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or_default()
}

/// Pending phases keep the wait going, any other phase than the target ends it
fn phase_status(pod: &Pod, target: &str) -> std::result::Result<(), RetryError> {
    let name = pod.metadata.name.as_deref().unwrap_or_default();
    match pod_phase(pod) {
        phase if phase == target => Ok(()),
        "" | "Pending" => Err(RetryError::pending(format!(
            "Pod {} is in phase \"Pending\", waiting for {:?}",
            name, target
        ))),
        "Running" if target == "Succeeded" => Err(RetryError::pending(format!(
            "Pod {} is in phase \"Running\", waiting for {:?}",
            name, target
        ))),
        phase => Err(RetryError::NonRetryable(ProviderError::Wait(format!(
            "Pod {} is in phase {:?}, expected {:?}",
            name, phase, target
        )))),
    }
}

/// Only the deadline and container images of a running pod can change
fn patch_pod_spec(old: &PodSpecModel, new: &PodSpecModel) -> Result<PatchOperations> {
    let mut ops = PatchOperations::new();

    let old_deadline = non_zero_i64(old.active_deadline_seconds);
    let new_deadline = non_zero_i64(new.active_deadline_seconds);
    if old_deadline != new_deadline {
        ops.set_optional(
            "/spec/activeDeadlineSeconds",
            old_deadline.as_ref(),
            new_deadline.as_ref(),
        )?;
    }

    for (i, container) in new.container.iter().enumerate() {
        let changed = old
            .container
            .get(i)
            .map_or(true, |c| c.image != container.image);
        if changed && !container.image.is_empty() {
            ops.replace(format!("/spec/containers/{}/image", i), &container.image)?;
        }
    }

    Ok(ops)
}

#[async_trait]
impl Resource for PodResource {
    type Model = PodModel;

    const TYPE_NAME: &'static str = "kubernetes_pod";

    fn schema(&self) -> Block {
        Block::new()
            .attr("metadata", metadata_schema(true))
            .attr(
                "spec",
                Attribute::single_block(pod_spec_block(false))
                    .required()
                    .description("Specification of the desired behavior of the pod"),
            )
            .attr(
                "target_state",
                Attribute::string()
                    .optional()
                    .default("Running")
                    .validate(Validator::OneOf(&["Pending", "Running", "Succeeded", "Failed", "Unknown"]))
                    .description("Pod phase to wait for after creation"),
            )
    }

    #[instrument(skip_all)]
    async fn create(&self, meta: &dyn KubeClientsets, data: &ResourceData<PodModel>) -> Result<String> {
        let namespace = namespace_or_default(meta, &data.planned.metadata);
        let mut metadata = expand_metadata(&data.planned.metadata);
        metadata.namespace = Some(namespace.clone());
        let pod = Pod {
            metadata,
            spec: Some(expand_pod_spec(&data.planned.spec)),
            ..Default::default()
        };

        info!("Creating new pod: {:?}", pod.metadata.name);
        let api: Api<Pod> = Api::namespaced(meta.main_clientset()?, &namespace);
        let out = api
            .create(&PostParams::default(), &pod)
            .await
            .map_err(|e| ProviderError::api("Failed to create pod", e))?;
        let name = out.metadata.name.clone().unwrap_or_default();
        info!("Submitted new pod: {}", name);

        let target = data.planned.target_state.as_str();
        let waited = retry(data.timeouts.create, meta.poll_interval(), || async {
            let pod = api
                .get(&name)
                .await
                .map_err(|e| ProviderError::api("Failed to read pod", e))?;

            phase_status(&pod, target)
        })
        .await;

        if let Err(e) = waited {
            let events = object_warnings(&meta.main_clientset()?, Some(&namespace), "Pod", &name).await;
            return Err(with_events(e, events));
        }
        info!("Pod {} reached phase {}", name, target);

        Ok(build_id(&out.metadata))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn read(&self, meta: &dyn KubeClientsets, data: &ResourceData<PodModel>) -> Result<Option<PodModel>> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Pod> = Api::namespaced(meta.main_clientset()?, &namespace);

        Ok(get_object(&api, &name).await?.map(|pod| PodModel {
            metadata: flatten_metadata(&pod.metadata, &data.planned.metadata),
            spec: pod
                .spec
                .as_ref()
                .map(|s| flatten_pod_spec(s, &data.planned.spec))
                .unwrap_or_default(),
            target_state: data.planned.target_state.clone(),
        }))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn update(&self, meta: &dyn KubeClientsets, data: &ResourceData<PodModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let prior = data.prior.clone().unwrap_or_default();

        let mut ops = patch_metadata("/metadata/", &prior.metadata, &data.planned.metadata)?;
        ops.extend(patch_pod_spec(&prior.spec, &data.planned.spec)?);
        if ops.is_empty() {
            return Ok(());
        }

        let api: Api<Pod> = Api::namespaced(meta.main_clientset()?, &namespace);
        api.patch(&name, &PatchParams::default(), &ops.to_patch()?)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to update pod {}", data.id), e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn delete(&self, meta: &dyn KubeClientsets, data: &ResourceData<PodModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Pod> = Api::namespaced(meta.main_clientset()?, &namespace);
        delete_object(&api, &name, &DeleteParams::default()).await?;

        wait_for_deletion(&api, &name, data.timeouts.delete, meta.delete_poll_interval()).await
    }

    async fn exists(&self, meta: &dyn KubeClientsets, data: &ResourceData<PodModel>) -> Result<bool> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Pod> = Api::namespaced(meta.main_clientset()?, &namespace);
        object_exists(&api, &name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structures::pod_spec::tests::nginx_spec;
    use crate::test_utils::{event_list_json, not_found_json, status_success_json, MockService};
    use serde_json::json;
    use std::time::Duration;

    const PATH: &str = "/api/v1/namespaces/default/pods";

    fn pod_json(phase: &str) -> String {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {"name": "web", "namespace": "default", "uid": "p-1"},
            "spec": {
                "containers": [{"name": "nginx", "image": "nginx:1.27"}],
                "restartPolicy": "Always",
                "dnsPolicy": "ClusterFirst",
                "terminationGracePeriodSeconds": 30
            },
            "status": {"phase": phase}
        })
        .to_string()
    }

    fn data() -> ResourceData<PodModel> {
        ResourceData {
            planned: PodModel {
                metadata: MetadataModel {
                    name: "web".to_string(),
                    ..Default::default()
                },
                spec: nginx_spec(),
                ..Default::default()
            },
            ..ResourceData::for_id("")
        }
    }

    #[test]
    fn test_patch_only_changed_image() {
        let old = nginx_spec();
        let mut new = old.clone();
        new.container[0].image = "nginx:1.28".to_string();

        let ops = patch_pod_spec(&old, &new).unwrap();
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([{"op": "replace", "path": "/spec/containers/0/image", "value": "nginx:1.28"}])
        );
        assert!(patch_pod_spec(&old, &old).unwrap().is_empty());
    }

    #[test]
    fn test_patch_active_deadline() {
        let old = nginx_spec();
        let mut new = old.clone();
        new.active_deadline_seconds = 600;

        let ops = patch_pod_spec(&old, &new).unwrap();
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([{"op": "add", "path": "/spec/activeDeadlineSeconds", "value": 600}])
        );
    }

    #[tokio::test]
    async fn test_create_waits_for_running() {
        let mock = MockService::new()
            .on_post(PATH, 201, &pod_json("Pending"))
            .on_get(&format!("{}/web", PATH), 200, &pod_json("Pending"))
            .on_get(&format!("{}/web", PATH), 200, &pod_json("Running"));
        let meta = mock.clone().into_meta();

        let id = PodResource.create(&meta, &data()).await.unwrap();
        assert_eq!(id, "default/web");
        assert_eq!(mock.requests_with_method("GET").len(), 2);

        let body = mock.requests_with_method("POST")[0].json();
        assert_eq!(body["spec"]["containers"][0]["image"], "nginx:1.27");
    }

    #[tokio::test]
    async fn test_create_timeout_reports_events() {
        let meta = MockService::new()
            .on_post(PATH, 201, &pod_json("Pending"))
            .on_get(&format!("{}/web", PATH), 200, &pod_json("Pending"))
            .on_get(
                "/api/v1/namespaces/default/events",
                200,
                &event_list_json(&[("FailedScheduling", "0/3 nodes are available", "2026-01-01T10:00:00Z")]),
            )
            .into_meta();
        let mut d = data();
        d.timeouts.create = Duration::from_millis(50);

        let err = PodResource.create(&meta, &d).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));
        let msg = err.to_string();
        assert!(msg.contains("waiting for \"Running\""));
        assert!(msg.contains("FailedScheduling: 0/3 nodes are available"));
    }

    #[tokio::test]
    async fn test_create_stops_waiting_on_failed_phase() {
        let mock = MockService::new()
            .on_post(PATH, 201, &pod_json("Pending"))
            .on_get(&format!("{}/web", PATH), 200, &pod_json("Failed"))
            .on_get(
                "/api/v1/namespaces/default/events",
                200,
                &event_list_json(&[("BackOff", "Back-off restarting failed container", "2026-01-01T10:00:00Z")]),
            );
        let meta = mock.clone().into_meta();
        let mut d = data();
        d.timeouts.create = Duration::from_secs(600);

        let err = tokio::time::timeout(Duration::from_secs(5), PodResource.create(&meta, &d))
            .await
            .expect("create should fail without waiting for the timeout")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("is in phase \"Failed\", expected \"Running\""));
        assert!(msg.contains("BackOff: Back-off restarting failed container"));
        let pod_reads = mock
            .requests_with_method("GET")
            .into_iter()
            .filter(|r| r.path == format!("{}/web", PATH))
            .count();
        assert_eq!(pod_reads, 1);
    }

    #[test]
    fn test_phase_status() {
        let parse = |phase: &str| -> Pod { serde_json::from_str(&pod_json(phase)).unwrap() };

        assert!(phase_status(&parse("Running"), "Running").is_ok());
        assert!(matches!(
            phase_status(&parse("Pending"), "Running"),
            Err(RetryError::Retryable(_))
        ));
        assert!(matches!(
            phase_status(&parse("Running"), "Succeeded"),
            Err(RetryError::Retryable(_))
        ));
        assert!(matches!(
            phase_status(&parse("Succeeded"), "Running"),
            Err(RetryError::NonRetryable(_))
        ));
        assert!(matches!(
            phase_status(&parse("Unknown"), "Running"),
            Err(RetryError::NonRetryable(_))
        ));
    }

    #[tokio::test]
    async fn test_read_keeps_target_state() {
        let meta = MockService::new()
            .on_get(&format!("{}/web", PATH), 200, &pod_json("Running"))
            .into_meta();
        let mut d = data();
        d.id = "default/web".to_string();
        d.planned.target_state = "Succeeded".to_string();

        let model = PodResource.read(&meta, &d).await.unwrap().unwrap();
        assert_eq!(model.target_state, "Succeeded");
        assert_eq!(model.metadata.uid, "p-1");
        assert_eq!(model.spec.container[0].image, "nginx:1.27");
    }

    #[tokio::test]
    async fn test_delete_waits_until_gone() {
        let mock = MockService::new()
            .on_delete(&format!("{}/web", PATH), 200, &status_success_json())
            .on_get(&format!("{}/web", PATH), 200, &pod_json("Running"))
            .on_get(&format!("{}/web", PATH), 404, &not_found_json("pods", "web"));
        let meta = mock.clone().into_meta();

        PodResource
            .delete(&meta, &ResourceData::for_id("default/web"))
            .await
            .unwrap();
        assert_eq!(mock.requests_with_method("GET").len(), 2);
    }
}
