// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{ProviderError, Result};
use crate::kubernetes::{object_warnings, KubeClientsets};
use crate::patch::PatchOperations;
use crate::resources::{
    delete_object, get_object, namespace_or_default, object_exists, Resource, ResourceData,
};
use crate::schema::{blocks, Attribute, Block, Validator};
use crate::structures::label_selector::{
    expand_label_selector, flatten_label_selector, label_selector_block, LabelSelectorModel,
};
use crate::structures::metadata::{
    expand_metadata, flatten_metadata, metadata_schema, patch_metadata, MetadataModel,
};
use crate::structures::persistent_volume_claim::{
    expand_persistent_volume_claim_spec, flatten_persistent_volume_claim_spec,
    persistent_volume_claim_spec_block, PersistentVolumeClaimSpecModel,
};
use crate::structures::pod_spec::{
    expand_pod_template, flatten_pod_template, pod_template_block, PodTemplateModel,
};
use crate::structures::{build_id, id_parts, non_empty, ptr_to_i32, ptr_to_string};
use crate::wait::{retry, wait_for_deletion, with_events, RetryError};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{
    RollingUpdateStatefulSetStrategy, StatefulSet, StatefulSetSpec, StatefulSetUpdateStrategy,
};
use k8s_openapi::api::core::v1::PersistentVolumeClaim;
use kube::api::{DeleteParams, PatchParams, PostParams};
use kube::Api;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StatefulSetModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    #[serde(with = "blocks::single")]
    pub spec: StatefulSetSpecModel,
    pub wait_for_rollout: bool,
}

impl Default for StatefulSetModel {
    fn default() -> Self {
        StatefulSetModel {
            metadata: MetadataModel::default(),
            spec: StatefulSetSpecModel::default(),
            wait_for_rollout: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct StatefulSetSpecModel {
    pub pod_management_policy: String,
    pub replicas: i32,
    pub revision_history_limit: i32,
    #[serde(with = "blocks::single")]
    pub selector: LabelSelectorModel,
    pub service_name: String,
    #[serde(with = "blocks::single")]
    pub template: PodTemplateModel,
    #[serde(with = "blocks::optional")]
    pub update_strategy: Option<UpdateStrategyModel>,
    pub volume_claim_template: Vec<VolumeClaimTemplateModel>,
}

impl Default for StatefulSetSpecModel {
    fn default() -> Self {
        StatefulSetSpecModel {
            pod_management_policy: "OrderedReady".to_string(),
            replicas: 1,
            revision_history_limit: 10,
            selector: LabelSelectorModel::default(),
            service_name: String::new(),
            template: PodTemplateModel::default(),
            update_strategy: None,
            volume_claim_template: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct UpdateStrategyModel {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(with = "blocks::optional")]
    pub rolling_update: Option<StatefulSetRollingUpdateModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct StatefulSetRollingUpdateModel {
    pub partition: i32,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct VolumeClaimTemplateModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    #[serde(with = "blocks::single")]
    pub spec: PersistentVolumeClaimSpecModel,
}

pub struct StatefulSetResource;

fn stateful_set_spec_block() -> Block {
    let update_strategy = Block::new()
        .attr(
            "type",
            Attribute::string()
                .optional()
                .default("RollingUpdate")
                .validate(Validator::OneOf(&["RollingUpdate", "OnDelete"])),
        )
        .attr(
            "rolling_update",
            Attribute::single_block(Block::new().attr(
                "partition",
                Attribute::int()
                    .optional()
                    .default(0)
                    .validate(Validator::IntAtLeast(0))
                    .description("Ordinal at which the StatefulSet should be partitioned"),
            ))
            .optional(),
        );

    let volume_claim_template = Block::new()
        .attr("metadata", metadata_schema(false))
        .attr(
            "spec",
            Attribute::single_block(persistent_volume_claim_spec_block()).required(),
        );

    Block::new()
        .attr(
            "pod_management_policy",
            Attribute::string()
                .optional()
                .default("OrderedReady")
                .force_new()
                .validate(Validator::OneOf(&["OrderedReady", "Parallel"]))
                .description("Controls how pods are created during initial scale up and scaling down"),
        )
        .attr(
            "replicas",
            Attribute::int()
                .optional()
                .default(1)
                .validate(Validator::IntAtLeast(0))
                .description("The desired number of replicas of the given template"),
        )
        .attr(
            "revision_history_limit",
            Attribute::int()
                .optional()
                .default(10)
                .validate(Validator::IntAtLeast(0)),
        )
        .attr(
            "selector",
            Attribute::single_block(label_selector_block(true))
                .required()
                .force_new()
                .description("A label query over pods that should match the replica count"),
        )
        .attr(
            "service_name",
            Attribute::string()
                .required()
                .force_new()
                .description("The name of the service that governs this StatefulSet"),
        )
        .attr(
            "template",
            Attribute::single_block(pod_template_block())
                .required()
                .description("The object that describes the pod that will be created if insufficient replicas are detected"),
        )
        .attr(
            "update_strategy",
            Attribute::single_block(update_strategy)
                .optional()
                .computed()
                .description("The strategy used to perform updates of the pods"),
        )
        .attr(
            "volume_claim_template",
            Attribute::block_list(volume_claim_template)
                .optional()
                .force_new()
                .description("Claims that pods are allowed to reference"),
        )
}

fn expand_update_strategy(m: &UpdateStrategyModel) -> StatefulSetUpdateStrategy {
    let rolling_update = (m.type_ != "OnDelete")
        .then_some(m.rolling_update.as_ref())
        .flatten()
        .map(|r| RollingUpdateStatefulSetStrategy {
            partition: Some(r.partition),
            ..Default::default()
        });

    StatefulSetUpdateStrategy {
        type_: non_empty(&m.type_),
        rolling_update,
    }
}

fn flatten_update_strategy(s: &StatefulSetUpdateStrategy) -> UpdateStrategyModel {
    UpdateStrategyModel {
        type_: ptr_to_string(&s.type_),
        rolling_update: s.rolling_update.as_ref().map(|r| StatefulSetRollingUpdateModel {
            partition: ptr_to_i32(r.partition),
        }),
    }
}

fn expand_volume_claim_templates(templates: &[VolumeClaimTemplateModel]) -> Option<Vec<PersistentVolumeClaim>> {
    (!templates.is_empty()).then(|| {
        templates
            .iter()
            .map(|t| PersistentVolumeClaim {
                metadata: expand_metadata(&t.metadata),
                spec: Some(expand_persistent_volume_claim_spec(&t.spec)),
                ..Default::default()
            })
            .collect()
    })
}

fn flatten_volume_claim_templates(
    templates: &[PersistentVolumeClaim],
    configured: &[VolumeClaimTemplateModel],
) -> Vec<VolumeClaimTemplateModel> {
    templates
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let configured_metadata = configured.get(i).map(|c| c.metadata.clone()).unwrap_or_default();
            VolumeClaimTemplateModel {
                metadata: flatten_metadata(&t.metadata, &configured_metadata),
                spec: flatten_persistent_volume_claim_spec(&t.spec.clone().unwrap_or_default()),
            }
        })
        .collect()
}

fn expand_stateful_set_spec(m: &StatefulSetSpecModel) -> StatefulSetSpec {
    StatefulSetSpec {
        pod_management_policy: non_empty(&m.pod_management_policy),
        replicas: Some(m.replicas),
        revision_history_limit: Some(m.revision_history_limit),
        selector: expand_label_selector(&m.selector),
        service_name: m.service_name.clone(),
        template: expand_pod_template(&m.template),
        update_strategy: m.update_strategy.as_ref().map(expand_update_strategy),
        volume_claim_templates: expand_volume_claim_templates(&m.volume_claim_template),
        ..Default::default()
    }
}

fn flatten_stateful_set_spec(spec: &StatefulSetSpec, configured: &StatefulSetSpecModel) -> StatefulSetSpecModel {
    StatefulSetSpecModel {
        pod_management_policy: ptr_to_string(&spec.pod_management_policy),
        replicas: ptr_to_i32(spec.replicas),
        revision_history_limit: ptr_to_i32(spec.revision_history_limit),
        selector: flatten_label_selector(&spec.selector),
        service_name: spec.service_name.clone(),
        template: flatten_pod_template(&spec.template, &configured.template),
        update_strategy: spec.update_strategy.as_ref().map(flatten_update_strategy),
        volume_claim_template: flatten_volume_claim_templates(
            spec.volume_claim_templates.as_deref().unwrap_or_default(),
            &configured.volume_claim_template,
        ),
    }
}

fn patch_stateful_set_spec(old: &StatefulSetSpecModel, new: &StatefulSetSpecModel) -> Result<PatchOperations> {
    let mut ops = PatchOperations::new();

    if old.replicas != new.replicas {
        ops.replace("/spec/replicas", new.replicas)?;
    }
    if old.revision_history_limit != new.revision_history_limit {
        ops.replace("/spec/revisionHistoryLimit", new.revision_history_limit)?;
    }
    if old.template != new.template {
        ops.replace("/spec/template", expand_pod_template(&new.template))?;
    }
    if old.update_strategy != new.update_strategy {
        let old_strategy = old.update_strategy.as_ref().map(expand_update_strategy);
        let new_strategy = new.update_strategy.as_ref().map(expand_update_strategy);
        ops.set_optional("/spec/updateStrategy", old_strategy.as_ref(), new_strategy.as_ref())?;
    }

    Ok(ops)
}

/// Replica progress of a stateful set as seen by one poll
fn replicas_status(set: &StatefulSet) -> std::result::Result<(), RetryError> {
    let name = set.metadata.name.as_deref().unwrap_or_default();
    let desired = set.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let status = set.status.clone().unwrap_or_default();

    if status.observed_generation.unwrap_or_default() < set.metadata.generation.unwrap_or_default() {
        return Err(RetryError::pending(format!(
            "StatefulSet {} has not observed its latest generation yet",
            name
        )));
    }
    if status.replicas != desired {
        return Err(RetryError::pending(format!(
            "StatefulSet {} is waiting for {} replicas, {} present",
            name, desired, status.replicas
        )));
    }
    let ready = status.ready_replicas.unwrap_or_default();
    if ready != desired {
        return Err(RetryError::pending(format!(
            "StatefulSet {} is waiting for {} replicas to be ready, {} ready",
            name, desired, ready
        )));
    }
    Ok(())
}

async fn wait_for_replicas(
    meta: &dyn KubeClientsets,
    api: &Api<StatefulSet>,
    namespace: &str,
    name: &str,
    timeout: Duration,
) -> Result<()> {
    info!("Waiting for replicas of stateful set {}", name);
    let waited = retry(timeout, meta.poll_interval(), || async {
        let set = api
            .get(name)
            .await
            .map_err(|e| ProviderError::api("Failed to read stateful set", e))?;
        replicas_status(&set)
    })
    .await;

    if let Err(e) = waited {
        let events = object_warnings(&meta.main_clientset()?, Some(namespace), "StatefulSet", name).await;
        return Err(with_events(e, events));
    }
    info!("Stateful set {} has all replicas ready", name);
    Ok(())
}

#[async_trait]
impl Resource for StatefulSetResource {
    type Model = StatefulSetModel;

    const TYPE_NAME: &'static str = "kubernetes_stateful_set";

    fn schema(&self) -> Block {
        Block::new()
            .attr("metadata", metadata_schema(true))
            .attr(
                "spec",
                Attribute::single_block(stateful_set_spec_block())
                    .required()
                    .description("Spec defines the desired identities of pods in this set"),
            )
            .attr(
                "wait_for_rollout",
                Attribute::bool()
                    .optional()
                    .default(true)
                    .description("Wait for the rollout of the stateful set to complete"),
            )
    }

    #[instrument(skip_all)]
    async fn create(&self, meta: &dyn KubeClientsets, data: &ResourceData<StatefulSetModel>) -> Result<String> {
        let namespace = namespace_or_default(meta, &data.planned.metadata);
        let mut metadata = expand_metadata(&data.planned.metadata);
        metadata.namespace = Some(namespace.clone());
        let set = StatefulSet {
            metadata,
            spec: Some(expand_stateful_set_spec(&data.planned.spec)),
            ..Default::default()
        };

        info!("Creating new stateful set: {:?}", set.metadata.name);
        let api: Api<StatefulSet> = Api::namespaced(meta.main_clientset()?, &namespace);
        let out = api
            .create(&PostParams::default(), &set)
            .await
            .map_err(|e| ProviderError::api("Failed to create stateful set", e))?;
        let name = out.metadata.name.clone().unwrap_or_default();
        info!("Submitted new stateful set: {}", name);

        if data.planned.wait_for_rollout {
            wait_for_replicas(meta, &api, &namespace, &name, data.timeouts.create).await?;
        }

        Ok(build_id(&out.metadata))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn read(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<StatefulSetModel>,
    ) -> Result<Option<StatefulSetModel>> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<StatefulSet> = Api::namespaced(meta.main_clientset()?, &namespace);

        Ok(get_object(&api, &name).await?.map(|set| StatefulSetModel {
            metadata: flatten_metadata(&set.metadata, &data.planned.metadata),
            spec: set
                .spec
                .as_ref()
                .map(|s| flatten_stateful_set_spec(s, &data.planned.spec))
                .unwrap_or_default(),
            wait_for_rollout: data.planned.wait_for_rollout,
        }))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn update(&self, meta: &dyn KubeClientsets, data: &ResourceData<StatefulSetModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let prior = data.prior.clone().unwrap_or_default();

        let mut ops = patch_metadata("/metadata/", &prior.metadata, &data.planned.metadata)?;
        ops.extend(patch_stateful_set_spec(&prior.spec, &data.planned.spec)?);
        if ops.is_empty() {
            return Ok(());
        }

        let api: Api<StatefulSet> = Api::namespaced(meta.main_clientset()?, &namespace);
        api.patch(&name, &PatchParams::default(), &ops.to_patch()?)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to update stateful set {}", data.id), e))?;
        info!("Submitted updated stateful set: {}", data.id);

        if data.planned.wait_for_rollout {
            wait_for_replicas(meta, &api, &namespace, &name, data.timeouts.update).await?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn delete(&self, meta: &dyn KubeClientsets, data: &ResourceData<StatefulSetModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<StatefulSet> = Api::namespaced(meta.main_clientset()?, &namespace);
        delete_object(&api, &name, &DeleteParams::default()).await?;

        wait_for_deletion(&api, &name, data.timeouts.delete, meta.delete_poll_interval()).await
    }

    async fn exists(&self, meta: &dyn KubeClientsets, data: &ResourceData<StatefulSetModel>) -> Result<bool> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<StatefulSet> = Api::namespaced(meta.main_clientset()?, &namespace);
        object_exists(&api, &name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Handler, Operation, ResourceHandler};
    use crate::structures::persistent_volume_claim::VolumeResourcesModel;
    use crate::structures::pod_spec::tests::nginx_spec;
    use crate::test_utils::{not_found_json, status_success_json, MockService};
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    const PATH: &str = "/apis/apps/v1/namespaces/default/statefulsets";

    fn set_json(status: Value) -> String {
        json!({
            "apiVersion": "apps/v1",
            "kind": "StatefulSet",
            "metadata": {"name": "db", "namespace": "default", "generation": 1},
            "spec": {
                "replicas": 3,
                "serviceName": "db",
                "selector": {"matchLabels": {"app": "db"}},
                "template": {
                    "metadata": {"labels": {"app": "db"}},
                    "spec": {"containers": [{"name": "nginx", "image": "nginx:1.27"}]}
                }
            },
            "status": status
        })
        .to_string()
    }

    fn spec() -> StatefulSetSpecModel {
        let labels = BTreeMap::from([("app".to_string(), "db".to_string())]);
        StatefulSetSpecModel {
            replicas: 3,
            selector: LabelSelectorModel {
                match_labels: labels.clone(),
                ..Default::default()
            },
            service_name: "db".to_string(),
            template: PodTemplateModel {
                metadata: MetadataModel {
                    labels,
                    ..Default::default()
                },
                spec: nginx_spec(),
            },
            update_strategy: Some(UpdateStrategyModel {
                type_: "RollingUpdate".to_string(),
                rolling_update: Some(StatefulSetRollingUpdateModel { partition: 1 }),
            }),
            volume_claim_template: vec![VolumeClaimTemplateModel {
                metadata: MetadataModel {
                    name: "data".to_string(),
                    ..Default::default()
                },
                spec: PersistentVolumeClaimSpecModel {
                    access_modes: vec!["ReadWriteOnce".to_string()],
                    resources: VolumeResourcesModel {
                        requests: BTreeMap::from([("storage".to_string(), "1Gi".to_string())]),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            }],
            ..Default::default()
        }
    }

    fn data() -> ResourceData<StatefulSetModel> {
        ResourceData {
            planned: StatefulSetModel {
                metadata: MetadataModel {
                    name: "db".to_string(),
                    ..Default::default()
                },
                spec: spec(),
                wait_for_rollout: true,
            },
            ..ResourceData::for_id("")
        }
    }

    #[test]
    fn test_stateful_set_spec_round_trip() {
        let m = spec();
        assert_eq!(flatten_stateful_set_spec(&expand_stateful_set_spec(&m), &m), m);
    }

    #[test]
    fn test_patch_replicas_and_strategy() {
        let old = spec();
        let mut new = old.clone();
        new.replicas = 5;
        new.update_strategy = None;

        let ops = patch_stateful_set_spec(&old, &new).unwrap();
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([
                {"op": "replace", "path": "/spec/replicas", "value": 5},
                {"op": "remove", "path": "/spec/updateStrategy"}
            ])
        );
    }

    #[test]
    fn test_replica_changes_stay_in_place() {
        let schema = StatefulSetResource.schema();
        let prior = serde_json::to_value(StatefulSetModel {
            spec: spec(),
            ..Default::default()
        })
        .unwrap();
        let mut next = prior.clone();
        next["spec"][0]["replicas"] = json!(5);
        assert!(schema.requires_replace(&prior, &next).is_empty());

        next["spec"][0]["service_name"] = json!("other");
        assert_eq!(schema.requires_replace(&prior, &next), vec!["spec.0.service_name".to_string()]);
    }

    #[tokio::test]
    async fn test_create_polls_until_replicas_ready() {
        let mock = MockService::new()
            .on_post(PATH, 201, &set_json(json!({"replicas": 0})))
            .on_get(&format!("{}/db", PATH), 200, &set_json(json!({"observedGeneration": 1, "replicas": 2})))
            .on_get(
                &format!("{}/db", PATH),
                200,
                &set_json(json!({"observedGeneration": 1, "replicas": 3, "readyReplicas": 2})),
            )
            .on_get(
                &format!("{}/db", PATH),
                200,
                &set_json(json!({"observedGeneration": 1, "replicas": 3, "readyReplicas": 3})),
            );
        let meta = mock.clone().into_meta();

        let id = StatefulSetResource.create(&meta, &data()).await.unwrap();
        assert_eq!(id, "default/db");
        assert_eq!(mock.requests_with_method("GET").len(), 3);
    }

    #[tokio::test]
    async fn test_create_times_out_waiting_for_replicas() {
        let meta = MockService::new()
            .on_post(PATH, 201, &set_json(json!({"replicas": 0})))
            .on_get(&format!("{}/db", PATH), 200, &set_json(json!({"observedGeneration": 1, "replicas": 1})))
            .into_meta();
        let mut d = data();
        d.timeouts.create = Duration::from_millis(50);

        let err = StatefulSetResource.create(&meta, &d).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { .. }));
        assert!(err.to_string().contains("waiting for 3 replicas"));
    }

    #[tokio::test]
    async fn test_delete_waits_until_gone() {
        let mock = MockService::new()
            .on_delete(&format!("{}/db", PATH), 200, &status_success_json())
            .on_get(&format!("{}/db", PATH), 404, &not_found_json("statefulsets", "db"));
        let meta = mock.clone().into_meta();

        StatefulSetResource
            .delete(&meta, &ResourceData::for_id("default/db"))
            .await
            .unwrap();
        assert_eq!(mock.requests_with_method("DELETE").len(), 1);
    }

    fn server_set_json(generation: i64, replicas: i32) -> String {
        json!({
            "apiVersion": "apps/v1",
            "kind": "StatefulSet",
            "metadata": {"name": "db", "namespace": "default", "uid": "s-1", "generation": generation},
            "spec": {
                "replicas": replicas,
                "serviceName": "db",
                "podManagementPolicy": "OrderedReady",
                "revisionHistoryLimit": 10,
                "selector": {"matchLabels": {"app": "db"}},
                "updateStrategy": {"type": "RollingUpdate", "rollingUpdate": {"partition": 0}},
                "template": {
                    "metadata": {"labels": {"app": "db"}},
                    "spec": {
                        "containers": [{
                            "name": "db",
                            "image": "postgres:16",
                            "imagePullPolicy": "IfNotPresent",
                            "ports": [{"containerPort": 5432, "protocol": "TCP"}],
                            "resources": {}
                        }],
                        "dnsPolicy": "ClusterFirst",
                        "restartPolicy": "Always",
                        "terminationGracePeriodSeconds": 30
                    }
                }
            },
            "status": {"observedGeneration": generation, "replicas": replicas, "readyReplicas": replicas}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_update_replicas_keeps_server_defaults() {
        let mock = MockService::new()
            .on_get(&format!("{}/db", PATH), 200, &server_set_json(1, 3))
            .on_get(&format!("{}/db", PATH), 200, &server_set_json(2, 5))
            .on_patch(&format!("{}/db", PATH), 200, &server_set_json(2, 5));
        let meta = mock.clone().into_meta();

        let prior = StatefulSetResource
            .read(&meta, &ResourceData::for_id("default/db"))
            .await
            .unwrap()
            .unwrap();

        let state = Handler(StatefulSetResource)
            .update(
                &meta,
                Operation {
                    id: "default/db".to_string(),
                    prior_state: Some(serde_json::to_value(&prior).unwrap()),
                    config: Some(json!({
                        "metadata": [{"name": "db", "namespace": "default"}],
                        "spec": [{
                            "replicas": 5,
                            "service_name": "db",
                            "selector": [{"match_labels": {"app": "db"}}],
                            "template": [{
                                "metadata": [{"labels": {"app": "db"}}],
                                "spec": [{
                                    "container": [{
                                        "name": "db",
                                        "image": "postgres:16",
                                        "port": [{"container_port": 5432}]
                                    }]
                                }]
                            }]
                        }]
                    })),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let patches = mock.requests_with_method("PATCH");
        assert_eq!(patches.len(), 1);
        assert_eq!(
            patches[0].json(),
            json!([{"op": "replace", "path": "/spec/replicas", "value": 5}])
        );
        let state = state.state.unwrap();
        assert_eq!(state["spec"][0]["update_strategy"][0]["rolling_update"][0]["partition"], json!(0));
    }
}
