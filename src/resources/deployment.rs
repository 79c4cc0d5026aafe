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
use crate::structures::pod_spec::{
    expand_pod_template, flatten_pod_template, pod_template_block, PodTemplateModel,
};
use crate::structures::{
    build_id, expand_int_or_string, flatten_int_or_string, id_parts, non_empty, ptr_to_bool,
    ptr_to_i32, ptr_to_string,
};
use crate::wait::{retry, wait_for_deletion, with_events, RetryError};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{
    Deployment, DeploymentSpec, DeploymentStrategy, RollingUpdateDeployment,
};
use kube::api::{DeleteParams, PatchParams, PostParams};
use kube::Api;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeploymentModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    #[serde(with = "blocks::single")]
    pub spec: DeploymentSpecModel,
    pub wait_for_rollout: bool,
}

impl Default for DeploymentModel {
    fn default() -> Self {
        DeploymentModel {
            metadata: MetadataModel::default(),
            spec: DeploymentSpecModel::default(),
            wait_for_rollout: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DeploymentSpecModel {
    pub min_ready_seconds: i32,
    pub paused: bool,
    pub progress_deadline_seconds: i32,
    pub replicas: i32,
    pub revision_history_limit: i32,
    #[serde(with = "blocks::single")]
    pub selector: LabelSelectorModel,
    #[serde(with = "blocks::optional")]
    pub strategy: Option<DeploymentStrategyModel>,
    #[serde(with = "blocks::single")]
    pub template: PodTemplateModel,
}

impl Default for DeploymentSpecModel {
    fn default() -> Self {
        DeploymentSpecModel {
            min_ready_seconds: 0,
            paused: false,
            progress_deadline_seconds: 600,
            replicas: 1,
            revision_history_limit: 10,
            selector: LabelSelectorModel::default(),
            strategy: None,
            template: PodTemplateModel::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct DeploymentStrategyModel {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(with = "blocks::optional")]
    pub rolling_update: Option<RollingUpdateModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct RollingUpdateModel {
    pub max_surge: String,
    pub max_unavailable: String,
}

pub struct DeploymentResource;

fn deployment_spec_block() -> Block {
    let rolling_update = Block::new()
        .attr(
            "max_surge",
            Attribute::string()
                .optional()
                .default("25%")
                .description("Maximum number of pods that can be scheduled above the desired number of pods"),
        )
        .attr(
            "max_unavailable",
            Attribute::string()
                .optional()
                .default("25%")
                .description("Maximum number of pods that can be unavailable during the update"),
        );

    let strategy = Block::new()
        .attr(
            "type",
            Attribute::string()
                .optional()
                .default("RollingUpdate")
                .validate(Validator::OneOf(&["RollingUpdate", "Recreate"])),
        )
        .attr(
            "rolling_update",
            Attribute::single_block(rolling_update).optional(),
        );

    Block::new()
        .attr(
            "min_ready_seconds",
            Attribute::int()
                .optional()
                .default(0)
                .validate(Validator::IntAtLeast(0))
                .description("Minimum number of seconds a new pod should be ready before it is considered available"),
        )
        .attr(
            "paused",
            Attribute::bool()
                .optional()
                .default(false)
                .description("Indicates that the deployment is paused"),
        )
        .attr(
            "progress_deadline_seconds",
            Attribute::int()
                .optional()
                .default(600)
                .validate(Validator::IntAtLeast(1))
                .description("Maximum time in seconds for a deployment to make progress before it is considered failed"),
        )
        .attr(
            "replicas",
            Attribute::int()
                .optional()
                .default(1)
                .validate(Validator::IntAtLeast(0))
                .description("Number of desired pods"),
        )
        .attr(
            "revision_history_limit",
            Attribute::int()
                .optional()
                .default(10)
                .validate(Validator::IntAtLeast(0))
                .description("The number of old ReplicaSets to retain to allow rollback"),
        )
        .attr(
            "selector",
            Attribute::single_block(label_selector_block(true))
                .required()
                .force_new()
                .description("A label query over pods that should match the replicas count"),
        )
        .attr(
            "strategy",
            Attribute::single_block(strategy)
                .optional()
                .computed()
                .description("The deployment strategy to use to replace existing pods with new ones"),
        )
        .attr(
            "template",
            Attribute::single_block(pod_template_block())
                .required()
                .description("Template describes the pods that will be created"),
        )
}

fn expand_strategy(m: &DeploymentStrategyModel) -> DeploymentStrategy {
    let rolling_update = (m.type_ != "Recreate")
        .then_some(m.rolling_update.as_ref())
        .flatten()
        .map(|r| RollingUpdateDeployment {
            max_surge: expand_int_or_string(&r.max_surge),
            max_unavailable: expand_int_or_string(&r.max_unavailable),
        });

    DeploymentStrategy {
        type_: non_empty(&m.type_),
        rolling_update,
    }
}

fn flatten_strategy(s: &DeploymentStrategy) -> DeploymentStrategyModel {
    DeploymentStrategyModel {
        type_: ptr_to_string(&s.type_),
        rolling_update: s.rolling_update.as_ref().map(|r| RollingUpdateModel {
            max_surge: flatten_int_or_string(&r.max_surge),
            max_unavailable: flatten_int_or_string(&r.max_unavailable),
        }),
    }
}

fn expand_deployment_spec(m: &DeploymentSpecModel) -> DeploymentSpec {
    DeploymentSpec {
        min_ready_seconds: Some(m.min_ready_seconds),
        paused: m.paused.then_some(true),
        progress_deadline_seconds: Some(m.progress_deadline_seconds),
        replicas: Some(m.replicas),
        revision_history_limit: Some(m.revision_history_limit),
        selector: expand_label_selector(&m.selector),
        strategy: m.strategy.as_ref().map(expand_strategy),
        template: expand_pod_template(&m.template),
    }
}

fn flatten_deployment_spec(spec: &DeploymentSpec, configured: &DeploymentSpecModel) -> DeploymentSpecModel {
    DeploymentSpecModel {
        min_ready_seconds: ptr_to_i32(spec.min_ready_seconds),
        paused: ptr_to_bool(spec.paused),
        progress_deadline_seconds: ptr_to_i32(spec.progress_deadline_seconds),
        replicas: ptr_to_i32(spec.replicas),
        revision_history_limit: ptr_to_i32(spec.revision_history_limit),
        selector: flatten_label_selector(&spec.selector),
        strategy: spec.strategy.as_ref().map(flatten_strategy),
        template: flatten_pod_template(&spec.template, &configured.template),
    }
}

/// One operation per changed spec field
fn patch_deployment_spec(old: &DeploymentSpecModel, new: &DeploymentSpecModel) -> Result<PatchOperations> {
    let mut ops = PatchOperations::new();

    if old.min_ready_seconds != new.min_ready_seconds {
        ops.replace("/spec/minReadySeconds", new.min_ready_seconds)?;
    }
    if old.paused != new.paused {
        ops.replace("/spec/paused", new.paused)?;
    }
    if old.progress_deadline_seconds != new.progress_deadline_seconds {
        ops.replace("/spec/progressDeadlineSeconds", new.progress_deadline_seconds)?;
    }
    if old.replicas != new.replicas {
        ops.replace("/spec/replicas", new.replicas)?;
    }
    if old.revision_history_limit != new.revision_history_limit {
        ops.replace("/spec/revisionHistoryLimit", new.revision_history_limit)?;
    }
    if old.strategy != new.strategy {
        let old_strategy = old.strategy.as_ref().map(expand_strategy);
        let new_strategy = new.strategy.as_ref().map(expand_strategy);
        ops.set_optional("/spec/strategy", old_strategy.as_ref(), new_strategy.as_ref())?;
    }
    if old.template != new.template {
        ops.replace("/spec/template", expand_pod_template(&new.template))?;
    }

    Ok(ops)
}

/// Rollout progress of a deployment as seen by one poll
fn rollout_status(d: &Deployment) -> std::result::Result<(), RetryError> {
    let name = d.metadata.name.as_deref().unwrap_or_default();
    let desired = d.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
    let status = d.status.clone().unwrap_or_default();

    let generation = d.metadata.generation.unwrap_or_default();
    if status.observed_generation.unwrap_or_default() < generation {
        return Err(RetryError::pending(format!(
            "Waiting for rollout of deployment {} to start",
            name
        )));
    }

    let deadline_exceeded = status.conditions.iter().flatten().any(|c| {
        c.type_ == "Progressing" && c.reason.as_deref() == Some("ProgressDeadlineExceeded")
    });
    if deadline_exceeded {
        return Err(RetryError::NonRetryable(ProviderError::Wait(format!(
            "Deployment {} exceeded its progress deadline",
            name
        ))));
    }

    let updated = status.updated_replicas.unwrap_or_default();
    let available = status.available_replicas.unwrap_or_default();
    let replicas = status.replicas.unwrap_or_default();
    if updated < desired {
        return Err(RetryError::pending(format!(
            "Waiting for rollout to finish: {} out of {} new replicas have been updated",
            updated, desired
        )));
    }
    if replicas > updated {
        return Err(RetryError::pending(format!(
            "Waiting for rollout to finish: {} old replicas are pending termination",
            replicas - updated
        )));
    }
    if available < updated {
        return Err(RetryError::pending(format!(
            "Waiting for rollout to finish: {} of {} updated replicas are available",
            available, updated
        )));
    }
    Ok(())
}

async fn wait_for_rollout(
    meta: &dyn KubeClientsets,
    api: &Api<Deployment>,
    namespace: &str,
    name: &str,
    timeout: Duration,
) -> Result<()> {
    info!("Waiting for rollout of deployment {}", name);
    let waited = retry(timeout, meta.poll_interval(), || async {
        let deployment = api
            .get(name)
            .await
            .map_err(|e| ProviderError::api("Failed to read deployment", e))?;
        rollout_status(&deployment)
    })
    .await;

    match waited {
        Ok(()) => {
            info!("Rollout of deployment {} finished", name);
            Ok(())
        }
        Err(e) => {
            let events = object_warnings(&meta.main_clientset()?, Some(namespace), "Deployment", name).await;
            Err(with_events(e, events))
        }
    }
}

#[async_trait]
impl Resource for DeploymentResource {
    type Model = DeploymentModel;

    const TYPE_NAME: &'static str = "kubernetes_deployment";

    fn schema(&self) -> Block {
        Block::new()
            .attr("metadata", metadata_schema(true))
            .attr(
                "spec",
                Attribute::single_block(deployment_spec_block())
                    .required()
                    .description("Spec defines the specification of the desired behavior of the deployment"),
            )
            .attr(
                "wait_for_rollout",
                Attribute::bool()
                    .optional()
                    .default(true)
                    .description("Wait for the rollout of the deployment to complete"),
            )
    }

    #[instrument(skip_all)]
    async fn create(&self, meta: &dyn KubeClientsets, data: &ResourceData<DeploymentModel>) -> Result<String> {
        let namespace = namespace_or_default(meta, &data.planned.metadata);
        let mut metadata = expand_metadata(&data.planned.metadata);
        metadata.namespace = Some(namespace.clone());
        let deployment = Deployment {
            metadata,
            spec: Some(expand_deployment_spec(&data.planned.spec)),
            ..Default::default()
        };

        info!("Creating new deployment: {:?}", deployment.metadata.name);
        let api: Api<Deployment> = Api::namespaced(meta.main_clientset()?, &namespace);
        let out = api
            .create(&PostParams::default(), &deployment)
            .await
            .map_err(|e| ProviderError::api("Failed to create deployment", e))?;
        let name = out.metadata.name.clone().unwrap_or_default();
        info!("Submitted new deployment: {}", name);

        if data.planned.wait_for_rollout {
            wait_for_rollout(meta, &api, &namespace, &name, data.timeouts.create).await?;
        }

        Ok(build_id(&out.metadata))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn read(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<DeploymentModel>,
    ) -> Result<Option<DeploymentModel>> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Deployment> = Api::namespaced(meta.main_clientset()?, &namespace);

        Ok(get_object(&api, &name).await?.map(|d| DeploymentModel {
            metadata: flatten_metadata(&d.metadata, &data.planned.metadata),
            spec: d
                .spec
                .as_ref()
                .map(|s| flatten_deployment_spec(s, &data.planned.spec))
                .unwrap_or_default(),
            wait_for_rollout: data.planned.wait_for_rollout,
        }))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn update(&self, meta: &dyn KubeClientsets, data: &ResourceData<DeploymentModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let prior = data.prior.clone().unwrap_or_default();

        let mut ops = patch_metadata("/metadata/", &prior.metadata, &data.planned.metadata)?;
        ops.extend(patch_deployment_spec(&prior.spec, &data.planned.spec)?);
        if ops.is_empty() {
            return Ok(());
        }

        let api: Api<Deployment> = Api::namespaced(meta.main_clientset()?, &namespace);
        api.patch(&name, &PatchParams::default(), &ops.to_patch()?)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to update deployment {}", data.id), e))?;
        info!("Submitted updated deployment: {}", data.id);

        if data.planned.wait_for_rollout {
            wait_for_rollout(meta, &api, &namespace, &name, data.timeouts.update).await?;
        }
        Ok(())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn delete(&self, meta: &dyn KubeClientsets, data: &ResourceData<DeploymentModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Deployment> = Api::namespaced(meta.main_clientset()?, &namespace);
        delete_object(&api, &name, &DeleteParams::foreground()).await?;

        wait_for_deletion(&api, &name, data.timeouts.delete, meta.delete_poll_interval()).await
    }

    async fn exists(&self, meta: &dyn KubeClientsets, data: &ResourceData<DeploymentModel>) -> Result<bool> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Deployment> = Api::namespaced(meta.main_clientset()?, &namespace);
        object_exists(&api, &name).await
    }
}
