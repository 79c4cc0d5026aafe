// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource handlers and the contract every Kubernetes kind implements.
//!
//! Each kind implements [`Resource`] against its own typed model. The
//! [`Handler`] wrapper erases the model type so the provider can dispatch
//! JSON requests by resource type name.

pub mod config_map;
pub mod deployment;
pub mod endpoint_slice;
pub mod endpoints;
pub mod namespace;
pub mod network_policy;
pub mod persistent_volume_claim;
pub mod pod;
pub mod secret;
pub mod service;
pub mod stateful_set;
pub mod storage_class;

use crate::config::parse_duration;
use crate::constants::timeouts;
use crate::error::{is_not_found, ProviderError, Result};
use crate::kubernetes::KubeClientsets;
use crate::schema::{strip_nulls, Block, Diagnostic};
use crate::structures::metadata::MetadataModel;
use async_trait::async_trait;
use kube::api::DeleteParams;
use kube::Api;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Per-operation time budgets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            create: Duration::from_secs(timeouts::CREATE_SECS),
            read: Duration::from_secs(timeouts::READ_SECS),
            update: Duration::from_secs(timeouts::UPDATE_SECS),
            delete: Duration::from_secs(timeouts::DELETE_SECS),
        }
    }
}

/// User supplied timeouts such as `{"create": "5m"}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
}

impl Timeouts {
    pub fn with_overrides(self, overrides: &TimeoutsConfig) -> Result<Self> {
        let pick = |value: &Option<String>, default: Duration| match value {
            Some(v) => parse_duration(v),
            None => Ok(default),
        };
        Ok(Timeouts {
            create: pick(&overrides.create, self.create)?,
            read: pick(&overrides.read, self.read)?,
            update: pick(&overrides.update, self.update)?,
            delete: pick(&overrides.delete, self.delete)?,
        })
    }
}

/// Typed input of one CRUD call
#[derive(Debug, Clone)]
pub struct ResourceData<M> {
    /// Terraform ID, empty before create
    pub id: String,
    /// Last known state, absent on create and import
    pub prior: Option<M>,
    /// Desired state on create/update, prior state otherwise
    pub planned: M,
    pub timeouts: Timeouts,
}

impl<M: Default> ResourceData<M> {
    pub fn for_id(id: impl Into<String>) -> Self {
        ResourceData {
            id: id.into(),
            prior: None,
            planned: M::default(),
            timeouts: Timeouts::default(),
        }
    }
}

/// One Kubernetes kind exposed as a resource
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    type Model: Serialize + DeserializeOwned + Clone + Default + Debug + Send + Sync;

    const TYPE_NAME: &'static str;

    fn schema(&self) -> Block;

    fn default_timeouts(&self) -> Timeouts {
        Timeouts::default()
    }

    /// Create the object and return its ID
    async fn create(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<Self::Model>,
    ) -> Result<String>;

    /// Read the object, `None` when it no longer exists
    async fn read(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<Self::Model>,
    ) -> Result<Option<Self::Model>>;

    async fn update(&self, _meta: &dyn KubeClientsets, _data: &ResourceData<Self::Model>) -> Result<()> {
        Err(ProviderError::UnsupportedOperation {
            resource: Self::TYPE_NAME.to_string(),
            operation: "update".to_string(),
        })
    }

    async fn delete(&self, meta: &dyn KubeClientsets, data: &ResourceData<Self::Model>) -> Result<()>;

    async fn exists(&self, meta: &dyn KubeClientsets, data: &ResourceData<Self::Model>) -> Result<bool>;
}

/// Untyped request for one resource operation
#[derive(Debug, Clone, Default)]
pub struct Operation {
    pub id: String,
    pub prior_state: Option<Value>,
    pub config: Option<Value>,
    pub timeouts: TimeoutsConfig,
}

/// Resulting ID and state of an operation; an empty ID means the object is gone
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: String,
    pub state: Option<Value>,
}

impl State {
    fn gone() -> Self {
        State {
            id: String::new(),
            state: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub planned_state: Value,
    pub requires_replace: Vec<String>,
}

/// Resource operations over `serde_json::Value`, dispatchable by type name
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn schema(&self) -> Block;
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;
    fn plan(&self, prior_state: Option<&Value>, config: Value) -> Result<Plan>;
    async fn create(&self, meta: &dyn KubeClientsets, op: Operation) -> Result<State>;
    async fn read(&self, meta: &dyn KubeClientsets, op: Operation) -> Result<State>;
    async fn update(&self, meta: &dyn KubeClientsets, op: Operation) -> Result<State>;
    async fn delete(&self, meta: &dyn KubeClientsets, op: Operation) -> Result<()>;
    async fn exists(&self, meta: &dyn KubeClientsets, op: Operation) -> Result<bool>;
    async fn import(&self, meta: &dyn KubeClientsets, op: Operation) -> Result<State>;
}

/// Erases the model type of a [`Resource`]
pub struct Handler<R>(pub R);

impl<R: Resource> Handler<R> {
    /// Validate configuration, fill defaults and carry computed values over from the prior state
    fn planned_state(&self, prior_state: Option<&Value>, mut config: Value) -> Result<Value> {
        let schema = self.0.schema();

        let diags = schema.validate(&config);
        if !diags.is_empty() {
            return Err(ProviderError::Validation(diags));
        }
        schema.apply_defaults(&mut config);
        if let Some(prior) = prior_state.filter(|p| !p.is_null()) {
            schema.merge_computed(prior, &mut config);
        }

        Ok(strip_nulls(config))
    }

    fn decode_config(&self, prior_state: Option<&Value>, config: Option<Value>) -> Result<R::Model> {
        let config = config.ok_or(ProviderError::MissingInput("config"))?;
        Ok(serde_json::from_value(self.planned_state(prior_state, config)?)?)
    }

    fn decode_state(&self, state: Option<Value>) -> Result<Option<R::Model>> {
        state
            .filter(|s| !s.is_null())
            .map(|s| serde_json::from_value(strip_nulls(s)))
            .transpose()
            .map_err(ProviderError::from)
    }

    fn data(&self, op: &Operation, prior: Option<R::Model>, planned: R::Model) -> Result<ResourceData<R::Model>> {
        Ok(ResourceData {
            id: op.id.clone(),
            prior,
            planned,
            timeouts: self.0.default_timeouts().with_overrides(&op.timeouts)?,
        })
    }

    /// Read back the object and encode it as state
    async fn refresh(&self, meta: &dyn KubeClientsets, data: &ResourceData<R::Model>) -> Result<State> {
        match self.0.read(meta, data).await? {
            Some(model) => Ok(State {
                id: data.id.clone(),
                state: Some(serde_json::to_value(model)?),
            }),
            None => {
                info!("{} {} no longer exists", R::TYPE_NAME, data.id);
                Ok(State::gone())
            }
        }
    }
}

#[async_trait]
impl<R: Resource> ResourceHandler for Handler<R> {
    fn type_name(&self) -> &'static str {
        R::TYPE_NAME
    }

    fn schema(&self) -> Block {
        self.0.schema()
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        self.0.schema().validate(config)
    }

    fn plan(&self, prior_state: Option<&Value>, config: Value) -> Result<Plan> {
        let schema = self.0.schema();
        let planned_state = self.planned_state(prior_state, config)?;

        let requires_replace = match prior_state {
            Some(prior) if !prior.is_null() => schema.requires_replace(prior, &planned_state),
            _ => Vec::new(),
        };
        Ok(Plan {
            planned_state,
            requires_replace,
        })
    }

    #[instrument(skip(self, meta, op), fields(resource = R::TYPE_NAME))]
    async fn create(&self, meta: &dyn KubeClientsets, op: Operation) -> Result<State> {
        let planned = self.decode_config(None, op.config.clone())?;
        let mut data = self.data(&op, None, planned)?;

        data.id = self.0.create(meta, &data).await?;
        info!("Created {} {}", R::TYPE_NAME, data.id);

        self.refresh(meta, &data).await
    }

    #[instrument(skip(self, meta, op), fields(resource = R::TYPE_NAME, id = %op.id))]
    async fn read(&self, meta: &dyn KubeClientsets, op: Operation) -> Result<State> {
        let prior = self.decode_state(op.prior_state.clone())?.unwrap_or_default();
        let data = self.data(&op, None, prior)?;
        self.refresh(meta, &data).await
    }

    #[instrument(skip(self, meta, op), fields(resource = R::TYPE_NAME, id = %op.id))]
    async fn update(&self, meta: &dyn KubeClientsets, op: Operation) -> Result<State> {
        let prior = self
            .decode_state(op.prior_state.clone())?
            .ok_or(ProviderError::MissingInput("prior_state"))?;
        let planned = self.decode_config(op.prior_state.as_ref(), op.config.clone())?;
        let data = self.data(&op, Some(prior), planned)?;

        self.0.update(meta, &data).await?;
        info!("Updated {} {}", R::TYPE_NAME, data.id);

        self.refresh(meta, &data).await
    }

    #[instrument(skip(self, meta, op), fields(resource = R::TYPE_NAME, id = %op.id))]
    async fn delete(&self, meta: &dyn KubeClientsets, op: Operation) -> Result<()> {
        let prior = self.decode_state(op.prior_state.clone())?.unwrap_or_default();
        let data = self.data(&op, None, prior)?;

        self.0.delete(meta, &data).await?;
        info!("Deleted {} {}", R::TYPE_NAME, data.id);
        Ok(())
    }

    #[instrument(skip(self, meta, op), fields(resource = R::TYPE_NAME, id = %op.id))]
    async fn exists(&self, meta: &dyn KubeClientsets, op: Operation) -> Result<bool> {
        let data = self.data(&op, None, R::Model::default())?;
        let exists = self.0.exists(meta, &data).await?;
        debug!("{} {} exists: {}", R::TYPE_NAME, data.id, exists);
        Ok(exists)
    }

    #[instrument(skip(self, meta, op), fields(resource = R::TYPE_NAME, id = %op.id))]
    async fn import(&self, meta: &dyn KubeClientsets, op: Operation) -> Result<State> {
        let data = self.data(&op, None, R::Model::default())?;
        let state = self.refresh(meta, &data).await?;
        if state.id.is_empty() {
            return Err(ProviderError::ImportNotFound(op.id));
        }
        Ok(state)
    }
}

/// Namespace from the metadata, or the provider default
pub fn namespace_or_default(meta: &dyn KubeClientsets, metadata: &MetadataModel) -> String {
    if metadata.namespace.is_empty() {
        meta.default_namespace().to_string()
    } else {
        metadata.namespace.clone()
    }
}

/// Fetch an object, mapping 404 to `None`
pub async fn get_object<K>(api: &Api<K>, name: &str) -> Result<Option<K>>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.get(name).await {
        Ok(obj) => Ok(Some(obj)),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(ProviderError::api(format!("Failed to read {}", name), e)),
    }
}

/// Check whether an object exists; a 404 is a plain `false`
pub async fn object_exists<K>(api: &Api<K>, name: &str) -> Result<bool>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.get(name).await {
        Ok(_) => Ok(true),
        Err(e) if is_not_found(&e) => Ok(false),
        Err(e) => Err(ProviderError::api(
            format!("Failed to check existence of {}", name),
            e,
        )),
    }
}

/// Delete an object; one that is already gone counts as deleted
pub async fn delete_object<K>(api: &Api<K>, name: &str, params: &DeleteParams) -> Result<()>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.delete(name, params).await {
        Ok(_) => Ok(()),
        Err(e) if is_not_found(&e) => {
            debug!("{} already deleted", name);
            Ok(())
        }
        Err(e) => Err(ProviderError::api(format!("Failed to delete {}", name), e)),
    }
}
