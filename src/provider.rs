// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Request dispatch: one JSON request in, one JSON response out.

use crate::error::{ProviderError, Result};
use crate::kubernetes::KubeClientsets;
use crate::resources::config_map::ConfigMapResource;
use crate::resources::deployment::DeploymentResource;
use crate::resources::endpoint_slice::EndpointSliceResource;
use crate::resources::endpoints::EndpointsResource;
use crate::resources::namespace::NamespaceResource;
use crate::resources::network_policy::NetworkPolicyResource;
use crate::resources::persistent_volume_claim::PersistentVolumeClaimResource;
use crate::resources::pod::PodResource;
use crate::resources::secret::SecretResource;
use crate::resources::service::ServiceResource;
use crate::resources::stateful_set::StatefulSetResource;
use crate::resources::storage_class::StorageClassResource;
use crate::resources::{Handler, Operation, Resource, ResourceHandler, TimeoutsConfig};
use crate::schema::Diagnostic;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{error, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Schema,
    Validate,
    Plan,
    Create,
    Read,
    Update,
    Delete,
    Exists,
    Import,
}

impl OperationKind {
    /// Whether the operation talks to the API server
    pub fn needs_cluster(self) -> bool {
        !matches!(
            self,
            OperationKind::Schema | OperationKind::Validate | OperationKind::Plan
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Schema => "schema",
            OperationKind::Validate => "validate",
            OperationKind::Plan => "plan",
            OperationKind::Create => "create",
            OperationKind::Read => "read",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Exists => "exists",
            OperationKind::Import => "import",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Empty only for a schema request covering every resource
    #[serde(default)]
    pub resource_type: String,
    pub operation: OperationKind,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub prior_state: Option<Value>,
    #[serde(default)]
    pub config: Option<Value>,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Response {
    pub id: String,
    pub state: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires_replace: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
}

impl Response {
    fn failed(err: ProviderError) -> Self {
        let diagnostics = match err {
            ProviderError::Validation(diags) => diags,
            other => vec![Diagnostic::error("", other.to_string())],
        };
        Response {
            diagnostics,
            ..Default::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// All resource types the provider serves
pub struct Provider {
    resources: BTreeMap<&'static str, Box<dyn ResourceHandler>>,
}

impl Default for Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider {
    pub fn new() -> Self {
        let mut provider = Provider {
            resources: BTreeMap::new(),
        };
        provider.register(NamespaceResource);
        provider.register(ConfigMapResource);
        provider.register(SecretResource);
        provider.register(ServiceResource);
        provider.register(EndpointsResource);
        provider.register(EndpointSliceResource);
        provider.register(NetworkPolicyResource);
        provider.register(StorageClassResource);
        provider.register(PersistentVolumeClaimResource);
        provider.register(PodResource);
        provider.register(DeploymentResource);
        provider.register(StatefulSetResource);
        provider
    }

    fn register<R: Resource>(&mut self, resource: R) {
        self.resources.insert(R::TYPE_NAME, Box::new(Handler(resource)));
    }

    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    pub fn resource(&self, type_name: &str) -> Result<&dyn ResourceHandler> {
        self.resources
            .get(type_name)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    /// Schemas keyed by resource type
    pub fn schemas(&self) -> Result<Value> {
        let mut schemas = Map::new();
        for (name, handler) in &self.resources {
            schemas.insert(name.to_string(), serde_json::to_value(handler.schema())?);
        }
        Ok(Value::Object(schemas))
    }

    /// Handle a request that needs no cluster connection
    pub fn handle_offline(&self, request: Request) -> Response {
        self.run_offline(request).unwrap_or_else(Response::failed)
    }

    #[instrument(skip(self, meta, request), fields(resource = %request.resource_type, operation = %request.operation))]
    pub async fn handle(&self, meta: &dyn KubeClientsets, request: Request) -> Response {
        let result = if request.operation.needs_cluster() {
            self.run(meta, request).await
        } else {
            self.run_offline(request)
        };

        result.unwrap_or_else(|e| {
            error!("Request failed: {}", e);
            Response::failed(e)
        })
    }

    fn run_offline(&self, request: Request) -> Result<Response> {
        match request.operation {
            OperationKind::Schema if request.resource_type.is_empty() => Ok(Response {
                schema: Some(self.schemas()?),
                ..Default::default()
            }),
            OperationKind::Schema => {
                let handler = self.resource(&request.resource_type)?;
                Ok(Response {
                    schema: Some(serde_json::to_value(handler.schema())?),
                    ..Default::default()
                })
            }
            OperationKind::Validate => {
                let handler = self.resource(&request.resource_type)?;
                let config = request.config.ok_or(ProviderError::MissingInput("config"))?;
                Ok(Response {
                    diagnostics: handler.validate(&config),
                    ..Default::default()
                })
            }
            OperationKind::Plan => {
                let handler = self.resource(&request.resource_type)?;
                let config = request.config.ok_or(ProviderError::MissingInput("config"))?;
                let plan = handler.plan(request.prior_state.as_ref(), config)?;
                Ok(Response {
                    id: request.id,
                    state: Some(plan.planned_state),
                    requires_replace: plan.requires_replace,
                    ..Default::default()
                })
            }
            other => Err(ProviderError::UnsupportedOperation {
                resource: request.resource_type,
                operation: format!("{} without a cluster connection", other),
            }),
        }
    }

    async fn run(&self, meta: &dyn KubeClientsets, request: Request) -> Result<Response> {
        let handler = self.resource(&request.resource_type)?;
        let kind = request.operation;
        let op = Operation {
            id: request.id,
            prior_state: request.prior_state,
            config: request.config,
            timeouts: request.timeouts,
        };

        let response = match kind {
            OperationKind::Create => state_response(handler.create(meta, op).await?),
            OperationKind::Read => state_response(handler.read(meta, op).await?),
            OperationKind::Update => state_response(handler.update(meta, op).await?),
            OperationKind::Import => state_response(handler.import(meta, op).await?),
            OperationKind::Delete => {
                handler.delete(meta, op).await?;
                Response::default()
            }
            OperationKind::Exists => {
                let id = op.id.clone();
                Response {
                    id,
                    exists: Some(handler.exists(meta, op).await?),
                    ..Default::default()
                }
            }
            OperationKind::Schema | OperationKind::Validate | OperationKind::Plan => {
                return Err(ProviderError::UnsupportedOperation {
                    resource: handler.type_name().to_string(),
                    operation: kind.to_string(),
                })
            }
        };

        info!("Finished {} for {}", kind, handler.type_name());
        Ok(response)
    }
}

fn state_response(state: crate::resources::State) -> Response {
    Response {
        id: state.id,
        state: state.state,
        ..Default::default()
    }
}
