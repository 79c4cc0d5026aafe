// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::service_account::TOKEN_SECRET_TYPE;
use crate::error::{ProviderError, Result};
use crate::kubernetes::{object_warnings, KubeClientsets};
use crate::patch::{diff_string_map, PatchOperations};
use crate::resources::{
    delete_object, get_object, namespace_or_default, object_exists, Resource, ResourceData,
};
use crate::schema::{blocks, Attribute, Block};
use crate::structures::metadata::{
    expand_metadata, flatten_metadata, metadata_schema, patch_metadata, MetadataModel,
};
use crate::structures::{build_id, id_parts, non_empty};
use crate::wait::{retry, with_events, RetryError};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{DeleteParams, PatchParams, PostParams};
use kube::Api;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, instrument};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct SecretModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    /// Base64 encoded values, kept apart from `data` so binary content survives
    pub binary_data: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
    pub immutable: bool,
    #[serde(rename = "type")]
    pub type_: String,
    pub wait_for_service_account_token: bool,
}

pub struct SecretResource;

fn encode(value: &str) -> Result<String> {
    Ok(serde_json::from_value(serde_json::to_value(ByteString(
        value.as_bytes().to_vec(),
    ))?)?)
}

fn decode(value: &str) -> Result<ByteString> {
    Ok(serde_json::from_value(Value::String(value.to_string()))?)
}

/// Wire form of the secret payload: every value base64 encoded, keyed as in `.data`
fn encoded_data(m: &SecretModel) -> Result<BTreeMap<String, String>> {
    let mut out = m.binary_data.clone();
    for (k, v) in &m.data {
        out.insert(k.clone(), encode(v)?);
    }
    Ok(out)
}

fn expand_secret(m: &SecretModel) -> Result<Secret> {
    let mut data = BTreeMap::new();
    for (k, v) in &m.data {
        data.insert(k.clone(), ByteString(v.as_bytes().to_vec()));
    }
    for (k, v) in &m.binary_data {
        data.insert(k.clone(), decode(v)?);
    }

    Ok(Secret {
        metadata: expand_metadata(&m.metadata),
        data: (!data.is_empty()).then_some(data),
        immutable: m.immutable.then_some(true),
        type_: non_empty(&m.type_),
        ..Default::default()
    })
}

fn flatten_secret(s: &Secret, configured: &SecretModel) -> Result<SecretModel> {
    let mut data = BTreeMap::new();
    let mut binary_data = BTreeMap::new();

    for (k, v) in s.data.iter().flatten() {
        if configured.binary_data.contains_key(k) {
            binary_data.insert(k.clone(), serde_json::from_value(serde_json::to_value(v)?)?);
        } else {
            data.insert(k.clone(), String::from_utf8_lossy(&v.0).into_owned());
        }
    }

    Ok(SecretModel {
        metadata: flatten_metadata(&s.metadata, &configured.metadata),
        binary_data,
        data,
        immutable: s.immutable.unwrap_or_default(),
        type_: s.type_.clone().unwrap_or_default(),
        wait_for_service_account_token: configured.wait_for_service_account_token,
    })
}

fn patch_secret(old: &SecretModel, new: &SecretModel) -> Result<PatchOperations> {
    let mut ops = patch_metadata("/metadata/", &old.metadata, &new.metadata)?;
    if old.data != new.data || old.binary_data != new.binary_data {
        ops.extend(diff_string_map("/data", &encoded_data(old)?, &encoded_data(new)?)?);
    }
    if old.immutable != new.immutable {
        ops.replace("/immutable", new.immutable)?;
    }
    Ok(ops)
}

#[async_trait]
impl Resource for SecretResource {
    type Model = SecretModel;

    const TYPE_NAME: &'static str = "kubernetes_secret";

    fn schema(&self) -> Block {
        Block::new()
            .attr("metadata", metadata_schema(true))
            .attr(
                "binary_data",
                Attribute::string_map()
                    .optional()
                    .sensitive()
                    .description("A map of the secret data with values encoded in base64 format"),
            )
            .attr(
                "data",
                Attribute::string_map()
                    .optional()
                    .sensitive()
                    .description("A map of the secret data"),
            )
            .attr(
                "immutable",
                Attribute::bool()
                    .optional()
                    .description("Ensures that data stored in the secret cannot be updated"),
            )
            .attr(
                "type",
                Attribute::string()
                    .optional()
                    .default("Opaque")
                    .force_new()
                    .description("Type of secret"),
            )
            .attr(
                "wait_for_service_account_token",
                Attribute::bool()
                    .optional()
                    .default(true)
                    .description("Wait for the service account token to be created"),
            )
    }

    #[instrument(skip_all)]
    async fn create(&self, meta: &dyn KubeClientsets, data: &ResourceData<SecretModel>) -> Result<String> {
        let namespace = namespace_or_default(meta, &data.planned.metadata);
        let mut secret = expand_secret(&data.planned)?;
        secret.metadata.namespace = Some(namespace.clone());

        info!("Creating new secret: {:?}", secret.metadata.name);
        let api: Api<Secret> = Api::namespaced(meta.main_clientset()?, &namespace);
        let out = api
            .create(&PostParams::default(), &secret)
            .await
            .map_err(|e| ProviderError::api("Failed to create secret", e))?;
        let name = out.metadata.name.clone().unwrap_or_default();

        if data.planned.type_ == TOKEN_SECRET_TYPE && data.planned.wait_for_service_account_token {
            info!("Waiting for secret {} to be populated with a token", name);
            let waited = retry(data.timeouts.create, meta.poll_interval(), || async {
                let secret = api
                    .get(&name)
                    .await
                    .map_err(|e| ProviderError::api("Failed to read secret", e))?;
                let has_token = secret
                    .data
                    .as_ref()
                    .and_then(|d| d.get("token"))
                    .is_some_and(|t| !t.0.is_empty());
                if has_token {
                    Ok(())
                } else {
                    Err(RetryError::pending(format!(
                        "Waiting for secret {} to be populated with a token",
                        name
                    )))
                }
            })
            .await;

            if let Err(e) = waited {
                let events =
                    object_warnings(&meta.main_clientset()?, Some(&namespace), "Secret", &name).await;
                return Err(with_events(e, events));
            }
        }

        Ok(build_id(&out.metadata))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn read(&self, meta: &dyn KubeClientsets, data: &ResourceData<SecretModel>) -> Result<Option<SecretModel>> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Secret> = Api::namespaced(meta.main_clientset()?, &namespace);

        get_object(&api, &name)
            .await?
            .map(|s| flatten_secret(&s, &data.planned))
            .transpose()
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn update(&self, meta: &dyn KubeClientsets, data: &ResourceData<SecretModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let prior = data.prior.clone().unwrap_or_default();
        let ops = patch_secret(&prior, &data.planned)?;
        if ops.is_empty() {
            return Ok(());
        }

        let api: Api<Secret> = Api::namespaced(meta.main_clientset()?, &namespace);
        api.patch(&name, &PatchParams::default(), &ops.to_patch()?)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to update secret {}", data.id), e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn delete(&self, meta: &dyn KubeClientsets, data: &ResourceData<SecretModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Secret> = Api::namespaced(meta.main_clientset()?, &namespace);
        delete_object(&api, &name, &DeleteParams::default()).await
    }

    async fn exists(&self, meta: &dyn KubeClientsets, data: &ResourceData<SecretModel>) -> Result<bool> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<Secret> = Api::namespaced(meta.main_clientset()?, &namespace);
        object_exists(&api, &name).await
    }
}
