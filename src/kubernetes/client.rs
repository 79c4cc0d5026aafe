// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Client creation from the provider configuration

use crate::config::Config;
use crate::error::{ProviderError, Result};
use crate::kubernetes::KubeClientsets;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config as KConfig};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Client handles shared by every resource handler of one provider process
#[derive(Clone)]
pub struct ProviderMeta {
    client: Client,
    config: Config,
}

impl ProviderMeta {
    pub fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }
}

impl KubeClientsets for ProviderMeta {
    fn main_clientset(&self) -> Result<Client> {
        Ok(self.client.clone())
    }

    fn default_namespace(&self) -> &str {
        &self.config.default_namespace
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval
    }

    fn delete_poll_interval(&self) -> Duration {
        self.config.delete_poll_interval
    }
}

/// Create a Kubernetes client from the provider configuration
#[instrument(skip(config), fields(path = ?config.config_path, context = ?config.config_context))]
pub async fn create_client(config: &Config) -> Result<Client> {
    let options = KubeConfigOptions {
        context: config.config_context.clone(),
        ..Default::default()
    };

    let client_config = match &config.config_path {
        Some(path) => {
            info!("Loading kubeconfig from {}", path);
            let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                ProviderError::KubeconfigError(format!("Failed to read {}: {}", path, e))
            })?;
            config_from_kubeconfig(&raw, &options).await?
        }
        None if config.config_context.is_some() => {
            let kubeconfig = Kubeconfig::read().map_err(|e| {
                ProviderError::KubeconfigError(format!("Failed to read kubeconfig: {}", e))
            })?;
            KConfig::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| {
                    ProviderError::KubeconfigError(format!("Failed to create config: {}", e))
                })?
        }
        None => {
            debug!("No kubeconfig path configured, inferring config");
            KConfig::infer().await.map_err(|e| {
                ProviderError::KubeconfigError(format!("Failed to infer config: {}", e))
            })?
        }
    };

    Client::try_from(client_config)
        .map_err(|e| ProviderError::KubeconfigError(format!("Failed to create client: {}", e)))
}

/// Build a client config from a kubeconfig document
async fn config_from_kubeconfig(kubeconfig: &str, options: &KubeConfigOptions) -> Result<KConfig> {
    let kubeconfig_parsed: Kubeconfig = serde_yaml::from_str(kubeconfig)
        .map_err(|e| ProviderError::KubeconfigError(format!("Failed to parse kubeconfig: {}", e)))?;

    KConfig::from_custom_kubeconfig(kubeconfig_parsed, options)
        .await
        .map_err(|e| ProviderError::KubeconfigError(format!("Failed to create config: {}", e)))
}
