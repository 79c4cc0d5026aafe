// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::wait::{DELETE_POLL_INTERVAL_SECS, POLL_INTERVAL_SECS};
use crate::error::{ProviderError, Result as ProviderResult};
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Provider configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Kubeconfig file to load, falls back to the inferred config when unset
    pub config_path: Option<String>,
    /// Context to select from the kubeconfig
    pub config_context: Option<String>,
    /// Namespace used when a resource's metadata does not set one
    pub default_namespace: String,
    pub poll_interval: Duration,
    pub delete_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            config_path: None,
            config_context: None,
            default_namespace: "default".to_string(),
            poll_interval: Duration::from_secs(POLL_INTERVAL_SECS),
            delete_poll_interval: Duration::from_secs(DELETE_POLL_INTERVAL_SECS),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config_path = env::var("KUBE_CONFIG_PATH").ok().filter(|s| !s.is_empty());
        let config_context = env::var("KUBE_CTX").ok().filter(|s| !s.is_empty());
        let default_namespace =
            env::var("KUBE_NAMESPACE").unwrap_or_else(|_| "default".to_string());

        let poll_interval = match env::var("KUBE_POLL_INTERVAL_SECS") {
            Ok(v) => Duration::from_secs(
                v.parse()
                    .context("KUBE_POLL_INTERVAL_SECS must be a number of seconds")?,
            ),
            Err(_) => Duration::from_secs(POLL_INTERVAL_SECS),
        };

        Ok(Config {
            config_path,
            config_context,
            default_namespace,
            poll_interval,
            delete_poll_interval: poll_interval.min(Duration::from_secs(DELETE_POLL_INTERVAL_SECS)),
        })
    }
}

/// Parse a timeout such as "30s", "5m", "1h" or "1h30m"
pub fn parse_duration(input: &str) -> ProviderResult<Duration> {
    let invalid = || ProviderError::InvalidTimeout(input.to_string());
    let mut total = 0u64;
    let mut digits = String::new();

    for c in input.trim().chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let n: u64 = digits.parse().map_err(|_| invalid())?;
        digits.clear();
        total += match c {
            's' => n,
            'm' => n * 60,
            'h' => n * 3600,
            _ => return Err(invalid()),
        };
    }

    if !digits.is_empty() || total == 0 {
        return Err(invalid());
    }

    Ok(Duration::from_secs(total))
}
