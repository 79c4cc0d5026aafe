// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Fixed-interval polling with a deadline.

use crate::error::{is_not_found, ProviderError, Result};
use kube::Api;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument};

/// Outcome of one poll attempt that did not succeed
#[derive(Debug)]
pub enum RetryError {
    /// Condition not reached yet, poll again
    Retryable(ProviderError),
    /// Stop polling and fail
    NonRetryable(ProviderError),
}

impl RetryError {
    pub fn pending(message: impl Into<String>) -> Self {
        RetryError::Retryable(ProviderError::Wait(message.into()))
    }
}

impl From<ProviderError> for RetryError {
    fn from(e: ProviderError) -> Self {
        RetryError::NonRetryable(e)
    }
}

/// Call `attempt` every `interval` until it succeeds, fails hard, or `timeout` elapses.
/// On timeout the last retryable error is returned.
pub async fn retry<T, F, Fut>(timeout: Duration, interval: Duration, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, RetryError>>,
{
    let deadline = Instant::now() + timeout;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(RetryError::NonRetryable(e)) => return Err(e),
            Err(RetryError::Retryable(e)) => {
                if Instant::now() + interval > deadline {
                    return Err(e);
                }
                debug!("{}, retrying in {:?}", e, interval);
                sleep(interval).await;
            }
        }
    }
}

/// Turn a timed out wait into a timeout error carrying diagnostic events
pub fn with_events(err: ProviderError, events: Vec<String>) -> ProviderError {
    match err {
        ProviderError::Wait(message) => ProviderError::Timeout { message, events },
        other => other,
    }
}

/// Poll until the named object is gone
#[instrument(skip(api))]
pub async fn wait_for_deletion<K>(
    api: &Api<K>,
    name: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<()>
where
    K: Clone + DeserializeOwned + Debug,
{
    retry(timeout, interval, || async {
        match api.get(name).await {
            Ok(_) => Err(RetryError::pending(format!(
                "Waiting for {} to be deleted",
                name
            ))),
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(RetryError::NonRetryable(ProviderError::api(
                format!("Failed to check deletion of {}", name),
                e,
            ))),
        }
    })
    .await
    .map_err(|e| with_events(e, Vec::new()))
}
