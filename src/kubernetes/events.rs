// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Warning event lookup used to explain failed waits

use crate::constants::wait::MAX_WARNING_EVENTS;
use crate::error::{ProviderError, Result};
use k8s_openapi::api::core::v1::Event;
use kube::{api::ListParams, Api, Client};
use tracing::{debug, instrument, warn};

/// Most recent warning events for one object, newest first, formatted as `reason: message`
#[instrument(skip(client))]
pub async fn recent_warnings(
    client: &Client,
    namespace: Option<&str>,
    kind: &str,
    name: &str,
) -> Result<Vec<String>> {
    let events: Api<Event> = match namespace {
        Some(ns) => Api::namespaced(client.clone(), ns),
        None => Api::all(client.clone()),
    };

    let selector = format!(
        "involvedObject.kind={},involvedObject.name={},type=Warning",
        kind, name
    );
    let list = events
        .list(&ListParams::default().fields(&selector))
        .await
        .map_err(|e| ProviderError::api(format!("Failed to list events for {}", name), e))?;

    debug!("Found {} warning events for {} {}", list.items.len(), kind, name);

    Ok(newest_warnings(list.items))
}

/// Like [`recent_warnings`], but lookup failures only get logged
pub async fn object_warnings(
    client: &Client,
    namespace: Option<&str>,
    kind: &str,
    name: &str,
) -> Vec<String> {
    match recent_warnings(client, namespace, kind, name).await {
        Ok(events) => events,
        Err(e) => {
            warn!("Could not fetch events for {} {}: {}", kind, name, e);
            Vec::new()
        }
    }
}

fn newest_warnings(mut items: Vec<Event>) -> Vec<String> {
    items.retain(|e| e.type_.as_deref() == Some("Warning"));
    items.sort_by_key(|e| {
        std::cmp::Reverse(
            e.last_timestamp
                .as_ref()
                .map(|t| t.0)
                .or_else(|| e.event_time.as_ref().map(|t| t.0)),
        )
    });

    items
        .into_iter()
        .take(MAX_WARNING_EVENTS)
        .map(|e| {
            format!(
                "{}: {}",
                e.reason.unwrap_or_default(),
                e.message.unwrap_or_default()
            )
        })
        .collect()
}
