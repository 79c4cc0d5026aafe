// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::schema::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{context}: {source}")]
    Api {
        context: String,
        #[source]
        source: kube::Error,
    },

    #[error("Failed to parse kubeconfig: {0}")]
    KubeconfigError(String),

    #[error("Unexpected ID format ({0:?}), expected namespace/name")]
    InvalidId(String),

    #[error("Failed to marshal JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unsupported resource type: {0}")]
    UnknownResource(String),

    #[error("Unsupported operation {operation} for {resource}")]
    UnsupportedOperation { resource: String, operation: String },

    #[error("Invalid configuration: {}", summarize(.0))]
    Validation(Vec<Diagnostic>),

    #[error("Request is missing {0}")]
    MissingInput(&'static str),

    #[error("Cannot import non-existent remote object {0:?}")]
    ImportNotFound(String),

    #[error("Invalid timeout {0:?}")]
    InvalidTimeout(String),

    #[error("{message}{}", format_events(.events))]
    Timeout { message: String, events: Vec<String> },

    #[error("{0}")]
    Wait(String),
}

impl ProviderError {
    /// Wrap a client error with the operation that produced it
    pub fn api(context: impl Into<String>, source: kube::Error) -> Self {
        ProviderError::Api {
            context: context.into(),
            source,
        }
    }
}

/// True when the client error is the API server's 404 status
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(resp) if resp.code == 404)
}

fn summarize(diags: &[Diagnostic]) -> String {
    diags
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_events(events: &[String]) -> String {
    if events.is_empty() {
        return String::new();
    }
    let mut out = String::from("\nLast warning events:");
    for e in events {
        out.push_str("\n  ");
        out.push_str(e);
    }
    out
}

pub type Result<T> = std::result::Result<T, ProviderError>;
