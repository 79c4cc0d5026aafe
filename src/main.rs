// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use kubernetes_provider::config::Config;
use kubernetes_provider::kubernetes::{create_client, ProviderMeta};
use kubernetes_provider::provider::{Provider, Request, Response};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the response, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("Failed to read request from stdin")?;
    let request: Request = serde_json::from_str(&input).context("Failed to parse request")?;
    info!(
        "Handling {} for {:?}",
        request.operation, request.resource_type
    );

    let provider = Provider::new();
    let response = if request.operation.needs_cluster() {
        let config = Config::from_env()?;
        debug!("Configuration loaded: default_namespace={}", config.default_namespace);

        let client = create_client(&config)
            .await
            .context("Failed to create Kubernetes client")?;
        let meta = ProviderMeta::new(client, config);
        provider.handle(&meta, request).await
    } else {
        provider.handle_offline(request)
    };

    let mut out = serde_json::to_vec(&response).context("Failed to encode response")?;
    out.push(b'\n');
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&out).await.context("Failed to write response")?;
    stdout.flush().await?;

    ensure_success(&response)
}

/// Turn error diagnostics into a failing exit status once the response is written
fn ensure_success(response: &Response) -> Result<()> {
    if response.has_errors() {
        anyhow::bail!(
            "Request failed with {} diagnostic(s)",
            response.diagnostics.len()
        );
    }
    Ok(())
}
