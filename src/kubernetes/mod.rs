// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes client access and cluster diagnostics.

pub mod client;
pub mod events;

pub use client::{create_client, ProviderMeta};
pub use events::{object_warnings, recent_warnings};

use crate::error::Result;
use kube::Client;

/// The client handles a resource handler may use
pub trait KubeClientsets: Send + Sync {
    /// Client for the core and built-in API groups
    fn main_clientset(&self) -> Result<Client>;

    /// Namespace applied to metadata that does not set one
    fn default_namespace(&self) -> &str;

    /// Interval between status polls in wait loops
    fn poll_interval(&self) -> std::time::Duration;

    /// Interval between polls while waiting for deletion
    fn delete_poll_interval(&self) -> std::time::Duration;
}
