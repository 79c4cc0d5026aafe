// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Annotation and label handling
pub mod metadata {
    /// Keys containing one of these segments are managed by Kubernetes itself
    pub const INTERNAL_KEY_SEGMENTS: &[&str] = &["kubernetes.io/", "k8s.io/"];
}

/// Service account token volumes injected by the API server
pub mod service_account {
    pub const VOLUME_PREFIXES: &[&str] = &["kube-api-access-", "default-token-"];
    pub const MOUNT_PATH: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
    pub const TOKEN_SECRET_TYPE: &str = "kubernetes.io/service-account-token";
}

/// Wait loop configuration
pub mod wait {
    /// Fixed polling interval in seconds for status waits
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Fixed polling interval in seconds when waiting for an object to disappear
    pub const DELETE_POLL_INTERVAL_SECS: u64 = 5;
    /// Number of warning events attached to a timed out wait
    pub const MAX_WARNING_EVENTS: usize = 3;
}

/// Default operation timeouts in seconds
pub mod timeouts {
    pub const CREATE_SECS: u64 = 20 * 60;
    pub const READ_SECS: u64 = 5 * 60;
    pub const UPDATE_SECS: u64 = 20 * 60;
    pub const DELETE_SECS: u64 = 5 * 60;
}
