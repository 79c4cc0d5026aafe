// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking Kubernetes API responses.

use crate::config::Config;
use crate::kubernetes::ProviderMeta;
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::Service;

type Routes = HashMap<(String, String), VecDeque<(u16, String)>>;

/// A request seen by the mock, kept for assertions
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// A mock HTTP service that returns predefined responses based on request paths.
///
/// A route registered with several responses hands them out in order and keeps
/// repeating the last one.
#[derive(Clone)]
pub struct MockService {
    responses: Arc<Mutex<Routes>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockService {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn on(self, method: &str, path: &str, status: u16, body: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .entry((method.to_string(), path.to_string()))
            .or_default()
            .push_back((status, body.to_string()));
        self
    }

    /// Add a response for GET requests matching the path
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        self.on("GET", path, status, body)
    }

    /// Add a response for POST requests matching the path
    pub fn on_post(self, path: &str, status: u16, body: &str) -> Self {
        self.on("POST", path, status, body)
    }

    /// Add a response for PATCH requests matching the path
    pub fn on_patch(self, path: &str, status: u16, body: &str) -> Self {
        self.on("PATCH", path, status, body)
    }

    /// Add a response for DELETE requests matching the path
    pub fn on_delete(self, path: &str, status: u16, body: &str) -> Self {
        self.on("DELETE", path, status, body)
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests received so far with the given method
    pub fn requests_with_method(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    /// Build provider meta with fast polling around this mock service
    pub fn into_meta(self) -> ProviderMeta {
        let config = Config {
            poll_interval: Duration::from_millis(10),
            delete_poll_interval: Duration::from_millis(10),
            ..Config::default()
        };
        ProviderMeta::new(self.into_client(), config)
    }

    fn find_response(&self, method: &str, path: &str) -> Option<(u16, String)> {
        let mut responses = self.responses.lock().unwrap();

        let key = (method.to_string(), path.to_string());
        let key = if responses.contains_key(&key) {
            Some(key)
        } else {
            // Fall back to the longest registered prefix
            responses
                .keys()
                .filter(|(m, p)| m == method && path.starts_with(p.as_str()))
                .max_by_key(|(_, p)| p.len())
                .cloned()
        }?;

        let queue = responses.get_mut(&key)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let content_type = req
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let response = self.find_response(&method, &path);
        let requests = self.requests.clone();

        Box::pin(async move {
            let body = req
                .into_body()
                .collect()
                .await
                .map(|c| c.to_bytes())
                .unwrap_or_default();
            requests.lock().unwrap().push(RecordedRequest {
                method,
                path,
                content_type,
                body: String::from_utf8_lossy(&body).to_string(),
            });

            match response {
                Some((status, body)) => Ok(Response::builder()
                    .status(status)
                    .header("content-type", "application/json")
                    .body(Body::from(body.into_bytes()))
                    .unwrap()),
                None => {
                    // Default 404 for unmatched requests
                    let body = r#"{"kind":"Status","apiVersion":"v1","status":"Failure","message":"not found","reason":"NotFound","code":404}"#;
                    Ok(Response::builder()
                        .status(404)
                        .header("content-type", "application/json")
                        .body(Body::from(body.as_bytes().to_vec()))
                        .unwrap())
                }
            }
        })
    }
}

/// Create a 404 not found response
pub fn not_found_json(resource: &str, name: &str) -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": format!("{} \"{}\" not found", resource, name),
        "reason": "NotFound",
        "code": 404
    })
    .to_string()
}

/// Create a successful delete status response
pub fn status_success_json() -> String {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Success",
        "metadata": {}
    })
    .to_string()
}

/// Create an event list of warnings as `(reason, message, last_timestamp)`
pub fn event_list_json(events: &[(&str, &str, &str)]) -> String {
    let items: Vec<_> = events
        .iter()
        .enumerate()
        .map(|(i, (reason, message, ts))| {
            serde_json::json!({
                "metadata": {"name": format!("event-{}", i), "namespace": "default"},
                "involvedObject": {"kind": "Pod", "name": "web"},
                "reason": reason,
                "message": message,
                "type": "Warning",
                "lastTimestamp": ts
            })
        })
        .collect();

    serde_json::json!({
        "apiVersion": "v1",
        "kind": "EventList",
        "metadata": {},
        "items": items
    })
    .to_string()
}
