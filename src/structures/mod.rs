// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Expand/flatten helpers shared by several resources.

pub mod label_selector;
pub mod metadata;
pub mod persistent_volume_claim;
pub mod pod_spec;

use crate::constants::metadata::INTERNAL_KEY_SEGMENTS;
use crate::error::{ProviderError, Result};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use k8s_openapi::ByteString;
use serde_json::Value;
use std::collections::BTreeMap;

/// Terraform ID for a namespaced object: `<namespace>/<name>`
pub fn build_id(meta: &ObjectMeta) -> String {
    format!(
        "{}/{}",
        meta.namespace.as_deref().unwrap_or_default(),
        meta.name.as_deref().unwrap_or_default()
    )
}

/// Split a `<namespace>/<name>` ID
pub fn id_parts(id: &str) -> Result<(String, String)> {
    match id.split('/').collect::<Vec<_>>().as_slice() {
        [namespace, name] if !namespace.is_empty() && !name.is_empty() => {
            Ok((namespace.to_string(), name.to_string()))
        }
        _ => Err(ProviderError::InvalidId(id.to_string())),
    }
}

pub fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

pub fn non_zero_i32(n: i32) -> Option<i32> {
    (n != 0).then_some(n)
}

pub fn non_zero_i64(n: i64) -> Option<i64> {
    (n != 0).then_some(n)
}

pub fn non_empty_map(m: &BTreeMap<String, String>) -> Option<BTreeMap<String, String>> {
    (!m.is_empty()).then(|| m.clone())
}

pub fn non_empty_vec<T: Clone>(v: &[T]) -> Option<Vec<T>> {
    (!v.is_empty()).then(|| v.to_vec())
}

pub fn ptr_to_string(s: &Option<String>) -> String {
    s.clone().unwrap_or_default()
}

pub fn ptr_to_bool(b: Option<bool>) -> bool {
    b.unwrap_or_default()
}

pub fn ptr_to_i32(n: Option<i32>) -> i32 {
    n.unwrap_or_default()
}

pub fn ptr_to_i64(n: Option<i64>) -> i64 {
    n.unwrap_or_default()
}

/// "8080" becomes a port number, anything else a named port
pub fn expand_int_or_string(s: &str) -> Option<IntOrString> {
    if s.is_empty() {
        return None;
    }
    Some(match s.parse::<i32>() {
        Ok(n) => IntOrString::Int(n),
        Err(_) => IntOrString::String(s.to_string()),
    })
}

pub fn flatten_int_or_string(v: &Option<IntOrString>) -> String {
    match v {
        Some(IntOrString::Int(n)) => n.to_string(),
        Some(IntOrString::String(s)) => s.clone(),
        None => String::new(),
    }
}

/// Keys owned by Kubernetes, such as `kubectl.kubernetes.io/last-applied-configuration`
pub fn is_internal_key(key: &str) -> bool {
    INTERNAL_KEY_SEGMENTS.iter().any(|seg| key.contains(seg))
}

/// Drop internal keys the user did not configure themselves
pub fn remove_internal_keys(
    observed: &BTreeMap<String, String>,
    configured: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    observed
        .iter()
        .filter(|(k, _)| !is_internal_key(k) || configured.contains_key(*k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

pub fn expand_quantities(m: &BTreeMap<String, String>) -> Option<BTreeMap<String, Quantity>> {
    (!m.is_empty()).then(|| {
        m.iter()
            .map(|(k, v)| (k.clone(), Quantity(v.clone())))
            .collect()
    })
}

pub fn flatten_quantities(m: &Option<BTreeMap<String, Quantity>>) -> BTreeMap<String, String> {
    m.iter()
        .flatten()
        .map(|(k, v)| (k.clone(), v.0.clone()))
        .collect()
}

/// Base64 encoded values, decoded into raw bytes
pub fn expand_base64_map(
    m: &BTreeMap<String, String>,
) -> Result<Option<BTreeMap<String, ByteString>>> {
    if m.is_empty() {
        return Ok(None);
    }
    m.iter()
        .map(|(k, v)| Ok((k.clone(), serde_json::from_value(Value::String(v.clone()))?)))
        .collect::<Result<_>>()
        .map(Some)
}

pub fn flatten_base64_map(
    m: &Option<BTreeMap<String, ByteString>>,
) -> Result<BTreeMap<String, String>> {
    m.iter()
        .flatten()
        .map(|(k, v)| Ok((k.clone(), serde_json::from_value(serde_json::to_value(v)?)?)))
        .collect()
}

/// Octal file mode string, e.g. "0644"
pub fn expand_file_mode(s: &str) -> Option<i32> {
    i32::from_str_radix(s, 8).ok()
}

pub fn flatten_file_mode(mode: Option<i32>) -> String {
    mode.map(|m| format!("{:04o}", m)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_parts() {
        assert_eq!(
            id_parts("default/myname").unwrap(),
            ("default".to_string(), "myname".to_string())
        );
        assert!(id_parts("badformat").is_err());
        assert!(id_parts("a/b/c").is_err());
        assert!(id_parts("/name").is_err());
    }

    #[test]
    fn test_build_id() {
        let meta = ObjectMeta {
            namespace: Some("ns".to_string()),
            name: Some("n".to_string()),
            ..Default::default()
        };
        assert_eq!(build_id(&meta), "ns/n");
    }

    #[test]
    fn test_int_or_string() {
        assert_eq!(expand_int_or_string("8080"), Some(IntOrString::Int(8080)));
        assert_eq!(
            expand_int_or_string("http"),
            Some(IntOrString::String("http".to_string()))
        );
        assert_eq!(expand_int_or_string(""), None);
        assert_eq!(flatten_int_or_string(&Some(IntOrString::Int(80))), "80");
        assert_eq!(flatten_int_or_string(&None), "");
    }

    #[test]
    fn test_remove_internal_keys_keeps_configured() {
        let observed = BTreeMap::from([
            ("app".to_string(), "web".to_string()),
            (
                "kubectl.kubernetes.io/last-applied-configuration".to_string(),
                "{}".to_string(),
            ),
            ("app.kubernetes.io/name".to_string(), "web".to_string()),
        ]);
        let configured = BTreeMap::from([("app.kubernetes.io/name".to_string(), "web".to_string())]);

        let kept = remove_internal_keys(&observed, &configured);
        assert_eq!(kept.len(), 2);
        assert!(kept.contains_key("app"));
        assert!(kept.contains_key("app.kubernetes.io/name"));
    }

    #[test]
    fn test_base64_map() {
        let m = BTreeMap::from([("bin".to_string(), "aGVsbG8=".to_string())]);
        let expanded = expand_base64_map(&m).unwrap();
        assert_eq!(expanded.as_ref().unwrap()["bin"], ByteString(b"hello".to_vec()));
        assert_eq!(flatten_base64_map(&expanded).unwrap(), m);

        assert!(expand_base64_map(&BTreeMap::new()).unwrap().is_none());
        let bad = BTreeMap::from([("bin".to_string(), "%%%".to_string())]);
        assert!(expand_base64_map(&bad).is_err());
    }

    #[test]
    fn test_file_mode() {
        assert_eq!(expand_file_mode("0644"), Some(420));
        assert_eq!(flatten_file_mode(Some(420)), "0644");
        assert_eq!(flatten_file_mode(None), "");
    }

    #[test]
    fn test_flatten_file_mode_pads_to_four_digits() {
        assert_eq!(flatten_file_mode(Some(0)), "0000");
        assert_eq!(flatten_file_mode(Some(0o400)), "0400");
        assert_eq!(flatten_file_mode(Some(0o4755)), "4755");
        assert_eq!(expand_file_mode(&flatten_file_mode(Some(0))), Some(0));
    }
}
