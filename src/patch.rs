// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! JSON-Patch (RFC 6902) operation lists used for in-place updates.

use crate::error::Result;
use kube::api::Patch;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add { path: String, value: Value },
    Replace { path: String, value: Value },
    Remove { path: String },
}

impl PatchOperation {
    pub fn path(&self) -> &str {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Replace { path, .. }
            | PatchOperation::Remove { path } => path,
        }
    }
}

/// Ordered list of operations sent as one `application/json-patch+json` request
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PatchOperations(Vec<PatchOperation>);

impl PatchOperations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: impl Into<String>, value: impl Serialize) -> Result<()> {
        self.0.push(PatchOperation::Add {
            path: path.into(),
            value: serde_json::to_value(value)?,
        });
        Ok(())
    }

    pub fn replace(&mut self, path: impl Into<String>, value: impl Serialize) -> Result<()> {
        self.0.push(PatchOperation::Replace {
            path: path.into(),
            value: serde_json::to_value(value)?,
        });
        Ok(())
    }

    pub fn remove(&mut self, path: impl Into<String>) {
        self.0.push(PatchOperation::Remove { path: path.into() });
    }

    /// `add` when the field was unset before, `remove` when it is unset now, `replace` otherwise
    pub fn set_optional<T: Serialize>(
        &mut self,
        path: &str,
        old: Option<&T>,
        new: Option<&T>,
    ) -> Result<()> {
        match (old, new) {
            (None, Some(v)) => self.add(path, v),
            (Some(_), None) => {
                self.remove(path);
                Ok(())
            }
            (Some(_), Some(v)) => self.replace(path, v),
            (None, None) => Ok(()),
        }
    }

    pub fn extend(&mut self, other: PatchOperations) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchOperation> {
        self.0.iter()
    }

    /// Convert into the request body kube sends with `Patch::Json`
    pub fn to_patch(&self) -> Result<Patch<()>> {
        let value = serde_json::to_value(self)?;
        Ok(Patch::Json(serde_json::from_value(value)?))
    }
}

/// Escape a map key for use as a JSON pointer segment
pub fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Diff two string maps into operations rooted at `path`
pub fn diff_string_map(
    path: &str,
    old: &BTreeMap<String, String>,
    new: &BTreeMap<String, String>,
) -> Result<PatchOperations> {
    let mut ops = PatchOperations::new();

    if old.is_empty() {
        if !new.is_empty() {
            ops.add(path, new)?;
        }
        return Ok(ops);
    }

    if new.is_empty() {
        ops.remove(path);
        return Ok(ops);
    }

    for key in old.keys() {
        if !new.contains_key(key) {
            ops.remove(format!("{}/{}", path, escape_pointer(key)));
        }
    }

    for (key, value) in new {
        let key_path = format!("{}/{}", path, escape_pointer(key));
        match old.get(key) {
            None => ops.add(key_path, value)?,
            Some(old_value) if old_value != value => ops.replace(key_path, value)?,
            Some(_) => {}
        }
    }

    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_diff_string_map_add_whole_map() {
        let ops = diff_string_map("/metadata/labels", &map(&[]), &map(&[("app", "web")])).unwrap();
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([{"op": "add", "path": "/metadata/labels", "value": {"app": "web"}}])
        );
    }

    #[test]
    fn test_diff_string_map_remove_whole_map() {
        let ops = diff_string_map("/metadata/labels", &map(&[("app", "web")]), &map(&[])).unwrap();
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([{"op": "remove", "path": "/metadata/labels"}])
        );
    }

    #[test]
    fn test_diff_string_map_per_key() {
        let old = map(&[("app", "web"), ("tier", "front"), ("gone", "x")]);
        let new = map(&[("app", "web"), ("tier", "back"), ("app.kubernetes.io/name", "w")]);
        let ops = diff_string_map("/metadata/labels", &old, &new).unwrap();
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([
                {"op": "remove", "path": "/metadata/labels/gone"},
                {"op": "add", "path": "/metadata/labels/app.kubernetes.io~1name", "value": "w"},
                {"op": "replace", "path": "/metadata/labels/tier", "value": "back"}
            ])
        );
    }

    #[test]
    fn test_diff_string_map_unchanged() {
        let m = map(&[("app", "web")]);
        assert!(diff_string_map("/data", &m, &m).unwrap().is_empty());
    }

    #[test]
    fn test_escape_pointer() {
        assert_eq!(escape_pointer("a/b~c"), "a~1b~0c");
    }

    #[test]
    fn test_set_optional() {
        let mut ops = PatchOperations::new();
        ops.set_optional("/spec/a", None, Some(&1)).unwrap();
        ops.set_optional("/spec/b", Some(&1), None).unwrap();
        ops.set_optional("/spec/c", Some(&1), Some(&2)).unwrap();
        ops.set_optional::<i32>("/spec/d", None, None).unwrap();
        let kinds: Vec<_> = ops
            .iter()
            .map(|op| match op {
                PatchOperation::Add { .. } => "add",
                PatchOperation::Replace { .. } => "replace",
                PatchOperation::Remove { .. } => "remove",
            })
            .collect();
        assert_eq!(kinds, vec!["add", "remove", "replace"]);
    }

    #[test]
    fn test_to_patch() {
        let mut ops = PatchOperations::new();
        ops.replace("/spec/replicas", 3).unwrap();
        assert!(matches!(ops.to_patch().unwrap(), Patch::Json(_)));
    }
}
