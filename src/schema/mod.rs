// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Attribute schemas: the user-facing contract of every resource.
//!
//! A [`Block`] declares the attributes of one nesting level. Configuration
//! arrives as a `serde_json::Value` and is checked against the block before
//! any handler runs, defaults are filled in, and attributes flagged
//! `force_new` decide whether a change needs replacement.

pub mod blocks;
pub mod validation;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

pub use validation::Validator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    String,
    Int,
    Bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Elem {
    Scalar(ScalarType),
    Block(Block),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Scalar(ScalarType),
    /// Map of string to string
    Map,
    List(Elem),
    Set(Elem),
}

#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub description: &'static str,
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub optional: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub computed: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub force_new: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator: Option<Validator>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Attribute {
    fn new(value_type: ValueType) -> Self {
        Attribute {
            value_type,
            description: "",
            required: false,
            optional: false,
            computed: false,
            force_new: false,
            sensitive: false,
            max_items: None,
            min_items: None,
            default: None,
            validator: None,
        }
    }

    pub fn string() -> Self {
        Self::new(ValueType::Scalar(ScalarType::String))
    }

    pub fn int() -> Self {
        Self::new(ValueType::Scalar(ScalarType::Int))
    }

    pub fn bool() -> Self {
        Self::new(ValueType::Scalar(ScalarType::Bool))
    }

    pub fn string_map() -> Self {
        Self::new(ValueType::Map)
    }

    pub fn string_list() -> Self {
        Self::new(ValueType::List(Elem::Scalar(ScalarType::String)))
    }

    pub fn string_set() -> Self {
        Self::new(ValueType::Set(Elem::Scalar(ScalarType::String)))
    }

    pub fn block_list(block: Block) -> Self {
        Self::new(ValueType::List(Elem::Block(block)))
    }

    /// A nested block that appears at most once
    pub fn single_block(block: Block) -> Self {
        Self::block_list(block).max_items(1)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = Some(n);
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        self.min_items = Some(n);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    fn nested_block(&self) -> Option<&Block> {
        match &self.value_type {
            ValueType::List(Elem::Block(b)) | ValueType::Set(Elem::Block(b)) => Some(b),
            _ => None,
        }
    }

    /// Attributes only the server sets
    fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// One level of attributes
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Block {
    pub attributes: BTreeMap<&'static str, Attribute>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &'static str, attribute: Attribute) -> Self {
        self.attributes.insert(name, attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Check a configuration value against this block
    pub fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        self.validate_at("", config, &mut diags);
        diags
    }

    fn validate_at(&self, prefix: &str, value: &Value, diags: &mut Vec<Diagnostic>) {
        let Some(obj) = value.as_object() else {
            diags.push(Diagnostic::error(prefix, "expected a block"));
            return;
        };

        for key in obj.keys() {
            if !self.attributes.contains_key(key.as_str()) {
                diags.push(Diagnostic::error(
                    &join_path(prefix, key),
                    "unsupported argument",
                ));
            }
        }

        for (name, attr) in &self.attributes {
            let path = join_path(prefix, name);
            let value = obj.get(*name).filter(|v| !v.is_null());

            let Some(value) = value else {
                if attr.required {
                    diags.push(Diagnostic::error(&path, "attribute is required"));
                }
                continue;
            };

            if attr.is_computed_only() {
                diags.push(Diagnostic::error(
                    &path,
                    "value for unconfigurable attribute",
                ));
                continue;
            }

            validate_value(&path, attr, value, diags);
        }
    }

    /// Fill in declared defaults for attributes absent from the value
    pub fn apply_defaults(&self, value: &mut Value) {
        let Some(obj) = value.as_object_mut() else {
            return;
        };

        for (name, attr) in &self.attributes {
            let absent = obj.get(*name).map_or(true, Value::is_null);
            if absent {
                if let Some(default) = &attr.default {
                    obj.insert(name.to_string(), default.clone());
                }
                continue;
            }

            if let (Some(block), Some(Value::Array(items))) =
                (attr.nested_block(), obj.get_mut(*name))
            {
                for item in items {
                    block.apply_defaults(item);
                }
            }
        }
    }

    /// Carry prior values of computed attributes the configuration leaves unset,
    /// so server-assigned fields survive into the planned state
    pub fn merge_computed(&self, prior: &Value, planned: &mut Value) {
        let (Some(prior), Some(obj)) = (prior.as_object(), planned.as_object_mut()) else {
            return;
        };

        for (name, attr) in &self.attributes {
            let Some(prior_value) = prior.get(*name).filter(|v| !v.is_null()) else {
                continue;
            };

            let absent = obj.get(*name).map_or(true, Value::is_null);
            if absent {
                if attr.computed {
                    obj.insert(name.to_string(), prior_value.clone());
                }
                continue;
            }

            if let (Some(block), Some(Value::Array(items)), Some(prior_items)) =
                (attr.nested_block(), obj.get_mut(*name), prior_value.as_array())
            {
                for (item, prior_item) in items.iter_mut().zip(prior_items) {
                    block.merge_computed(prior_item, item);
                }
            }
        }
    }

    /// Paths of `force_new` attributes whose value differs between the two states
    pub fn requires_replace(&self, old: &Value, new: &Value) -> Vec<String> {
        let mut paths = Vec::new();
        self.requires_replace_at("", old, new, &mut paths);
        paths
    }

    fn requires_replace_at(&self, prefix: &str, old: &Value, new: &Value, out: &mut Vec<String>) {
        for (name, attr) in &self.attributes {
            let path = join_path(prefix, name);
            let old_value = old.get(*name).unwrap_or(&Value::Null);
            let new_value = new.get(*name).unwrap_or(&Value::Null);

            if attr.computed && is_empty_value(new_value) {
                continue;
            }

            if attr.force_new {
                if !values_equal(old_value, new_value) {
                    out.push(path);
                }
                continue;
            }

            let Some(block) = attr.nested_block() else {
                continue;
            };
            let old_items = old_value.as_array().map(Vec::as_slice).unwrap_or_default();
            let new_items = new_value.as_array().map(Vec::as_slice).unwrap_or_default();

            if old_items.len() != new_items.len() {
                if block.has_force_new() {
                    out.push(path);
                }
                continue;
            }

            for (i, (o, n)) in old_items.iter().zip(new_items).enumerate() {
                block.requires_replace_at(&format!("{}.{}", path, i), o, n, out);
            }
        }
    }

    fn has_force_new(&self) -> bool {
        self.attributes.values().any(|a| {
            a.force_new || a.nested_block().is_some_and(Block::has_force_new)
        })
    }
}

fn validate_value(path: &str, attr: &Attribute, value: &Value, diags: &mut Vec<Diagnostic>) {
    match &attr.value_type {
        ValueType::Scalar(t) => {
            if !scalar_matches(*t, value) {
                diags.push(Diagnostic::error(path, format!("expected {:?}", t).to_lowercase()));
                return;
            }
            if let Some(v) = &attr.validator {
                if let Err(msg) = v.check(value) {
                    diags.push(Diagnostic::error(path, msg));
                }
            }
        }
        ValueType::Map => {
            let Some(map) = value.as_object() else {
                diags.push(Diagnostic::error(path, "expected a map of strings"));
                return;
            };
            for (k, v) in map {
                if !v.is_string() {
                    diags.push(Diagnostic::error(&join_path(path, k), "expected string"));
                }
            }
        }
        ValueType::List(elem) | ValueType::Set(elem) => {
            let Some(items) = value.as_array() else {
                diags.push(Diagnostic::error(path, "expected a list"));
                return;
            };
            if let Some(max) = attr.max_items {
                if items.len() > max {
                    diags.push(Diagnostic::error(
                        path,
                        format!("at most {} item(s) allowed, got {}", max, items.len()),
                    ));
                }
            }
            if let Some(min) = attr.min_items {
                if items.len() < min {
                    diags.push(Diagnostic::error(
                        path,
                        format!("at least {} item(s) required, got {}", min, items.len()),
                    ));
                }
            }
            for (i, item) in items.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                match elem {
                    Elem::Block(block) => block.validate_at(&item_path, item, diags),
                    Elem::Scalar(t) => {
                        if !scalar_matches(*t, item) {
                            diags.push(Diagnostic::error(
                                &item_path,
                                format!("expected {:?}", t).to_lowercase(),
                            ));
                        } else if let Some(v) = &attr.validator {
                            if let Err(msg) = v.check(item) {
                                diags.push(Diagnostic::error(&item_path, msg));
                            }
                        }
                    }
                }
            }
        }
    }
}

fn scalar_matches(t: ScalarType, value: &Value) -> bool {
    match t {
        ScalarType::String => value.is_string(),
        ScalarType::Int => value.is_i64() || value.is_u64(),
        ScalarType::Bool => value.is_boolean(),
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Equality that treats unset and empty values alike
fn values_equal(a: &Value, b: &Value) -> bool {
    if is_empty_value(a) && is_empty_value(b) {
        return true;
    }
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => {
            let keys: std::collections::BTreeSet<&String> = x.keys().chain(y.keys()).collect();
            keys.into_iter().all(|k| {
                values_equal(x.get(k).unwrap_or(&Value::Null), y.get(k).unwrap_or(&Value::Null))
            })
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        _ => a == b,
    }
}

/// Remove null entries so absent and null attributes deserialize identically
pub fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(obj) => Value::Object(
            obj.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect::<Map<String, Value>>(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    pub fn error(attribute: &str, summary: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            summary: summary.into(),
            detail: None,
            attribute: (!attribute.is_empty()).then(|| attribute.to_string()),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.attribute {
            Some(attr) => write!(f, "{}: {}", attr, self.summary),
            None => f.write_str(&self.summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn port_block() -> Block {
        Block::new()
            .attr("name", Attribute::string().optional())
            .attr(
                "port",
                Attribute::int().required().validate(Validator::PortNumber),
            )
            .attr(
                "protocol",
                Attribute::string()
                    .optional()
                    .default("TCP")
                    .validate(Validator::OneOf(&["TCP", "UDP", "SCTP"])),
            )
    }

    fn service_block() -> Block {
        Block::new()
            .attr("name", Attribute::string().required().force_new())
            .attr("uid", Attribute::string().computed())
            .attr("labels", Attribute::string_map().optional())
            .attr("port", Attribute::block_list(port_block()).optional().min_items(1))
            .attr(
                "spec",
                Attribute::single_block(
                    Block::new().attr("cluster_ip", Attribute::string().optional().computed().force_new()),
                )
                .optional(),
            )
    }

    #[test]
    fn test_validate_accepts_valid_config() {
        let config = json!({
            "name": "web",
            "labels": {"app": "web"},
            "port": [{"port": 80, "protocol": "UDP"}]
        });
        assert!(service_block().validate(&config).is_empty());
    }

    #[test]
    fn test_validate_reports_missing_required() {
        let diags = service_block().validate(&json!({"port": [{"protocol": "TCP"}]}));
        let attrs: Vec<_> = diags.iter().filter_map(|d| d.attribute.clone()).collect();
        assert!(attrs.contains(&"name".to_string()));
        assert!(attrs.contains(&"port.0.port".to_string()));
    }

    #[test]
    fn test_validate_runs_validators() {
        let diags = service_block().validate(&json!({
            "name": "web",
            "port": [{"port": 70000, "protocol": "HTTP"}]
        }));
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn test_validate_rejects_unknown_and_computed_attributes() {
        let diags = service_block().validate(&json!({"name": "web", "uid": "x", "bogus": 1}));
        assert_eq!(diags.len(), 2);
        assert!(diags.iter().any(|d| d.summary == "unsupported argument"));
        assert!(diags
            .iter()
            .any(|d| d.summary == "value for unconfigurable attribute"));
    }

    #[test]
    fn test_validate_max_items() {
        let diags = service_block().validate(&json!({
            "name": "web",
            "spec": [{}, {}]
        }));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].attribute.as_deref(), Some("spec"));
    }

    #[test]
    fn test_apply_defaults_fills_nested_blocks() {
        let mut config = json!({"name": "web", "port": [{"port": 80}]});
        service_block().apply_defaults(&mut config);
        assert_eq!(config["port"][0]["protocol"], "TCP");
    }

    #[test]
    fn test_merge_computed_keeps_server_values() {
        let block = service_block();
        let prior = json!({
            "name": "web",
            "uid": "u-1",
            "labels": {"app": "web"},
            "port": [{"port": 80, "protocol": "TCP"}],
            "spec": [{"cluster_ip": "10.0.0.1"}]
        });
        let mut planned = json!({"name": "web", "port": [{"port": 8080}], "spec": [{}]});
        block.merge_computed(&prior, &mut planned);

        assert_eq!(planned["uid"], "u-1");
        assert_eq!(planned["spec"][0]["cluster_ip"], "10.0.0.1");
        // plain optional attributes stay as configured
        assert!(planned.get("labels").is_none());
        assert!(planned["port"][0].get("protocol").is_none());
        assert_eq!(planned["port"][0]["port"], 8080);
    }

    #[test]
    fn test_merge_computed_does_not_override_config() {
        let block = service_block();
        let prior = json!({"name": "web", "spec": [{"cluster_ip": "10.0.0.1"}]});
        let mut planned = json!({"name": "web", "spec": [{"cluster_ip": "None"}]});
        block.merge_computed(&prior, &mut planned);
        assert_eq!(planned["spec"][0]["cluster_ip"], "None");
    }

    #[test]
    fn test_requires_replace() {
        let block = service_block();
        let old = json!({"name": "web", "spec": [{"cluster_ip": "10.0.0.1"}]});

        assert!(block
            .requires_replace(&old, &json!({"name": "web", "spec": [{}]}))
            .is_empty());
        assert_eq!(
            block.requires_replace(&old, &json!({"name": "api", "spec": [{}]})),
            vec!["name".to_string()]
        );
        assert_eq!(
            block.requires_replace(&old, &json!({"name": "web", "spec": [{"cluster_ip": "10.0.0.2"}]})),
            vec!["spec.0.cluster_ip".to_string()]
        );
    }

    #[test]
    fn test_strip_nulls() {
        let v = strip_nulls(json!({"a": null, "b": [{"c": null, "d": 1}]}));
        assert_eq!(v, json!({"b": [{"d": 1}]}));
    }
}
