// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Object metadata: schema, expand, flatten and patch.

use crate::error::Result;
use crate::patch::{diff_string_map, PatchOperations};
use crate::schema::{Attribute, Block, Validator};
use crate::structures::{non_empty, non_empty_map, ptr_to_i64, ptr_to_string, remove_internal_keys};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct MetadataModel {
    pub annotations: BTreeMap<String, String>,
    pub generate_name: String,
    pub generation: i64,
    pub labels: BTreeMap<String, String>,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub resource_version: String,
    pub uid: String,
}

fn common_attributes() -> Block {
    Block::new()
        .attr(
            "annotations",
            Attribute::string_map()
                .optional()
                .description("An unstructured key value map stored with the object"),
        )
        .attr(
            "labels",
            Attribute::string_map()
                .optional()
                .description("Map of string keys and values used to organize and select objects"),
        )
        .attr(
            "generation",
            Attribute::int()
                .computed()
                .description("A sequence number representing a specific generation of the desired state"),
        )
        .attr(
            "resource_version",
            Attribute::string()
                .computed()
                .description("An opaque value that represents the internal version of this object"),
        )
        .attr(
            "uid",
            Attribute::string()
                .computed()
                .description("The unique in time and space value for this object"),
        )
}

/// Metadata block for a top-level object
pub fn metadata_schema(namespaced: bool) -> Attribute {
    let mut block = common_attributes()
        .attr(
            "name",
            Attribute::string()
                .optional()
                .computed()
                .force_new()
                .validate(Validator::DnsSubdomain)
                .description("Name of the object, must be unique within its scope"),
        )
        .attr(
            "generate_name",
            Attribute::string()
                .optional()
                .force_new()
                .validate(Validator::DnsSubdomain)
                .description("Prefix used by the server to generate a unique name when name is not set"),
        );

    if namespaced {
        block = block.attr(
            "namespace",
            Attribute::string()
                .optional()
                .computed()
                .force_new()
                .validate(Validator::DnsLabel)
                .description("Namespace defines the space within which the name must be unique"),
        );
    }

    Attribute::single_block(block)
        .required()
        .description("Standard object metadata")
}

/// Metadata block of a pod template, which can change in place
pub fn template_metadata_schema() -> Attribute {
    let block = common_attributes()
        .attr("name", Attribute::string().optional().computed())
        .attr("generate_name", Attribute::string().optional());

    Attribute::single_block(block)
        .optional()
        .computed()
        .description("Standard metadata of the pods created from this template")
}

pub fn expand_metadata(m: &MetadataModel) -> ObjectMeta {
    ObjectMeta {
        annotations: non_empty_map(&m.annotations),
        labels: non_empty_map(&m.labels),
        name: non_empty(&m.name),
        generate_name: non_empty(&m.generate_name),
        namespace: non_empty(&m.namespace),
        ..Default::default()
    }
}

/// Flatten server metadata, dropping Kubernetes-owned keys the user did not set
pub fn flatten_metadata(meta: &ObjectMeta, configured: &MetadataModel) -> MetadataModel {
    MetadataModel {
        annotations: remove_internal_keys(
            &meta.annotations.clone().unwrap_or_default(),
            &configured.annotations,
        ),
        labels: remove_internal_keys(&meta.labels.clone().unwrap_or_default(), &configured.labels),
        generate_name: ptr_to_string(&meta.generate_name),
        generation: ptr_to_i64(meta.generation),
        name: ptr_to_string(&meta.name),
        namespace: ptr_to_string(&meta.namespace),
        resource_version: ptr_to_string(&meta.resource_version),
        uid: ptr_to_string(&meta.uid),
    }
}

/// Patch labels and annotations under `prefix`, e.g. "/metadata/"
pub fn patch_metadata(
    prefix: &str,
    old: &MetadataModel,
    new: &MetadataModel,
) -> Result<PatchOperations> {
    let mut ops = PatchOperations::new();
    if old.annotations != new.annotations {
        ops.extend(diff_string_map(
            &format!("{}annotations", prefix),
            &old.annotations,
            &new.annotations,
        )?);
    }
    if old.labels != new.labels {
        ops.extend(diff_string_map(
            &format!("{}labels", prefix),
            &old.labels,
            &new.labels,
        )?);
    }
    Ok(ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> MetadataModel {
        MetadataModel {
            name: "web".to_string(),
            namespace: "prod".to_string(),
            labels: BTreeMap::from([("app".to_string(), "web".to_string())]),
            ..Default::default()
        }
    }

    #[test]
    fn test_expand_metadata_leaves_empty_fields_unset() {
        let meta = expand_metadata(&model());
        assert_eq!(meta.name.as_deref(), Some("web"));
        assert_eq!(meta.namespace.as_deref(), Some("prod"));
        assert!(meta.annotations.is_none());
        assert!(meta.generate_name.is_none());
    }

    #[test]
    fn test_flatten_metadata_round_trip() {
        let m = model();
        assert_eq!(flatten_metadata(&expand_metadata(&m), &m), m);
    }

    #[test]
    fn test_flatten_metadata_filters_internal_annotations() {
        let meta = ObjectMeta {
            name: Some("web".to_string()),
            annotations: Some(BTreeMap::from([
                ("deployment.kubernetes.io/revision".to_string(), "3".to_string()),
                ("team".to_string(), "core".to_string()),
            ])),
            uid: Some("abc".to_string()),
            generation: Some(3),
            ..Default::default()
        };
        let flat = flatten_metadata(&meta, &MetadataModel::default());
        assert_eq!(flat.annotations.len(), 1);
        assert_eq!(flat.uid, "abc");
        assert_eq!(flat.generation, 3);
    }

    #[test]
    fn test_patch_metadata_only_changed_maps() {
        let old = model();
        let mut new = model();
        new.annotations.insert("team".to_string(), "core".to_string());

        let ops = patch_metadata("/metadata/", &old, &new).unwrap();
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([{"op": "add", "path": "/metadata/annotations", "value": {"team": "core"}}])
        );
        assert!(patch_metadata("/metadata/", &old, &old).unwrap().is_empty());
    }

    #[test]
    fn test_metadata_schema_namespaced() {
        let attr = metadata_schema(true);
        let block = match &attr.value_type {
            crate::schema::ValueType::List(crate::schema::Elem::Block(b)) => b,
            _ => panic!("metadata must be a block"),
        };
        assert!(block.get("namespace").is_some());
        assert!(block.get("name").unwrap().force_new);
        assert!(!metadata_has_namespace(&metadata_schema(false)));
    }

    fn metadata_has_namespace(attr: &Attribute) -> bool {
        match &attr.value_type {
            crate::schema::ValueType::List(crate::schema::Elem::Block(b)) => b.get("namespace").is_some(),
            _ => false,
        }
    }
}
