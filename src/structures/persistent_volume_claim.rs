// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::schema::{blocks, Attribute, Block, Validator};
use crate::structures::label_selector::{
    expand_label_selector, flatten_label_selector, label_selector_block, LabelSelectorModel,
};
use crate::structures::{expand_quantities, flatten_quantities, non_empty, ptr_to_string};
use k8s_openapi::api::core::v1::{PersistentVolumeClaimSpec, VolumeResourceRequirements};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct PersistentVolumeClaimSpecModel {
    pub access_modes: Vec<String>,
    #[serde(with = "blocks::single")]
    pub resources: VolumeResourcesModel,
    #[serde(with = "blocks::optional")]
    pub selector: Option<LabelSelectorModel>,
    pub storage_class_name: String,
    pub volume_mode: String,
    pub volume_name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct VolumeResourcesModel {
    pub limits: BTreeMap<String, String>,
    pub requests: BTreeMap<String, String>,
}

/// Everything but the storage request is immutable once the claim exists
pub fn persistent_volume_claim_spec_block() -> Block {
    Block::new()
        .attr(
            "access_modes",
            Attribute::string_set()
                .required()
                .force_new()
                .min_items(1)
                .validate(Validator::OneOf(&[
                    "ReadWriteOnce",
                    "ReadOnlyMany",
                    "ReadWriteMany",
                    "ReadWriteOncePod",
                ]))
                .description("A set of the desired access modes the volume should have"),
        )
        .attr(
            "resources",
            Attribute::single_block(
                Block::new()
                    .attr("limits", Attribute::string_map().optional().force_new())
                    .attr("requests", Attribute::string_map().optional()),
            )
            .required()
            .description("The minimum resources the volume should have"),
        )
        .attr(
            "selector",
            Attribute::single_block(label_selector_block(true))
                .optional()
                .force_new(),
        )
        .attr(
            "storage_class_name",
            Attribute::string().optional().computed().force_new(),
        )
        .attr(
            "volume_mode",
            Attribute::string()
                .optional()
                .computed()
                .force_new()
                .validate(Validator::OneOf(&["Block", "Filesystem"])),
        )
        .attr(
            "volume_name",
            Attribute::string().optional().computed().force_new(),
        )
}

pub fn expand_persistent_volume_claim_spec(
    m: &PersistentVolumeClaimSpecModel,
) -> PersistentVolumeClaimSpec {
    PersistentVolumeClaimSpec {
        access_modes: Some(m.access_modes.clone()),
        resources: Some(VolumeResourceRequirements {
            limits: expand_quantities(&m.resources.limits),
            requests: expand_quantities(&m.resources.requests),
            ..Default::default()
        }),
        selector: m.selector.as_ref().map(expand_label_selector),
        storage_class_name: non_empty(&m.storage_class_name),
        volume_mode: non_empty(&m.volume_mode),
        volume_name: non_empty(&m.volume_name),
        ..Default::default()
    }
}

pub fn flatten_persistent_volume_claim_spec(
    spec: &PersistentVolumeClaimSpec,
) -> PersistentVolumeClaimSpecModel {
    let resources = spec.resources.clone().unwrap_or_default();

    PersistentVolumeClaimSpecModel {
        access_modes: spec.access_modes.clone().unwrap_or_default(),
        resources: VolumeResourcesModel {
            limits: flatten_quantities(&resources.limits),
            requests: flatten_quantities(&resources.requests),
        },
        selector: spec.selector.as_ref().map(flatten_label_selector),
        storage_class_name: ptr_to_string(&spec.storage_class_name),
        volume_mode: ptr_to_string(&spec.volume_mode),
        volume_name: ptr_to_string(&spec.volume_name),
    }
}
