// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::schema::{Attribute, Block, Validator};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct LabelSelectorModel {
    pub match_expressions: Vec<LabelSelectorRequirementModel>,
    pub match_labels: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct LabelSelectorRequirementModel {
    pub key: String,
    pub operator: String,
    pub values: Vec<String>,
}

pub fn label_selector_block(force_new: bool) -> Block {
    let mut match_expressions = Attribute::block_list(
        Block::new()
            .attr("key", Attribute::string().optional().description("The label key that the selector applies to"))
            .attr(
                "operator",
                Attribute::string()
                    .optional()
                    .validate(Validator::OneOf(&["In", "NotIn", "Exists", "DoesNotExist"]))
                    .description("A key's relationship to a set of values"),
            )
            .attr("values", Attribute::string_set().optional().description("An array of string values")),
    )
    .optional()
    .description("A list of label selector requirements, ANDed together");

    let mut match_labels = Attribute::string_map()
        .optional()
        .description("A map of {key,value} pairs, ANDed together");

    if force_new {
        match_expressions = match_expressions.force_new();
        match_labels = match_labels.force_new();
    }

    Block::new()
        .attr("match_expressions", match_expressions)
        .attr("match_labels", match_labels)
}

pub fn expand_label_selector(m: &LabelSelectorModel) -> LabelSelector {
    LabelSelector {
        match_labels: (!m.match_labels.is_empty()).then(|| m.match_labels.clone()),
        match_expressions: (!m.match_expressions.is_empty()).then(|| {
            m.match_expressions
                .iter()
                .map(|e| LabelSelectorRequirement {
                    key: e.key.clone(),
                    operator: e.operator.clone(),
                    values: (!e.values.is_empty()).then(|| e.values.clone()),
                })
                .collect()
        }),
    }
}

pub fn flatten_label_selector(s: &LabelSelector) -> LabelSelectorModel {
    LabelSelectorModel {
        match_labels: s.match_labels.clone().unwrap_or_default(),
        match_expressions: s
            .match_expressions
            .iter()
            .flatten()
            .map(|e| LabelSelectorRequirementModel {
                key: e.key.clone(),
                operator: e.operator.clone(),
                values: e.values.clone().unwrap_or_default(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_selector_round_trip() {
        let m = LabelSelectorModel {
            match_labels: BTreeMap::from([("app".to_string(), "web".to_string())]),
            match_expressions: vec![LabelSelectorRequirementModel {
                key: "tier".to_string(),
                operator: "In".to_string(),
                values: vec!["front".to_string(), "back".to_string()],
            }],
        };
        assert_eq!(flatten_label_selector(&expand_label_selector(&m)), m);
    }

    #[test]
    fn test_empty_selector_expands_to_unset_fields() {
        let s = expand_label_selector(&LabelSelectorModel::default());
        assert!(s.match_labels.is_none());
        assert!(s.match_expressions.is_none());
    }
}
