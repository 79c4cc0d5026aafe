// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::error::{ProviderError, Result};
use crate::kubernetes::KubeClientsets;
use crate::patch::PatchOperations;
use crate::resources::{
    delete_object, get_object, namespace_or_default, object_exists, Resource, ResourceData,
};
use crate::schema::{blocks, Attribute, Block, Validator};
use crate::structures::label_selector::{
    expand_label_selector, flatten_label_selector, label_selector_block, LabelSelectorModel,
};
use crate::structures::metadata::{
    expand_metadata, flatten_metadata, metadata_schema, patch_metadata, MetadataModel,
};
use crate::structures::{
    build_id, expand_int_or_string, flatten_int_or_string, id_parts, non_empty, non_empty_vec,
    non_zero_i32, ptr_to_i32, ptr_to_string,
};
use async_trait::async_trait;
use k8s_openapi::api::networking::v1::{
    IPBlock, NetworkPolicy, NetworkPolicyEgressRule, NetworkPolicyIngressRule, NetworkPolicyPeer,
    NetworkPolicyPort, NetworkPolicySpec,
};
use kube::api::{DeleteParams, PatchParams, PostParams};
use kube::Api;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct NetworkPolicyModel {
    #[serde(with = "blocks::single")]
    pub metadata: MetadataModel,
    #[serde(with = "blocks::single")]
    pub spec: NetworkPolicySpecModel,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct NetworkPolicySpecModel {
    pub egress: Vec<EgressRuleModel>,
    pub ingress: Vec<IngressRuleModel>,
    #[serde(with = "blocks::single")]
    pub pod_selector: LabelSelectorModel,
    pub policy_types: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct IngressRuleModel {
    pub from: Vec<PeerModel>,
    pub ports: Vec<PolicyPortModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct EgressRuleModel {
    pub ports: Vec<PolicyPortModel>,
    pub to: Vec<PeerModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct PeerModel {
    #[serde(with = "blocks::optional")]
    pub ip_block: Option<IpBlockModel>,
    #[serde(with = "blocks::optional")]
    pub namespace_selector: Option<LabelSelectorModel>,
    #[serde(with = "blocks::optional")]
    pub pod_selector: Option<LabelSelectorModel>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct IpBlockModel {
    pub cidr: String,
    pub except: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct PolicyPortModel {
    pub end_port: i32,
    pub port: String,
    pub protocol: String,
}

pub struct NetworkPolicyResource;

fn peer_block() -> Block {
    let ip_block = Block::new()
        .attr(
            "cidr",
            Attribute::string()
                .optional()
                .validate(Validator::Cidr)
                .description("A string representing the IP block"),
        )
        .attr(
            "except",
            Attribute::string_list()
                .optional()
                .validate(Validator::Cidr)
                .description("CIDRs that should not be included within the IP block"),
        );

    Block::new()
        .attr("ip_block", Attribute::single_block(ip_block).optional())
        .attr(
            "namespace_selector",
            Attribute::single_block(label_selector_block(false))
                .optional()
                .description("Selects namespaces using cluster scoped labels"),
        )
        .attr(
            "pod_selector",
            Attribute::single_block(label_selector_block(false))
                .optional()
                .description("Selects pods in the same namespace as the policy"),
        )
}

fn port_block() -> Block {
    Block::new()
        .attr(
            "end_port",
            Attribute::int().optional().validate(Validator::PortNumberOrZero),
        )
        .attr(
            "port",
            Attribute::string()
                .optional()
                .validate(Validator::PortNameOrNumber)
                .description("The port on the given protocol, as a number or a named port"),
        )
        .attr(
            "protocol",
            Attribute::string()
                .optional()
                .default("TCP")
                .validate(Validator::OneOf(&["TCP", "UDP", "SCTP"])),
        )
}

fn spec_block() -> Block {
    Block::new()
        .attr(
            "egress",
            Attribute::block_list(
                Block::new()
                    .attr("ports", Attribute::block_list(port_block()).optional())
                    .attr("to", Attribute::block_list(peer_block()).optional()),
            )
            .optional()
            .description("Egress rules to be applied to the selected pods"),
        )
        .attr(
            "ingress",
            Attribute::block_list(
                Block::new()
                    .attr("from", Attribute::block_list(peer_block()).optional())
                    .attr("ports", Attribute::block_list(port_block()).optional()),
            )
            .optional()
            .description("Ingress rules to be applied to the selected pods"),
        )
        .attr(
            "pod_selector",
            Attribute::single_block(label_selector_block(false))
                .required()
                .description("Selects the pods to which this policy applies, empty selects all pods"),
        )
        .attr(
            "policy_types",
            Attribute::string_list()
                .required()
                .min_items(1)
                .validate(Validator::OneOf(&["Ingress", "Egress"]))
                .description("Rule types that the policy relates to"),
        )
}

fn expand_peers(peers: &[PeerModel]) -> Option<Vec<NetworkPolicyPeer>> {
    non_empty_vec(peers).map(|peers| {
        peers
            .iter()
            .map(|p| NetworkPolicyPeer {
                ip_block: p.ip_block.as_ref().map(|b| IPBlock {
                    cidr: b.cidr.clone(),
                    except: non_empty_vec(&b.except),
                }),
                namespace_selector: p.namespace_selector.as_ref().map(expand_label_selector),
                pod_selector: p.pod_selector.as_ref().map(expand_label_selector),
            })
            .collect()
    })
}

fn flatten_peers(peers: &[NetworkPolicyPeer]) -> Vec<PeerModel> {
    peers
        .iter()
        .map(|p| PeerModel {
            ip_block: p.ip_block.as_ref().map(|b| IpBlockModel {
                cidr: b.cidr.clone(),
                except: b.except.clone().unwrap_or_default(),
            }),
            namespace_selector: p.namespace_selector.as_ref().map(flatten_label_selector),
            pod_selector: p.pod_selector.as_ref().map(flatten_label_selector),
        })
        .collect()
}

fn expand_ports(ports: &[PolicyPortModel]) -> Option<Vec<NetworkPolicyPort>> {
    non_empty_vec(ports).map(|ports| {
        ports
            .iter()
            .map(|p| NetworkPolicyPort {
                end_port: non_zero_i32(p.end_port),
                port: expand_int_or_string(&p.port),
                protocol: non_empty(&p.protocol),
            })
            .collect()
    })
}

fn flatten_ports(ports: &[NetworkPolicyPort]) -> Vec<PolicyPortModel> {
    ports
        .iter()
        .map(|p| PolicyPortModel {
            end_port: ptr_to_i32(p.end_port),
            port: flatten_int_or_string(&p.port),
            protocol: ptr_to_string(&p.protocol),
        })
        .collect()
}

fn expand_ingress(rules: &[IngressRuleModel]) -> Vec<NetworkPolicyIngressRule> {
    rules
        .iter()
        .map(|r| NetworkPolicyIngressRule {
            from: expand_peers(&r.from),
            ports: expand_ports(&r.ports),
        })
        .collect()
}

fn expand_egress(rules: &[EgressRuleModel]) -> Vec<NetworkPolicyEgressRule> {
    rules
        .iter()
        .map(|r| NetworkPolicyEgressRule {
            ports: expand_ports(&r.ports),
            to: expand_peers(&r.to),
        })
        .collect()
}

fn expand_network_policy_spec(m: &NetworkPolicySpecModel) -> NetworkPolicySpec {
    NetworkPolicySpec {
        egress: non_empty_vec(&expand_egress(&m.egress)),
        ingress: non_empty_vec(&expand_ingress(&m.ingress)),
        pod_selector: expand_label_selector(&m.pod_selector),
        policy_types: non_empty_vec(&m.policy_types),
    }
}

fn flatten_network_policy_spec(spec: &NetworkPolicySpec) -> NetworkPolicySpecModel {
    NetworkPolicySpecModel {
        egress: spec
            .egress
            .iter()
            .flatten()
            .map(|r| EgressRuleModel {
                ports: flatten_ports(r.ports.as_deref().unwrap_or_default()),
                to: flatten_peers(r.to.as_deref().unwrap_or_default()),
            })
            .collect(),
        ingress: spec
            .ingress
            .iter()
            .flatten()
            .map(|r| IngressRuleModel {
                from: flatten_peers(r.from.as_deref().unwrap_or_default()),
                ports: flatten_ports(r.ports.as_deref().unwrap_or_default()),
            })
            .collect(),
        pod_selector: flatten_label_selector(&spec.pod_selector),
        policy_types: spec.policy_types.clone().unwrap_or_default(),
    }
}

fn patch_network_policy_spec(
    old: &NetworkPolicySpecModel,
    new: &NetworkPolicySpecModel,
) -> Result<PatchOperations> {
    let mut ops = PatchOperations::new();
    if old.ingress != new.ingress {
        ops.set_optional(
            "/spec/ingress",
            non_empty_vec(&expand_ingress(&old.ingress)).as_ref(),
            non_empty_vec(&expand_ingress(&new.ingress)).as_ref(),
        )?;
    }
    if old.egress != new.egress {
        ops.set_optional(
            "/spec/egress",
            non_empty_vec(&expand_egress(&old.egress)).as_ref(),
            non_empty_vec(&expand_egress(&new.egress)).as_ref(),
        )?;
    }
    if old.pod_selector != new.pod_selector {
        ops.replace("/spec/podSelector", expand_label_selector(&new.pod_selector))?;
    }
    if old.policy_types != new.policy_types {
        ops.replace("/spec/policyTypes", &new.policy_types)?;
    }
    Ok(ops)
}

#[async_trait]
impl Resource for NetworkPolicyResource {
    type Model = NetworkPolicyModel;

    const TYPE_NAME: &'static str = "kubernetes_network_policy";

    fn schema(&self) -> Block {
        Block::new().attr("metadata", metadata_schema(true)).attr(
            "spec",
            Attribute::single_block(spec_block())
                .required()
                .description("Spec defines the desired behavior of this network policy"),
        )
    }

    #[instrument(skip_all)]
    async fn create(&self, meta: &dyn KubeClientsets, data: &ResourceData<NetworkPolicyModel>) -> Result<String> {
        let namespace = namespace_or_default(meta, &data.planned.metadata);
        let mut metadata = expand_metadata(&data.planned.metadata);
        metadata.namespace = Some(namespace.clone());
        let policy = NetworkPolicy {
            metadata,
            spec: Some(expand_network_policy_spec(&data.planned.spec)),
            ..Default::default()
        };

        info!("Creating new network policy: {:?}", policy.metadata.name);
        let api: Api<NetworkPolicy> = Api::namespaced(meta.main_clientset()?, &namespace);
        let out = api
            .create(&PostParams::default(), &policy)
            .await
            .map_err(|e| ProviderError::api("Failed to create network policy", e))?;

        Ok(build_id(&out.metadata))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn read(
        &self,
        meta: &dyn KubeClientsets,
        data: &ResourceData<NetworkPolicyModel>,
    ) -> Result<Option<NetworkPolicyModel>> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<NetworkPolicy> = Api::namespaced(meta.main_clientset()?, &namespace);

        Ok(get_object(&api, &name).await?.map(|np| NetworkPolicyModel {
            metadata: flatten_metadata(&np.metadata, &data.planned.metadata),
            spec: flatten_network_policy_spec(&np.spec.unwrap_or_default()),
        }))
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn update(&self, meta: &dyn KubeClientsets, data: &ResourceData<NetworkPolicyModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let prior = data.prior.clone().unwrap_or_default();

        let mut ops = patch_metadata("/metadata/", &prior.metadata, &data.planned.metadata)?;
        ops.extend(patch_network_policy_spec(&prior.spec, &data.planned.spec)?);
        if ops.is_empty() {
            return Ok(());
        }

        let api: Api<NetworkPolicy> = Api::namespaced(meta.main_clientset()?, &namespace);
        api.patch(&name, &PatchParams::default(), &ops.to_patch()?)
            .await
            .map_err(|e| ProviderError::api(format!("Failed to update network policy {}", data.id), e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(id = %data.id))]
    async fn delete(&self, meta: &dyn KubeClientsets, data: &ResourceData<NetworkPolicyModel>) -> Result<()> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<NetworkPolicy> = Api::namespaced(meta.main_clientset()?, &namespace);
        delete_object(&api, &name, &DeleteParams::default()).await
    }

    async fn exists(&self, meta: &dyn KubeClientsets, data: &ResourceData<NetworkPolicyModel>) -> Result<bool> {
        let (namespace, name) = id_parts(&data.id)?;
        let api: Api<NetworkPolicy> = Api::namespaced(meta.main_clientset()?, &namespace);
        object_exists(&api, &name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn spec() -> NetworkPolicySpecModel {
        NetworkPolicySpecModel {
            ingress: vec![IngressRuleModel {
                from: vec![
                    PeerModel {
                        ip_block: Some(IpBlockModel {
                            cidr: "10.0.0.0/8".to_string(),
                            except: vec!["10.0.1.0/24".to_string()],
                        }),
                        ..Default::default()
                    },
                    PeerModel {
                        namespace_selector: Some(LabelSelectorModel {
                            match_labels: BTreeMap::from([("team".to_string(), "a".to_string())]),
                            ..Default::default()
                        }),
                        ..Default::default()
                    },
                ],
                ports: vec![PolicyPortModel {
                    port: "http".to_string(),
                    protocol: "TCP".to_string(),
                    ..Default::default()
                }],
            }],
            pod_selector: LabelSelectorModel {
                match_labels: BTreeMap::from([("app".to_string(), "db".to_string())]),
                ..Default::default()
            },
            policy_types: vec!["Ingress".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_network_policy_spec_round_trip() {
        let m = spec();
        assert_eq!(flatten_network_policy_spec(&expand_network_policy_spec(&m)), m);
    }

    #[test]
    fn test_patch_adds_egress_when_previously_unset() {
        let old = spec();
        let mut new = spec();
        new.egress = vec![EgressRuleModel {
            ports: vec![PolicyPortModel {
                port: "53".to_string(),
                protocol: "UDP".to_string(),
                ..Default::default()
            }],
            ..Default::default()
        }];
        new.policy_types.push("Egress".to_string());

        let ops = patch_network_policy_spec(&old, &new).unwrap();
        assert_eq!(
            serde_json::to_value(&ops).unwrap(),
            json!([
                {"op": "add", "path": "/spec/egress", "value": [{"ports": [{"port": 53, "protocol": "UDP"}]}]},
                {"op": "replace", "path": "/spec/policyTypes", "value": ["Ingress", "Egress"]}
            ])
        );
    }

    #[test]
    fn test_patch_pod_selector_only() {
        let old = spec();
        let mut new = spec();
        new.pod_selector.match_labels.insert("tier".to_string(), "back".to_string());

        let ops = patch_network_policy_spec(&old, &new).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops.iter().next().unwrap().path(), "/spec/podSelector");
    }
}
