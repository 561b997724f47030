use crate::{labels::Selector, NODE_NAME_LABEL};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The subset of Cilium's egress gateway policy that the controller reads and
/// writes. Unknown fields are dropped on deserialization, so existing objects
/// are only ever updated with merge patches.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "cilium.io",
    version = "v2",
    kind = "CiliumEgressGatewayPolicy",
    derive = "PartialEq"
)]
#[serde(rename_all = "camelCase")]
pub struct CiliumEgressGatewayPolicySpec {
    #[serde(default)]
    pub selectors: Vec<EgressRule>,

    #[serde(rename = "destinationCIDRs", default)]
    pub destination_cidrs: Vec<String>,

    #[serde(
        rename = "excludedCIDRs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub excluded_cidrs: Option<Vec<String>>,

    pub egress_gateway: EgressGateway,
}

/// Selects the workloads whose traffic is steered through the gateway.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EgressRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace_selector: Option<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_selector: Option<Selector>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EgressGateway {
    #[serde(default)]
    pub node_selector: Selector,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,

    #[serde(rename = "egressIP", default, skip_serializing_if = "Option::is_none")]
    pub egress_ip: Option<String>,
}

// === impl EgressGateway ===

impl EgressGateway {
    /// The node the gateway selector currently pins, if any.
    pub fn node(&self) -> Option<&str> {
        self.node_selector
            .match_label(NODE_NAME_LABEL)
            .filter(|n| !n.is_empty())
    }

    pub fn egress_ip(&self) -> Option<&str> {
        self.egress_ip.as_deref().filter(|ip| !ip.is_empty())
    }
}
