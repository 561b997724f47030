use crate::{
    cilium::{CiliumEgressGatewayPolicySpec, EgressGateway, EgressRule},
    TARGET_NAMESPACE_ANNOTATION,
};
use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Declares that traffic from the selected workloads egresses through a
/// highly-available gateway node.
///
/// The spec mirrors [`CiliumEgressGatewayPolicySpec`]; the node selector and
/// egress IP are maintained by the controller on the derived policy.
#[derive(Clone, Debug, PartialEq, Eq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "haegress.io",
    version = "v1alpha1",
    kind = "HaEgressGatewayPolicy",
    status = "HaEgressGatewayPolicyStatus",
    shortname = "haegress",
    printcolumn = r#"{"name":"IP", "type":"string", "jsonPath":".status.ipAddress"}"#,
    printcolumn = r#"{"name":"Exit Node", "type":"string", "jsonPath":".status.exitNode"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct HaEgressGatewayPolicySpec {
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

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HaEgressGatewayPolicyStatus {
    /// The address last assigned to the probe service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// The node last observed holding that address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_node: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<DateTime<Utc>>,
}

// === impl HaEgressGatewayPolicy ===

impl HaEgressGatewayPolicy {
    /// The namespace the derived objects live in: the annotation override when
    /// set, else `default`.
    pub fn target_namespace<'a>(&'a self, default: &'a str) -> &'a str {
        self.annotations()
            .get(TARGET_NAMESPACE_ANNOTATION)
            .map(String::as_str)
            .filter(|ns| !ns.is_empty())
            .unwrap_or(default)
    }

    /// Name of the cluster-scoped gateway policy derived from this policy.
    pub fn gateway_policy_name(&self, target_ns: &str) -> String {
        format!("{}-{}", target_ns, self.name_any())
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.status.as_ref()?.ip_address.as_deref()
    }

    pub fn exit_node(&self) -> Option<&str> {
        self.status.as_ref()?.exit_node.as_deref()
    }
}

impl From<HaEgressGatewayPolicySpec> for CiliumEgressGatewayPolicySpec {
    fn from(spec: HaEgressGatewayPolicySpec) -> Self {
        let HaEgressGatewayPolicySpec {
            selectors,
            destination_cidrs,
            excluded_cidrs,
            egress_gateway,
        } = spec;
        Self {
            selectors,
            destination_cidrs,
            excluded_cidrs,
            egress_gateway,
        }
    }
}
