//! Builds the objects derived from a policy.

use crate::{Error, Result};
use haegress_controller_k8s_api::{
    CiliumEgressGatewayPolicy, HaEgressGatewayPolicy, ObjectMeta, OwnerReference, Resource,
    ResourceExt, Service, ServicePort, ServiceSpec, POLICY_NAMESPACE_LABEL, POLICY_NAME_LABEL,
    SERVICE_PROXY_NAME, SERVICE_PROXY_NAME_LABEL,
};
use std::collections::BTreeMap;

const PROBE_PORT_NAME: &str = "nope";
const PROBE_PORT: i32 = 65534;

pub fn gateway_policy(
    policy: &HaEgressGatewayPolicy,
    target_ns: &str,
) -> Result<CiliumEgressGatewayPolicy> {
    Ok(CiliumEgressGatewayPolicy {
        metadata: ObjectMeta {
            name: Some(policy.gateway_policy_name(target_ns)),
            labels: Some(owner_labels(policy)),
            annotations: policy.metadata.annotations.clone(),
            owner_references: Some(vec![owner_ref(policy)?]),
            ..Default::default()
        },
        spec: policy.spec.clone().into(),
    })
}

/// A load balancer service that selects nothing. It exists only so that the
/// address allocator assigns it an address.
pub fn probe_service(
    policy: &HaEgressGatewayPolicy,
    target_ns: &str,
    load_balancer_class: &str,
) -> Result<Service> {
    let mut labels = owner_labels(policy);
    labels.insert(
        SERVICE_PROXY_NAME_LABEL.to_string(),
        SERVICE_PROXY_NAME.to_string(),
    );

    Ok(Service {
        metadata: ObjectMeta {
            name: Some(policy.name_any()),
            namespace: Some(target_ns.to_string()),
            labels: Some(labels),
            annotations: policy.metadata.annotations.clone(),
            owner_references: Some(vec![owner_ref(policy)?]),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("LoadBalancer".to_string()),
            load_balancer_class: Some(load_balancer_class.to_string()),
            ports: Some(vec![ServicePort {
                name: Some(PROBE_PORT_NAME.to_string()),
                protocol: Some("TCP".to_string()),
                port: PROBE_PORT,
                ..Default::default()
            }]),
            selector: Some(probe_selector(policy, target_ns)),
            ..Default::default()
        }),
        status: None,
    })
}

pub fn probe_selector(policy: &HaEgressGatewayPolicy, target_ns: &str) -> BTreeMap<String, String> {
    [
        (POLICY_NAMESPACE_LABEL.to_string(), target_ns.to_string()),
        (POLICY_NAME_LABEL.to_string(), policy.name_any()),
    ]
    .into_iter()
    .collect()
}

fn owner_labels(policy: &HaEgressGatewayPolicy) -> BTreeMap<String, String> {
    let mut labels = policy.labels().clone();
    if let Some(ns) = policy.namespace() {
        labels.insert(POLICY_NAMESPACE_LABEL.to_string(), ns);
    }
    labels.insert(POLICY_NAME_LABEL.to_string(), policy.name_any());
    labels
}

// Policy deletion waits for the derived objects to be collected.
fn owner_ref(policy: &HaEgressGatewayPolicy) -> Result<OwnerReference> {
    let mut owner = policy
        .controller_owner_ref(&())
        .ok_or_else(|| Error::missing::<HaEgressGatewayPolicy>("uid"))?;
    owner.block_owner_deletion = Some(true);
    Ok(owner)
}
