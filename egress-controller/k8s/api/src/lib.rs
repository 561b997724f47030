#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod cilium;
pub mod labels;
pub mod owner;
pub mod policy;

pub use self::{
    cilium::{CiliumEgressGatewayPolicy, CiliumEgressGatewayPolicySpec, EgressGateway, EgressRule},
    labels::Selector,
    policy::{HaEgressGatewayPolicy, HaEgressGatewayPolicySpec, HaEgressGatewayPolicyStatus},
};
pub use k8s_openapi::{
    api::core::v1::{
        LoadBalancerIngress, LoadBalancerStatus, Service, ServicePort, ServiceSpec, ServiceStatus,
    },
    apimachinery::pkg::apis::meta::v1::OwnerReference,
};
pub use kube::{
    api::{Api, ObjectMeta, Patch, PatchParams, PostParams, ResourceExt},
    runtime::{reflector::ObjectRef, watcher},
    Client, Error, Resource,
};

/// Annotation on a policy that overrides the namespace its derived objects
/// live in.
pub const TARGET_NAMESPACE_ANNOTATION: &str = "haegress.io/target-namespace";

/// Label recording the namespace of the owning policy. Also used as a
/// selector key on the probe service.
pub const POLICY_NAMESPACE_LABEL: &str = "haegress.io/policy-namespace";

/// Label recording the name of the owning policy. Also used as a selector key
/// on the probe service.
pub const POLICY_NAME_LABEL: &str = "haegress.io/policy-name";

/// Keeps kube-proxy and Cilium's own load balancing away from probe services.
pub const SERVICE_PROXY_NAME_LABEL: &str = "service.kubernetes.io/service-proxy-name";
pub const SERVICE_PROXY_NAME: &str = "haegress-controller";

/// Set by kube-vip on a service to the node currently holding its address.
pub const VIP_HOST_ANNOTATION: &str = "kube-vip.io/vipHost";

/// Node label the gateway node selector is keyed on.
pub const NODE_NAME_LABEL: &str = "kubernetes.io/hostname";
