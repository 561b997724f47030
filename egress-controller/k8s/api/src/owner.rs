//! Owner-reference lookups shared by every derived object kind.

use crate::{policy::HaEgressGatewayPolicy, POLICY_NAMESPACE_LABEL};
use kube::{runtime::reflector::ObjectRef, Resource, ResourceExt};

/// Finds the policy that owns `obj`.
///
/// Owner references do not carry a namespace, so the owner's namespace is
/// read from the policy-namespace label, falling back to the object's own
/// namespace.
pub fn policy_ref<K: Resource>(obj: &K) -> Option<ObjectRef<HaEgressGatewayPolicy>> {
    let kind = HaEgressGatewayPolicy::kind(&());
    let owner = obj
        .owner_references()
        .iter()
        .find(|r| r.kind == kind.as_ref())?;
    let namespace = obj
        .labels()
        .get(POLICY_NAMESPACE_LABEL)
        .filter(|ns| !ns.is_empty())
        .cloned()
        .or_else(|| obj.namespace())?;
    Some(ObjectRef::new(&owner.name).within(&namespace))
}

/// Indicates whether `obj` carries a controller reference to `policy`.
pub fn is_controlled_by<K: Resource>(obj: &K, policy: &HaEgressGatewayPolicy) -> bool {
    let Some(uid) = policy.uid() else {
        return false;
    };
    let kind = HaEgressGatewayPolicy::kind(&());
    obj.owner_references()
        .iter()
        .any(|r| r.controller == Some(true) && r.kind == kind.as_ref() && r.uid == uid)
}
