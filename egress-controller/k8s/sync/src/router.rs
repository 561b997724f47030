//! Maps changes to derived objects back to their owning policy.
//!
//! Only deletions are routed. The controller's own writes to derived objects
//! must not re-trigger reconciliation; the policy watch and the background
//! sweep drive every other kind of convergence.

use futures::prelude::*;
use haegress_controller_k8s_api::{owner, watcher, HaEgressGatewayPolicy, ObjectRef, Resource};

/// The reconcile request for the policy that owns `obj`, if any.
pub fn owner_request<K: Resource>(obj: K) -> Option<ObjectRef<HaEgressGatewayPolicy>> {
    owner::policy_ref(&obj)
}

pub fn deleted<K>(event: watcher::Event<K>) -> Option<K> {
    match event {
        watcher::Event::Delete(obj) => Some(obj),
        _ => None,
    }
}

/// Narrows a watch to the objects it reports as deleted.
pub fn deletions<K, S>(events: S) -> impl Stream<Item = Result<K, watcher::Error>> + Send
where
    K: Send,
    S: Stream<Item = watcher::Event<K>> + Send,
{
    events.filter_map(|ev| future::ready(deleted(ev).map(Ok)))
}
