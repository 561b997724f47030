use super::*;
use crate::router::{deleted, deletions, owner_request};
use futures::prelude::*;
use haegress_controller_k8s_api::{watcher, ObjectRef};
use pretty_assertions::assert_eq;

fn probe() -> Service {
    let policy = mk_policy("apps", "web");
    crate::resources::probe_service(&policy, DEFAULT_NS, LB_CLASS).expect("must build")
}

fn gateway_policy() -> CiliumEgressGatewayPolicy {
    let policy = mk_policy("apps", "web");
    crate::resources::gateway_policy(&policy, DEFAULT_NS).expect("must build")
}

#[test]
fn derived_objects_route_to_their_policy() {
    let expected = Some(ObjectRef::new("web").within("apps"));
    assert_eq!(owner_request(probe()), expected);
    assert_eq!(owner_request(gateway_policy()), expected);
}

#[test]
fn unowned_objects_route_nowhere() {
    let mut svc = probe();
    svc.metadata.owner_references = None;
    assert_eq!(owner_request(svc), None);
}

#[test]
fn only_deletions_pass() {
    assert_eq!(deleted(watcher::Event::Apply(probe())), None);
    assert_eq!(deleted(watcher::Event::InitApply(probe())), None);
    assert_eq!(deleted(watcher::Event::<Service>::Init), None);
    assert_eq!(deleted(watcher::Event::<Service>::InitDone), None);
    assert_eq!(deleted(watcher::Event::Delete(probe())), Some(probe()));
}

#[tokio::test]
async fn deletion_stream_yields_deleted_objects() {
    let events = stream::iter([
        watcher::Event::Init,
        watcher::Event::InitApply(gateway_policy()),
        watcher::Event::InitDone,
        watcher::Event::Apply(gateway_policy()),
        watcher::Event::Delete(gateway_policy()),
    ]);
    let requests = deletions(events)
        .map_ok(owner_request)
        .try_collect::<Vec<_>>()
        .await
        .expect("stream must not fail");
    assert_eq!(requests, vec![Some(ObjectRef::new("web").within("apps"))]);
}
