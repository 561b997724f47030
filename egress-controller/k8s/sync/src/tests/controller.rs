use super::*;
use crate::{policy_error_policy, reconcile_policy, reconcile_service, service_error_policy};
use kube::runtime::controller::Action;
use pretty_assertions::assert_eq;

fn policy_id() -> ResourceId {
    ResourceId::new("apps", "web")
}

fn probe_id() -> ResourceId {
    ResourceId::new(DEFAULT_NS, "web")
}

fn stored_policy(ctx: &TestContext) -> Arc<HaEgressGatewayPolicy> {
    Arc::new(ctx.store().policy(&policy_id()).expect("policy must exist"))
}

#[tokio::test]
async fn reconciled_policies_wait_for_changes() {
    let ctx = context(MemStore::with_policies([mk_policy("apps", "web")]));
    let action = reconcile_policy(stored_policy(&ctx), ctx.clone())
        .await
        .expect("reconcile must succeed");
    assert_eq!(action, Action::await_change());
    assert!(ctx.activity().elapsed().is_some());
}

#[tokio::test]
async fn failed_policies_back_off() {
    let ctx = context(MemStore::with_policies([mk_policy("apps", "web")]));
    let policy = stored_policy(&ctx);
    let error = crate::Error::Timeout(Duration::from_secs(5));

    let first = policy_error_policy(policy.clone(), &error, ctx.clone());
    let second = policy_error_policy(policy.clone(), &error, ctx.clone());
    assert_eq!(first, Action::requeue(Duration::from_secs(5)));
    assert_eq!(second, Action::requeue(Duration::from_secs(10)));

    // A success forgets earlier failures.
    reconcile_policy(policy.clone(), ctx.clone())
        .await
        .expect("reconcile must succeed");
    let action = policy_error_policy(policy, &error, ctx);
    assert_eq!(action, Action::requeue(Duration::from_secs(5)));
}

#[tokio::test]
async fn lost_service_sync_race_is_requeued() {
    let ctx = context(MemStore::with_policies([mk_policy("apps", "web")]));
    ctx.reconcile(&stored_policy(&ctx))
        .await
        .expect("reconcile must succeed");
    ctx.store().assign(&probe_id(), "10.0.0.5", Some("node-3"));
    // Both the lookup and the fresh read race with another writer.
    ctx.store().race_gateway_policy_reads(2);

    let svc = Arc::new(ctx.store().service(&probe_id()).expect("service must exist"));
    let action = reconcile_service(svc.clone(), ctx.clone())
        .await
        .expect("a lost race is not an error");
    assert_eq!(action, Action::requeue(RETRY_AFTER));

    let action = reconcile_service(svc, ctx.clone())
        .await
        .expect("sync must succeed");
    assert_eq!(action, Action::await_change());
    let gp = ctx
        .store()
        .gateway_policy("egress-system-web")
        .expect("gateway policy must exist");
    assert_eq!(gp.spec.egress_gateway.node(), Some("node-3"));
}

#[tokio::test]
async fn failed_services_back_off_independently() {
    let ctx = context(MemStore::default());
    let policy = mk_policy("apps", "web");
    let svc = Arc::new(
        crate::resources::probe_service(&policy, DEFAULT_NS, LB_CLASS).expect("must build"),
    );
    let error = crate::Error::Timeout(Duration::from_secs(5));

    let _ = policy_error_policy(Arc::new(policy), &error, ctx.clone());
    let action = service_error_policy(svc.clone(), &error, ctx.clone());
    assert_eq!(action, Action::requeue(Duration::from_secs(5)));
    let action = service_error_policy(svc, &error, ctx);
    assert_eq!(action, Action::requeue(Duration::from_secs(10)));
}
