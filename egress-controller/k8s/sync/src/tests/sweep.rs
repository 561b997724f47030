use super::*;
use crate::Sweeper;
use pretty_assertions::assert_eq;
use tokio::{sync::oneshot, time};

const INTERVAL: Duration = Duration::from_secs(60);

fn two_policies() -> Arc<TestContext> {
    context(MemStore::with_policies([
        mk_policy("apps", "api"),
        mk_policy("apps", "web"),
    ]))
}

fn sweeper(ctx: &Arc<TestContext>) -> Sweeper<MemStore, MemEvents> {
    Sweeper::new(ctx.clone(), INTERVAL).expect("interval is non-zero")
}

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[test]
fn zero_interval_disables_sweeps() {
    assert!(Sweeper::new(two_policies(), Duration::ZERO).is_none());
}

#[tokio::test(start_paused = true)]
async fn recent_activity_skips_without_reads() {
    let ctx = two_policies();
    ctx.activity().touch();
    time::advance(INTERVAL / 2 - Duration::from_secs(1)).await;

    sweeper(&ctx).sweep().await;
    assert_eq!(ctx.store().calls(), Vec::<Call>::new());
}

#[tokio::test(start_paused = true)]
async fn stale_activity_sweeps_everything() {
    let ctx = two_policies();
    ctx.activity().touch();
    time::advance(INTERVAL / 2).await;

    sweeper(&ctx).sweep().await;
    assert_eq!(ctx.store().calls()[0], Call::ListPolicies);
    assert!(ctx.store().gateway_policy("egress-system-api").is_some());
    assert!(ctx.store().gateway_policy("egress-system-web").is_some());
    assert_eq!(ctx.activity().elapsed(), Some(Duration::ZERO));
}

#[tokio::test(start_paused = true)]
async fn no_recorded_activity_sweeps() {
    let ctx = two_policies();
    sweeper(&ctx).sweep().await;
    assert_eq!(ctx.store().calls()[0], Call::ListPolicies);
}

#[tokio::test(start_paused = true)]
async fn failures_do_not_stop_the_sweep() {
    let ctx = two_policies();
    ctx.store().fail(Call::CreateGatewayPolicy, 1);

    sweeper(&ctx).sweep().await;
    // `api` sorts first and fails; `web` is still reconciled.
    assert!(ctx.store().gateway_policy("egress-system-api").is_none());
    assert!(ctx.store().gateway_policy("egress-system-web").is_some());
}

#[tokio::test(start_paused = true)]
async fn list_failure_ends_the_tick() {
    let ctx = two_policies();
    ctx.store().fail(Call::ListPolicies, 1);

    sweeper(&ctx).sweep().await;
    assert_eq!(ctx.store().calls(), vec![Call::ListPolicies]);
}

#[tokio::test(start_paused = true)]
async fn waits_for_election_and_stops_on_shutdown() {
    let ctx = two_policies();
    let (elected_tx, elected_rx) = oneshot::channel::<()>();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(sweeper(&ctx).run(
        async move {
            let _ = elected_rx.await;
        },
        shutdown_rx,
    ));

    time::advance(INTERVAL * 3).await;
    settle().await;
    assert_eq!(ctx.store().calls(), Vec::<Call>::new());

    elected_tx.send(()).expect("sweeper must be waiting");
    settle().await;
    assert_eq!(ctx.store().calls(), Vec::<Call>::new());

    time::advance(INTERVAL).await;
    settle().await;
    assert_eq!(ctx.store().calls()[0], Call::ListPolicies);

    // The sweep just touched the marker, so the next tick is still a full
    // interval later and sweeps again.
    ctx.store().clear_calls();
    time::advance(INTERVAL).await;
    settle().await;
    assert_eq!(ctx.store().calls()[0], Call::ListPolicies);

    shutdown_tx.send(()).expect("sweeper must be running");
    task.await.expect("sweeper must exit cleanly");
    ctx.store().clear_calls();
    time::advance(INTERVAL * 2).await;
    assert_eq!(ctx.store().calls(), Vec::<Call>::new());
}

#[tokio::test(start_paused = true)]
async fn shutdown_before_election_exits() {
    let ctx = two_policies();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(sweeper(&ctx).run(futures::future::pending(), shutdown_rx));

    shutdown_tx.send(()).expect("sweeper must be waiting");
    task.await.expect("sweeper must exit cleanly");
    assert_eq!(ctx.store().calls(), Vec::<Call>::new());
}
