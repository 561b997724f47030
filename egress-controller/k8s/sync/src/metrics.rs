use prometheus_client::{metrics::counter::Counter, registry::Registry};

#[derive(Clone, Debug, Default)]
pub struct Metrics {
    pub(crate) reconciles: Counter,
    pub(crate) reconcile_failures: Counter,
    pub(crate) syncs: Counter,
    pub(crate) sync_retries: Counter,
    pub(crate) sweeps: Counter,
    pub(crate) sweeps_skipped: Counter,
}

impl Metrics {
    pub fn register(prom: &mut Registry) -> Self {
        let metrics = Self::default();
        prom.register(
            "reconciles",
            "Count of policy reconciliations",
            metrics.reconciles.clone(),
        );
        prom.register(
            "reconcile_failures",
            "Count of policy reconciliations that failed and were requeued",
            metrics.reconcile_failures.clone(),
        );
        prom.register(
            "syncs",
            "Count of probe service feedback syncs",
            metrics.syncs.clone(),
        );
        prom.register(
            "sync_retries",
            "Count of feedback syncs that lost a write race and were retried",
            metrics.sync_retries.clone(),
        );
        prom.register(
            "sweeps",
            "Count of background sweeps that listed all policies",
            metrics.sweeps.clone(),
        );
        prom.register(
            "sweeps_skipped",
            "Count of background sweep ticks skipped due to recent activity",
            metrics.sweeps_skipped.clone(),
        );
        metrics
    }
}
