use crate::{Context, Events, ResourceId, Store};
use haegress_controller_k8s_api::ResourceExt;
use std::{future::Future, sync::Arc};
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Periodically reconciles every policy, catching drift that no watch event
/// reported.
pub struct Sweeper<S, E> {
    ctx: Arc<Context<S, E>>,
    interval: Duration,
}

// === impl Sweeper ===

impl<S: Store, E: Events> Sweeper<S, E> {
    /// Returns `None` when sweeping is disabled by a zero interval.
    pub fn new(ctx: Arc<Context<S, E>>, interval: Duration) -> Option<Self> {
        if interval.is_zero() {
            return None;
        }
        Some(Self { ctx, interval })
    }

    /// Sweeps once `elected` completes and until `shutdown` completes.
    ///
    /// A sweep that is in progress when shutdown is signaled runs to
    /// completion; `shutdown`'s output is held until then.
    pub async fn run<F: Future>(self, elected: impl Future<Output = ()>, shutdown: F) {
        tokio::pin!(shutdown);

        tokio::select! {
            biased;
            _ = &mut shutdown => return,
            _ = elected => {}
        }
        info!(interval = ?self.interval, "Starting background sweeps");

        let mut ticks = time::interval_at(Instant::now() + self.interval, self.interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _release = &mut shutdown => {
                    debug!("Stopping background sweeps");
                    return;
                }
                _ = ticks.tick() => self.sweep().await,
            }
        }
    }

    pub(crate) async fn sweep(&self) {
        if let Some(elapsed) = self.ctx.activity.elapsed() {
            if elapsed < self.interval / 2 {
                debug!(?elapsed, "Skipping sweep after recent activity");
                self.ctx.metrics.sweeps_skipped.inc();
                return;
            }
        }

        let policies = match self.ctx.store.list_policies().await {
            Ok(policies) => policies,
            Err(error) => {
                warn!(%error, "Failed to list policies");
                return;
            }
        };
        self.ctx.metrics.sweeps.inc();
        debug!(policies = policies.len(), "Sweeping");

        for policy in &policies {
            if let Err(error) = self.ctx.reconcile(policy).await {
                let id = ResourceId::of(policy)
                    .map(|id| id.to_string())
                    .unwrap_or_else(|_| policy.name_any());
                warn!(policy = %id, %error, "Failed to reconcile policy");
            }
        }
    }
}
