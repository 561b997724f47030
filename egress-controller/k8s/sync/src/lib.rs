#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod activity;
mod backoff;
mod controller;
mod error;
pub mod events;
mod feedback;
mod metrics;
mod reconcile;
mod resource_id;
pub mod resources;
pub mod router;
mod store;
mod sweep;


pub use self::{
    activity::Activity,
    backoff::Backoff,
    controller::{policy_error_policy, reconcile_policy, reconcile_service, service_error_policy},
    error::{Error, Result},
    events::{Events, KubeEvents},
    feedback::Outcome,
    metrics::Metrics,
    resource_id::ResourceId,
    store::{KubeStore, Store, FIELD_MANAGER},
    sweep::Sweeper,
};
use chrono::{SecondsFormat, Utc};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    /// Namespace derived objects live in unless a policy overrides it.
    pub default_namespace: String,
    pub load_balancer_class: String,
    /// How long a feedback sync waits after losing a write race.
    pub retry_after: Duration,
}

/// State shared by every reconciliation.
pub struct Context<S, E> {
    store: S,
    events: E,
    config: Config,
    activity: Activity,
    metrics: Metrics,
    policy_backoff: Backoff,
    service_backoff: Backoff,
}

// === impl Context ===

impl<S, E> Context<S, E> {
    pub fn new(store: S, events: E, config: Config, metrics: Metrics) -> Self {
        Self {
            store,
            events,
            config,
            activity: Activity::default(),
            metrics,
            policy_backoff: Backoff::default(),
            service_backoff: Backoff::default(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn events(&self) -> &E {
        &self.events
    }

    pub fn activity(&self) -> &Activity {
        &self.activity
    }
}

fn timestamp() -> String {
    #[cfg(not(test))]
    let now = Utc::now();
    #[cfg(test)]
    let now = chrono::DateTime::<Utc>::UNIX_EPOCH;

    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}
