//! Entry points for `kube::runtime::Controller`.

use crate::{Context, Error, Events, Outcome, ResourceId, Result, Store};
use haegress_controller_k8s_api::{HaEgressGatewayPolicy, Service};
use kube::runtime::controller::Action;
use std::sync::Arc;
use tracing::warn;

pub async fn reconcile_policy<S: Store, E: Events>(
    policy: Arc<HaEgressGatewayPolicy>,
    ctx: Arc<Context<S, E>>,
) -> Result<Action> {
    let id = ResourceId::of(&*policy)?;
    ctx.metrics.reconciles.inc();
    ctx.reconcile(&policy).await?;
    ctx.policy_backoff.reset(&id);
    Ok(Action::await_change())
}

pub fn policy_error_policy<S: Store, E: Events>(
    policy: Arc<HaEgressGatewayPolicy>,
    error: &Error,
    ctx: Arc<Context<S, E>>,
) -> Action {
    ctx.metrics.reconcile_failures.inc();
    match ResourceId::of(&*policy) {
        Ok(id) => {
            let delay = ctx.policy_backoff.failed(&id);
            warn!(policy = %id, %error, ?delay, "Failed to reconcile policy");
            Action::requeue(delay)
        }
        Err(_) => {
            warn!(%error, "Failed to reconcile policy");
            Action::await_change()
        }
    }
}

pub async fn reconcile_service<S: Store, E: Events>(
    svc: Arc<Service>,
    ctx: Arc<Context<S, E>>,
) -> Result<Action> {
    let id = ResourceId::of(&*svc)?;
    match ctx.sync_service(&svc).await? {
        Outcome::Done => {
            ctx.service_backoff.reset(&id);
            Ok(Action::await_change())
        }
        Outcome::RetryAfter(delay) => Ok(Action::requeue(delay)),
    }
}

pub fn service_error_policy<S: Store, E: Events>(
    svc: Arc<Service>,
    error: &Error,
    ctx: Arc<Context<S, E>>,
) -> Action {
    match ResourceId::of(&*svc) {
        Ok(id) => {
            let delay = ctx.service_backoff.failed(&id);
            warn!(service = %id, %error, ?delay, "Failed to sync probe service");
            Action::requeue(delay)
        }
        Err(_) => {
            warn!(%error, "Failed to sync probe service");
            Action::await_change()
        }
    }
}
