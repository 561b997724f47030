use crate::{
    k8s::{Api, CiliumEgressGatewayPolicy, HaEgressGatewayPolicy, Service, POLICY_NAME_LABEL},
    lease,
    sync::{self, router, KubeEvents, KubeStore, Sweeper},
};
use anyhow::{bail, Context as _, Result};
use clap::Parser;
use futures::prelude::*;
use kube::runtime::{events::Reporter, watcher, Controller};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle, time::Duration};
use tracing::{debug, info, info_span, Instrument};

// How long a feedback sync waits before retrying a write that lost a race.
const RETRY_AFTER: Duration = Duration::from_secs(5);

type Context = sync::Context<KubeStore, KubeEvents>;

#[derive(Debug, Parser)]
#[clap(
    name = "haegress",
    about = "Keeps Cilium egress gateways on the node announcing their address"
)]
pub struct Args {
    #[clap(
        long,
        default_value = "haegress=info,warn",
        env = "HAEGRESS_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Namespace for derived objects of policies without a
    /// `haegress.io/target-namespace` annotation.
    #[clap(long, default_value = "egress-system")]
    egress_default_namespace: String,

    /// Load balancer class requested by probe services.
    #[clap(long, default_value = "kube-vip.io/kube-vip-class")]
    load_balancer_class: String,

    /// Seconds between background checks of all policies. Zero disables
    /// them.
    #[clap(long, default_value = "60")]
    background_checker_seconds: u64,

    /// Only act while holding the write lease.
    #[clap(long)]
    leader_elect: bool,

    /// Namespace of the write lease. Defaults to the pod's namespace.
    #[clap(long)]
    leader_election_namespace: Option<String>,

    #[clap(long, default_value = "5000")]
    patch_timeout_ms: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            egress_default_namespace,
            load_balancer_class,
            background_checker_seconds,
            leader_elect,
            leader_election_namespace,
            patch_timeout_ms,
        } = self;

        let mut prom = <Registry>::default();
        let metrics = sync::Metrics::register(prom.sub_registry_with_prefix("haegress"));
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let hostname =
            std::env::var("HOSTNAME").context("Failed to fetch `HOSTNAME` environment variable")?;

        // Controllers and the sweeper wait for `elected`. Without leader
        // election it starts out true.
        let (elected_tx, elected_rx) = watch::channel(!leader_elect);
        let lease = if leader_elect {
            let ns = lease::namespace(leader_election_namespace)?;
            let claims = lease::init(&runtime, &ns, &hostname).await?;
            let task = tokio::spawn(
                lease::hold(claims, hostname.clone(), elected_tx).instrument(info_span!("lease")),
            );
            Some(task)
        } else {
            drop(elected_tx);
            None
        };

        let client = runtime.client();
        let store = KubeStore::new(client.clone(), Duration::from_millis(patch_timeout_ms));
        let reporter = Reporter {
            controller: "haegress-controller".to_string(),
            instance: Some(hostname),
        };
        let events = KubeEvents::new(client.clone(), reporter);
        let config = sync::Config {
            default_namespace: egress_default_namespace,
            load_balancer_class,
            retry_after: RETRY_AFTER,
        };
        let ctx: Arc<Context> = Arc::new(sync::Context::new(store, events, config, metrics));

        // Derived objects only trigger their policy when they are deleted.
        let deleted_services = router::deletions(
            runtime.watch_all::<Service>(watcher::Config::default().labels(POLICY_NAME_LABEL)),
        );
        let deleted_gateway_policies = router::deletions(
            runtime.watch_all::<CiliumEgressGatewayPolicy>(watcher::Config::default()),
        );

        let policies = Controller::new(
            Api::<HaEgressGatewayPolicy>::all(client.clone()),
            watcher::Config::default(),
        )
        .watches_stream(deleted_services, router::owner_request)
        .watches_stream(deleted_gateway_policies, router::owner_request)
        .shutdown_on_signal();
        tokio::spawn(
            run_when_elected(
                elected_rx.clone(),
                runtime.shutdown_handle().signaled(),
                runtime.shutdown_handle(),
                policies
                    .run(
                        sync::reconcile_policy,
                        sync::policy_error_policy,
                        ctx.clone(),
                    )
                    .for_each(|res| async move {
                        match res {
                            Ok((obj, _)) => debug!(policy = %obj, "Reconciled"),
                            Err(error) => debug!(%error, "Policy reconciliation failed"),
                        }
                    }),
            )
            .instrument(info_span!("policies")),
        );

        let services = Controller::new(
            Api::<Service>::all(client),
            watcher::Config::default().labels(POLICY_NAME_LABEL),
        )
        .shutdown_on_signal();
        tokio::spawn(
            run_when_elected(
                elected_rx.clone(),
                runtime.shutdown_handle().signaled(),
                runtime.shutdown_handle(),
                services
                    .run(
                        sync::reconcile_service,
                        sync::service_error_policy,
                        ctx.clone(),
                    )
                    .for_each(|res| async move {
                        match res {
                            Ok((obj, _)) => debug!(service = %obj, "Synced"),
                            Err(error) => debug!(%error, "Probe service sync failed"),
                        }
                    }),
            )
            .instrument(info_span!("services")),
        );

        match Sweeper::new(ctx, Duration::from_secs(background_checker_seconds)) {
            Some(sweeper) => {
                tokio::spawn(
                    sweeper
                        .run(elected(elected_rx), runtime.shutdown_handle().signaled())
                        .instrument(info_span!("sweeper")),
                );
            }
            None => info!("Background sweeps disabled"),
        }

        // Block the main thread on the shutdown signal. Once it fires, wait for
        // the background tasks to complete before exiting. Losing the write
        // lease ends the process.
        tokio::select! {
            res = runtime.run() => {
                if res.is_err() {
                    bail!("Aborted");
                }
            }
            res = lost(lease) => res?,
        }

        Ok(())
    }
}

async fn elected(mut rx: watch::Receiver<bool>) {
    if rx.wait_for(|elected| *elected).await.is_err() {
        // The lease task failed and the process is exiting.
        future::pending::<()>().await;
    }
}

async fn lost(lease: Option<JoinHandle<Result<()>>>) -> Result<()> {
    match lease {
        Some(task) => task.await.context("lease task panicked")?,
        None => future::pending().await,
    }
}

/// Drives `task` once elected, unless `shutdown` completes first.
///
/// `guard` is a shutdown handle held until `task` completes so that shutdown
/// waits for in-flight reconciliations.
async fn run_when_elected<G>(
    rx: watch::Receiver<bool>,
    shutdown: impl Future,
    guard: G,
    task: impl Future<Output = ()>,
) {
    tokio::select! {
        biased;
        _ = shutdown => return,
        _ = elected(rx) => {}
    }
    task.await;
    drop(guard);
}
