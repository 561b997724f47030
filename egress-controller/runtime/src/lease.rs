use crate::{
    k8s::{self, ObjectMeta, Patch, PatchParams},
    sync::FIELD_MANAGER,
};
use anyhow::{bail, Context, Result};
use k8s_openapi::api::coordination::v1 as coordv1;
use std::sync::Arc;
use tokio::{sync::watch, time};
use tracing::info;

const LEASE_DURATION: time::Duration = time::Duration::from_secs(30);
const LEASE_NAME: &str = "haegress-controller-write";
const RENEW_GRACE_PERIOD: time::Duration = time::Duration::from_secs(1);

const SERVICE_ACCOUNT_NAMESPACE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

pub type Claims = watch::Receiver<Arc<kubert::lease::Claim>>;

/// The namespace holding the Lease: the flag when set, otherwise the
/// namespace of the pod's service account.
pub fn namespace(flag: Option<String>) -> Result<String> {
    if let Some(ns) = flag.filter(|ns| !ns.is_empty()) {
        return Ok(ns);
    }
    let ns = std::fs::read_to_string(SERVICE_ACCOUNT_NAMESPACE)
        .with_context(|| format!("failed to read {SERVICE_ACCOUNT_NAMESPACE}"))?;
    let ns = ns.trim();
    if ns.is_empty() {
        bail!("{SERVICE_ACCOUNT_NAMESPACE} is empty");
    }
    Ok(ns.to_string())
}

pub async fn init<T>(runtime: &kubert::Runtime<T>, ns: &str, hostname: &str) -> Result<Claims> {
    let lease = coordv1::Lease {
        metadata: ObjectMeta {
            name: Some(LEASE_NAME.to_string()),
            namespace: Some(ns.to_string()),
            // Specifying a resource version of "0" means that we will
            // only create the Lease if it does not already exist.
            resource_version: Some("0".to_string()),
            labels: Some(
                [(
                    "app.kubernetes.io/name".to_string(),
                    "haegress-controller".to_string(),
                )]
                .into_iter()
                .collect(),
            ),
            ..Default::default()
        },
        spec: None,
    };
    let api = k8s::Api::<coordv1::Lease>::namespaced(runtime.client(), ns);
    match api
        .patch(
            LEASE_NAME,
            &PatchParams {
                field_manager: Some(FIELD_MANAGER.to_string()),
                ..Default::default()
            },
            &Patch::Apply(lease),
        )
        .await
    {
        Ok(lease) => tracing::info!(?lease, "Created Lease resource"),
        Err(k8s::Error::Api(_)) => tracing::debug!("Lease already exists, no need to create it"),
        Err(error) => {
            return Err(error.into());
        }
    };

    let params = kubert::lease::ClaimParams {
        lease_duration: LEASE_DURATION,
        renew_grace_period: RENEW_GRACE_PERIOD,
    };
    let (claims, _task) = kubert::lease::LeaseManager::init(api, LEASE_NAME)
        .await?
        .spawn(hostname, params)
        .await?;
    Ok(claims)
}

/// Flips `elected` once `hostname` holds the write lease and fails when the
/// lease is lost afterwards.
pub async fn hold(mut claims: Claims, hostname: String, elected: watch::Sender<bool>) -> Result<()> {
    claims
        .wait_for(|claim| claim.is_current_for(&hostname))
        .await?;
    info!(%hostname, "Acquired the write lease");
    elected.send_replace(true);

    let claim = claims
        .wait_for(|claim| !claim.is_current_for(&hostname))
        .await?;
    bail!("write lease taken over by {}", claim.holder)
}
