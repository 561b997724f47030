use crate::{events, store::versioned, timestamp, Context, Events, ResourceId, Result, Store};
use haegress_controller_k8s_api::{
    owner, CiliumEgressGatewayPolicy, HaEgressGatewayPolicy, Resource, ResourceExt, Service,
    NODE_NAME_LABEL, POLICY_NAME_LABEL, VIP_HOST_ANNOTATION,
};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// A write lost a race with another writer; try again later.
    RetryAfter(Duration),
}

impl<S: Store, E: Events> Context<S, E> {
    /// Runs [`Self::sync`] for a probe service that has been assigned an
    /// address.
    pub async fn sync_service(&self, svc: &Service) -> Result<Outcome> {
        if ingress_address(svc).is_none() {
            return Ok(Outcome::Done);
        }
        let (Some(ns), Some(policy_name)) = (svc.namespace(), svc.labels().get(POLICY_NAME_LABEL))
        else {
            return Ok(Outcome::Done);
        };
        let name = format!("{ns}-{policy_name}");
        let Some(gateway_policy) = self.store.get_gateway_policy(&name).await? else {
            // Not created yet; the policy reconciliation syncs it on creation.
            debug!(%name, "No CiliumEgressGatewayPolicy for probe service");
            return Ok(Outcome::Done);
        };
        self.sync(svc, &gateway_policy).await
    }

    /// Copies the address and active node the allocator reported on `svc`
    /// onto the gateway policy and the owning policy's status.
    ///
    /// Only the first ingress address is used.
    pub async fn sync(
        &self,
        svc: &Service,
        gateway_policy: &CiliumEgressGatewayPolicy,
    ) -> Result<Outcome> {
        self.metrics.syncs.inc();

        let Some(policy_ref) =
            owner::policy_ref(gateway_policy).or_else(|| owner::policy_ref(svc))
        else {
            debug!(name = %gateway_policy.name_any(), "CiliumEgressGatewayPolicy has no owning policy");
            return Ok(Outcome::Done);
        };
        let policy_id = ResourceId::new(policy_ref.namespace.unwrap_or_default(), policy_ref.name);
        let Some(mut policy) = self.store.get_policy(&policy_id).await? else {
            debug!(policy = %policy_id, "Owning policy no longer exists");
            return Ok(Outcome::Done);
        };

        // The object we were handed may predate the latest write; everything
        // below compares against and writes over a fresh copy.
        let name = gateway_policy.name_any();
        let Some(mut current) = self.store.get_gateway_policy(&name).await? else {
            return Ok(Outcome::Done);
        };

        // The service's labels may name the policy, but only objects the
        // policy controls are written.
        if !owner::is_controlled_by(&current, &policy) || !owner::is_controlled_by(svc, &policy) {
            debug!(%name, policy = %policy_id, "Objects are not controlled by the policy");
            return Ok(Outcome::Done);
        }

        if let Some(ip) = ingress_address(svc) {
            if current.spec.egress_gateway.egress_ip() != Some(ip) {
                let patch = versioned(
                    &current,
                    json!({ "spec": { "egressGateway": { "egressIP": ip } } }),
                );
                match self.store.patch_gateway_policy(&name, patch).await {
                    Ok(updated) => {
                        info!(%name, %ip, "Updated CiliumEgressGatewayPolicy egress IP");
                        current = updated;
                    }
                    Err(error) => {
                        warn!(%name, %ip, %error, "Failed to update CiliumEgressGatewayPolicy egress IP");
                        self.metrics.sync_retries.inc();
                        return Ok(Outcome::RetryAfter(self.config.retry_after));
                    }
                }
            }

            if policy.ip_address() != Some(ip) {
                policy = self
                    .patch_status(policy, &policy_id, json!({ "ipAddress": ip }))
                    .await;
            }
        }

        let Some(host) = current_host(svc) else {
            // The address has not been claimed by a node yet.
            return Ok(Outcome::Done);
        };

        if policy.exit_node() != Some(host) {
            self.patch_status(policy, &policy_id, json!({ "exitNode": host }))
                .await;
        }

        if current.spec.egress_gateway.node() == Some(host) {
            return Ok(Outcome::Done);
        }

        let mut match_labels = serde_json::Map::new();
        match_labels.insert(NODE_NAME_LABEL.to_string(), json!(host));
        let patch = versioned(
            &current,
            json!({
                "spec": {
                    "egressGateway": {
                        "nodeSelector": { "matchLabels": match_labels },
                    },
                },
            }),
        );
        self.store.patch_gateway_policy(&name, patch).await?;

        let svc_id = ResourceId::of(svc)?;
        info!(%name, service = %svc_id, node = %host, "Moved CiliumEgressGatewayPolicy to node");
        self.events
            .publish(
                &current.object_ref(&()),
                events::normal(
                    events::EGRESS_UPDATED,
                    "Sync",
                    format!(
                        "Updated with new nodeSelector {NODE_NAME_LABEL}={host} by {svc_id} service"
                    ),
                ),
            )
            .await;
        self.events
            .publish(
                &svc.object_ref(&()),
                events::normal(
                    events::EGRESS_UPDATED,
                    "Sync",
                    format!(
                        "Updated {} {name} with new nodeSelector {NODE_NAME_LABEL}={host}",
                        CiliumEgressGatewayPolicy::kind(&())
                    ),
                ),
            )
            .await;
        Ok(Outcome::Done)
    }

    /// Merges `status` into the policy's status. Failures are logged and the
    /// unmodified policy is returned.
    async fn patch_status(
        &self,
        policy: HaEgressGatewayPolicy,
        id: &ResourceId,
        mut status: serde_json::Value,
    ) -> HaEgressGatewayPolicy {
        if let Some(map) = status.as_object_mut() {
            map.insert("lastModifiedTime".to_string(), json!(timestamp()));
        }
        let patch = versioned(&policy, json!({ "status": status }));
        match self.store.patch_policy_status(id, patch).await {
            Ok(updated) => {
                debug!(policy = %id, "Updated status");
                updated
            }
            Err(error) => {
                warn!(policy = %id, %error, "Failed to update status");
                policy
            }
        }
    }
}

fn ingress_address(svc: &Service) -> Option<&str> {
    svc.status
        .as_ref()?
        .load_balancer
        .as_ref()?
        .ingress
        .as_ref()?
        .first()?
        .ip
        .as_deref()
        .filter(|ip| !ip.is_empty())
}

fn current_host(svc: &Service) -> Option<&str> {
    svc.annotations()
        .get(VIP_HOST_ANNOTATION)
        .map(String::as_str)
        .filter(|h| !h.is_empty())
}
