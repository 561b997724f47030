use crate::{
    events, feedback::Outcome, resources, store::versioned, Context, Events, ResourceId, Result,
    Store,
};
use haegress_controller_k8s_api::{
    owner, CiliumEgressGatewayPolicy, HaEgressGatewayPolicy, Resource, ResourceExt,
};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

impl<S: Store, E: Events> Context<S, E> {
    /// Creates the objects derived from `policy`, or brings their owned fields
    /// back in line with it.
    ///
    /// Objects that exist under the derived names but are not controlled by
    /// `policy` are reported and left untouched.
    pub async fn reconcile(&self, policy: &HaEgressGatewayPolicy) -> Result<()> {
        self.activity.touch();

        let target_ns = policy.target_namespace(&self.config.default_namespace);
        self.reconcile_gateway_policy(policy, target_ns).await?;
        self.reconcile_probe_service(policy, target_ns).await
    }

    async fn reconcile_gateway_policy(
        &self,
        policy: &HaEgressGatewayPolicy,
        target_ns: &str,
    ) -> Result<()> {
        let desired = resources::gateway_policy(policy, target_ns)?;
        let name = desired.name_any();
        let policy_ref = policy.object_ref(&());

        let Some(current) = self.store.get_gateway_policy(&name).await? else {
            let created = self.store.create_gateway_policy(&desired).await?;
            info!(%name, "Created CiliumEgressGatewayPolicy");
            self.events
                .publish(
                    &policy_ref,
                    events::normal(
                        events::CREATED,
                        "Create",
                        format!("CiliumEgressGatewayPolicy \"{name}\" created"),
                    ),
                )
                .await;
            return self.sync_existing_probe(policy, target_ns, &created).await;
        };

        if !owner::is_controlled_by(&current, policy) {
            warn!(%name, "CiliumEgressGatewayPolicy exists but is not managed by this policy");
            self.events.publish(&policy_ref, foreign(&name)).await;
            return Ok(());
        }

        if current.spec.selectors == desired.spec.selectors {
            return Ok(());
        }

        let patch = versioned(
            &current,
            json!({ "spec": { "selectors": desired.spec.selectors } }),
        );
        self.store.patch_gateway_policy(&name, patch).await?;
        info!(%name, "Updated CiliumEgressGatewayPolicy selectors");
        self.events
            .publish(
                &policy_ref,
                events::normal(
                    events::UPDATED,
                    "Update",
                    format!("CiliumEgressGatewayPolicy \"{name}\" updated"),
                ),
            )
            .await;
        Ok(())
    }

    // A recreated gateway policy must pick up an address the probe service
    // already holds.
    async fn sync_existing_probe(
        &self,
        policy: &HaEgressGatewayPolicy,
        target_ns: &str,
        gateway_policy: &CiliumEgressGatewayPolicy,
    ) -> Result<()> {
        let id = ResourceId::new(target_ns, policy.name_any());
        let Some(svc) = self.store.get_service(&id).await? else {
            return Ok(());
        };
        if !owner::is_controlled_by(&svc, policy) {
            return Ok(());
        }
        if let Outcome::RetryAfter(delay) = self.sync(&svc, gateway_policy).await? {
            debug!(service = %id, ?delay, "Probe service sync deferred");
        }
        Ok(())
    }

    async fn reconcile_probe_service(
        &self,
        policy: &HaEgressGatewayPolicy,
        target_ns: &str,
    ) -> Result<()> {
        let id = ResourceId::new(target_ns, policy.name_any());
        let policy_ref = policy.object_ref(&());

        let Some(current) = self.store.get_service(&id).await? else {
            let desired =
                resources::probe_service(policy, target_ns, &self.config.load_balancer_class)?;
            self.store.create_service(&desired).await?;
            info!(service = %id, "Created probe Service");
            self.events
                .publish(
                    &policy_ref,
                    events::normal(events::CREATED, "Create", format!("Service {id} created")),
                )
                .await;
            return Ok(());
        };

        if !owner::is_controlled_by(&current, policy) {
            warn!(service = %id, "Service exists but is not managed by this policy");
            self.events.publish(&policy_ref, foreign(&id.name)).await;
            return Ok(());
        }

        let desired = resources::probe_selector(policy, target_ns);
        let observed = current
            .spec
            .as_ref()
            .and_then(|spec| spec.selector.clone())
            .unwrap_or_default();
        if observed == desired {
            return Ok(());
        }

        // Merge patches merge maps, so stale keys must be nulled out for the
        // selector to end up exactly as desired.
        let mut selector = observed
            .keys()
            .filter(|k| !desired.contains_key(*k))
            .map(|k| (k.clone(), Value::Null))
            .collect::<Map<String, Value>>();
        selector.extend(
            desired
                .into_iter()
                .map(|(k, v)| (k, Value::String(v))),
        );

        let patch = versioned(&current, json!({ "spec": { "selector": selector } }));
        self.store.patch_service(&id, patch).await?;
        info!(service = %id, "Updated probe Service selector");
        self.events
            .publish(
                &policy_ref,
                events::normal(events::UPDATED, "Update", format!("Service {id} updated")),
            )
            .await;
        Ok(())
    }
}

fn foreign(name: &str) -> kube::runtime::events::Event {
    events::warning(
        events::ALREADY_EXISTS,
        "Reconcile",
        format!(
            "Resource \"{name}\" already exists and is not managed by {}",
            HaEgressGatewayPolicy::kind(&())
        ),
    )
}
