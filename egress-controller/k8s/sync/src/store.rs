use crate::{Error, ResourceId, Result};
use haegress_controller_k8s_api::{
    Api, CiliumEgressGatewayPolicy, Client, HaEgressGatewayPolicy, Patch, PatchParams, PostParams,
    Service,
};
use kube::api::ListParams;
use std::{future::Future, time::Duration};

pub const FIELD_MANAGER: &str = "haegress-controller";

/// Reads and writes the objects the controller manages.
///
/// Patches are JSON merge patches. A patch that carries
/// `metadata.resourceVersion` only applies if the stored object still has that
/// version; otherwise the store answers with a conflict.
#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    async fn get_policy(&self, id: &ResourceId) -> Result<Option<HaEgressGatewayPolicy>>;

    async fn list_policies(&self) -> Result<Vec<HaEgressGatewayPolicy>>;

    async fn patch_policy_status(
        &self,
        id: &ResourceId,
        patch: serde_json::Value,
    ) -> Result<HaEgressGatewayPolicy>;

    async fn get_gateway_policy(&self, name: &str) -> Result<Option<CiliumEgressGatewayPolicy>>;

    async fn create_gateway_policy(
        &self,
        gateway_policy: &CiliumEgressGatewayPolicy,
    ) -> Result<CiliumEgressGatewayPolicy>;

    async fn patch_gateway_policy(
        &self,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<CiliumEgressGatewayPolicy>;

    async fn get_service(&self, id: &ResourceId) -> Result<Option<Service>>;

    async fn create_service(&self, service: &Service) -> Result<Service>;

    async fn patch_service(&self, id: &ResourceId, patch: serde_json::Value) -> Result<Service>;
}

/// A [`Store`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
    timeout: Duration,
}

// === impl KubeStore ===

impl KubeStore {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    async fn bounded<T>(&self, req: impl Future<Output = kube::Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, req).await {
            Ok(res) => res.map_err(Into::into),
            Err(_) => Err(Error::Timeout(self.timeout)),
        }
    }

    fn post_params() -> PostParams {
        PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }

    fn patch_params() -> PatchParams {
        PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
impl Store for KubeStore {
    async fn get_policy(&self, id: &ResourceId) -> Result<Option<HaEgressGatewayPolicy>> {
        let api = Api::<HaEgressGatewayPolicy>::namespaced(self.client.clone(), &id.namespace);
        self.bounded(api.get_opt(&id.name)).await
    }

    async fn list_policies(&self) -> Result<Vec<HaEgressGatewayPolicy>> {
        let api = Api::<HaEgressGatewayPolicy>::all(self.client.clone());
        let list = self.bounded(api.list(&ListParams::default())).await?;
        Ok(list.items)
    }

    async fn patch_policy_status(
        &self,
        id: &ResourceId,
        patch: serde_json::Value,
    ) -> Result<HaEgressGatewayPolicy> {
        let api = Api::<HaEgressGatewayPolicy>::namespaced(self.client.clone(), &id.namespace);
        let params = Self::patch_params();
        self.bounded(api.patch_status(&id.name, &params, &Patch::Merge(&patch)))
            .await
    }

    async fn get_gateway_policy(&self, name: &str) -> Result<Option<CiliumEgressGatewayPolicy>> {
        let api = Api::<CiliumEgressGatewayPolicy>::all(self.client.clone());
        self.bounded(api.get_opt(name)).await
    }

    async fn create_gateway_policy(
        &self,
        gateway_policy: &CiliumEgressGatewayPolicy,
    ) -> Result<CiliumEgressGatewayPolicy> {
        let api = Api::<CiliumEgressGatewayPolicy>::all(self.client.clone());
        let params = Self::post_params();
        self.bounded(api.create(&params, gateway_policy)).await
    }

    async fn patch_gateway_policy(
        &self,
        name: &str,
        patch: serde_json::Value,
    ) -> Result<CiliumEgressGatewayPolicy> {
        let api = Api::<CiliumEgressGatewayPolicy>::all(self.client.clone());
        let params = Self::patch_params();
        self.bounded(api.patch(name, &params, &Patch::Merge(&patch)))
            .await
    }

    async fn get_service(&self, id: &ResourceId) -> Result<Option<Service>> {
        let api = Api::<Service>::namespaced(self.client.clone(), &id.namespace);
        self.bounded(api.get_opt(&id.name)).await
    }

    async fn create_service(&self, service: &Service) -> Result<Service> {
        let ns = service
            .metadata
            .namespace
            .as_deref()
            .ok_or_else(|| Error::missing::<Service>("namespace"))?;
        let api = Api::<Service>::namespaced(self.client.clone(), ns);
        let params = Self::post_params();
        self.bounded(api.create(&params, service)).await
    }

    async fn patch_service(&self, id: &ResourceId, patch: serde_json::Value) -> Result<Service> {
        let api = Api::<Service>::namespaced(self.client.clone(), &id.namespace);
        let params = Self::patch_params();
        self.bounded(api.patch(&id.name, &params, &Patch::Merge(&patch)))
            .await
    }
}

/// Adds the object's resource version to `patch`, making the patch
/// conditional on the object not having changed since it was read.
pub(crate) fn versioned<K: kube::Resource>(
    obj: &K,
    mut patch: serde_json::Value,
) -> serde_json::Value {
    let version = obj.meta().resource_version.as_ref();
    if let (Some(version), Some(map)) = (version, patch.as_object_mut()) {
        map.insert(
            "metadata".to_string(),
            serde_json::json!({ "resourceVersion": version }),
        );
    }
    patch
}
