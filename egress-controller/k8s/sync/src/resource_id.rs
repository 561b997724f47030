use crate::{Error, Result};
use haegress_controller_k8s_api::{Resource, ResourceExt};

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl ToString, name: impl ToString) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Identifies a namespaced object.
    pub fn of<K>(obj: &K) -> Result<Self>
    where
        K: Resource<DynamicType = ()>,
    {
        let namespace = obj.namespace().ok_or_else(|| Error::missing::<K>("namespace"))?;
        let name = obj
            .meta()
            .name
            .clone()
            .ok_or_else(|| Error::missing::<K>("name"))?;
        Ok(Self { namespace, name })
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
