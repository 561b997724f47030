use haegress_controller_k8s_api::Resource;
use std::{borrow::Cow, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{kind} is missing metadata.{field}")]
    MissingObjectKey {
        kind: Cow<'static, str>,
        field: &'static str,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// === impl Error ===

impl Error {
    pub(crate) fn missing<K: Resource<DynamicType = ()>>(field: &'static str) -> Self {
        Self::MissingObjectKey {
            kind: K::kind(&()),
            field,
        }
    }

    /// Indicates the write lost an optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Kube(kube::Error::Api(e)) if e.code == 409)
    }
}
