use haegress_controller_k8s_api::Client;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};

pub const CREATED: &str = "Created";
pub const UPDATED: &str = "Updated";
pub const ALREADY_EXISTS: &str = "AlreadyExists";
pub const EGRESS_UPDATED: &str = "EgressUpdated";

/// Appends events to an object's history. Publishing is best-effort.
#[async_trait::async_trait]
pub trait Events: Send + Sync + 'static {
    async fn publish(&self, obj: &ObjectReference, event: Event);
}

pub struct KubeEvents {
    recorder: Recorder,
}

// === impl KubeEvents ===

impl KubeEvents {
    pub fn new(client: Client, reporter: Reporter) -> Self {
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait::async_trait]
impl Events for KubeEvents {
    async fn publish(&self, obj: &ObjectReference, event: Event) {
        if let Err(error) = self.recorder.publish(&event, obj).await {
            tracing::warn!(
                kind = ?obj.kind,
                name = ?obj.name,
                reason = %event.reason,
                %error,
                "Failed to publish event"
            );
        }
    }
}

pub(crate) fn normal(reason: &str, action: &str, note: String) -> Event {
    Event {
        type_: EventType::Normal,
        reason: reason.to_string(),
        note: Some(note),
        action: action.to_string(),
        secondary: None,
    }
}

pub(crate) fn warning(reason: &str, action: &str, note: String) -> Event {
    Event {
        type_: EventType::Warning,
        reason: reason.to_string(),
        note: Some(note),
        action: action.to_string(),
        secondary: None,
    }
}
