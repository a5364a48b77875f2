//! Kubernetes Event recording for PowerTool controllers.
//!
//! Events are fire-and-forget: failures are logged as warnings and never
//! propagate errors into reconciliation.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Publishes Kubernetes Events on behalf of a controller.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an Event about `resource_ref`.
    ///
    /// `reason` and `action` should come from [`reasons`] and [`actions`].
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a publisher reporting as `controller_name`
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(
                reason,
                action,
                error = %e,
                "Failed to publish Kubernetes event"
            );
        }
    }
}

/// Publisher that drops every event.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Event reason strings (REASON column of `kubectl get events`).
pub mod reasons {
    /// A diagnostic container was added to a target pod
    pub const CONTAINER_INJECTED: &str = "ContainerInjected";
    /// Adding a diagnostic container failed
    pub const INJECTION_FAILED: &str = "InjectionFailed";
    /// A target pod is already claimed by another PowerTool
    pub const CONFLICT_DETECTED: &str = "ConflictDetected";
    /// All diagnostic containers finished
    pub const PROFILING_COMPLETED: &str = "ProfilingCompleted";
    /// Reconciliation stopped on a configuration error
    pub const RECONCILE_FAILED: &str = "ReconcileFailed";
}

/// Event action strings (ACTION column of `kubectl get events`).
pub mod actions {
    /// Standard reconciliation loop
    pub const RECONCILE: &str = "Reconcile";
    /// Adding an ephemeral container
    pub const INJECT: &str = "Inject";
}
