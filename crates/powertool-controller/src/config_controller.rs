//! PowerToolConfig controller
//!
//! Validates registry entries and reports the outcome as `Ready` or
//! `Invalid` with a Ready condition. Configs are revalidated periodically so
//! `lastValidated` stays fresh.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use serde_json::json;
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use powertool_common::crd::{
    set_condition, Condition, ConditionStatus, PowerToolConfig, PowerToolConfigPhase,
    PowerToolConfigStatus,
};
use powertool_common::POWERTOOL_CONFIG_CONTROLLER_NAME;

use crate::error::ReconcileError;

/// Interval between revalidations
pub const REVALIDATION_INTERVAL: Duration = Duration::from_secs(300);

/// Backoff applied by [`config_error_policy`]
pub const CONFIG_ERROR_REQUEUE_INTERVAL: Duration = Duration::from_secs(30);

const READY: &str = "Ready";
const CONFIGURATION_VALID: &str = "ConfigurationValid";
const INVALID_CONFIGURATION: &str = "InvalidConfiguration";

/// Status writes for PowerToolConfig
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ConfigStatusClient: Send + Sync {
    /// Merge `status` into the status subresource
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &PowerToolConfigStatus,
    ) -> Result<(), ReconcileError>;
}

/// Production implementation of [`ConfigStatusClient`]
pub struct KubeConfigStatusClient {
    client: Client,
}

impl KubeConfigStatusClient {
    /// Create a new status client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConfigStatusClient for KubeConfigStatusClient {
    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &PowerToolConfigStatus,
    ) -> Result<(), ReconcileError> {
        let api: Api<PowerToolConfig> = Api::namespaced(self.client.clone(), namespace);
        let patch = json!({ "status": status });
        api.patch_status(
            name,
            &PatchParams::apply(POWERTOOL_CONFIG_CONTROLLER_NAME),
            &Patch::Merge(&patch),
        )
        .await?;
        Ok(())
    }
}

/// Shared context for the PowerToolConfig controller
pub struct ConfigContext {
    /// Status writer
    pub status: Arc<dyn ConfigStatusClient>,
}

impl ConfigContext {
    /// Create the production context
    pub fn new(client: Client) -> Self {
        Self {
            status: Arc::new(KubeConfigStatusClient::new(client)),
        }
    }

    /// Create a context around any status writer
    pub fn with_status_client(status: Arc<dyn ConfigStatusClient>) -> Self {
        Self { status }
    }
}

/// Compute the status for `config` as of `now`
pub fn validation_status(config: &PowerToolConfig, now: DateTime<Utc>) -> PowerToolConfigStatus {
    let mut status = config.status.clone().unwrap_or_default();
    status.last_validated = Some(now);

    match config.spec.validate(&config.name_any()) {
        Ok(()) => {
            status.phase = Some(PowerToolConfigPhase::Ready);
            set_condition(
                &mut status.conditions,
                Condition::new(
                    READY,
                    ConditionStatus::True,
                    CONFIGURATION_VALID,
                    "PowerToolConfig is valid and ready for use",
                ),
            );
        }
        Err(e) => {
            status.phase = Some(PowerToolConfigPhase::Invalid);
            set_condition(
                &mut status.conditions,
                Condition::new(
                    READY,
                    ConditionStatus::False,
                    INVALID_CONFIGURATION,
                    e.to_string(),
                ),
            );
        }
    }
    status
}

/// Reconcile a PowerToolConfig
#[instrument(skip(config, ctx), fields(config = %config.name_any()))]
pub async fn reconcile_config(
    config: Arc<PowerToolConfig>,
    ctx: Arc<ConfigContext>,
) -> Result<Action, ReconcileError> {
    let namespace = config.namespace().ok_or(ReconcileError::MissingNamespace)?;
    let name = config.name_any();

    if config.metadata.deletion_timestamp.is_some() {
        debug!("PowerToolConfig is being deleted");
        return Ok(Action::await_change());
    }

    let status = validation_status(&config, Utc::now());
    match status.phase {
        Some(PowerToolConfigPhase::Ready) => debug!(tool = %config.spec.name, "config valid"),
        _ => warn!(tool = %config.spec.name, "config invalid"),
    }

    ctx.status.patch_status(&namespace, &name, &status).await?;
    info!(phase = ?status.phase, "validated PowerToolConfig");

    Ok(Action::requeue(REVALIDATION_INTERVAL))
}

/// Error policy for PowerToolConfig reconciliation
pub fn config_error_policy(
    config: Arc<PowerToolConfig>,
    error: &ReconcileError,
    _ctx: Arc<ConfigContext>,
) -> Action {
    error!(?error, config = %config.name_any(), "PowerToolConfig reconciliation failed");
    Action::requeue(CONFIG_ERROR_REQUEUE_INTERVAL)
}
