//! PowerTool controller implementation
//!
//! Each pass re-reads the job, resolves its target pods, checks that no
//! other active job already claims them, injects one diagnostic ephemeral
//! container per pod, and projects progress into the status:
//!
//! unset → Pending → Running → Completed
//!                 ↘ Conflicted (retried until the other job finishes)
//!
//! Configuration errors (unknown tool, namespace not allowed, bad selector)
//! set a Failed condition and are returned for standard backoff.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, ResourceExt};
use opentelemetry::KeyValue;
use tracing::{debug, error, info, instrument, warn};

use powertool_common::crd::{PowerTool, PowerToolConfigSpec, PowerToolPhase};
use powertool_common::events::{actions, reasons, EventPublisher, KubeEventPublisher};
use powertool_common::kube_utils::object_ref;
use powertool_common::{
    metrics, tool_config_name, COLLECTOR_AUDIENCE, COLLECTOR_SERVICE_ACCOUNT,
    POWERTOOL_CONTROLLER_NAME, TOE_SYSTEM_NAMESPACE,
};

use crate::client::{KubeClient, KubeClientImpl};
use crate::conflict::detect_conflict;
use crate::container::{build_container, collector_env};
use crate::error::ReconcileError;
use crate::lifecycle::{container_name, plan};
use crate::registry::{KubeToolRegistry, ToolRegistry};
use crate::requeue::{requeue_interval, CONFLICT_RETRY_INTERVAL};
use crate::status;
use crate::targets::resolve_targets;
use crate::token::{KubeTokenIssuer, TokenIssuer};

/// Backoff applied by [`error_policy`]
pub const ERROR_REQUEUE_INTERVAL: Duration = Duration::from_secs(5);

/// Settings for the production context
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Namespace searched first for tool configs; home of the collector
    pub system_namespace: String,
    /// Service account collector tokens are issued for
    pub collector_service_account: String,
    /// Audience requested on collector tokens
    pub collector_audience: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            system_namespace: TOE_SYSTEM_NAMESPACE.to_string(),
            collector_service_account: COLLECTOR_SERVICE_ACCOUNT.to_string(),
            collector_audience: COLLECTOR_AUDIENCE.to_string(),
        }
    }
}

/// Shared context for the PowerTool controller
pub struct Context {
    /// Kubernetes operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Tool registry lookup
    pub registry: Arc<dyn ToolRegistry>,
    /// Collector token issuance
    pub tokens: Arc<dyn TokenIssuer>,
    /// Kubernetes Event publisher
    pub events: Arc<dyn EventPublisher>,
}

impl Context {
    /// Create the production context
    pub fn new(client: Client, config: &ControllerConfig) -> Self {
        Self {
            kube: Arc::new(KubeClientImpl::new(client.clone())),
            registry: Arc::new(KubeToolRegistry::with_system_namespace(
                client.clone(),
                config.system_namespace.clone(),
            )),
            tokens: Arc::new(KubeTokenIssuer::new(
                client.clone(),
                config.system_namespace.clone(),
                config.collector_service_account.clone(),
                config.collector_audience.clone(),
            )),
            events: Arc::new(KubeEventPublisher::new(client, POWERTOOL_CONTROLLER_NAME)),
        }
    }

    /// Create a context for testing with mock collaborators
    #[cfg(test)]
    pub fn for_testing(
        kube: Arc<dyn KubeClient>,
        registry: Arc<dyn ToolRegistry>,
        tokens: Arc<dyn TokenIssuer>,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            kube,
            registry,
            tokens,
            events,
        }
    }
}

/// Reconcile a PowerTool resource
#[instrument(skip(power_tool, ctx), fields(job = %power_tool.name_any()))]
pub async fn reconcile(
    power_tool: Arc<PowerTool>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let start = Instant::now();
    let namespace = power_tool
        .namespace()
        .ok_or(ReconcileError::MissingNamespace)?;

    let result = reconcile_job(&ctx, &namespace, &power_tool.name_any()).await;

    let outcome = if result.is_ok() { "success" } else { "error" };
    metrics::RECONCILE_DURATION.record(
        start.elapsed().as_secs_f64(),
        &[KeyValue::new("result", outcome)],
    );
    if let Err(e) = &result {
        metrics::RECONCILE_ERRORS.add(1, &[KeyValue::new("kind", e.kind())]);
    }
    result
}

/// One reconciliation pass over the job `namespace/name`
pub async fn reconcile_job(
    ctx: &Context,
    namespace: &str,
    name: &str,
) -> Result<Action, ReconcileError> {
    let Some(mut job) = ctx.kube.get_power_tool(namespace, name).await? else {
        debug!(namespace, "PowerTool no longer exists");
        return Ok(Action::await_change());
    };

    if job.metadata.deletion_timestamp.is_some() {
        return Ok(handle_deletion(&job));
    }

    let uid = job
        .uid()
        .ok_or_else(|| ReconcileError::MissingUid(name.to_string()))?;

    if job.phase().is_none() {
        let mut initial = job.status.clone().unwrap_or_default();
        status::initialize(&mut initial, Utc::now());
        job.status = Some(initial);
        job = ctx.kube.replace_status(&job).await?;
        info!(namespace, "initialized PowerTool");
    }

    let tool = match resolve_tool(ctx, &job, namespace).await {
        Ok(tool) => tool,
        Err(e) => return fail_pass(ctx, job, e).await,
    };

    let pods = match resolve_targets(
        ctx.kube.as_ref(),
        namespace,
        job.spec.targets.label_selector.as_ref(),
    )
    .await
    {
        Ok(pods) => pods,
        Err(e) if e.is_configuration_error() => return fail_pass(ctx, job, e).await,
        Err(e) => return Err(e),
    };

    let before = job.status.clone();
    let mut next = before.clone().unwrap_or_default();
    let selected = pods.len() as u32;
    next.selected_pods = selected;

    if !job.is_terminal() {
        let others = ctx.kube.list_power_tools(namespace).await?;
        let targets = pods.iter().map(|p| p.metadata.name.as_deref().unwrap_or_default());
        if let Some(conflict) = detect_conflict(&job, targets, &others) {
            warn!(
                pod = %conflict.pod,
                owner = %conflict.owner,
                "target pod already claimed by another PowerTool"
            );
            metrics::CONFLICTS_DETECTED.add(1, &[]);
            status::mark_conflicted(&mut next, &conflict);
            job.status = Some(next);
            ctx.kube.replace_status(&job).await?;
            ctx.events
                .publish(
                    &object_ref(&job),
                    EventType::Warning,
                    reasons::CONFLICT_DETECTED,
                    actions::RECONCILE,
                    Some(conflict.message()),
                )
                .await;
            return Ok(Action::requeue(CONFLICT_RETRY_INTERVAL));
        }
        status::clear_conflict(&mut next);
    }

    next.last_error = None;
    let container = container_name(name, &uid);
    let mut lifecycle = plan(&next.active_pods, &pods, &container);
    if job.is_terminal() && !lifecycle.to_create.is_empty() {
        debug!(
            skipped = lifecycle.to_create.len(),
            phase = ?job.phase(),
            "finished PowerTool does not instrument new pods"
        );
        lifecycle.to_create.clear();
    }

    for index in lifecycle.to_create.iter().copied() {
        let pod = &pods[index];
        let pod_name = pod.name_any();
        match inject(ctx, &job, &tool, pod, &container).await {
            Ok(()) => {
                lifecycle.active_pods.insert(pod_name, container.clone());
            }
            Err(e) => {
                warn!(pod = %pod_name, error = %e, "failed to inject diagnostic container");
                metrics::CONTAINER_FAILURES
                    .add(1, &[KeyValue::new("tool", job.spec.tool.name.clone())]);
                let message = format!(
                    "failed to add diagnostic container to pod {}: {}",
                    pod_name, e
                );
                ctx.events
                    .publish(
                        &object_ref(&job),
                        EventType::Warning,
                        reasons::INJECTION_FAILED,
                        actions::INJECT,
                        Some(message.clone()),
                    )
                    .await;
                next.last_error = Some(message);
            }
        }
    }

    let was_completed = job.phase() == Some(PowerToolPhase::Completed);
    status::project(&mut next, selected, lifecycle.active_pods, Utc::now());
    let phase = next.phase;

    if before.as_ref() != Some(&next) {
        job.status = Some(next);
        ctx.kube.replace_status(&job).await?;
    }

    if phase == Some(PowerToolPhase::Completed) && !was_completed {
        info!(selected, "all diagnostic containers completed");
        ctx.events
            .publish(
                &object_ref(&job),
                EventType::Normal,
                reasons::PROFILING_COMPLETED,
                actions::RECONCILE,
                Some(format!("Profiling finished on {} pods", selected)),
            )
            .await;
    }

    Ok(Action::requeue(requeue_interval(phase)))
}

/// Look up the tool's registry entry and check the namespace allow-list
async fn resolve_tool(
    ctx: &Context,
    job: &PowerTool,
    namespace: &str,
) -> Result<PowerToolConfigSpec, ReconcileError> {
    let tool_name = &job.spec.tool.name;
    let config = ctx
        .registry
        .find(tool_name, namespace)
        .await?
        .ok_or_else(|| ReconcileError::ToolNotFound {
            tool: tool_name.clone(),
            config: tool_config_name(tool_name),
        })?;

    if !config.spec.allows_namespace(namespace) {
        return Err(ReconcileError::NamespaceNotAllowed {
            namespace: namespace.to_string(),
            tool: tool_name.clone(),
        });
    }
    Ok(config.spec)
}

/// Record a configuration error on the job and hand it back for retry.
///
/// Errors that are not configuration errors are returned untouched.
async fn fail_pass(
    ctx: &Context,
    mut job: PowerTool,
    err: ReconcileError,
) -> Result<Action, ReconcileError> {
    if !err.is_configuration_error() {
        return Err(err);
    }

    error!(error = %err, "PowerTool configuration error");
    let mut failed = job.status.clone().unwrap_or_default();
    status::mark_failed(&mut failed, err.to_string());
    job.status = Some(failed);
    if let Err(write_err) = ctx.kube.replace_status(&job).await {
        error!(error = %write_err, "failed to record configuration error in status");
    }
    ctx.events
        .publish(
            &object_ref(&job),
            EventType::Warning,
            reasons::RECONCILE_FAILED,
            actions::RECONCILE,
            Some(err.to_string()),
        )
        .await;
    Err(err)
}

/// Add the diagnostic container to one pod
async fn inject(
    ctx: &Context,
    job: &PowerTool,
    tool: &PowerToolConfigSpec,
    pod: &Pod,
    container: &str,
) -> Result<(), ReconcileError> {
    let collector = collector_env(job, ctx.tokens.as_ref(), &job.name_any()).await?;
    let ephemeral = build_container(job, tool, pod, container, collector.as_ref());
    ctx.kube.add_ephemeral_container(pod, &ephemeral).await?;

    info!(
        pod = %pod.name_any(),
        container,
        image = %tool.image,
        "added diagnostic container"
    );
    metrics::CONTAINERS_CREATED.add(
        1,
        &[
            KeyValue::new("tool", job.spec.tool.name.clone()),
            KeyValue::new("mode", job.spec.output.mode.to_string()),
        ],
    );
    ctx.events
        .publish(
            &object_ref(job),
            EventType::Normal,
            reasons::CONTAINER_INJECTED,
            actions::INJECT,
            Some(format!("Added {} to pod {}", container, pod.name_any())),
        )
        .await;
    Ok(())
}

/// Ephemeral containers cannot be removed from a live pod, so deletion has
/// nothing to clean up. They end on their own or with their pod.
fn handle_deletion(job: &PowerTool) -> Action {
    info!(
        active = job.claimed_pods().count(),
        "PowerTool deleted; diagnostic containers are left to finish"
    );
    Action::await_change()
}

/// Error policy for PowerTool reconciliation
pub fn error_policy(job: Arc<PowerTool>, error: &ReconcileError, _ctx: Arc<Context>) -> Action {
    if error.is_conflict() {
        warn!(job = %job.name_any(), "status changed concurrently; retrying");
    } else if error.is_retryable() {
        warn!(?error, job = %job.name_any(), "PowerTool reconciliation failed; retrying");
    } else {
        error!(
            ?error,
            job = %job.name_any(),
            "PowerTool reconciliation failed; the resource needs a fix"
        );
    }
    Action::requeue(ERROR_REQUEUE_INTERVAL)
}
