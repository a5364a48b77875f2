//! Diagnostic ephemeral container construction

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Container, EphemeralContainer, Pod, ResourceRequirements, VolumeMount};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use powertool_common::crd::{
    OutputMode, PowerTool, PowerToolConfigSpec, ResourceQuantities, ResourceSpec,
};
use powertool_common::duration::parse_duration;

use crate::env::{build_env, effective_args, CollectorEnv};
use crate::error::ReconcileError;
use crate::security::build_security_context;
use crate::token::{token_lifetime, TokenIssuer};

/// Mount path of the output volume in pvc mode
pub const PVC_MOUNT_PATH: &str = "/mnt/profiling-storage";

/// Volume name used when the pod has no volume for the declared claim
pub const DEFAULT_PVC_VOLUME_NAME: &str = "profiling-storage";

/// Pod container a diagnostic container attaches to.
///
/// The named container when it exists, otherwise the first one. An empty
/// name counts as no hint.
pub fn target_container<'a>(pod: &'a Pod, hint: Option<&str>) -> Option<&'a Container> {
    let containers = &pod.spec.as_ref()?.containers;
    hint.filter(|h| !h.is_empty())
        .and_then(|h| containers.iter().find(|c| c.name == h))
        .or_else(|| containers.first())
}

/// Name of the pod volume backed by `claim_name`, or the default name
pub fn pvc_volume_name(pod: &Pod, claim_name: &str) -> String {
    pod.spec
        .as_ref()
        .and_then(|s| s.volumes.as_ref())
        .and_then(|volumes| {
            volumes.iter().find(|v| {
                v.persistent_volume_claim
                    .as_ref()
                    .is_some_and(|pvc| pvc.claim_name == claim_name)
            })
        })
        .map(|v| v.name.clone())
        .unwrap_or_else(|| DEFAULT_PVC_VOLUME_NAME.to_string())
}

fn quantities(q: &ResourceQuantities) -> Option<BTreeMap<String, Quantity>> {
    let map: BTreeMap<String, Quantity> = [("cpu", &q.cpu), ("memory", &q.memory)]
        .into_iter()
        .filter_map(|(k, v)| v.as_ref().map(|v| (k.to_string(), Quantity(v.clone()))))
        .collect();
    (!map.is_empty()).then_some(map)
}

/// Convert a resource spec into container requirements
pub fn resource_requirements(spec: &ResourceSpec) -> Option<ResourceRequirements> {
    let requests = spec.requests.as_ref().and_then(quantities);
    let limits = spec.limits.as_ref().and_then(quantities);
    if requests.is_none() && limits.is_none() {
        return None;
    }
    Some(ResourceRequirements {
        requests,
        limits,
        claims: None,
    })
}

/// Tool resources overlaid with the job's own overrides
fn merged_resources(job: &PowerTool, tool: &PowerToolConfigSpec) -> Option<ResourceRequirements> {
    let base = tool.resources.clone().unwrap_or_default();
    let merged = match &job.spec.tool.resources {
        Some(overrides) => base.overlay(overrides),
        None => base,
    };
    resource_requirements(&merged)
}

/// Issue collector credentials when the job uploads to the collector
pub async fn collector_env(
    job: &PowerTool,
    issuer: &dyn TokenIssuer,
    job_name: &str,
) -> Result<Option<CollectorEnv>, ReconcileError> {
    if job.spec.output.mode != OutputMode::Collector {
        return Ok(None);
    }
    let collector = job.spec.output.collector.as_ref().ok_or_else(|| {
        ReconcileError::InvalidOutput("collector mode requires spec.output.collector".to_string())
    })?;

    let duration =
        parse_duration(&job.spec.tool.duration).map_err(|source| ReconcileError::InvalidDuration {
            duration: job.spec.tool.duration.clone(),
            source,
        })?;
    let token = issuer.issue(job_name, token_lifetime(duration)).await?;

    Ok(Some(CollectorEnv {
        endpoint: collector.endpoint.clone(),
        token,
    }))
}

/// Build the ephemeral container for `job` in `pod`
pub fn build_container(
    job: &PowerTool,
    tool: &PowerToolConfigSpec,
    pod: &Pod,
    name: &str,
    collector: Option<&CollectorEnv>,
) -> EphemeralContainer {
    let target = target_container(pod, job.spec.targets.container.as_deref());
    let args = effective_args(job, tool);

    let volume_mounts = match (&job.spec.output.mode, &job.spec.output.pvc) {
        (OutputMode::Pvc, Some(pvc)) => Some(vec![VolumeMount {
            name: pvc_volume_name(pod, &pvc.claim_name),
            mount_path: PVC_MOUNT_PATH.to_string(),
            ..Default::default()
        }]),
        _ => None,
    };

    EphemeralContainer {
        name: name.to_string(),
        image: Some(tool.image.clone()),
        image_pull_policy: Some("Always".to_string()),
        env: Some(build_env(job, pod, &args, collector)),
        security_context: Some(build_security_context(
            &tool.security_context,
            pod,
            target,
        )),
        resources: merged_resources(job, tool),
        volume_mounts,
        target_container_name: target.map(|c| c.name.clone()),
        ..Default::default()
    }
}
