//! Environment passed to diagnostic containers
//!
//! Variable names are a contract with the diagnostic images.

use k8s_openapi::api::core::v1::{EnvVar, Pod};
use kube::ResourceExt;

use powertool_common::crd::{OutputMode, PowerTool, PowerToolConfigSpec};

use crate::container::PVC_MOUNT_PATH;
use crate::targets::matching_label;

/// Collector credentials for one container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectorEnv {
    /// Ingestion endpoint
    pub endpoint: String,
    /// Bearer token
    pub token: String,
}

fn var(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        value_from: None,
    }
}

/// Job arguments, or the tool's defaults when the job gives none
pub fn effective_args(job: &PowerTool, tool: &PowerToolConfigSpec) -> Vec<String> {
    match job.spec.tool.args.as_ref() {
        Some(args) if !args.is_empty() => args.clone(),
        _ => tool.default_args.clone(),
    }
}

/// Build the container environment for `job` targeting `pod`
pub fn build_env(
    job: &PowerTool,
    pod: &Pod,
    args: &[String],
    collector: Option<&CollectorEnv>,
) -> Vec<EnvVar> {
    let namespace = pod
        .namespace()
        .or_else(|| job.namespace())
        .unwrap_or_default();

    let mut env = vec![
        var("PROFILER_TOOL", job.spec.tool.name.as_str()),
        var("PROFILER_DURATION", job.spec.tool.duration.as_str()),
        var("TARGET_POD_NAME", pod.name_any()),
        var("TARGET_NAMESPACE", namespace),
        var("OUTPUT_MODE", job.spec.output.mode.to_string()),
        var(
            "POD_MATCHING_LABELS",
            matching_label(job.spec.targets.label_selector.as_ref(), pod.labels()),
        ),
    ];

    if !args.is_empty() {
        env.push(var("TOOL_ARGS", args.join(" ")));
        env.extend(
            args.iter()
                .enumerate()
                .map(|(i, arg)| var(&format!("TOOL_ARG_{}", i), arg.as_str())),
        );
    }

    if job.spec.output.mode == OutputMode::Pvc {
        if let Some(pvc) = &job.spec.output.pvc {
            let path = pvc.path.as_deref().unwrap_or(PVC_MOUNT_PATH);
            env.push(var("PVC_PATH", path));
        }
    }

    if let Some(collector) = collector {
        env.push(var("COLLECTOR_ENDPOINT", collector.endpoint.as_str()));
        env.push(var("COLLECTOR_TOKEN", collector.token.as_str()));
        env.push(var("POWERTOOL_JOB_ID", job.name_any()));
    }

    env
}
