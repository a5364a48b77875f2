//! PowerTool CRD types
//!
//! A `PowerTool` asks the operator to attach a diagnostic ephemeral container
//! running a named tool to every pod matched by its selector, for a bounded
//! duration, and to report per-pod progress in its status.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, LabelSelector, ResourceSpec};

// =============================================================================
// Phase
// =============================================================================

/// Lifecycle phase of a PowerTool
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum PowerToolPhase {
    /// Initialized, targets not yet instrumented
    Pending,
    /// At least one diagnostic container is still running
    Running,
    /// A target pod is already claimed by another active PowerTool
    Conflicted,
    /// Every diagnostic container has finished
    Completed,
    /// Terminal failure
    Failed,
}

impl PowerToolPhase {
    /// Completed and Failed are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for PowerToolPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Running => write!(f, "Running"),
            Self::Conflicted => write!(f, "Conflicted"),
            Self::Completed => write!(f, "Completed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// Output
// =============================================================================

/// Where the diagnostic container writes its results
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Results stay inside the ephemeral container
    #[default]
    Ephemeral,
    /// Results are written to a mounted persistent volume claim
    Pvc,
    /// Results are uploaded to the collector service
    Collector,
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ephemeral => write!(f, "ephemeral"),
            Self::Pvc => write!(f, "pvc"),
            Self::Collector => write!(f, "collector"),
        }
    }
}

/// PVC output configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PvcOutput {
    /// Claim that must already be mounted in the target pod
    pub claim_name: String,
    /// Directory inside the mount to write to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// Collector output configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct CollectorOutput {
    /// Collector ingestion URL
    pub endpoint: String,
}

/// Output section of a PowerTool spec
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct OutputSpec {
    /// Output mode
    #[serde(default)]
    pub mode: OutputMode,
    /// Required when mode is `pvc`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pvc: Option<PvcOutput>,
    /// Required when mode is `collector`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collector: Option<CollectorOutput>,
}

// =============================================================================
// Spec
// =============================================================================

/// Which pods to instrument
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetSpec {
    /// Pods in the PowerTool's namespace matching this selector are targeted.
    /// A missing selector matches nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_selector: Option<LabelSelector>,
    /// Container whose process namespace and identity the tool attaches to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
}

/// Which tool to run and for how long
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ToolSpec {
    /// Tool name, resolved to a `<name>-config` PowerToolConfig
    pub name: String,
    /// Profiling window (e.g. "30s", "5m")
    pub duration: String,
    /// Positional arguments passed to the tool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    /// Resource overrides for the diagnostic container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
}

/// Desired state of a PowerTool profiling job
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "codriverlabs.ai.toe.run",
    version = "v1alpha1",
    kind = "PowerTool",
    plural = "powertools",
    shortname = "pt",
    namespaced,
    status = "PowerToolStatus",
    printcolumn = r#"{"name":"Tool","type":"string","jsonPath":".spec.tool.name"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Selected","type":"integer","jsonPath":".status.selectedPods"}"#,
    printcolumn = r#"{"name":"Completed","type":"integer","jsonPath":".status.completedPods"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
pub struct PowerToolSpec {
    /// Target pods
    pub targets: TargetSpec,
    /// Tool to run
    pub tool: ToolSpec,
    /// Result destination
    #[serde(default)]
    pub output: OutputSpec,
}

// =============================================================================
// Status
// =============================================================================

/// Status for a PowerTool
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PowerToolStatus {
    /// Current phase, unset until the first reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PowerToolPhase>,

    /// Number of pods matched at the last resolution
    #[serde(default)]
    pub selected_pods: u32,

    /// Number of matched pods whose diagnostic container has finished
    #[serde(default)]
    pub completed_pods: u32,

    /// Pod name to diagnostic container name, for containers still running
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub active_pods: BTreeMap<String, String>,

    /// Conditions, at most one per type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// When the first reconciliation initialized the job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job transitioned to Completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    /// Most recent error observed while reconciling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PowerTool {
    /// Current phase, if the job has been initialized
    pub fn phase(&self) -> Option<PowerToolPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// Pods this job currently claims
    pub fn claimed_pods(&self) -> impl Iterator<Item = &str> {
        self.status
            .iter()
            .flat_map(|s| s.active_pods.keys().map(String::as_str))
    }

    /// Whether the job is in Completed or Failed
    pub fn is_terminal(&self) -> bool {
        self.phase().is_some_and(|p| p.is_terminal())
    }
}
