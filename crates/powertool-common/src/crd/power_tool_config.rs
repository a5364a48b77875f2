//! PowerToolConfig CRD types
//!
//! A `PowerToolConfig` is the registry entry for a diagnostic tool: which
//! image runs it, the security posture it needs, and which namespaces may
//! use it. PowerTools look it up by the name `<tool>-config`.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, ResourceSpec};
use crate::Error;

/// Linux capability changes for the diagnostic container
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct CapabilitiesSpec {
    /// Capabilities to add
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<String>,
    /// Capabilities to drop
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drop: Vec<String>,
}

/// Security posture required by a tool
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySpec {
    /// Run the container privileged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_privileged: Option<bool>,
    /// Tool needs the host PID namespace
    #[serde(
        default,
        rename = "allowHostPID",
        skip_serializing_if = "Option::is_none"
    )]
    pub allow_host_pid: Option<bool>,
    /// Capability add/drop lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<CapabilitiesSpec>,
    /// Force uid 0 regardless of the target's identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_as_root: Option<bool>,
}

/// Desired state of a tool registry entry
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "codriverlabs.ai.toe.run",
    version = "v1alpha1",
    kind = "PowerToolConfig",
    plural = "powertoolconfigs",
    shortname = "ptc",
    namespaced,
    status = "PowerToolConfigStatus",
    printcolumn = r#"{"name":"Tool","type":"string","jsonPath":".spec.name"}"#,
    printcolumn = r#"{"name":"Image","type":"string","jsonPath":".spec.image"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PowerToolConfigSpec {
    /// Tool name
    pub name: String,
    /// Image reference of the diagnostic container
    pub image: String,
    /// Security posture
    #[serde(default)]
    pub security_context: SecuritySpec,
    /// Namespaces allowed to use this tool; empty allows all
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_namespaces: Vec<String>,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Tool version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Arguments used when the PowerTool gives none
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_args: Vec<String>,
    /// Default resources for the diagnostic container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourceSpec>,
}

impl PowerToolConfigSpec {
    /// Whether PowerTools in `namespace` may use this tool
    pub fn allows_namespace(&self, namespace: &str) -> bool {
        self.allowed_namespaces.is_empty() || self.allowed_namespaces.iter().any(|n| n == namespace)
    }

    /// Basic structural validation
    pub fn validate(&self, resource: &str) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::validation_for_field(
                resource,
                "spec.name",
                "tool name must not be empty",
            ));
        }
        if self.image.trim().is_empty() {
            return Err(Error::validation_for_field(
                resource,
                "spec.image",
                "image must not be empty",
            ));
        }
        Ok(())
    }
}

/// Lifecycle phase of a PowerToolConfig
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum PowerToolConfigPhase {
    /// Config passed validation
    Ready,
    /// Config failed validation
    Invalid,
}

impl std::fmt::Display for PowerToolConfigPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Invalid => write!(f, "Invalid"),
        }
    }
}

/// Status for a PowerToolConfig
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PowerToolConfigStatus {
    /// Validation phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PowerToolConfigPhase>,
    /// When the config was last validated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validated: Option<DateTime<Utc>>,
    /// Conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> PowerToolConfigSpec {
        serde_json::from_value(serde_json::json!({
            "name": "async-profiler",
            "image": "ghcr.io/example/async-profiler:3.0",
            "securityContext": {
                "allowPrivileged": true,
                "allowHostPID": true,
                "runAsRoot": true,
                "capabilities": {"add": ["SYS_PTRACE"], "drop": ["ALL"]}
            },
            "allowedNamespaces": ["default", "staging"],
            "defaultArgs": ["-e", "cpu"]
        }))
        .expect("decode")
    }

    #[test]
    fn decodes_security_posture() {
        let spec = spec();
        assert_eq!(spec.security_context.allow_privileged, Some(true));
        assert_eq!(spec.security_context.allow_host_pid, Some(true));
        assert_eq!(spec.security_context.run_as_root, Some(true));
        let caps = spec.security_context.capabilities.expect("capabilities");
        assert_eq!(caps.add, vec!["SYS_PTRACE"]);
        assert_eq!(caps.drop, vec!["ALL"]);
        assert_eq!(spec.default_args, vec!["-e", "cpu"]);
    }

    #[test]
    fn namespace_allow_list() {
        let mut spec = spec();
        assert!(spec.allows_namespace("default"));
        assert!(!spec.allows_namespace("prod"));

        spec.allowed_namespaces.clear();
        assert!(spec.allows_namespace("prod"));
    }

    #[test]
    fn validation_requires_name_and_image() {
        let mut spec = spec();
        assert!(spec.validate("async-profiler-config").is_ok());

        spec.image = " ".to_string();
        let err = spec.validate("async-profiler-config").unwrap_err();
        assert!(err.to_string().contains("image"));

        spec.name.clear();
        let err = spec.validate("async-profiler-config").unwrap_err();
        assert!(err.to_string().contains("tool name"));
    }
}
