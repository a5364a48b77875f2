//! Shared types used by the PowerTool CRDs

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// =============================================================================
// Conditions
// =============================================================================

/// Status of a condition
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., Ready, Running)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition with the current timestamp
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: Utc::now(),
        }
    }
}

/// Insert or update a condition, keeping at most one entry per type.
///
/// An existing entry is updated in place. Its `lastTransitionTime` only moves
/// when the status value changes.
pub fn set_condition(conditions: &mut Vec<Condition>, condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status != condition.status {
                existing.status = condition.status;
                existing.last_transition_time = condition.last_transition_time;
            }
            existing.reason = condition.reason;
            existing.message = condition.message;
        }
        None => conditions.push(condition),
    }
}

/// Find a condition by type
pub fn find_condition<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

// =============================================================================
// Label selectors
// =============================================================================

/// Label selector over pods
///
/// An empty selector (no labels, no expressions) selects every pod.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Exact key/value matches
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,

    /// Set-based requirements
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_expressions: Vec<LabelSelectorRequirement>,
}

/// A single set-based selector requirement
///
/// The operator is kept as a string so a typo surfaces as a failed
/// condition on the job rather than an undecodable object.
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    /// Label key
    pub key: String,
    /// One of In, NotIn, Exists, DoesNotExist
    pub operator: String,
    /// Values for In/NotIn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Label selector operators
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelSelectorOperator {
    /// Label value must be in the values list
    In,
    /// Label value must not be in the values list
    NotIn,
    /// Label must exist (any value)
    Exists,
    /// Label must not exist
    DoesNotExist,
}

impl LabelSelectorOperator {
    /// Check if a label value matches this operator with the given values
    pub fn matches(&self, label_value: Option<&str>, values: &[String]) -> bool {
        match self {
            Self::In => label_value.is_some_and(|v| values.iter().any(|x| x == v)),
            Self::NotIn => label_value.map_or(true, |v| !values.iter().any(|x| x == v)),
            Self::Exists => label_value.is_some(),
            Self::DoesNotExist => label_value.is_none(),
        }
    }

    /// Whether the operator takes a non-empty values list
    pub fn requires_values(&self) -> bool {
        matches!(self, Self::In | Self::NotIn)
    }
}

impl FromStr for LabelSelectorOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "In" => Ok(Self::In),
            "NotIn" => Ok(Self::NotIn),
            "Exists" => Ok(Self::Exists),
            "DoesNotExist" => Ok(Self::DoesNotExist),
            other => Err(format!("unknown label selector operator {:?}", other)),
        }
    }
}

impl std::fmt::Display for LabelSelectorOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::In => write!(f, "In"),
            Self::NotIn => write!(f, "NotIn"),
            Self::Exists => write!(f, "Exists"),
            Self::DoesNotExist => write!(f, "DoesNotExist"),
        }
    }
}

// =============================================================================
// Resources
// =============================================================================

/// CPU and memory quantities
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ResourceQuantities {
    /// CPU quantity (e.g. "100m")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Memory quantity (e.g. "128Mi")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
}

impl ResourceQuantities {
    fn overlay(&self, other: &ResourceQuantities) -> ResourceQuantities {
        ResourceQuantities {
            cpu: other.cpu.clone().or_else(|| self.cpu.clone()),
            memory: other.memory.clone().or_else(|| self.memory.clone()),
        }
    }

    fn is_empty(&self) -> bool {
        self.cpu.is_none() && self.memory.is_none()
    }
}

/// Resource requests and limits for a diagnostic container
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ResourceSpec {
    /// Minimum resources requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requests: Option<ResourceQuantities>,
    /// Maximum resources allowed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<ResourceQuantities>,
}

impl ResourceSpec {
    /// Field-wise merge where values set in `other` win
    pub fn overlay(&self, other: &ResourceSpec) -> ResourceSpec {
        fn merge(
            base: &Option<ResourceQuantities>,
            top: &Option<ResourceQuantities>,
        ) -> Option<ResourceQuantities> {
            let merged = base
                .clone()
                .unwrap_or_default()
                .overlay(&top.clone().unwrap_or_default());
            (!merged.is_empty()).then_some(merged)
        }

        ResourceSpec {
            requests: merge(&self.requests, &other.requests),
            limits: merge(&self.limits, &other.limits),
        }
    }
}
