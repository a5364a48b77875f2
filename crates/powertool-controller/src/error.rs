//! Errors returned by PowerTool reconciliation

use powertool_common::duration::DurationError;
use thiserror::Error;

/// Errors that can occur during PowerTool reconciliation
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// No PowerToolConfig exists for the requested tool
    #[error("tool configuration error: tool {tool} not found (looked up {config})")]
    ToolNotFound {
        /// Requested tool name
        tool: String,
        /// Registry entry name that was searched for
        config: String,
    },

    /// The tool's allow-list excludes the job's namespace
    #[error("namespace access denied: namespace {namespace} may not use tool {tool}")]
    NamespaceNotAllowed {
        /// Job namespace
        namespace: String,
        /// Requested tool name
        tool: String,
    },

    /// The target label selector could not be compiled
    #[error("invalid label selector: {0}")]
    InvalidSelector(String),

    /// Missing namespace on resource
    #[error("resource missing namespace")]
    MissingNamespace,

    /// Missing uid on resource; container names are derived from it
    #[error("PowerTool {0} has no uid")]
    MissingUid(String),

    /// The tool duration is not a valid duration string
    #[error("invalid duration {duration:?}: {source}")]
    InvalidDuration {
        /// The offending value
        duration: String,
        /// Parse failure
        #[source]
        source: DurationError,
    },

    /// Output mode requires configuration the job does not carry
    #[error("invalid output configuration: {0}")]
    InvalidOutput(String),

    /// Kubernetes API error
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),

    /// Common crate error
    #[error(transparent)]
    Common(#[from] powertool_common::Error),
}

impl ReconcileError {
    /// Whether this is an optimistic-concurrency failure (HTTP 409)
    pub fn is_conflict(&self) -> bool {
        match self {
            Self::Kube(e) => powertool_common::kube_utils::is_conflict(e),
            Self::Common(powertool_common::Error::Kube { source }) => {
                powertool_common::kube_utils::is_conflict(source)
            }
            _ => false,
        }
    }

    /// Whether retrying without a spec or cluster change can succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Kube(e) => powertool_common::kube_utils::is_retryable(e),
            Self::Common(e) => e.is_retryable(),
            Self::ToolNotFound { .. } | Self::NamespaceNotAllowed { .. } => true,
            Self::InvalidSelector(_)
            | Self::MissingNamespace
            | Self::MissingUid(_)
            | Self::InvalidDuration { .. }
            | Self::InvalidOutput(_) => false,
        }
    }

    /// Errors that stop the pass and are reported as a Failed condition
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound { .. } | Self::NamespaceNotAllowed { .. } | Self::InvalidSelector(_)
        )
    }

    /// Short label used for the error metric
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolNotFound { .. } => "tool_not_found",
            Self::NamespaceNotAllowed { .. } => "namespace_denied",
            Self::InvalidSelector(_) => "invalid_selector",
            Self::MissingNamespace | Self::MissingUid(_) => "invalid_resource",
            Self::InvalidDuration { .. } => "invalid_duration",
            Self::InvalidOutput(_) => "invalid_output",
            Self::Kube(_) if self.is_conflict() => "conflict",
            Self::Kube(_) => "kube",
            Self::Common(_) => "common",
        }
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(e: serde_json::Error) -> Self {
        Self::Common(e.into())
    }
}
