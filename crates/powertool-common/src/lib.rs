//! Common types for PowerTool: CRDs, errors, telemetry and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod duration;
pub mod error;
pub mod events;
pub mod kube_utils;
pub mod metrics;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace for PowerTool system resources (operator, tool configs, collector)
pub const TOE_SYSTEM_NAMESPACE: &str = "toe-system";

/// Service account the collector bearer tokens are issued for
pub const COLLECTOR_SERVICE_ACCOUNT: &str = "toe-collector";

/// Audience requested on collector bearer tokens
pub const COLLECTOR_AUDIENCE: &str = "toe-sdk-collector";

/// Field manager and event reporter name for the PowerTool controller
pub const POWERTOOL_CONTROLLER_NAME: &str = "powertool-controller";

/// Field manager and event reporter name for the PowerToolConfig controller
pub const POWERTOOL_CONFIG_CONTROLLER_NAME: &str = "powertool-config-controller";

/// Suffix appended to a tool name to find its registry entry
pub const TOOL_CONFIG_SUFFIX: &str = "-config";

/// Registry entry name for a tool (`<tool>-config`)
pub fn tool_config_name(tool: &str) -> String {
    format!("{}{}", tool, TOOL_CONFIG_SUFFIX)
}
