//! Custom Resource Definitions for PowerTool
//!
//! This module contains the CRDs watched by the PowerTool operator.

mod power_tool;
mod power_tool_config;
mod types;

pub use power_tool::{
    CollectorOutput, OutputMode, OutputSpec, PowerTool, PowerToolPhase, PowerToolSpec,
    PowerToolStatus, PvcOutput, TargetSpec, ToolSpec,
};
pub use power_tool_config::{
    CapabilitiesSpec, PowerToolConfig, PowerToolConfigPhase, PowerToolConfigSpec,
    PowerToolConfigStatus, SecuritySpec,
};
pub use types::{
    find_condition, set_condition, Condition, ConditionStatus, LabelSelector,
    LabelSelectorOperator, LabelSelectorRequirement, ResourceQuantities, ResourceSpec,
};
