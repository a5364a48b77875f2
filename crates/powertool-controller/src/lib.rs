//! PowerTool reconciliation engine
//!
//! Attaches diagnostic ephemeral containers to the pods selected by a
//! `PowerTool`, keeps one container per (job, pod), detects pods already
//! claimed by another active job, and projects progress into the job status.

pub mod client;
pub mod config_controller;
pub mod conflict;
pub mod container;
pub mod controller;
pub mod env;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod requeue;
pub mod security;
pub mod status;
pub mod targets;
pub mod token;

pub use client::{KubeClient, KubeClientImpl};
pub use config_controller::{config_error_policy, reconcile_config, ConfigContext};
pub use controller::{error_policy, reconcile, Context, ControllerConfig};
pub use error::ReconcileError;
pub use registry::{KubeToolRegistry, SearchScope, ToolRegistry};
pub use token::{KubeTokenIssuer, TokenIssuer};
