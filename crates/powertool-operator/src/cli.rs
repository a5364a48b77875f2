use std::path::PathBuf;

use clap::{Parser, Subcommand};

use powertool_common::telemetry::LogFormat;
use powertool_common::{COLLECTOR_AUDIENCE, COLLECTOR_SERVICE_ACCOUNT, TOE_SYSTEM_NAMESPACE};
use powertool_controller::ControllerConfig;

/// PowerTool - attach diagnostic ephemeral containers to running pods
#[derive(Parser, Debug)]
#[command(name = "powertool", version, about, long_about = None)]
pub struct Cli {
    /// Print the CRD manifests and exit
    #[arg(long)]
    pub crd: bool,

    /// Path to a kubeconfig; in-cluster config is used when unset
    #[arg(long, env = "KUBECONFIG", global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Log line format: json or text
    #[arg(long, env = "POWERTOOL_LOG_FORMAT", default_value = "json", global = true)]
    pub log_format: LogFormat,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Operator modes
#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the PowerTool and PowerToolConfig controllers (default mode)
    Controller(ControllerArgs),
}

/// Flags for the controller mode
#[derive(clap::Args, Debug, Clone, PartialEq)]
pub struct ControllerArgs {
    /// Namespace searched first for tool configs and home of the collector
    #[arg(long, env = "POWERTOOL_SYSTEM_NAMESPACE", default_value = TOE_SYSTEM_NAMESPACE)]
    pub system_namespace: String,

    /// Service account collector tokens are issued for
    #[arg(long, env = "POWERTOOL_COLLECTOR_SERVICE_ACCOUNT", default_value = COLLECTOR_SERVICE_ACCOUNT)]
    pub collector_service_account: String,

    /// Audience of collector tokens
    #[arg(long, env = "POWERTOOL_COLLECTOR_AUDIENCE", default_value = COLLECTOR_AUDIENCE)]
    pub collector_audience: String,

    /// Do not install or update CRDs on startup
    #[arg(long)]
    pub skip_crd_install: bool,
}

impl Default for ControllerArgs {
    fn default() -> Self {
        Self {
            system_namespace: TOE_SYSTEM_NAMESPACE.to_string(),
            collector_service_account: COLLECTOR_SERVICE_ACCOUNT.to_string(),
            collector_audience: COLLECTOR_AUDIENCE.to_string(),
            skip_crd_install: false,
        }
    }
}

impl ControllerArgs {
    /// Settings for the PowerTool controller context
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            system_namespace: self.system_namespace.clone(),
            collector_service_account: self.collector_service_account.clone(),
            collector_audience: self.collector_audience.clone(),
        }
    }
}

impl Cli {
    /// Controller flags; a bare invocation runs the controller with defaults
    pub fn controller_args(&self) -> ControllerArgs {
        match &self.command {
            Some(Commands::Controller(args)) => args.clone(),
            None => ControllerArgs::default(),
        }
    }
}
