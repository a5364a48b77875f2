//! Builds the controller futures run by the operator

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use powertool_common::crd::{PowerTool, PowerToolConfig};
use powertool_controller::{
    config_error_policy, error_policy, reconcile, reconcile_config, ConfigContext, Context,
    ControllerConfig,
};

/// Watcher timeout (seconds); must stay below the client read timeout (30s)
/// so the API server closes idle watches first
const WATCH_TIMEOUT_SECS: u32 = 25;

/// A controller future ready to be polled
pub type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Build the PowerTool and PowerToolConfig controllers
///
/// Both watch all namespaces.
pub fn build_controllers(client: Client, config: &ControllerConfig) -> Vec<ControllerFuture> {
    let ctx = Arc::new(Context::new(client.clone(), config));
    let config_ctx = Arc::new(ConfigContext::new(client.clone()));

    let jobs: Api<PowerTool> = Api::all(client.clone());
    let configs: Api<PowerToolConfig> = Api::all(client);

    tracing::info!("- PowerTool controller");
    tracing::info!("- PowerToolConfig controller");

    vec![
        Box::pin(
            Controller::new(jobs, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
                .shutdown_on_signal()
                .run(reconcile, error_policy, ctx)
                .for_each(log_reconcile_result("PowerTool")),
        ),
        Box::pin(
            Controller::new(configs, WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS))
                .shutdown_on_signal()
                .run(reconcile_config, config_error_policy, config_ctx)
                .for_each(log_reconcile_result("PowerToolConfig")),
        ),
    ]
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
