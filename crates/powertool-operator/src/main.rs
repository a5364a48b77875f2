//! PowerTool operator - on-demand diagnostics for running pods

use clap::Parser;

use powertool_common::kube_utils::create_client;
use powertool_common::telemetry::{init_telemetry, TelemetryConfig};
use powertool_operator::cli::{Cli, ControllerArgs};
use powertool_operator::controller_runner::build_controllers;
use powertool_operator::crds::{ensure_crds_installed, render_crds};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        println!("{}", render_crds()?);
        return Ok(());
    }

    let telemetry = init_telemetry(TelemetryConfig {
        log_format: cli.log_format,
        ..TelemetryConfig::default()
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;
    if telemetry.is_exporting() {
        tracing::info!("OTLP export enabled");
    }

    let result = run_controller(cli.kubeconfig.as_deref(), cli.controller_args()).await;
    telemetry.shutdown();
    result
}

async fn run_controller(
    kubeconfig: Option<&std::path::Path>,
    args: ControllerArgs,
) -> anyhow::Result<()> {
    tracing::info!(
        system_namespace = %args.system_namespace,
        "PowerTool controller starting..."
    );

    let client = create_client(kubeconfig)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    if args.skip_crd_install {
        tracing::info!("Skipping CRD installation");
    } else {
        ensure_crds_installed(&client).await?;
    }

    tracing::info!("Starting controllers:");
    let controllers = build_controllers(client, &args.controller_config());
    futures::future::join_all(controllers).await;

    tracing::info!("PowerTool controller shutting down");
    Ok(())
}
