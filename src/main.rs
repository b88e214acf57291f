mod configuration;
mod kubernetes;
mod logs;
mod reconciler;
mod workload;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::configuration::ReconcilerConfig;
use crate::kubernetes::kubers::{self, KubeRsBased};
use crate::reconciler::{DeploymentReconciler, ReconcilerClient};
use crate::workload::Handlers;

#[derive(Parser)]
#[command(about = "Create, update and delete Kubernetes Deployments from manifests")]
struct Cli {
    /// YAML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Kubeconfig context to use instead of the current one.
    #[arg(long)]
    context: Option<String>,
    #[arg(long)]
    namespace: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create missing Deployments and update existing ones.
    Apply {
        #[arg(short = 'f', long = "filename")]
        manifest: PathBuf,
    },
    /// Delete Deployments with foreground propagation.
    Delete {
        #[arg(short = 'f', long = "filename")]
        manifest: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => configuration::load_from_yaml(path)?,
        None => ReconcilerConfig::default(),
    }
    .with_overrides(cli.context, cli.namespace);
    logs::init(&config.log_filter)?;

    let client = kubers::connect(config.context.as_ref()).await?;
    let deployments: ReconcilerClient = Arc::new(KubeRsBased::new(client, &config.namespace));
    let span = tracing::info_span!("reconciler", namespace = %config.namespace.0);
    let handlers = Handlers::new(DeploymentReconciler::new(
        deployments,
        config.backoff(),
        span,
    ));

    let (manifest, deleting) = match &cli.command {
        Command::Apply { manifest } => (manifest, false),
        Command::Delete { manifest } => (manifest, true),
    };
    let workloads = workload::load_manifest(manifest)?;
    tracing::debug!(count = workloads.len(), "loaded manifest");

    let mut failed = false;
    for workload in &workloads {
        tracing::debug!(deployment = workload.name().unwrap_or_default(), "reconciling");
        let outcome = if deleting {
            handlers.delete(workload).await
        } else {
            handlers.apply(workload).await
        };
        failed |= !outcome.is_success();
        println!("{outcome}");
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
