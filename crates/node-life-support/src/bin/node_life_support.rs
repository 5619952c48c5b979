//! Node Life Support - keeps selected nodes `Ready` when their kubelet
//! cannot reach the API server.
//!
//! Renews each eligible node's lease and asserts its `Ready` condition every
//! sync interval until SIGINT or SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use node_life_support::config::Args;
use node_life_support::{Error, KubeNodeApi, Scheduler};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Keep selected Kubernetes nodes Ready by impersonating their kubelet heartbeat
#[derive(Parser)]
#[command(name = "node-life-support")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    args: Args,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Run a single sync cycle, print the report as JSON, and exit
    #[arg(long, default_value = "false")]
    once: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum LogFormat {
    #[default]
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,node_life_support=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    info!(
        "Starting node-life-support v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = cli
        .args
        .into_config()
        .context("Invalid configuration")?;

    // In-cluster service account first, then the local kubeconfig.
    let client = kube::Client::try_default()
        .await
        .map_err(Error::Client)
        .context("Failed to initialise Kubernetes client")?;
    info!(
        lease_namespace = %config.lease_namespace,
        dry_run = config.dry_run,
        "Connected to Kubernetes cluster"
    );

    let api = KubeNodeApi::new(client, &config);
    let mut scheduler = Scheduler::new(api, config);

    if cli.once {
        let report = scheduler.run_once().await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    scheduler.run(shutdown).await;
    info!("node-life-support stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
