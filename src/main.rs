//! # Application Deployment Manager
//!
//! Multi-tenant control plane over Deployment records. Serves the
//! deployment REST API, Prometheus metrics and health probes on one port.
//!
//! ```bash
//! # Against the cluster from the ambient kubeconfig
//! app-deployment-manager
//!
//! # Local run without a cluster
//! app-deployment-manager --in-memory --port 8081
//! ```

use anyhow::Result;
use app_deployment_manager::runtime::{initialize, Backend, RuntimeOptions};
use clap::Parser;
use tracing::{info, warn};

/// Application Deployment Manager
#[derive(Debug, Parser)]
#[command(name = "app-deployment-manager", version, about, long_about = None)]
struct Args {
    /// Keep records in process memory instead of the cluster
    #[arg(long)]
    in_memory: bool,

    /// HTTP port; overrides HTTP_PORT
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let options = RuntimeOptions {
        backend: if args.in_memory {
            Backend::InMemory
        } else {
            Backend::Kubernetes
        },
        port: args.port,
    };

    let init_result = initialize(options).await?;
    let mut server_handle = init_result.server_handle;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            server_handle.abort();
        }
        result = &mut server_handle => {
            if let Err(e) = result {
                warn!("HTTP server task ended: {}", e);
            }
            anyhow::bail!("HTTP server stopped unexpectedly");
        }
    }

    Ok(())
}
