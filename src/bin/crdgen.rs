//! Print the CustomResourceDefinitions the deployment manager owns.
//!
//! ```bash
//! crdgen > config/crd/app-deployment-manager.yaml
//! ```

use anyhow::{Context, Result};
use app_deployment_manager::crd::{APIExtension, Cluster, Deployment, DeploymentCluster};
use kube::CustomResourceExt;

fn main() -> Result<()> {
    let crds = [
        Deployment::crd(),
        DeploymentCluster::crd(),
        APIExtension::crd(),
        Cluster::crd(),
    ];
    let documents = crds
        .iter()
        .map(|crd| serde_yaml::to_string(crd).context("Failed to serialize CRD"))
        .collect::<Result<Vec<_>>>()?;
    print!("{}", documents.join("---\n"));
    Ok(())
}
