//! # ADMCTL CLI
//!
//! Operator command line for a running Application Deployment Manager.
//!
//! ## Usage
//!
//! ```bash
//! # Deployments of a tenant
//! admctl --project tenant-a list
//!
//! # One deployment, then the clusters it runs on
//! admctl --project tenant-a get <deployment-id>
//! admctl --project tenant-a clusters <deployment-id>
//!
//! # State bucket counts
//! admctl --project tenant-a status
//!
//! # Remove a deployment together with its dependencies
//! admctl --project tenant-a delete <deployment-id> --all
//! ```

use anyhow::{bail, Context, Result};
use app_deployment_manager::constants::{ACTIVE_PROJECT_ID_HEADER, DEFAULT_HTTP_PORT};
use app_deployment_manager::deployment::{
    ApiDeployment, DeploymentsStatus, ListDeploymentClustersResponse, ListDeploymentsResponse,
};
use app_deployment_manager::server::API_PREFIX;
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::Deserialize;

/// Application Deployment Manager CLI
#[derive(Debug, Parser)]
#[command(name = "admctl")]
#[command(about = "Application Deployment Manager CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the deployment manager
    #[arg(short, long, global = true, env = "ADM_SERVER")]
    server: Option<String>,

    /// Tenant (project) the request acts for
    #[arg(short, long, global = true, env = "ADM_PROJECT")]
    project: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List deployments of the tenant
    List {
        /// Label filter, `key=value[,key=value]`; may repeat
        #[arg(short, long)]
        labels: Vec<String>,

        /// Order clause, e.g. `name desc`
        #[arg(long)]
        order_by: Option<String>,
    },
    /// Show one deployment
    Get {
        /// Deployment ID
        id: String,
    },
    /// Show deployment counts by state
    Status {
        #[arg(short, long)]
        labels: Vec<String>,
    },
    /// List the clusters of a deployment
    Clusters {
        /// Deployment ID
        id: String,
    },
    /// Delete a deployment
    Delete {
        /// Deployment ID
        id: String,

        /// Also delete the deployments it depends on
        #[arg(long)]
        all: bool,
    },
}

#[derive(Deserialize)]
struct DeploymentEnvelope {
    deployment: ApiDeployment,
}

#[derive(Deserialize)]
struct Problem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: Option<String>,
}

/// HTTP client bound to one server and tenant
#[derive(Debug)]
struct AdmClient {
    http: reqwest::Client,
    base_url: String,
    project: String,
}

impl AdmClient {
    fn new(server: Option<String>, project: Option<String>) -> Result<Self> {
        let project = project.context("A project is required (--project or ADM_PROJECT)")?;
        let server = server.unwrap_or_else(|| format!("http://localhost:{DEFAULT_HTTP_PORT}"));
        Ok(Self {
            http: reqwest::Client::builder()
                .build()
                .context("Failed to create HTTP client")?,
            base_url: format!("{}{}", server.trim_end_matches('/'), API_PREFIX),
            project,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header(ACTIVE_PROJECT_ID_HEADER, &self.project)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.context("Request failed")?;
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        match response.json::<Problem>().await {
            Ok(problem) => bail!(
                "{} ({}): {}",
                problem.title,
                status.as_u16(),
                problem.detail.unwrap_or_default()
            ),
            Err(_) => bail!("Request failed with status {status}"),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self
            .send(self.request(reqwest::Method::GET, path).query(query))
            .await?;
        response.json().await.context("Failed to decode response")
    }
}

fn label_query(labels: &[String]) -> Vec<(&'static str, String)> {
    labels.iter().map(|l| ("labels", l.clone())).collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "admctl=warn".into()),
        )
        .init();

    let cli = Cli::parse();
    let client = AdmClient::new(cli.server, cli.project)?;

    match cli.command {
        Commands::List { labels, order_by } => list_command(&client, &labels, order_by).await,
        Commands::Get { id } => get_command(&client, &id).await,
        Commands::Status { labels } => status_command(&client, &labels).await,
        Commands::Clusters { id } => clusters_command(&client, &id).await,
        Commands::Delete { id, all } => delete_command(&client, &id, all).await,
    }
}

async fn list_command(
    client: &AdmClient,
    labels: &[String],
    order_by: Option<String>,
) -> Result<()> {
    let mut query = label_query(labels);
    if let Some(order_by) = order_by {
        query.push(("orderBy", order_by));
    }
    let response: ListDeploymentsResponse = client.get("/deployments", &query).await?;

    if response.deployments.is_empty() {
        println!("No deployments found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<20} {:<24} {:<12} {:<18}",
        "ID", "NAME", "PACKAGE", "VERSION", "STATE"
    );
    println!("{}", "-".repeat(114));
    for d in &response.deployments {
        let state = d.status.as_ref().map(|s| s.state).unwrap_or_default();
        println!(
            "{:<38} {:<20} {:<24} {:<12} {:<18}",
            d.deploy_id,
            d.display_name,
            d.app_name,
            d.app_version,
            state.as_str()
        );
    }
    println!("\n{} deployment(s)", response.total_elements);
    Ok(())
}

async fn get_command(client: &AdmClient, id: &str) -> Result<()> {
    let envelope: DeploymentEnvelope = client.get(&format!("/deployments/{id}"), &[]).await?;
    let d = envelope.deployment;

    println!("Deployment:");
    println!("  ID: {}", d.deploy_id);
    println!("  Name: {}", d.name);
    println!("  Display Name: {}", d.display_name);
    println!("  Package: {} {}", d.app_name, d.app_version);
    println!("  Profile: {}", d.profile_name);
    println!("  Type: {}", d.deployment_type);
    if let Some(ref time) = d.create_time {
        println!("  Created: {time}");
    }
    if let Some(ref status) = d.status {
        println!("\nStatus:");
        println!("  State: {}", status.state.as_str());
        if !status.message.is_empty() {
            println!("  Message: {}", status.message);
        }
        println!(
            "  Clusters: {} total, {} running, {} down, {} unknown",
            status.summary.total,
            status.summary.running,
            status.summary.down,
            status.summary.unknown
        );
    }
    if !d.child_deployment_ids.is_empty() {
        println!("\nDepends on:");
        for child in &d.child_deployment_ids {
            println!("  {child}");
        }
    }
    Ok(())
}

async fn status_command(client: &AdmClient, labels: &[String]) -> Result<()> {
    let counts: DeploymentsStatus = client
        .get("/summary/deployments_status", &label_query(labels))
        .await?;
    for (bucket, count) in [
        ("Total", counts.total),
        ("Running", counts.running),
        ("Down", counts.down),
        ("Deploying", counts.deploying),
        ("Updating", counts.updating),
        ("Terminating", counts.terminating),
        ("Error", counts.error),
        ("Unknown", counts.unknown),
    ] {
        println!("{bucket:<12} {count}");
    }
    Ok(())
}

async fn clusters_command(client: &AdmClient, id: &str) -> Result<()> {
    let response: ListDeploymentClustersResponse = client
        .get(&format!("/deployments/{id}/clusters"), &[])
        .await?;

    if response.clusters.is_empty() {
        println!("Deployment {id} has no clusters yet.");
        return Ok(());
    }

    println!("{:<30} {:<30} {:<18} {:<10}", "ID", "NAME", "STATE", "APPS");
    println!("{}", "-".repeat(90));
    for c in &response.clusters {
        println!(
            "{:<30} {:<30} {:<18} {:<10}",
            c.id,
            c.name,
            c.status.state.as_str(),
            c.apps.len()
        );
    }
    Ok(())
}

async fn delete_command(client: &AdmClient, id: &str, all: bool) -> Result<()> {
    let delete_type = if all { "ALL" } else { "PARENT_ONLY" };
    client
        .send(
            client
                .request(reqwest::Method::DELETE, &format!("/deployments/{id}"))
                .query(&[("deleteType", delete_type)]),
        )
        .await?;
    println!("Deployment {id} deleted");
    Ok(())
}
