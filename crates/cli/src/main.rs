//! Kubernetes workload scaler CLI
//!
//! A command-line tool for validating trigger metadata, counting the pods a
//! trigger would see and querying a running scaler daemon.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{count, query, spec};
use std::path::PathBuf;

/// Kubernetes workload scaler CLI
#[derive(Parser)]
#[command(name = "workload-ctl")]
#[command(author, version, about = "CLI for the Kubernetes workload scaler", long_about = None)]
pub struct Cli {
    /// Scaler API endpoint URL (can also be set via WORKLOAD_CTL_API_URL env var)
    #[arg(long, env = "WORKLOAD_CTL_API_URL")]
    pub api_url: Option<String>,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate trigger metadata and print the metric spec it produces
    Spec {
        /// Namespace the trigger's workload lives in
        #[arg(long, short)]
        namespace: Option<String>,

        /// Label selector for the pods to count
        #[arg(long)]
        pod_selector: Option<String>,

        /// Target number of pods per replica
        #[arg(long)]
        value: Option<String>,

        /// Trigger ordinal within its scaled object
        #[arg(long, default_value_t = 0)]
        index: usize,
    },

    /// Count the non-terminal pods matching a selector
    Count {
        /// Namespace to list pods in
        #[arg(long, short)]
        namespace: Option<String>,

        /// Label selector for the pods to count
        #[arg(long)]
        pod_selector: String,

        /// Read pods from a `kubectl get pods -o json` dump instead of the cluster
        #[arg(long)]
        from_file: Option<PathBuf>,
    },

    /// Query a running scaler daemon
    #[command(subcommand)]
    Query(QueryCommands),
}

#[derive(Subcommand)]
pub enum QueryCommands {
    /// Show whether the workload is active
    Active,

    /// Show the metric spec the scaler publishes
    Spec,

    /// Fetch the current metric value
    Metrics {
        /// Metric name to request
        name: String,

        /// Metric label selector forwarded to the scaler
        #[arg(long)]
        label_selector: Option<String>,
    },
}

async fn run(cli: Cli) -> Result<()> {
    let user_config = config::Config::load()?;

    match cli.command {
        Commands::Spec {
            namespace,
            pod_selector,
            value,
            index,
        } => {
            let namespace = user_config.namespace(namespace);
            spec::show_spec(
                &namespace,
                pod_selector.as_deref(),
                value.as_deref(),
                index,
                cli.format,
            )?;
        }
        Commands::Count {
            namespace,
            pod_selector,
            from_file,
        } => {
            let namespace = user_config.namespace(namespace);
            count::count_pods(
                &namespace,
                &pod_selector,
                from_file.as_deref(),
                cli.kubeconfig.as_deref(),
                cli.format,
            )
            .await?;
        }
        Commands::Query(query_cmd) => {
            let api_url = cli
                .api_url
                .or(user_config.api_url)
                .unwrap_or_else(|| "http://localhost:8080".to_string());
            if cli.verbose {
                output::print_info(&format!("Querying {}", api_url));
            }
            let client = client::ApiClient::new(&api_url)?;

            match query_cmd {
                QueryCommands::Active => query::query_active(&client, cli.format).await?,
                QueryCommands::Spec => query::query_spec(&client, cli.format).await?,
                QueryCommands::Metrics {
                    name,
                    label_selector,
                } => {
                    query::query_metrics(&client, &name, label_selector.as_deref(), cli.format)
                        .await?
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;

    if let Err(e) = run(cli).await {
        if verbose {
            output::print_error(&format!("{:?}", e));
        } else {
            output::print_error(&format!("{:#}", e));
        }
        std::process::exit(1);
    }
}
