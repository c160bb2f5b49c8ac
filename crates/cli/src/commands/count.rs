//! Ad-hoc pod counting against a cluster or a pod dump

use anyhow::{Context, Result};
use colored::Colorize;
use scaler_lib::{counter, KubePodLister, LabelSelector, PodLister, SnapshotPodLister};
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::config::kubeconfig_path;
use crate::output::{color_phase, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct PodRow {
    #[tabled(rename = "Pod")]
    name: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Counted")]
    counted: String,
}

#[derive(Debug, Serialize)]
struct PodEntry {
    name: String,
    phase: String,
    counted: bool,
}

#[derive(Debug, Serialize)]
struct CountReport {
    namespace: String,
    selector: String,
    pods: Vec<PodEntry>,
    count: i64,
}

/// Build a lister for the cluster named by `kubeconfig`, or the default one
async fn cluster_lister(kubeconfig: Option<&str>) -> Result<KubePodLister> {
    if kubeconfig.is_none() && std::env::var_os("KUBECONFIG").is_none() {
        return KubePodLister::try_default().await;
    }

    let path = kubeconfig_path(kubeconfig)?;
    let kubeconfig = kube::config::Kubeconfig::read_from(&path)
        .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default())
        .await
        .context("Failed to load kubeconfig")?;
    let client = kube::Client::try_from(config).context("Failed to create Kubernetes client")?;

    Ok(KubePodLister::new(client))
}

/// List the pods matching `pod_selector` and show which ones count
pub async fn count_pods(
    namespace: &str,
    pod_selector: &str,
    from_file: Option<&Path>,
    kubeconfig: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let selector = LabelSelector::parse(pod_selector)
        .with_context(|| format!("invalid pod selector {pod_selector:?}"))?;
    if selector.is_empty() {
        anyhow::bail!("pod selector must not be empty");
    }

    let lister: Box<dyn PodLister> = match from_file {
        Some(path) => Box::new(SnapshotPodLister::from_file(path)?),
        None => Box::new(cluster_lister(kubeconfig).await?),
    };

    let pods = lister.list(namespace, &selector).await?;
    let report = CountReport {
        namespace: namespace.to_string(),
        selector: selector.to_string(),
        count: counter::count_observations(&pods),
        pods: pods
            .iter()
            .map(|pod| PodEntry {
                name: pod.name.clone(),
                phase: pod.phase.to_string(),
                counted: counter::count_value(&pod.phase) == 1,
            })
            .collect(),
    };

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            let rows: Vec<PodRow> = report
                .pods
                .iter()
                .map(|pod| PodRow {
                    name: pod.name.clone(),
                    phase: color_phase(&pod.phase, pod.counted),
                    counted: if pod.counted { "yes" } else { "no" }.to_string(),
                })
                .collect();
            print_table(&rows);
            println!();
            println!(
                "{} {} pod(s) in {} match {}",
                "Active:".bold(),
                report.count.to_string().cyan(),
                report.namespace,
                report.selector
            );
        }
    }

    Ok(())
}
