//! Cluster query collaborators
//!
//! The scaler only needs one thing from the cluster: the pods matching a
//! label selector in a namespace. [`PodLister`] is that seam.

use crate::error::ScalerError;
use crate::models::PodObservation;
use crate::selector::LabelSelector;
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams};
use kube::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Scoped pod listing
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait PodLister: Send + Sync {
    /// List the pods in `namespace` matching `selector`
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<PodObservation>, ScalerError>;
}

/// Lists pods through the Kubernetes API server
#[derive(Clone)]
pub struct KubePodLister {
    client: Client,
}

impl KubePodLister {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a lister from the in-cluster config or local kubeconfig
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .context("Failed to create Kubernetes client")?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl PodLister for KubePodLister {
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<PodObservation>, ScalerError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&selector.to_string());

        let list = pods.list(&params).await.map_err(ScalerError::cluster_query)?;
        debug!(
            namespace = %namespace,
            selector = %selector,
            pods = list.items.len(),
            "Listed pods"
        );

        Ok(list.items.iter().map(PodObservation::from_pod).collect())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PodListFile {
    List { items: Vec<Pod> },
    Bare(Vec<Pod>),
}

/// Evaluates selectors against a fixed set of pods
///
/// Used for offline evaluation of `kubectl get pods -o json` dumps.
#[derive(Debug, Clone, Default)]
pub struct SnapshotPodLister {
    pods: Vec<Pod>,
}

impl SnapshotPodLister {
    pub fn new(pods: Vec<Pod>) -> Self {
        Self { pods }
    }

    /// Parse a pod list (`{"items": [...]}`) or a bare JSON array of pods
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: PodListFile =
            serde_json::from_str(json).context("Failed to parse pod list JSON")?;
        let pods = match parsed {
            PodListFile::List { items } => items,
            PodListFile::Bare(pods) => pods,
        };
        Ok(Self::new(pods))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn len(&self) -> usize {
        self.pods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pods.is_empty()
    }
}

#[async_trait]
impl PodLister for SnapshotPodLister {
    async fn list(
        &self,
        namespace: &str,
        selector: &LabelSelector,
    ) -> Result<Vec<PodObservation>, ScalerError> {
        let no_labels = BTreeMap::new();

        Ok(self
            .pods
            .iter()
            .filter(|pod| pod.metadata.namespace.as_deref() == Some(namespace))
            .filter(|pod| selector.matches(pod.metadata.labels.as_ref().unwrap_or(&no_labels)))
            .map(PodObservation::from_pod)
            .collect())
    }
}
