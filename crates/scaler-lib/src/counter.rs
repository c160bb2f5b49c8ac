//! Active pod counting

use crate::cluster::PodLister;
use crate::context::ScalerContext;
use crate::error::ScalerError;
use crate::metadata::WorkloadMetadata;
use crate::models::{PodObservation, PodPhase};
use crate::observability::ScalerMetrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Contribution of a single pod to the workload count
pub fn count_value(phase: &PodPhase) -> i64 {
    if phase.is_ignored() {
        0
    } else {
        1
    }
}

/// Sum of [`count_value`] over a listing
pub fn count_observations(pods: &[PodObservation]) -> i64 {
    pods.iter().map(|pod| count_value(&pod.phase)).sum()
}

/// Counts non-terminal pods with one listing query per call
#[derive(Clone)]
pub struct PodCounter {
    lister: Arc<dyn PodLister>,
    metrics: ScalerMetrics,
}

impl PodCounter {
    pub fn new(lister: Arc<dyn PodLister>) -> Self {
        Self {
            lister,
            metrics: ScalerMetrics::new(),
        }
    }

    /// List the matching pods and count those not Succeeded, Failed or Unknown
    ///
    /// Lister errors come back unchanged; nothing is retried.
    pub async fn count_active(
        &self,
        ctx: &ScalerContext,
        metadata: &WorkloadMetadata,
    ) -> Result<i64, ScalerError> {
        self.metrics.inc_polls();
        let start = Instant::now();

        let result = ctx
            .run(
                self.lister
                    .list(&metadata.namespace, &metadata.pod_selector),
            )
            .await;
        self.metrics
            .observe_query_latency(start.elapsed().as_secs_f64());

        let pods = match result {
            Ok(pods) => pods,
            Err(e) => {
                self.metrics.inc_query_errors(match e {
                    ScalerError::Cancelled => "cancelled",
                    ScalerError::DeadlineExceeded => "deadline",
                    _ => "cluster",
                });
                return Err(e);
            }
        };

        let count = count_observations(&pods);
        self.metrics
            .set_active_pods(&metadata.namespace, metadata.scaler_index, count);

        debug!(
            namespace = %metadata.namespace,
            selector = %metadata.pod_selector,
            listed = pods.len(),
            active = count,
            "Counted workload pods"
        );

        Ok(count)
    }
}
