//! Scaler contract and the Kubernetes workload scaler
//!
//! The host constructs a scaler once, polls it through the [`Scaler`] trait
//! and calls [`Scaler::close`] on teardown. Registry and scheduling live
//! with the host.

use crate::cluster::PodLister;
use crate::context::ScalerContext;
use crate::counter::PodCounter;
use crate::error::ScalerError;
use crate::metadata::{parse_workload_metadata, ScalerConfig, WorkloadMetadata};
use crate::models::ExternalMetricValue;
use crate::publisher;
use crate::selector::LabelSelector;
use async_trait::async_trait;
use k8s_openapi::api::autoscaling::v2::MetricSpec;
use std::sync::Arc;
use tracing::{debug, info};

/// Uniform metric-source contract polled by the autoscaling host
#[async_trait]
pub trait Scaler: Send + Sync {
    /// Whether the workload should be scaled up from zero
    async fn is_active(&self, ctx: &ScalerContext) -> Result<bool, ScalerError>;

    /// Release resources held by the scaler
    async fn close(&self, ctx: &ScalerContext) -> Result<(), ScalerError>;

    /// Metric specs the host should register for this trigger
    fn get_metric_spec_for_scaling(&self) -> Vec<MetricSpec>;

    /// Current values for `metric_name`
    async fn get_metrics(
        &self,
        ctx: &ScalerContext,
        metric_name: &str,
        metric_selector: Option<&LabelSelector>,
    ) -> Result<Vec<ExternalMetricValue>, ScalerError>;
}

/// Scales on the number of non-terminal pods matching a selector
pub struct KubernetesWorkloadScaler {
    metadata: WorkloadMetadata,
    counter: PodCounter,
}

impl KubernetesWorkloadScaler {
    /// Validate `config` and build a scaler over `lister`
    ///
    /// The lister is shared, not owned; closing the scaler leaves it alone.
    pub fn new(lister: Arc<dyn PodLister>, config: &ScalerConfig) -> Result<Self, ScalerError> {
        let metadata = parse_workload_metadata(config)?;

        info!(
            namespace = %metadata.namespace,
            selector = %metadata.pod_selector,
            target_value = metadata.value,
            scaler_index = metadata.scaler_index,
            "Created kubernetes workload scaler"
        );

        Ok(Self {
            metadata,
            counter: PodCounter::new(lister),
        })
    }

    pub fn metadata(&self) -> &WorkloadMetadata {
        &self.metadata
    }

    /// Name of the metric published by [`Scaler::get_metric_spec_for_scaling`]
    pub fn metric_name(&self) -> String {
        publisher::metric_name(&self.metadata)
    }

    /// Number of non-terminal matching pods right now
    pub async fn count_active(&self, ctx: &ScalerContext) -> Result<i64, ScalerError> {
        self.counter.count_active(ctx, &self.metadata).await
    }
}

#[async_trait]
impl Scaler for KubernetesWorkloadScaler {
    async fn is_active(&self, ctx: &ScalerContext) -> Result<bool, ScalerError> {
        let pods = self.count_active(ctx).await?;
        Ok(pods > 0)
    }

    async fn close(&self, _ctx: &ScalerContext) -> Result<(), ScalerError> {
        Ok(())
    }

    fn get_metric_spec_for_scaling(&self) -> Vec<MetricSpec> {
        publisher::metric_spec(&self.metadata)
    }

    // The metric selector is accepted for contract compatibility but not applied.
    async fn get_metrics(
        &self,
        ctx: &ScalerContext,
        metric_name: &str,
        _metric_selector: Option<&LabelSelector>,
    ) -> Result<Vec<ExternalMetricValue>, ScalerError> {
        let pods = self.count_active(ctx).await?;
        debug!(metric_name = %metric_name, value = pods, "Serving workload metric");

        Ok(vec![publisher::metric_value(metric_name, pods)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{POD_SELECTOR_KEY, VALUE_KEY};
    use crate::models::{PodObservation, PodPhase};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Lister replaying a script of outcomes, one per call
    struct ScriptedLister {
        script: Mutex<VecDeque<Result<usize, String>>>,
    }

    impl ScriptedLister {
        fn new(script: Vec<Result<usize, String>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl PodLister for ScriptedLister {
        async fn list(
            &self,
            _namespace: &str,
            _selector: &LabelSelector,
        ) -> Result<Vec<PodObservation>, ScalerError> {
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .expect("lister called more often than scripted");

            match next {
                Ok(running) => Ok((0..running)
                    .map(|i| PodObservation::new(format!("pod-{i}"), PodPhase::Running))
                    .chain(std::iter::once(PodObservation::new(
                        "done",
                        PodPhase::Succeeded,
                    )))
                    .collect()),
                Err(message) => Err(ScalerError::cluster_query(message)),
            }
        }
    }

    fn config(index: usize) -> ScalerConfig {
        ScalerConfig::new("default", index)
            .with_metadata(POD_SELECTOR_KEY, "app=demo")
            .with_metadata(VALUE_KEY, "2")
    }

    #[test]
    fn test_new_rejects_invalid_metadata() {
        let lister = ScriptedLister::new(vec![]);
        let cfg = ScalerConfig::new("default", 0).with_metadata(VALUE_KEY, "1");

        let err = KubernetesWorkloadScaler::new(lister, &cfg).err().unwrap();
        assert!(matches!(err, ScalerError::Config(_)));
        assert!(err
            .to_string()
            .starts_with("error parsing kubernetes workload metadata"));
    }

    #[tokio::test]
    async fn test_is_active_matches_count() {
        for running in [0usize, 1, 3] {
            let scaler =
                KubernetesWorkloadScaler::new(ScriptedLister::new(vec![Ok(running)]), &config(0))
                    .unwrap();
            let active = scaler.is_active(&ScalerContext::new()).await.unwrap();
            assert_eq!(active, running > 0);
        }
    }

    #[tokio::test]
    async fn test_get_metrics_is_not_cached() {
        let lister = ScriptedLister::new(vec![Ok(0), Ok(5), Ok(2)]);
        let scaler = KubernetesWorkloadScaler::new(lister, &config(0)).unwrap();
        let ctx = ScalerContext::new();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let values = scaler
                .get_metrics(&ctx, "0-workload-default", None)
                .await
                .unwrap();
            assert_eq!(values.len(), 1);
            assert_eq!(values[0].metric_name, "0-workload-default");
            seen.push(values[0].as_i64().unwrap());
        }

        assert_eq!(seen, vec![0, 5, 2]);
    }

    #[tokio::test]
    async fn test_get_metrics_ignores_metric_selector() {
        let lister = ScriptedLister::new(vec![Ok(4)]);
        let scaler = KubernetesWorkloadScaler::new(lister, &config(0)).unwrap();
        let unrelated = LabelSelector::parse("team=other").unwrap();

        let values = scaler
            .get_metrics(&ScalerContext::new(), "requested", Some(&unrelated))
            .await
            .unwrap();

        assert_eq!(values[0].metric_name, "requested");
        assert_eq!(values[0].as_i64(), Some(4));
    }

    #[tokio::test]
    async fn test_query_failure_propagates_and_recovers() {
        let lister = ScriptedLister::new(vec![
            Err("connection refused".to_string()),
            Err("connection reset".to_string()),
            Ok(1),
        ]);
        let scaler = KubernetesWorkloadScaler::new(lister, &config(0)).unwrap();
        let ctx = ScalerContext::new();

        let err = scaler.is_active(&ctx).await.unwrap_err();
        assert!(matches!(err, ScalerError::ClusterQuery(_)));
        assert_eq!(err.to_string(), "connection refused");

        let err = scaler.get_metrics(&ctx, "m", None).await.unwrap_err();
        assert_eq!(err.to_string(), "connection reset");

        assert!(scaler.is_active(&ctx).await.unwrap());
    }

    #[tokio::test]
    async fn test_spec_is_pure_and_index_dependent() {
        let a = KubernetesWorkloadScaler::new(ScriptedLister::new(vec![]), &config(0)).unwrap();
        let b = KubernetesWorkloadScaler::new(ScriptedLister::new(vec![]), &config(1)).unwrap();

        assert_eq!(a.get_metric_spec_for_scaling(), a.get_metric_spec_for_scaling());
        assert_eq!(a.metric_name(), "0-workload-default");
        assert_ne!(a.metric_name(), b.metric_name());
    }

    #[tokio::test]
    async fn test_close_always_succeeds() {
        let scaler =
            KubernetesWorkloadScaler::new(ScriptedLister::new(vec![]), &config(0)).unwrap();
        let ctx = ScalerContext::new();
        ctx.cancel();

        tokio_test::assert_ok!(scaler.close(&ctx).await);
    }
}
