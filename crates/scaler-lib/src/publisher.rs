//! Metric spec and metric value construction
//!
//! Both mappings are pure: no I/O, and the metric spec only depends on the
//! workload metadata.

use crate::metadata::WorkloadMetadata;
use crate::models::ExternalMetricValue;
use chrono::Utc;
use k8s_openapi::api::autoscaling::v2::{
    ExternalMetricSource, MetricIdentifier, MetricSpec, MetricTarget,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// HPA metric source type used for every spec
pub const EXTERNAL_METRIC_TYPE: &str = "External";

/// Target type: the host divides the metric by the target per replica
pub const AVERAGE_VALUE_TARGET_TYPE: &str = "AverageValue";

/// Replace characters that are not allowed in metric names with `-`
pub fn normalize_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '.' | ':' | '%' => '-',
            c => c,
        })
        .collect()
}

/// Prefix a metric name with the trigger's ordinal
pub fn generate_metric_name_with_index(scaler_index: usize, metric_name: &str) -> String {
    format!("{scaler_index}-{metric_name}")
}

/// `{scalerIndex}-workload-{namespace}`, normalised
pub fn metric_name(metadata: &WorkloadMetadata) -> String {
    generate_metric_name_with_index(
        metadata.scaler_index,
        &normalize_string(&format!("workload-{}", metadata.namespace)),
    )
}

/// Integer as a plain decimal quantity, no suffix
pub fn decimal_quantity(value: i64) -> Quantity {
    Quantity(value.to_string())
}

/// The single external metric the host should scale on
pub fn metric_spec(metadata: &WorkloadMetadata) -> Vec<MetricSpec> {
    let external = ExternalMetricSource {
        metric: MetricIdentifier {
            name: metric_name(metadata),
            selector: None,
        },
        target: MetricTarget {
            type_: AVERAGE_VALUE_TARGET_TYPE.to_string(),
            average_value: Some(decimal_quantity(metadata.value)),
            ..Default::default()
        },
    };

    vec![MetricSpec {
        type_: EXTERNAL_METRIC_TYPE.to_string(),
        external: Some(external),
        ..Default::default()
    }]
}

/// Wrap a fresh count under the name the host asked for
///
/// The name is passed through as-is, it is not checked against [`metric_name`].
pub fn metric_value(requested_name: &str, count: i64) -> ExternalMetricValue {
    ExternalMetricValue {
        metric_name: requested_name.to_string(),
        value: decimal_quantity(count),
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::LabelSelector;

    fn metadata(namespace: &str, scaler_index: usize, value: i64) -> WorkloadMetadata {
        WorkloadMetadata {
            namespace: namespace.to_string(),
            pod_selector: LabelSelector::parse("app=demo").unwrap(),
            value,
            scaler_index,
        }
    }

    #[test]
    fn test_normalize_string() {
        assert_eq!(normalize_string("workload-default"), "workload-default");
        assert_eq!(normalize_string("a/b.c:d%e"), "a-b-c-d-e");
    }

    #[test]
    fn test_metric_names() {
        let cases = [
            (metadata("test-namespace", 0, 1), "0-workload-test-namespace"),
            (metadata("test-namespace", 1, 2), "1-workload-test-namespace"),
            (metadata("default", 5, 1), "5-workload-default"),
        ];

        for (meta, expected) in cases {
            assert_eq!(metric_name(&meta), expected);
        }
    }

    #[test]
    fn test_metric_spec_shape() {
        let specs = metric_spec(&metadata("default", 2, 10));
        assert_eq!(specs.len(), 1);

        let spec = &specs[0];
        assert_eq!(spec.type_, "External");

        let external = spec.external.as_ref().unwrap();
        assert_eq!(external.metric.name, "2-workload-default");
        assert_eq!(external.target.type_, "AverageValue");
        assert_eq!(
            external.target.average_value,
            Some(Quantity("10".to_string()))
        );
        assert!(external.target.value.is_none());
    }

    #[test]
    fn test_metric_spec_is_deterministic() {
        let meta = metadata("default", 0, 3);
        assert_eq!(metric_spec(&meta), metric_spec(&meta));
    }

    #[test]
    fn test_distinct_indices_give_distinct_names() {
        let a = metric_spec(&metadata("default", 0, 3));
        let b = metric_spec(&metadata("default", 1, 3));
        assert_ne!(
            a[0].external.as_ref().unwrap().metric.name,
            b[0].external.as_ref().unwrap().metric.name
        );
    }

    #[test]
    fn test_metric_value_passes_name_through() {
        let value = metric_value("anything-the-host-asked", 7);
        assert_eq!(value.metric_name, "anything-the-host-asked");
        assert_eq!(value.value, Quantity("7".to_string()));
    }

    #[test]
    fn test_metric_value_zero() {
        assert_eq!(metric_value("m", 0).value.0, "0");
    }
}
