//! Core data models for the workload scaler

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pod lifecycle phase as reported in `status.phase`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
    /// Missing or unrecognised phase string
    Other(String),
}

impl PodPhase {
    /// Parse the raw phase string from a pod status
    pub fn from_status(phase: Option<&str>) -> Self {
        match phase {
            Some("Pending") => PodPhase::Pending,
            Some("Running") => PodPhase::Running,
            Some("Succeeded") => PodPhase::Succeeded,
            Some("Failed") => PodPhase::Failed,
            Some("Unknown") => PodPhase::Unknown,
            Some(other) => PodPhase::Other(other.to_string()),
            None => PodPhase::Other(String::new()),
        }
    }

    /// Succeeded, Failed and Unknown pods do not count towards the workload
    pub fn is_ignored(&self) -> bool {
        matches!(
            self,
            PodPhase::Succeeded | PodPhase::Failed | PodPhase::Unknown
        )
    }
}

impl fmt::Display for PodPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PodPhase::Pending => f.write_str("Pending"),
            PodPhase::Running => f.write_str("Running"),
            PodPhase::Succeeded => f.write_str("Succeeded"),
            PodPhase::Failed => f.write_str("Failed"),
            PodPhase::Unknown => f.write_str("Unknown"),
            PodPhase::Other(raw) if raw.is_empty() => f.write_str("<none>"),
            PodPhase::Other(raw) => f.write_str(raw),
        }
    }
}

/// A pod as seen by a single listing query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodObservation {
    pub name: String,
    pub phase: PodPhase,
}

impl PodObservation {
    pub fn new(name: impl Into<String>, phase: PodPhase) -> Self {
        Self {
            name: name.into(),
            phase,
        }
    }

    pub fn from_pod(pod: &Pod) -> Self {
        let phase = pod
            .status
            .as_ref()
            .and_then(|status| status.phase.as_deref());

        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            phase: PodPhase::from_status(phase),
        }
    }
}

/// External metric sample returned to the autoscaling host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMetricValue {
    pub metric_name: String,
    pub value: Quantity,
    pub timestamp: DateTime<Utc>,
}

impl ExternalMetricValue {
    /// Parse the quantity back into an integer, if it is one
    pub fn as_i64(&self) -> Option<i64> {
        self.value.0.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    #[test]
    fn test_phase_from_status() {
        assert_eq!(PodPhase::from_status(Some("Running")), PodPhase::Running);
        assert_eq!(PodPhase::from_status(Some("Unknown")), PodPhase::Unknown);
        assert_eq!(
            PodPhase::from_status(Some("Evicted")),
            PodPhase::Other("Evicted".to_string())
        );
        assert_eq!(PodPhase::from_status(None), PodPhase::Other(String::new()));
    }

    #[test]
    fn test_ignored_phases() {
        assert!(!PodPhase::Pending.is_ignored());
        assert!(!PodPhase::Running.is_ignored());
        assert!(PodPhase::Succeeded.is_ignored());
        assert!(PodPhase::Failed.is_ignored());
        assert!(PodPhase::Unknown.is_ignored());
        assert!(!PodPhase::Other(String::new()).is_ignored());
    }

    #[test]
    fn test_observation_from_pod() {
        let pod = Pod {
            metadata: ObjectMeta {
                name: Some("web-0".to_string()),
                ..Default::default()
            },
            status: Some(PodStatus {
                phase: Some("Failed".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let observation = PodObservation::from_pod(&pod);
        assert_eq!(observation.name, "web-0");
        assert_eq!(observation.phase, PodPhase::Failed);
    }

    #[test]
    fn test_observation_from_pod_without_status() {
        let observation = PodObservation::from_pod(&Pod::default());
        assert_eq!(observation.phase, PodPhase::Other(String::new()));
        assert!(!observation.phase.is_ignored());
    }

    #[test]
    fn test_metric_value_serializes_camel_case() {
        let value = ExternalMetricValue {
            metric_name: "0-workload-default".to_string(),
            value: Quantity("3".to_string()),
            timestamp: Utc::now(),
        };

        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["metricName"], "0-workload-default");
        assert_eq!(json["value"], "3");
        assert_eq!(value.as_i64(), Some(3));
    }
}
