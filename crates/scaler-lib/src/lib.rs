//! Kubernetes workload scaler library
//!
//! This crate provides the core functionality for:
//! - Label selector parsing and matching
//! - Trigger metadata validation
//! - Counting non-terminal pods through a pluggable pod lister
//! - Building external metric specs and values for the autoscaling host
//! - Health checks and observability

pub mod cluster;
pub mod context;
pub mod counter;
pub mod error;
pub mod health;
pub mod metadata;
pub mod models;
pub mod observability;
pub mod publisher;
pub mod scaler;
pub mod selector;

pub use cluster::{KubePodLister, PodLister, SnapshotPodLister};
pub use context::ScalerContext;
pub use error::{ConfigError, ScalerError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use metadata::{parse_workload_metadata, ScalerConfig, WorkloadMetadata};
pub use models::*;
pub use observability::{ScalerMetrics, StructuredLogger};
pub use scaler::{KubernetesWorkloadScaler, Scaler};
pub use selector::{LabelSelector, SelectorError};
