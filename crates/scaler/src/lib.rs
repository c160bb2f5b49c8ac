//! Workload scaler daemon
//!
//! Serves a single Kubernetes workload scaler over HTTP next to the
//! health and Prometheus endpoints.

pub mod api;
pub mod config;
