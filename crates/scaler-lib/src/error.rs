//! Error types for metadata parsing and cluster queries

use crate::selector::SelectorError;
use thiserror::Error;

/// Boxed error from the cluster query transport
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Invalid trigger metadata; raised only while building a scaler
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("no {0} given")]
    MissingField(&'static str),

    #[error("invalid pod selector {selector:?}")]
    InvalidSelectorSyntax {
        selector: String,
        #[source]
        source: Option<SelectorError>,
    },

    #[error("{field} must be an integer greater than 0, got {value:?}")]
    InvalidValue { field: &'static str, value: String },
}

/// Errors surfaced by scaler operations
#[derive(Debug, Error)]
pub enum ScalerError {
    /// The underlying listing call failed; the transport error is kept as-is
    #[error(transparent)]
    ClusterQuery(BoxError),

    #[error("cluster query cancelled")]
    Cancelled,

    #[error("cluster query deadline exceeded")]
    DeadlineExceeded,

    #[error("error parsing kubernetes workload metadata: {0}")]
    Config(#[from] ConfigError),
}

impl ScalerError {
    pub fn cluster_query(err: impl Into<BoxError>) -> Self {
        ScalerError::ClusterQuery(err.into())
    }

    /// True for cancellation and deadline errors raised by the caller's context
    pub fn is_interrupted(&self) -> bool {
        matches!(self, ScalerError::Cancelled | ScalerError::DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_cluster_query_error_is_transparent() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err = ScalerError::cluster_query(io);
        assert_eq!(err.to_string(), "connection refused");
        assert!(!err.is_interrupted());
    }

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::MissingField("podSelector").to_string(),
            "no podSelector given"
        );
        assert_eq!(
            ConfigError::InvalidValue {
                field: "value",
                value: "-1".to_string()
            }
            .to_string(),
            "value must be an integer greater than 0, got \"-1\""
        );
    }

    #[test]
    fn test_selector_error_is_source() {
        let source = crate::selector::LabelSelector::parse("app in ()").unwrap_err();
        let err = ConfigError::InvalidSelectorSyntax {
            selector: "app in ()".to_string(),
            source: Some(source),
        };
        assert!(err.source().is_some());
    }

    #[test]
    fn test_config_error_wraps_into_scaler_error() {
        let err: ScalerError = ConfigError::MissingField("value").into();
        assert_eq!(
            err.to_string(),
            "error parsing kubernetes workload metadata: no value given"
        );
    }
}
