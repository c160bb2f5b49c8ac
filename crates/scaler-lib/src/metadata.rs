//! Trigger metadata parsing
//!
//! Turns the raw key/value trigger configuration into an immutable
//! [`WorkloadMetadata`] descriptor. Parsing is all-or-nothing.

use crate::error::ConfigError;
use crate::selector::LabelSelector;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Trigger metadata key holding the label selector expression
pub const POD_SELECTOR_KEY: &str = "podSelector";

/// Trigger metadata key holding the target pod count per replica
pub const VALUE_KEY: &str = "value";

/// Raw scaler configuration handed over by the host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScalerConfig {
    /// Namespace of the scaled object; pods are counted here
    pub namespace: String,
    /// Trigger key/value pairs
    pub trigger_metadata: HashMap<String, String>,
    /// Ordinal of this trigger among its siblings. Uniqueness is up to the caller.
    pub scaler_index: usize,
}

impl ScalerConfig {
    pub fn new(namespace: impl Into<String>, scaler_index: usize) -> Self {
        Self {
            namespace: namespace.into(),
            trigger_metadata: HashMap::new(),
            scaler_index,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.trigger_metadata.insert(key.into(), value.into());
        self
    }
}

/// Validated query descriptor, read-only for the lifetime of a scaler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadMetadata {
    pub namespace: String,
    pub pod_selector: LabelSelector,
    pub value: i64,
    pub scaler_index: usize,
}

/// Validate trigger configuration into a [`WorkloadMetadata`]
pub fn parse_workload_metadata(config: &ScalerConfig) -> Result<WorkloadMetadata, ConfigError> {
    let raw_selector = config
        .trigger_metadata
        .get(POD_SELECTOR_KEY)
        .ok_or(ConfigError::MissingField(POD_SELECTOR_KEY))?;

    let pod_selector =
        LabelSelector::parse(raw_selector).map_err(|e| ConfigError::InvalidSelectorSyntax {
            selector: raw_selector.clone(),
            source: Some(e),
        })?;

    // An empty selector would match every pod in the namespace
    if pod_selector.is_empty() {
        return Err(ConfigError::InvalidSelectorSyntax {
            selector: raw_selector.clone(),
            source: None,
        });
    }

    let raw_value = config
        .trigger_metadata
        .get(VALUE_KEY)
        .ok_or(ConfigError::MissingField(VALUE_KEY))?;

    let value = raw_value
        .parse::<i64>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            field: VALUE_KEY,
            value: raw_value.clone(),
        })?;

    Ok(WorkloadMetadata {
        namespace: config.namespace.clone(),
        pod_selector,
        value,
        scaler_index: config.scaler_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(selector: Option<&str>, value: Option<&str>) -> ScalerConfig {
        let mut config = ScalerConfig::new("default", 0);
        if let Some(selector) = selector {
            config = config.with_metadata(POD_SELECTOR_KEY, selector);
        }
        if let Some(value) = value {
            config = config.with_metadata(VALUE_KEY, value);
        }
        config
    }

    #[test]
    fn test_parse_valid_metadata() {
        let mut cfg = config(Some("app=demo"), Some("1"));
        cfg.scaler_index = 3;
        cfg.namespace = "test-namespace".to_string();

        let meta = parse_workload_metadata(&cfg).unwrap();
        assert_eq!(meta.namespace, "test-namespace");
        assert_eq!(meta.value, 1);
        assert_eq!(meta.scaler_index, 3);
        assert_eq!(meta.pod_selector, LabelSelector::parse("app=demo").unwrap());
    }

    #[test]
    fn test_parse_set_based_selector() {
        let meta = parse_workload_metadata(&config(
            Some("app in (demo1, demo2),deploy in (deploy1, deploy2)"),
            Some("4"),
        ))
        .unwrap();

        assert_eq!(meta.value, 4);
        assert_eq!(
            meta.pod_selector.to_string(),
            "app in (demo1,demo2),deploy in (deploy1,deploy2)"
        );
    }

    #[test]
    fn test_missing_selector() {
        let err = parse_workload_metadata(&config(None, Some("1"))).unwrap_err();
        assert_eq!(err, ConfigError::MissingField(POD_SELECTOR_KEY));
    }

    #[test]
    fn test_empty_selector_is_rejected() {
        for selector in ["", "   "] {
            let err = parse_workload_metadata(&config(Some(selector), Some("1"))).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidSelectorSyntax { source: None, .. }
            ));
        }
    }

    #[test]
    fn test_malformed_selector_is_rejected() {
        let err = parse_workload_metadata(&config(Some("app in demo"), Some("1"))).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidSelectorSyntax {
                source: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_missing_value() {
        let err = parse_workload_metadata(&config(Some("app=demo"), None)).unwrap_err();
        assert_eq!(err, ConfigError::MissingField(VALUE_KEY));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for value in ["", "0", "-1", "1.5", "a", " 2", "99999999999999999999"] {
            let err = parse_workload_metadata(&config(Some("app=demo"), Some(value))).unwrap_err();
            assert_eq!(
                err,
                ConfigError::InvalidValue {
                    field: VALUE_KEY,
                    value: value.to_string()
                },
                "value {value:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_large_value_is_accepted() {
        let meta =
            parse_workload_metadata(&config(Some("app=demo"), Some("9223372036854775807"))).unwrap();
        assert_eq!(meta.value, i64::MAX);
    }
}
