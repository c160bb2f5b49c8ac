//! Daemon configuration

use anyhow::{Context, Result};
use scaler_lib::metadata::{ScalerConfig, POD_SELECTOR_KEY, VALUE_KEY};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming an optional config file
pub const CONFIG_FILE_ENV: &str = "SCALER_CONFIG_FILE";

/// Daemon configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// Namespace to count pods in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Raw `podSelector` trigger value
    #[serde(default)]
    pub pod_selector: Option<String>,

    /// Raw `value` trigger value
    #[serde(default)]
    pub value: Option<String>,

    /// Ordinal of this trigger among its siblings
    #[serde(default)]
    pub scaler_index: usize,

    /// API server port for probes, metrics and scaler endpoints
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Deadline applied to each request's cluster query
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
}

fn default_namespace() -> String {
    std::env::var("POD_NAMESPACE").unwrap_or_else(|_| "default".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_query_timeout() -> u64 {
    10
}

impl DaemonConfig {
    /// Load configuration from `SCALER_*` environment variables and the
    /// optional file named by `SCALER_CONFIG_FILE`
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::from_sources(
            file.as_deref().map(Path::new),
            config::Environment::with_prefix("SCALER"),
        )
    }

    /// Build from an optional file overlaid with an environment source
    pub fn from_sources(file: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }

        let config = builder
            .add_source(env)
            .build()
            .context("Failed to read scaler configuration")?;

        config
            .try_deserialize()
            .context("Invalid scaler configuration")
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Trigger configuration as the host would hand it to the scaler
    ///
    /// Unset keys stay absent so validation reports them as missing.
    pub fn to_scaler_config(&self) -> ScalerConfig {
        let mut config = ScalerConfig::new(self.namespace.clone(), self.scaler_index);
        if let Some(selector) = &self.pod_selector {
            config = config.with_metadata(POD_SELECTOR_KEY, selector.clone());
        }
        if let Some(value) = &self.value {
            config = config.with_metadata(VALUE_KEY, value.clone());
        }
        config
    }
}
