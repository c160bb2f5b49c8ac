//! Offline trigger validation

use anyhow::Result;
use colored::Colorize;
use scaler_lib::{
    metadata::{POD_SELECTOR_KEY, VALUE_KEY},
    parse_workload_metadata, publisher, ScalerConfig, WorkloadMetadata,
};

use crate::output::{print_json, print_success, OutputFormat};

/// Build trigger metadata the same way the daemon does
pub fn build_metadata(
    namespace: &str,
    pod_selector: Option<&str>,
    value: Option<&str>,
    index: usize,
) -> Result<WorkloadMetadata> {
    let mut config = ScalerConfig::new(namespace, index);
    if let Some(selector) = pod_selector {
        config = config.with_metadata(POD_SELECTOR_KEY, selector);
    }
    if let Some(value) = value {
        config = config.with_metadata(VALUE_KEY, value);
    }

    Ok(parse_workload_metadata(&config)?)
}

/// Validate trigger metadata and print the resulting metric spec
pub fn show_spec(
    namespace: &str,
    pod_selector: Option<&str>,
    value: Option<&str>,
    index: usize,
    format: OutputFormat,
) -> Result<()> {
    let metadata = build_metadata(namespace, pod_selector, value, index)?;
    let specs = publisher::metric_spec(&metadata);

    match format {
        OutputFormat::Json => print_json(&specs)?,
        OutputFormat::Table => {
            print_success("Trigger metadata is valid");
            println!();
            println!("Namespace:      {}", metadata.namespace.cyan());
            println!("Pod selector:   {}", metadata.pod_selector.to_string().cyan());
            println!("Metric name:    {}", publisher::metric_name(&metadata).bold());
            println!("Metric type:    {}", publisher::EXTERNAL_METRIC_TYPE);
            println!(
                "Target:         {} {}",
                publisher::AVERAGE_VALUE_TARGET_TYPE,
                metadata.value
            );
        }
    }

    Ok(())
}
