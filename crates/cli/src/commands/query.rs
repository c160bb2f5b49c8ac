//! Commands that query a running scaler daemon

use anyhow::Result;
use colored::Colorize;
use k8s_openapi::api::autoscaling::v2::MetricSpec;
use scaler_lib::ExternalMetricValue;
use tabled::Tabled;

use crate::client::{ActiveResponse, ApiClient};
use crate::output::{color_active, format_timestamp, print_json, print_table, OutputFormat};

#[derive(Tabled)]
struct SpecRow {
    #[tabled(rename = "Type")]
    metric_type: String,
    #[tabled(rename = "Metric")]
    name: String,
    #[tabled(rename = "Target")]
    target: String,
}

#[derive(Tabled)]
struct ValueRow {
    #[tabled(rename = "Metric")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
}

pub async fn query_active(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let response: ActiveResponse = client.get("api/v1/active", &[]).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => println!("Workload is {}", color_active(response.active)),
    }

    Ok(())
}

pub async fn query_spec(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let specs: Vec<MetricSpec> = client.get("api/v1/spec", &[]).await?;

    match format {
        OutputFormat::Json => print_json(&specs)?,
        OutputFormat::Table => {
            let rows: Vec<SpecRow> = specs
                .into_iter()
                .map(|spec| {
                    let (name, target) = match spec.external {
                        Some(external) => {
                            let value = external
                                .target
                                .average_value
                                .map(|q| q.0)
                                .unwrap_or_else(|| "-".to_string());
                            (
                                external.metric.name,
                                format!("{} {}", external.target.type_, value),
                            )
                        }
                        None => ("-".to_string(), "-".to_string()),
                    };
                    SpecRow {
                        metric_type: spec.type_,
                        name,
                        target,
                    }
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}

pub async fn query_metrics(
    client: &ApiClient,
    metric_name: &str,
    label_selector: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let path = format!("api/v1/metrics/{}", metric_name);
    let query: Vec<(&str, &str)> = label_selector
        .map(|selector| vec![("labelSelector", selector)])
        .unwrap_or_default();

    let values: Vec<ExternalMetricValue> = client.get(&path, &query).await?;

    match format {
        OutputFormat::Json => print_json(&values)?,
        OutputFormat::Table => {
            let rows: Vec<ValueRow> = values
                .iter()
                .map(|v| ValueRow {
                    name: v.metric_name.clone(),
                    value: v.value.0.bold().to_string(),
                    timestamp: format_timestamp(&v.timestamp),
                })
                .collect();
            print_table(&rows);
        }
    }

    Ok(())
}
