//! HTTP API for health checks, Prometheus metrics and the scaler contract

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use scaler_lib::{
    health::{components, ComponentStatus, HealthRegistry},
    observability::{ScalerMetrics, StructuredLogger},
    LabelSelector, Scaler, ScalerContext, ScalerError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: ScalerMetrics,
    pub scaler: Arc<dyn Scaler>,
    pub logger: StructuredLogger,
    pub query_timeout: Duration,
    last_active: Arc<RwLock<Option<bool>>>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        metrics: ScalerMetrics,
        scaler: Arc<dyn Scaler>,
        logger: StructuredLogger,
        query_timeout: Duration,
    ) -> Self {
        Self {
            health_registry,
            metrics,
            scaler,
            logger,
            query_timeout,
            last_active: Arc::new(RwLock::new(None)),
        }
    }

    fn context(&self) -> ScalerContext {
        ScalerContext::with_timeout(self.query_timeout)
    }

    async fn record<T>(&self, operation: &str, outcome: &Result<T, ScalerError>) {
        self.health_registry.record_query(outcome).await;
        if let Err(e) = outcome {
            self.logger.log_query_failure(operation, &e.to_string());
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveResponse {
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MetricsQuery {
    #[serde(rename = "labelSelector")]
    pub label_selector: Option<String>,
}

/// Error returned by the scaler endpoints
pub enum ApiError {
    Scaler(ScalerError),
    BadRequest(String),
}

impl From<ScalerError> for ApiError {
    fn from(e: ScalerError) -> Self {
        ApiError::Scaler(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, error) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            ApiError::Scaler(e) => {
                let (status, code) = match &e {
                    ScalerError::ClusterQuery(_) => {
                        (StatusCode::SERVICE_UNAVAILABLE, "cluster_query_failed")
                    }
                    ScalerError::Cancelled | ScalerError::DeadlineExceeded => {
                        (StatusCode::GATEWAY_TIMEOUT, "query_interrupted")
                    }
                    ScalerError::Config(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "invalid_configuration")
                    }
                };
                (status, code, e.to_string())
            }
        };

        (
            status,
            Json(ErrorResponse {
                error,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

/// Health check response - returns 200 if healthy or degraded, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn active(State(state): State<Arc<AppState>>) -> Result<Json<ActiveResponse>, ApiError> {
    let outcome = state.scaler.is_active(&state.context()).await;
    state.record("is_active", &outcome).await;
    let active = outcome?;

    let mut last = state.last_active.write().await;
    if *last != Some(active) {
        state.logger.log_activation(active);
        *last = Some(active);
    }

    Ok(Json(ActiveResponse { active }))
}

async fn spec(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.scaler.get_metric_spec_for_scaling())
}

async fn metric_values(
    State(state): State<Arc<AppState>>,
    Path(metric_name): Path<String>,
    Query(query): Query<MetricsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    // Parsed so malformed selectors are reported, then handed to the scaler
    let selector = query
        .label_selector
        .as_deref()
        .map(LabelSelector::parse)
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("invalid labelSelector: {e}")))?;

    let outcome = state
        .scaler
        .get_metrics(&state.context(), &metric_name, selector.as_ref())
        .await;
    state.record("get_metrics", &outcome).await;

    Ok(Json(outcome?))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/api/v1/active", get(active))
        .route("/api/v1/spec", get(spec))
        .route("/api/v1/metrics/:metric_name", get(metric_values))
        .with_state(state)
}

/// Start the API server; returns once `shutdown` fires and in-flight requests finish
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let app = create_router(state.clone());

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    state
        .health_registry
        .set_unhealthy(components::SCALER, "shut down")
        .await;
    Ok(())
}
