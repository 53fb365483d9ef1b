//! HTTP API handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{error, warn};

use crate::bigquery::BigQueryClient;
use crate::config::Config;
use crate::metrics;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// BigQuery client.
    pub client: Arc<BigQueryClient>,
    /// The rendered daily-cost SQL.
    pub cost_sql: Arc<String>,
    /// SHA-256 digest of the configured API token, `None` in open mode.
    pub api_token_hash: Option<[u8; 32]>,
    /// Prometheus render handle, when the recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Build app state, hashing the API token once at startup.
    pub fn new(
        config: &Config,
        client: Arc<BigQueryClient>,
        prometheus: Option<PrometheusHandle>,
    ) -> Self {
        let api_token_hash = if config.auth_enabled() {
            config
                .api_token
                .as_deref()
                .map(|t| Sha256::digest(t.as_bytes()).into())
        } else {
            warn!("API_TOKEN is not set; the cost endpoint is unauthenticated");
            None
        };

        Self {
            client,
            cost_sql: Arc::new(crate::bigquery::daily_cost_query(config)),
            api_token_hash,
            prometheus,
        }
    }
}

/// Root response, kept byte-compatible with the original service.
#[derive(Debug, Serialize)]
pub struct RootResponse {
    /// Static liveness message.
    pub message: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Successful cost query response.
#[derive(Debug, Serialize)]
pub struct CostResponse {
    /// Always true on this path.
    pub success: bool,
    /// Result rows keyed by column name.
    pub data: Vec<Map<String, Value>>,
    /// Number of rows returned.
    pub row_count: usize,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always false on this path.
    pub success: bool,
    /// Human-readable error detail.
    pub error: String,
}

/// Root handler - static liveness message.
pub async fn root() -> impl IntoResponse {
    Json(RootResponse {
        message: "Server is running",
    })
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Cost handler - runs the fixed daily-cost query and returns its rows.
/// Any failure maps to HTTP 500 with a JSON error body.
pub async fn get_cost(State(state): State<AppState>) -> axum::response::Response {
    metrics::inc_cost_requests();

    match state.client.query(&state.cost_sql).await {
        Ok(result) => {
            let row_count = result.rows.len();
            Json(CostResponse {
                success: true,
                data: result.rows,
                row_count,
            })
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "cost query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    success: false,
                    error: format!("Error: {e}"),
                }),
            )
                .into_response()
        }
    }
}

/// Prometheus metrics handler.
pub async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
pub(crate) fn test_state(api_token: Option<&str>) -> AppState {
    use crate::gcp::TokenProvider;

    let mut config = crate::config::test_config();
    config.gcp_service_account_key = None;
    config.gcp_access_token = Some("ya29.test".to_string());
    // Nothing listens here; handler tests expect a fast failure.
    config.bigquery_api_url = "http://127.0.0.1:1".to_string();
    config.api_token = api_token.map(str::to_owned);

    let tokens = Arc::new(TokenProvider::from_config(&config, reqwest::Client::new()).unwrap());
    let client = Arc::new(BigQueryClient::new(&config, tokens).unwrap());
    AppState::new(&config, client, None)
}
