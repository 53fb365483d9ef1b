//! Integration tests for the cost API.
//!
//! The ignored tests require real GCP credentials in the environment.
//! Run with: cargo test --test integration -- --ignored
//!
//! Note: These tests interact with the real BigQuery API.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router};
use bq_cost_api::api::{create_router, AppState};
use bq_cost_api::bigquery::{daily_cost_query, BigQueryClient};
use bq_cost_api::config::Config;
use bq_cost_api::error::{CostApiError, QueryError};
use bq_cost_api::gcp::TokenProvider;
use rust_decimal::Decimal;
use serde_json::json;

/// Get a test config from environment.
fn env_config() -> Option<Config> {
    dotenvy::dotenv().ok();

    let key_path = std::env::var("GCP_SERVICE_ACCOUNT_KEY").ok();
    let access_token = std::env::var("GCP_ACCESS_TOKEN").ok();
    if key_path.is_none() && access_token.is_none() {
        return None;
    }

    Some(Config {
        gcp_service_account_key: key_path,
        gcp_access_token: access_token,
        gcp_project_id: std::env::var("GCP_PROJECT_ID").ok(),
        bigquery_region: std::env::var("BIGQUERY_REGION")
            .unwrap_or_else(|_| "europe-west3".to_string()),
        billing_timezone: "Europe/Istanbul".to_string(),
        billing_day_start: "07:00:00".to_string(),
        price_per_tib_usd: Decimal::new(700, 2),
        query_timeout_secs: 60,
        bigquery_api_url: "https://bigquery.googleapis.com/bigquery/v2".to_string(),
        api_token: None,
        port: 0,
        rust_log: "info".to_string(),
        http_connect_timeout_ms: 5000,
        http_pool_size: 10,
    })
}

/// Config pointing at nothing, for local server smoke tests.
fn local_config() -> Config {
    Config {
        gcp_service_account_key: None,
        gcp_access_token: Some("ya29.local-test".to_string()),
        gcp_project_id: Some("local-test".to_string()),
        bigquery_region: "europe-west3".to_string(),
        billing_timezone: "Europe/Istanbul".to_string(),
        billing_day_start: "07:00:00".to_string(),
        price_per_tib_usd: Decimal::new(700, 2),
        query_timeout_secs: 1,
        bigquery_api_url: "http://127.0.0.1:1".to_string(),
        api_token: Some("integration-token".to_string()),
        port: 0,
        rust_log: "info".to_string(),
        http_connect_timeout_ms: 500,
        http_pool_size: 2,
    }
}

/// Serve a router on an ephemeral port, returning its base URL.
async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Build a client pointed at a fake BigQuery backend.
fn client_against(base_url: &str, timeout_secs: u64) -> BigQueryClient {
    let mut config = local_config();
    config.bigquery_api_url = base_url.to_string();
    config.query_timeout_secs = timeout_secs;
    let tokens =
        Arc::new(TokenProvider::from_config(&config, reqwest::Client::new()).unwrap());
    BigQueryClient::new(&config, tokens).unwrap()
}

/// An incomplete query response carrying only the job reference.
fn pending_response(job_id: &str) -> serde_json::Value {
    json!({
        "jobComplete": false,
        "jobReference": {"projectId": "local-test", "jobId": job_id}
    })
}

/// A slow job is polled via getQueryResults until it completes.
#[tokio::test]
async fn slow_job_is_polled_to_completion() {
    let backend = Router::new()
        .route(
            "/projects/:project/queries",
            post(|| async { Json(pending_response("job_slow")) }),
        )
        .route(
            "/projects/:project/queries/:job_id",
            get(|| async {
                Json(json!({
                    "jobComplete": true,
                    "schema": {
                        "fields": [
                            {"name": "estimated_cost_usd", "type": "FLOAT", "mode": "NULLABLE"}
                        ]
                    },
                    "jobReference": {"projectId": "local-test", "jobId": "job_slow"},
                    "rows": [{"f": [{"v": "1.5"}]}],
                    "totalBytesProcessed": "2048",
                    "cacheHit": false
                }))
            }),
        );
    let base = spawn_server(backend).await;

    let client = client_against(&base, 10);
    let result = client.query("SELECT 1").await.unwrap();

    assert_eq!(result.rows.len(), 1);
    assert_eq!(result.rows[0]["estimated_cost_usd"], json!(1.5));
    assert_eq!(result.total_bytes_processed, Some(2048));
}

/// A job that never completes surfaces a timeout with its job id.
#[tokio::test]
async fn stuck_job_times_out_at_the_deadline() {
    let backend = Router::new()
        .route(
            "/projects/:project/queries",
            post(|| async { Json(pending_response("job_stuck")) }),
        )
        .route(
            "/projects/:project/queries/:job_id",
            get(|| async { Json(pending_response("job_stuck")) }),
        );
    let base = spawn_server(backend).await;

    let client = client_against(&base, 1);
    let err = client.query("SELECT 1").await.unwrap_err();

    match err {
        CostApiError::Query(QueryError::Timeout {
            job_id,
            timeout_secs,
        }) => {
            assert_eq!(job_id, "job_stuck");
            assert_eq!(timeout_secs, 1);
        }
        other => panic!("expected a timeout, got: {other}"),
    }
}

/// Serve the router on an ephemeral port and exercise it over real HTTP.
#[tokio::test]
async fn server_smoke_test() {
    let config = local_config();
    let tokens =
        Arc::new(TokenProvider::from_config(&config, reqwest::Client::new()).unwrap());
    let client = Arc::new(BigQueryClient::new(&config, tokens).unwrap());
    let state = AppState::new(&config, client, None);

    let base = spawn_server(create_router(state)).await;
    let http = reqwest::Client::new();

    // Liveness endpoints need no auth.
    let resp = http.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let resp = http.get(format!("{base}/")).send().await.unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["message"], "Server is running");

    // Cost endpoint rejects a missing token...
    let resp = http.get(format!("{base}/api/getCost")).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    // ...and accepts the right one (failing later at the fake backend).
    let resp = http
        .get(format!("{base}/api/getCost"))
        .bearer_auth("integration-token")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
}

/// Mint a real access token from the configured credentials.
#[tokio::test]
#[ignore = "requires GCP credentials"]
async fn test_token_minting() {
    let config = match env_config() {
        Some(c) => c,
        None => {
            println!("Skipping: GCP_SERVICE_ACCOUNT_KEY / GCP_ACCESS_TOKEN not set");
            return;
        }
    };

    let tokens =
        TokenProvider::from_config(&config, reqwest::Client::new()).unwrap();
    let token = tokens.token().await.expect("token minting failed");
    assert!(!token.is_empty());
}

/// Run the real daily-cost query end to end.
#[tokio::test]
#[ignore = "requires GCP credentials"]
async fn test_daily_cost_query() {
    let config = match env_config() {
        Some(c) => c,
        None => {
            println!("Skipping: GCP_SERVICE_ACCOUNT_KEY / GCP_ACCESS_TOKEN not set");
            return;
        }
    };

    let tokens =
        Arc::new(TokenProvider::from_config(&config, reqwest::Client::new()).unwrap());
    let client = BigQueryClient::new(&config, tokens).unwrap();

    let sql = daily_cost_query(&config);
    let result = client.query(&sql).await.expect("query failed");

    // The aggregate query returns exactly one row with the cost column.
    assert_eq!(result.rows.len(), 1);
    assert!(result.rows[0].contains_key("estimated_cost_usd"));

    println!("estimated_cost_usd: {}", result.rows[0]["estimated_cost_usd"]);
}
