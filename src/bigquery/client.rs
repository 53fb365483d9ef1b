//! BigQuery REST API client.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::{CostApiError, QueryError};
use crate::gcp::TokenProvider;
use crate::metrics;

use super::rows::{rows_to_json, TableRow, TableSchema};

/// Poll interval while waiting for a slow job to complete.
const POLL_INTERVAL_MS: u64 = 500;

/// BigQuery `jobs.query` client.
#[derive(Debug)]
pub struct BigQueryClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// REST API base URL.
    base_url: String,
    /// Project whose jobs metadata is queried.
    project_id: String,
    /// Job location passed alongside the query.
    location: String,
    /// Overall query deadline in seconds.
    timeout_secs: u64,
    /// Bearer-token source.
    tokens: Arc<TokenProvider>,
}

/// `jobs.query` request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    query: &'a str,
    use_legacy_sql: bool,
    timeout_ms: u64,
    location: &'a str,
}

/// `jobs.query` / `getQueryResults` response body (fields we read).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    #[serde(default)]
    schema: Option<TableSchema>,
    #[serde(default)]
    job_reference: Option<JobReference>,
    #[serde(default)]
    rows: Option<Vec<TableRow>>,
    #[serde(default)]
    job_complete: Option<bool>,
    #[serde(default)]
    errors: Option<Vec<ErrorProto>>,
    #[serde(default)]
    total_bytes_processed: Option<String>,
    #[serde(default)]
    cache_hit: Option<bool>,
}

/// Job identity in a query response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    #[serde(default)]
    job_id: Option<String>,
}

/// In-band error entry from BigQuery.
#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Decoded query result.
#[derive(Debug)]
pub struct QueryResult {
    /// Rows as plain JSON objects keyed by column name.
    pub rows: Vec<Map<String, Value>>,
    /// Bytes scanned, when reported.
    pub total_bytes_processed: Option<u64>,
    /// Whether the result came from BigQuery's cache.
    pub cache_hit: bool,
}

impl BigQueryClient {
    /// Create a client from config with tuned HTTP settings.
    ///
    /// The project is taken from config, falling back to the key file.
    pub fn new(config: &Config, tokens: Arc<TokenProvider>) -> crate::error::Result<Self> {
        let project_id = config
            .gcp_project_id
            .clone()
            .or_else(|| tokens.project_id().map(str::to_owned))
            .ok_or(CostApiError::MissingProject)?;

        let http = reqwest::Client::builder()
            // Query deadline plus slack for the HTTP round trip itself
            .timeout(Duration::from_secs(config.query_timeout_secs + 10))
            .connect_timeout(Duration::from_millis(config.http_connect_timeout_ms))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(config.http_pool_size)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            base_url: config.bigquery_api_url.clone(),
            project_id,
            location: config.bigquery_region.clone(),
            timeout_secs: config.query_timeout_secs,
            tokens,
        })
    }

    /// The project this client queries.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Run a query and wait for its rows.
    ///
    /// Issues `jobs.query`; if the job does not finish within the server-side
    /// wait it polls `getQueryResults` until the configured deadline.
    #[instrument(skip(self, sql))]
    pub async fn query(&self, sql: &str) -> crate::error::Result<QueryResult> {
        let started = Instant::now();
        let result = self.query_inner(sql, started).await;

        metrics::record_query_latency(started);
        match &result {
            Ok(r) => {
                metrics::inc_queries_total();
                debug!(
                    rows = r.rows.len(),
                    cache_hit = r.cache_hit,
                    "query completed"
                );
            }
            Err(e) => {
                metrics::inc_queries_failed();
                warn!(error = %e, "query failed");
            }
        }

        result
    }

    async fn query_inner(&self, sql: &str, started: Instant) -> crate::error::Result<QueryResult> {
        let token = self.tokens.token().await?;

        let url = format!("{}/projects/{}/queries", self.base_url, self.project_id);
        let body = QueryRequest {
            query: sql,
            use_legacy_sql: false,
            timeout_ms: self.timeout_secs * 1000,
            location: &self.location,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(QueryError::from)?;

        let mut resp = Self::decode_response(response).await?;

        // Server-side wait can return before the job finishes; poll it out.
        while resp.job_complete == Some(false) {
            let job_id = resp
                .job_reference
                .as_ref()
                .and_then(|j| j.job_id.clone())
                .ok_or_else(|| {
                    QueryError::ParseError("incomplete job without a job reference".to_string())
                })?;

            if started.elapsed() >= Duration::from_secs(self.timeout_secs) {
                return Err(QueryError::Timeout {
                    job_id,
                    timeout_secs: self.timeout_secs,
                }
                .into());
            }

            debug!(job_id = %job_id, "job not complete, polling");
            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;

            let url = format!(
                "{}/projects/{}/queries/{}",
                self.base_url, self.project_id, job_id
            );
            let response = self
                .http
                .get(&url)
                .bearer_auth(&token)
                .query(&[
                    ("location", self.location.as_str()),
                    ("timeoutMs", "10000"),
                ])
                .send()
                .await
                .map_err(QueryError::from)?;

            resp = Self::decode_response(response).await?;
        }

        if let Some(errors) = &resp.errors {
            if let Some(first) = errors.first() {
                return Err(QueryError::JobFailed {
                    reason: first.reason.clone().unwrap_or_else(|| "unknown".to_string()),
                    message: first.message.clone().unwrap_or_default(),
                }
                .into());
            }
        }

        Ok(Self::decode_rows(resp))
    }

    /// Check the HTTP status and parse the response body.
    async fn decode_response(response: reqwest::Response) -> Result<QueryResponse, QueryError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::RequestFailed {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| QueryError::ParseError(e.to_string()))
    }

    /// Convert a completed response into a [`QueryResult`].
    fn decode_rows(resp: QueryResponse) -> QueryResult {
        let rows = match (&resp.schema, &resp.rows) {
            (Some(schema), Some(rows)) => rows_to_json(schema, rows),
            _ => Vec::new(),
        };

        QueryResult {
            rows,
            total_bytes_processed: resp
                .total_bytes_processed
                .as_deref()
                .and_then(|s| s.parse().ok()),
            cache_hit: resp.cache_hit.unwrap_or(false),
        }
    }
}
