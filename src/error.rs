//! Unified error types for the cost API.

use thiserror::Error;

/// Unified error type for the cost API.
#[derive(Error, Debug)]
pub enum CostApiError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Google credential / token error.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// BigQuery query error.
    #[error("query error: {0}")]
    Query(#[from] QueryError),

    /// No project ID available from config or key file.
    #[error("GCP_PROJECT_ID is not set and the credential carries no project")]
    MissingProject,

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Credential loading and token minting errors.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The key file could not be read.
    #[error("failed to read service-account key {path}: {source}")]
    KeyFileRead {
        /// Path that failed.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The key file is not valid service-account JSON.
    #[error("failed to parse service-account key {path}: {reason}")]
    KeyParse {
        /// Path that failed.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// The private key could not be used for signing.
    #[error("failed to sign token assertion: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// The token endpoint rejected the exchange.
    #[error("token exchange failed: HTTP {status} - {body}")]
    ExchangeFailed {
        /// HTTP status returned.
        status: u16,
        /// Response body from the token endpoint.
        body: String,
    },

    /// HTTP transport failure talking to the token endpoint.
    #[error("token request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// No usable credential source is configured.
    #[error("no credential source configured")]
    NoCredentials,
}

/// BigQuery request and result errors.
#[derive(Error, Debug)]
pub enum QueryError {
    /// The API returned a non-success status.
    #[error("query request failed: HTTP {status} - {body}")]
    RequestFailed {
        /// HTTP status returned.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The job finished but reported errors.
    #[error("query job failed: {reason}: {message}")]
    JobFailed {
        /// BigQuery error reason code.
        reason: String,
        /// Human-readable message.
        message: String,
    },

    /// The job did not complete before the deadline.
    #[error("query job {job_id} did not complete within {timeout_secs}s")]
    Timeout {
        /// Job that timed out.
        job_id: String,
        /// Deadline that was exceeded.
        timeout_secs: u64,
    },

    /// Failed to parse the query response.
    #[error("failed to parse query response: {0}")]
    ParseError(String),

    /// HTTP transport failure.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, CostApiError>;
