//! Application configuration loaded from environment variables.

use chrono::NaiveTime;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Google Credentials ===
    /// Path to the service-account key JSON file.
    #[serde(default)]
    pub gcp_service_account_key: Option<String>,

    /// Pre-issued OAuth access token (development override, bypasses the key file).
    #[serde(default)]
    pub gcp_access_token: Option<String>,

    /// Project to query. Falls back to the key file's `project_id`.
    #[serde(default)]
    pub gcp_project_id: Option<String>,

    // === Cost Query Parameters ===
    /// BigQuery region whose INFORMATION_SCHEMA is queried (e.g. europe-west3).
    #[serde(default = "default_region")]
    pub bigquery_region: String,

    /// IANA timezone defining the billing day (e.g. Europe/Istanbul).
    #[serde(default = "default_timezone")]
    pub billing_timezone: String,

    /// Local wall-clock time at which the billing day rolls over (HH:MM:SS).
    #[serde(default = "default_day_start")]
    pub billing_day_start: String,

    /// On-demand price per TiB billed, in USD.
    #[serde(default = "default_price_per_tib")]
    pub price_per_tib_usd: Decimal,

    /// Query timeout in seconds.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    /// BigQuery REST API base URL (overridable for tests).
    #[serde(default = "default_bigquery_url")]
    pub bigquery_api_url: String,

    // === Server Configuration ===
    /// Static bearer token protecting the cost endpoint. Unset = open access.
    #[serde(default)]
    pub api_token: Option<String>,

    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    // === HTTP Client Tuning ===
    /// Connect timeout for outbound requests, in milliseconds.
    #[serde(default = "default_connect_timeout")]
    pub http_connect_timeout_ms: u64,

    /// Idle connection pool size per host.
    #[serde(default = "default_pool_size")]
    pub http_pool_size: usize,
}

fn default_region() -> String {
    "europe-west3".to_string()
}

fn default_timezone() -> String {
    "Europe/Istanbul".to_string()
}

fn default_day_start() -> String {
    "07:00:00".to_string()
}

fn default_price_per_tib() -> Decimal {
    Decimal::new(700, 2) // $7.00
}

fn default_query_timeout() -> u64 {
    60
}

fn default_bigquery_url() -> String {
    "https://bigquery.googleapis.com/bigquery/v2".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_pool_size() -> usize {
    10
}

/// Characters that must not appear in values interpolated into the SQL text.
fn has_sql_unsafe_chars(s: &str) -> bool {
    s.chars().any(|c| matches!(c, '`' | '\'' | '"' | ';' | '\\'))
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.gcp_service_account_key.is_none() && self.gcp_access_token.is_none() {
            return Err(
                "GCP_SERVICE_ACCOUNT_KEY (key file path) or GCP_ACCESS_TOKEN is required"
                    .to_string(),
            );
        }

        if let Some(path) = &self.gcp_service_account_key {
            if path.is_empty() {
                return Err("GCP_SERVICE_ACCOUNT_KEY must not be empty".to_string());
            }
        }

        if self.bigquery_region.is_empty() || has_sql_unsafe_chars(&self.bigquery_region) {
            return Err("BIGQUERY_REGION is empty or contains invalid characters".to_string());
        }

        if self.billing_timezone.is_empty() || has_sql_unsafe_chars(&self.billing_timezone) {
            return Err("BILLING_TIMEZONE is empty or contains invalid characters".to_string());
        }

        if self.day_start_time().is_none() {
            return Err(format!(
                "BILLING_DAY_START must be HH:MM:SS, got '{}'",
                self.billing_day_start
            ));
        }

        if self.price_per_tib_usd <= Decimal::ZERO {
            return Err("PRICE_PER_TIB_USD must be positive".to_string());
        }

        if self.query_timeout_secs == 0 || self.query_timeout_secs > 3600 {
            return Err("QUERY_TIMEOUT_SECS must be between 1 and 3600".to_string());
        }

        Ok(())
    }

    /// Parse the billing day start as a wall-clock time.
    pub fn day_start_time(&self) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(&self.billing_day_start, "%H:%M:%S").ok()
    }

    /// Whether the cost endpoint requires a bearer token.
    pub fn auth_enabled(&self) -> bool {
        self.api_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        gcp_service_account_key: Some("/tmp/key.json".to_string()),
        gcp_access_token: None,
        gcp_project_id: Some("test-project".to_string()),
        bigquery_region: default_region(),
        billing_timezone: default_timezone(),
        billing_day_start: default_day_start(),
        price_per_tib_usd: default_price_per_tib(),
        query_timeout_secs: default_query_timeout(),
        bigquery_api_url: default_bigquery_url(),
        api_token: None,
        port: default_port(),
        rust_log: default_log_level(),
        http_connect_timeout_ms: default_connect_timeout(),
        http_pool_size: default_pool_size(),
    }
}
