//! OAuth access-token minting for the BigQuery API.
//!
//! Implements the JWT-bearer grant for service accounts: an RS256 assertion
//! signed with the account's private key is exchanged at `token_uri` for a
//! short-lived bearer token.
//!
//! Token lifecycle:
//! - Assertions request a 3600 s token lifetime.
//! - Tokens are cached in-process; proactive refresh happens within 5
//!   minutes of expiry.

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AuthError;
use crate::metrics;

use super::credentials::ServiceAccountKey;

/// OAuth scope for read-only BigQuery access.
const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery.readonly";

/// Requested assertion lifetime in seconds (Google's maximum).
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Proactive refresh window: refresh when less than 5 minutes remain.
const REFRESH_WINDOW_SECS: i64 = 300;

/// Default `expires_in` when the token response omits it.
const DEFAULT_EXPIRES_IN_SECS: u64 = 3600;

/// JWT claims for the service-account assertion.
#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Response from the token endpoint.
///
/// `Debug` is manually implemented to redact the token.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

/// Cached access token with its expiry instant.
#[derive(Clone)]
#[derive(Debug)]
struct CachedToken {
    access_token: String,
    /// Unix timestamp (seconds) when the token expires.
    expires_at: i64,
}

/// Where tokens come from.
#[derive(Debug)]
enum CredentialSource {
    /// Mint tokens from a service-account key.
    ServiceAccount(ServiceAccountKey),
    /// Use a pre-issued token as-is (development).
    Static(String),
}

/// Provides valid OAuth bearer tokens for BigQuery calls.
#[derive(Debug)]
pub struct TokenProvider {
    http: reqwest::Client,
    source: CredentialSource,
    cached: RwLock<Option<CachedToken>>,
}

/// Whether a token expiring at `expires_at` should be refreshed at `now`.
fn needs_refresh(expires_at: i64, now: i64) -> bool {
    expires_at - now <= REFRESH_WINDOW_SECS
}

impl TokenProvider {
    /// Build a provider from config, loading the key file if needed.
    pub fn from_config(config: &Config, http: reqwest::Client) -> Result<Self, AuthError> {
        let source = if let Some(token) = &config.gcp_access_token {
            info!("using pre-issued access token from environment");
            CredentialSource::Static(token.clone())
        } else if let Some(path) = &config.gcp_service_account_key {
            let key = ServiceAccountKey::from_file(path)?;
            info!(client_email = %key.client_email, "loaded service-account key");
            CredentialSource::ServiceAccount(key)
        } else {
            return Err(AuthError::NoCredentials);
        };

        Ok(Self {
            http,
            source,
            cached: RwLock::new(None),
        })
    }

    /// Project ID from the key file, if a key is in use.
    pub fn project_id(&self) -> Option<&str> {
        match &self.source {
            CredentialSource::ServiceAccount(key) => Some(&key.project_id),
            CredentialSource::Static(_) => None,
        }
    }

    /// Return a valid bearer token, minting or refreshing as needed.
    pub async fn token(&self) -> Result<String, AuthError> {
        let key = match &self.source {
            CredentialSource::Static(token) => return Ok(token.clone()),
            CredentialSource::ServiceAccount(key) => key,
        };

        let now = chrono::Utc::now().timestamp();

        if let Some(cached) = self.cached.read().await.as_ref() {
            if !needs_refresh(cached.expires_at, now) {
                return Ok(cached.access_token.clone());
            }
        }

        // Re-check under the write lock: another task may have refreshed.
        let mut guard = self.cached.write().await;
        if let Some(cached) = guard.as_ref() {
            if !needs_refresh(cached.expires_at, now) {
                return Ok(cached.access_token.clone());
            }
        }

        debug!("access token missing or near expiry, minting a new one");
        let fresh = self.mint(key, now).await?;
        let token = fresh.access_token.clone();
        *guard = Some(fresh);
        metrics::inc_token_refreshes();

        Ok(token)
    }

    /// Sign an assertion and exchange it at the token endpoint.
    async fn mint(&self, key: &ServiceAccountKey, now: i64) -> Result<CachedToken, AuthError> {
        let claims = AssertionClaims {
            iss: &key.client_email,
            scope: BIGQUERY_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + TOKEN_LIFETIME_SECS,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = key.private_key_id.clone();

        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let assertion = jsonwebtoken::encode(&header, &claims, &encoding_key)?;

        let resp = self
            .http
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::ExchangeFailed {
                status: status.as_u16(),
                body,
            });
        }

        let token_resp: TokenResponse = resp.json().await?;
        let expires_in = token_resp.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);

        debug!(expires_in, "minted access token");

        Ok(CachedToken {
            access_token: token_resp.access_token,
            expires_at: now + expires_in as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn fresh_token_is_not_refreshed() {
        let now = chrono::Utc::now().timestamp();
        assert!(!needs_refresh(now + 3600, now));
    }

    #[test]
    fn token_within_window_is_refreshed() {
        let now = chrono::Utc::now().timestamp();
        assert!(needs_refresh(now + 120, now));
    }

    #[test]
    fn expired_token_is_refreshed() {
        let now = chrono::Utc::now().timestamp();
        assert!(needs_refresh(now - 10, now));
    }

    #[test]
    fn token_response_debug_is_redacted() {
        let resp = TokenResponse {
            access_token: "ya29.secret".to_string(),
            expires_in: Some(3599),
        };
        let debug = format!("{:?}", resp);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("ya29.secret"));
    }

    #[test]
    fn token_response_parsing_defaults_expiry() {
        let resp: TokenResponse =
            serde_json::from_str(r#"{"access_token": "ya29.x"}"#).unwrap();
        assert_eq!(resp.access_token, "ya29.x");
        assert!(resp.expires_in.is_none());
    }

    #[test]
    fn assertion_claims_serialize() {
        let claims = AssertionClaims {
            iss: "svc@p.iam.gserviceaccount.com",
            scope: BIGQUERY_SCOPE,
            aud: "https://oauth2.googleapis.com/token",
            iat: 1_700_000_000,
            exp: 1_700_003_600,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["iss"], "svc@p.iam.gserviceaccount.com");
        assert_eq!(json["scope"], BIGQUERY_SCOPE);
        assert_eq!(json["exp"], 1_700_003_600);
    }

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        let mut config = test_config();
        config.gcp_service_account_key = None;
        config.gcp_access_token = Some("ya29.dev-token".to_string());

        let provider =
            TokenProvider::from_config(&config, reqwest::Client::new()).unwrap();
        assert!(provider.project_id().is_none());
        assert_eq!(provider.token().await.unwrap(), "ya29.dev-token");
    }

    #[test]
    fn missing_credentials_is_an_error() {
        let mut config = test_config();
        config.gcp_service_account_key = None;
        config.gcp_access_token = None;

        let err = TokenProvider::from_config(&config, reqwest::Client::new()).unwrap_err();
        assert!(matches!(err, AuthError::NoCredentials));
    }
}
