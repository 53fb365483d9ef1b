//! Bearer-token authentication middleware.
//!
//! The configured token is hashed once at startup ([`AppState::new`]); every
//! protected request must carry `Authorization: Bearer <token>`. When no
//! token is configured the middleware passes everything through (open mode).

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::metrics;

use super::handlers::AppState;

/// Axum middleware enforcing the bearer-token check on protected routes.
/// Attach via `axum::middleware::from_fn_with_state`.
pub async fn require_api_token(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let expected_hash = match &state.api_token_hash {
        Some(h) => h,
        None => return next.run(req).await,
    };

    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    // Hash to a fixed-length digest, then compare in constant time so the
    // comparison leaks neither token bytes nor token length.
    let provided_hash: [u8; 32] = Sha256::digest(provided.as_bytes()).into();

    if !bool::from(provided_hash[..].ct_eq(&expected_hash[..])) {
        metrics::inc_unauthorized_requests();
        return (
            axum::http::StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({
                "success": false,
                "error": "invalid or missing API token"
            })),
        )
            .into_response();
    }

    next.run(req).await
}
