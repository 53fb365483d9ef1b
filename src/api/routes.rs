//! HTTP API route definitions.

use axum::{middleware, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::auth::require_api_token;
use super::handlers::{get_cost, health, render_metrics, root, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/getCost", get(get_cost))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_token,
        ));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
