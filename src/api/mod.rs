//! HTTP API module for the cost, health, and metrics endpoints.

pub mod auth;
pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
