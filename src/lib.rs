//! Daily BigQuery spend estimation API.
//!
//! A small HTTP service that runs one fixed query against BigQuery's
//! `INFORMATION_SCHEMA.JOBS_BY_PROJECT` metadata to estimate the current
//! billing day's on-demand cost, returning the rows as JSON. The cost
//! endpoint can be protected by a static bearer token.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`gcp`]: Service-account credentials and OAuth token minting
//! - [`bigquery`]: REST client, row decoding, and the cost query
//! - [`api`]: HTTP API (cost, health, metrics) and bearer-token auth
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod bigquery;
pub mod config;
pub mod error;
pub mod gcp;
pub mod metrics;
pub mod utils;

pub use config::Config;
pub use error::{CostApiError, Result};
