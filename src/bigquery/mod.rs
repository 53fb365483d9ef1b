//! BigQuery REST client and the daily-cost query.

pub mod client;
pub mod cost;
pub mod rows;

pub use client::BigQueryClient;
pub use cost::daily_cost_query;
