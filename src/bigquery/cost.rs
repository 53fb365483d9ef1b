//! The fixed daily-cost SQL statement.
//!
//! Estimates the current billing day's on-demand spend by summing
//! `total_bytes_billed` over the region's `INFORMATION_SCHEMA.JOBS_BY_PROJECT`
//! and pricing it per TiB. The billing day runs from the configured local
//! wall-clock start time to the same time the next day.

use crate::config::Config;

/// Render the daily-cost SQL from config.
///
/// Interpolated values are validated by [`Config::validate`]; callers must
/// not pass an unvalidated config.
pub fn daily_cost_query(config: &Config) -> String {
    format!(
        "SELECT\n\
         SUM((total_bytes_billed/POW(1024, 4)) * {price}) AS estimated_cost_usd\n\
         FROM `region-{region}`.INFORMATION_SCHEMA.JOBS_BY_PROJECT\n\
         WHERE creation_time BETWEEN TIMESTAMP(DATETIME(CURRENT_DATE(\"{tz}\"), TIME '{start}'), \"{tz}\")\n\
         AND TIMESTAMP(DATETIME(DATE_ADD(CURRENT_DATE(\"{tz}\"), INTERVAL 1 DAY), TIME '{start}'), \"{tz}\")",
        price = config.price_per_tib_usd,
        region = config.bigquery_region,
        tz = config.billing_timezone,
        start = config.billing_day_start,
    )
}
