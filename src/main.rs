//! BigQuery daily cost API entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bq_cost_api::api::{create_router, AppState};
use bq_cost_api::bigquery::{daily_cost_query, BigQueryClient};
use bq_cost_api::config::Config;
use bq_cost_api::gcp::{ServiceAccountKey, TokenProvider};
use bq_cost_api::metrics;
use bq_cost_api::utils::shutdown_signal;

/// BigQuery daily cost API.
#[derive(Parser, Debug)]
#[command(name = "bq-cost-api")]
#[command(about = "HTTP API estimating the current billing day's BigQuery spend")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT from the environment).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Run {
        /// HTTP server port (overrides PORT from the environment).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration and credential validity.
    CheckConfig,

    /// Run the cost query once and print the result.
    Cost,

    /// Print the generated cost SQL.
    ShowQuery,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("bq_cost_api=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::Cost) => cmd_cost().await,
        Some(Command::ShowQuery) => cmd_show_query(),
        Some(Command::Run { port }) => cmd_run(port).await,
        None => cmd_run(args.port).await,
    }
}

/// Load and validate configuration, logging failures.
fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        anyhow::anyhow!(e)
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    Ok(config)
}

/// Run the HTTP server.
async fn cmd_run(port_override: Option<u16>) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = load_config()?;

    if let Some(port) = port_override {
        config.port = port;
    }

    info!("Configuration loaded successfully");
    info!("Project region: {}", config.bigquery_region);
    info!("Billing timezone: {}", config.billing_timezone);
    info!("Billing day start: {}", config.billing_day_start);
    info!("Price per TiB: ${}", config.price_per_tib_usd);
    info!(
        "Auth: {}",
        if config.auth_enabled() { "bearer token" } else { "OPEN (no API_TOKEN)" }
    );

    // Initialize metrics
    metrics::init_metrics();
    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    // Build the BigQuery client
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    let tokens = Arc::new(TokenProvider::from_config(&config, http)?);
    let client = Arc::new(BigQueryClient::new(&config, tokens)?);
    info!("Querying project: {}", client.project_id());

    let app_state = AppState::new(&config, client, Some(prometheus));

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Check configuration and credential validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BQ COST API - CONFIGURATION CHECK");
    println!("======================================================================");

    // Load configuration
    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    // Check credentials
    print!("Checking credentials... ");
    if config.gcp_access_token.is_some() {
        println!("OK");
        println!("  Using pre-issued access token from environment");
    } else if let Some(path) = &config.gcp_service_account_key {
        match ServiceAccountKey::from_file(path) {
            Ok(key) => {
                println!("OK");
                println!("  Service account: {}", key.client_email);
                println!("  Project: {}", key.project_id);
            }
            Err(e) => {
                println!("FAILED");
                println!("  Error: {}", e);
                return Err(anyhow::anyhow!("Service-account key invalid"));
            }
        }
    }

    // Show configuration summary
    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Region: {}", config.bigquery_region);
    println!("  Billing Timezone: {}", config.billing_timezone);
    println!("  Billing Day Start: {}", config.billing_day_start);
    println!("  Price per TiB: ${}", config.price_per_tib_usd);
    println!("  Query Timeout: {}s", config.query_timeout_secs);
    println!(
        "  Auth: {}",
        if config.auth_enabled() {
            "bearer token configured"
        } else {
            "OPEN ACCESS - set API_TOKEN to protect the cost endpoint"
        }
    );
    println!("  Port: {}", config.port);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Run the cost query once and print the result.
async fn cmd_cost() -> anyhow::Result<()> {
    let config = load_config()?;

    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    let tokens = Arc::new(TokenProvider::from_config(&config, http)?);
    let client = BigQueryClient::new(&config, tokens)?;

    println!("Querying project {}...", client.project_id());

    let sql = daily_cost_query(&config);
    let result = client.query(&sql).await?;

    println!("{}", serde_json::to_string_pretty(&result.rows)?);
    if let Some(bytes) = result.total_bytes_processed {
        println!("({} bytes processed, cache_hit={})", bytes, result.cache_hit);
    }

    Ok(())
}

/// Print the generated cost SQL.
fn cmd_show_query() -> anyhow::Result<()> {
    let config = load_config()?;
    println!("{}", daily_cost_query(&config));
    Ok(())
}
