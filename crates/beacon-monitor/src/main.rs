//! CLI entry point for beacon-monitor.
//!
//! Transitions are written to stdout as JSON lines; logs go to stderr.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use beacon_core::{BeaconConfig, LoadingTransition};
use beacon_gql::{GqlClient, GqlRequest};
use beacon_loading::{LoadingConfig, LoadingManager};

use beacon_monitor::settle::wait_for_idle;
use beacon_monitor::simulate::{run_simulation, SimulationPlan};

#[derive(Parser)]
#[command(name = "beacon-monitor")]
#[command(about = "Drive the Beacon loading manager and print its transitions")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: beacon).
    #[arg(short, long, default_value = "beacon", global = true)]
    config: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run a simulated concurrent workload.
    Simulate {
        /// Number of operations to run.
        #[arg(long, default_value_t = 20)]
        operations: usize,
        /// Maximum operations in flight at once.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
        /// Shortest operation, in milliseconds.
        #[arg(long, default_value_t = 20)]
        min_ms: u64,
        /// Longest operation, in milliseconds.
        #[arg(long, default_value_t = 400)]
        max_ms: u64,
        /// Probability that an operation fails.
        #[arg(long, default_value_t = 0.0)]
        fail_rate: f64,
    },
    /// Send one GraphQL operation to the configured endpoint.
    Query {
        /// GraphQL document.
        #[arg(short, long)]
        query: String,
        /// Variables as a JSON object.
        #[arg(long)]
        variables: Option<String>,
        /// Operation name within the document.
        #[arg(long)]
        operation_name: Option<String>,
        /// Override the configured endpoint.
        #[arg(long)]
        endpoint: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = BeaconConfig::load(&cli.config)?;
    let manager = LoadingManager::new(LoadingConfig::from(&config.loading))?;

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = delivered.clone();
    let printer = manager.subscribe_transitions(move |transition: &LoadingTransition| {
        counter.fetch_add(1, Ordering::Relaxed);
        match serde_json::to_string(transition) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::warn!(error = %e, "Failed to serialize transition"),
        }
    });

    match cli.command {
        Command::Simulate {
            operations,
            concurrency,
            min_ms,
            max_ms,
            fail_rate,
        } => {
            let plan = SimulationPlan {
                operations,
                concurrency,
                min_ms,
                max_ms,
                fail_rate,
            };
            let summary = run_simulation(&manager, &plan).await?;
            wait_for_idle(&manager, Duration::from_secs(1)).await;
            println!(
                "{}",
                serde_json::json!({
                    "summary": summary,
                    "transitions": delivered.load(Ordering::Relaxed),
                })
            );
        }
        Command::Query {
            query,
            variables,
            operation_name,
            endpoint,
        } => {
            if let Some(endpoint) = endpoint {
                config.api.endpoint = endpoint;
            }
            let mut request = GqlRequest::new(query);
            if let Some(raw) = variables {
                request = request.with_variables(serde_json::from_str(&raw)?);
            }
            if let Some(name) = operation_name {
                request = request.with_operation_name(name);
            }

            let client = GqlClient::new(&config.api, manager.clone())?;
            let outcome = client.execute_raw(&request).await;
            wait_for_idle(&manager, Duration::from_secs(1)).await;

            let data = outcome?;
            println!("{}", serde_json::json!({ "data": data }));
        }
    }

    printer.unsubscribe();
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt().with_env_filter(filter).with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
