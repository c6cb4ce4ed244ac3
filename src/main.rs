//! # Netperf Harness - Main Entry Point
//!
//! Runs one experiment from the command line:
//! 1. **Initialize logging**: structured tracing with the colourised formatter
//! 2. **Parse arguments**: flows, run length, test type and tool settings
//! 3. **Start netserver**: detached, in `--server-ns` if given
//! 4. **Run flows**: one task per flow, each honouring its own start delay
//! 5. **Write results**: the shared store is dumped as JSON
//!
//! A failing flow is logged and leaves no samples for its namespace; the
//! remaining flows still run to completion.

use anyhow::{Context, Result};
use clap::Parser;
use netperf_harness::{
    cli::{Args, HarnessConfig},
    logging::HarnessFormatter,
    results::NetperfResults,
    runner::NetperfRunner,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG takes precedence over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(HarnessFormatter)
        .init();

    info!("Starting Netperf Harness v{}", netperf_harness::VERSION);
    info!("Configuration: {:?}", args);

    let config = HarnessConfig::from_args(&args)?;
    let runner = Arc::new(NetperfRunner::new(&config));
    let store = NetperfResults::shared();

    if let Some(ref server_ns) = args.server_ns {
        runner
            .run_netserver(server_ns)
            .await
            .with_context(|| format!("Failed to start netserver in {}", server_ns))?;
    }

    let requests = args.run_requests();
    let mut handles = Vec::with_capacity(requests.len());
    for request in requests {
        let runner = Arc::clone(&runner);
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let result = runner.run_netperf(&request, &store).await;
            (request, result)
        }));
    }

    let mut failures = 0usize;
    for handle in handles {
        let (request, result) = handle.await.context("Flow task panicked")?;
        match result {
            Ok(report) => info!(
                ns = %report.namespace,
                samples = report.samples,
                mean = report.mean_throughput.unwrap_or_default(),
                peak = report.peak_throughput.unwrap_or_default(),
                "Flow completed"
            ),
            Err(e) => {
                failures += 1;
                error!(ns = request.namespace(), "Flow failed: {}", e);
            }
        }
    }

    store
        .lock()
        .write_json(&args.output_file)
        .with_context(|| format!("Failed to write results to {:?}", args.output_file))?;

    if failures > 0 {
        anyhow::bail!("{} of {} flows failed", failures, args.flows.len());
    }

    info!("Netperf Harness completed successfully");
    Ok(())
}
