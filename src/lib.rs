//! # Netperf Harness Library
//!
//! Drives netperf across pairs of network namespaces, collects the periodic
//! throughput samples netperf reports while a test runs, and aggregates them
//! into a per-namespace, time-indexed result series.
//!
//! ## Architecture Overview
//!
//! Data flows through the modules in this order:
//!
//! - `command`: builds the netserver and netperf argument vectors
//! - `process`: launches them, detached or waiting for output
//! - `parser`: turns interim markers into timestamped samples
//! - `results`: merges samples into the shared store under one lock
//! - `runner`: the per-flow orchestrator tying the steps together
//!
//! Namespace creation, the choice of which pairs to measure and for how long,
//! and the teardown of netserver belong to the caller.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use netperf_harness::{HarnessConfig, NetperfResults, NetperfRunner, RunRequest, TestType};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runner = Arc::new(NetperfRunner::new(&HarnessConfig::default()));
//!     let store = NetperfResults::shared();
//!
//!     runner.run_netserver("blue").await?;
//!
//!     let mut handles = Vec::new();
//!     for (ns, delay) in [("red", 0), ("green", 5)] {
//!         let request = RunRequest::new(ns, "10.0.0.2".parse()?, TestType::TcpStream)
//!             .with_start_delay(Duration::from_secs(delay))
//!             .with_cong_algo("cubic");
//!         let (runner, store) = (runner.clone(), store.clone());
//!         handles.push(tokio::spawn(async move {
//!             runner.run_netperf(&request, &store).await
//!         }));
//!     }
//!     for handle in handles {
//!         handle.await??;
//!     }
//!
//!     println!("{:?}", store.lock().summaries());
//!     Ok(())
//! }
//! ```

/// Command-line interface and run-wide configuration
pub mod cli;

/// Netserver and netperf command construction
pub mod command;

/// Error taxonomy shared by the library
pub mod error;

/// Colourised tracing output
pub mod logging;

/// Named netperf option sets
pub mod options;

/// Interim output parsing
pub mod parser;

/// Subprocess execution
pub mod process;

/// Per-namespace result store and the locked merge
pub mod results;

/// Per-flow orchestration
pub mod runner;

pub use cli::{Args, HarnessConfig};
pub use command::{CommandBuilder, CommandLine, RunRequest, TestType};
pub use error::{HarnessError, Result};
pub use parser::{parse, Sample, SampleSet};
pub use process::{CommandExecutor, SubprocessExecutor};
pub use results::{NetperfResults, ResultSeries, SharedResults};
pub use runner::{NetperfRunner, RunReport};

/// The current version of the harness, recorded in result files.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    /// Default length of a netperf run
    pub const RUNTIME: Duration = Duration::from_secs(10);

    /// Interim reporting interval in seconds
    pub const INTERVAL: f64 = 0.2;

    /// Prefix that runs the remainder of a command inside a namespace
    pub const NS_EXEC_PREFIX: &str = "ip netns exec";

    pub const SERVER_BINARY: &str = "netserver";

    pub const CLIENT_BINARY: &str = "netperf";

    /// Payload source for stream tests
    pub const FILL_FILE: &str = "/dev/urandom";

    /// Congestion-control algorithm used when a TCP run does not name one
    pub const CONG_ALGO: &str = "cubic";

    pub const OUTPUT_FILE: &str = "netperf_results.json";
}
