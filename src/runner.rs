//! # Run Orchestrator
//!
//! Entry point invoked once per (namespace, peer) pair. A run:
//!
//! 1. builds the netperf client command for the [`RunRequest`]
//! 2. sleeps for the request's start delay, if any, to stagger flows
//! 3. executes the command and waits for its output
//! 4. parses the interim markers into samples
//! 5. merges the samples into the shared store under its lock
//!
//! Each run is meant to execute as its own task so that the start delay and
//! the wait for netperf only suspend that run. Runs complete and merge in no
//! particular order. There is no cancellation: a run that fails before the
//! merge simply contributes nothing.

use crate::{
    cli::HarnessConfig,
    command::{CommandBuilder, RunRequest},
    error::Result,
    parser,
    process::{CommandExecutor, SubprocessExecutor},
    results::{self, SharedResults},
};
use serde::Serialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of a single orchestrated run, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub namespace: String,
    pub samples: usize,
    pub mean_throughput: Option<f64>,
    pub peak_throughput: Option<f64>,
    pub elapsed: Duration,
}

/// Drives netserver and netperf through a [`CommandExecutor`].
pub struct NetperfRunner<E = SubprocessExecutor> {
    builder: CommandBuilder,
    executor: E,
}

impl NetperfRunner<SubprocessExecutor> {
    pub fn new(config: &HarnessConfig) -> Self {
        Self::with_executor(config, SubprocessExecutor::new())
    }
}

impl<E: CommandExecutor> NetperfRunner<E> {
    pub fn with_executor(config: &HarnessConfig, executor: E) -> Self {
        Self {
            builder: CommandBuilder::new(config),
            executor,
        }
    }

    /// Start netserver in `namespace` and return without waiting for it.
    pub async fn run_netserver(&self, namespace: &str) -> Result<()> {
        let cmd = self.builder.server_command(namespace);
        info!(ns = namespace, "Starting netserver");
        self.executor.execute(&cmd, false).await?;
        Ok(())
    }

    /// Run one netperf measurement and merge its samples into `store`.
    ///
    /// Configuration errors are reported before any delay is taken. Output
    /// that yields no samples is not an error: the run still merges an empty
    /// contribution.
    pub async fn run_netperf(&self, request: &RunRequest, store: &SharedResults) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let ns = request.namespace();
        let cmd = self.builder.client_command(request)?;

        if !request.start_delay().is_zero() {
            debug!(%run_id, ns, delay = ?request.start_delay(), "Delaying netperf start");
            sleep(request.start_delay()).await;
        }

        info!(
            %run_id,
            ns,
            peer = %request.peer(),
            test = %request.test(),
            "Running netperf"
        );
        debug!(%run_id, command = %cmd, "netperf command");

        let started = Instant::now();
        let raw = self.executor.execute(&cmd, true).await?.unwrap_or_default();
        let samples = parser::parse(&raw);
        if samples.is_empty() {
            warn!(%run_id, ns, "netperf produced no interim samples");
        }

        results::merge(store, ns, &samples);

        let report = RunReport {
            run_id,
            namespace: ns.to_string(),
            samples: samples.len(),
            mean_throughput: samples.mean_throughput(),
            peak_throughput: samples.peak_throughput(),
            elapsed: started.elapsed(),
        };
        info!(
            %run_id,
            ns,
            samples = report.samples,
            "netperf run complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandLine, TestType};
    use crate::error::HarnessError;
    use crate::results::NetperfResults;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::net::{IpAddr, Ipv4Addr};

    /// Records every command and answers waited commands with canned output.
    #[derive(Default)]
    struct ScriptedExecutor {
        output: String,
        calls: Mutex<Vec<(CommandLine, bool)>>,
    }

    #[async_trait]
    impl CommandExecutor for ScriptedExecutor {
        async fn execute(&self, command: &CommandLine, wait: bool) -> Result<Option<String>> {
            self.calls.lock().push((command.clone(), wait));
            Ok(wait.then(|| self.output.clone()))
        }
    }

    fn runner(output: &str) -> NetperfRunner<ScriptedExecutor> {
        NetperfRunner::with_executor(
            &HarnessConfig::default(),
            ScriptedExecutor {
                output: output.to_string(),
                ..Default::default()
            },
        )
    }

    fn request(ns: &str) -> RunRequest {
        RunRequest::new(ns, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), TestType::TcpStream)
            .with_cong_algo("reno")
    }

    #[tokio::test]
    async fn test_run_netserver_is_detached() {
        let runner = runner("");
        runner.run_netserver("blue").await.unwrap();

        let calls = runner.executor.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.to_string(), "ip netns exec blue netserver");
        assert!(!calls[0].1);
    }

    #[tokio::test]
    async fn test_run_netperf_merges_samples() {
        let runner = runner(
            "NETPERF_INTERIM_RESULT[0]=12.5\nNETPERF_ENDING[0]=1.0\n\
             NETPERF_INTERIM_RESULT[1]=15.0\nNETPERF_ENDING[1]=2.0\n",
        );
        let store = NetperfResults::shared();

        let report = runner.run_netperf(&request("red"), &store).await.unwrap();
        assert_eq!(report.namespace, "red");
        assert_eq!(report.samples, 2);
        assert_eq!(report.peak_throughput, Some(15.0));

        let calls = runner.executor.calls.lock();
        assert!(calls[0].1);
        assert!(calls[0].0.to_string().contains("-- -K reno -k THROUGHPUT"));

        let results = store.lock();
        let series = results.series("red").unwrap();
        assert_eq!(series.get(1.0), Some(12.5));
        assert_eq!(series.get(2.0), Some(15.0));
    }

    #[tokio::test]
    async fn test_run_netperf_empty_output_still_merges() {
        let runner = runner("netperf: cannot connect\n");
        let store = NetperfResults::shared();

        let report = runner.run_netperf(&request("red"), &store).await.unwrap();
        assert_eq!(report.samples, 0);
        assert_eq!(report.mean_throughput, None);
        assert!(store.lock().series("red").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_netperf_unknown_test_fails_before_execution() {
        let runner = runner("");
        let store = NetperfResults::shared();
        let request = RunRequest::new(
            "red",
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
            TestType::from("TCP_RR"),
        )
        .with_start_delay(Duration::from_secs(60));

        let err = runner.run_netperf(&request, &store).await.unwrap_err();
        assert!(matches!(err, HarnessError::MissingTestOptions { .. }));
        assert!(runner.executor.calls.lock().is_empty());
        assert!(store.lock().is_empty());
    }

    #[tokio::test]
    async fn test_start_delay_is_honoured() {
        let runner = runner("");
        let store = NetperfResults::shared();
        let delayed = request("red").with_start_delay(Duration::from_millis(150));

        let started = Instant::now();
        runner.run_netperf(&delayed, &store).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_zero_start_delay_does_not_sleep() {
        let runner = runner("");
        let store = NetperfResults::shared();

        let started = Instant::now();
        runner.run_netperf(&request("red"), &store).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
