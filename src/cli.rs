use crate::command::{RunRequest, TestType};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Netperf Harness - run netperf between network namespaces and collect interim throughput
#[derive(Parser, Debug, Clone)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Namespace to start netserver in before the flows run
    #[clap(long, help_heading = "Core Options")]
    pub server_ns: Option<String>,

    /// Flow to measure, as NAMESPACE,PEER_IP[,START_DELAY] (repeatable)
    #[clap(short = 'f', long = "flow", value_parser = parse_flow, required = true, help_heading = "Core Options")]
    pub flows: Vec<FlowSpec>,

    /// Duration of each netperf run
    #[clap(short = 'd', long, value_parser = parse_duration, default_value = "10s")]
    pub duration: Duration,

    /// Netperf test name (TCP_STREAM or UDP_STREAM)
    #[clap(short = 't', long = "test", value_parser = parse_test_type, default_value = "TCP_STREAM")]
    pub test: TestType,

    /// Congestion-control algorithm for TCP_STREAM
    #[clap(long, default_value = crate::defaults::CONG_ALGO)]
    pub cong_algo: String,

    /// Interim reporting interval in seconds
    #[clap(long, default_value_t = crate::defaults::INTERVAL)]
    pub interval: f64,

    /// Command prefix used to execute inside a namespace
    #[clap(long, default_value = crate::defaults::NS_EXEC_PREFIX)]
    pub netns_prefix: String,

    /// Output file for results (JSON format)
    #[clap(short = 'o', long, default_value = crate::defaults::OUTPUT_FILE)]
    pub output_file: PathBuf,

    /// Verbose output
    #[clap(short = 'v', long, default_value_t = false)]
    pub verbose: bool,
}

/// A single flow given on the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSpec {
    pub namespace: String,
    pub peer: IpAddr,
    pub start_delay: Duration,
}

impl Args {
    /// Expand the flows into run requests sharing the run-wide settings.
    pub fn run_requests(&self) -> Vec<RunRequest> {
        self.flows
            .iter()
            .map(|flow| {
                RunRequest::new(flow.namespace.clone(), flow.peer, self.test.clone())
                    .with_start_delay(flow.start_delay)
                    .with_duration(self.duration)
                    .with_cong_algo(self.cong_algo.clone())
            })
            .collect()
    }
}

/// Static configuration shared by every run of an experiment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Opaque prefix that executes the rest of the command inside a namespace
    pub netns_prefix: String,
    pub server_binary: String,
    pub client_binary: String,
    /// Interim reporting interval in seconds
    pub interval: f64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            netns_prefix: crate::defaults::NS_EXEC_PREFIX.to_string(),
            server_binary: crate::defaults::SERVER_BINARY.to_string(),
            client_binary: crate::defaults::CLIENT_BINARY.to_string(),
            interval: crate::defaults::INTERVAL,
        }
    }
}

impl HarnessConfig {
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        if args.interval.is_nan() || args.interval <= 0.0 {
            anyhow::bail!("Interval must be positive, got {}", args.interval);
        }
        if args.netns_prefix.trim().is_empty() {
            anyhow::bail!("Namespace exec prefix cannot be empty");
        }

        Ok(Self {
            netns_prefix: args.netns_prefix.clone(),
            interval: args.interval,
            ..Self::default()
        })
    }
}

fn parse_test_type(s: &str) -> Result<TestType, String> {
    if s.trim().is_empty() {
        return Err("Test name cannot be empty".to_string());
    }
    Ok(TestType::from(s))
}

/// Parse a flow from `NAMESPACE,PEER_IP[,START_DELAY]`
fn parse_flow(s: &str) -> Result<FlowSpec, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() < 2 || parts.len() > 3 {
        return Err(format!(
            "Invalid flow '{}', expected NAMESPACE,PEER_IP[,START_DELAY]",
            s
        ));
    }
    if parts[0].is_empty() {
        return Err("Flow namespace cannot be empty".to_string());
    }

    let peer: IpAddr = parts[1]
        .parse()
        .map_err(|_| format!("Invalid peer address in flow: {}", parts[1]))?;
    let start_delay = match parts.get(2) {
        Some(delay) => parse_duration(delay)?,
        None => Duration::ZERO,
    };

    Ok(FlowSpec {
        namespace: parts[0].to_string(),
        peer,
        start_delay,
    })
}

/// Parse duration from string (e.g., "10s", "5m", "1h")
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    if s.is_empty() {
        return Err("Duration cannot be empty".to_string());
    }

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else {
        (s, "s") // Default to seconds
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number in duration: {}", num_str))?;
    let secs = match unit {
        "ms" => num / 1000.0,
        "s" => num,
        "m" => num * 60.0,
        "h" => num * 3600.0,
        _ => return Err(format!("Invalid duration unit: {}", unit)),
    };

    Duration::try_from_secs_f64(secs).map_err(|_| format!("Duration out of range: {}", s))
}
