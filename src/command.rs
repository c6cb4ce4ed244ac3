//! # Command Builder
//!
//! Assembles the netserver and netperf invocations for a single run. Commands
//! are built as explicit argument vectors ([`CommandLine`]) and are never
//! handed to a shell, so no argument can be reinterpreted as shell syntax.
//!
//! ## Command Layout
//!
//! ```text
//! <netns-prefix> <namespace> netserver
//! <netns-prefix> <namespace> netperf <global options> -H <peer> -- <test options>
//! ```
//!
//! The global options are [`OptionSet::netperf_defaults`] with the test length
//! and test name overridden from the [`RunRequest`]. The test options are the
//! TCP or UDP extension set chosen by [`TestType`]; for `TCP_STREAM` the
//! congestion-control fragment is replaced by the requested algorithm.

use crate::{
    cli::HarnessConfig,
    error::{HarnessError, Result},
    options::OptionSet,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Netperf test selected with `-t`.
///
/// Only the two stream tests carry an extension option set. Any other test
/// name is kept verbatim so it can be reported, but building a client command
/// for it fails with [`HarnessError::MissingTestOptions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TestType {
    TcpStream,
    UdpStream,
    Other(String),
}

impl TestType {
    /// Extension option set for this test, if it has one.
    pub fn extension_options(&self) -> Option<OptionSet> {
        match self {
            TestType::TcpStream => Some(OptionSet::tcp_stream()),
            TestType::UdpStream => Some(OptionSet::udp_stream()),
            TestType::Other(_) => None,
        }
    }
}

impl From<&str> for TestType {
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "TCP_STREAM" => TestType::TcpStream,
            "UDP_STREAM" => TestType::UdpStream,
            _ => TestType::Other(name.trim().to_string()),
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::TcpStream => write!(f, "TCP_STREAM"),
            TestType::UdpStream => write!(f, "UDP_STREAM"),
            TestType::Other(name) => write!(f, "{}", name),
        }
    }
}

/// One measurement run between a namespace and a peer address.
///
/// Immutable once built; the orchestrator only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    namespace: String,
    peer: IpAddr,
    start_delay: Duration,
    duration: Duration,
    test: TestType,
    cong_algo: Option<String>,
}

impl RunRequest {
    /// Create a request with no start delay and the default run time.
    pub fn new(namespace: impl Into<String>, peer: IpAddr, test: TestType) -> Self {
        Self {
            namespace: namespace.into(),
            peer,
            start_delay: Duration::ZERO,
            duration: crate::defaults::RUNTIME,
            test,
            cong_algo: None,
        }
    }

    pub fn with_start_delay(mut self, start_delay: Duration) -> Self {
        self.start_delay = start_delay;
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Congestion-control algorithm for `TCP_STREAM`; ignored by other tests.
    pub fn with_cong_algo(mut self, cong_algo: impl Into<String>) -> Self {
        self.cong_algo = Some(cong_algo.into());
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn peer(&self) -> IpAddr {
        self.peer
    }

    pub fn start_delay(&self) -> Duration {
        self.start_delay
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn test(&self) -> &TestType {
        &self.test
    }

    pub fn cong_algo(&self) -> Option<&str> {
        self.cong_algo.as_deref()
    }

    /// Reject requests that cannot be rendered into a single-token argument
    /// vector or that ask netperf for a zero-length test.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.namespace.contains(char::is_whitespace) {
            return Err(HarnessError::InvalidRequest(format!(
                "namespace `{}` must be a non-empty single token",
                self.namespace
            )));
        }
        // netperf takes whole seconds for -l
        if self.duration.as_secs() == 0 {
            return Err(HarnessError::InvalidRequest(format!(
                "run duration must be at least one second, got {:?}",
                self.duration
            )));
        }
        if let Some(algo) = &self.cong_algo {
            if algo.is_empty() || algo.contains(char::is_whitespace) {
                return Err(HarnessError::InvalidRequest(format!(
                    "congestion-control algorithm `{}` must be a single token",
                    algo
                )));
            }
        }
        Ok(())
    }
}

/// A command as a program followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CommandLine {
    tokens: Vec<String>,
}

impl CommandLine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split a command string on whitespace. No quoting or escaping is
    /// recognised.
    pub fn parse(command: &str) -> Self {
        Self {
            tokens: command.split_whitespace().map(str::to_string).collect(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.tokens.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tokens.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> Option<&str> {
        self.tokens.first().map(String::as_str)
    }

    /// Arguments following the program.
    pub fn arguments(&self) -> &[String] {
        self.tokens.get(1..).unwrap_or(&[])
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(" "))
    }
}

/// Builds netserver and netperf command lines from a [`HarnessConfig`].
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    netns_prefix: Vec<String>,
    server_binary: String,
    client_binary: String,
    interval: f64,
}

impl CommandBuilder {
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            netns_prefix: config
                .netns_prefix
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            server_binary: config.server_binary.clone(),
            client_binary: config.client_binary.clone(),
            interval: config.interval,
        }
    }

    fn in_namespace(&self, namespace: &str) -> CommandLine {
        CommandLine::new()
            .args(self.netns_prefix.iter().cloned())
            .arg(namespace)
    }

    /// `<prefix> <namespace> netserver`. The server takes no options.
    pub fn server_command(&self, namespace: &str) -> CommandLine {
        self.in_namespace(namespace).arg(self.server_binary.as_str())
    }

    /// Global and test-specific option sets for `request`.
    ///
    /// Fails with [`HarnessError::MissingTestOptions`] when the test type has
    /// no extension set.
    pub fn client_options(&self, request: &RunRequest) -> Result<(OptionSet, OptionSet)> {
        let mut options = OptionSet::netperf_defaults(request.duration().as_secs(), self.interval);
        options.set("testname", format!("-t {}", request.test()));

        let mut test_options =
            request
                .test()
                .extension_options()
                .ok_or_else(|| HarnessError::MissingTestOptions {
                    test: request.test().to_string(),
                })?;

        if *request.test() == TestType::TcpStream {
            if let Some(algo) = request.cong_algo() {
                test_options.set("cong_algo", format!("-K {}", algo));
            }
        }

        Ok((options, test_options))
    }

    /// `<prefix> <namespace> netperf <options> -H <peer> -- <test options>`.
    pub fn client_command(&self, request: &RunRequest) -> Result<CommandLine> {
        request.validate()?;
        let (options, test_options) = self.client_options(request)?;

        Ok(self
            .in_namespace(request.namespace())
            .arg(self.client_binary.as_str())
            .args(options.tokens())
            .arg("-H")
            .arg(request.peer().to_string())
            .arg("--")
            .args(test_options.tokens()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn builder() -> CommandBuilder {
        CommandBuilder::new(&HarnessConfig::default())
    }

    fn peer() -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))
    }

    #[test]
    fn test_server_command() {
        let cmd = builder().server_command("red");
        assert_eq!(cmd.to_string(), "ip netns exec red netserver");
        assert_eq!(cmd.program(), Some("ip"));
    }

    #[test]
    fn test_tcp_client_command() {
        let request = RunRequest::new("red", peer(), TestType::TcpStream)
            .with_duration(Duration::from_secs(20))
            .with_cong_algo("reno");
        let cmd = builder().client_command(&request).unwrap();

        assert_eq!(
            cmd.to_string(),
            "ip netns exec red netperf -P 0 -4 -t TCP_STREAM -F /dev/urandom -l 20 -D -0.2 \
             -H 10.0.0.2 -- -K reno -k THROUGHPUT"
        );
    }

    #[test]
    fn test_tcp_client_has_single_cong_algo_flag() {
        let request =
            RunRequest::new("red", peer(), TestType::TcpStream).with_cong_algo("bbr");
        let cmd = builder().client_command(&request).unwrap();
        let tokens = cmd.tokens();

        let flags: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| *t == "-K")
            .map(|(i, _)| i)
            .collect();
        assert_eq!(flags.len(), 1);
        assert_eq!(tokens[flags[0] + 1], "bbr");
        assert!(!tokens.iter().any(|t| t == "cubic"));
    }

    #[test]
    fn test_tcp_without_algo_keeps_default() {
        let request = RunRequest::new("red", peer(), TestType::TcpStream);
        let cmd = builder().client_command(&request).unwrap();
        assert!(cmd.to_string().ends_with("-- -K cubic -k THROUGHPUT"));
    }

    #[test]
    fn test_udp_client_command_ignores_cong_algo() {
        let request = RunRequest::new("blue", peer(), TestType::UdpStream).with_cong_algo("reno");
        let cmd = builder().client_command(&request).unwrap();

        assert!(cmd.to_string().contains("-t UDP_STREAM"));
        assert!(cmd.to_string().ends_with("-- -R 1 -k THROUGHPUT"));
        assert!(!cmd.tokens().iter().any(|t| t == "-K"));
    }

    #[test]
    fn test_unknown_test_type_is_configuration_error() {
        let request = RunRequest::new("red", peer(), TestType::from("TCP_RR"));
        let err = builder().client_command(&request).unwrap_err();

        match err {
            HarnessError::MissingTestOptions { test } => assert_eq!(test, "TCP_RR"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_requests_rejected() {
        let zero = RunRequest::new("red", peer(), TestType::TcpStream)
            .with_duration(Duration::from_millis(500));
        assert!(matches!(
            builder().client_command(&zero),
            Err(HarnessError::InvalidRequest(_))
        ));

        let spaced = RunRequest::new("red ns", peer(), TestType::TcpStream);
        assert!(matches!(
            builder().client_command(&spaced),
            Err(HarnessError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_test_type_from_str() {
        assert_eq!(TestType::from("TCP_STREAM"), TestType::TcpStream);
        assert_eq!(TestType::from("udp_stream"), TestType::UdpStream);
        assert_eq!(
            TestType::from("TCP_RR"),
            TestType::Other("TCP_RR".to_string())
        );
        assert_eq!(TestType::UdpStream.to_string(), "UDP_STREAM");
    }

    #[test]
    fn test_command_line_parse_splits_whitespace() {
        let cmd = CommandLine::parse("  ip netns  exec red\tnetserver ");
        assert_eq!(cmd.tokens(), &["ip", "netns", "exec", "red", "netserver"]);
        assert_eq!(cmd.arguments().len(), 4);
        assert!(CommandLine::parse("").is_empty());
        assert!(CommandLine::parse("").arguments().is_empty());
    }

    #[test]
    fn test_ipv6_peer_rendered() {
        let request = RunRequest::new(
            "red",
            "fd00::2".parse().unwrap(),
            TestType::UdpStream,
        );
        let cmd = builder().client_command(&request).unwrap();
        assert!(cmd.to_string().contains("-H fd00::2 --"));
    }
}
