//! # Netperf Option Sets
//!
//! An option set is an ordered mapping from an option name to the literal
//! command-line fragment inserted into the final netperf invocation. The name
//! exists only so a run can override or look up a fragment; the fragment is
//! what lands on the command line.
//!
//! Three named sets exist:
//!
//! - [`OptionSet::netperf_defaults`]: applies to every run (global options)
//! - [`OptionSet::tcp_stream`]: test-specific options for `TCP_STREAM`
//! - [`OptionSet::udp_stream`]: test-specific options for `UDP_STREAM`
//!
//! Declaration order is preserved on override so the rendered command keeps
//! the layout netperf's own argument parser expects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Output selectors requested from netperf's omni tests.
pub const THROUGHPUT_STATS: &str = "THROUGHPUT";

/// An ordered, override-capable set of command-line fragments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSet {
    entries: Vec<(String, String)>,
}

impl OptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, used to declare the named sets.
    pub fn with(mut self, name: &str, fragment: impl Into<String>) -> Self {
        self.set(name, fragment);
        self
    }

    /// Override `name` in place, or append it if the set does not have it yet.
    ///
    /// Overriding never duplicates an option: a set holds at most one
    /// fragment per name.
    pub fn set(&mut self, name: &str, fragment: impl Into<String>) {
        let fragment = fragment.into();
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some((_, value)) => *value = fragment,
            None => self.entries.push((name.to_string(), fragment)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate `(name, fragment)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Split every fragment into discrete argument tokens, in order.
    ///
    /// Fragments are whitespace separated (`"-P 0"` becomes `["-P", "0"]`);
    /// a value containing whitespace cannot be expressed in a fragment.
    pub fn tokens(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(_, value)| value.split_whitespace())
            .map(str::to_string)
            .collect()
    }

    /// Global options applied to every netperf run.
    ///
    /// `-D -<interval>` enables interim reporting with a fixed interval, which
    /// is what produces the `NETPERF_INTERIM_RESULT`/`NETPERF_ENDING` markers
    /// the parser consumes.
    pub fn netperf_defaults(run_secs: u64, interval_secs: f64) -> Self {
        Self::new()
            .with("banner", "-P 0")
            .with("ipv4", "-4")
            .with("testname", "-t TCP_STREAM")
            .with("fill_file", format!("-F {}", crate::defaults::FILL_FILE))
            .with("testlen", format!("-l {}", run_secs))
            .with("interval", format!("-D -{}", interval_secs))
    }

    pub fn tcp_stream() -> Self {
        Self::new()
            .with("cong_algo", format!("-K {}", crate::defaults::CONG_ALGO))
            .with("stats", format!("-k {}", THROUGHPUT_STATS))
    }

    pub fn udp_stream() -> Self {
        Self::new()
            .with("routing", "-R 1")
            .with("stats", format!("-k {}", THROUGHPUT_STATS))
    }
}

impl fmt::Display for OptionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (_, value) in &self.entries {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", value)?;
            first = false;
        }
        Ok(())
    }
}
