//! # Output Parser
//!
//! Extracts timestamped throughput samples from netperf's interim output.
//!
//! With `-D -<interval>` netperf reports, per interval, a throughput marker
//! and the elapsed time at which that interval ended:
//!
//! ```text
//! NETPERF_INTERIM_RESULT[0]=12.50
//! NETPERF_ENDING[0]=1.00
//! ```
//!
//! The two marker families are scanned independently and paired by position:
//! the i-th throughput belongs to the i-th ending timestamp. This relies on
//! netperf emitting both families in matching order. When the counts differ
//! the pairing stops at the shorter sequence and a warning is logged; parsing
//! never fails.

use lazy_static::lazy_static;
use ordered_float::OrderedFloat;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

lazy_static! {
    static ref THROUGHPUT_RE: Regex =
        Regex::new(r"NETPERF_INTERIM_RESULT\[[0-9]+\]=(\S*)").unwrap();
    static ref ENDING_RE: Regex = Regex::new(r"NETPERF_ENDING\[[0-9]+\]=(\S*)").unwrap();
    static ref VALUE_RE: Regex = Regex::new(r"^[0-9]+\.[0-9]+$").unwrap();
}

/// One interim throughput measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the start of the run
    pub timestamp: f64,
    /// Throughput in netperf's reporting unit (10^6 bits/s by default)
    pub throughput: f64,
}

/// Samples of one run keyed by timestamp.
///
/// Iteration follows the order in which each timestamp was first seen.
/// Inserting an existing timestamp replaces its throughput in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Sample>", into = "Vec<Sample>")]
pub struct SampleSet {
    samples: Vec<Sample>,
    /// Position of each timestamp in `samples`
    index: HashMap<OrderedFloat<f64>, usize>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, timestamp: f64, throughput: f64) {
        match self.index.get(&OrderedFloat(timestamp)) {
            Some(&pos) => self.samples[pos].throughput = throughput,
            None => {
                self.index.insert(OrderedFloat(timestamp), self.samples.len());
                self.samples.push(Sample {
                    timestamp,
                    throughput,
                });
            }
        }
    }

    pub fn get(&self, timestamp: f64) -> Option<f64> {
        self.index
            .get(&OrderedFloat(timestamp))
            .map(|&pos| self.samples[pos].throughput)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn mean_throughput(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let total: f64 = self.samples.iter().map(|s| s.throughput).sum();
        Some(total / self.samples.len() as f64)
    }

    pub fn peak_throughput(&self) -> Option<f64> {
        self.samples.iter().map(|s| s.throughput).reduce(f64::max)
    }
}

impl FromIterator<(f64, f64)> for SampleSet {
    fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
        let mut set = SampleSet::new();
        for (timestamp, throughput) in iter {
            set.insert(timestamp, throughput);
        }
        set
    }
}

impl From<Vec<Sample>> for SampleSet {
    fn from(samples: Vec<Sample>) -> Self {
        samples
            .into_iter()
            .map(|s| (s.timestamp, s.throughput))
            .collect()
    }
}

impl From<SampleSet> for Vec<Sample> {
    fn from(set: SampleSet) -> Self {
        set.samples
    }
}

impl<'a> IntoIterator for &'a SampleSet {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// One slot per marker, `None` when its payload is not a decimal number.
///
/// Unusable payloads keep their slot so later markers stay paired with the
/// right partner.
fn capture_values(re: &Regex, raw: &str) -> Vec<Option<f64>> {
    re.captures_iter(raw)
        .map(|caps| {
            caps.get(1)
                .map(|m| m.as_str())
                .filter(|value| VALUE_RE.is_match(value))
                .and_then(|value| value.parse().ok())
        })
        .collect()
}

/// Parse the complete stdout of a netperf run.
pub fn parse(raw_output: &str) -> SampleSet {
    let throughputs = capture_values(&THROUGHPUT_RE, raw_output);
    let timestamps = capture_values(&ENDING_RE, raw_output);

    if throughputs.len() != timestamps.len() {
        warn!(
            throughputs = throughputs.len(),
            timestamps = timestamps.len(),
            "netperf interim markers are unbalanced, truncating to the shorter sequence"
        );
    }

    let pairs = timestamps.len().min(throughputs.len());
    let samples: SampleSet = timestamps
        .into_iter()
        .zip(throughputs)
        .filter_map(|(timestamp, throughput)| Some((timestamp?, throughput?)))
        .collect();
    if samples.len() < pairs {
        debug!(
            skipped = pairs - samples.len(),
            "dropped interim markers without a usable value or with a repeated timestamp"
        );
    }
    debug!(samples = samples.len(), "parsed netperf output");
    samples
}
