use crate::error::Result;
use crate::parser::SampleSet;
use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Result store shared by every concurrent run of an experiment.
///
/// The mutex is the single lock serialising all writers, across namespaces.
/// Clone the `Arc` into each run; never create one store per run.
pub type SharedResults = Arc<Mutex<NetperfResults>>;

/// Accumulated timestamp -> throughput mapping of one namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSeries {
    points: BTreeMap<OrderedFloat<f64>, f64>,
}

impl ResultSeries {
    pub fn insert(&mut self, timestamp: f64, throughput: f64) {
        self.points.insert(OrderedFloat(timestamp), throughput);
    }

    pub fn get(&self, timestamp: f64) -> Option<f64> {
        self.points.get(&OrderedFloat(timestamp)).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points in ascending timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().map(|(ts, value)| (ts.into_inner(), *value))
    }

    pub fn summary(&self) -> SeriesSummary {
        let samples = self.points.len();
        let total: f64 = self.points.values().sum();
        SeriesSummary {
            samples,
            mean_throughput: if samples > 0 {
                total / samples as f64
            } else {
                0.0
            },
            peak_throughput: self.points.values().cloned().fold(0.0, f64::max),
            first_timestamp: self.points.keys().next().map(|ts| ts.into_inner()),
            last_timestamp: self.points.keys().next_back().map(|ts| ts.into_inner()),
        }
    }
}

// JSON object keys must be strings, so timestamps are written as their
// shortest decimal form.
impl Serialize for ResultSeries {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.points.len()))?;
        for (timestamp, value) in &self.points {
            map.serialize_entry(&timestamp.into_inner().to_string(), value)?;
        }
        map.end()
    }
}

/// Per-namespace summary of a series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub samples: usize,
    pub mean_throughput: f64,
    pub peak_throughput: f64,
    pub first_timestamp: Option<f64>,
    pub last_timestamp: Option<f64>,
}

/// Netperf results of an experiment, keyed by namespace.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetperfResults {
    series: BTreeMap<String, ResultSeries>,
}

impl NetperfResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a fresh store in the lock shared by all runs.
    pub fn shared() -> SharedResults {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Add the samples of one run to `namespace`'s series.
    ///
    /// The series is created on first write. Existing timestamps are
    /// overwritten, everything else is kept.
    pub fn add_result(&mut self, namespace: &str, samples: &SampleSet) {
        let series = self.series.entry(namespace.to_string()).or_default();
        for sample in samples {
            series.insert(sample.timestamp, sample.throughput);
        }
        debug!(
            ns = namespace,
            added = samples.len(),
            total = series.len(),
            "added netperf result"
        );
    }

    pub fn series(&self, namespace: &str) -> Option<&ResultSeries> {
        self.series.get(namespace)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn summaries(&self) -> BTreeMap<String, SeriesSummary> {
        self.series
            .iter()
            .map(|(ns, series)| (ns.clone(), series.summary()))
            .collect()
    }

    /// Write the store with run metadata as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let output = ResultsFile {
            metadata: ResultsMetadata {
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
                namespaces: self.series.len(),
            },
            netperf: &self.series,
            summary: self.summaries(),
        };

        let json = serde_json::to_string_pretty(&output)?;
        std::fs::write(path, json)?;

        info!("Results written to: {:?}", path);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ResultsFile<'a> {
    metadata: ResultsMetadata,
    netperf: &'a BTreeMap<String, ResultSeries>,
    summary: BTreeMap<String, SeriesSummary>,
}

#[derive(Debug, Serialize)]
struct ResultsMetadata {
    version: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    namespaces: usize,
}

/// Merge one run's samples into the shared store as a single step.
///
/// The store lock is held for the whole merge, so concurrent runs never
/// interleave their writes, whichever namespace they target.
pub fn merge(store: &SharedResults, namespace: &str, samples: &SampleSet) {
    let mut results = store.lock();
    results.add_result(namespace, samples);
}
