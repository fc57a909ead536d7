//! Result aggregation
//!
//! Collects the realized contribution margin of every replicate and the
//! replicates that failed, and reduces them to summary statistics.

use serde::{Deserialize, Serialize};

/// A replicate that produced no result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicateFailure {
    pub replicate: usize,
    pub reason: String,
}

/// Summary statistics over successful replicates
///
/// Population standard deviation; percentiles by nearest rank on the
/// sorted samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentile_10: f64,
    pub percentile_50: f64,
    pub percentile_90: f64,
}

/// Realized contribution margins of one simulation variant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultAggregator {
    /// `(replicate, realized_cm)` in recording order
    samples: Vec<(usize, f64)>,
    failures: Vec<ReplicateFailure>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, replicate: usize, realized_cm: f64) {
        self.samples.push((replicate, realized_cm));
    }

    pub fn record_failure(&mut self, replicate: usize, reason: impl Into<String>) {
        self.failures.push(ReplicateFailure {
            replicate,
            reason: reason.into(),
        });
    }

    /// Number of successful replicates
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[(usize, f64)] {
        &self.samples
    }

    pub fn failures(&self) -> &[ReplicateFailure] {
        &self.failures
    }

    /// Mean realized CM, `None` if no replicate succeeded
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().map(|(_, cm)| cm).sum::<f64>() / self.samples.len() as f64)
    }

    pub fn stats(&self) -> Option<AggregateStats> {
        let mean = self.mean()?;
        let mut values: Vec<f64> = self.samples.iter().map(|(_, cm)| *cm).collect();
        values.sort_by(f64::total_cmp);

        let n = values.len();
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let percentile = |p: f64| {
            let index = ((p / 100.0) * (n as f64 - 1.0)).round() as usize;
            values[index.min(n - 1)]
        };

        Some(AggregateStats {
            count: n,
            mean,
            std_dev: variance.sqrt(),
            min: values[0],
            max: values[n - 1],
            percentile_10: percentile(10.0),
            percentile_50: percentile(50.0),
            percentile_90: percentile(90.0),
        })
    }
}
