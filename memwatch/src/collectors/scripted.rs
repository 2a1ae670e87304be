use std::collections::VecDeque;

use super::MemoryProvider;
use crate::error::{MemwatchError, Metric, Result};

#[derive(Debug, Clone)]
enum Feed {
    Repeat(f64),
    Sequence(VecDeque<f64>),
    Fail(String),
}

impl Feed {
    fn next(&mut self, metric: Metric) -> Result<f64> {
        match self {
            Feed::Repeat(v) => Ok(*v),
            Feed::Sequence(values) => values
                .pop_front()
                .ok_or_else(|| MemwatchError::unavailable(metric, "script exhausted")),
            Feed::Fail(reason) => Err(MemwatchError::unavailable(metric, reason.clone())),
        }
    }
}

/// Provider that replays fixed readings, for driving the sampler deterministically.
///
/// Sequences are consumed one value per call. Note that the budget computation
/// reads used memory once before the first sample.
#[derive(Debug, Clone)]
pub struct ScriptedProvider {
    total: Feed,
    used: Feed,
    rss: Feed,
    reads: usize,
}

impl ScriptedProvider {
    pub fn constant(total_gb: f64, used_gb: f64, rss_gb: f64) -> Self {
        Self {
            total: Feed::Repeat(total_gb),
            used: Feed::Repeat(used_gb),
            rss: Feed::Repeat(rss_gb),
            reads: 0,
        }
    }

    #[must_use]
    pub fn with_used(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.used = Feed::Sequence(values.into_iter().collect());
        self
    }

    #[must_use]
    pub fn with_rss(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.rss = Feed::Sequence(values.into_iter().collect());
        self
    }

    #[must_use]
    pub fn failing_total(mut self, reason: &str) -> Self {
        self.total = Feed::Fail(reason.to_string());
        self
    }

    #[must_use]
    pub fn failing_rss(mut self, reason: &str) -> Self {
        self.rss = Feed::Fail(reason.to_string());
        self
    }

    /// Number of reads served so far, across all three metrics.
    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl MemoryProvider for ScriptedProvider {
    fn total_system_memory(&mut self) -> Result<f64> {
        self.reads += 1;
        self.total.next(Metric::TotalSystem)
    }

    fn used_system_memory(&mut self) -> Result<f64> {
        self.reads += 1;
        self.used.next(Metric::UsedSystem)
    }

    fn process_resident_memory(&mut self) -> Result<f64> {
        self.reads += 1;
        self.rss.next(Metric::ProcessResident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_runs_dry() {
        let mut p = ScriptedProvider::constant(16.0, 8.0, 0.0).with_rss([1.0, 2.0]);
        assert_eq!(p.process_resident_memory().unwrap(), 1.0);
        assert_eq!(p.process_resident_memory().unwrap(), 2.0);
        let err = p.process_resident_memory().unwrap_err();
        assert!(matches!(
            err,
            MemwatchError::MetricUnavailable { metric: Metric::ProcessResident, .. }
        ));
        assert_eq!(p.reads(), 3);
    }
}
