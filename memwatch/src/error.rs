use std::fmt;
use thiserror::Error;

/// Memory figure requested from a [`crate::collectors::MemoryProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    TotalSystem,
    UsedSystem,
    ProcessResident,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::TotalSystem => f.write_str("total system memory"),
            Metric::UsedSystem => f.write_str("used system memory"),
            Metric::ProcessResident => f.write_str("process resident memory"),
        }
    }
}

#[derive(Debug, Error)]
pub enum MemwatchError {
    #[error("{metric} unavailable: {reason}")]
    MetricUnavailable { metric: Metric, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("series is empty")]
    EmptySeries,
    #[error("writing report: {0}")]
    Io(#[from] std::io::Error),
    #[error("serializing report: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl MemwatchError {
    pub fn unavailable(metric: Metric, reason: impl Into<String>) -> Self {
        Self::MetricUnavailable {
            metric,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = MemwatchError> = std::result::Result<T, E>;
