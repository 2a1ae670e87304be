//! The finished-run document handed to renderers.
//!
//! Carries the budget line, both usage curves and the start/peak markers.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::info;
use uuid::Uuid;

use crate::budget::Budget;
use crate::config::{Output, OutputMode};
use crate::error::{MemwatchError, Result};
use crate::sampler::{RunOutcome, Series, StopPolicy, StopReason};
use crate::summary::Summary;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub started_at: String,
    pub stop_policy: StopPolicy,
    pub stop_reason: StopReason,
    pub iterations: usize,
    pub elapsed_secs: f64,
    pub budget: Budget,
    pub summary: Summary,
    pub series: Series,
}

pub fn format_rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".into())
}

impl Report {
    pub fn new(outcome: RunOutcome, started_at: OffsetDateTime) -> Result<Self> {
        let summary = Summary::compute(&outcome.series)?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            started_at: format_rfc3339(started_at),
            stop_policy: outcome.policy,
            stop_reason: outcome.reason,
            iterations: outcome.series.len(),
            elapsed_secs: outcome.elapsed_secs,
            budget: outcome.budget,
            summary,
            series: outcome.series,
        })
    }
}

pub fn write_json<T: Serialize, W: Write>(value: &T, mut w: W, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut w, value)?;
    } else {
        serde_json::to_writer(&mut w, value)?;
    }
    w.write_all(b"\n")?;
    w.flush()?;
    Ok(())
}

/// Writes `value` where `output` says. Returns the file path when one was written.
pub fn emit<T: Serialize>(value: &T, output: &Output) -> Result<Option<PathBuf>> {
    match output.mode {
        OutputMode::Stdout => {
            write_json(value, io::stdout().lock(), output.pretty)?;
            Ok(None)
        }
        OutputMode::File => {
            let path = output.file_path.clone().ok_or_else(|| {
                MemwatchError::InvalidConfiguration("output.file_path is not set".into())
            })?;
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir)?;
            }
            let file = fs::File::create(&path)?;
            write_json(value, io::BufWriter::new(file), output.pretty)?;
            info!(path = %path.display(), "report written");
            Ok(Some(path))
        }
    }
}
