use serde::Serialize;

use crate::error::{MemwatchError, Result};
use crate::sampler::{Sample, Series};

/// A single value picked out of a series, with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Marker {
    pub index: usize,
    pub timestamp: f64,
    pub value_gb: f64,
}

/// First and peak readings of a finished series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub usage_at_start: Marker,
    pub max_total_used: Marker,
    pub max_process_rss: Marker,
}

impl Summary {
    pub fn compute(series: &Series) -> Result<Self> {
        let first = series.first().ok_or(MemwatchError::EmptySeries)?;
        Ok(Self {
            usage_at_start: Marker {
                index: 0,
                timestamp: first.timestamp,
                value_gb: first.total_used_gb,
            },
            max_total_used: first_max(series, |s| s.total_used_gb)?,
            max_process_rss: first_max(series, |s| s.process_rss_gb)?,
        })
    }
}

/// Maximum of `field`; ties resolve to the earliest sample.
fn first_max(series: &Series, field: impl Fn(&Sample) -> f64) -> Result<Marker> {
    let mut best: Option<Marker> = None;
    for (index, sample) in series.iter().enumerate() {
        let value_gb = field(sample);
        if best.map_or(true, |b| value_gb > b.value_gb) {
            best = Some(Marker {
                index,
                timestamp: sample.timestamp,
                value_gb,
            });
        }
    }
    best.ok_or(MemwatchError::EmptySeries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(total: &[f64], rss: &[f64]) -> Series {
        total
            .iter()
            .zip(rss)
            .enumerate()
            .map(|(i, (&t, &r))| Sample {
                timestamp: i as f64 * 0.5,
                total_used_gb: t,
                process_rss_gb: r,
            })
            .collect()
    }

    #[test]
    fn ties_pick_first_occurrence() {
        let s = series(&[2.0, 3.5, 3.5, 1.0], &[0.1, 0.1, 0.2, 0.2]);
        let sum = Summary::compute(&s).unwrap();
        assert_eq!(sum.max_total_used.index, 1);
        assert_eq!(sum.max_total_used.timestamp, 0.5);
        assert_eq!(sum.max_total_used.value_gb, 3.5);
        assert_eq!(sum.max_process_rss.index, 2);
        assert_eq!(sum.usage_at_start.value_gb, 2.0);
        assert_eq!(sum.usage_at_start.timestamp, 0.0);
    }

    #[test]
    fn single_sample_is_its_own_peak() {
        let s = series(&[4.0], &[0.3]);
        let sum = Summary::compute(&s).unwrap();
        assert_eq!(sum.max_total_used.index, 0);
        assert_eq!(sum.max_process_rss.value_gb, 0.3);
    }

    #[test]
    fn empty_series_has_no_summary() {
        assert!(matches!(
            Summary::compute(&Series::new()),
            Err(MemwatchError::EmptySeries)
        ));
    }
}
