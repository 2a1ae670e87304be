use serde::Serialize;
use tracing::info;

use crate::collectors::{round4, MemoryProvider};
use crate::error::{MemwatchError, Result};

/// Available-memory threshold, frozen at the moment it was computed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Budget {
    pub available_gb: f64,
    pub total_gb: f64,
    pub used_at_start_gb: f64,
    pub safety_margin_percent: i32,
}

pub fn validate_margin(safety_margin_percent: i32) -> Result<()> {
    if !(0..100).contains(&safety_margin_percent) {
        return Err(MemwatchError::InvalidConfiguration(format!(
            "safety_margin_percent must be in 0..100, got {safety_margin_percent}"
        )));
    }
    Ok(())
}

/// `(total - used) * (1 - margin / 100)`, rounded to 4 digits.
///
/// Reads total and used memory exactly once each; the margin is checked
/// before any read.
pub fn compute_available_budget<P: MemoryProvider + ?Sized>(
    provider: &mut P,
    safety_margin_percent: i32,
) -> Result<Budget> {
    validate_margin(safety_margin_percent)?;
    let total_gb = provider.total_system_memory()?;
    let used_at_start_gb = provider.used_system_memory()?;
    let keep = 1.0 - f64::from(safety_margin_percent) / 100.0;
    let available_gb = round4((total_gb - used_at_start_gb) * keep);
    info!(
        total_gb,
        used_at_start_gb,
        safety_margin_percent,
        available_gb,
        "memory budget computed"
    );
    Ok(Budget {
        available_gb,
        total_gb,
        used_at_start_gb,
        safety_margin_percent,
    })
}
