//! Point-in-time memory readings in gigabytes.
//!
//! The sampling loop only sees the [`MemoryProvider`] trait. [`SysinfoProvider`]
//! reads the running host; [`scripted::ScriptedProvider`] replays fixed values.

use sysinfo::{get_current_pid, Pid, System};
use tracing::debug;

use crate::error::{MemwatchError, Metric, Result};

pub mod mem;
pub mod proc;
pub mod scripted;

/// Bytes in one gigabyte (2^30).
pub const BYTES_PER_GB: f64 = 1_073_741_824.0;

/// Rounds to 4 decimal digits, the precision every reading is reported in.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[allow(clippy::cast_precision_loss)]
pub fn bytes_to_gb(bytes: u64) -> f64 {
    round4(bytes as f64 / BYTES_PER_GB)
}

/// Source of the three memory figures the sampler tracks.
///
/// Every call is a fresh read; implementations must not cache between calls.
pub trait MemoryProvider {
    fn total_system_memory(&mut self) -> Result<f64>;
    fn used_system_memory(&mut self) -> Result<f64>;
    fn process_resident_memory(&mut self) -> Result<f64>;
}

impl<P: MemoryProvider + ?Sized> MemoryProvider for &mut P {
    fn total_system_memory(&mut self) -> Result<f64> {
        (**self).total_system_memory()
    }
    fn used_system_memory(&mut self) -> Result<f64> {
        (**self).used_system_memory()
    }
    fn process_resident_memory(&mut self) -> Result<f64> {
        (**self).process_resident_memory()
    }
}

/// Reads the host through `sysinfo`, refreshing only RAM and this process.
pub struct SysinfoProvider {
    sys: System,
    pid: Pid,
}

impl SysinfoProvider {
    pub fn new() -> Result<Self> {
        let pid = get_current_pid()
            .map_err(|e| MemwatchError::unavailable(Metric::ProcessResident, e))?;
        debug!(pid = pid.as_u32(), "memory provider ready");
        Ok(Self {
            sys: System::new(),
            pid,
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }
}

impl MemoryProvider for SysinfoProvider {
    fn total_system_memory(&mut self) -> Result<f64> {
        let stats = mem::collect(&mut self.sys);
        if stats.total == 0 {
            return Err(MemwatchError::unavailable(
                Metric::TotalSystem,
                "platform reported zero bytes of RAM",
            ));
        }
        Ok(bytes_to_gb(stats.total))
    }

    fn used_system_memory(&mut self) -> Result<f64> {
        let stats = mem::collect(&mut self.sys);
        if stats.total == 0 {
            return Err(MemwatchError::unavailable(
                Metric::UsedSystem,
                "platform reported zero bytes of RAM",
            ));
        }
        Ok(bytes_to_gb(stats.used))
    }

    fn process_resident_memory(&mut self) -> Result<f64> {
        proc::resident_bytes(&mut self.sys, self.pid)
            .map(bytes_to_gb)
            .ok_or_else(|| {
                MemwatchError::unavailable(
                    Metric::ProcessResident,
                    format!("no process entry for pid {}", self.pid),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn one_gib_is_one_gb() {
        assert_eq!(bytes_to_gb(1 << 30), 1.0);
        assert_eq!(bytes_to_gb(0), 0.0);
        assert_eq!(bytes_to_gb(3 << 29), 1.5);
    }

    #[test]
    fn rounds_to_four_digits() {
        assert_eq!(round4(7.123_449), 7.1234);
        assert_eq!(round4(7.123_451), 7.1235);
    }

    #[test]
    fn host_provider_reads_nonzero_figures() {
        let mut p = SysinfoProvider::new().expect("provider");
        let total = p.total_system_memory().expect("total");
        let used = p.used_system_memory().expect("used");
        let rss = p.process_resident_memory().expect("rss");
        assert!(total > 0.0);
        assert!(used <= total);
        assert!(rss >= 0.0);
    }

    proptest! {
        #[test]
        fn conversion_is_nonnegative_and_close(b in any::<u64>()) {
            let gb = bytes_to_gb(b);
            prop_assert!(gb >= 0.0);
            #[allow(clippy::cast_precision_loss)]
            let exact = b as f64 / BYTES_PER_GB;
            prop_assert!((gb - exact).abs() <= 0.000_05 + exact * f64::EPSILON);
        }
    }
}
