use serde::Serialize;
use sysinfo::{MemoryRefreshKind, System};

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct MemStats {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Refreshes only the RAM counters; swap is never read.
pub fn collect(sys: &mut System) -> MemStats {
    sys.refresh_memory_specifics(MemoryRefreshKind::nothing().with_ram());
    let total = sys.total_memory();
    let used = sys.used_memory();
    let free = total.saturating_sub(used);
    MemStats { total, used, free }
}
