//! Samples system and process memory while applying allocation pressure, and
//! stops once a fixed sample count or the available-memory budget is reached.

pub mod budget;
pub mod collectors;
pub mod config;
pub mod error;
pub mod logging;
pub mod pressure;
pub mod report;
pub mod sampler;
pub mod summary;

pub use budget::{compute_available_budget, Budget};
pub use collectors::{bytes_to_gb, MemoryProvider, SysinfoProvider};
pub use error::{MemwatchError, Metric};
pub use report::Report;
pub use sampler::{run, RunOutcome, RunState, Sample, SamplingRun, Series, StopPolicy, StopReason};
pub use summary::Summary;
