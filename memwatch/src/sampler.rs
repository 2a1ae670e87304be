//! The sampling loop.
//!
//! A run computes its [`Budget`] once, then alternates between recording a
//! [`Sample`] and applying the workload until the [`StopPolicy`] is met.
//!
//! The threshold policy compares the *process* RSS against a budget derived
//! from *system-wide* free memory. That pairing is kept deliberately; a
//! process-local budget would need a different baseline.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, trace};

use crate::budget::{compute_available_budget, Budget};
use crate::collectors::MemoryProvider;
use crate::error::{MemwatchError, Result};
use crate::pressure::Workload;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Seconds since the run started.
    pub timestamp: f64,
    pub total_used_gb: f64,
    pub process_rss_gb: f64,
}

/// Append-only, time-ordered samples of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }
}

impl FromIterator<Sample> for Series {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;
    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum StopPolicy {
    /// Stop after a fixed number of samples.
    Iterations { count: usize },
    /// Stop once process RSS reaches the budget, or after `cap` samples if set.
    Threshold { cap: Option<usize> },
}

impl StopPolicy {
    pub const DEFAULT_ITERATIONS: usize = 1024;

    fn validate(&self) -> Result<()> {
        match self {
            StopPolicy::Iterations { count: 0 } => Err(MemwatchError::InvalidConfiguration(
                "iteration count must be at least 1".into(),
            )),
            StopPolicy::Threshold { cap: Some(0) } => Err(MemwatchError::InvalidConfiguration(
                "iteration cap must be at least 1".into(),
            )),
            _ => Ok(()),
        }
    }
}

impl Default for StopPolicy {
    fn default() -> Self {
        StopPolicy::Iterations {
            count: Self::DEFAULT_ITERATIONS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    IterationLimit,
    BudgetExceeded,
    IterationCap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped(StopReason),
}

/// State of one run, advanced by [`SamplingRun::step`].
pub struct SamplingRun<P, W> {
    provider: P,
    workload: W,
    policy: StopPolicy,
    budget: Budget,
    series: Series,
    start: Instant,
    iteration: usize,
    state: RunState,
}

/// Everything a finished run hands to its consumer.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub series: Series,
    pub budget: Budget,
    pub policy: StopPolicy,
    pub reason: StopReason,
    pub elapsed_secs: f64,
}

impl<P: MemoryProvider, W: Workload> SamplingRun<P, W> {
    /// Computes the budget and enters `Running`.
    pub fn start(
        mut provider: P,
        workload: W,
        policy: StopPolicy,
        safety_margin_percent: i32,
    ) -> Result<Self> {
        policy.validate()?;
        let budget = compute_available_budget(&mut provider, safety_margin_percent)?;
        info!(?policy, budget_gb = budget.available_gb, "sampling started");
        Ok(Self {
            provider,
            workload,
            policy,
            budget,
            series: Series::new(),
            start: Instant::now(),
            iteration: 0,
            state: RunState::Running,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn budget(&self) -> &Budget {
        &self.budget
    }

    pub fn series(&self) -> &Series {
        &self.series
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Records one sample, applies the workload and evaluates the stop policy.
    /// A stopped run is left untouched.
    pub fn step(&mut self) -> Result<RunState> {
        if let RunState::Stopped(_) = self.state {
            return Ok(self.state);
        }
        let timestamp = self.start.elapsed().as_secs_f64();
        let total_used_gb = self.provider.used_system_memory()?;
        let process_rss_gb = self.provider.process_resident_memory()?;
        let sample = Sample {
            timestamp,
            total_used_gb,
            process_rss_gb,
        };
        trace!(iteration = self.iteration, timestamp, total_used_gb, process_rss_gb, "sample");
        self.series.push(sample);
        self.workload.apply(self.iteration);
        self.iteration += 1;

        if let Some(reason) = self.should_stop(&sample) {
            self.state = RunState::Stopped(reason);
        }
        Ok(self.state)
    }

    fn should_stop(&self, last: &Sample) -> Option<StopReason> {
        match self.policy {
            StopPolicy::Iterations { count } => {
                (self.iteration >= count).then_some(StopReason::IterationLimit)
            }
            StopPolicy::Threshold { cap } => {
                if last.process_rss_gb >= self.budget.available_gb {
                    Some(StopReason::BudgetExceeded)
                } else if cap.is_some_and(|c| self.iteration >= c) {
                    Some(StopReason::IterationCap)
                } else {
                    None
                }
            }
        }
    }

    /// Steps until `Stopped`. An error discards the samples gathered so far.
    pub fn run_to_completion(mut self) -> Result<RunOutcome> {
        let reason = loop {
            if let RunState::Stopped(reason) = self.step()? {
                break reason;
            }
        };
        let elapsed_secs = self.start.elapsed().as_secs_f64();
        info!(
            ?reason,
            samples = self.series.len(),
            elapsed_secs,
            "sampling stopped"
        );
        Ok(RunOutcome {
            series: self.series,
            budget: self.budget,
            policy: self.policy,
            reason,
            elapsed_secs,
        })
    }
}

/// Runs a full sampling session.
pub fn run<P: MemoryProvider, W: Workload>(
    provider: P,
    workload: W,
    policy: StopPolicy,
    safety_margin_percent: i32,
) -> Result<RunOutcome> {
    SamplingRun::start(provider, workload, policy, safety_margin_percent)?.run_to_completion()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::scripted::ScriptedProvider;
    use crate::pressure::Idle;

    #[derive(Default)]
    struct Counting(Vec<usize>);

    impl Workload for Counting {
        fn apply(&mut self, iteration: usize) {
            self.0.push(iteration);
        }
    }

    #[test]
    fn stopped_run_does_not_sample_again() {
        let p = ScriptedProvider::constant(16.0, 8.0, 1.0);
        let mut run = SamplingRun::start(p, Idle, StopPolicy::Iterations { count: 1 }, 10).unwrap();
        assert_eq!(run.step().unwrap(), RunState::Stopped(StopReason::IterationLimit));
        assert_eq!(run.step().unwrap(), RunState::Stopped(StopReason::IterationLimit));
        assert_eq!(run.series().len(), 1);
    }

    #[test]
    fn workload_sees_every_iteration() {
        let p = ScriptedProvider::constant(16.0, 8.0, 1.0);
        let mut w = Counting::default();
        run(p, &mut w, StopPolicy::Iterations { count: 4 }, 0).unwrap();
        assert_eq!(w.0, vec![0, 1, 2, 3]);
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let p = ScriptedProvider::constant(16.0, 8.0, 1.0);
        let err = run(p, Idle, StopPolicy::Iterations { count: 0 }, 10).unwrap_err();
        assert!(matches!(err, MemwatchError::InvalidConfiguration(_)));
    }

    #[test]
    fn timestamps_do_not_go_backwards() {
        let p = ScriptedProvider::constant(16.0, 8.0, 1.0);
        let out = run(p, Idle, StopPolicy::Iterations { count: 32 }, 10).unwrap();
        let ts: Vec<f64> = out.series.iter().map(|s| s.timestamp).collect();
        assert!(ts.windows(2).all(|w| w[0] <= w[1]));
        assert!(out.elapsed_secs >= ts[ts.len() - 1]);
    }

    #[test]
    fn budget_is_read_once_before_sampling() {
        let mut p = ScriptedProvider::constant(16.0, 8.0, 1.0);
        run(&mut p, Idle, StopPolicy::Iterations { count: 5 }, 10).unwrap();
        // total + used for the budget, then used + rss per sample
        assert_eq!(p.reads(), 2 + 5 * 2);
    }
}
