//! Simulation time model.
//!
//! # Design
//!
//! Time is continuous seconds advanced in fixed steps.  The scheduler never
//! reads a global clock: the caller passes `(current_time, step_time)` into
//! every `update`, and `SimClock` is only a convenience for callers that
//! drive the loop themselves.
//!
//! Time `0.0` is the scenario start.  Several rules (e.g. the ego lock) key
//! off `current_time > 0.0`, so the first step must be issued at exactly 0.

use std::fmt;

use crate::{CoreError, CoreResult};

// ── SimClock ──────────────────────────────────────────────────────────────────

/// Fixed-step clock for driving `update` loops.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimClock {
    /// Seconds since scenario start at the beginning of the next step.
    pub current_time: f64,
    /// Seconds per step.
    pub step_time:    f64,
    /// Steps taken so far.
    pub steps:        u64,
}

impl SimClock {
    pub fn new(step_time: f64) -> Self {
        Self { current_time: 0.0, step_time, steps: 0 }
    }

    /// Advance the clock by one step.
    ///
    /// Time is recomputed from the step count so long runs do not accumulate
    /// floating-point drift.
    #[inline]
    pub fn advance(&mut self) {
        self.steps += 1;
        self.current_time = self.steps as f64 * self.step_time;
    }

    /// `true` once the first step has completed.
    #[inline]
    pub fn started(&self) -> bool {
        self.current_time > 0.0
    }
}

impl fmt::Display for SimClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} (t = {:.3} s)", self.steps, self.current_time)
    }
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level simulation configuration.
///
/// Typically loaded from a scenario file by the application and passed to
/// the entity manager builder.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// Seconds per step.  Default: 0.05 (20 Hz).
    pub step_time: f64,

    /// Maximum distance between an entity and a lanelet centerline for the
    /// entity to be matched onto that lanelet.  Default: 2.0 m.
    pub lane_matching_distance: f64,

    /// Worker thread count for the parallel behavior phase.  `None` uses
    /// Rayon's global pool.
    pub num_threads: Option<usize>,

    /// Log per-tick timing at `info` level.
    pub verbose: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            step_time:              0.05,
            lane_matching_distance: 2.0,
            num_threads:            None,
            verbose:                false,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.step_time > 0.0) {
            return Err(CoreError::Config(format!("step_time {} must be > 0", self.step_time)));
        }
        if !(self.lane_matching_distance > 0.0) {
            return Err(CoreError::Config(format!(
                "lane_matching_distance {} must be > 0",
                self.lane_matching_distance
            )));
        }
        if self.num_threads == Some(0) {
            return Err(CoreError::Config("num_threads must be at least 1".into()));
        }
        Ok(())
    }

    /// Construct a `SimClock` pre-configured for this run.
    pub fn make_clock(&self) -> SimClock {
        SimClock::new(self.step_time)
    }
}
