//! Simulation observer trait for progress reporting and data collection.

use crate::TickRecord;

/// Callbacks invoked by [`EntityManager::run_steps`][crate::EntityManager::run_steps]
/// at each step boundary.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example — obstacle counter
///
/// ```rust,ignore
/// struct ObstacleCounter { blocked: usize }
///
/// impl SimObserver for ObstacleCounter {
///     fn on_tick_end(&mut self, record: &TickRecord) {
///         self.blocked += record.entities.iter().filter(|e| e.obstacle.is_some()).count();
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called before each step with the step's start time.
    fn on_tick_start(&mut self, _time: f64) {}

    /// Called after each step with its aggregated record.
    fn on_tick_end(&mut self, _record: &TickRecord) {}

    /// Called once after the final step with the clock's end time.
    fn on_sim_end(&mut self, _final_time: f64) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}
