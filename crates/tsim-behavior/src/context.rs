//! Read-only state passed to every action node.

use tsim_core::{EntityStatus, LaneletId, StatusSnapshot, TrafficLights};
use tsim_spatial::LaneGraph;

use crate::{BehaviorMemory, BehaviorParameters, BehaviorRequest};

/// A read-only view of one entity and the world it reacts to, built once per
/// entity per tick by the entity manager.
///
/// # Lifetimes
///
/// All borrows live for the duration of one tick's behavior phase.  The
/// manager never allows mutable access to these structures while a
/// `BehaviorContext` is live, so nodes may run on any thread.
pub struct BehaviorContext<'a> {
    /// Simulation time at the start of this step.
    pub current_time: f64,

    /// Seconds this step advances.
    pub step_time: f64,

    /// Name of the entity being ticked.
    pub name: &'a str,

    /// The entity's own status at the start of this step.
    pub status: &'a EntityStatus,

    /// Every entity's status at the start of this step, including this
    /// one.  Queries exclude `name` themselves.
    pub others: &'a StatusSnapshot,

    pub graph: &'a dyn LaneGraph,

    pub traffic_lights: &'a TrafficLights,

    pub request: &'a BehaviorRequest,

    /// Externally requested speed; `None` holds the current speed.
    pub target_speed: Option<f64>,

    /// Lanelets the entity intends to drive, starting with its current one.
    pub route_lanelets: &'a [LaneletId],

    pub parameters: &'a BehaviorParameters,

    /// Private memory carried over from the previous step.
    pub memory: &'a BehaviorMemory,
}

impl<'a> BehaviorContext<'a> {
    /// The requested speed, or the current speed if nothing was requested.
    #[inline]
    pub fn requested_speed(&self) -> f64 {
        self.target_speed.unwrap_or(self.status.speed())
    }

    /// Time the produced status is valid for.
    #[inline]
    pub fn next_time(&self) -> f64 {
        self.current_time + self.step_time
    }
}
