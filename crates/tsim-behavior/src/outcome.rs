//! What one behavior tick produces.

use std::collections::BTreeSet;

use tsim_core::{EntityStatus, LaneletId, Obstacle, Point, Pose};
use tsim_spatial::TrajectorySpline;

use crate::{BehaviorContext, BehaviorRequest};

/// Terminal state of an action node tick.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NodeStatus {
    /// Not ticked this step.
    #[default]
    Idle,
    Running,
    Success,
    /// Preconditions did not hold at tick time; the next node is tried.
    Failure,
}

/// Lane change in progress: a straight path onto the target lanelet.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneChangeProgress {
    pub target:    LaneletId,
    pub path:      TrajectorySpline,
    /// Pose on the target lanelet's centerline at the end of the path.
    pub end:       Pose,
    pub travelled: f64,
}

/// Per-entity state that behaviors carry from one step to the next.
///
/// Only the entity's own behavior reads or writes it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BehaviorMemory {
    /// Stop-sign stop lines the entity has already stopped at.
    pub cleared_stop_lines: BTreeSet<LaneletId>,
    pub lane_change:        Option<LaneChangeProgress>,
}

/// Everything an action node hands back to the entity manager.
#[derive(Clone, Debug, PartialEq)]
pub struct BehaviorOutcome {
    /// Status at `current_time + step_time`.
    pub status:      EntityStatus,
    /// Trajectory preview in the map frame.
    pub waypoints:   Vec<Point>,
    pub obstacle:    Option<Obstacle>,
    pub node_status: NodeStatus,
    pub memory:      BehaviorMemory,
    /// The request to keep for the next step.
    pub request:     BehaviorRequest,
}

impl BehaviorOutcome {
    /// A failed tick: status, memory and request pass through unchanged.
    pub fn failure(ctx: &BehaviorContext<'_>) -> Self {
        Self {
            status:      ctx.status.clone(),
            waypoints:   Vec::new(),
            obstacle:    None,
            node_status: NodeStatus::Failure,
            memory:      ctx.memory.clone(),
            request:     ctx.request.clone(),
        }
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        self.node_status == NodeStatus::Failure
    }
}
