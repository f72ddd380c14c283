//! Per-tick output consumed by observers and external collaborators.

use tsim_core::{EntityStatus, Obstacle, Point, Pose};
use tsim_sensor::OccupancyGrid;

/// One entity's state at the end of a tick, with its plan.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityStatusWithTrajectory {
    pub name:       String,
    /// Includes type, pose, twist, bounding box, lane pose and action.
    pub status:     EntityStatus,
    pub waypoints:  Vec<Point>,
    pub goal_poses: Vec<Pose>,
    pub obstacle:   Option<Obstacle>,
    pub time:       f64,
}

impl EntityStatusWithTrajectory {
    #[inline]
    pub fn lanelet_pose_valid(&self) -> bool {
        self.status.lanelet_pose_valid()
    }
}

/// Aggregated result of one `update`.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TickRecord {
    /// End-of-step time, `current_time + step_time`.
    pub time:     f64,
    /// Sorted by name.
    pub entities: Vec<EntityStatusWithTrajectory>,
    /// Frames published this tick, keyed by the carrying entity.
    pub grids:    Vec<(String, OccupancyGrid)>,
}

impl TickRecord {
    pub fn entity(&self, name: &str) -> Option<&EntityStatusWithTrajectory> {
        self.entities
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.entities[i])
    }

    pub fn grid(&self, entity: &str) -> Option<&OccupancyGrid> {
        self.grids.iter().find(|(name, _)| name == entity).map(|(_, grid)| grid)
    }
}
