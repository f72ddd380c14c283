//! The road-network provider contract.
//!
//! # Pluggability
//!
//! Behaviors, queries and the entity manager reach the map only through the
//! [`LaneGraph`] trait, so a scenario can run against any provider.  The
//! in-memory [`LaneletMap`](crate::LaneletMap) is the default.
//!
//! # Thread safety
//!
//! Implementations must be `Send + Sync`: the same graph is borrowed by every
//! Rayon worker during the parallel behavior phase.

use tsim_core::{LaneletId, LaneletPose, Point, Pose, TrafficLightId};

/// Side to move to in a lane change.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LaneChangeDirection {
    Left,
    Right,
}

pub trait LaneGraph: Send + Sync {
    /// Centerline length of `id`, `None` for unknown lanelets.
    fn lanelet_length(&self, id: LaneletId) -> Option<f64>;

    /// Distance travelled along successor edges from `(from, from_s)` to
    /// `(to, to_s)`.  `None` if `to` is not reachable going forward.
    fn longitudinal_distance(
        &self,
        from:   LaneletId,
        from_s: f64,
        to:     LaneletId,
        to_s:   f64,
    ) -> Option<f64>;

    fn center_points(&self, id: LaneletId) -> Option<&[Point]>;

    /// Stop line attached to `id`, as a polyline across the lane.
    fn stop_line_polygon(&self, id: LaneletId) -> Option<&[Point]>;

    /// Traffic light governing the stop line of `id`.  A stop line without
    /// a light is a stop sign.
    fn traffic_light_id(&self, id: LaneletId) -> Option<TrafficLightId>;

    /// Adjacent lanelet in `direction` that a vehicle may change onto.
    fn lane_changeable_lanelet_id(
        &self,
        id:        LaneletId,
        direction: LaneChangeDirection,
    ) -> Option<LaneletId>;

    /// Sorted, deduplicated lanelets that geometrically conflict with any of
    /// `ids` (crossing lanes and crosswalks).
    fn conflicting_lanelet_ids(&self, ids: &[LaneletId]) -> Vec<LaneletId>;

    /// Sorted, deduplicated lanelets that hold right of way over any of
    /// `ids`.
    fn right_of_way_lanelet_ids(&self, ids: &[LaneletId]) -> Vec<LaneletId>;

    /// `id` followed by its straight-ahead successors until their combined
    /// length reaches `distance`.
    fn following_lanelets(&self, id: LaneletId, distance: f64) -> Vec<LaneletId>;

    /// Shortest successor path from `from` to `to`, both inclusive.
    fn route(&self, from: LaneletId, to: LaneletId) -> Option<Vec<LaneletId>>;

    /// Match a map-frame pose onto the nearest lanelet within
    /// `matching_distance` whose direction agrees with the pose heading.
    fn to_lanelet_pose(
        &self,
        pose:              &Pose,
        include_crosswalk: bool,
        matching_distance: f64,
    ) -> Option<LaneletPose>;

    fn to_map_pose(&self, lanelet_pose: &LaneletPose) -> Option<Pose>;

    /// Outline of `id`: left boundary forward, then right boundary backward.
    fn lanelet_polygon(&self, id: LaneletId) -> Option<Vec<Point>>;

    fn is_crosswalk(&self, id: LaneletId) -> bool;
}
