//! Lane-relative and geometric queries over a status snapshot.
//!
//! Every function is pure: it reads a [`LaneGraph`] and a snapshot and
//! returns owned results or borrows into the snapshot.  Nothing here knows
//! about the entity registry, so the same code serves the scheduler's
//! public queries and the behaviors' per-tick perception.

use tsim_core::{EntityStatus, LaneletId, LaneletPose, Point, StatusSnapshot};

use crate::lane_graph::LaneGraph;
use crate::spline::TrajectorySpline;

/// Signed lane-following distance between two lane poses.
///
/// Forward (`from` → `to`) and backward (`to` → `from`) distances longer
/// than `max_distance` are discarded.  If both survive the shorter wins,
/// ties going forward; a backward result is negated.
pub fn longitudinal_distance(
    graph:        &dyn LaneGraph,
    from:         &LaneletPose,
    to:           &LaneletPose,
    max_distance: f64,
) -> Option<f64> {
    let forward = graph
        .longitudinal_distance(from.lanelet_id, from.s, to.lanelet_id, to.s)
        .filter(|&d| d <= max_distance);
    let backward = graph
        .longitudinal_distance(to.lanelet_id, to.s, from.lanelet_id, from.s)
        .filter(|&d| d <= max_distance);

    match (forward, backward) {
        (Some(f), Some(b)) if f > b => Some(-b),
        (Some(f), _) => Some(f),
        (None, Some(b)) => Some(-b),
        (None, None) => None,
    }
}

/// Entities other than `exclude` whose lane pose lies on one of `lanelets`.
pub fn entities_on_lanelets<'a>(
    snapshot: &'a StatusSnapshot,
    lanelets: &[LaneletId],
    exclude:  &str,
) -> Vec<(&'a str, &'a EntityStatus)> {
    snapshot
        .iter()
        .filter(|(name, _)| name.as_str() != exclude)
        .filter(|(_, status)| {
            status
                .lanelet_pose
                .is_some_and(|lp| lanelets.contains(&lp.lanelet_id))
        })
        .map(|(name, status)| (name.as_str(), status))
        .collect()
}

/// Entities on lanelets that conflict with any of `following`.
pub fn conflicting_entities<'a>(
    graph:     &dyn LaneGraph,
    snapshot:  &'a StatusSnapshot,
    following: &[LaneletId],
    exclude:   &str,
) -> Vec<(&'a str, &'a EntityStatus)> {
    entities_on_lanelets(snapshot, &graph.conflicting_lanelet_ids(following), exclude)
}

/// Entities on lanelets that hold right of way over any of `following`.
pub fn right_of_way_entities<'a>(
    graph:     &dyn LaneGraph,
    snapshot:  &'a StatusSnapshot,
    following: &[LaneletId],
    exclude:   &str,
) -> Vec<(&'a str, &'a EntityStatus)> {
    entities_on_lanelets(snapshot, &graph.right_of_way_lanelet_ids(following), exclude)
}

/// Arc-length along `spline` of its first crossing with `polygon`.
#[inline]
pub fn distance_to_polygon_along(spline: &TrajectorySpline, polygon: &[Point]) -> Option<f64> {
    spline.collision_point_2d(polygon)
}

/// Arc-length along `spline` where it first meets the footprint of `status`.
pub fn distance_to_entity_along(spline: &TrajectorySpline, status: &EntityStatus) -> Option<f64> {
    spline.collision_point_2d(&status.footprint())
}

/// Concatenated centerline of consecutive `lanelets`.
pub fn route_spline(graph: &dyn LaneGraph, lanelets: &[LaneletId]) -> Option<TrajectorySpline> {
    let mut points: Vec<Point> = Vec::new();
    for &id in lanelets {
        points.extend_from_slice(graph.center_points(id)?);
    }
    TrajectorySpline::new(points).ok()
}

/// Stop lines on `lanelets` crossed by `spline`, nearest first.
pub fn stop_lines_along(
    graph:    &dyn LaneGraph,
    spline:   &TrajectorySpline,
    lanelets: &[LaneletId],
) -> Vec<(LaneletId, f64)> {
    let mut hits: Vec<(LaneletId, f64)> = lanelets
        .iter()
        .filter_map(|&id| {
            let line = graph.stop_line_polygon(id)?;
            spline.collision_point_2d(line).map(|s| (id, s))
        })
        .collect();
    hits.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    hits
}
