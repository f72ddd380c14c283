//! Perception and integration helpers shared by the action nodes.

use tsim_core::kinematics::{advance_speed, integrate_pose};
use tsim_core::geometry::normalize_angle;
use tsim_core::{
    Accel, ActionKind, EntityStatus, LaneletId, LaneletPose, ObstacleKind, Point, Pose, Twist,
};
use tsim_spatial::{query, TrajectorySpline};

use crate::{BehaviorContext, BehaviorOutcome, NodeStatus};

/// Spacing of trajectory preview points, metres.
pub const PREVIEW_RESOLUTION: f64 = 1.0;

/// Below this speed an entity counts as stopped, m/s.
pub const STOPPED_SPEED: f64 = 0.01;

/// Preview length for an entity moving at `speed`: five seconds of travel,
/// kept within 20..=50 m.
#[inline]
pub fn horizon(speed: f64) -> f64 {
    (speed * 5.0).clamp(20.0, 50.0)
}

/// Arc-length of `lanelet_pose` measured from the start of `route`.
fn route_offset(ctx: &BehaviorContext<'_>, lanelet_pose: &LaneletPose) -> Option<f64> {
    let mut before = 0.0;
    for &id in ctx.route_lanelets {
        if id == lanelet_pose.lanelet_id {
            return Some(before + lanelet_pose.s);
        }
        before += ctx.graph.lanelet_length(id)?;
    }
    None
}

/// Centerline ahead of the entity along its route, sampled every metre.
///
/// `None` when the entity is off the map, reversing, or at the end of its
/// route.
pub fn lane_preview(ctx: &BehaviorContext<'_>) -> Option<TrajectorySpline> {
    let lanelet_pose = ctx.status.lanelet_pose?;
    let speed = ctx.status.speed();
    if speed < 0.0 {
        return None;
    }
    let route = query::route_spline(ctx.graph, ctx.route_lanelets)?;
    let start = route_offset(ctx, &lanelet_pose)?;
    let points = route.trajectory(start, start + horizon(speed), PREVIEW_RESOLUTION);
    TrajectorySpline::new(points).ok()
}

/// Status after one step driven along `preview` toward `target_speed`.
///
/// The lateral offset from the centerline is preserved.
pub fn integrate_along(
    ctx:          &BehaviorContext<'_>,
    preview:      &TrajectorySpline,
    target_speed: f64,
    kind:         ActionKind,
) -> EntityStatus {
    let step = advance_speed(
        ctx.status.speed(),
        target_speed,
        &ctx.parameters.dynamic_constraints,
        ctx.step_time,
    );
    let offset = ctx.status.lanelet_pose.map_or(0.0, |lp| lp.offset);
    let anchor = preview.pose_at(step.travelled.max(0.0));
    let pose = Pose::new(anchor.transform_point(Point::xy(0.0, offset)), anchor.yaw);
    finish(ctx, pose, step.speed, step.accel, kind)
}

/// Outcome for an entity on its lane with nothing ahead to drive along:
/// stationary or reversing, or at the end of its route.
///
/// The pose is kept and only the speed moves toward the requested speed.
pub fn hold_on_lane(ctx: &BehaviorContext<'_>, kind: ActionKind) -> BehaviorOutcome {
    let step = advance_speed(
        ctx.status.speed(),
        ctx.requested_speed(),
        &ctx.parameters.dynamic_constraints,
        ctx.step_time,
    );
    BehaviorOutcome {
        status:      finish(ctx, ctx.status.pose, step.speed, step.accel, kind),
        waypoints:   Vec::new(),
        obstacle:    None,
        node_status: NodeStatus::Success,
        memory:      ctx.memory.clone(),
        request:     ctx.request.clone(),
    }
}

/// Status after one step of dead reckoning along the entity's heading.
pub fn integrate_in_world_frame(
    ctx:          &BehaviorContext<'_>,
    target_speed: f64,
    kind:         ActionKind,
) -> EntityStatus {
    let step = advance_speed(
        ctx.status.speed(),
        target_speed,
        &ctx.parameters.dynamic_constraints,
        ctx.step_time,
    );
    let pose = integrate_pose(&ctx.status.pose, &ctx.status.twist, step.travelled, ctx.step_time);
    let mut next = finish(ctx, pose, step.speed, step.accel, kind);
    next.twist.angular = ctx.status.twist.angular;
    next
}

/// Stamp a new pose and speed onto a copy of the current status.
pub fn finish(
    ctx:   &BehaviorContext<'_>,
    pose:  Pose,
    speed: f64,
    accel: f64,
    kind:  ActionKind,
) -> EntityStatus {
    let yaw_rate = if ctx.step_time > 0.0 {
        normalize_angle(pose.yaw - ctx.status.pose.yaw) / ctx.step_time
    } else {
        0.0
    };
    let mut next = ctx.status.clone();
    next.time = ctx.next_time();
    next.pose = pose;
    next.twist = Twist::new(speed, yaw_rate);
    next.accel = Accel { linear: accel, angular: 0.0 };
    next.action = kind;
    next
}

/// Speed that brings the entity to rest `stop_margin` short of a target
/// `distance` ahead, capped by the requested speed.
///
/// While the target is beyond braking range the entity holds its current
/// speed.
pub fn stopping_target_speed(ctx: &BehaviorContext<'_>, distance: f64) -> f64 {
    let constraints = &ctx.parameters.dynamic_constraints;
    let speed = ctx.status.speed();
    let rest = rest_distance(ctx, distance);
    let stopping = if rest < constraints.braking_distance(speed) {
        constraints.stopping_speed(rest)
    } else {
        speed
    };
    match ctx.target_speed {
        Some(requested) => requested.min(stopping),
        None => stopping,
    }
}

/// Distance left to the stop point in front of a target at `distance`.
#[inline]
pub fn rest_distance(ctx: &BehaviorContext<'_>, distance: f64) -> f64 {
    distance - (ctx.status.bounding_box.dimensions.length + ctx.parameters.stop_margin)
}

/// A candidate stop target along the preview.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StopTarget {
    pub kind:      ObstacleKind,
    pub distance:  f64,
    /// Stop-sign lanelet, set only for stop lines without a traffic light.
    pub stop_sign: Option<LaneletId>,
}

/// Nearest thing the entity must stop for along `preview`: an entity on a
/// conflicting or route lanelet, an occupied conflicting crosswalk, a
/// red or amber traffic-light stop line, or an uncleared stop sign.
pub fn stop_target(ctx: &BehaviorContext<'_>, preview: &TrajectorySpline) -> Option<StopTarget> {
    let mut candidates: Vec<StopTarget> = Vec::new();

    let conflicting = query::conflicting_entities(ctx.graph, ctx.others, ctx.route_lanelets, ctx.name);
    let ahead = query::entities_on_lanelets(ctx.others, ctx.route_lanelets, ctx.name);
    for (_, other) in conflicting.into_iter().chain(ahead) {
        let Some(lp) = other.lanelet_pose else { continue };
        let hit = if ctx.graph.is_crosswalk(lp.lanelet_id) {
            ctx.graph
                .lanelet_polygon(lp.lanelet_id)
                .and_then(|outline| query::distance_to_polygon_along(preview, &outline))
                .map(|d| (ObstacleKind::Crosswalk, d))
        } else {
            query::distance_to_entity_along(preview, other).map(|d| (ObstacleKind::Entity, d))
        };
        if let Some((kind, distance)) = hit {
            candidates.push(StopTarget { kind, distance, stop_sign: None });
        }
    }

    for (lanelet, distance) in query::stop_lines_along(ctx.graph, preview, ctx.route_lanelets) {
        match ctx.graph.traffic_light_id(lanelet) {
            Some(light) if ctx.traffic_lights.color(light).requires_stop() => {
                candidates.push(StopTarget { kind: ObstacleKind::StopLine, distance, stop_sign: None });
            }
            Some(_) => {}
            None if ctx.memory.cleared_stop_lines.contains(&lanelet) => {}
            None => candidates.push(StopTarget {
                kind: ObstacleKind::StopLine,
                distance,
                stop_sign: Some(lanelet),
            }),
        }
    }

    candidates.into_iter().min_by(|a, b| a.distance.total_cmp(&b.distance))
}
