//! Move onto an adjacent lanelet.

use tracing::debug;

use tsim_core::kinematics::advance_speed;
use tsim_core::{ActionKind, LaneletId, LaneletPose};
use tsim_spatial::TrajectorySpline;

use crate::actions::common::{finish, PREVIEW_RESOLUTION};
use crate::{
    ActionNode, BehaviorContext, BehaviorOutcome, BehaviorRequest, LaneChangeProgress, NodeStatus,
};

/// Seconds of travel a lane change takes at the current speed.
const LANE_CHANGE_DURATION: f64 = 3.0;

/// Shortest lane-change path, metres.
const MIN_LANE_CHANGE_DISTANCE: f64 = 10.0;

/// Drives a straight path from the current position onto the target
/// lanelet's centerline.  Clears the request once the path is complete.
pub struct LaneChangeAction;

fn target_of(request: &BehaviorRequest) -> Option<LaneletId> {
    match request {
        BehaviorRequest::LaneChange { target } => Some(*target),
        _ => None,
    }
}

/// Plan a fresh lane change from the current status onto `target`.
fn plan(ctx: &BehaviorContext<'_>, target: LaneletId) -> Option<LaneChangeProgress> {
    let from = ctx.status.lanelet_pose?;
    let target_length = ctx.graph.lanelet_length(target)?;
    let distance = (ctx.status.speed() * LANE_CHANGE_DURATION).max(MIN_LANE_CHANGE_DISTANCE);
    let end_s = (from.s + distance).min(target_length);
    let end = ctx.graph.to_map_pose(&LaneletPose::new(target, end_s, 0.0))?;
    let path = TrajectorySpline::new(vec![ctx.status.pose.position, end.position]).ok()?;
    Some(LaneChangeProgress { target, path, end, travelled: 0.0 })
}

impl ActionNode for LaneChangeAction {
    fn kind(&self) -> ActionKind {
        ActionKind::LaneChange
    }

    fn preconditions_met(&self, ctx: &BehaviorContext<'_>) -> bool {
        let Some(target) = target_of(ctx.request) else {
            return false;
        };
        let resuming = ctx.memory.lane_change.as_ref().is_some_and(|p| p.target == target);
        resuming || ctx.status.lanelet_pose_valid()
    }

    fn tick(&self, ctx: &BehaviorContext<'_>) -> BehaviorOutcome {
        let Some(target) = target_of(ctx.request) else {
            return BehaviorOutcome::failure(ctx);
        };
        let progress = match &ctx.memory.lane_change {
            Some(p) if p.target == target => Some(p.clone()),
            _ => plan(ctx, target),
        };
        let Some(mut progress) = progress else {
            return BehaviorOutcome::failure(ctx);
        };

        let step = advance_speed(
            ctx.status.speed(),
            ctx.requested_speed(),
            &ctx.parameters.dynamic_constraints,
            ctx.step_time,
        );
        progress.travelled += step.travelled.max(0.0);

        let mut memory = ctx.memory.clone();
        let length = progress.path.length();
        if progress.travelled >= length {
            debug!(entity = ctx.name, target = %target, "lane change complete");
            memory.lane_change = None;
            return BehaviorOutcome {
                status:      finish(ctx, progress.end, step.speed, step.accel, self.kind()),
                waypoints:   Vec::new(),
                obstacle:    None,
                node_status: NodeStatus::Success,
                memory,
                request:     BehaviorRequest::None,
            };
        }

        let pose = progress.path.pose_at(progress.travelled);
        let waypoints = progress.path.trajectory(progress.travelled, length, PREVIEW_RESOLUTION);
        memory.lane_change = Some(progress);
        BehaviorOutcome {
            status:      finish(ctx, pose, step.speed, step.accel, self.kind()),
            waypoints,
            obstacle:    None,
            node_status: NodeStatus::Running,
            memory,
            request:     ctx.request.clone(),
        }
    }
}
