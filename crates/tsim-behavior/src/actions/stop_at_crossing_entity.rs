//! Lane following that stops for whatever crosses the entity's path.

use tracing::debug;

use tsim_core::{ActionKind, Obstacle};
use tsim_spatial::query;

use crate::actions::common::{
    hold_on_lane, integrate_along, lane_preview, rest_distance, stop_target, stopping_target_speed,
    STOPPED_SPEED,
};
use crate::{ActionNode, BehaviorContext, BehaviorOutcome, NodeStatus};

/// A stopped entity within this distance of its stop point has served a
/// stop sign, metres.
const STOP_SIGN_CLEAR_DISTANCE: f64 = 1.0;

/// Follows the lane and brakes for the nearest stop target on the preview.
///
/// Returns `Success` while nothing is in the way and `Running` while
/// stopping for something.
pub struct StopAtCrossingEntityAction;

impl ActionNode for StopAtCrossingEntityAction {
    fn kind(&self) -> ActionKind {
        ActionKind::StopAtCrossingEntity
    }

    fn preconditions_met(&self, ctx: &BehaviorContext<'_>) -> bool {
        ctx.request.is_lane_following()
            && ctx.parameters.driver_model.see_around
            && ctx.status.lanelet_pose_valid()
            && query::right_of_way_entities(ctx.graph, ctx.others, ctx.route_lanelets, ctx.name)
                .is_empty()
    }

    fn tick(&self, ctx: &BehaviorContext<'_>) -> BehaviorOutcome {
        let Some(preview) = lane_preview(ctx) else {
            return hold_on_lane(ctx, self.kind());
        };

        let mut memory = ctx.memory.clone();
        memory.cleared_stop_lines.retain(|id| ctx.route_lanelets.contains(id));

        let Some(target) = stop_target(ctx, &preview) else {
            return BehaviorOutcome {
                status:      integrate_along(ctx, &preview, ctx.requested_speed(), self.kind()),
                waypoints:   preview.points().to_vec(),
                obstacle:    None,
                node_status: NodeStatus::Success,
                memory,
                request:     ctx.request.clone(),
            };
        };

        let speed = stopping_target_speed(ctx, target.distance);
        if let Some(lanelet) = target.stop_sign {
            if ctx.status.speed() < STOPPED_SPEED
                && rest_distance(ctx, target.distance) <= STOP_SIGN_CLEAR_DISTANCE
            {
                debug!(entity = ctx.name, lanelet = %lanelet, "stop sign served");
                memory.cleared_stop_lines.insert(lanelet);
            }
        }

        let obstacle = (0.0..=preview.length())
            .contains(&target.distance)
            .then_some(Obstacle { kind: target.kind, s: target.distance });

        debug!(
            entity = ctx.name,
            target = ?target.kind,
            distance = target.distance,
            speed,
            "stopping for target"
        );

        BehaviorOutcome {
            status:      integrate_along(ctx, &preview, speed, self.kind()),
            waypoints:   preview.points().to_vec(),
            obstacle,
            node_status: NodeStatus::Running,
            memory,
            request:     ctx.request.clone(),
        }
    }
}
