//! Give way to traffic with right of way.

use tracing::debug;

use tsim_core::{ActionKind, Obstacle, ObstacleKind};
use tsim_spatial::query;

use crate::actions::common::{hold_on_lane, integrate_along, lane_preview, stopping_target_speed};
use crate::{ActionNode, BehaviorContext, BehaviorOutcome, NodeStatus};

/// Stops before the first route lanelet over which an entity currently
/// holds right of way.
pub struct YieldAction;

/// Distance to the start of the first route lanelet with a priority entity.
///
/// Lanelets already entered are skipped: the entity cannot stop before them.
fn yield_stop_distance(ctx: &BehaviorContext<'_>) -> Option<f64> {
    let from = ctx.status.lanelet_pose?;
    ctx.route_lanelets.iter().find_map(|&lanelet| {
        if query::right_of_way_entities(ctx.graph, ctx.others, &[lanelet], ctx.name).is_empty() {
            return None;
        }
        ctx.graph.longitudinal_distance(from.lanelet_id, from.s, lanelet, 0.0)
    })
}

impl ActionNode for YieldAction {
    fn kind(&self) -> ActionKind {
        ActionKind::Yield
    }

    fn preconditions_met(&self, ctx: &BehaviorContext<'_>) -> bool {
        ctx.request.is_lane_following()
            && ctx.parameters.driver_model.see_around
            && ctx.status.lanelet_pose_valid()
            && !query::right_of_way_entities(ctx.graph, ctx.others, ctx.route_lanelets, ctx.name)
                .is_empty()
    }

    fn tick(&self, ctx: &BehaviorContext<'_>) -> BehaviorOutcome {
        let Some(preview) = lane_preview(ctx) else {
            return hold_on_lane(ctx, self.kind());
        };
        let (speed, obstacle, node_status) = match yield_stop_distance(ctx) {
            Some(distance) => {
                debug!(entity = ctx.name, distance, "yielding");
                let obstacle = (0.0..=preview.length())
                    .contains(&distance)
                    .then_some(Obstacle { kind: ObstacleKind::Entity, s: distance });
                (stopping_target_speed(ctx, distance), obstacle, NodeStatus::Running)
            }
            None => (ctx.requested_speed(), None, NodeStatus::Success),
        };
        BehaviorOutcome {
            status: integrate_along(ctx, &preview, speed, self.kind()),
            waypoints: preview.points().to_vec(),
            obstacle,
            node_status,
            memory: ctx.memory.clone(),
            request: ctx.request.clone(),
        }
    }
}
