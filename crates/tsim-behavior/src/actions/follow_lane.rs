use tsim_core::ActionKind;

use crate::actions::common::{hold_on_lane, integrate_along, lane_preview};
use crate::{ActionNode, BehaviorContext, BehaviorOutcome, NodeStatus};

/// Follows the route centerline at the requested speed without looking at
/// anything else.  Serves drivers that do not see around and pedestrians.
pub struct FollowLaneAction;

impl ActionNode for FollowLaneAction {
    fn kind(&self) -> ActionKind {
        ActionKind::FollowLane
    }

    fn preconditions_met(&self, ctx: &BehaviorContext<'_>) -> bool {
        ctx.request.is_lane_following() && ctx.status.lanelet_pose_valid()
    }

    fn tick(&self, ctx: &BehaviorContext<'_>) -> BehaviorOutcome {
        let Some(preview) = lane_preview(ctx) else {
            return hold_on_lane(ctx, self.kind());
        };
        BehaviorOutcome {
            status:      integrate_along(ctx, &preview, ctx.requested_speed(), self.kind()),
            waypoints:   preview.points().to_vec(),
            obstacle:    None,
            node_status: NodeStatus::Running,
            memory:      ctx.memory.clone(),
            request:     ctx.request.clone(),
        }
    }
}
