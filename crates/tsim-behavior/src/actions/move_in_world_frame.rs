use tsim_core::ActionKind;

use crate::actions::common::integrate_in_world_frame;
use crate::{ActionNode, BehaviorContext, BehaviorOutcome, NodeStatus};

/// Dead-reckons along the current heading and yaw rate.
///
/// Always applicable; the last node of every sequence and the only one the
/// ego uses.
pub struct MoveInWorldFrameAction;

impl ActionNode for MoveInWorldFrameAction {
    fn kind(&self) -> ActionKind {
        ActionKind::MoveInWorldFrame
    }

    fn preconditions_met(&self, _ctx: &BehaviorContext<'_>) -> bool {
        true
    }

    fn tick(&self, ctx: &BehaviorContext<'_>) -> BehaviorOutcome {
        BehaviorOutcome {
            status:      integrate_in_world_frame(ctx, ctx.requested_speed(), self.kind()),
            waypoints:   Vec::new(),
            obstacle:    None,
            node_status: NodeStatus::Running,
            memory:      ctx.memory.clone(),
            request:     ctx.request.clone(),
        }
    }
}
