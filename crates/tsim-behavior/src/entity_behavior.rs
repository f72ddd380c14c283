//! The closed set of per-entity-kind behaviors.

use tsim_core::EntityType;

use crate::actions::{
    FollowLaneAction, LaneChangeAction, MoveInWorldFrameAction, StopAtCrossingEntityAction,
    YieldAction,
};
use crate::{ActionNode, BehaviorContext, BehaviorOutcome};

const VEHICLE_NODES: &[&dyn ActionNode] = &[
    &LaneChangeAction,
    &YieldAction,
    &StopAtCrossingEntityAction,
    &FollowLaneAction,
    &MoveInWorldFrameAction,
];

const PEDESTRIAN_NODES: &[&dyn ActionNode] = &[&FollowLaneAction, &MoveInWorldFrameAction];

const EGO_NODES: &[&dyn ActionNode] = &[&MoveInWorldFrameAction];

/// Behavior attached to an entity, chosen by its type at spawn.
///
/// Each variant runs its nodes as a fallback sequence: the first node whose
/// preconditions hold and whose tick does not fail produces the outcome.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityBehavior {
    Vehicle,
    Pedestrian,
    Ego,
}

impl EntityBehavior {
    pub fn for_type(entity_type: EntityType) -> Self {
        match entity_type {
            EntityType::Ego        => EntityBehavior::Ego,
            EntityType::Vehicle    => EntityBehavior::Vehicle,
            EntityType::Pedestrian => EntityBehavior::Pedestrian,
        }
    }

    pub fn nodes(self) -> &'static [&'static dyn ActionNode] {
        match self {
            EntityBehavior::Vehicle    => VEHICLE_NODES,
            EntityBehavior::Pedestrian => PEDESTRIAN_NODES,
            EntityBehavior::Ego        => EGO_NODES,
        }
    }

    /// Tick the fallback sequence once.
    pub fn tick(self, ctx: &BehaviorContext<'_>) -> BehaviorOutcome {
        for node in self.nodes() {
            if !node.preconditions_met(ctx) {
                continue;
            }
            let outcome = node.tick(ctx);
            if !outcome.is_failure() {
                tracing::trace!(entity = ctx.name, node = %node.kind(), status = ?outcome.node_status, "behavior ticked");
                return outcome;
            }
        }
        BehaviorOutcome::failure(ctx)
    }
}
