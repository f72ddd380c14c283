//! The `ActionNode` trait — one step of an entity's decision sequence.

use tsim_core::ActionKind;

use crate::{BehaviorContext, BehaviorOutcome};

/// A stateless action node.
///
/// Nodes keep no fields: everything that persists between steps lives in
/// [`BehaviorMemory`](crate::BehaviorMemory) and comes back through the
/// context, so one static instance serves every entity.
///
/// # Thread safety
///
/// The entity manager may tick many entities in parallel via Rayon, so
/// implementations must be `Send + Sync`.
pub trait ActionNode: Send + Sync {
    /// Tag written into the produced status.
    fn kind(&self) -> ActionKind;

    /// `true` if this node is willing to handle the entity this step.
    fn preconditions_met(&self, ctx: &BehaviorContext<'_>) -> bool;

    /// Compute the entity's next status.  May still return
    /// [`NodeStatus::Failure`](crate::NodeStatus::Failure) if a condition
    /// only detectable while planning does not hold.
    fn tick(&self, ctx: &BehaviorContext<'_>) -> BehaviorOutcome;
}
