//! Requests — what the scenario asks an entity to do.

use tsim_core::LaneletId;

/// Standing request read by every action node's preconditions.
///
/// Requests persist across ticks until replaced by the scenario or
/// completed by the node that serves them.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BehaviorRequest {
    #[default]
    None,
    FollowLane,
    /// Move onto `target`, a lanelet adjacent to the current one.
    LaneChange { target: LaneletId },
}

impl BehaviorRequest {
    /// `true` for the requests served by plain lane following.
    #[inline]
    pub fn is_lane_following(&self) -> bool {
        matches!(self, BehaviorRequest::None | BehaviorRequest::FollowLane)
    }
}
