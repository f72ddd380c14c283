//! Action nodes, in the order vehicles try them.
//!
//! | Node                           | Serves                                          |
//! |--------------------------------|-------------------------------------------------|
//! | [`LaneChangeAction`]           | `LaneChange` requests                           |
//! | [`YieldAction`]                | right-of-way traffic on the route               |
//! | [`StopAtCrossingEntityAction`] | lane following with stop targets                |
//! | [`FollowLaneAction`]           | blind lane following                            |
//! | [`MoveInWorldFrameAction`]     | dead reckoning off the map; the ego             |

pub mod common;
pub mod follow_lane;
pub mod lane_change;
pub mod move_in_world_frame;
pub mod stop_at_crossing_entity;
pub mod yield_action;

pub use follow_lane::FollowLaneAction;
pub use lane_change::LaneChangeAction;
pub use move_in_world_frame::MoveInWorldFrameAction;
pub use stop_at_crossing_entity::StopAtCrossingEntityAction;
pub use yield_action::YieldAction;
