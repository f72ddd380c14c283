//! `tsim-core` — foundational types for the `tsim` traffic simulation engine.
//!
//! This crate is a dependency of every other `tsim-*` crate.  It intentionally
//! has no `tsim-*` dependencies and minimal external ones (only `thiserror`,
//! plus optional `serde`).
//!
//! # What lives here
//!
//! | Module            | Contents                                                  |
//! |-------------------|-----------------------------------------------------------|
//! | [`ids`]           | `LaneletId`, `TrafficLightId`                             |
//! | [`geometry`]      | `Point`, `Pose`, `Twist`, `Accel`, `BoundingBox`          |
//! | [`entity`]        | `EntityType`, `EntityStatus`, `LaneletPose`, `Obstacle`   |
//! | [`kinematics`]    | `DynamicConstraints`, speed/position integration          |
//! | [`traffic_light`] | `TrafficLightColor`, `TrafficLights`                      |
//! | [`time`]          | `SimClock`, `SimConfig`                                   |
//! | [`error`]         | `CoreError`, `CoreResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod entity;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod kinematics;
pub mod time;
pub mod traffic_light;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use entity::{
    ActionKind, EntityStatus, EntityType, LaneletPose, Obstacle, ObstacleKind, StatusSnapshot,
};
pub use error::{CoreError, CoreResult};
pub use geometry::{Accel, BoundingBox, Dimensions, Point, Pose, Twist};
pub use ids::{LaneletId, TrafficLightId};
pub use kinematics::DynamicConstraints;
pub use time::{SimClock, SimConfig};
pub use traffic_light::{TrafficLightColor, TrafficLights};
