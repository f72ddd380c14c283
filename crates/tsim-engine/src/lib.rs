//! `tsim-engine` — entity registry and tick scheduler for the tsim framework.
//!
//! # Crate layout
//!
//! | Module           | Contents                                                  |
//! |------------------|-----------------------------------------------------------|
//! | [`manager`]      | `EntityManager`: registry, requests, queries, `update`    |
//! | [`builder`]      | `EntityManagerBuilder`                                    |
//! | [`entity`]       | `Entity`, one registry entry and its per-tick step        |
//! | [`speed_change`] | `SpeedChangeRequest` and its resolution each tick         |
//! | [`record`]       | `TickRecord`, `EntityStatusWithTrajectory`                |
//! | [`observer`]     | `SimObserver` callbacks, `NoopObserver`                   |
//! | [`error`]        | `EngineError`, `EngineResult<T>`                          |
//!
//! # Two-snapshot tick
//!
//! ```text
//! update(t, dt):
//!   ① Ego check   — more than one ego → MultipleEgo, nothing touched.
//!   ② S0          — copy every status into a name-sorted snapshot.
//!   ③ Distribute  — every entity sees S0 as "the others".
//!   ④ Behavior    — each entity ticks against S0 and its own state only
//!                   (parallel with the `parallel` feature).
//!   ⑤ Commit      — in ascending name order: write status, re-project the
//!                   lane pose, pop reached goals.
//!   ⑥ S1          — snapshot again and distribute.
//!   ⑦ Record      — statuses with trajectories and sensor frames at t + dt.
//! ```
//!
//! Because phase ④ reads nothing written in the same step, the result is
//! independent of spawn order and thread count.
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                 |
//! |------------|--------------------------------------------------------|
//! | `parallel` | Runs the behavior phase on Rayon's thread pool.        |
//! | `fx-hash`  | FxHash for the name-keyed entity registry.             |
//! | `serde`    | `Serialize`/`Deserialize` on records and requests.     |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tsim_engine::{EntityManagerBuilder, NoopObserver};
//!
//! let mut manager = EntityManagerBuilder::new(Arc::new(map)).build()?;
//! manager.spawn_on_lane("car", EntityType::Vehicle, pose, bbox, BehaviorParameters::vehicle())?;
//! manager.start_npc_logic();
//! manager.run_steps(200, &mut NoopObserver)?;
//! ```

pub mod builder;
pub mod entity;
pub mod error;
pub mod manager;
pub mod observer;
pub mod record;
pub mod speed_change;

#[cfg(test)]
mod tests;

pub use builder::EntityManagerBuilder;
pub use entity::{Entity, GOAL_TOLERANCE, ROUTE_LOOKAHEAD};
pub use error::{EngineError, EngineResult};
pub use manager::EntityManager;
pub use observer::{NoopObserver, SimObserver};
pub use record::{EntityStatusWithTrajectory, TickRecord};
pub use speed_change::{
    ActiveSpeedChange, RelativeSpeedKind, SpeedChangeRequest, SpeedConstraint, SpeedTarget,
    SpeedTransition,
};
