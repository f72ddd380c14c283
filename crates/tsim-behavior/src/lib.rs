//! `tsim-behavior` — per-entity action nodes and lane-following behavior.
//!
//! # Crate layout
//!
//! | Module              | Contents                                                     |
//! |---------------------|--------------------------------------------------------------|
//! | [`context`]         | `BehaviorContext<'a>` — read-only per-entity tick view        |
//! | [`node`]            | `ActionNode` trait                                           |
//! | [`actions`]         | the concrete nodes and their shared helpers                  |
//! | [`entity_behavior`] | `EntityBehavior` — fallback sequence per entity kind          |
//! | [`outcome`]         | `BehaviorOutcome`, `NodeStatus`, `BehaviorMemory`            |
//! | [`request`]         | `BehaviorRequest`                                            |
//! | [`parameters`]      | `BehaviorParameters`, `DriverModel`                          |
//! | [`error`]           | `BehaviorError`, `BehaviorResult<T>`                         |
//!
//! # Design notes
//!
//! The tick loop in `tsim-engine` works as follows:
//!
//! 1. **Behavior phase** (parallel): for every entity, build a
//!    `BehaviorContext` over the start-of-step snapshot and call
//!    `EntityBehavior::tick`.  All reads go through the context; no mutation.
//!
//! 2. **Commit phase** (sequential): write each `BehaviorOutcome`'s status,
//!    memory and request back into the registry in name order.
//!
//! This split means nodes only need to be `Send + Sync` — they never hold
//! mutable state that could cause data races.

pub mod actions;
pub mod context;
pub mod entity_behavior;
pub mod error;
pub mod node;
pub mod outcome;
pub mod parameters;
pub mod request;


pub use context::BehaviorContext;
pub use entity_behavior::EntityBehavior;
pub use error::{BehaviorError, BehaviorResult};
pub use node::ActionNode;
pub use outcome::{BehaviorMemory, BehaviorOutcome, LaneChangeProgress, NodeStatus};
pub use parameters::{BehaviorParameters, DriverModel};
pub use request::BehaviorRequest;
