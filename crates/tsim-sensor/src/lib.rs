//! `tsim-sensor` — simulated occupancy and visibility grids.
//!
//! # Crate layout
//!
//! | Module               | Contents                                                   |
//! |----------------------|------------------------------------------------------------|
//! | [`grid_traversal`]   | `GridTraversal`, cells crossed by a segment                |
//! | [`primitive`]        | `Primitive` trait, `BoxPrimitive`, `HullPrimitive`         |
//! | [`occupancy_grid`]   | `OccupancyGrid`, `OccupancyGridBuilder`                    |
//! | [`sensor`]           | `OccupancyGridSensor` and its config                       |
//! | [`error`]            | `SensorError`, `SensorResult<T>`                           |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on grids and configs.      |

pub mod error;
pub mod grid_traversal;
pub mod occupancy_grid;
pub mod primitive;
pub mod sensor;


pub use error::{SensorError, SensorResult};
pub use grid_traversal::GridTraversal;
pub use occupancy_grid::{OccupancyGrid, OccupancyGridBuilder};
pub use primitive::{BoxPrimitive, HullPrimitive, Primitive};
pub use sensor::{OccupancyGridSensor, OccupancyGridSensorConfig};
