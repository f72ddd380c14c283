//! `tsim-spatial` — lane graph, lane matching, splines, and spatial queries.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                  |
//! |-----------------|-----------------------------------------------------------|
//! | [`lane_graph`]  | `LaneGraph` provider trait, `LaneChangeDirection`         |
//! | [`lanelet_map`] | `LaneletMap` (CSR + R-tree), `LaneletMapBuilder`          |
//! | [`router`]      | `LaneRoute`, Dijkstra over successor edges                |
//! | [`spline`]      | `TrajectorySpline`                                        |
//! | [`polygon`]     | footprint polygons, collision and distance (via `geo`)    |
//! | [`query`]       | snapshot queries: distances, conflicts, right of way      |
//! | [`error`]       | `SpatialError`, `SpatialResult<T>`                        |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on public types.           |

pub mod error;
pub mod lane_graph;
pub mod lanelet_map;
pub mod polygon;
pub mod query;
pub mod router;
pub mod spline;

#[cfg(test)]
mod tests;

pub use error::{SpatialError, SpatialResult};
pub use lane_graph::{LaneChangeDirection, LaneGraph};
pub use lanelet_map::{Lanelet, LaneletKind, LaneletMap, LaneletMapBuilder, StopLine};
pub use polygon::{bounding_box_distance, check_collision_2d};
pub use router::LaneRoute;
pub use spline::TrajectorySpline;
