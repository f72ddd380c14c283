//! Spatial-subsystem error type.
//!
//! Only map and spline construction can fail; queries against a built map
//! report misses as `None`.

use thiserror::Error;

use tsim_core::LaneletId;

/// Errors produced by `tsim-spatial`.
#[derive(Debug, Error)]
pub enum SpatialError {
    #[error("lanelet {0} added twice")]
    DuplicateLanelet(LaneletId),

    #[error("lanelet {0} not found in map")]
    LaneletNotFound(LaneletId),

    #[error("centerline of lanelet {0} has fewer than two distinct points")]
    DegenerateCenterline(LaneletId),

    #[error("spline needs at least two distinct points, got {0}")]
    DegenerateSpline(usize),
}

pub type SpatialResult<T> = Result<T, SpatialError>;
