//! Sensor-subsystem error type.

use thiserror::Error;

/// Errors produced by `tsim-sensor`.
#[derive(Debug, Error)]
pub enum SensorError {
    /// More primitives were added since the last reset than the marker
    /// layers can count.
    #[error("grid cannot hold more than {max} primitives")]
    PrimitiveOverflow { max: i16 },

    #[error("invalid occupancy grid config: {0}")]
    InvalidConfig(String),
}

pub type SensorResult<T> = Result<T, SensorError>;
