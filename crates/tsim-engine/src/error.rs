use thiserror::Error;

use tsim_behavior::BehaviorError;
use tsim_core::{CoreError, LaneletId};
use tsim_sensor::SensorError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{count} ego entities registered; at most one may exist while ticking")]
    MultipleEgo { count: usize },

    #[error("entity {0:?} not found")]
    EntityNotFound(String),

    #[error("entity {0:?} already exists")]
    DuplicateEntity(String),

    #[error("cannot change ego entity {name:?} after the scenario started (t = {time})")]
    EgoLocked { name: String, time: f64 },

    #[error("lanelet pose on {0} cannot be placed on the map")]
    InvalidLaneletPose(LaneletId),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("engine configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Behavior(#[from] BehaviorError),

    #[error(transparent)]
    Sensor(#[from] SensorError),
}

pub type EngineResult<T> = Result<T, EngineError>;
