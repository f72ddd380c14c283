use thiserror::Error;

use tsim_core::CoreError;

#[derive(Debug, Error)]
pub enum BehaviorError {
    #[error("invalid behavior parameters: {0}")]
    InvalidParameters(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type BehaviorResult<T> = Result<T, BehaviorError>;
