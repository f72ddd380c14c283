//! Per-entity behavior tuning.

use tsim_core::DynamicConstraints;

use crate::{BehaviorError, BehaviorResult};

/// How much of its surroundings a driver reacts to.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriverModel {
    /// When `false` the entity ignores other entities, stop lines and
    /// right of way and only follows its lane.
    pub see_around: bool,
}

impl Default for DriverModel {
    fn default() -> Self {
        Self { see_around: true }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BehaviorParameters {
    pub dynamic_constraints: DynamicConstraints,
    pub driver_model:        DriverModel,
    /// Gap kept between the entity's front and a stop target, in metres,
    /// on top of the entity length.  Default: 3.0.
    pub stop_margin:         f64,
}

impl Default for BehaviorParameters {
    fn default() -> Self {
        Self::vehicle()
    }
}

impl BehaviorParameters {
    pub fn vehicle() -> Self {
        Self {
            dynamic_constraints: DynamicConstraints::default(),
            driver_model:        DriverModel::default(),
            stop_margin:         3.0,
        }
    }

    pub fn pedestrian() -> Self {
        Self {
            dynamic_constraints: DynamicConstraints::pedestrian(),
            driver_model:        DriverModel { see_around: false },
            stop_margin:         1.0,
        }
    }

    pub fn validate(&self) -> BehaviorResult<()> {
        self.dynamic_constraints.validate()?;
        if !(self.stop_margin >= 0.0) {
            return Err(BehaviorError::InvalidParameters(format!(
                "stop_margin {} must be >= 0",
                self.stop_margin
            )));
        }
        Ok(())
    }
}
