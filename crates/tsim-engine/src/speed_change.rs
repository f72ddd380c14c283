//! Speed-change requests issued by the scenario.
//!
//! A request names a target (absolute, or relative to another entity's
//! speed), how to get there, and whether it keeps applying once reached.
//! The manager resolves it against the start-of-step snapshot each tick and
//! hands the result to the entity's behavior as its requested speed.

use tracing::warn;

use tsim_core::{DynamicConstraints, StatusSnapshot};

use crate::{EngineError, EngineResult};

/// Speeds closer than this count as reached, m/s.
pub const SPEED_TOLERANCE: f64 = 1e-3;

// ── Request types ─────────────────────────────────────────────────────────────

/// How a relative target combines with the reference entity's speed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelativeSpeedKind {
    /// reference + value
    Delta,
    /// reference × value
    Factor,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpeedTarget {
    Absolute(f64),
    Relative {
        reference: String,
        kind:      RelativeSpeedKind,
        value:     f64,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpeedTransition {
    /// Accelerate toward the target under the active constraint.
    #[default]
    Linear,
    /// Jump to the target speed at the next tick.
    Step,
}

#[derive(Copy, Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpeedConstraint {
    /// Use the entity's own dynamic constraints.
    #[default]
    None,
    /// Accelerate or brake at this rate, m/s².
    Acceleration(f64),
    /// Reach the target this many seconds after the request starts.
    Time(f64),
}

/// A scenario request to change an entity's speed.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpeedChangeRequest {
    pub target:     SpeedTarget,
    pub transition: SpeedTransition,
    pub constraint: SpeedConstraint,
    /// Keep re-applying after the target is reached.
    pub continuous: bool,
}

impl SpeedChangeRequest {
    /// One-shot linear change to `speed` under the entity's own constraints.
    pub fn absolute(speed: f64) -> Self {
        Self {
            target:     SpeedTarget::Absolute(speed),
            transition: SpeedTransition::Linear,
            constraint: SpeedConstraint::None,
            continuous: false,
        }
    }

    /// Continuous change tracking `reference`'s speed.
    pub fn relative(reference: impl Into<String>, kind: RelativeSpeedKind, value: f64) -> Self {
        Self {
            target: SpeedTarget::Relative { reference: reference.into(), kind, value },
            transition: SpeedTransition::Linear,
            constraint: SpeedConstraint::None,
            continuous: true,
        }
    }

    pub fn with_transition(mut self, transition: SpeedTransition) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_constraint(mut self, constraint: SpeedConstraint) -> Self {
        self.constraint = constraint;
        self
    }

    pub fn continuous(mut self, continuous: bool) -> Self {
        self.continuous = continuous;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        match self.constraint {
            SpeedConstraint::Acceleration(a) if !(a > 0.0) => Err(EngineError::InvalidRequest(
                format!("speed change acceleration must be > 0, got {a}"),
            )),
            SpeedConstraint::Time(t) if !(t >= 0.0) => Err(EngineError::InvalidRequest(
                format!("speed change time must be >= 0, got {t}"),
            )),
            _ => Ok(()),
        }
    }

    /// Target speed against `snapshot`.  `None` if the reference entity is
    /// missing.
    pub fn resolve(&self, snapshot: &StatusSnapshot) -> Option<f64> {
        match &self.target {
            SpeedTarget::Absolute(speed) => Some(*speed),
            SpeedTarget::Relative { reference, kind, value } => {
                let base = snapshot.get(reference)?.speed();
                Some(match kind {
                    RelativeSpeedKind::Delta  => base + value,
                    RelativeSpeedKind::Factor => base * value,
                })
            }
        }
    }
}

// ── Active request ────────────────────────────────────────────────────────────

/// A request attached to an entity, plus what was fixed when it started.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveSpeedChange {
    pub request: SpeedChangeRequest,
    /// Rate derived from a `Time` constraint, with the target it was
    /// derived for.
    rate:        Option<(f64, f64)>,
    /// A step transition has been applied.
    stepped:     bool,
}

/// What the behavior phase should use this tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ResolvedSpeed {
    pub target:      f64,
    /// Overrides the entity's speed before ticking.
    pub jump_to:     Option<f64>,
    /// Overrides the entity's dynamic constraints for this tick.
    pub constraints: Option<DynamicConstraints>,
}

impl ActiveSpeedChange {
    pub fn new(request: SpeedChangeRequest) -> Self {
        Self { request, rate: None, stepped: false }
    }

    /// Resolve against the start-of-step snapshot.
    ///
    /// Advances the request's internal state, so call once per tick.
    pub fn resolve(
        &mut self,
        entity:      &str,
        speed:       f64,
        constraints: &DynamicConstraints,
        snapshot:    &StatusSnapshot,
    ) -> Option<ResolvedSpeed> {
        let Some(target) = self.request.resolve(snapshot) else {
            warn!(entity, request = ?self.request.target, "speed change reference not found");
            return None;
        };

        if self.request.transition == SpeedTransition::Step {
            // Continuous step requests track a moving target every tick.
            let jump_to = (!self.stepped || self.request.continuous).then_some(target);
            self.stepped = true;
            return Some(ResolvedSpeed { target, jump_to, constraints: None });
        }

        let rate = match self.request.constraint {
            SpeedConstraint::None => None,
            SpeedConstraint::Acceleration(a) => Some(a),
            SpeedConstraint::Time(t) => {
                // Re-derived whenever the target moves.  A zero rate is never
                // kept: the entity's own constraints apply instead.
                let moved = self.rate.is_none_or(|(from, _)| (from - target).abs() >= SPEED_TOLERANCE);
                if moved {
                    self.rate = if !(t > 0.0) {
                        Some((target, f64::INFINITY))
                    } else if (target - speed).abs() < SPEED_TOLERANCE {
                        None
                    } else {
                        Some((target, (target - speed).abs() / t))
                    };
                }
                self.rate.map(|(_, rate)| rate)
            }
        };
        Some(match rate {
            Some(rate) if rate.is_infinite() => ResolvedSpeed { target, jump_to: Some(target), constraints: None },
            Some(rate) => ResolvedSpeed {
                target,
                jump_to: None,
                constraints: Some(DynamicConstraints {
                    max_acceleration: rate,
                    max_deceleration: rate,
                    ..*constraints
                }),
            },
            None => ResolvedSpeed { target, jump_to: None, constraints: None },
        })
    }

    /// `true` once a one-shot request has delivered its target.
    pub fn is_complete(&self, speed: f64, target: f64) -> bool {
        !self.request.continuous && (speed - target).abs() < SPEED_TOLERANCE
    }
}
