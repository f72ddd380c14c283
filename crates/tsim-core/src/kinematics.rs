//! The "apply kinematic constraints" primitive.
//!
//! Entities are integrated with a constant-acceleration model over one step:
//! speed moves toward the requested target no faster than the acceleration
//! or deceleration limit allows, and the distance travelled is the trapezoid
//! under the speed profile.

use crate::{CoreError, CoreResult, Pose, Twist};

/// Longitudinal limits applied when moving an entity toward a target speed.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DynamicConstraints {
    /// Absolute speed cap in m/s.
    pub max_speed:        f64,
    /// Positive acceleration limit in m/s².
    pub max_acceleration: f64,
    /// Positive deceleration limit in m/s² (applied as a magnitude).
    pub max_deceleration: f64,
}

impl Default for DynamicConstraints {
    /// Passenger-car defaults.
    fn default() -> Self {
        Self {
            max_speed:        50.0,
            max_acceleration: 3.0,
            max_deceleration: 5.0,
        }
    }
}

impl DynamicConstraints {
    /// Walking-pace defaults.
    pub fn pedestrian() -> Self {
        Self {
            max_speed:        3.0,
            max_acceleration: 1.0,
            max_deceleration: 2.0,
        }
    }

    /// Reject non-positive limits: every consumer divides by them.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.max_speed > 0.0) {
            return Err(CoreError::Constraints(format!("max_speed {} must be > 0", self.max_speed)));
        }
        if !(self.max_acceleration > 0.0) {
            return Err(CoreError::Constraints(format!(
                "max_acceleration {} must be > 0",
                self.max_acceleration
            )));
        }
        if !(self.max_deceleration > 0.0) {
            return Err(CoreError::Constraints(format!(
                "max_deceleration {} must be > 0",
                self.max_deceleration
            )));
        }
        Ok(())
    }

    /// Distance needed to come to rest from `speed` at full deceleration.
    #[inline]
    pub fn braking_distance(&self, speed: f64) -> f64 {
        if speed <= 0.0 {
            return 0.0;
        }
        speed * speed / (2.0 * self.max_deceleration)
    }

    /// Highest speed from which the entity can still stop within `rest`
    /// metres; zero when `rest` is not positive.
    #[inline]
    pub fn stopping_speed(&self, rest: f64) -> f64 {
        if rest > 0.0 {
            (2.0 * self.max_deceleration * rest).sqrt()
        } else {
            0.0
        }
    }
}

/// Result of advancing an entity's speed over one step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpeedStep {
    /// Speed at the end of the step.
    pub speed:      f64,
    /// Mean acceleration over the step.
    pub accel:      f64,
    /// Signed distance covered during the step.
    pub travelled:  f64,
}

/// Move `current` toward `target` under `constraints` for `dt` seconds.
pub fn advance_speed(
    current:     f64,
    target:      f64,
    constraints: &DynamicConstraints,
    dt:          f64,
) -> SpeedStep {
    let target = target.clamp(-constraints.max_speed, constraints.max_speed);
    let speed = if target > current {
        (current + constraints.max_acceleration * dt).min(target)
    } else {
        (current - constraints.max_deceleration * dt).max(target)
    };
    let accel = if dt > 0.0 { (speed - current) / dt } else { 0.0 };
    SpeedStep {
        speed,
        accel,
        travelled: 0.5 * (current + speed) * dt,
    }
}

/// Dead-reckon `pose` forward along its own heading.
///
/// The yaw is advanced first by half a step so a constant yaw rate traces an
/// arc rather than a polyline of tangents.
pub fn integrate_pose(pose: &Pose, twist: &Twist, travelled: f64, dt: f64) -> Pose {
    let mid_yaw = pose.yaw + 0.5 * twist.angular * dt;
    let (sin, cos) = mid_yaw.sin_cos();
    let mut next = *pose;
    next.position.x += cos * travelled;
    next.position.y += sin * travelled;
    next.yaw = crate::geometry::normalize_angle(pose.yaw + twist.angular * dt);
    next
}
