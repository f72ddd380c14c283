//! Traffic light state as seen by behaviors.
//!
//! The scenario sets colors explicitly; lights carry no timing of their own.

use std::collections::BTreeMap;

use crate::TrafficLightId;

/// Displayed signal of a traffic light.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrafficLightColor {
    Red,
    Amber,
    Green,
    /// No information; behaves like green.
    #[default]
    Unknown,
}

impl TrafficLightColor {
    /// `true` if vehicles must stop at the associated stop line.
    #[inline]
    pub fn requires_stop(self) -> bool {
        matches!(self, TrafficLightColor::Red | TrafficLightColor::Amber)
    }
}

/// Current color of every known traffic light.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrafficLights {
    colors: BTreeMap<TrafficLightId, TrafficLightColor>,
}

impl TrafficLights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_color(&mut self, id: TrafficLightId, color: TrafficLightColor) {
        self.colors.insert(id, color);
    }

    /// Color of `id`; lights never set read as `Unknown`.
    pub fn color(&self, id: TrafficLightId) -> TrafficLightColor {
        self.colors.get(&id).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}
