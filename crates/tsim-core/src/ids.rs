//! Strongly typed, zero-cost identifier wrappers for map elements.
//!
//! Map element ids come from the road-network provider and are not dense, so
//! unlike entity names they are never used as `Vec` indices.  All ids are
//! `Copy + Ord + Hash` so they can be used as map keys and sorted collection
//! elements without ceremony.

use std::fmt;

/// Generate a typed ID wrapper around a primitive integer.
macro_rules! typed_id {
    ($(#[$attr:meta])* $vis:vis struct $name:ident($inner:ty);) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        $vis struct $name(pub $inner);

        impl $name {
            /// The raw id as assigned by the map.
            #[inline(always)]
            pub fn raw(self) -> $inner {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<$inner> for $name {
            #[inline(always)]
            fn from(raw: $inner) -> $name {
                $name(raw)
            }
        }
    };
}

typed_id! {
    /// Id of a lanelet (a directed lane segment or crosswalk) in the lane graph.
    pub struct LaneletId(u64);
}

typed_id! {
    /// Id of a traffic light controlling one or more stop lines.
    pub struct TrafficLightId(u64);
}
