//! Planar-with-height geometry primitives in the map frame.
//!
//! Entities move on a road surface, so orientation is reduced to a yaw angle
//! about the z axis.  All lengths are metres, all angles radians.

use std::f64::consts::PI;
use std::ops::{Add, Sub};

// ── Point ─────────────────────────────────────────────────────────────────────

/// A 3D point in metres.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// A point on the `z = 0` plane.
    #[inline]
    pub const fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    /// Euclidean distance ignoring `z`.
    #[inline]
    pub fn distance_2d(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Euclidean distance in 3D.
    #[inline]
    pub fn distance(self, other: Point) -> f64 {
        let d = other - self;
        (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
    }

    /// Polar angle about the origin in `(-π, π]`.
    #[inline]
    pub fn theta(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Linear interpolation: `t = 0` → `self`, `t = 1` → `other`.
    #[inline]
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }
}

impl Add for Point {
    type Output = Point;
    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point {
    type Output = Point;
    #[inline]
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

// ── Pose ──────────────────────────────────────────────────────────────────────

/// Position plus heading in the map frame.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    pub position: Point,
    /// Heading about +z, measured from +x.
    pub yaw: f64,
}

impl Pose {
    #[inline]
    pub const fn new(position: Point, yaw: f64) -> Self {
        Self { position, yaw }
    }

    /// Map a point expressed in this pose's local frame into the map frame.
    #[inline]
    pub fn transform_point(&self, local: Point) -> Point {
        let (sin, cos) = self.yaw.sin_cos();
        Point::new(
            self.position.x + cos * local.x - sin * local.y,
            self.position.y + sin * local.x + cos * local.y,
            self.position.z + local.z,
        )
    }

    /// Map a point expressed in the map frame into this pose's local frame.
    #[inline]
    pub fn inverse_transform_point(&self, world: Point) -> Point {
        let (sin, cos) = self.yaw.sin_cos();
        let d = world - self.position;
        Point::new(cos * d.x + sin * d.y, -sin * d.x + cos * d.y, d.z)
    }

    /// `other` expressed in this pose's local frame.
    pub fn relative_pose(&self, other: &Pose) -> Pose {
        Pose {
            position: self.inverse_transform_point(other.position),
            yaw:      normalize_angle(other.yaw - self.yaw),
        }
    }
}

// ── Twist / Accel ─────────────────────────────────────────────────────────────

/// Body-frame velocity: longitudinal speed (m/s) and yaw rate (rad/s).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Twist {
    pub linear:  f64,
    pub angular: f64,
}

impl Twist {
    #[inline]
    pub const fn new(linear: f64, angular: f64) -> Self {
        Self { linear, angular }
    }
}

/// Body-frame acceleration: longitudinal (m/s²) and yaw (rad/s²).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Accel {
    pub linear:  f64,
    pub angular: f64,
}

// ── BoundingBox ───────────────────────────────────────────────────────────────

/// Box extents in metres: `length` along the heading, `width` across it.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Dimensions {
    pub length: f64,
    pub width:  f64,
    pub height: f64,
}

/// An oriented box attached to an entity.  `center` is the box centre in the
/// entity's local frame (rear-axle origins put it ahead of the origin).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    pub center:     Point,
    pub dimensions: Dimensions,
}

impl BoundingBox {
    /// A box of `length × width × height` centred on the entity origin.
    pub fn centered(length: f64, width: f64, height: f64) -> Self {
        Self {
            center:     Point::default(),
            dimensions: Dimensions { length, width, height },
        }
    }

    /// Map-frame footprint corners, counter-clockwise starting at rear-right.
    pub fn corners_2d(&self, pose: &Pose) -> [Point; 4] {
        let hl = self.dimensions.length * 0.5;
        let hw = self.dimensions.width * 0.5;
        let c = self.center;
        [
            pose.transform_point(Point::xy(c.x - hl, c.y - hw)),
            pose.transform_point(Point::xy(c.x + hl, c.y - hw)),
            pose.transform_point(Point::xy(c.x + hl, c.y + hw)),
            pose.transform_point(Point::xy(c.x - hl, c.y + hw)),
        ]
    }

    /// Half of the footprint diagonal: the radius of the circle enclosing the
    /// footprint around its centre.
    #[inline]
    pub fn half_diagonal(&self) -> f64 {
        0.5 * self.dimensions.length.hypot(self.dimensions.width)
    }

    /// `true` if the footprint has positive area.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.dimensions.length > 0.0 && self.dimensions.width > 0.0
    }
}

/// Wrap an angle into `(-π, π]`.
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}
