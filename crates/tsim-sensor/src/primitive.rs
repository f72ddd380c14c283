//! Obstacle geometry fed to the grid builder.

use geo::{ConvexHull, MultiPoint};

use tsim_core::{BoundingBox, Point, Pose};

/// Anything with a 2D outline in the map frame.
pub trait Primitive {
    /// Convex hull of the primitive in the map frame, counter-clockwise,
    /// without repeating the first vertex.
    fn convex_hull_2d(&self) -> Vec<Point>;
}

/// An oriented bounding box, the footprint of an entity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoxPrimitive {
    pub pose:         Pose,
    pub bounding_box: BoundingBox,
}

impl BoxPrimitive {
    pub fn new(pose: Pose, bounding_box: BoundingBox) -> Self {
        Self { pose, bounding_box }
    }
}

impl Primitive for BoxPrimitive {
    fn convex_hull_2d(&self) -> Vec<Point> {
        self.bounding_box.corners_2d(&self.pose).to_vec()
    }
}

/// An arbitrary point cloud; its hull is computed on demand.
#[derive(Clone, Debug, PartialEq)]
pub struct HullPrimitive {
    pub points: Vec<Point>,
}

impl HullPrimitive {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }
}

impl Primitive for HullPrimitive {
    fn convex_hull_2d(&self) -> Vec<Point> {
        let cloud: MultiPoint<f64> = self.points.iter().map(|p| geo::Point::new(p.x, p.y)).collect();
        let hull = cloud.convex_hull();
        let ring = &hull.exterior().0;
        // geo closes the ring; drop the repeated vertex.
        let open = match (ring.first(), ring.last()) {
            (Some(first), Some(last)) if ring.len() > 1 && first == last => &ring[..ring.len() - 1],
            _ => &ring[..],
        };
        open.iter().map(|c| Point::xy(c.x, c.y)).collect()
    }
}
