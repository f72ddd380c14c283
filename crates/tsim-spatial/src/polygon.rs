//! Footprint polygons and 2D polygon predicates (via `geo`).

use geo::{Coord, EuclideanDistance, Intersects, LineString, Polygon};

use tsim_core::{BoundingBox, Pose};

/// Map-frame footprint of `bbox` attached at `pose`.
pub fn footprint(pose: &Pose, bbox: &BoundingBox) -> Polygon<f64> {
    let corners = bbox.corners_2d(pose);
    let ring: Vec<Coord<f64>> = corners.iter().map(|p| Coord { x: p.x, y: p.y }).collect();
    Polygon::new(LineString::from(ring), Vec::new())
}

/// `true` if the two footprints touch or overlap.
pub fn check_collision_2d(
    pose_a: &Pose,
    bbox_a: &BoundingBox,
    pose_b: &Pose,
    bbox_b: &BoundingBox,
) -> bool {
    footprint(pose_a, bbox_a).intersects(&footprint(pose_b, bbox_b))
}

/// Distance between two polygons; zero when they touch, overlap or one
/// contains the other.
pub fn polygon_distance(a: &Polygon<f64>, b: &Polygon<f64>) -> f64 {
    if a.intersects(b) {
        return 0.0;
    }
    a.euclidean_distance(b)
}

/// Distance between two footprints.  `None` if either box has no area.
pub fn bounding_box_distance(
    pose_a: &Pose,
    bbox_a: &BoundingBox,
    pose_b: &Pose,
    bbox_b: &BoundingBox,
) -> Option<f64> {
    if !bbox_a.is_valid() || !bbox_b.is_valid() {
        return None;
    }
    Some(polygon_distance(&footprint(pose_a, bbox_a), &footprint(pose_b, bbox_b)))
}
