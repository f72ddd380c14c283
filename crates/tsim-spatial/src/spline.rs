//! Arc-length parametrized polyline used for centerlines and trajectory
//! previews.
//!
//! # Parametrization
//!
//! The spline is piecewise linear through its control points.  `arc[i]` is
//! the arc-length at control point `i`, so segment `i` covers
//! `arc[i] ..= arc[i + 1]`.  Every accessor clamps `s` into `[0, length]`.

use geo::algorithm::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, Line};

use tsim_core::{Point, Pose};

use crate::{SpatialError, SpatialResult};

/// Control points closer than this are merged.
const MERGE_EPSILON: f64 = 1e-9;

#[derive(Clone, Debug, PartialEq)]
pub struct TrajectorySpline {
    points: Vec<Point>,
    arc:    Vec<f64>,
}

impl TrajectorySpline {
    /// Build a spline through `points`, dropping consecutive duplicates.
    ///
    /// Fails if fewer than two distinct points remain.
    pub fn new(points: Vec<Point>) -> SpatialResult<Self> {
        let given = points.len();
        let mut kept: Vec<Point> = Vec::with_capacity(given);
        for p in points {
            match kept.last() {
                Some(last) if last.distance_2d(p) < MERGE_EPSILON => {}
                _ => kept.push(p),
            }
        }
        if kept.len() < 2 {
            return Err(SpatialError::DegenerateSpline(given));
        }

        let mut arc = Vec::with_capacity(kept.len());
        let mut total = 0.0;
        arc.push(0.0);
        for pair in kept.windows(2) {
            total += pair[0].distance_2d(pair[1]);
            arc.push(total);
        }
        Ok(Self { points: kept, arc })
    }

    /// Total arc-length in metres.
    #[inline]
    pub fn length(&self) -> f64 {
        self.arc[self.arc.len() - 1]
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[inline]
    pub fn segment_count(&self) -> usize {
        self.points.len() - 1
    }

    /// Arc-length at control point `index`.
    #[inline]
    pub fn arc_length_at(&self, index: usize) -> f64 {
        self.arc[index]
    }

    /// Segment index containing `s` and the fraction along that segment.
    fn locate(&self, s: f64) -> (usize, f64) {
        let s = s.clamp(0.0, self.length());
        let last = self.segment_count() - 1;
        let i = self.arc.partition_point(|&a| a <= s).saturating_sub(1).min(last);
        let seg_len = self.arc[i + 1] - self.arc[i];
        let t = if seg_len > 0.0 { (s - self.arc[i]) / seg_len } else { 0.0 };
        (i, t.clamp(0.0, 1.0))
    }

    pub fn point_at(&self, s: f64) -> Point {
        let (i, t) = self.locate(s);
        self.points[i].lerp(self.points[i + 1], t)
    }

    /// Heading of the segment containing `s`.
    pub fn heading_at(&self, s: f64) -> f64 {
        let (i, _) = self.locate(s);
        (self.points[i + 1] - self.points[i]).theta()
    }

    pub fn pose_at(&self, s: f64) -> Pose {
        Pose::new(self.point_at(s), self.heading_at(s))
    }

    /// Points from `start` to `end` every `resolution` metres, always ending
    /// exactly at `end`.  Empty when `start > end`.
    pub fn trajectory(&self, start: f64, end: f64, resolution: f64) -> Vec<Point> {
        if start > end || !(resolution > 0.0) {
            return Vec::new();
        }
        let start = start.clamp(0.0, self.length());
        let end = end.clamp(0.0, self.length());
        let mut out = Vec::with_capacity(((end - start) / resolution) as usize + 2);
        let mut s = start;
        while s < end {
            out.push(self.point_at(s));
            s += resolution;
        }
        out.push(self.point_at(end));
        out
    }

    /// Project `p` onto segment `segment`, returning `(s, offset)` with the
    /// offset positive to the left of travel.
    pub fn project_on_segment(&self, segment: usize, p: Point) -> (f64, f64) {
        let a = self.points[segment];
        let b = self.points[segment + 1];
        let seg_len = self.arc[segment + 1] - self.arc[segment];
        let dx = (b.x - a.x) / seg_len;
        let dy = (b.y - a.y) / seg_len;
        let along = ((p.x - a.x) * dx + (p.y - a.y) * dy).clamp(0.0, seg_len);
        let offset = dx * (p.y - a.y) - dy * (p.x - a.x);
        (self.arc[segment] + along, offset)
    }

    /// Arc-length of the first point where the spline crosses an edge of
    /// `polygon` (treated as a closed ring).
    ///
    /// Only edges are tested: a spline lying wholly inside the polygon has
    /// no collision point.
    pub fn collision_point_2d(&self, polygon: &[Point]) -> Option<f64> {
        let edges = polygon_edges(polygon);
        if edges.is_empty() {
            return None;
        }
        for (i, pair) in self.points.windows(2).enumerate() {
            let segment = Line::new(coord(pair[0]), coord(pair[1]));
            let nearest = edges
                .iter()
                .filter_map(|edge| line_intersection(segment, *edge))
                .map(|hit| match hit {
                    LineIntersection::SinglePoint { intersection, .. } => {
                        distance(segment.start, intersection)
                    }
                    LineIntersection::Collinear { intersection } => distance(segment.start, intersection.start)
                        .min(distance(segment.start, intersection.end)),
                })
                .min_by(f64::total_cmp);
            if let Some(d) = nearest {
                return Some(self.arc[i] + d);
            }
        }
        None
    }
}

#[inline]
fn coord(p: Point) -> Coord<f64> {
    Coord { x: p.x, y: p.y }
}

#[inline]
fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Closed-ring edges of `polygon`.  A two-point polygon is a single edge.
fn polygon_edges(polygon: &[Point]) -> Vec<Line<f64>> {
    match polygon.len() {
        0 | 1 => Vec::new(),
        2 => vec![Line::new(coord(polygon[0]), coord(polygon[1]))],
        n => (0..n)
            .map(|j| Line::new(coord(polygon[j]), coord(polygon[(j + 1) % n])))
            .collect(),
    }
}
