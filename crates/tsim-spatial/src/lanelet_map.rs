//! In-memory lane graph and builder.
//!
//! # Data layout
//!
//! Lanelets are stored densely, sorted by `LaneletId`, so a dense index and
//! the id order agree.  Successor edges use **Compressed Sparse Row (CSR)**
//! format: the successors of lanelet index `i` occupy
//!
//! ```text
//! succ_to[ succ_start[i] .. succ_start[i+1] ]
//! ```
//!
//! in the order they were connected.  The first successor is the
//! straight-ahead one used by [`LaneGraph::following_lanelets`].
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) holds every centerline segment.  Lane matching
//! queries all segments within the matching distance and keeps the nearest
//! one whose direction agrees with the pose heading.

use std::collections::BTreeMap;
use std::f64::consts::FRAC_PI_2;

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use tsim_core::geometry::normalize_angle;
use tsim_core::{LaneletId, LaneletPose, Point, Pose, TrafficLightId};

use crate::lane_graph::{LaneChangeDirection, LaneGraph};
use crate::router;
use crate::spline::TrajectorySpline;
use crate::{SpatialError, SpatialResult};

/// Largest heading difference at which a pose still matches a road lanelet.
const MAX_MATCHING_YAW_DEVIATION: f64 = FRAC_PI_2;

// ── R-tree segment entry ──────────────────────────────────────────────────────

/// One centerline segment in the spatial index.
#[derive(Clone)]
struct SegmentEntry {
    a:       [f64; 2],
    b:       [f64; 2],
    lanelet: usize,
    segment: usize,
}

impl RTreeObject for SegmentEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.a, self.b)
    }
}

impl PointDistance for SegmentEntry {
    /// Squared distance from `point` to the closest point of the segment.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let (dx, dy) = (self.b[0] - self.a[0], self.b[1] - self.a[1]);
        let len2 = dx * dx + dy * dy;
        let t = if len2 > 0.0 {
            (((point[0] - self.a[0]) * dx + (point[1] - self.a[1]) * dy) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let ex = self.a[0] + t * dx - point[0];
        let ey = self.a[1] + t * dy - point[1];
        ex * ex + ey * ey
    }
}

// ── Lanelet ───────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LaneletKind {
    Road,
    Crosswalk,
}

/// A stop line across a lanelet.
#[derive(Clone, Debug, PartialEq)]
pub struct StopLine {
    /// Two points spanning the lane width.
    pub polyline:      Vec<Point>,
    /// `None` for a stop sign.
    pub traffic_light: Option<TrafficLightId>,
}

/// A directed lane segment (or crosswalk) with its relations.
#[derive(Clone, Debug)]
pub struct Lanelet {
    pub id:           LaneletId,
    pub kind:         LaneletKind,
    pub width:        f64,
    pub centerline:   TrajectorySpline,
    pub successors:   Vec<LaneletId>,
    pub left:         Option<LaneletId>,
    pub right:        Option<LaneletId>,
    pub conflicts:    Vec<LaneletId>,
    /// Lanelets whose traffic has priority over this one.
    pub right_of_way: Vec<LaneletId>,
    pub stop_line:    Option<StopLine>,
}

impl Lanelet {
    #[inline]
    pub fn length(&self) -> f64 {
        self.centerline.length()
    }

    /// Left and right boundary points at arc-length `s`.
    fn boundary_at(&self, s: f64) -> (Point, Point) {
        let pose = self.centerline.pose_at(s);
        let half = 0.5 * self.width;
        (
            pose.transform_point(Point::xy(0.0, half)),
            pose.transform_point(Point::xy(0.0, -half)),
        )
    }
}

// ── LaneletMap ────────────────────────────────────────────────────────────────

/// Directed lane graph plus a segment index for lane matching.
///
/// Do not construct directly; use [`LaneletMapBuilder`].
pub struct LaneletMap {
    lanelets: Vec<Lanelet>,
    index:    BTreeMap<LaneletId, usize>,

    // ── CSR successor adjacency ───────────────────────────────────────────
    pub(crate) succ_start: Vec<u32>,
    pub(crate) succ_to:    Vec<u32>,

    segments: RTree<SegmentEntry>,
}

impl LaneletMap {
    pub fn lanelet_count(&self) -> usize {
        self.lanelets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanelets.is_empty()
    }

    pub fn lanelet(&self, id: LaneletId) -> Option<&Lanelet> {
        self.index.get(&id).map(|&i| &self.lanelets[i])
    }

    /// Dense index of `id`.
    #[inline]
    pub(crate) fn index_of(&self, id: LaneletId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    #[inline]
    pub(crate) fn lanelet_at(&self, index: usize) -> &Lanelet {
        &self.lanelets[index]
    }

    /// Successor indices of lanelet index `index`.
    #[inline]
    pub(crate) fn successors_of(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        let start = self.succ_start[index] as usize;
        let end = self.succ_start[index + 1] as usize;
        self.succ_to[start..end].iter().map(|&i| i as usize)
    }

    /// Sum of the lengths of the lanelets strictly between the first and
    /// last entries of `path`.
    fn interior_length(&self, path: &[LaneletId]) -> f64 {
        if path.len() < 3 {
            return 0.0;
        }
        path[1..path.len() - 1]
            .iter()
            .filter_map(|&id| self.lanelet(id))
            .map(Lanelet::length)
            .sum()
    }

    fn collect_relations<F>(&self, ids: &[LaneletId], relation: F) -> Vec<LaneletId>
    where
        F: Fn(&Lanelet) -> &[LaneletId],
    {
        let mut out: Vec<LaneletId> = ids
            .iter()
            .filter_map(|&id| self.lanelet(id))
            .flat_map(|l| relation(l).iter().copied())
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }
}

impl LaneGraph for LaneletMap {
    fn lanelet_length(&self, id: LaneletId) -> Option<f64> {
        self.lanelet(id).map(Lanelet::length)
    }

    fn longitudinal_distance(
        &self,
        from:   LaneletId,
        from_s: f64,
        to:     LaneletId,
        to_s:   f64,
    ) -> Option<f64> {
        let from_len = self.lanelet_length(from)?;
        self.lanelet(to)?;

        if from == to {
            if to_s >= from_s {
                return Some(to_s - from_s);
            }
            // Behind on the same lanelet: only reachable around a loop.
            let from_index = self.index_of(from)?;
            return self
                .successors_of(from_index)
                .filter_map(|next| {
                    let path = self.route(self.lanelet_at(next).id, to)?;
                    let between = if path.len() > 1 {
                        self.lanelet_at(next).length() + self.interior_length(&path)
                    } else {
                        0.0
                    };
                    Some(from_len - from_s + between + to_s)
                })
                .min_by(f64::total_cmp);
        }

        let path = self.route(from, to)?;
        Some(from_len - from_s + self.interior_length(&path) + to_s)
    }

    fn center_points(&self, id: LaneletId) -> Option<&[Point]> {
        self.lanelet(id).map(|l| l.centerline.points())
    }

    fn stop_line_polygon(&self, id: LaneletId) -> Option<&[Point]> {
        self.lanelet(id)?.stop_line.as_ref().map(|line| line.polyline.as_slice())
    }

    fn traffic_light_id(&self, id: LaneletId) -> Option<TrafficLightId> {
        self.lanelet(id)?.stop_line.as_ref()?.traffic_light
    }

    fn lane_changeable_lanelet_id(
        &self,
        id:        LaneletId,
        direction: LaneChangeDirection,
    ) -> Option<LaneletId> {
        let lanelet = self.lanelet(id)?;
        match direction {
            LaneChangeDirection::Left  => lanelet.left,
            LaneChangeDirection::Right => lanelet.right,
        }
    }

    fn conflicting_lanelet_ids(&self, ids: &[LaneletId]) -> Vec<LaneletId> {
        self.collect_relations(ids, |l| &l.conflicts)
    }

    fn right_of_way_lanelet_ids(&self, ids: &[LaneletId]) -> Vec<LaneletId> {
        self.collect_relations(ids, |l| &l.right_of_way)
    }

    fn following_lanelets(&self, id: LaneletId, distance: f64) -> Vec<LaneletId> {
        let Some(mut index) = self.index_of(id) else {
            return Vec::new();
        };
        let mut out = vec![id];
        let mut total = self.lanelet_at(index).length();
        while total < distance {
            let Some(next) = self.successors_of(index).next() else {
                break;
            };
            let next_id = self.lanelet_at(next).id;
            if out.contains(&next_id) {
                break;
            }
            out.push(next_id);
            total += self.lanelet_at(next).length();
            index = next;
        }
        out
    }

    fn route(&self, from: LaneletId, to: LaneletId) -> Option<Vec<LaneletId>> {
        router::shortest_path(self, from, to).map(|r| r.lanelets)
    }

    fn to_lanelet_pose(
        &self,
        pose:              &Pose,
        include_crosswalk: bool,
        matching_distance: f64,
    ) -> Option<LaneletPose> {
        let query = [pose.position.x, pose.position.y];
        let radius_2 = matching_distance * matching_distance;

        // (squared distance, lanelet index, segment) — the index breaks ties
        // in id order because lanelets are stored sorted.
        let mut best: Option<(f64, usize, usize)> = None;
        for entry in self.segments.locate_within_distance(query, radius_2) {
            let lanelet = &self.lanelets[entry.lanelet];
            match lanelet.kind {
                LaneletKind::Crosswalk if !include_crosswalk => continue,
                LaneletKind::Crosswalk => {}
                LaneletKind::Road => {
                    let heading = (entry.b[1] - entry.a[1]).atan2(entry.b[0] - entry.a[0]);
                    if normalize_angle(pose.yaw - heading).abs() > MAX_MATCHING_YAW_DEVIATION {
                        continue;
                    }
                }
            }
            let candidate = (entry.distance_2(&query), entry.lanelet, entry.segment);
            let better = match best {
                None => true,
                Some(current) => {
                    candidate.0 < current.0
                        || (candidate.0 == current.0 && (candidate.1, candidate.2) < (current.1, current.2))
                }
            };
            if better {
                best = Some(candidate);
            }
        }

        let (_, index, segment) = best?;
        let lanelet = &self.lanelets[index];
        let (s, offset) = lanelet.centerline.project_on_segment(segment, pose.position);
        Some(LaneletPose::new(lanelet.id, s, offset))
    }

    fn to_map_pose(&self, lanelet_pose: &LaneletPose) -> Option<Pose> {
        let lanelet = self.lanelet(lanelet_pose.lanelet_id)?;
        let center = lanelet.centerline.pose_at(lanelet_pose.s);
        Some(Pose::new(
            center.transform_point(Point::xy(0.0, lanelet_pose.offset)),
            center.yaw,
        ))
    }

    fn lanelet_polygon(&self, id: LaneletId) -> Option<Vec<Point>> {
        let lanelet = self.lanelet(id)?;
        let spline = &lanelet.centerline;
        let (left, right): (Vec<Point>, Vec<Point>) = (0..spline.points().len())
            .map(|i| lanelet.boundary_at(spline.arc_length_at(i)))
            .unzip();
        let mut outline = left;
        outline.extend(right.into_iter().rev());
        Some(outline)
    }

    fn is_crosswalk(&self, id: LaneletId) -> bool {
        self.lanelet(id).is_some_and(|l| l.kind == LaneletKind::Crosswalk)
    }
}

// ── LaneletMapBuilder ─────────────────────────────────────────────────────────

/// Construct a [`LaneletMap`] incrementally, then call [`build`](Self::build).
///
/// Lanelets may be added in any order; relations may only reference
/// lanelets already added.
///
/// # Example
///
/// ```
/// use tsim_core::{LaneletId, Point};
/// use tsim_spatial::{LaneGraph, LaneletMapBuilder};
///
/// let mut b = LaneletMapBuilder::new();
/// b.add_lanelet(LaneletId(1), vec![Point::xy(0.0, 0.0), Point::xy(50.0, 0.0)], 3.5).unwrap();
/// b.add_lanelet(LaneletId(2), vec![Point::xy(50.0, 0.0), Point::xy(100.0, 0.0)], 3.5).unwrap();
/// b.connect(LaneletId(1), LaneletId(2)).unwrap();
/// let map = b.build();
/// assert_eq!(map.longitudinal_distance(LaneletId(1), 10.0, LaneletId(2), 5.0), Some(45.0));
/// ```
pub struct LaneletMapBuilder {
    lanelets: BTreeMap<LaneletId, Lanelet>,
}

impl LaneletMapBuilder {
    pub fn new() -> Self {
        Self { lanelets: BTreeMap::new() }
    }

    fn insert(
        &mut self,
        id:         LaneletId,
        kind:       LaneletKind,
        centerline: Vec<Point>,
        width:      f64,
    ) -> SpatialResult<()> {
        if self.lanelets.contains_key(&id) {
            return Err(SpatialError::DuplicateLanelet(id));
        }
        let centerline =
            TrajectorySpline::new(centerline).map_err(|_| SpatialError::DegenerateCenterline(id))?;
        self.lanelets.insert(
            id,
            Lanelet {
                id,
                kind,
                width,
                centerline,
                successors: Vec::new(),
                left: None,
                right: None,
                conflicts: Vec::new(),
                right_of_way: Vec::new(),
                stop_line: None,
            },
        );
        Ok(())
    }

    fn get_mut(&mut self, id: LaneletId) -> SpatialResult<&mut Lanelet> {
        self.lanelets.get_mut(&id).ok_or(SpatialError::LaneletNotFound(id))
    }

    fn require(&self, id: LaneletId) -> SpatialResult<()> {
        if self.lanelets.contains_key(&id) {
            Ok(())
        } else {
            Err(SpatialError::LaneletNotFound(id))
        }
    }

    /// Add a road lanelet whose direction of travel follows `centerline`.
    pub fn add_lanelet(&mut self, id: LaneletId, centerline: Vec<Point>, width: f64) -> SpatialResult<()> {
        self.insert(id, LaneletKind::Road, centerline, width)
    }

    /// Add a crosswalk.  Crosswalks only match pedestrians and have no
    /// preferred walking direction.
    pub fn add_crosswalk(&mut self, id: LaneletId, centerline: Vec<Point>, width: f64) -> SpatialResult<()> {
        self.insert(id, LaneletKind::Crosswalk, centerline, width)
    }

    /// Add a directed successor edge.  The first successor connected to a
    /// lanelet is its straight-ahead continuation.
    pub fn connect(&mut self, from: LaneletId, to: LaneletId) -> SpatialResult<()> {
        self.require(to)?;
        let lanelet = self.get_mut(from)?;
        if !lanelet.successors.contains(&to) {
            lanelet.successors.push(to);
        }
        Ok(())
    }

    /// Mark `neighbor` as reachable from `id` by a lane change toward
    /// `direction`.
    pub fn set_neighbor(
        &mut self,
        id:        LaneletId,
        direction: LaneChangeDirection,
        neighbor:  LaneletId,
    ) -> SpatialResult<()> {
        self.require(neighbor)?;
        let lanelet = self.get_mut(id)?;
        match direction {
            LaneChangeDirection::Left  => lanelet.left = Some(neighbor),
            LaneChangeDirection::Right => lanelet.right = Some(neighbor),
        }
        Ok(())
    }

    /// Record that `a` and `b` cross each other.  Symmetric.
    pub fn add_conflict(&mut self, a: LaneletId, b: LaneletId) -> SpatialResult<()> {
        self.require(a)?;
        self.require(b)?;
        for (x, y) in [(a, b), (b, a)] {
            let lanelet = self.get_mut(x)?;
            if !lanelet.conflicts.contains(&y) {
                lanelet.conflicts.push(y);
            }
        }
        Ok(())
    }

    /// Record that traffic on `priority` has right of way over traffic on
    /// `yielding`.
    pub fn add_right_of_way(&mut self, yielding: LaneletId, priority: LaneletId) -> SpatialResult<()> {
        self.require(priority)?;
        let lanelet = self.get_mut(yielding)?;
        if !lanelet.right_of_way.contains(&priority) {
            lanelet.right_of_way.push(priority);
        }
        Ok(())
    }

    /// Put a stop line across `id` at arc-length `s`.  Without a traffic
    /// light it acts as a stop sign.
    pub fn add_stop_line(
        &mut self,
        id:            LaneletId,
        s:             f64,
        traffic_light: Option<TrafficLightId>,
    ) -> SpatialResult<()> {
        let lanelet = self.get_mut(id)?;
        let (left, right) = lanelet.boundary_at(s);
        lanelet.stop_line = Some(StopLine { polyline: vec![left, right], traffic_light });
        Ok(())
    }

    pub fn lanelet_count(&self) -> usize {
        self.lanelets.len()
    }

    /// Consume the builder and produce a [`LaneletMap`].
    pub fn build(self) -> LaneletMap {
        let lanelets: Vec<Lanelet> = self.lanelets.into_values().collect();
        let index: BTreeMap<LaneletId, usize> =
            lanelets.iter().enumerate().map(|(i, l)| (l.id, i)).collect();

        // Build CSR successor arrays; relations were validated on insert.
        let mut succ_start = Vec::with_capacity(lanelets.len() + 1);
        let mut succ_to = Vec::new();
        succ_start.push(0u32);
        for lanelet in &lanelets {
            succ_to.extend(lanelet.successors.iter().filter_map(|id| index.get(id)).map(|&i| i as u32));
            succ_start.push(succ_to.len() as u32);
        }

        let entries: Vec<SegmentEntry> = lanelets
            .iter()
            .enumerate()
            .flat_map(|(li, lanelet)| {
                lanelet.centerline.points().windows(2).enumerate().map(move |(si, pair)| SegmentEntry {
                    a:       [pair[0].x, pair[0].y],
                    b:       [pair[1].x, pair[1].y],
                    lanelet: li,
                    segment: si,
                })
            })
            .collect();
        let segments = RTree::bulk_load(entries);

        tracing::debug!(lanelets = lanelets.len(), edges = succ_to.len(), "lanelet map built");

        LaneletMap { lanelets, index, succ_start, succ_to, segments }
    }
}

impl Default for LaneletMapBuilder {
    fn default() -> Self {
        Self::new()
    }
}
