//! Unit tests for tsim-spatial.
//!
//! All tests use hand-crafted maps built with `LaneletMapBuilder`.

#[cfg(test)]
mod helpers {
    use tsim_core::{LaneletId, Point, TrafficLightId};

    use crate::{LaneChangeDirection, LaneletMap, LaneletMapBuilder};

    pub const LANE_WIDTH: f64 = 3.5;

    /// A straight three-lanelet road along +x with a crossing street.
    ///
    /// ```text
    ///           4 (y = 3.5, 0..50)
    ///   1 (0..50) → 2 (50..100) → 3 (100..150)        y = 0
    ///                   crosswalk 10 at x = 75
    ///                   stop line on 2 at x = 70 (light 100)
    ///                   crossing lane 20 at x = 90 (priority over 2)
    /// ```
    pub fn straight_road() -> LaneletMap {
        let mut b = LaneletMapBuilder::new();
        b.add_lanelet(LaneletId(1), vec![Point::xy(0.0, 0.0), Point::xy(50.0, 0.0)], LANE_WIDTH).unwrap();
        b.add_lanelet(LaneletId(2), vec![Point::xy(50.0, 0.0), Point::xy(100.0, 0.0)], LANE_WIDTH).unwrap();
        b.add_lanelet(LaneletId(3), vec![Point::xy(100.0, 0.0), Point::xy(150.0, 0.0)], LANE_WIDTH).unwrap();
        b.add_lanelet(LaneletId(4), vec![Point::xy(0.0, 3.5), Point::xy(50.0, 3.5)], LANE_WIDTH).unwrap();
        b.add_crosswalk(LaneletId(10), vec![Point::xy(75.0, -5.0), Point::xy(75.0, 5.0)], 3.0).unwrap();
        b.add_lanelet(LaneletId(20), vec![Point::xy(90.0, -30.0), Point::xy(90.0, 30.0)], LANE_WIDTH).unwrap();

        b.connect(LaneletId(1), LaneletId(2)).unwrap();
        b.connect(LaneletId(2), LaneletId(3)).unwrap();
        b.set_neighbor(LaneletId(1), LaneChangeDirection::Left, LaneletId(4)).unwrap();
        b.set_neighbor(LaneletId(4), LaneChangeDirection::Right, LaneletId(1)).unwrap();
        b.add_conflict(LaneletId(2), LaneletId(10)).unwrap();
        b.add_conflict(LaneletId(2), LaneletId(20)).unwrap();
        b.add_right_of_way(LaneletId(2), LaneletId(20)).unwrap();
        b.add_stop_line(LaneletId(2), 20.0, Some(TrafficLightId(100))).unwrap();
        b.build()
    }

    /// Four 10 m lanelets forming a closed square loop: 1 → 2 → 3 → 4 → 1.
    pub fn ring_road() -> LaneletMap {
        let corners = [
            Point::xy(0.0, 0.0),
            Point::xy(10.0, 0.0),
            Point::xy(10.0, 10.0),
            Point::xy(0.0, 10.0),
        ];
        let mut b = LaneletMapBuilder::new();
        for i in 0..4 {
            let id = LaneletId(i as u64 + 1);
            b.add_lanelet(id, vec![corners[i], corners[(i + 1) % 4]], LANE_WIDTH).unwrap();
        }
        for i in 0..4u64 {
            b.connect(LaneletId(i + 1), LaneletId((i + 1) % 4 + 1)).unwrap();
        }
        b.build()
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod builder {
    use tsim_core::{LaneletId, Point};

    use crate::{LaneletMapBuilder, SpatialError};

    #[test]
    fn empty_build() {
        let map = LaneletMapBuilder::new().build();
        assert_eq!(map.lanelet_count(), 0);
        assert!(map.is_empty());
    }

    #[test]
    fn duplicate_lanelet_rejected() {
        let mut b = LaneletMapBuilder::new();
        let line = vec![Point::xy(0.0, 0.0), Point::xy(1.0, 0.0)];
        b.add_lanelet(LaneletId(1), line.clone(), 3.0).unwrap();
        assert!(matches!(
            b.add_lanelet(LaneletId(1), line, 3.0),
            Err(SpatialError::DuplicateLanelet(LaneletId(1)))
        ));
    }

    #[test]
    fn degenerate_centerline_rejected() {
        let mut b = LaneletMapBuilder::new();
        let err = b.add_lanelet(LaneletId(5), vec![Point::xy(1.0, 1.0), Point::xy(1.0, 1.0)], 3.0);
        assert!(matches!(err, Err(SpatialError::DegenerateCenterline(LaneletId(5)))));
    }

    #[test]
    fn relation_to_unknown_lanelet_rejected() {
        let mut b = LaneletMapBuilder::new();
        b.add_lanelet(LaneletId(1), vec![Point::xy(0.0, 0.0), Point::xy(1.0, 0.0)], 3.0).unwrap();
        assert!(matches!(
            b.connect(LaneletId(1), LaneletId(9)),
            Err(SpatialError::LaneletNotFound(LaneletId(9)))
        ));
    }
}

// ── Routing & longitudinal distance ───────────────────────────────────────────

#[cfg(test)]
mod routing {
    use approx::assert_relative_eq;
    use tsim_core::LaneletId;

    use crate::router::shortest_path;
    use crate::LaneGraph;

    #[test]
    fn route_follows_successors() {
        let map = super::helpers::straight_road();
        assert_eq!(
            map.route(LaneletId(1), LaneletId(3)),
            Some(vec![LaneletId(1), LaneletId(2), LaneletId(3)])
        );
        assert_eq!(map.route(LaneletId(3), LaneletId(1)), None);
        assert_eq!(map.route(LaneletId(2), LaneletId(2)), Some(vec![LaneletId(2)]));
    }

    #[test]
    fn route_length_counts_all_but_destination() {
        let map = super::helpers::straight_road();
        let route = shortest_path(&map, LaneletId(1), LaneletId(3)).unwrap();
        assert_relative_eq!(route.length_m, 100.0);
    }

    #[test]
    fn graph_distance_across_lanelets() {
        let map = super::helpers::straight_road();
        let d = map.longitudinal_distance(LaneletId(1), 10.0, LaneletId(3), 5.0).unwrap();
        assert_relative_eq!(d, 95.0);
        assert_eq!(map.longitudinal_distance(LaneletId(1), 30.0, LaneletId(1), 10.0), None);
        assert_relative_eq!(
            map.longitudinal_distance(LaneletId(1), 10.0, LaneletId(1), 30.0).unwrap(),
            20.0
        );
    }

    #[test]
    fn graph_distance_around_loop() {
        let map = super::helpers::ring_road();
        let d = map.longitudinal_distance(LaneletId(1), 8.0, LaneletId(1), 2.0).unwrap();
        assert_relative_eq!(d, 34.0);
    }

    #[test]
    fn following_lanelets_stop_at_distance() {
        let map = super::helpers::straight_road();
        assert_eq!(map.following_lanelets(LaneletId(1), 10.0), vec![LaneletId(1)]);
        assert_eq!(map.following_lanelets(LaneletId(1), 60.0), vec![LaneletId(1), LaneletId(2)]);
        assert_eq!(
            map.following_lanelets(LaneletId(1), 1_000.0),
            vec![LaneletId(1), LaneletId(2), LaneletId(3)]
        );
    }

    #[test]
    fn following_lanelets_terminate_on_loop() {
        let map = super::helpers::ring_road();
        assert_eq!(map.following_lanelets(LaneletId(3), 1_000.0).len(), 4);
    }
}

// ── Lane matching ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod matching {
    use std::f64::consts::{FRAC_PI_2, PI};

    use approx::assert_relative_eq;
    use tsim_core::{LaneletId, LaneletPose, Point, Pose};

    use crate::{LaneChangeDirection, LaneGraph};

    #[test]
    fn matches_nearest_aligned_lanelet() {
        let map = super::helpers::straight_road();
        let lp = map.to_lanelet_pose(&Pose::new(Point::xy(25.0, 0.5), 0.0), false, 2.0).unwrap();
        assert_eq!(lp.lanelet_id, LaneletId(1));
        assert_relative_eq!(lp.s, 25.0);
        assert_relative_eq!(lp.offset, 0.5);
    }

    #[test]
    fn opposing_heading_does_not_match() {
        let map = super::helpers::straight_road();
        assert!(map.to_lanelet_pose(&Pose::new(Point::xy(25.0, 0.5), PI), false, 2.0).is_none());
    }

    #[test]
    fn out_of_range_does_not_match() {
        let map = super::helpers::straight_road();
        assert!(map.to_lanelet_pose(&Pose::new(Point::xy(25.0, -10.0), 0.0), false, 2.0).is_none());
    }

    #[test]
    fn crosswalk_only_when_requested() {
        let map = super::helpers::straight_road();
        let pose = Pose::new(Point::xy(75.0, 3.0), FRAC_PI_2);
        assert!(map.to_lanelet_pose(&pose, false, 2.0).is_none());
        let lp = map.to_lanelet_pose(&pose, true, 2.0).unwrap();
        assert_eq!(lp.lanelet_id, LaneletId(10));
        assert_relative_eq!(lp.s, 8.0);
    }

    #[test]
    fn map_pose_roundtrip() {
        let map = super::helpers::straight_road();
        let pose = map.to_map_pose(&LaneletPose::new(LaneletId(2), 12.0, -0.75)).unwrap();
        assert_relative_eq!(pose.position.x, 62.0);
        assert_relative_eq!(pose.position.y, -0.75);
        let back = map.to_lanelet_pose(&pose, false, 2.0).unwrap();
        assert_eq!(back.lanelet_id, LaneletId(2));
        assert_relative_eq!(back.s, 12.0, epsilon = 1e-9);
    }

    #[test]
    fn lane_change_neighbors() {
        let map = super::helpers::straight_road();
        assert_eq!(
            map.lane_changeable_lanelet_id(LaneletId(1), LaneChangeDirection::Left),
            Some(LaneletId(4))
        );
        assert_eq!(map.lane_changeable_lanelet_id(LaneletId(1), LaneChangeDirection::Right), None);
    }

    #[test]
    fn crosswalk_outline() {
        let map = super::helpers::straight_road();
        let outline = map.lanelet_polygon(LaneletId(10)).unwrap();
        assert_eq!(outline.len(), 4);
        assert_relative_eq!(outline[0].x, 73.5, epsilon = 1e-9);
        assert_relative_eq!(outline[0].y, -5.0, epsilon = 1e-9);
        assert_relative_eq!(outline[2].x, 76.5, epsilon = 1e-9);
        assert_relative_eq!(outline[2].y, 5.0, epsilon = 1e-9);
        assert!(map.is_crosswalk(LaneletId(10)));
        assert!(!map.is_crosswalk(LaneletId(2)));
    }
}

// ── Spline ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod spline {
    use std::f64::consts::FRAC_PI_2;

    use approx::assert_relative_eq;
    use tsim_core::Point;

    use crate::TrajectorySpline;

    fn elbow() -> TrajectorySpline {
        TrajectorySpline::new(vec![Point::xy(0.0, 0.0), Point::xy(3.0, 4.0), Point::xy(3.0, 10.0)]).unwrap()
    }

    #[test]
    fn arc_length_parametrization() {
        let s = elbow();
        assert_relative_eq!(s.length(), 11.0);
        let p = s.point_at(8.0);
        assert_relative_eq!(p.x, 3.0);
        assert_relative_eq!(p.y, 7.0);
        assert_relative_eq!(s.heading_at(8.0), FRAC_PI_2);
    }

    #[test]
    fn accessors_clamp() {
        let s = elbow();
        assert_eq!(s.point_at(-1.0), Point::xy(0.0, 0.0));
        assert_eq!(s.point_at(100.0), Point::xy(3.0, 10.0));
    }

    #[test]
    fn trajectory_ends_exactly_at_end() {
        let s = elbow();
        let pts = s.trajectory(0.0, 2.5, 1.0);
        assert_eq!(pts.len(), 4);
        assert_relative_eq!(pts[3].distance_2d(Point::xy(0.0, 0.0)), 2.5, epsilon = 1e-9);
        assert!(s.trajectory(3.0, 1.0, 1.0).is_empty());
    }

    #[test]
    fn degenerate_rejected() {
        assert!(TrajectorySpline::new(vec![Point::xy(1.0, 1.0)]).is_err());
        assert!(TrajectorySpline::new(vec![Point::xy(1.0, 1.0), Point::xy(1.0, 1.0)]).is_err());
    }

    #[test]
    fn collision_with_square_and_line() {
        let s = TrajectorySpline::new(vec![Point::xy(0.0, 0.0), Point::xy(10.0, 0.0)]).unwrap();
        let square = [
            Point::xy(4.0, -1.0),
            Point::xy(6.0, -1.0),
            Point::xy(6.0, 1.0),
            Point::xy(4.0, 1.0),
        ];
        assert_relative_eq!(s.collision_point_2d(&square).unwrap(), 4.0, epsilon = 1e-9);
        let line = [Point::xy(7.0, -1.0), Point::xy(7.0, 1.0)];
        assert_relative_eq!(s.collision_point_2d(&line).unwrap(), 7.0, epsilon = 1e-9);
        let far = [Point::xy(20.0, -1.0), Point::xy(20.0, 1.0)];
        assert!(s.collision_point_2d(&far).is_none());
    }
}

// ── Polygons ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod polygon {
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use tsim_core::{BoundingBox, Dimensions, Point, Pose};

    use crate::{bounding_box_distance, check_collision_2d};

    fn car() -> BoundingBox {
        BoundingBox::centered(4.0, 2.0, 1.5)
    }

    #[test]
    fn overlapping_boxes_collide() {
        let a = Pose::new(Point::xy(0.0, 0.0), 0.0);
        let b = Pose::new(Point::xy(2.0, 0.0), 0.0);
        assert!(check_collision_2d(&a, &car(), &b, &car()));
        assert_relative_eq!(bounding_box_distance(&a, &car(), &b, &car()).unwrap(), 0.0);
    }

    #[test]
    fn separated_boxes_do_not_collide() {
        let a = Pose::new(Point::xy(0.0, 0.0), 0.0);
        let b = Pose::new(Point::xy(10.0, 0.0), 0.0);
        assert!(!check_collision_2d(&a, &car(), &b, &car()));
        assert_relative_eq!(bounding_box_distance(&a, &car(), &b, &car()).unwrap(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn degenerate_box_has_no_distance() {
        let flat = BoundingBox { center: Point::default(), dimensions: Dimensions::default() };
        let p = Pose::default();
        assert!(bounding_box_distance(&p, &flat, &p, &car()).is_none());
    }

    proptest! {
        #[test]
        fn collision_is_symmetric(
            x in -20.0f64..20.0,
            y in -20.0f64..20.0,
            yaw_a in -3.1f64..3.1,
            yaw_b in -3.1f64..3.1,
        ) {
            let a = Pose::new(Point::xy(0.0, 0.0), yaw_a);
            let b = Pose::new(Point::xy(x, y), yaw_b);
            prop_assert_eq!(
                check_collision_2d(&a, &car(), &b, &car()),
                check_collision_2d(&b, &car(), &a, &car())
            );
            if x.hypot(y) > 2.0 * car().half_diagonal() {
                prop_assert!(!check_collision_2d(&a, &car(), &b, &car()));
            }
        }
    }
}

// ── Queries ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod query {
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use tsim_core::{BoundingBox, EntityStatus, EntityType, LaneletId, LaneletPose, Point, Pose, StatusSnapshot};

    use crate::query::{
        conflicting_entities, longitudinal_distance, right_of_way_entities, route_spline,
        stop_lines_along,
    };

    fn lp(id: u64, s: f64) -> LaneletPose {
        LaneletPose::new(LaneletId(id), s, 0.0)
    }

    #[test]
    fn forward_only() {
        let map = super::helpers::straight_road();
        assert_relative_eq!(longitudinal_distance(&map, &lp(1, 10.0), &lp(2, 5.0), 100.0).unwrap(), 45.0);
        assert_relative_eq!(longitudinal_distance(&map, &lp(2, 5.0), &lp(1, 10.0), 100.0).unwrap(), -45.0);
        assert_eq!(longitudinal_distance(&map, &lp(1, 10.0), &lp(2, 5.0), 30.0), None);
    }

    #[test]
    fn both_directions_pick_shorter() {
        let map = super::helpers::ring_road();
        assert_relative_eq!(longitudinal_distance(&map, &lp(1, 2.0), &lp(2, 3.0), 100.0).unwrap(), 11.0);
        assert_relative_eq!(longitudinal_distance(&map, &lp(1, 2.0), &lp(4, 9.0), 100.0).unwrap(), -3.0);
        assert_eq!(longitudinal_distance(&map, &lp(1, 2.0), &lp(4, 9.0), 2.0), None);
        // backward is 29 m, beyond the limit
        assert_relative_eq!(longitudinal_distance(&map, &lp(1, 2.0), &lp(2, 3.0), 20.0).unwrap(), 11.0);
    }

    #[test]
    fn stop_lines_along_route() {
        let map = super::helpers::straight_road();
        let lanelets = [LaneletId(1), LaneletId(2), LaneletId(3)];
        let spline = route_spline(&map, &lanelets).unwrap();
        assert_relative_eq!(spline.length(), 150.0);

        let lines = stop_lines_along(&map, &spline, &lanelets);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].0, LaneletId(2));
        assert_relative_eq!(lines[0].1, 70.0, epsilon = 1e-9);
    }

    #[test]
    fn conflict_and_right_of_way_filters() {
        let map = super::helpers::straight_road();
        let mut snapshot = StatusSnapshot::new();
        let mut walker = EntityStatus::new(
            EntityType::Pedestrian,
            Pose::new(Point::xy(75.0, 3.0), 0.0),
            BoundingBox::centered(0.5, 0.5, 1.8),
        );
        walker.lanelet_pose = Some(lp(10, 8.0));
        let mut crossing = EntityStatus::new(
            EntityType::Vehicle,
            Pose::new(Point::xy(90.0, -10.0), 0.0),
            BoundingBox::centered(4.0, 2.0, 1.5),
        );
        crossing.lanelet_pose = Some(lp(20, 20.0));
        let unmatched = EntityStatus::new(
            EntityType::Vehicle,
            Pose::new(Point::xy(500.0, 500.0), 0.0),
            BoundingBox::centered(4.0, 2.0, 1.5),
        );
        snapshot.insert("walker".into(), walker);
        snapshot.insert("crossing".into(), crossing);
        snapshot.insert("lost".into(), unmatched);

        let following = [LaneletId(2)];
        let names: Vec<&str> =
            conflicting_entities(&map, &snapshot, &following, "ego").into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["crossing", "walker"]);

        let names: Vec<&str> =
            right_of_way_entities(&map, &snapshot, &following, "ego").into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["crossing"]);

        assert!(conflicting_entities(&map, &snapshot, &following, "walker")
            .iter()
            .all(|(n, _)| *n != "walker"));
    }

    proptest! {
        #[test]
        fn distance_is_antisymmetric(s1 in 0.0f64..50.0, s2 in 0.0f64..50.0) {
            let map = super::helpers::straight_road();
            let ab = longitudinal_distance(&map, &lp(1, s1), &lp(2, s2), 1_000.0);
            let ba = longitudinal_distance(&map, &lp(2, s2), &lp(1, s1), 1_000.0);
            prop_assert_eq!(ab, ba.map(|d| -d));
        }
    }
}
