//! Integration tests for tsim-engine.

use std::sync::Arc;

use tsim_behavior::BehaviorParameters;
use tsim_core::{
    BoundingBox, EntityStatus, EntityType, LaneletId, LaneletPose, Point, Pose, SimConfig,
    TrafficLightId, Twist,
};
use tsim_spatial::{LaneChangeDirection, LaneletMap, LaneletMapBuilder};

use crate::{EntityManager, EntityManagerBuilder};

const STEP: f64 = 0.1;
const LIGHT: TrafficLightId = TrafficLightId(100);

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Road 1 → 2 → 3 along y = 0 (50 m each), lanelet 4 left of 1, crosswalk
/// 10 at x = 75 crossing 2, and a stop line with light 100 on 2 at x = 70.
fn test_map() -> LaneletMap {
    let mut b = LaneletMapBuilder::new();
    b.add_lanelet(LaneletId(1), vec![Point::xy(0.0, 0.0), Point::xy(50.0, 0.0)], 3.5).unwrap();
    b.add_lanelet(LaneletId(2), vec![Point::xy(50.0, 0.0), Point::xy(100.0, 0.0)], 3.5).unwrap();
    b.add_lanelet(LaneletId(3), vec![Point::xy(100.0, 0.0), Point::xy(150.0, 0.0)], 3.5).unwrap();
    b.add_lanelet(LaneletId(4), vec![Point::xy(0.0, 3.5), Point::xy(50.0, 3.5)], 3.5).unwrap();
    b.add_crosswalk(LaneletId(10), vec![Point::xy(75.0, -5.0), Point::xy(75.0, 5.0)], 3.0).unwrap();
    b.connect(LaneletId(1), LaneletId(2)).unwrap();
    b.connect(LaneletId(2), LaneletId(3)).unwrap();
    b.set_neighbor(LaneletId(1), LaneChangeDirection::Left, LaneletId(4)).unwrap();
    b.add_conflict(LaneletId(2), LaneletId(10)).unwrap();
    b.add_stop_line(LaneletId(2), 20.0, Some(LIGHT)).unwrap();
    b.build()
}

fn manager() -> EntityManager {
    EntityManagerBuilder::new(Arc::new(test_map()))
        .config(SimConfig { step_time: STEP, ..SimConfig::default() })
        .build()
        .unwrap()
}

fn lp(id: u64, s: f64) -> LaneletPose {
    LaneletPose::new(LaneletId(id), s, 0.0)
}

fn car_box() -> BoundingBox {
    BoundingBox::centered(4.0, 2.0, 1.5)
}

fn status_at(entity_type: EntityType, x: f64, y: f64, yaw: f64, speed: f64) -> EntityStatus {
    EntityStatus::new(entity_type, Pose::new(Point::xy(x, y), yaw), car_box())
        .with_twist(Twist::new(speed, 0.0))
}

/// Spawn a vehicle on the lane graph moving at `speed`.
fn spawn_car(m: &mut EntityManager, name: &str, at: LaneletPose, speed: f64) {
    let pose = m.lane_graph().to_map_pose(&at).unwrap();
    let status = EntityStatus::new(EntityType::Vehicle, pose, car_box()).with_twist(Twist::new(speed, 0.0));
    m.spawn(name, EntityType::Vehicle, status, BehaviorParameters::vehicle()).unwrap();
}

/// Run `n` updates from the manager's current time.
fn advance(m: &mut EntityManager, n: usize) {
    for _ in 0..n {
        let now = m.current_time() + m.step_time();
        m.update(now, STEP).unwrap();
    }
}

// ── Builder ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod builder {
    use std::sync::Arc;

    use tsim_core::SimConfig;
    use tsim_sensor::OccupancyGridSensorConfig;

    use crate::{EngineError, EntityManagerBuilder};

    use super::test_map;

    #[test]
    fn builds_with_defaults() {
        let m = EntityManagerBuilder::new(Arc::new(test_map())).build().unwrap();
        assert_eq!(m.current_time(), 0.0);
        assert!(m.entity_names().is_empty());
        assert!(!m.is_npc_logic_started());
    }

    #[test]
    fn invalid_config_rejected() {
        let result = EntityManagerBuilder::new(Arc::new(test_map()))
            .config(SimConfig { step_time: 0.0, ..SimConfig::default() })
            .build();
        assert!(matches!(result, Err(EngineError::Core(_))));
    }

    #[test]
    fn invalid_sensor_rejected() {
        let result = EntityManagerBuilder::new(Arc::new(test_map()))
            .sensor(OccupancyGridSensorConfig { resolution: -1.0, ..OccupancyGridSensorConfig::new("ego") })
            .build();
        assert!(matches!(result, Err(EngineError::Sensor(_))));
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod registry {
    use approx::assert_relative_eq;
    use tsim_behavior::BehaviorParameters;
    use tsim_core::{EntityType, LaneletId};

    use crate::EngineError;

    use super::{car_box, lp, manager, spawn_car, status_at};

    #[test]
    fn spawn_on_lane_places_and_projects() {
        let mut m = manager();
        m.spawn_on_lane("car", EntityType::Vehicle, lp(1, 10.0), car_box(), BehaviorParameters::vehicle())
            .unwrap();
        let status = m.entity_status("car").unwrap();
        assert_relative_eq!(status.pose.position.x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(status.pose.position.y, 0.0, epsilon = 1e-9);
        let lane = status.lanelet_pose.unwrap();
        assert_eq!(lane.lanelet_id, LaneletId(1));
        assert_relative_eq!(lane.s, 10.0, epsilon = 1e-9);
        assert_eq!(status.speed(), 0.0);
    }

    #[test]
    fn spawn_on_unknown_lanelet_fails() {
        let mut m = manager();
        let result = m.spawn_on_lane("car", EntityType::Vehicle, lp(99, 0.0), car_box(), BehaviorParameters::vehicle());
        assert!(matches!(result, Err(EngineError::InvalidLaneletPose(LaneletId(99)))));
        assert!(!m.entity_exists("car"));
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 10.0), 0.0);
        let again = m.spawn(
            "car",
            EntityType::Vehicle,
            status_at(EntityType::Vehicle, 0.0, 0.0, 0.0, 0.0),
            BehaviorParameters::vehicle(),
        );
        assert!(matches!(again, Err(EngineError::DuplicateEntity(name)) if name == "car"));
    }

    #[test]
    fn invalid_parameters_rejected() {
        let mut m = manager();
        let params = BehaviorParameters { stop_margin: -1.0, ..BehaviorParameters::vehicle() };
        let result = m.spawn("car", EntityType::Vehicle, status_at(EntityType::Vehicle, 0.0, 0.0, 0.0, 0.0), params);
        assert!(matches!(result, Err(EngineError::Behavior(_))));
    }

    #[test]
    fn despawn_removes_and_unknown_fails() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 10.0), 0.0);
        m.despawn("car").unwrap();
        assert!(!m.entity_exists("car"));
        assert!(matches!(m.despawn("car"), Err(EngineError::EntityNotFound(_))));
        assert!(matches!(m.entity_status("car"), Err(EngineError::EntityNotFound(_))));
    }

    #[test]
    fn names_sorted_and_ego_found() {
        let mut m = manager();
        spawn_car(&mut m, "zeta", lp(1, 10.0), 0.0);
        spawn_car(&mut m, "alpha", lp(2, 10.0), 0.0);
        assert!(!m.is_ego_spawned());
        m.spawn(
            "ego",
            EntityType::Ego,
            status_at(EntityType::Ego, 30.0, 0.0, 0.0, 0.0),
            BehaviorParameters::vehicle(),
        )
        .unwrap();
        assert_eq!(m.entity_names(), vec!["alpha", "ego", "zeta"]);
        assert_eq!(m.ego_name(), Some("ego"));
        assert!(m.is_ego_spawned());
    }

    #[test]
    fn pedestrians_match_crosswalks_and_vehicles_do_not() {
        use std::f64::consts::FRAC_PI_2;

        let mut m = manager();
        m.spawn(
            "walker",
            EntityType::Pedestrian,
            status_at(EntityType::Pedestrian, 75.0, 3.0, FRAC_PI_2, 0.0),
            BehaviorParameters::pedestrian(),
        )
        .unwrap();
        m.spawn(
            "car",
            EntityType::Vehicle,
            status_at(EntityType::Vehicle, 75.0, 3.0, FRAC_PI_2, 0.0),
            BehaviorParameters::vehicle(),
        )
        .unwrap();

        let walker = m.entity_status("walker").unwrap().lanelet_pose.unwrap();
        assert_eq!(walker.lanelet_id, LaneletId(10));
        assert_relative_eq!(walker.s, 8.0, epsilon = 1e-9);
        assert!(m.entity_status("car").unwrap().lanelet_pose.is_none());
    }
}

// ── Tick ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tick {
    use approx::assert_relative_eq;
    use tsim_behavior::BehaviorParameters;
    use tsim_core::{ActionKind, EntityType};

    use crate::EngineError;

    use super::{advance, lp, manager, spawn_car, status_at, STEP};

    #[test]
    fn verbose_timing_can_be_toggled() {
        let mut m = manager();
        assert!(!m.config().verbose);
        m.set_verbose(true);
        assert!(m.config().verbose);
        spawn_car(&mut m, "car", lp(1, 10.0), 0.0);
        assert_eq!(m.update(0.0, STEP).unwrap().entities.len(), 1);
        m.set_verbose(false);
        assert!(!m.config().verbose);
    }

    #[test]
    fn record_is_sorted_and_stamped() {
        let mut m = manager();
        spawn_car(&mut m, "b", lp(1, 10.0), 0.0);
        spawn_car(&mut m, "a", lp(2, 10.0), 0.0);
        let record = m.update(0.0, STEP).unwrap();
        assert_relative_eq!(record.time, 0.1);
        let names: Vec<_> = record.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(record.entities.iter().all(|e| e.time == record.time && e.status.time == record.time));
        assert!(record.entity("b").is_some());
        assert!(record.entity("c").is_none());
        assert_eq!(m.current_time(), 0.0);
        assert_eq!(m.step_time(), STEP);
    }

    #[test]
    fn npcs_hold_until_started() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 10.0), 10.0);
        m.update(0.0, STEP).unwrap();

        let held = m.entity_status("car").unwrap();
        assert_eq!(held.action, ActionKind::Hold);
        assert_relative_eq!(held.pose.position.x, 10.0);
        assert_relative_eq!(held.time, 0.1);
        assert!(m.waypoints("car").unwrap().is_empty());

        m.start_npc_logic();
        m.update(0.1, STEP).unwrap();
        let moved = m.entity_status("car").unwrap();
        assert_ne!(moved.action, ActionKind::Hold);
        assert_relative_eq!(moved.pose.position.x, 11.0, epsilon = 1e-9);
        assert_relative_eq!(moved.lanelet_pose.unwrap().s, 11.0, epsilon = 1e-9);
        assert!(!m.waypoints("car").unwrap().is_empty());
    }

    #[test]
    fn ego_moves_before_npc_start() {
        let mut m = manager();
        m.spawn(
            "ego",
            EntityType::Ego,
            status_at(EntityType::Ego, 10.0, 0.0, 0.0, 5.0),
            BehaviorParameters::vehicle(),
        )
        .unwrap();
        m.update(0.0, STEP).unwrap();
        let ego = m.entity_status("ego").unwrap();
        assert_eq!(ego.action, ActionKind::MoveInWorldFrame);
        assert_relative_eq!(ego.pose.position.x, 10.5, epsilon = 1e-9);
    }

    #[test]
    fn multiple_egos_refuse_to_tick() {
        let mut m = manager();
        for name in ["ego1", "ego2"] {
            m.spawn(
                name,
                EntityType::Ego,
                status_at(EntityType::Ego, 10.0, 0.0, 0.0, 5.0),
                BehaviorParameters::vehicle(),
            )
            .unwrap();
        }
        let result = m.update(1.0, STEP);
        assert!(matches!(result, Err(EngineError::MultipleEgo { count: 2 })));
        assert_eq!(m.current_time(), 0.0);
        assert_eq!(m.entity_status("ego1").unwrap().pose.position.x, 10.0);

        m.despawn("ego2").unwrap();
        assert!(m.update(1.0, STEP).is_ok());
    }

    #[test]
    fn ego_locked_once_started() {
        let mut m = manager();
        m.spawn(
            "ego",
            EntityType::Ego,
            status_at(EntityType::Ego, 10.0, 0.0, 0.0, 0.0),
            BehaviorParameters::vehicle(),
        )
        .unwrap();
        spawn_car(&mut m, "car", lp(2, 10.0), 0.0);

        m.set_status("ego", status_at(EntityType::Ego, 12.0, 0.0, 0.0, 0.0)).unwrap();
        assert_relative_eq!(m.entity_status("ego").unwrap().pose.position.x, 12.0);

        m.update(5.0, STEP).unwrap();
        let locked = m.set_status("ego", status_at(EntityType::Ego, 20.0, 0.0, 0.0, 0.0));
        assert!(matches!(locked, Err(EngineError::EgoLocked { .. })));
        let speed = m.request_speed_change("ego", crate::SpeedChangeRequest::absolute(3.0));
        assert!(matches!(speed, Err(EngineError::EgoLocked { .. })));

        // other entities stay scriptable
        m.set_status("car", status_at(EntityType::Pedestrian, 60.0, 0.0, 0.0, 0.0)).unwrap();
        let car = m.entity_status("car").unwrap();
        assert_eq!(car.entity_type, EntityType::Vehicle);
        assert_eq!(car.lanelet_pose.unwrap().lanelet_id.raw(), 2);
    }

    #[test]
    fn despawned_entities_leave_the_record() {
        let mut m = manager();
        spawn_car(&mut m, "a", lp(1, 10.0), 0.0);
        spawn_car(&mut m, "b", lp(2, 10.0), 0.0);
        m.despawn("a").unwrap();
        let record = m.update(0.0, STEP).unwrap();
        assert_eq!(record.entities.len(), 1);
        assert_eq!(record.entities[0].name, "b");
    }

    #[test]
    fn others_see_end_of_step_snapshot() {
        let mut m = manager();
        spawn_car(&mut m, "a", lp(1, 10.0), 10.0);
        spawn_car(&mut m, "b", lp(2, 30.0), 0.0);
        m.start_npc_logic();
        advance(&mut m, 1);
        let seen = &m.entities["b"].others["a"];
        assert_eq!(seen, m.entity_status("a").unwrap());
    }
}

// ── Determinism ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod determinism {
    use proptest::prelude::*;
    use tsim_behavior::BehaviorParameters;
    use tsim_core::{EntityType, LaneletPose, TrafficLightColor};

    use crate::TickRecord;

    use super::{lp, manager, spawn_car, status_at, LIGHT, STEP};

    enum Spawn {
        Car(&'static str, LaneletPose, f64),
        Walker(&'static str, f64, f64),
    }

    fn spawns() -> Vec<Spawn> {
        vec![
            Spawn::Car("a", lp(1, 5.0), 10.0),
            Spawn::Car("b", lp(1, 30.0), 6.0),
            Spawn::Car("c", lp(2, 5.0), 12.0),
            Spawn::Car("d", lp(4, 0.0), 8.0),
            Spawn::Car("e", lp(3, 10.0), 0.0),
            Spawn::Walker("w", 75.0, -4.0),
            Spawn::Walker("x", 20.0, 30.0),
        ]
    }

    fn run(order: &[usize]) -> Vec<TickRecord> {
        let spawns = spawns();
        let mut m = manager();
        m.set_traffic_light_color(LIGHT, TrafficLightColor::Red);
        for &i in order {
            match &spawns[i] {
                Spawn::Car(name, at, speed) => spawn_car(&mut m, name, *at, *speed),
                Spawn::Walker(name, x, y) => m
                    .spawn(
                        *name,
                        EntityType::Pedestrian,
                        status_at(EntityType::Pedestrian, *x, *y, std::f64::consts::FRAC_PI_2, 1.0),
                        BehaviorParameters::pedestrian(),
                    )
                    .unwrap(),
            }
        }
        m.start_npc_logic();
        (0..30).map(|i| m.update(i as f64 * STEP, STEP).unwrap()).collect()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn spawn_order_does_not_matter(order in Just((0..7).collect::<Vec<usize>>()).prop_shuffle()) {
            let sorted: Vec<usize> = (0..7).collect();
            prop_assert_eq!(run(&order), run(&sorted));
        }
    }
}

// ── Speed change ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod speed_change {
    use approx::assert_relative_eq;

    use tsim_core::Twist;

    use crate::{EngineError, RelativeSpeedKind, SpeedChangeRequest, SpeedConstraint, SpeedTransition};

    use super::{advance, lp, manager, spawn_car};

    #[test]
    fn linear_change_completes_and_clears() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 5.0), 0.0);
        m.start_npc_logic();
        m.request_speed_change("car", SpeedChangeRequest::absolute(2.0)).unwrap();

        advance(&mut m, 6);
        assert_relative_eq!(m.entity_status("car").unwrap().speed(), 1.8, epsilon = 1e-9);
        assert!(m.entities["car"].speed_change.is_some());

        advance(&mut m, 1);
        assert_eq!(m.entity_status("car").unwrap().speed(), 2.0);
        assert!(m.entities["car"].speed_change.is_none());

        // the speed is held afterwards
        advance(&mut m, 5);
        assert_relative_eq!(m.entity_status("car").unwrap().speed(), 2.0);
    }

    #[test]
    fn step_transition_jumps() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 5.0), 0.0);
        m.start_npc_logic();
        let request = SpeedChangeRequest::absolute(5.0).with_transition(SpeedTransition::Step);
        m.request_speed_change("car", request).unwrap();
        advance(&mut m, 1);
        let car = m.entity_status("car").unwrap();
        assert_eq!(car.speed(), 5.0);
        assert_relative_eq!(car.pose.position.x, 5.5, epsilon = 1e-9);
        assert!(m.entities["car"].speed_change.is_none());
    }

    #[test]
    fn time_constraint_sets_the_rate() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 5.0), 0.0);
        m.start_npc_logic();
        let request = SpeedChangeRequest::absolute(2.0).with_constraint(SpeedConstraint::Time(1.0));
        m.request_speed_change("car", request).unwrap();

        advance(&mut m, 5);
        assert_relative_eq!(m.entity_status("car").unwrap().speed(), 1.0, epsilon = 1e-9);
        advance(&mut m, 5);
        assert_relative_eq!(m.entity_status("car").unwrap().speed(), 2.0, epsilon = 1e-9);
        assert!(m.entities["car"].speed_change.is_none());
    }

    #[test]
    fn relative_target_tracks_reference() {
        let mut m = manager();
        spawn_car(&mut m, "lead", lp(4, 0.0), 8.0);
        spawn_car(&mut m, "follower", lp(1, 0.0), 0.0);
        m.start_npc_logic();
        let request = SpeedChangeRequest::relative("lead", RelativeSpeedKind::Delta, -3.0)
            .with_transition(SpeedTransition::Step);
        m.request_speed_change("follower", request).unwrap();

        advance(&mut m, 3);
        assert_relative_eq!(m.entity_status("follower").unwrap().speed(), 5.0, epsilon = 1e-9);
        // continuous requests stay attached
        assert!(m.entities["follower"].speed_change.is_some());
    }

    #[test]
    fn timed_relative_target_follows_reference_changes() {
        let mut m = manager();
        spawn_car(&mut m, "lead", lp(4, 0.0), 5.0);
        spawn_car(&mut m, "follower", lp(1, 0.0), 5.0);
        m.start_npc_logic();
        let request = SpeedChangeRequest::relative("lead", RelativeSpeedKind::Delta, 0.0)
            .with_constraint(SpeedConstraint::Time(1.0));
        m.request_speed_change("follower", request).unwrap();

        // already at the target: nothing to do, nothing frozen
        advance(&mut m, 5);
        assert_relative_eq!(m.entity_status("follower").unwrap().speed(), 5.0, epsilon = 1e-9);

        let lead = m.entity_status("lead").unwrap().clone().with_twist(Twist::new(10.0, 0.0));
        m.set_status("lead", lead).unwrap();

        // the new 5 m/s gap is closed over one second
        advance(&mut m, 5);
        assert_relative_eq!(m.entity_status("follower").unwrap().speed(), 7.5, epsilon = 1e-9);
        advance(&mut m, 15);
        assert_relative_eq!(m.entity_status("lead").unwrap().speed(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(m.entity_status("follower").unwrap().speed(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_reference_holds_speed() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 5.0), 4.0);
        m.start_npc_logic();
        let request = SpeedChangeRequest::relative("ghost", RelativeSpeedKind::Factor, 2.0);
        m.request_speed_change("car", request).unwrap();
        advance(&mut m, 2);
        assert_relative_eq!(m.entity_status("car").unwrap().speed(), 4.0);
    }

    #[test]
    fn invalid_requests_rejected() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 5.0), 0.0);
        let bad = SpeedChangeRequest::absolute(2.0).with_constraint(SpeedConstraint::Acceleration(0.0));
        assert!(matches!(m.request_speed_change("car", bad), Err(EngineError::InvalidRequest(_))));
        let bad = SpeedChangeRequest::absolute(2.0).with_constraint(SpeedConstraint::Time(-1.0));
        assert!(matches!(m.request_speed_change("car", bad), Err(EngineError::InvalidRequest(_))));
        assert!(matches!(
            m.request_speed_change("nobody", SpeedChangeRequest::absolute(1.0)),
            Err(EngineError::EntityNotFound(_))
        ));
    }
}

// ── Requests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod requests {
    use approx::assert_relative_eq;
    use tsim_behavior::BehaviorRequest;
    use tsim_core::{ActionKind, LaneletId, ObstacleKind, TrafficLightColor};
    use tsim_spatial::LaneChangeDirection;

    use super::{advance, lp, manager, spawn_car, LIGHT};

    #[test]
    fn lane_change_to_the_left() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 10.0), 10.0);
        m.start_npc_logic();
        m.request_lane_change("car", LaneChangeDirection::Left).unwrap();
        assert_eq!(m.entities["car"].request, BehaviorRequest::LaneChange { target: LaneletId(4) });

        advance(&mut m, 1);
        assert_eq!(m.current_action("car").unwrap(), ActionKind::LaneChange);

        // 30 m path at 1 m per step
        advance(&mut m, 30);
        let car = m.entity_status("car").unwrap();
        assert_eq!(m.entities["car"].request, BehaviorRequest::None);
        assert_relative_eq!(car.pose.position.x, 40.0, epsilon = 1e-9);
        assert_relative_eq!(car.pose.position.y, 3.5, epsilon = 1e-9);
        assert_eq!(car.lanelet_pose.unwrap().lanelet_id, LaneletId(4));
    }

    #[test]
    fn lane_change_without_neighbor_is_ignored() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 10.0), 10.0);
        m.request_lane_change("car", LaneChangeDirection::Right).unwrap();
        assert_eq!(m.entities["car"].request, BehaviorRequest::None);
    }

    #[test]
    fn goals_are_reported_and_popped() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 10.0), 10.0);
        m.start_npc_logic();
        m.request_acquire_position("car", lp(2, 5.0)).unwrap();

        let record = m.update(0.0, 0.1).unwrap();
        let goals = &record.entity("car").unwrap().goal_poses;
        assert_eq!(goals.len(), 1);
        assert_relative_eq!(goals[0].position.x, 55.0, epsilon = 1e-9);

        advance(&mut m, 39);
        assert_eq!(m.goal_poses("car").unwrap().len(), 1);
        advance(&mut m, 10);
        assert!(m.goal_poses("car").unwrap().is_empty());
    }

    #[test]
    fn red_light_is_reported_as_obstacle() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 40.0), 10.0);
        m.start_npc_logic();
        m.set_traffic_light_color(LIGHT, TrafficLightColor::Red);
        let record = m.update(0.0, 0.1).unwrap();
        let obstacle = record.entity("car").unwrap().obstacle.unwrap();
        assert_eq!(obstacle.kind, ObstacleKind::StopLine);
        assert_relative_eq!(obstacle.s, 30.0, epsilon = 1e-6);
        assert_eq!(m.obstacle("car").unwrap(), Some(obstacle));
    }
}

// ── Queries ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod queries {
    use approx::assert_relative_eq;
    use tsim_behavior::BehaviorParameters;
    use tsim_core::{EntityType, LaneletId, Point, Pose};

    use super::{advance, lp, manager, spawn_car, status_at};

    #[test]
    fn collision_between_footprints() {
        let mut m = manager();
        let spawn = |m: &mut crate::EntityManager, name: &str, x: f64| {
            m.spawn(name, EntityType::Vehicle, status_at(EntityType::Vehicle, x, 0.0, 0.0, 0.0), BehaviorParameters::vehicle())
                .unwrap();
        };
        spawn(&mut m, "a", 0.0);
        spawn(&mut m, "b", 2.0);
        spawn(&mut m, "c", 10.0);

        assert!(m.check_collision("a", "b").unwrap());
        assert!(m.check_collision("b", "a").unwrap());
        assert!(!m.check_collision("a", "c").unwrap());
        assert!(!m.check_collision("c", "a").unwrap());
        assert!(!m.check_collision("a", "a").unwrap());
        assert!(m.check_collision("a", "nobody").is_err());

        assert_relative_eq!(m.bounding_box_distance("a", "c").unwrap().unwrap(), 6.0, epsilon = 1e-9);
        assert_eq!(m.bounding_box_distance("a", "b").unwrap(), Some(0.0));
    }

    #[test]
    fn longitudinal_distance_between_entities() {
        let mut m = manager();
        spawn_car(&mut m, "a", lp(1, 10.0), 0.0);
        spawn_car(&mut m, "b", lp(2, 20.0), 0.0);
        m.spawn(
            "walker",
            EntityType::Pedestrian,
            status_at(EntityType::Pedestrian, 20.0, 30.0, 0.0, 0.0),
            BehaviorParameters::pedestrian(),
        )
        .unwrap();

        assert_relative_eq!(m.longitudinal_distance("a", "b", 100.0).unwrap().unwrap(), 60.0, epsilon = 1e-9);
        assert_relative_eq!(m.longitudinal_distance("b", "a", 100.0).unwrap().unwrap(), -60.0, epsilon = 1e-9);
        assert_eq!(m.longitudinal_distance("a", "b", 30.0).unwrap(), None);
        assert_eq!(m.longitudinal_distance("a", "walker", 100.0).unwrap(), None);
    }

    #[test]
    fn relative_pose_between_entities() {
        let mut m = manager();
        spawn_car(&mut m, "a", lp(1, 10.0), 0.0);
        spawn_car(&mut m, "b", lp(2, 20.0), 0.0);
        let rel = m.relative_pose("a", "b").unwrap();
        assert_relative_eq!(rel.position.x, 60.0, epsilon = 1e-9);
        assert_relative_eq!(rel.position.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(rel.yaw, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn lanelet_membership_with_tolerance() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 49.5), 0.0);
        assert!(m.is_in_lanelet("car", LaneletId(1), 1.0).unwrap());
        assert!(m.is_in_lanelet("car", LaneletId(2), 1.0).unwrap());
        assert!(!m.is_in_lanelet("car", LaneletId(2), 0.1).unwrap());
        assert!(!m.is_in_lanelet("car", LaneletId(3), 1.0).unwrap());
    }

    #[test]
    fn stopping_and_reaching() {
        let mut m = manager();
        spawn_car(&mut m, "parked", lp(1, 10.0), 0.0);
        spawn_car(&mut m, "moving", lp(2, 10.0), 5.0);
        assert!(m.is_stopping("parked").unwrap());
        assert!(!m.is_stopping("moving").unwrap());

        assert!(m.reach_position("parked", &Pose::new(Point::xy(10.5, 0.0), 0.0), 1.0).unwrap());
        assert!(!m.reach_position("parked", &Pose::new(Point::xy(12.0, 0.0), 0.0), 1.0).unwrap());
        assert!(m.reach_lanelet_pose("moving", &lp(2, 10.5), 1.0).unwrap());
    }

    #[test]
    fn distances_along_waypoints() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 40.0), 10.0);
        assert_eq!(m.distance_to_stop_line("car", LaneletId(2)).unwrap(), None);

        m.start_npc_logic();
        advance(&mut m, 1);
        // waypoints start where the car was at the start of the step
        assert_relative_eq!(m.distance_to_stop_line("car", LaneletId(2)).unwrap().unwrap(), 30.0, epsilon = 1e-6);
        assert_relative_eq!(m.distance_to_crosswalk("car", LaneletId(10)).unwrap().unwrap(), 33.5, epsilon = 1e-6);
        assert_eq!(m.distance_to_stop_line("car", LaneletId(3)).unwrap(), None);
    }
}

// ── Sensors ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod sensors {
    use std::sync::Arc;

    use tsim_behavior::BehaviorParameters;
    use tsim_core::EntityType;
    use approx::assert_relative_eq;
    use tsim_sensor::{OccupancyGridSensorConfig, SensorError};

    use crate::{EngineError, EntityManagerBuilder};

    use super::{status_at, test_map, STEP};

    fn config() -> OccupancyGridSensorConfig {
        OccupancyGridSensorConfig {
            resolution: 1.0,
            height: 20,
            width: 20,
            range: 100.0,
            ..OccupancyGridSensorConfig::new("ego")
        }
    }

    #[test]
    fn grid_published_in_record() {
        let mut m = EntityManagerBuilder::new(Arc::new(test_map())).sensor(config()).build().unwrap();
        // off the lane graph, standing still
        m.spawn("ego", EntityType::Ego, status_at(EntityType::Ego, 0.0, 200.0, 0.0, 0.0), BehaviorParameters::vehicle())
            .unwrap();
        let mut car = status_at(EntityType::Vehicle, 3.5, 200.0, 0.0, 0.0);
        car.bounding_box = tsim_core::BoundingBox::centered(2.0, 3.0, 1.0);
        m.spawn("car", EntityType::Vehicle, car, BehaviorParameters::vehicle()).unwrap();

        let record = m.update(0.0, STEP).unwrap();
        let grid = record.grid("ego").unwrap();
        assert_eq!(grid.cost(10, 13), Some(100));
        assert_eq!(grid.cost(10, 10), Some(0));
        assert_eq!(grid.count(100), 12);
        assert!(record.grid("car").is_none());

        // 0.1 s period: the next step at 0.2 publishes again, not earlier
        let record = m.update(0.1, STEP).unwrap();
        assert!(record.grid("ego").is_some());
    }

    #[test]
    fn sensor_overflow_fails_the_step_without_applying_it() {
        let tiny = OccupancyGridSensorConfig { height: 4, width: 4, ..config() };
        let mut m = EntityManagerBuilder::new(Arc::new(test_map())).sensor(tiny).build().unwrap();
        m.spawn("ego", EntityType::Ego, status_at(EntityType::Ego, 0.0, 200.0, 0.0, 0.0), BehaviorParameters::vehicle())
            .unwrap();
        m.update(0.0, STEP).unwrap();

        // one more box than a frame can count
        for i in 0..=i16::MAX as usize {
            let status = status_at(EntityType::Vehicle, 1.0, 200.0, 0.0, 0.0);
            m.spawn(format!("c{i:05}"), EntityType::Vehicle, status, BehaviorParameters::vehicle())
                .unwrap();
        }
        let result = m.update(0.1, STEP);
        assert!(matches!(result, Err(EngineError::Sensor(SensorError::PrimitiveOverflow { .. }))));
        assert_eq!(m.current_time(), 0.0);
        assert_relative_eq!(m.entity_status("ego").unwrap().time, 0.1, epsilon = 1e-12);
        assert_eq!(m.entity_status("c00000").unwrap().time, 0.0);

        m.despawn("c00000").unwrap();
        let record = m.update(0.1, STEP).unwrap();
        assert!(record.grid("ego").is_some());
        assert_relative_eq!(m.entity_status("c00001").unwrap().time, 0.2, epsilon = 1e-12);
    }

    #[test]
    fn sensor_attached_later() {
        let mut m = EntityManagerBuilder::new(Arc::new(test_map())).build().unwrap();
        m.attach_occupancy_grid_sensor(config()).unwrap();
        m.spawn("ego", EntityType::Ego, status_at(EntityType::Ego, 0.0, 200.0, 0.0, 0.0), BehaviorParameters::vehicle())
            .unwrap();
        assert_eq!(m.update(0.0, STEP).unwrap().grids.len(), 1);
    }
}

// ── Observer ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod observer {
    use approx::assert_relative_eq;

    use crate::{SimObserver, TickRecord};

    use super::{lp, manager, spawn_car};

    #[derive(Default)]
    struct Counter {
        starts:   usize,
        ends:     usize,
        last:     f64,
        finished: Option<f64>,
    }

    impl SimObserver for Counter {
        fn on_tick_start(&mut self, _time: f64) {
            self.starts += 1;
        }

        fn on_tick_end(&mut self, record: &TickRecord) {
            self.ends += 1;
            self.last = record.time;
        }

        fn on_sim_end(&mut self, final_time: f64) {
            self.finished = Some(final_time);
        }
    }

    #[test]
    fn run_steps_notifies_each_step() {
        let mut m = manager();
        spawn_car(&mut m, "car", lp(1, 10.0), 10.0);
        m.start_npc_logic();
        let mut counter = Counter::default();
        m.run_steps(5, &mut counter).unwrap();

        assert_eq!(counter.starts, 5);
        assert_eq!(counter.ends, 5);
        assert_relative_eq!(counter.last, 0.5, epsilon = 1e-9);
        assert_relative_eq!(counter.finished.unwrap(), 0.5, epsilon = 1e-9);
        assert_eq!(m.clock().steps, 5);
        assert_relative_eq!(m.entity_status("car").unwrap().pose.position.x, 15.0, epsilon = 1e-9);
    }
}
