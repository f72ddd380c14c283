//! The `EntityManager`: entity registry plus the two-snapshot tick.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use tsim_behavior::{BehaviorParameters, BehaviorRequest};
use tsim_core::{
    EntityStatus, EntityType, LaneletId, LaneletPose, Point, Pose, SimClock, SimConfig,
    StatusSnapshot, TrafficLightColor, TrafficLightId, TrafficLights,
};
use tsim_sensor::{OccupancyGrid, OccupancyGridSensor, OccupancyGridSensorConfig};
use tsim_spatial::{query, LaneChangeDirection, LaneGraph, TrajectorySpline};

use crate::entity::{Entity, EntityStep, TickEnv};
use crate::speed_change::{ActiveSpeedChange, SpeedChangeRequest};
use crate::{EngineError, EngineResult, EntityStatusWithTrajectory, SimObserver, TickRecord};

#[cfg(feature = "fx-hash")]
type EntityMap = rustc_hash::FxHashMap<String, Entity>;
#[cfg(not(feature = "fx-hash"))]
type EntityMap = std::collections::HashMap<String, Entity>;

// ── EntityManager ─────────────────────────────────────────────────────────────

/// Owns every entity and advances them one step at a time.
///
/// `update` runs, in order:
///
/// 1. **Ego check** — more than one ego aborts the step before any state
///    is touched.
/// 2. **Snapshot S0** of every status, shared behind an `Arc`.
/// 3. **Distribute S0** as every entity's view of the others.
/// 4. **Behavior phase** (parallel with the `parallel` feature): each
///    entity ticks against S0 and its own private state only.
/// 5. **Snapshot S1** from the new statuses, with lane poses re-projected
///    from the new world poses.  Sensor frames are built on S1 here, so a
///    failing sensor aborts the step before anything is applied.
/// 6. **Commit** in ascending name order, popping reached goals, then
///    distribute S1 the same way as S0.
/// 7. **Record**: per-entity status with trajectory, sensor frames.
///
/// Create via [`EntityManagerBuilder`][crate::EntityManagerBuilder].
pub struct EntityManager {
    pub(crate) config:            SimConfig,
    pub(crate) clock:             SimClock,
    pub(crate) graph:             Arc<dyn LaneGraph>,
    pub(crate) entities:          EntityMap,
    pub(crate) traffic_lights:    TrafficLights,
    pub(crate) sensors:           Vec<OccupancyGridSensor>,
    pub(crate) current_time:      f64,
    pub(crate) step_time:         f64,
    pub(crate) npc_logic_started: bool,
    #[cfg(feature = "parallel")]
    pub(crate) pool:              Option<rayon::ThreadPool>,
}

impl EntityManager {
    // ── Tick ──────────────────────────────────────────────────────────────

    /// Advance every entity by `step_time` seconds from `current_time`.
    pub fn update(&mut self, current_time: f64, step_time: f64) -> EngineResult<TickRecord> {
        let started = Instant::now();

        let egos = self.ego_count();
        if egos > 1 {
            return Err(EngineError::MultipleEgo { count: egos });
        }
        let previous = (self.current_time, self.step_time);
        self.current_time = current_time;
        self.step_time = step_time;

        let s0 = Arc::new(self.snapshot());
        self.distribute(&s0);

        let time = current_time + step_time;
        let steps: Vec<(String, EntityStep)> = self
            .compute_steps()
            .into_iter()
            .map(|(name, mut step)| {
                step.status.time = time;
                step.status.lanelet_pose = self.project(&step.status.pose, step.status.entity_type);
                (name, step)
            })
            .collect();
        let s1: StatusSnapshot = steps
            .iter()
            .map(|(name, step)| (name.clone(), step.status.clone()))
            .collect();
        let frames = match self.scan_sensors(time, &s1) {
            Ok(frames) => frames,
            Err(e) => {
                (self.current_time, self.step_time) = previous;
                return Err(e);
            }
        };

        for (name, step) in steps {
            self.commit(&name, step);
        }
        let grids = frames
            .into_iter()
            .map(|(index, grid)| {
                let sensor = &mut self.sensors[index];
                sensor.mark_published(time);
                (sensor.entity().to_string(), grid)
            })
            .collect();
        let s1 = Arc::new(s1);
        self.distribute(&s1);

        let record = self.make_record(time, &s1, grids);
        debug!(time = record.time, entities = record.entities.len(), "tick committed");
        if self.config.verbose {
            info!(
                elapsed_ms = started.elapsed().as_secs_f64() * 1e3,
                entities = record.entities.len(),
                "EntityManager::update"
            );
        }
        Ok(record)
    }

    /// Run `n` steps on the manager's own clock, notifying `observer`.
    pub fn run_steps<O: SimObserver>(&mut self, n: u64, observer: &mut O) -> EngineResult<()> {
        for _ in 0..n {
            let now = self.clock.current_time;
            observer.on_tick_start(now);
            let record = self.update(now, self.clock.step_time)?;
            observer.on_tick_end(&record);
            self.clock.advance();
        }
        observer.on_sim_end(self.clock.current_time);
        Ok(())
    }

    /// Let non-ego entities start moving.  Until this is called they hold
    /// their status and only their timestamps advance.
    pub fn start_npc_logic(&mut self) {
        if !self.npc_logic_started {
            info!(entities = self.entities.len(), "npc logic started");
        }
        self.npc_logic_started = true;
    }

    #[inline]
    pub fn is_npc_logic_started(&self) -> bool {
        self.npc_logic_started
    }

    /// Name-sorted copy of every entity's current status.
    pub fn snapshot(&self) -> StatusSnapshot {
        self.entities
            .iter()
            .map(|(name, entity)| (name.clone(), entity.status.clone()))
            .collect()
    }

    fn distribute(&mut self, snapshot: &Arc<StatusSnapshot>) {
        for entity in self.entities.values_mut() {
            entity.others = Arc::clone(snapshot);
        }
    }

    /// Behavior phase.  Reads only S0 (already distributed) and each
    /// entity's own state; results come back sorted by name.
    fn compute_steps(&self) -> Vec<(String, EntityStep)> {
        let env = TickEnv {
            graph:             self.graph.as_ref(),
            traffic_lights:    &self.traffic_lights,
            current_time:      self.current_time,
            step_time:         self.step_time,
            npc_logic_started: self.npc_logic_started,
        };
        let mut entities: Vec<&Entity> = self.entities.values().collect();
        entities.sort_unstable_by(|a, b| a.name.cmp(&b.name));

        #[cfg(not(feature = "parallel"))]
        {
            entities.iter().map(|e| (e.name.clone(), e.step(&env))).collect()
        }

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;

            let run = || -> Vec<(String, EntityStep)> {
                entities.par_iter().map(|e| (e.name.clone(), e.step(&env))).collect()
            };
            match &self.pool {
                Some(pool) => pool.install(run),
                None       => run(),
            }
        }
    }

    /// Apply a step whose status is already stamped and re-projected.
    fn commit(&mut self, name: &str, step: EntityStep) {
        let graph = self.graph.as_ref();
        let Some(entity) = self.entities.get_mut(name) else {
            return;
        };

        if step.status.lanelet_pose.is_none() && entity.status.lanelet_pose.is_some() {
            debug!(entity = name, "left the lane graph");
        }

        entity.status = step.status;
        entity.waypoints = step.waypoints;
        entity.obstacle = step.obstacle;
        entity.node_status = step.node_status;
        entity.memory = step.memory;
        entity.request = step.request;
        if entity.speed_change.is_some() && step.speed_change.is_none() {
            debug!(entity = name, speed = entity.status.speed(), "speed change complete");
        }
        entity.speed_change = step.speed_change;

        loop {
            let reached = entity.goals.front().is_some_and(|goal| entity.reached(graph, goal));
            if !reached {
                break;
            }
            if let Some(goal) = entity.goals.pop_front() {
                info!(entity = name, lanelet = %goal.lanelet_id, s = goal.s, "goal reached");
            }
        }
    }

    /// Frames from every due sensor on S1.  Touches no sensor's update
    /// period.
    fn scan_sensors(&mut self, time: f64, s1: &StatusSnapshot) -> EngineResult<Vec<(usize, OccupancyGrid)>> {
        let mut frames = Vec::new();
        for (index, sensor) in self.sensors.iter_mut().enumerate() {
            if let Some(grid) = sensor.scan(time, s1)? {
                frames.push((index, grid));
            }
        }
        Ok(frames)
    }

    fn make_record(&self, time: f64, s1: &StatusSnapshot, grids: Vec<(String, OccupancyGrid)>) -> TickRecord {
        let graph = self.graph.as_ref();
        let entities = s1
            .keys()
            .filter_map(|name| self.entities.get(name))
            .map(|entity| EntityStatusWithTrajectory {
                name:       entity.name.clone(),
                status:     entity.status.clone(),
                waypoints:  entity.waypoints.clone(),
                goal_poses: entity.goals.iter().filter_map(|goal| graph.to_map_pose(goal)).collect(),
                obstacle:   entity.obstacle,
                time,
            })
            .collect();
        TickRecord { time, entities, grids }
    }

    // ── Registry ──────────────────────────────────────────────────────────

    fn project(&self, pose: &Pose, entity_type: EntityType) -> Option<LaneletPose> {
        self.graph.to_lanelet_pose(
            pose,
            entity_type == EntityType::Pedestrian,
            self.config.lane_matching_distance,
        )
    }

    fn entity(&self, name: &str) -> EngineResult<&Entity> {
        self.entities
            .get(name)
            .ok_or_else(|| EngineError::EntityNotFound(name.to_string()))
    }

    fn entity_mut(&mut self, name: &str) -> EngineResult<&mut Entity> {
        self.entities
            .get_mut(name)
            .ok_or_else(|| EngineError::EntityNotFound(name.to_string()))
    }

    /// Fails for unknown names, and for the ego once the scenario started.
    fn unlocked_mut(&mut self, name: &str) -> EngineResult<&mut Entity> {
        let time = self.current_time;
        let entity = self.entity_mut(name)?;
        if entity.status.entity_type.is_ego() && time > 0.0 {
            return Err(EngineError::EgoLocked { name: name.to_string(), time });
        }
        Ok(entity)
    }

    /// Register a new entity.  The lane pose is projected from `status.pose`.
    pub fn spawn(
        &mut self,
        name:        impl Into<String>,
        entity_type: EntityType,
        status:      EntityStatus,
        parameters:  BehaviorParameters,
    ) -> EngineResult<()> {
        let name = name.into();
        parameters.validate()?;
        if self.entities.contains_key(&name) {
            return Err(EngineError::DuplicateEntity(name));
        }
        if entity_type.is_ego() && self.is_ego_spawned() {
            warn!(entity = %name, "second ego spawned; update will refuse to run");
        }

        let mut status = status;
        status.entity_type = entity_type;
        status.lanelet_pose = self.project(&status.pose, entity_type);
        info!(
            entity = %name,
            kind = %entity_type,
            on_lane = status.lanelet_pose.is_some(),
            "spawned"
        );
        self.entities.insert(name.clone(), Entity::new(name, status, parameters));
        Ok(())
    }

    /// Register a new entity standing still at `lanelet_pose`.
    pub fn spawn_on_lane(
        &mut self,
        name:         impl Into<String>,
        entity_type:  EntityType,
        lanelet_pose: LaneletPose,
        bounding_box: tsim_core::BoundingBox,
        parameters:   BehaviorParameters,
    ) -> EngineResult<()> {
        let pose = self
            .graph
            .to_map_pose(&lanelet_pose)
            .ok_or(EngineError::InvalidLaneletPose(lanelet_pose.lanelet_id))?;
        self.spawn(name, entity_type, EntityStatus::new(entity_type, pose, bounding_box), parameters)
    }

    pub fn despawn(&mut self, name: &str) -> EngineResult<()> {
        self.entities
            .remove(name)
            .ok_or_else(|| EngineError::EntityNotFound(name.to_string()))?;
        info!(entity = name, "despawned");
        Ok(())
    }

    #[inline]
    pub fn entity_exists(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    /// Sorted entity names.
    pub fn entity_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entities.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn entity_status(&self, name: &str) -> EngineResult<&EntityStatus> {
        Ok(&self.entity(name)?.status)
    }

    /// Replace an entity's status.  Its type is kept and its lane pose
    /// re-projected.
    pub fn set_status(&mut self, name: &str, status: EntityStatus) -> EngineResult<()> {
        let entity_type = self.entity(name)?.status.entity_type;
        let lanelet_pose = self.project(&status.pose, entity_type);
        let entity = self.unlocked_mut(name)?;
        entity.status = EntityStatus { entity_type, lanelet_pose, ..status };
        debug!(entity = name, "status set");
        Ok(())
    }

    pub fn set_behavior_parameters(&mut self, name: &str, parameters: BehaviorParameters) -> EngineResult<()> {
        parameters.validate()?;
        self.entity_mut(name)?.parameters = parameters;
        Ok(())
    }

    pub fn behavior_parameters(&self, name: &str) -> EngineResult<&BehaviorParameters> {
        Ok(&self.entity(name)?.parameters)
    }

    pub fn ego_name(&self) -> Option<&str> {
        self.entities
            .values()
            .filter(|e| e.status.entity_type.is_ego())
            .map(|e| e.name.as_str())
            .min()
    }

    #[inline]
    pub fn is_ego_spawned(&self) -> bool {
        self.ego_count() > 0
    }

    fn ego_count(&self) -> usize {
        self.entities.values().filter(|e| e.status.entity_type.is_ego()).count()
    }

    #[inline]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    #[inline]
    pub fn step_time(&self) -> f64 {
        self.step_time
    }

    #[inline]
    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    #[inline]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.config.verbose = verbose;
    }

    #[inline]
    pub fn lane_graph(&self) -> &dyn LaneGraph {
        self.graph.as_ref()
    }

    // ── Requests ──────────────────────────────────────────────────────────

    pub fn request_speed_change(&mut self, name: &str, request: SpeedChangeRequest) -> EngineResult<()> {
        request.validate()?;
        let entity = self.unlocked_mut(name)?;
        debug!(entity = name, target = ?request.target, continuous = request.continuous, "speed change requested");
        entity.speed_change = Some(ActiveSpeedChange::new(request));
        Ok(())
    }

    /// Ask `name` to move to the adjacent lanelet toward `direction`.
    /// Does nothing if there is no such lanelet.
    pub fn request_lane_change(&mut self, name: &str, direction: LaneChangeDirection) -> EngineResult<()> {
        let current = self.entity(name)?.status.lanelet_pose;
        let Some(lp) = current else {
            warn!(entity = name, "lane change requested off the lane graph");
            return Ok(());
        };
        match self.graph.lane_changeable_lanelet_id(lp.lanelet_id, direction) {
            Some(target) => self.request_lane_change_to(name, target),
            None => {
                warn!(entity = name, ?direction, lanelet = %lp.lanelet_id, "no lanelet to change into");
                Ok(())
            }
        }
    }

    pub fn request_lane_change_to(&mut self, name: &str, target: LaneletId) -> EngineResult<()> {
        let entity = self.entity_mut(name)?;
        entity.request = BehaviorRequest::LaneChange { target };
        debug!(entity = name, target = %target, "lane change requested");
        Ok(())
    }

    /// Replace the entity's goals with `goals`, visited in order.
    pub fn request_assign_route(&mut self, name: &str, goals: Vec<LaneletPose>) -> EngineResult<()> {
        let entity = self.entity_mut(name)?;
        debug!(entity = name, goals = goals.len(), "route assigned");
        entity.goals = goals.into();
        Ok(())
    }

    pub fn request_acquire_position(&mut self, name: &str, goal: LaneletPose) -> EngineResult<()> {
        self.request_assign_route(name, vec![goal])
    }

    pub fn set_traffic_light_color(&mut self, id: TrafficLightId, color: TrafficLightColor) {
        debug!(light = %id, ?color, "traffic light changed");
        self.traffic_lights.set_color(id, color);
    }

    #[inline]
    pub fn traffic_lights(&self) -> &TrafficLights {
        &self.traffic_lights
    }

    pub fn attach_occupancy_grid_sensor(&mut self, config: OccupancyGridSensorConfig) -> EngineResult<()> {
        let sensor = OccupancyGridSensor::new(config)?;
        info!(entity = sensor.entity(), "occupancy grid sensor attached");
        self.sensors.push(sensor);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// `true` if the two footprints intersect.  Always `false` for `a == b`.
    pub fn check_collision(&self, a: &str, b: &str) -> EngineResult<bool> {
        let first = self.entity(a)?;
        let second = self.entity(b)?;
        if a == b {
            return Ok(false);
        }
        Ok(tsim_spatial::check_collision_2d(
            &first.status.pose,
            &first.status.bounding_box,
            &second.status.pose,
            &second.status.bounding_box,
        ))
    }

    /// Signed lane-following distance from `from` to `to`; negative if `to`
    /// is behind.  `None` if either is off the lane graph or neither
    /// direction is within `max_distance`.
    pub fn longitudinal_distance(&self, from: &str, to: &str, max_distance: f64) -> EngineResult<Option<f64>> {
        let (from, to) = (self.entity(from)?, self.entity(to)?);
        let (Some(from), Some(to)) = (from.status.lanelet_pose, to.status.lanelet_pose) else {
            return Ok(None);
        };
        Ok(query::longitudinal_distance(self.graph.as_ref(), &from, &to, max_distance))
    }

    pub fn bounding_box_distance(&self, a: &str, b: &str) -> EngineResult<Option<f64>> {
        let (a, b) = (self.entity(a)?, self.entity(b)?);
        Ok(tsim_spatial::bounding_box_distance(
            &a.status.pose,
            &a.status.bounding_box,
            &b.status.pose,
            &b.status.bounding_box,
        ))
    }

    /// Pose of `to` in the frame of `from`.
    pub fn relative_pose(&self, from: &str, to: &str) -> EngineResult<Pose> {
        let (from, to) = (self.entity(from)?, self.entity(to)?);
        Ok(from.status.pose.relative_pose(&to.status.pose))
    }

    /// `true` if the entity is on `lanelet`, or within `tolerance` of it
    /// along the lane graph in either direction.
    pub fn is_in_lanelet(&self, name: &str, lanelet: LaneletId, tolerance: f64) -> EngineResult<bool> {
        let Some(lp) = self.entity(name)?.status.lanelet_pose else {
            return Ok(false);
        };
        if lp.lanelet_id == lanelet {
            return Ok(true);
        }
        let graph = self.graph.as_ref();
        let Some(length) = graph.lanelet_length(lanelet) else {
            return Ok(false);
        };
        let after = graph.longitudinal_distance(lanelet, length, lp.lanelet_id, lp.s);
        let before = graph.longitudinal_distance(lp.lanelet_id, lp.s, lanelet, 0.0);
        Ok(after.is_some_and(|d| d < tolerance) || before.is_some_and(|d| d < tolerance))
    }

    pub fn is_stopping(&self, name: &str) -> EngineResult<bool> {
        Ok(self.entity(name)?.status.speed().abs() < f64::EPSILON)
    }

    pub fn reach_position(&self, name: &str, target: &Pose, tolerance: f64) -> EngineResult<bool> {
        Ok(self.entity(name)?.status.pose.position.distance(target.position) < tolerance)
    }

    pub fn reach_lanelet_pose(&self, name: &str, target: &LaneletPose, tolerance: f64) -> EngineResult<bool> {
        let pose = self
            .graph
            .to_map_pose(target)
            .ok_or(EngineError::InvalidLaneletPose(target.lanelet_id))?;
        self.reach_position(name, &pose, tolerance)
    }

    /// Arc-length along the entity's latest waypoints to the stop line on
    /// `lanelet`.
    pub fn distance_to_stop_line(&self, name: &str, lanelet: LaneletId) -> EngineResult<Option<f64>> {
        let entity = self.entity(name)?;
        Ok(waypoint_spline(&entity.waypoints).and_then(|spline| {
            let line = self.graph.stop_line_polygon(lanelet)?;
            query::distance_to_polygon_along(&spline, line)
        }))
    }

    /// Arc-length along the entity's latest waypoints to crosswalk `lanelet`.
    pub fn distance_to_crosswalk(&self, name: &str, lanelet: LaneletId) -> EngineResult<Option<f64>> {
        let entity = self.entity(name)?;
        Ok(waypoint_spline(&entity.waypoints).and_then(|spline| {
            let outline = self.graph.lanelet_polygon(lanelet)?;
            query::distance_to_polygon_along(&spline, &outline)
        }))
    }

    pub fn waypoints(&self, name: &str) -> EngineResult<&[Point]> {
        Ok(&self.entity(name)?.waypoints)
    }

    pub fn obstacle(&self, name: &str) -> EngineResult<Option<tsim_core::Obstacle>> {
        Ok(self.entity(name)?.obstacle)
    }

    pub fn current_action(&self, name: &str) -> EngineResult<tsim_core::ActionKind> {
        Ok(self.entity(name)?.status.action)
    }

    pub fn goal_poses(&self, name: &str) -> EngineResult<Vec<Pose>> {
        let entity = self.entity(name)?;
        Ok(entity.goals.iter().filter_map(|goal| self.graph.to_map_pose(goal)).collect())
    }
}

fn waypoint_spline(waypoints: &[Point]) -> Option<TrajectorySpline> {
    if waypoints.is_empty() {
        return None;
    }
    TrajectorySpline::new(waypoints.to_vec()).ok()
}
