//! One registered entity and its per-tick step.

use std::collections::VecDeque;
use std::sync::Arc;

use tsim_behavior::{
    BehaviorContext, BehaviorMemory, BehaviorParameters, BehaviorRequest, EntityBehavior, NodeStatus,
};
use tsim_core::{ActionKind, EntityStatus, LaneletId, LaneletPose, Obstacle, Point, StatusSnapshot, TrafficLights};
use tsim_spatial::LaneGraph;

use crate::speed_change::ActiveSpeedChange;

/// How far past the entity's position the route is extended, metres.
/// Covers the longest behavior preview with room to spare.
pub const ROUTE_LOOKAHEAD: f64 = 100.0;

/// An entity counts as having reached a goal within this distance, metres.
pub const GOAL_TOLERANCE: f64 = 1.0;

/// Registry entry.  Owned by the manager; only snapshot copies of `status`
/// leave it.
#[derive(Clone, Debug)]
pub struct Entity {
    pub name:         String,
    pub behavior:     EntityBehavior,
    pub status:       EntityStatus,
    pub parameters:   BehaviorParameters,
    pub request:      BehaviorRequest,
    pub memory:       BehaviorMemory,
    pub speed_change: Option<ActiveSpeedChange>,
    /// Lane-relative goals, nearest first.
    pub goals:        VecDeque<LaneletPose>,
    /// Trajectory preview from the latest tick.
    pub waypoints:    Vec<Point>,
    pub obstacle:     Option<Obstacle>,
    pub node_status:  NodeStatus,
    /// Every entity's status as last distributed by the manager.
    pub others:       Arc<StatusSnapshot>,
}

/// Inputs shared by every entity during one behavior phase.
pub(crate) struct TickEnv<'a> {
    pub graph:             &'a dyn LaneGraph,
    pub traffic_lights:    &'a TrafficLights,
    pub current_time:      f64,
    pub step_time:         f64,
    pub npc_logic_started: bool,
}

/// Everything one entity's behavior phase produces.  Applied in the commit
/// phase; nothing here aliases manager state.
pub(crate) struct EntityStep {
    pub status:       EntityStatus,
    pub waypoints:    Vec<Point>,
    pub obstacle:     Option<Obstacle>,
    pub node_status:  NodeStatus,
    pub memory:       BehaviorMemory,
    pub request:      BehaviorRequest,
    pub speed_change: Option<ActiveSpeedChange>,
}

impl Entity {
    pub fn new(name: String, status: EntityStatus, parameters: BehaviorParameters) -> Self {
        Self {
            behavior: EntityBehavior::for_type(status.entity_type),
            name,
            status,
            parameters,
            request: BehaviorRequest::None,
            memory: BehaviorMemory::default(),
            speed_change: None,
            goals: VecDeque::new(),
            waypoints: Vec::new(),
            obstacle: None,
            node_status: NodeStatus::Idle,
            others: Arc::new(StatusSnapshot::new()),
        }
    }

    /// Lanelets the entity intends to drive, starting with its current one:
    /// the route to its next goal if one is reachable, else straight ahead.
    pub fn route_lanelets(&self, graph: &dyn LaneGraph) -> Vec<LaneletId> {
        let Some(lp) = self.status.lanelet_pose else {
            return Vec::new();
        };
        if let Some(goal) = self.goals.front() {
            if let Some(mut route) = graph.route(lp.lanelet_id, goal.lanelet_id) {
                if let Some(&last) = route.last() {
                    route.extend(graph.following_lanelets(last, ROUTE_LOOKAHEAD).into_iter().skip(1));
                }
                return route;
            }
        }
        graph.following_lanelets(lp.lanelet_id, lp.s + ROUTE_LOOKAHEAD)
    }

    /// `true` if the entity sits on or just past `goal`.
    pub fn reached(&self, graph: &dyn LaneGraph, goal: &LaneletPose) -> bool {
        if let Some(lp) = self.status.lanelet_pose {
            if lp.lanelet_id == goal.lanelet_id && lp.s + GOAL_TOLERANCE >= goal.s {
                return true;
            }
        }
        graph
            .to_map_pose(goal)
            .is_some_and(|pose| pose.position.distance_2d(self.status.pose.position) < GOAL_TOLERANCE)
    }

    /// Run this entity's behavior for one step against its `others` view.
    pub(crate) fn step(&self, env: &TickEnv<'_>) -> EntityStep {
        let next_time = env.current_time + env.step_time;

        if !env.npc_logic_started && !self.status.entity_type.is_ego() {
            let mut status = self.status.clone();
            status.time = next_time;
            status.action = ActionKind::Hold;
            return EntityStep {
                status,
                waypoints:    Vec::new(),
                obstacle:     None,
                node_status:  NodeStatus::Idle,
                memory:       self.memory.clone(),
                request:      self.request.clone(),
                speed_change: self.speed_change.clone(),
            };
        }

        let mut speed_change = self.speed_change.clone();
        let mut status = self.status.clone();
        let mut parameters = self.parameters.clone();
        let resolved = speed_change.as_mut().and_then(|active| {
            active.resolve(&self.name, status.speed(), &parameters.dynamic_constraints, &self.others)
        });
        if let Some(resolved) = &resolved {
            if let Some(speed) = resolved.jump_to {
                status.twist.linear = speed;
            }
            if let Some(constraints) = resolved.constraints {
                parameters.dynamic_constraints = constraints;
            }
        }

        let route = self.route_lanelets(env.graph);
        let ctx = BehaviorContext {
            current_time:   env.current_time,
            step_time:      env.step_time,
            name:           &self.name,
            status:         &status,
            others:         &self.others,
            graph:          env.graph,
            traffic_lights: env.traffic_lights,
            request:        &self.request,
            target_speed:   resolved.map(|r| r.target),
            route_lanelets: &route,
            parameters:     &parameters,
            memory:         &self.memory,
        };
        let outcome = self.behavior.tick(&ctx);

        if let (Some(active), Some(resolved)) = (&speed_change, &resolved) {
            if active.is_complete(outcome.status.speed(), resolved.target) {
                speed_change = None;
            }
        }

        EntityStep {
            status:       outcome.status,
            waypoints:    outcome.waypoints,
            obstacle:     outcome.obstacle,
            node_status:  outcome.node_status,
            memory:       outcome.memory,
            request:      outcome.request,
            speed_change,
        }
    }
}
