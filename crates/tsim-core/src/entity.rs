//! Entity kinematic status and the types shared across the tick pipeline.

use std::collections::BTreeMap;

use crate::{Accel, BoundingBox, LaneletId, Point, Pose, Twist};

// ── EntityType ────────────────────────────────────────────────────────────────

/// The closed set of simulated entity kinds.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityType {
    /// The vehicle under test.  At most one may exist while ticking.
    Ego,
    /// NPC vehicle driven by the lane-following behavior.
    Vehicle,
    /// NPC pedestrian; may match onto crosswalk lanelets.
    Pedestrian,
}

impl EntityType {
    #[inline]
    pub fn is_ego(self) -> bool {
        matches!(self, EntityType::Ego)
    }

    /// Human-readable label used in logs and tick records.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityType::Ego        => "ego",
            EntityType::Vehicle    => "vehicle",
            EntityType::Pedestrian => "pedestrian",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── ActionKind ────────────────────────────────────────────────────────────────

/// The action node that produced an entity's latest status.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionKind {
    /// Not ticked yet.
    #[default]
    Idle,
    /// NPC logic has not been started; status is held.
    Hold,
    FollowLane,
    StopAtCrossingEntity,
    Yield,
    LaneChange,
    MoveInWorldFrame,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Idle                 => "idle",
            ActionKind::Hold                 => "hold",
            ActionKind::FollowLane           => "follow_lane",
            ActionKind::StopAtCrossingEntity => "stop_at_crossing_entity",
            ActionKind::Yield                => "yield",
            ActionKind::LaneChange           => "lane_change",
            ActionKind::MoveInWorldFrame     => "move_in_world_frame",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── LaneletPose ───────────────────────────────────────────────────────────────

/// Position expressed relative to a lanelet's centerline.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneletPose {
    pub lanelet_id: LaneletId,
    /// Arc-length along the centerline, metres from the lanelet start.
    pub s: f64,
    /// Signed lateral offset, positive to the left of travel.
    pub offset: f64,
}

impl LaneletPose {
    #[inline]
    pub fn new(lanelet_id: LaneletId, s: f64, offset: f64) -> Self {
        Self { lanelet_id, s, offset }
    }
}

// ── EntityStatus ──────────────────────────────────────────────────────────────

/// Everything other entities and external consumers may observe about one
/// entity at one instant.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityStatus {
    pub entity_type:  EntityType,
    /// Simulation time this status is valid for.
    pub time:         f64,
    pub pose:         Pose,
    pub twist:        Twist,
    pub accel:        Accel,
    pub bounding_box: BoundingBox,
    /// `None` when the entity could not be matched onto the lane graph.
    pub lanelet_pose: Option<LaneletPose>,
    pub action:       ActionKind,
}

impl EntityStatus {
    /// A stationary status at `pose` with no lane match yet.
    pub fn new(entity_type: EntityType, pose: Pose, bounding_box: BoundingBox) -> Self {
        Self {
            entity_type,
            time: 0.0,
            pose,
            twist: Twist::default(),
            accel: Accel::default(),
            bounding_box,
            lanelet_pose: None,
            action: ActionKind::Idle,
        }
    }

    /// Builder-style helper to set the initial twist.
    pub fn with_twist(mut self, twist: Twist) -> Self {
        self.twist = twist;
        self
    }

    /// Longitudinal speed in m/s.
    #[inline]
    pub fn speed(&self) -> f64 {
        self.twist.linear
    }

    #[inline]
    pub fn lanelet_pose_valid(&self) -> bool {
        self.lanelet_pose.is_some()
    }

    /// Map-frame footprint of the bounding box.
    #[inline]
    pub fn footprint(&self) -> [Point; 4] {
        self.bounding_box.corners_2d(&self.pose)
    }
}

/// Name-keyed, sorted view of every entity's status at one instant.
///
/// A `BTreeMap` keeps iteration order independent of registration order.
pub type StatusSnapshot = BTreeMap<String, EntityStatus>;

// ── Obstacle ──────────────────────────────────────────────────────────────────

/// What an entity is stopping for.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ObstacleKind {
    Entity,
    StopLine,
    Crosswalk,
}

/// Marker for the stop target along an entity's trajectory preview.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Obstacle {
    pub kind: ObstacleKind,
    /// Arc-length along the preview, metres from the entity.
    pub s:    f64,
}
