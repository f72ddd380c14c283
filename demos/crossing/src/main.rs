//! crossing — a signalised crossing with a priority road.
//!
//! An ego car drives the passing lane in the world frame while NPC cars
//! follow the main road, queue at a red light, wait for a pedestrian on the
//! crosswalk and yield to traffic on the priority road.  The ego carries an
//! occupancy grid sensor.
//!
//! Set `RUST_LOG=debug` to watch individual behavior decisions, or pass
//! `--verbose` for per-step timing.

mod map;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tsim_behavior::BehaviorParameters;
use tsim_core::{
    BoundingBox, EntityStatus, EntityType, LaneletPose, ObstacleKind, Point, Pose, SimConfig,
    TrafficLightColor,
};
use tsim_engine::{
    EntityManager, EntityManagerBuilder, SimObserver, SpeedChangeRequest, TickRecord,
};
use tsim_sensor::OccupancyGridSensorConfig;

use map::{build_map, MAIN_CENTER, MAIN_WEST, NORTHBOUND, PASSING, SIGNAL};

// ── Constants ─────────────────────────────────────────────────────────────────

const STEP_TIME:   f64 = 0.05;
const RED_STEPS:   u64 = 160; // 8 s of red
const GREEN_STEPS: u64 = 400; // 20 s of green

// ── Observer ──────────────────────────────────────────────────────────────────

/// Counts stop decisions and occupancy frames.
#[derive(Default)]
struct CrossingObserver {
    ticks:           usize,
    stop_line_stops: usize,
    crosswalk_stops: usize,
    entity_stops:    usize,
    grids:           usize,
    occupied_cells:  usize,
}

impl SimObserver for CrossingObserver {
    fn on_tick_end(&mut self, record: &TickRecord) {
        self.ticks += 1;
        for entity in &record.entities {
            match entity.obstacle.map(|o| o.kind) {
                Some(ObstacleKind::StopLine)  => self.stop_line_stops += 1,
                Some(ObstacleKind::Crosswalk) => self.crosswalk_stops += 1,
                Some(ObstacleKind::Entity)    => self.entity_stops += 1,
                None => {}
            }
        }
        for (_, grid) in &record.grids {
            self.grids += 1;
            self.occupied_cells += grid.count(100);
        }
    }

    fn on_sim_end(&mut self, final_time: f64) {
        info!(final_time, ticks = self.ticks, "run finished");
    }
}

// ── Scenario ──────────────────────────────────────────────────────────────────

fn car() -> BoundingBox {
    BoundingBox::centered(4.5, 1.9, 1.5)
}

fn spawn_npcs(manager: &mut EntityManager) -> Result<()> {
    for (name, s) in [("npc_lead", 30.0), ("npc_follow", 10.0)] {
        manager.spawn_on_lane(
            name,
            EntityType::Vehicle,
            LaneletPose::new(MAIN_WEST, s, 0.0),
            car(),
            BehaviorParameters::vehicle(),
        )?;
        manager.request_speed_change(name, SpeedChangeRequest::absolute(11.0))?;
    }

    manager.spawn_on_lane(
        "npc_cross",
        EntityType::Vehicle,
        LaneletPose::new(NORTHBOUND, 0.0, 0.0),
        car(),
        BehaviorParameters::vehicle(),
    )?;
    manager.request_speed_change("npc_cross", SpeedChangeRequest::absolute(8.0))?;

    manager.spawn(
        "walker",
        EntityType::Pedestrian,
        EntityStatus::new(
            EntityType::Pedestrian,
            Pose::new(Point::xy(75.0, -5.0), std::f64::consts::FRAC_PI_2),
            BoundingBox::centered(0.5, 0.5, 1.8),
        ),
        BehaviorParameters::pedestrian(),
    )?;
    manager.request_speed_change("walker", SpeedChangeRequest::absolute(1.2))?;
    Ok(())
}

fn spawn_ego(manager: &mut EntityManager) -> Result<()> {
    let pose = manager
        .lane_graph()
        .to_map_pose(&LaneletPose::new(PASSING, 5.0, 0.0))
        .ok_or_else(|| anyhow::anyhow!("passing lane missing from map"))?;
    manager.spawn(
        "ego",
        EntityType::Ego,
        EntityStatus::new(EntityType::Ego, pose, car()),
        BehaviorParameters::vehicle(),
    )?;
    // ego requests are only accepted before the first step
    manager.request_speed_change("ego", SpeedChangeRequest::absolute(6.0))?;
    Ok(())
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    println!("=== crossing — tsim traffic simulation ===");

    let map = build_map()?;
    println!("Lane map: {} lanelets", map.lanelet_count());

    let config = SimConfig { step_time: STEP_TIME, ..SimConfig::default() };
    let mut manager = EntityManagerBuilder::new(Arc::new(map))
        .config(config)
        .sensor(OccupancyGridSensorConfig::new("ego"))
        .build()?;

    spawn_ego(&mut manager)?;
    spawn_npcs(&mut manager)?;
    manager.request_acquire_position("npc_lead", LaneletPose::new(MAIN_CENTER, 45.0, 0.0))?;
    manager.set_traffic_light_color(SIGNAL, TrafficLightColor::Red);
    manager.set_verbose(std::env::args().any(|arg| arg == "--verbose"));
    manager.start_npc_logic();
    println!("Entities: {}", manager.entity_names().join(", "));
    println!();

    let mut observer = CrossingObserver::default();
    let t0 = Instant::now();

    manager.run_steps(RED_STEPS, &mut observer)?;
    println!(
        "t = {:>5.2} s  light turns green; npc_lead is {:.1} m from the stop line",
        manager.clock().current_time,
        manager.distance_to_stop_line("npc_lead", MAIN_CENTER)?.unwrap_or(f64::NAN),
    );
    manager.set_traffic_light_color(SIGNAL, TrafficLightColor::Green);
    manager.run_steps(GREEN_STEPS, &mut observer)?;

    let elapsed = t0.elapsed();
    println!("Simulation complete in {:.3} s", elapsed.as_secs_f64());
    println!(
        "  stop-line ticks: {}  crosswalk ticks: {}  entity ticks: {}",
        observer.stop_line_stops, observer.crosswalk_stops, observer.entity_stops
    );
    println!(
        "  occupancy frames: {}  occupied cells: {}",
        observer.grids, observer.occupied_cells
    );
    println!();

    println!("{:<12} {:<18} {:>8} {:>8} {:>7}  {:<10}", "Entity", "Action", "x", "y", "v", "Lanelet");
    println!("{}", "-".repeat(70));
    for name in manager.entity_names() {
        let status = manager.entity_status(&name)?;
        let lanelet = status
            .lanelet_pose
            .map_or_else(|| "-".to_string(), |lp| format!("{} s={:.1}", lp.lanelet_id.raw(), lp.s));
        println!(
            "{:<12} {:<18} {:>8.2} {:>8.2} {:>7.2}  {:<10}",
            name,
            status.action.as_str(),
            status.pose.position.x,
            status.pose.position.y,
            status.speed(),
            lanelet,
        );
    }

    let names = manager.entity_names();
    for (i, a) in names.iter().enumerate() {
        for b in &names[i + 1..] {
            if manager.check_collision(a, b)? {
                println!("collision: {a} / {b}");
            }
        }
    }

    Ok(())
}
