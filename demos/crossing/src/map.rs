//! Lane map for the crossing scenario.
//!
//! A two-lane main road running east, crossed at x = 90 by a priority road
//! running north, with a signalised pedestrian crossing at x = 75.

use tsim_core::{LaneletId, Point, TrafficLightId};
use tsim_spatial::{LaneChangeDirection, LaneletMap, LaneletMapBuilder, SpatialResult};

pub const MAIN_WEST:   LaneletId = LaneletId(1);
pub const MAIN_CENTER: LaneletId = LaneletId(2);
pub const MAIN_EAST:   LaneletId = LaneletId(3);
pub const PASSING:     LaneletId = LaneletId(4);
pub const CROSSWALK:   LaneletId = LaneletId(10);
pub const NORTHBOUND:  LaneletId = LaneletId(20);

pub const SIGNAL: TrafficLightId = TrafficLightId(100);

/// Lane width, metres.
const WIDTH: f64 = 3.5;

pub fn build_map() -> SpatialResult<LaneletMap> {
    let mut b = LaneletMapBuilder::new();

    b.add_lanelet(MAIN_WEST,   vec![Point::xy(0.0, 0.0),   Point::xy(50.0, 0.0)],  WIDTH)?;
    b.add_lanelet(MAIN_CENTER, vec![Point::xy(50.0, 0.0),  Point::xy(100.0, 0.0)], WIDTH)?;
    b.add_lanelet(MAIN_EAST,   vec![Point::xy(100.0, 0.0), Point::xy(200.0, 0.0)], WIDTH)?;
    b.add_lanelet(PASSING,     vec![Point::xy(0.0, 3.5),   Point::xy(50.0, 3.5)],  WIDTH)?;
    b.add_lanelet(NORTHBOUND,  vec![Point::xy(90.0, -60.0), Point::xy(90.0, 60.0)], WIDTH)?;
    b.add_crosswalk(CROSSWALK, vec![Point::xy(75.0, -6.0), Point::xy(75.0, 6.0)], 3.0)?;

    b.connect(MAIN_WEST, MAIN_CENTER)?;
    b.connect(MAIN_CENTER, MAIN_EAST)?;
    b.connect(PASSING, MAIN_CENTER)?;
    b.set_neighbor(MAIN_WEST, LaneChangeDirection::Left, PASSING)?;
    b.set_neighbor(PASSING, LaneChangeDirection::Right, MAIN_WEST)?;

    b.add_conflict(MAIN_CENTER, CROSSWALK)?;
    b.add_conflict(MAIN_CENTER, NORTHBOUND)?;
    b.add_right_of_way(MAIN_CENTER, NORTHBOUND)?;
    b.add_stop_line(MAIN_CENTER, 20.0, Some(SIGNAL))?;

    Ok(b.build())
}
