//! Occupancy grid sensor mounted on an entity.

use tracing::debug;

use tsim_core::StatusSnapshot;

use crate::{BoxPrimitive, OccupancyGrid, OccupancyGridBuilder, SensorError, SensorResult};

/// Tolerance when comparing elapsed time against the update period, seconds.
const TIME_EPSILON: f64 = 1e-9;

/// Configuration of one occupancy grid sensor.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OccupancyGridSensorConfig {
    /// Name of the entity carrying the sensor.
    pub entity: String,

    /// Metres per cell.
    pub resolution: f64,

    pub height: usize,
    pub width:  usize,

    pub occupied_cost:  i8,
    pub invisible_cost: i8,

    /// Entities farther than this from the sensor are not rasterized,
    /// metres.
    pub range: f64,

    /// Seconds between two published frames.
    pub update_duration: f64,
}

impl OccupancyGridSensorConfig {
    /// A 100 m × 100 m grid at 0.5 m resolution publishing at 10 Hz.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity:          entity.into(),
            resolution:      0.5,
            height:          200,
            width:           200,
            occupied_cost:   100,
            invisible_cost:  50,
            range:           300.0,
            update_duration: 0.1,
        }
    }

    pub fn validate(&self) -> SensorResult<()> {
        if self.entity.is_empty() {
            return Err(SensorError::InvalidConfig("sensor entity name is empty".into()));
        }
        if !(self.range > 0.0) {
            return Err(SensorError::InvalidConfig(format!("range must be positive, got {}", self.range)));
        }
        if !(self.update_duration >= 0.0) {
            return Err(SensorError::InvalidConfig(format!(
                "update_duration must be non-negative, got {}",
                self.update_duration
            )));
        }
        Ok(())
    }
}

/// Builds a grid around its entity from the other entities' bounding boxes.
#[derive(Clone, Debug)]
pub struct OccupancyGridSensor {
    config:      OccupancyGridSensorConfig,
    builder:     OccupancyGridBuilder,
    last_update: Option<f64>,
}

impl OccupancyGridSensor {
    pub fn new(config: OccupancyGridSensorConfig) -> SensorResult<Self> {
        config.validate()?;
        let builder = OccupancyGridBuilder::new(
            config.resolution,
            config.height,
            config.width,
            config.occupied_cost,
            config.invisible_cost,
        )?;
        Ok(Self { config, builder, last_update: None })
    }

    #[inline]
    pub fn config(&self) -> &OccupancyGridSensorConfig {
        &self.config
    }

    #[inline]
    pub fn entity(&self) -> &str {
        &self.config.entity
    }

    /// `true` if a frame should be published at `current_time`.
    pub fn is_due(&self, current_time: f64) -> bool {
        match self.last_update {
            None => true,
            Some(last) => current_time - last + TIME_EPSILON >= self.config.update_duration,
        }
    }

    /// Publish a frame if one is due and the carrying entity exists.
    pub fn update(
        &mut self,
        current_time: f64,
        snapshot:     &StatusSnapshot,
    ) -> SensorResult<Option<OccupancyGrid>> {
        let grid = self.scan(current_time, snapshot)?;
        if grid.is_some() {
            self.mark_published(current_time);
        }
        Ok(grid)
    }

    /// Build the frame [`update`](Self::update) would publish without
    /// recording it, so a failed step leaves the update period untouched.
    pub fn scan(
        &mut self,
        current_time: f64,
        snapshot:     &StatusSnapshot,
    ) -> SensorResult<Option<OccupancyGrid>> {
        if !self.is_due(current_time) {
            return Ok(None);
        }
        let Some(own) = snapshot.get(&self.config.entity) else {
            return Ok(None);
        };

        let origin = own.pose;
        self.builder.reset(origin);
        for (name, status) in snapshot {
            if *name == self.config.entity
                || status.pose.position.distance_2d(origin.position) > self.config.range
            {
                continue;
            }
            self.builder.add(&BoxPrimitive::new(status.pose, status.bounding_box))?;
        }
        let grid = self.builder.build();
        debug!(
            entity = %self.config.entity,
            time = current_time,
            primitives = self.builder.primitive_count(),
            "occupancy grid built"
        );
        Ok(Some(grid))
    }

    /// Restart the update period at `current_time`.
    #[inline]
    pub fn mark_published(&mut self, current_time: f64) {
        self.last_update = Some(current_time);
    }
}
