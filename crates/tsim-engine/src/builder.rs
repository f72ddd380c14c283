//! Fluent builder for constructing an [`EntityManager`].

use std::sync::Arc;

use tracing::info;

use tsim_core::{SimConfig, TrafficLights};
use tsim_sensor::{OccupancyGridSensor, OccupancyGridSensorConfig};
use tsim_spatial::LaneGraph;

use crate::{EngineResult, EntityManager};

/// Fluent builder for [`EntityManager`].
///
/// # Required inputs
///
/// - `Arc<dyn LaneGraph>`, usually a [`tsim_spatial::LaneletMap`]
///
/// # Optional inputs (have defaults)
///
/// | Method                 | Default                         |
/// |------------------------|---------------------------------|
/// | `.config(c)`           | `SimConfig::default()`          |
/// | `.traffic_lights(t)`   | every light `Unknown`           |
/// | `.sensor(c)`           | no sensors                      |
///
/// # Example
///
/// ```rust,ignore
/// let map = Arc::new(builder.build());
/// let mut manager = EntityManagerBuilder::new(map)
///     .config(SimConfig { step_time: 0.1, ..SimConfig::default() })
///     .build()?;
/// manager.run_steps(100, &mut NoopObserver)?;
/// ```
pub struct EntityManagerBuilder {
    graph:          Arc<dyn LaneGraph>,
    config:         SimConfig,
    traffic_lights: TrafficLights,
    sensors:        Vec<OccupancyGridSensorConfig>,
}

impl EntityManagerBuilder {
    pub fn new(graph: Arc<dyn LaneGraph>) -> Self {
        Self {
            graph,
            config:         SimConfig::default(),
            traffic_lights: TrafficLights::new(),
            sensors:        Vec::new(),
        }
    }

    pub fn config(mut self, config: SimConfig) -> Self {
        self.config = config;
        self
    }

    pub fn traffic_lights(mut self, traffic_lights: TrafficLights) -> Self {
        self.traffic_lights = traffic_lights;
        self
    }

    /// Attach an occupancy grid sensor to the entity named in `config`.
    /// The entity may be spawned later.
    pub fn sensor(mut self, config: OccupancyGridSensorConfig) -> Self {
        self.sensors.push(config);
        self
    }

    /// Validate the configuration, set up the worker pool if a thread count
    /// was given, and return an empty manager at time zero.
    pub fn build(self) -> EngineResult<EntityManager> {
        self.config.validate()?;
        let sensors = self
            .sensors
            .into_iter()
            .map(OccupancyGridSensor::new)
            .collect::<Result<Vec<_>, _>>()?;

        #[cfg(feature = "parallel")]
        let pool = match self.config.num_threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| crate::EngineError::Config(e.to_string()))?,
            ),
            None => None,
        };

        info!(
            step_time = self.config.step_time,
            sensors = sensors.len(),
            "entity manager ready"
        );

        Ok(EntityManager {
            clock:             self.config.make_clock(),
            config:            self.config,
            graph:             self.graph,
            entities:          Default::default(),
            traffic_lights:    self.traffic_lights,
            sensors,
            current_time:      0.0,
            step_time:         0.0,
            npc_logic_started: false,
            #[cfg(feature = "parallel")]
            pool,
        })
    }
}
