//! Headless fixed-step simulation for tests and the CLI.
//!
//! [`SimWorld`] owns a set of kinematic [`SimLink`]s and [`SimGpsSensor`]s
//! attached to them.  Every [`step`][SimWorld::step] integrates the links,
//! advances the clock and lets each active sensor whose update period has
//! elapsed take a measurement and fire its update event.  This lets sensor
//! plugins run end-to-end without a physics engine.
//!
//! # Example
//!
//! ```rust
//! use aerosim_hal::sim::SimWorld;
//! use aerosim_hal::spherical::SphericalCoordinates;
//! use aerosim_hal::World;
//! use nalgebra::Vector3;
//!
//! let mut world = SimWorld::builder("default")
//!     .step_size(0.01)
//!     .spherical_coordinates(SphericalCoordinates::new(47.0, 8.5, 500.0, 0.0))
//!     .with_link("firefly/base_link", Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0))
//!     .with_gps("gps", "firefly/base_link", 10.0)
//!     .build()
//!     .expect("sensor link exists");
//!
//! world.step();
//! assert!(world.sim_time().as_secs_f64() > 0.0);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use aerosim_types::{SimError, SimTime};
use nalgebra::Vector3;
use tracing::trace;

use crate::link::{Link, SimLink};
use crate::sensor::{ConnectionId, GpsSensor, UpdateHandler, UpdateSignal};
use crate::spherical::{Geodetic, SphericalCoordinates};
use crate::world::World;

/// Default physics step, seconds.
const DEFAULT_STEP_SIZE: f64 = 0.001;

// ────────────────────────────────────────────────────────────────────────────
// GPS sensor
// ────────────────────────────────────────────────────────────────────────────

/// A GPS receiver rigidly attached to a [`SimLink`].
///
/// Measures the link's geodetic position without noise of its own; noise is
/// the business of whatever plugin consumes the update event.
#[derive(Debug)]
pub struct SimGpsSensor {
    name: String,
    world_name: String,
    link: Arc<SimLink>,
    spherical: SphericalCoordinates,
    update_period: SimTime,
    last_update: Option<SimTime>,
    last_measurement: SimTime,
    position: Geodetic,
    active: bool,
    updated: UpdateSignal,
}

impl SimGpsSensor {
    /// Create an inactive sensor.  An `update_rate` of zero (or less) means
    /// "every world step".
    pub fn new(
        name: impl Into<String>,
        world_name: impl Into<String>,
        link: Arc<SimLink>,
        spherical: SphericalCoordinates,
        update_rate: f64,
    ) -> Self {
        let update_period = if update_rate > 0.0 {
            SimTime::from_secs_f64(1.0 / update_rate)
        } else {
            SimTime::ZERO
        };
        let position = spherical.spherical_from_local(&link.world_position());
        Self {
            name: name.into(),
            world_name: world_name.into(),
            link,
            spherical,
            update_period,
            last_update: None,
            last_measurement: SimTime::ZERO,
            position,
            active: false,
            updated: UpdateSignal::new(),
        }
    }

    /// Name of the link the sensor is attached to.
    pub fn link_name(&self) -> &str {
        self.link.name()
    }

    /// Number of connected update handlers.
    pub fn connection_count(&self) -> usize {
        self.updated.len()
    }

    /// Take a measurement at `now` if the sensor is active and its update
    /// period has elapsed.  Returns `true` when the update event fired.
    pub fn update(&mut self, now: SimTime) -> bool {
        if !self.active {
            return false;
        }
        if let Some(last) = self.last_update
            && now - last < self.update_period
        {
            return false;
        }

        self.last_update = Some(now);
        self.last_measurement = now;
        self.position = self.spherical.spherical_from_local(&self.link.world_position());
        trace!(sensor = %self.name, time = %now, "gps measurement");

        // Handlers get a shared view of the sensor, so the signal is moved
        // out for the duration of the call.
        let mut signal = std::mem::take(&mut self.updated);
        signal.fire(self);
        self.updated = signal;
        true
    }
}

impl GpsSensor for SimGpsSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn world_name(&self) -> &str {
        &self.world_name
    }

    fn latitude_deg(&self) -> f64 {
        self.position.latitude_deg
    }

    fn longitude_deg(&self) -> f64 {
        self.position.longitude_deg
    }

    fn altitude(&self) -> f64 {
        self.position.altitude
    }

    fn last_measurement_time(&self) -> SimTime {
        self.last_measurement
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn connect_updated(&mut self, handler: UpdateHandler) -> ConnectionId {
        self.updated.connect(handler)
    }

    fn disconnect_updated(&mut self, id: ConnectionId) -> bool {
        self.updated.disconnect(id)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// World state
// ────────────────────────────────────────────────────────────────────────────

/// Clock and links of a [`SimWorld`], split out so a plugin can borrow the
/// world while holding a sensor mutably.
#[derive(Debug)]
pub struct WorldState {
    name: String,
    sim_time: SimTime,
    step_size: f64,
    links: HashMap<String, Arc<SimLink>>,
}

impl WorldState {
    /// Concrete handle on a link, for callers that need to drive it.
    pub fn sim_link(&self, name: &str) -> Option<Arc<SimLink>> {
        self.links.get(name).cloned()
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }
}

impl World for WorldState {
    fn name(&self) -> &str {
        &self.name
    }

    fn sim_time(&self) -> SimTime {
        self.sim_time
    }

    fn link_by_name(&self, name: &str) -> Option<Arc<dyn Link>> {
        self.links
            .get(name)
            .map(|link| Arc::clone(link) as Arc<dyn Link>)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimWorld
// ────────────────────────────────────────────────────────────────────────────

/// A fixed-step world of kinematic links and GPS sensors.
#[derive(Debug)]
pub struct SimWorld {
    state: WorldState,
    sensors: Vec<SimGpsSensor>,
}

impl SimWorld {
    pub fn builder(name: impl Into<String>) -> SimWorldBuilder {
        SimWorldBuilder::new(name)
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn sensors(&self) -> &[SimGpsSensor] {
        &self.sensors
    }

    pub fn sensor(&self, name: &str) -> Option<&SimGpsSensor> {
        self.sensors.iter().find(|s| s.name == name)
    }

    /// Borrow one sensor mutably together with the rest of the world.
    pub fn sensor_and_state(&mut self, name: &str) -> Option<(&mut SimGpsSensor, &WorldState)> {
        let sensor = self.sensors.iter_mut().find(|s| s.name == name)?;
        Some((sensor, &self.state))
    }

    /// Advance the world by one step.  Returns the number of sensor update
    /// events fired.
    pub fn step(&mut self) -> usize {
        let dt = self.state.step_size;
        for link in self.state.links.values() {
            link.integrate(dt);
        }
        self.state.sim_time = self.state.sim_time + SimTime::from_secs_f64(dt);

        let now = self.state.sim_time;
        let mut fired = 0;
        for sensor in &mut self.sensors {
            if sensor.update(now) {
                fired += 1;
            }
        }
        fired
    }
}

impl World for SimWorld {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn sim_time(&self) -> SimTime {
        self.state.sim_time()
    }

    fn link_by_name(&self, name: &str) -> Option<Arc<dyn Link>> {
        self.state.link_by_name(name)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Builder
// ────────────────────────────────────────────────────────────────────────────

struct GpsMount {
    name: String,
    link: String,
    update_rate: f64,
}

/// Builder for [`SimWorld`].
///
/// Call the `with_*` methods to add links and sensors, then call
/// [`build`][Self::build].
pub struct SimWorldBuilder {
    name: String,
    step_size: f64,
    spherical: SphericalCoordinates,
    links: Vec<SimLink>,
    gps: Vec<GpsMount>,
}

impl SimWorldBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            step_size: DEFAULT_STEP_SIZE,
            spherical: SphericalCoordinates::default(),
            links: Vec::new(),
            gps: Vec::new(),
        }
    }

    pub fn step_size(mut self, seconds: f64) -> Self {
        self.step_size = seconds;
        self
    }

    pub fn spherical_coordinates(mut self, spherical: SphericalCoordinates) -> Self {
        self.spherical = spherical;
        self
    }

    /// Add a link at `position` moving at constant `velocity`.  A later link
    /// with the same name replaces an earlier one.
    pub fn with_link(
        mut self,
        name: impl Into<String>,
        position: Vector3<f64>,
        velocity: Vector3<f64>,
    ) -> Self {
        self.links.push(SimLink::new(name, position, velocity));
        self
    }

    /// Attach a GPS sensor updating at `update_rate` Hz to link `link`.
    pub fn with_gps(mut self, name: impl Into<String>, link: impl Into<String>, update_rate: f64) -> Self {
        self.gps.push(GpsMount {
            name: name.into(),
            link: link.into(),
            update_rate,
        });
        self
    }

    /// Consume the builder.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Scene`] for a non-positive step size and
    /// [`SimError::LinkNotFound`] when a sensor names a link that was never
    /// added.
    pub fn build(self) -> Result<SimWorld, SimError> {
        if !(self.step_size > 0.0) {
            return Err(SimError::Scene(format!(
                "step size must be positive, got {}",
                self.step_size
            )));
        }

        let links: HashMap<String, Arc<SimLink>> = self
            .links
            .into_iter()
            .map(|link| (link.name().to_string(), Arc::new(link)))
            .collect();

        let sensors = self
            .gps
            .into_iter()
            .map(|mount| {
                let link = links
                    .get(&mount.link)
                    .cloned()
                    .ok_or_else(|| SimError::LinkNotFound(mount.link.clone()))?;
                Ok(SimGpsSensor::new(
                    mount.name,
                    self.name.clone(),
                    link,
                    self.spherical,
                    mount.update_rate,
                ))
            })
            .collect::<Result<Vec<_>, SimError>>()?;

        Ok(SimWorld {
            state: WorldState {
                name: self.name,
                sim_time: SimTime::ZERO,
                step_size: self.step_size,
                links,
            },
            sensors,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
