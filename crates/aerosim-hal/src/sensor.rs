//! Generic `GpsSensor` trait and the update-event signal behind it.
//!
//! A host sensor produces a new measurement on its own schedule and then
//! notifies every connected [`UpdateHandler`], handing it a read-only view of
//! itself.  Plugins attach at load time with
//! [`GpsSensor::connect_updated`] and detach at teardown with
//! [`GpsSensor::disconnect_updated`].

use aerosim_types::SimTime;

/// Callback invoked once per sensor update with the updated sensor.
pub type UpdateHandler = Box<dyn FnMut(&dyn GpsSensor) + Send>;

/// Handle identifying one connected [`UpdateHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// A simulated satellite-navigation receiver.
pub trait GpsSensor {
    /// Stable identifier for this sensor, e.g. `"gps"`.
    fn name(&self) -> &str;

    /// Name of the world the sensor lives in.
    fn world_name(&self) -> &str;

    /// Latitude of the last measurement, degrees.
    fn latitude_deg(&self) -> f64;

    /// Longitude of the last measurement, degrees.
    fn longitude_deg(&self) -> f64;

    /// Altitude of the last measurement, metres above the WGS84 ellipsoid.
    fn altitude(&self) -> f64;

    /// Simulation time at which the last measurement was taken.
    fn last_measurement_time(&self) -> SimTime;

    fn is_active(&self) -> bool;

    /// Inactive sensors take no measurements and fire no update events.
    fn set_active(&mut self, active: bool);

    /// Attach `handler` to the update event.
    fn connect_updated(&mut self, handler: UpdateHandler) -> ConnectionId;

    /// Detach a handler.  Returns `false` if `id` was not connected.
    fn disconnect_updated(&mut self, id: ConnectionId) -> bool;
}

/// Ordered list of connected update handlers.
#[derive(Default)]
pub struct UpdateSignal {
    next_id: u64,
    slots: Vec<(ConnectionId, UpdateHandler)>,
}

impl UpdateSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, handler: UpdateHandler) -> ConnectionId {
        let id = ConnectionId(self.next_id);
        self.next_id += 1;
        self.slots.push((id, handler));
        id
    }

    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        let before = self.slots.len();
        self.slots.retain(|(slot, _)| *slot != id);
        self.slots.len() != before
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Invoke every handler, in connection order, with `sensor`.
    pub fn fire(&mut self, sensor: &dyn GpsSensor) {
        for (_, handler) in &mut self.slots {
            handler(sensor);
        }
    }
}

impl std::fmt::Debug for UpdateSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateSignal")
            .field("connections", &self.slots.len())
            .finish()
    }
}
