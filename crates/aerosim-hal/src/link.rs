//! Generic `Link` trait for the rigid bodies a sensor can be attached to.

use std::sync::{PoisonError, RwLock};

use nalgebra::Vector3;

/// A rigid body in the simulated world.
///
/// Every link has a stable, world-unique name (usually
/// `"<model>/<link>"`) so plugins can look it up through
/// [`World::link_by_name`][crate::world::World::link_by_name].
pub trait Link: Send + Sync {
    /// World-unique name, e.g. `"firefly/base_link"`.
    fn name(&self) -> &str;

    /// Position of the link origin in the world frame, metres.
    fn world_position(&self) -> Vector3<f64>;

    /// Linear velocity of the link origin in the world frame, m/s.
    fn world_linear_vel(&self) -> Vector3<f64>;
}

#[derive(Debug, Clone, Copy)]
struct LinkState {
    position: Vector3<f64>,
    velocity: Vector3<f64>,
}

/// A kinematic link that moves at a commanded constant velocity.
///
/// State sits behind a lock because the world integrates it while plugins
/// hold shared handles for reading.
#[derive(Debug)]
pub struct SimLink {
    name: String,
    state: RwLock<LinkState>,
}

impl SimLink {
    pub fn new(name: impl Into<String>, position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(LinkState { position, velocity }),
        }
    }

    pub fn set_velocity(&self, velocity: Vector3<f64>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).velocity = velocity;
    }

    pub fn set_position(&self, position: Vector3<f64>) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).position = position;
    }

    /// Advance the position by `dt` seconds at the current velocity.
    pub fn integrate(&self, dt: f64) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let velocity = state.velocity;
        state.position += velocity * dt;
    }

    fn snapshot(&self) -> LinkState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Link for SimLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn world_position(&self) -> Vector3<f64> {
        self.snapshot().position
    }

    fn world_linear_vel(&self) -> Vector3<f64> {
        self.snapshot().velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrate_moves_along_velocity() {
        let link = SimLink::new(
            "firefly/base_link",
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(2.0, -1.0, 0.5),
        );
        link.integrate(0.5);
        assert_eq!(link.world_position(), Vector3::new(2.0, -0.5, 0.25));
        assert_eq!(link.world_linear_vel(), Vector3::new(2.0, -1.0, 0.5));
    }

    #[test]
    fn set_velocity_and_position() {
        let link = SimLink::new("l", Vector3::zeros(), Vector3::zeros());
        link.set_velocity(Vector3::new(0.0, 3.0, 0.0));
        link.set_position(Vector3::new(5.0, 5.0, 5.0));
        link.integrate(1.0);
        assert_eq!(link.world_position(), Vector3::new(5.0, 8.0, 5.0));
        assert_eq!(link.name(), "l");
    }
}
