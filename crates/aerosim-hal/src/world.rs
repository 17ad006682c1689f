//! Generic `World` trait: what a plugin may ask of the simulated world.

use std::sync::Arc;

use aerosim_types::SimTime;

use crate::link::Link;

pub trait World {
    fn name(&self) -> &str;

    /// Current simulation time.
    fn sim_time(&self) -> SimTime;

    /// Resolve a link by its world-unique name.
    fn link_by_name(&self, name: &str) -> Option<Arc<dyn Link>>;
}
