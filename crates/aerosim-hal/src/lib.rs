//! `aerosim-hal` – the simulator host as seen by sensor plugins.
//!
//! Plugins never reach into the physics engine directly.  They receive a
//! [`GpsSensor`] and a [`World`] and only ever talk to those traits, so the
//! same plugin runs against the in-process simulation here or any other host
//! that implements them.
//!
//! # Modules
//!
//! - [`link`] – [`Link`] trait for rigid bodies and the [`SimLink`] stub.
//! - [`world`] – [`World`] trait: simulation clock and link lookup.
//! - [`sensor`] – [`GpsSensor`] trait and the [`UpdateSignal`] behind its
//!   update-event subscription.
//! - [`spherical`] – WGS84 conversion from local world coordinates to
//!   latitude/longitude/altitude.
//! - [`sim`] – [`SimWorld`] and [`SimGpsSensor`]: a headless fixed-step
//!   simulation for tests and the CLI.

pub mod link;
pub mod sensor;
pub mod sim;
pub mod spherical;
pub mod world;

pub use link::{Link, SimLink};
pub use sensor::{ConnectionId, GpsSensor, UpdateHandler, UpdateSignal};
pub use sim::{SimGpsSensor, SimWorld, SimWorldBuilder, WorldState};
pub use spherical::{Geodetic, SphericalCoordinates};
pub use world::World;
