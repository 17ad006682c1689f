//! `aerosim-sensors` – sensor plugins that turn host measurements into
//! published records.
//!
//! # Modules
//!
//! - [`params`] – [`PluginParams`]: the string key/value block a scene file
//!   hands to a plugin, with typed lookups.
//! - [`noise`] – [`VelocityNoise`]: per-axis zero-mean Gaussian noise.
//! - [`channels`] – lazy creation of a plugin's publication channels and
//!   their announcement to the topic bridge.
//! - [`gps`] – [`GpsPlugin`]: the noisy GPS sampler publishing a navigation
//!   fix and a ground-speed twist on every sensor update.

pub mod channels;
pub mod gps;
pub mod noise;
pub mod params;

pub use channels::{ChannelSet, Channels, create_channels_and_register};
pub use gps::{GpsContext, GpsPlugin, GpsPluginConfig};
pub use noise::VelocityNoise;
pub use params::PluginParams;
