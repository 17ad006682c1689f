//! `aerosim-middleware` – the simulator's message plumbing.
//!
//! Routes sensor records between plugins and whoever listens, without caring
//! about what the records mean.
//!
//! # Modules
//!
//! - [`bus`] – namespaced, typed, topic-based publish/subscribe transport
//!   built on Tokio broadcast channels.
//! - [`bridge`] – consumer of bridge-registration records that mirrors the
//!   announced topics as JSON frames for an external middleware.

pub mod bridge;
pub mod bus;

pub use bridge::{BridgedFrame, TopicBridge};
pub use bus::{Publisher, REGISTRATION_SUBTOPIC, Subscriber, TransportHub, TransportNode};
