//! `aerosim-types` – shared vocabulary of the aerosim workspace.
//!
//! Holds the wire records that sensor plugins publish, the simulation clock
//! value used to stamp them, and the [`SimError`] enum returned by every
//! fallible call in the workspace.
//!
//! # Modules
//!
//! - [`msgs`] – navigation-fix, twist and bridge-registration records plus the
//!   [`Message`] transport envelope.
//! - [`time`] – [`SimTime`], the `(sec, nsec)` simulation clock value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod msgs;
pub mod time;

pub use msgs::{
    BridgeRequest, CovarianceType, FixStatus, Header, Message, MessageKind, MsgType, NavSatFix,
    Payload, ServiceType, Twist, TwistStamped, Vector3,
};
pub use time::SimTime;

/// Error type spanning plugin configuration, transport and scene loading.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimError {
    #[error("missing required parameter `{0}`")]
    MissingParameter(String),

    #[error("invalid value for parameter `{key}`: {details}")]
    InvalidParameter { key: String, details: String },

    #[error("couldn't find specified link \"{0}\"")]
    LinkNotFound(String),

    #[error("noise model error: {0}")]
    Noise(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("scene error: {0}")]
    Scene(String),

    /// The async runtime or one of its tasks failed.
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl SimError {
    /// `true` for the errors that stop a plugin from ever loading: a missing
    /// or malformed parameter, an unresolvable link, or an unusable noise
    /// model.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SimError::MissingParameter(_)
                | SimError::InvalidParameter { .. }
                | SimError::LinkNotFound(_)
                | SimError::Noise(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_error_display() {
        let err = SimError::LinkNotFound("firefly/gps_link".to_string());
        assert_eq!(
            err.to_string(),
            "couldn't find specified link \"firefly/gps_link\""
        );

        let err = SimError::InvalidParameter {
            key: "horVelStdDev".to_string(),
            details: "must not be negative".to_string(),
        };
        assert!(err.to_string().contains("horVelStdDev"));
    }

    #[test]
    fn configuration_errors_are_classified() {
        assert!(SimError::MissingParameter("linkName".into()).is_configuration());
        assert!(SimError::LinkNotFound("x".into()).is_configuration());
        assert!(SimError::Noise("bad sigma".into()).is_configuration());
        assert!(!SimError::Transport("closed".into()).is_configuration());
        assert!(!SimError::Scene("bad toml".into()).is_configuration());
        assert!(!SimError::Runtime("task panicked".into()).is_configuration());
    }

    #[test]
    fn runtime_errors_are_not_transport_errors() {
        let err = SimError::Runtime("frame printer failed: task panicked".to_string());
        assert_eq!(err.to_string(), "runtime error: frame printer failed: task panicked");
        assert!(!matches!(err, SimError::Transport(_)));
    }

    #[test]
    fn sim_error_serialization_roundtrip() {
        let err = SimError::MissingParameter("robotNamespace".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: SimError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
