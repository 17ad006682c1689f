//! Wire records exchanged over the simulator transport.
//!
//! Field layout follows the navigation-satellite fix and stamped twist
//! records that external robotics middleware expects, so a bridge can mirror
//! them one-to-one.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::time::SimTime;

// ────────────────────────────────────────────────────────────────────────────
// Common
// ────────────────────────────────────────────────────────────────────────────

/// Frame identifier and measurement time shared by every stamped record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub frame_id: String,
    pub stamp: SimTime,
}

/// Plain 3-component vector as it appears on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Navigation satellite fix
// ────────────────────────────────────────────────────────────────────────────

/// Satellite constellation that produced a fix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ServiceType {
    #[default]
    Gps = 1,
    Glonass = 2,
    Compass = 4,
    Galileo = 8,
}

/// Quality of a fix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i8)]
pub enum FixStatus {
    #[default]
    NoFix = -1,
    Fix = 0,
    SbasFix = 1,
    GbasFix = 2,
}

/// How much of [`NavSatFix::position_covariance`] is meaningful.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum CovarianceType {
    #[default]
    Unknown = 0,
    Approximated = 1,
    DiagonalKnown = 2,
    Known = 3,
}

/// Geodetic position fix.
///
/// `position_covariance` is a row-major 3×3 matrix in m² over the local
/// east/north/up axes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavSatFix {
    pub header: Header,
    pub service: ServiceType,
    pub status: FixStatus,
    pub position_covariance_type: CovarianceType,
    pub position_covariance: [f64; 9],
    /// Degrees, positive north of the equator.
    pub latitude: f64,
    /// Degrees, positive east of the prime meridian.
    pub longitude: f64,
    /// Metres above the WGS84 ellipsoid.
    pub altitude: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// Twist
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

/// Velocity record stamped with the measurement time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwistStamped {
    pub header: Header,
    pub twist: Twist,
}

// ────────────────────────────────────────────────────────────────────────────
// Bridge registration
// ────────────────────────────────────────────────────────────────────────────

/// Message-type tag carried by a [`BridgeRequest`] so the bridge knows how
/// to translate the mirrored topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MsgType {
    Actuators,
    FluidPressure,
    Imu,
    MagneticField,
    NavSatFix,
    Odometry,
    Pose,
    TwistStamped,
}

impl MsgType {
    /// Transport record kind mirrored under this tag, `None` for tags whose
    /// records this workspace does not carry.
    pub fn message_kind(&self) -> Option<MessageKind> {
        match self {
            MsgType::NavSatFix => Some(MessageKind::NavSatFix),
            MsgType::TwistStamped => Some(MessageKind::TwistStamped),
            _ => None,
        }
    }
}

/// Announces that `gazebo_topic` exists and should be mirrored onto
/// `ros_topic` in the external middleware.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub gazebo_topic: String,
    pub ros_topic: String,
    pub msgtype: MsgType,
}

// ────────────────────────────────────────────────────────────────────────────
// Transport envelope
// ────────────────────────────────────────────────────────────────────────────

/// Discriminant of a [`Message`], used by the transport to type-check
/// topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    NavSatFix,
    TwistStamped,
    BridgeRequest,
}

/// Everything that can travel over the simulator transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "msg")]
pub enum Message {
    NavSatFix(NavSatFix),
    TwistStamped(TwistStamped),
    BridgeRequest(BridgeRequest),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::NavSatFix(_) => MessageKind::NavSatFix,
            Message::TwistStamped(_) => MessageKind::TwistStamped,
            Message::BridgeRequest(_) => MessageKind::BridgeRequest,
        }
    }

    /// Stamp of the wrapped record, `None` for unstamped records.
    pub fn stamp(&self) -> Option<SimTime> {
        match self {
            Message::NavSatFix(m) => Some(m.header.stamp),
            Message::TwistStamped(m) => Some(m.header.stamp),
            Message::BridgeRequest(_) => None,
        }
    }
}

/// A record type that can be wrapped in a [`Message`].
///
/// Typed publishers are parameterised over this trait so a topic only ever
/// carries one kind of record.
pub trait Payload: Clone + Send + Sync + 'static {
    const KIND: MessageKind;

    fn into_message(self) -> Message;

    /// Unwrap `msg` if it carries this record type.
    fn from_message(msg: Message) -> Option<Self>;
}

macro_rules! impl_payload {
    ($ty:ident) => {
        impl Payload for $ty {
            const KIND: MessageKind = MessageKind::$ty;

            fn into_message(self) -> Message {
                Message::$ty(self)
            }

            fn from_message(msg: Message) -> Option<Self> {
                match msg {
                    Message::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

impl_payload!(NavSatFix);
impl_payload!(TwistStamped);
impl_payload!(BridgeRequest);
