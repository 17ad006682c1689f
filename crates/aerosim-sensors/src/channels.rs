//! Lazy creation and bridge registration of a sensor's output channels.
//!
//! Publication channels are not opened when a plugin loads but on its first
//! sensor update: the bridge registration path has to exist before a topic
//! is advertised.  [`Channels`] models that as an explicit
//! `Uninitialized -> Ready` transition taken exactly once.

use aerosim_middleware::{Publisher, REGISTRATION_SUBTOPIC, TransportNode};
use aerosim_types::{BridgeRequest, MsgType, NavSatFix, TwistStamped};
use tracing::info;

/// Open publication channels of a GPS plugin.
#[derive(Debug)]
pub struct ChannelSet {
    pub gps: Publisher<NavSatFix>,
    pub ground_speed: Publisher<TwistStamped>,
}

/// Whether the publication channels exist yet.
#[derive(Debug, Default)]
pub enum Channels {
    #[default]
    Uninitialized,
    Ready(ChannelSet),
}

impl Channels {
    pub fn is_ready(&self) -> bool {
        matches!(self, Channels::Ready(_))
    }

    /// Take the `Uninitialized -> Ready` transition if it has not happened
    /// yet.  Returns `true` when the channels were created by this call.
    pub fn ensure_ready(&mut self, node: &TransportNode, gps_topic: &str, ground_speed_topic: &str) -> bool {
        if self.is_ready() {
            return false;
        }
        *self = Channels::Ready(create_channels_and_register(node, gps_topic, ground_speed_topic));
        true
    }

    pub fn as_ready(&self) -> Option<&ChannelSet> {
        match self {
            Channels::Ready(set) => Some(set),
            Channels::Uninitialized => None,
        }
    }
}

/// Advertise the fix and ground-speed topics on `node` and announce each one
/// on the registration channel so the bridge mirrors it.
///
/// Not idempotent: every call advertises again and emits two more
/// registrations.  [`Channels::ensure_ready`] is the guarded entry point.
pub fn create_channels_and_register(node: &TransportNode, gps_topic: &str, ground_speed_topic: &str) -> ChannelSet {
    let registrar = node.advertise::<BridgeRequest>(&format!("~/{REGISTRATION_SUBTOPIC}"));

    info!(topic = %node.resolve(gps_topic), "creating gps publisher");
    let gps = node.advertise::<NavSatFix>(gps_topic);
    registrar.publish_latched(&BridgeRequest {
        gazebo_topic: gps_topic.to_string(),
        ros_topic: gps_topic.to_string(),
        msgtype: MsgType::NavSatFix,
    });

    info!(topic = %node.resolve(ground_speed_topic), "creating ground speed publisher");
    let ground_speed = node.advertise::<TwistStamped>(ground_speed_topic);
    registrar.publish_latched(&BridgeRequest {
        gazebo_topic: ground_speed_topic.to_string(),
        ros_topic: ground_speed_topic.to_string(),
        msgtype: MsgType::TwistStamped,
    });

    ChannelSet { gps, ground_speed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerosim_middleware::TransportHub;
    use aerosim_types::Payload;

    #[test]
    fn registers_both_topics_in_order() {
        let node = TransportNode::new(TransportHub::default(), "firefly");
        let mut registrations = node.subscribe(&format!("~/{REGISTRATION_SUBTOPIC}"));

        let set = create_channels_and_register(&node, "gps", "ground_speed");
        assert_eq!(set.gps.topic(), "/gazebo/firefly/gps");
        assert_eq!(set.ground_speed.topic(), "/gazebo/firefly/ground_speed");

        let requests: Vec<BridgeRequest> = registrations
            .drain()
            .into_iter()
            .filter_map(BridgeRequest::from_message)
            .collect();
        assert_eq!(
            requests,
            vec![
                BridgeRequest {
                    gazebo_topic: "gps".to_string(),
                    ros_topic: "gps".to_string(),
                    msgtype: MsgType::NavSatFix,
                },
                BridgeRequest {
                    gazebo_topic: "ground_speed".to_string(),
                    ros_topic: "ground_speed".to_string(),
                    msgtype: MsgType::TwistStamped,
                },
            ]
        );
    }

    #[test]
    fn ensure_ready_transitions_once() {
        let hub = TransportHub::default();
        let node = TransportNode::new(hub.clone(), "firefly");
        let mut channels = Channels::default();
        assert!(!channels.is_ready());
        assert!(channels.as_ready().is_none());

        assert!(channels.ensure_ready(&node, "gps", "ground_speed"));
        for _ in 0..100 {
            assert!(!channels.ensure_ready(&node, "gps", "ground_speed"));
        }

        assert!(channels.is_ready());
        assert_eq!(hub.advertise_count("/gazebo/firefly/gps"), 1);
        assert_eq!(hub.advertise_count("/gazebo/firefly/ground_speed"), 1);
        assert_eq!(
            hub.advertise_count("/gazebo/firefly/connect_gazebo_to_ros_subtopic"),
            1
        );
    }

    #[test]
    fn late_subscriber_sees_both_registrations() {
        let node = TransportNode::new(TransportHub::default(), "firefly");
        let _set = create_channels_and_register(&node, "gps", "ground_speed");

        let mut late = node.subscribe(&format!("~/{REGISTRATION_SUBTOPIC}"));
        let topics: Vec<(String, MsgType)> = late
            .drain()
            .into_iter()
            .filter_map(BridgeRequest::from_message)
            .map(|r| (r.gazebo_topic, r.msgtype))
            .collect();
        assert_eq!(
            topics,
            vec![
                ("gps".to_string(), MsgType::NavSatFix),
                ("ground_speed".to_string(), MsgType::TwistStamped),
            ]
        );
    }
}
