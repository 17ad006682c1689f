//! Topic bridge driven by registration records.
//!
//! [`TopicBridge`] listens on the `~/connect_gazebo_to_ros_subtopic`
//! registration channel of its namespace.  Each [`BridgeRequest`] names a
//! simulator topic and the external topic it should appear under; the bridge
//! subscribes to the simulator topic and hands every record on it, serialised
//! as JSON, to an outbound [`mpsc`] channel as a [`BridgedFrame`].
//!
//! What happens to the frames after that (the external middleware protocol)
//! is up to whoever owns the receiving end.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use aerosim_types::{BridgeRequest, Message, MsgType, Payload, SimError};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::bus::{REGISTRATION_SUBTOPIC, Subscriber, TransportNode};

/// One simulator record mirrored onto an external topic.
#[derive(Debug, Clone, Serialize)]
pub struct BridgedFrame {
    pub ros_topic: String,
    pub msgtype: MsgType,
    pub bridged_at: DateTime<Utc>,
    /// The record itself, serialised as JSON.
    pub json: String,
}

/// Consumer of bridge registrations for one namespace.
#[derive(Clone)]
pub struct TopicBridge {
    node: TransportNode,
    requests: Arc<Mutex<Vec<BridgeRequest>>>,
}

impl TopicBridge {
    /// Create a bridge listening on `node`'s registration channel.
    pub fn new(node: TransportNode) -> Self {
        Self {
            node,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every distinct registration accepted so far, in arrival order.
    pub fn requests(&self) -> Vec<BridgeRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Process registrations until the registration channel closes, then wait
    /// for every forwarder to finish.
    ///
    /// # Errors
    ///
    /// Currently infallible; the `Result` mirrors the other long-running
    /// transport tasks so callers can `?` it uniformly.
    pub async fn run(self, out: mpsc::Sender<BridgedFrame>) -> Result<(), SimError> {
        let registrations = self.attach();
        self.serve(registrations, out).await
    }

    /// Subscribe to the registration channel without processing anything.
    ///
    /// Registrations published after this call are not missed even if
    /// [`serve`][Self::serve] only starts polling later.
    pub fn attach(&self) -> Subscriber {
        self.node.subscribe(&format!("~/{REGISTRATION_SUBTOPIC}"))
    }

    /// [`run`][Self::run] on a subscription obtained from
    /// [`attach`][Self::attach].
    pub async fn serve(
        self,
        mut registrations: Subscriber,
        out: mpsc::Sender<BridgedFrame>,
    ) -> Result<(), SimError> {
        let mut forwarders = JoinSet::new();
        let mut seen = HashSet::new();

        info!(topic = %registrations.topic(), "bridge listening for registrations");

        while let Some(message) = registrations.recv().await {
            let Some(request) = BridgeRequest::from_message(message) else {
                warn!(topic = %registrations.topic(), "ignoring non-registration record");
                continue;
            };
            if request.msgtype.message_kind().is_none() {
                warn!(msgtype = ?request.msgtype, "unsupported message type; not bridging");
                continue;
            }
            if !seen.insert(request.clone()) {
                debug!(gazebo_topic = %request.gazebo_topic, "duplicate registration ignored");
                continue;
            }

            // Subscribe before recording the request so that anyone who
            // sees it in `requests()` knows the forwarder is already attached.
            let subscriber = self.node.subscribe(&request.gazebo_topic);
            info!(
                gazebo_topic = %subscriber.topic(),
                ros_topic = %request.ros_topic,
                msgtype = ?request.msgtype,
                "bridging topic"
            );
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request.clone());
            forwarders.spawn(forward(subscriber, request, out.clone()));
        }

        while forwarders.join_next().await.is_some() {}
        Ok(())
    }
}

async fn forward(mut subscriber: Subscriber, request: BridgeRequest, out: mpsc::Sender<BridgedFrame>) {
    let expected = request.msgtype.message_kind();
    while let Some(message) = subscriber.recv().await {
        if Some(message.kind()) != expected {
            warn!(
                topic = %subscriber.topic(),
                kind = ?message.kind(),
                "record does not match registered type; dropped"
            );
            continue;
        }
        let json = match record_json(&message) {
            Ok(json) => json,
            Err(e) => {
                warn!(topic = %subscriber.topic(), error = %e, "failed to serialise record");
                continue;
            }
        };
        let frame = BridgedFrame {
            ros_topic: request.ros_topic.clone(),
            msgtype: request.msgtype,
            bridged_at: Utc::now(),
            json,
        };
        if out.send(frame).await.is_err() {
            break;
        }
    }
}

fn record_json(message: &Message) -> Result<String, SimError> {
    let result = match message {
        Message::NavSatFix(m) => serde_json::to_string(m),
        Message::TwistStamped(m) => serde_json::to_string(m),
        Message::BridgeRequest(m) => serde_json::to_string(m),
    };
    result.map_err(|e| SimError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::bus::TransportHub;
    use aerosim_types::{Header, NavSatFix, SimTime, TwistStamped};

    fn registration(topic: &str, msgtype: MsgType) -> BridgeRequest {
        BridgeRequest {
            gazebo_topic: topic.to_string(),
            ros_topic: topic.to_string(),
            msgtype,
        }
    }

    async fn wait_for_requests(bridge: &TopicBridge, n: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while bridge.requests().len() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("bridge never picked up the registrations");
    }

    #[tokio::test]
    async fn mirrors_registered_topic_as_json() -> Result<(), Box<dyn std::error::Error>> {
        let node = TransportNode::new(TransportHub::default(), "firefly");
        let bridge = TopicBridge::new(node.clone());
        let (tx, mut rx) = mpsc::channel(16);
        tokio::spawn(bridge.clone().run(tx));

        let registrar = node.advertise::<BridgeRequest>(&format!("~/{REGISTRATION_SUBTOPIC}"));
        let gps = node.advertise::<NavSatFix>("gps");
        registrar.publish_latched(&registration("gps", MsgType::NavSatFix));
        wait_for_requests(&bridge, 1).await;

        let fix = NavSatFix {
            header: Header {
                frame_id: "gps_link".to_string(),
                stamp: SimTime::new(7, 0),
            },
            latitude: 47.0,
            ..NavSatFix::default()
        };
        gps.publish(&fix);

        let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await?
            .ok_or("bridge output closed")?;
        assert_eq!(frame.ros_topic, "gps");
        assert_eq!(frame.msgtype, MsgType::NavSatFix);
        let back: NavSatFix = serde_json::from_str(&frame.json)?;
        assert_eq!(back, fix);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_registrations_are_ignored() {
        let node = TransportNode::new(TransportHub::default(), "firefly");
        let bridge = TopicBridge::new(node.clone());
        let (tx, _rx) = mpsc::channel(16);
        tokio::spawn(bridge.clone().run(tx));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let registrar = node.advertise::<BridgeRequest>(&format!("~/{REGISTRATION_SUBTOPIC}"));
        registrar.publish_latched(&registration("gps", MsgType::NavSatFix));
        registrar.publish_latched(&registration("ground_speed", MsgType::TwistStamped));
        registrar.publish_latched(&registration("gps", MsgType::NavSatFix));
        wait_for_requests(&bridge, 2).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let requests = bridge.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].msgtype, MsgType::TwistStamped);
    }

    #[tokio::test]
    async fn mismatched_records_are_not_forwarded() {
        let node = TransportNode::new(TransportHub::default(), "firefly");
        let bridge = TopicBridge::new(node.clone());
        let (tx, mut rx) = mpsc::channel(16);
        tokio::spawn(bridge.clone().run(tx));

        let registrar = node.advertise::<BridgeRequest>(&format!("~/{REGISTRATION_SUBTOPIC}"));
        registrar.publish_latched(&registration("ground_speed", MsgType::NavSatFix));
        wait_for_requests(&bridge, 1).await;

        node.advertise::<TwistStamped>("ground_speed")
            .publish(&TwistStamped::default());

        let result = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(result.is_err(), "a twist must not be bridged as a fix");
    }

    #[tokio::test]
    async fn unsupported_msgtype_is_skipped() {
        let node = TransportNode::new(TransportHub::default(), "firefly");
        let bridge = TopicBridge::new(node.clone());
        let (tx, _rx) = mpsc::channel(16);
        tokio::spawn(bridge.clone().run(tx));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let registrar = node.advertise::<BridgeRequest>(&format!("~/{REGISTRATION_SUBTOPIC}"));
        registrar.publish_latched(&registration("imu", MsgType::Imu));
        registrar.publish_latched(&registration("gps", MsgType::NavSatFix));
        wait_for_requests(&bridge, 1).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(bridge.requests(), vec![registration("gps", MsgType::NavSatFix)]);
    }

    #[tokio::test]
    async fn bridge_started_late_mirrors_both_topics() -> Result<(), Box<dyn std::error::Error>> {
        let node = TransportNode::new(TransportHub::default(), "firefly");
        let registrar = node.advertise::<BridgeRequest>(&format!("~/{REGISTRATION_SUBTOPIC}"));
        let gps = node.advertise::<NavSatFix>("gps");
        registrar.publish_latched(&registration("gps", MsgType::NavSatFix));
        let ground_speed = node.advertise::<TwistStamped>("ground_speed");
        registrar.publish_latched(&registration("ground_speed", MsgType::TwistStamped));

        let bridge = TopicBridge::new(node.clone());
        let (tx, mut rx) = mpsc::channel(16);
        tokio::spawn(bridge.clone().run(tx));
        wait_for_requests(&bridge, 2).await;
        assert_eq!(
            bridge.requests(),
            vec![
                registration("gps", MsgType::NavSatFix),
                registration("ground_speed", MsgType::TwistStamped),
            ]
        );

        gps.publish(&NavSatFix::default());
        ground_speed.publish(&TwistStamped::default());

        let mut topics = Vec::new();
        for _ in 0..2 {
            let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await?
                .ok_or("bridge output closed")?;
            topics.push(frame.ros_topic);
        }
        topics.sort();
        assert_eq!(topics, vec!["gps".to_string(), "ground_speed".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn attached_bridge_sees_every_registration() {
        let node = TransportNode::new(TransportHub::default(), "firefly");
        let bridge = TopicBridge::new(node.clone());
        let registrations = bridge.attach();

        let registrar = node.advertise::<BridgeRequest>(&format!("~/{REGISTRATION_SUBTOPIC}"));
        registrar.publish_latched(&registration("gps", MsgType::NavSatFix));
        registrar.publish_latched(&registration("ground_speed", MsgType::TwistStamped));

        let (tx, _rx) = mpsc::channel(16);
        tokio::spawn(bridge.clone().serve(registrations, tx));
        wait_for_requests(&bridge, 2).await;
        assert_eq!(bridge.requests()[0], registration("gps", MsgType::NavSatFix));
    }

    #[tokio::test]
    async fn run_returns_after_shutdown() {
        let hub = TransportHub::default();
        let node = TransportNode::new(hub.clone(), "firefly");
        let bridge = TopicBridge::new(node.clone());
        let (tx, _rx) = mpsc::channel(16);
        let handle = tokio::spawn(bridge.run(tx));

        tokio::time::sleep(Duration::from_millis(10)).await;
        hub.shutdown();

        let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
        assert!(matches!(result, Ok(Ok(Ok(())))));
    }
}
