//! Typed channels between the MQTT clients and the services
//!
//! Inbound: the MQTT client pushes `BusMessage`s into a bounded channel that
//! the dispatcher drains one at a time. Outbound: services publish through a
//! cloneable `BusSender`; the MQTT publisher actor drains the other end in
//! FIFO order, so one producer's publications keep their order on the wire.

use bytes::Bytes;
use rumqttc::QoS;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, warn};

/// Message as delivered by the broker
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub topic: String,
    pub payload: Bytes,
}

impl BusMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self { topic: topic.into(), payload: payload.into() }
    }
}

/// Publish request queued for the MQTT publisher
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub retain: bool,
}

impl OutboundMessage {
    /// Payload parsed back into JSON (test and debug helper)
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.payload).ok()
    }
}

/// Sender handle for outbound bus messages
///
/// Clone this to share across producers (handlers and barrier tasks).
#[derive(Clone)]
pub struct BusSender {
    tx: mpsc::Sender<OutboundMessage>,
}

impl BusSender {
    pub fn new(tx: mpsc::Sender<OutboundMessage>) -> Self {
        Self { tx }
    }

    /// Serialize and queue a JSON payload
    ///
    /// Waits for channel capacity rather than dropping, so ordered sequences
    /// are never missing a step. Returns false if serialization failed or
    /// the publisher has shut down.
    pub async fn publish_json<T: Serialize>(
        &self,
        topic: String,
        payload: &T,
        qos: QoS,
        retain: bool,
    ) -> bool {
        let payload = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(topic = %topic, error = %e, "bus_payload_serialize_failed");
                return false;
            }
        };

        if self.tx.send(OutboundMessage { topic, payload, qos, retain }).await.is_err() {
            warn!("bus_publisher_closed");
            return false;
        }
        true
    }
}

/// Create a new outbound channel pair
pub fn create_bus_channel(buffer_size: usize) -> (BusSender, mpsc::Receiver<OutboundMessage>) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (BusSender::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_preserves_order() {
        let (bus, mut rx) = create_bus_channel(8);
        for n in 0..3 {
            assert!(bus.publish_json(format!("t/{n}"), &serde_json::json!({"n": n}), QoS::AtLeastOnce, false).await);
        }
        for n in 0..3 {
            let msg = rx.recv().await.unwrap();
            assert_eq!(msg.topic, format!("t/{n}"));
            assert_eq!(msg.json().unwrap()["n"], n);
        }
    }

    #[tokio::test]
    async fn test_publish_after_close_fails() {
        let (bus, rx) = create_bus_channel(1);
        drop(rx);
        assert!(!bus.publish_json("t".to_string(), &1, QoS::AtMostOnce, true).await);
    }
}
