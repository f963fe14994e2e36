//! MQTT publisher for outbound bus messages
//!
//! Drains the `BusSender` channel and publishes each message with the QoS and
//! retain flag chosen by its producer.

use crate::infra::config::Config;
use crate::io::bus::OutboundMessage;
use crate::io::mqtt::mqtt_options;
use rumqttc::{AsyncClient, Event, Packet};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// MQTT publisher actor
pub struct MqttPublisher {
    client: AsyncClient,
    rx: mpsc::Receiver<OutboundMessage>,
}

impl MqttPublisher {
    /// Create a new MQTT publisher
    ///
    /// Connects to the broker at the configured MQTT host/port.
    pub fn new(config: &Config, role: &str, rx: mpsc::Receiver<OutboundMessage>) -> Self {
        let (client, eventloop) = AsyncClient::new(mqtt_options(config, role), 100);

        tokio::spawn(async move {
            let mut eventloop = eventloop;
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("mqtt_egress_connected");
                    }
                    Ok(Event::Incoming(Packet::PubAck(_))) => {
                        debug!("mqtt_egress_puback");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "mqtt_egress_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self { client, rx }
    }

    /// Run the publisher loop until shutdown or until every sender is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("mqtt_egress_started");

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("mqtt_egress_shutdown");
                        while let Ok(msg) = self.rx.try_recv() {
                            self.publish_message(msg).await;
                        }
                        return;
                    }
                }
                msg = self.rx.recv() => {
                    match msg {
                        Some(msg) => self.publish_message(msg).await,
                        None => {
                            info!("mqtt_egress_channel_closed");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn publish_message(&self, msg: OutboundMessage) {
        debug!(topic = %msg.topic, retain = %msg.retain, "mqtt_egress_publish");
        if let Err(e) = self.client.publish(msg.topic.as_str(), msg.qos, msg.retain, msg.payload).await {
            error!(topic = %msg.topic, error = %e, "mqtt_egress_publish_failed");
        }
    }
}
