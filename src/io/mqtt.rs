//! MQTT client for receiving parking bus messages

use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::bus::BusMessage;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Build connection options for one client role
///
/// Public brokers reject duplicate client IDs, so each connection gets a
/// time-ordered unique suffix.
pub fn mqtt_options(config: &Config, role: &str) -> MqttOptions {
    let suffix = Uuid::now_v7().simple().to_string();
    let client_id = format!("{}-{}-{}", config.mqtt_client_id(), role, &suffix[suffix.len() - 8..]);
    let mut options = MqttOptions::new(client_id, config.mqtt_host(), config.mqtt_port());
    options.set_keep_alive(config.mqtt_keep_alive());
    options.set_clean_session(true);

    if let (Some(username), Some(password)) = (config.mqtt_username(), config.mqtt_password()) {
        options.set_credentials(username, password);
    }
    options
}

/// Start the MQTT client and forward publishes to the dispatch channel
///
/// Subscriptions are (re)issued on every ConnAck since the session is clean.
/// Messages are sent via try_send so the eventloop never blocks; drops are
/// counted in metrics and logged (rate-limited).
pub async fn start_mqtt_client(
    config: &Config,
    filters: Vec<String>,
    event_tx: mpsc::Sender<BusMessage>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(config, "gw"), 100);

    info!(host = %config.mqtt_host(), port = %config.mqtt_port(), filters = ?filters, "mqtt_client_starting");

    let mut last_drop_warn = Instant::now() - Duration::from_secs(2);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("mqtt_shutdown");
                    let _ = client.try_disconnect();
                    return Ok(());
                }
            }
            result = eventloop.poll() => {
                match result {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        metrics.record_message_received();
                        debug!(topic = %publish.topic, bytes = %publish.payload.len(), "mqtt_message");
                        let message = BusMessage { topic: publish.topic, payload: publish.payload };
                        if let Err(e) = event_tx.try_send(message) {
                            match e {
                                TrySendError::Full(_) => {
                                    metrics.record_message_dropped();
                                    if last_drop_warn.elapsed() > Duration::from_secs(1) {
                                        warn!("mqtt_message_dropped: channel full");
                                        last_drop_warn = Instant::now();
                                    }
                                }
                                TrySendError::Closed(_) => {
                                    warn!("dispatch channel closed");
                                    return Ok(());
                                }
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("mqtt_connected");
                        for filter in &filters {
                            if let Err(e) = client.try_subscribe(filter.as_str(), QoS::AtLeastOnce) {
                                error!(filter = %filter, error = %e, "mqtt_subscribe_failed");
                            }
                        }
                    }
                    Ok(Event::Incoming(Packet::SubAck(ack))) => {
                        debug!(pkid = %ack.pkid, "mqtt_subscribed");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "mqtt_error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        }
    }
}
