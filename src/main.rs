//! Smart parking pipeline - bus-to-store state sync, barriers and arbitration
//!
//! Module structure:
//! - `domain/` - Core types (SpotStatus, BarrierPhase, topics, payloads)
//! - `io/` - External interfaces (MQTT, REST store, status API)
//! - `services/` - Business logic (Forwarder, BarrierController, Arbitration)
//! - `infra/` - Infrastructure (Config, Metrics, Broker)

use clap::Parser;
use parking_lot::RwLock;
use smart_parking::domain::Topics;
use smart_parking::infra::{Config, Metrics};
use smart_parking::io::{create_bus_channel, MqttPublisher, PlaceStore, RestPlaceStore};
use smart_parking::services::{
    Arbitration, AvailabilityAggregator, BarrierController, BarrierTimings, Dispatcher, Forwarder,
    ParkingView,
};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Smart parking pipeline
#[derive(Parser, Debug)]
#[command(name = "smart-parking", version, about)]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // RUST_LOG overrides the default INFO level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = %env!("GIT_HASH"), "smart-parking starting");

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(|| Config::resolve_config_path(&[]));
    let config = Config::load_from_path(&config_path);

    smart_parking::infra::broker::start_embedded_broker(&config);

    let roles = config.roles().clone();
    info!(
        config_file = %config.config_file(),
        site = %config.site_id(),
        mqtt_host = %config.mqtt_host(),
        mqtt_port = %config.mqtt_port(),
        topic_prefix = %config.topic_prefix(),
        rest_base_url = %config.rest_base_url(),
        spots = %config.spot_ids().len(),
        forwarder = %roles.forwarder,
        barrier = %roles.barrier,
        arbitration = %roles.arbitration,
        availability = %roles.availability,
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());
    let topics = Topics::new(config.topic_prefix());

    // Outbound bus: every role publishes through one FIFO publisher
    let (bus, bus_rx) = create_bus_channel(1000);
    let publisher = MqttPublisher::new(&config, "pub", bus_rx);
    let publisher_shutdown = shutdown_rx.clone();
    let publisher_task = tokio::spawn(async move {
        publisher.run(publisher_shutdown).await;
    });

    let view = Arc::new(RwLock::new(ParkingView::new(config.spot_ids())));
    let mut dispatcher = Dispatcher::new(topics.clone(), metrics.clone());
    if roles.forwarder {
        let store: Arc<dyn PlaceStore> = Arc::new(RestPlaceStore::new(config.rest_base_url(), config.rest_timeout())?);
        dispatcher = dispatcher.with_forwarder(Forwarder::new(store, bus.clone(), topics.clone(), metrics.clone()));
    }
    if roles.barrier {
        let timings = BarrierTimings::from_config(&config);
        dispatcher = dispatcher.with_barrier(BarrierController::new(bus.clone(), topics.clone(), timings, metrics.clone()));
    }
    if roles.arbitration {
        dispatcher = dispatcher.with_arbitration(Arbitration::new(bus.clone(), topics.clone(), metrics.clone()));
    }
    if roles.availability {
        dispatcher = dispatcher.with_availability(AvailabilityAggregator::new(view.clone(), bus.clone(), topics.clone()));
    }
    if config.status_api_port() > 0 {
        dispatcher = dispatcher.with_view(view.clone());
    }
    drop(bus);

    // Inbound bus (bounded for backpressure)
    let (event_tx, event_rx) = mpsc::channel(1000);
    let mqtt_config = config.clone();
    let filters = dispatcher.subscriptions();
    let mqtt_metrics = metrics.clone();
    let mqtt_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) =
            smart_parking::io::mqtt::start_mqtt_client(&mqtt_config, filters, event_tx, mqtt_metrics, mqtt_shutdown)
                .await
        {
            tracing::error!(error = %e, "MQTT client error");
        }
    });

    // Status API (if port > 0)
    let status_port = config.status_api_port();
    if status_port > 0 {
        let status_shutdown = shutdown_rx.clone();
        let status_view = view.clone();
        tokio::spawn(async move {
            if let Err(e) =
                smart_parking::io::status_api::start_status_server(status_port, status_view, status_shutdown).await
            {
                tracing::error!(error = %e, "status API server error");
            }
        });
    }

    // Periodic metrics summary
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs().max(1);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    dispatcher.run(event_rx, shutdown_rx).await;

    // Dropping the dispatcher releases its bus senders so queued publishes drain
    drop(dispatcher);
    let _ = publisher_task.await;

    metrics.report().log();
    info!("smart-parking shutdown complete");
    Ok(())
}
