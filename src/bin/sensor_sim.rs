//! Simulated sensor node: one distance sensor per configured spot plus the
//! entry/exit gate sensors, publishing debounced changes over MQTT.

use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use smart_parking::infra::Config;
use smart_parking::io::{create_bus_channel, MqttPublisher};
use smart_parking::services::gate_sensor::RandomSchedule;
use smart_parking::services::SensorNode;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "parking-sensor-sim", version, about = "Simulated parking sensor node")]
struct Args {
    /// Path to TOML configuration file (default: $CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Seed for a reproducible run
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(|| Config::resolve_config_path(&[]));
    let config = Config::load_from_path(&config_path);

    info!(
        config_file = %config.config_file(),
        spots = %config.spot_ids().len(),
        threshold_cm = %config.threshold_cm(),
        debounce_n = %config.debounce_n(),
        seed = ?args.seed,
        "sensor_sim_starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (bus, bus_rx) = create_bus_channel(1000);
    let publisher = MqttPublisher::new(&config, "sim", bus_rx);
    let publisher_task = tokio::spawn(publisher.run(shutdown_rx.clone()));

    let node = match args.seed {
        Some(seed) => {
            let schedule = |offset: u64| {
                RandomSchedule::with_rng(
                    config.gate_occupied_range(),
                    config.gate_idle_range(),
                    StdRng::seed_from_u64(seed.wrapping_add(offset)),
                )
            };
            SensorNode::new(&config, bus, schedule(1), schedule(2), StdRng::seed_from_u64(seed))
        }
        None => SensorNode::from_config(&config, bus),
    };

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    node.run(config.read_interval(), shutdown_rx).await;
    let _ = publisher_task.await;

    info!("sensor_sim shutdown complete");
    Ok(())
}
