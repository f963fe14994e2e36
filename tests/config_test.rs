//! Integration tests for configuration loading

use smart_parking::infra::Config;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

#[test]
fn test_load_config_from_file() {
    let temp_file = write_config(
        r#"
[site]
id = "test-site"

[mqtt]
host = "test-host"
port = 1884
topic_prefix = "lot_7/"
username = "sensor"
password = "secret"

[rest]
base_url = "http://store:3000"
timeout_ms = 500

[barrier]
opening_ms = 100
opened_ms = 200
closing_ms = 300

[sensors]
spots = ["A01", "A02", "A03"]
threshold_cm = 40.0
debounce_n = 3
gate_occupied_ms = [3000, 1500]

[roles]
forwarder = false

[metrics]
interval_secs = 15

[status_api]
port = 0
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.site_id(), "test-site");
    assert_eq!(config.mqtt_host(), "test-host");
    assert_eq!(config.mqtt_port(), 1884);
    assert_eq!(config.mqtt_username(), Some("sensor"));
    assert_eq!(config.mqtt_password(), Some("secret"));
    assert_eq!(config.rest_base_url(), "http://store:3000");
    assert_eq!(config.rest_timeout(), Duration::from_millis(500));
    assert_eq!(
        config.barrier_timings(),
        [Duration::from_millis(100), Duration::from_millis(200), Duration::from_millis(300)]
    );
    assert_eq!(config.spot_ids(), &["A01".to_string(), "A02".to_string(), "A03".to_string()]);
    assert_eq!(config.threshold_cm(), 40.0);
    assert_eq!(config.debounce_n(), 3);
    assert!(!config.roles().forwarder);
    assert!(config.roles().barrier);
    assert_eq!(config.metrics_interval_secs(), 15);
    assert_eq!(config.status_api_port(), 0);
}

#[test]
fn test_omitted_sections_use_defaults() {
    let temp_file = write_config(
        r#"
[mqtt]
host = "broker"
port = 1883
"#,
    );

    let config = Config::from_file(temp_file.path()).unwrap();

    assert_eq!(config.site_id(), "smart-parking");
    assert_eq!(config.topic_prefix(), "smart_parking_2026");
    assert_eq!(config.spot_ids().len(), 20);
    assert_eq!(config.debounce_n(), 4);
    assert_eq!(config.threshold_cm(), 50.0);
    assert!(!config.broker_enabled());
    assert!(config.roles().availability);
}

#[test]
fn test_zero_debounce_rejected() {
    let temp_file = write_config(
        r#"
[mqtt]
host = "broker"
port = 1883

[sensors]
debounce_n = 0
"#,
    );

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_zero_read_interval_rejected() {
    let temp_file = write_config(
        r#"
[mqtt]
host = "broker"
port = 1883

[sensors]
read_interval_ms = 0
"#,
    );

    assert!(Config::from_file(temp_file.path()).is_err());
}

#[test]
fn test_empty_topic_prefix_rejected() {
    for prefix in ["", "/"] {
        let temp_file = write_config(&format!(
            "[mqtt]\nhost = \"broker\"\nport = 1883\ntopic_prefix = \"{prefix}\"\n"
        ));
        assert!(Config::from_file(temp_file.path()).is_err(), "prefix {prefix:?} accepted");
    }
}

#[test]
fn test_load_from_path_fallback() {
    let config = Config::load_from_path("/nonexistent/config.toml");
    assert_eq!(config.mqtt_host(), "localhost");
    assert_eq!(config.mqtt_port(), 1883);
    assert_eq!(config.config_file(), "default");
}

#[test]
fn test_broken_file_falls_back_to_defaults() {
    let temp_file = write_config("[mqtt\nhost = ");
    let config = Config::load_from_path(temp_file.path().to_str().unwrap());
    assert_eq!(config.mqtt_host(), "localhost");
}

#[test]
fn test_shipped_dev_config_parses() {
    let config = Config::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/config/dev.toml")).unwrap();
    assert!(config.broker_enabled());
    assert_eq!(config.spot_ids().len(), 20);
}
