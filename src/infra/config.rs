//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Client ID prefix; a unique suffix is appended per connection
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,
    /// Root of every topic, e.g. "smart_parking_2026"
    #[serde(default = "default_topic_prefix")]
    pub topic_prefix: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_client_id() -> String {
    "SmartPark2026".to_string()
}

fn default_keep_alive_secs() -> u64 {
    60
}

fn default_topic_prefix() -> String {
    "smart_parking_2026".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_rest_base_url")]
    pub base_url: String,
    /// Per-request timeout; a timed-out call is not retried
    #[serde(default = "default_rest_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self { base_url: default_rest_base_url(), timeout_ms: default_rest_timeout_ms() }
    }
}

fn default_rest_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_rest_timeout_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct BarrierConfig {
    #[serde(default = "default_opening_ms")]
    pub opening_ms: u64,
    #[serde(default = "default_opened_ms")]
    pub opened_ms: u64,
    #[serde(default = "default_closing_ms")]
    pub closing_ms: u64,
}

impl Default for BarrierConfig {
    fn default() -> Self {
        Self {
            opening_ms: default_opening_ms(),
            opened_ms: default_opened_ms(),
            closing_ms: default_closing_ms(),
        }
    }
}

fn default_opening_ms() -> u64 {
    2000
}

fn default_opened_ms() -> u64 {
    5000
}

fn default_closing_ms() -> u64 {
    2000
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorsConfig {
    /// Spot IDs; empty means the default A01..A20 layout
    #[serde(default)]
    pub spots: Vec<String>,
    #[serde(default = "default_threshold_cm")]
    pub threshold_cm: f64,
    #[serde(default = "default_debounce_n")]
    pub debounce_n: u32,
    #[serde(default = "default_read_interval_ms")]
    pub read_interval_ms: u64,
    /// Distance range when no car is present (sensor sees the floor)
    #[serde(default = "default_free_distance_cm")]
    pub free_distance_cm: [f64; 2],
    /// Distance range when a car is parked
    #[serde(default = "default_park_distance_cm")]
    pub park_distance_cm: [f64; 2],
    #[serde(default = "default_noise_cm")]
    pub noise_cm: f64,
    /// How long a gate sensor stays OCCUPIED while a car passes
    #[serde(default = "default_gate_occupied_ms")]
    pub gate_occupied_ms: [u64; 2],
    /// Idle time between two cars at a gate
    #[serde(default = "default_gate_idle_ms")]
    pub gate_idle_ms: [u64; 2],
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            spots: Vec::new(),
            threshold_cm: default_threshold_cm(),
            debounce_n: default_debounce_n(),
            read_interval_ms: default_read_interval_ms(),
            free_distance_cm: default_free_distance_cm(),
            park_distance_cm: default_park_distance_cm(),
            noise_cm: default_noise_cm(),
            gate_occupied_ms: default_gate_occupied_ms(),
            gate_idle_ms: default_gate_idle_ms(),
        }
    }
}

fn default_threshold_cm() -> f64 {
    50.0
}

fn default_debounce_n() -> u32 {
    4
}

fn default_read_interval_ms() -> u64 {
    1000
}

fn default_free_distance_cm() -> [f64; 2] {
    [150.0, 280.0]
}

fn default_park_distance_cm() -> [f64; 2] {
    [10.0, 35.0]
}

fn default_noise_cm() -> f64 {
    2.0
}

fn default_gate_occupied_ms() -> [u64; 2] {
    [1500, 3000]
}

fn default_gate_idle_ms() -> [u64; 2] {
    [4000, 12000]
}

fn default_spot_ids() -> Vec<String> {
    (1..=20).map(|i| format!("A{:02}", i)).collect()
}

/// Which services the pipeline process runs
#[derive(Debug, Clone, Deserialize)]
pub struct RolesConfig {
    #[serde(default = "default_true")]
    pub forwarder: bool,
    #[serde(default = "default_true")]
    pub barrier: bool,
    #[serde(default = "default_true")]
    pub arbitration: bool,
    #[serde(default = "default_true")]
    pub availability: bool,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self { forwarder: true, barrier: true, arbitration: true, availability: true }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_broker_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
}

fn default_broker_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_broker_port() -> u16 {
    1883
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: default_broker_bind_address(),
            port: default_broker_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval")]
    pub interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval() }
    }
}

fn default_metrics_interval() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusApiConfig {
    /// HTTP port for the read-only status API (0 to disable)
    #[serde(default = "default_status_api_port")]
    pub port: u16,
}

impl Default for StatusApiConfig {
    fn default() -> Self {
        Self { port: default_status_api_port() }
    }
}

fn default_status_api_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    #[serde(default = "default_site_id")]
    pub id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

fn default_site_id() -> String {
    "smart-parking".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub rest: RestConfig,
    #[serde(default)]
    pub barrier: BarrierConfig,
    #[serde(default)]
    pub sensors: SensorsConfig,
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub status_api: StatusApiConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    mqtt_host: String,
    mqtt_port: u16,
    mqtt_client_id: String,
    mqtt_keep_alive_secs: u64,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    topic_prefix: String,
    rest_base_url: String,
    rest_timeout_ms: u64,
    barrier_opening_ms: u64,
    barrier_opened_ms: u64,
    barrier_closing_ms: u64,
    spot_ids: Vec<String>,
    threshold_cm: f64,
    debounce_n: u32,
    read_interval_ms: u64,
    free_distance_cm: [f64; 2],
    park_distance_cm: [f64; 2],
    noise_cm: f64,
    gate_occupied_ms: [u64; 2],
    gate_idle_ms: [u64; 2],
    roles: RolesConfig,
    broker_enabled: bool,
    broker_bind_address: String,
    broker_port: u16,
    metrics_interval_secs: u64,
    status_api_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        let sensors = SensorsConfig::default();
        let barrier = BarrierConfig::default();
        Self {
            site_id: default_site_id(),
            mqtt_host: "localhost".to_string(),
            mqtt_port: 1883,
            mqtt_client_id: default_client_id(),
            mqtt_keep_alive_secs: default_keep_alive_secs(),
            mqtt_username: None,
            mqtt_password: None,
            topic_prefix: default_topic_prefix(),
            rest_base_url: default_rest_base_url(),
            rest_timeout_ms: default_rest_timeout_ms(),
            barrier_opening_ms: barrier.opening_ms,
            barrier_opened_ms: barrier.opened_ms,
            barrier_closing_ms: barrier.closing_ms,
            spot_ids: default_spot_ids(),
            threshold_cm: sensors.threshold_cm,
            debounce_n: sensors.debounce_n,
            read_interval_ms: sensors.read_interval_ms,
            free_distance_cm: sensors.free_distance_cm,
            park_distance_cm: sensors.park_distance_cm,
            noise_cm: sensors.noise_cm,
            gate_occupied_ms: sensors.gate_occupied_ms,
            gate_idle_ms: sensors.gate_idle_ms,
            roles: RolesConfig::default(),
            broker_enabled: false,
            broker_bind_address: default_broker_bind_address(),
            broker_port: default_broker_port(),
            metrics_interval_secs: default_metrics_interval(),
            status_api_port: default_status_api_port(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let sensors = toml_config.sensors;
        let spot_ids = if sensors.spots.is_empty() { default_spot_ids() } else { sensors.spots };
        anyhow::ensure!(sensors.debounce_n > 0, "sensors.debounce_n must be at least 1");
        anyhow::ensure!(sensors.read_interval_ms > 0, "sensors.read_interval_ms must be positive");
        anyhow::ensure!(
            !toml_config.mqtt.topic_prefix.trim_matches('/').is_empty(),
            "mqtt.topic_prefix must not be empty"
        );

        Ok(Self {
            site_id: toml_config.site.id,
            mqtt_host: toml_config.mqtt.host,
            mqtt_port: toml_config.mqtt.port,
            mqtt_client_id: toml_config.mqtt.client_id,
            mqtt_keep_alive_secs: toml_config.mqtt.keep_alive_secs,
            mqtt_username: toml_config.mqtt.username,
            mqtt_password: toml_config.mqtt.password,
            topic_prefix: toml_config.mqtt.topic_prefix,
            rest_base_url: toml_config.rest.base_url,
            rest_timeout_ms: toml_config.rest.timeout_ms,
            barrier_opening_ms: toml_config.barrier.opening_ms,
            barrier_opened_ms: toml_config.barrier.opened_ms,
            barrier_closing_ms: toml_config.barrier.closing_ms,
            spot_ids,
            threshold_cm: sensors.threshold_cm,
            debounce_n: sensors.debounce_n,
            read_interval_ms: sensors.read_interval_ms,
            free_distance_cm: sensors.free_distance_cm,
            park_distance_cm: sensors.park_distance_cm,
            noise_cm: sensors.noise_cm,
            gate_occupied_ms: sensors.gate_occupied_ms,
            gate_idle_ms: sensors.gate_idle_ms,
            roles: toml_config.roles,
            broker_enabled: toml_config.broker.enabled,
            broker_bind_address: toml_config.broker.bind_address,
            broker_port: toml_config.broker.port,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            status_api_port: toml_config.status_api.port,
            config_file: path.display().to_string(),
        })
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(args: &[String]) -> Self {
        Self::load_from_path(&Self::resolve_config_path(args))
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %format!("{:#}", e), "config_load_failed_using_defaults");
                Self::default()
            }
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn mqtt_host(&self) -> &str {
        &self.mqtt_host
    }

    pub fn mqtt_port(&self) -> u16 {
        self.mqtt_port
    }

    pub fn mqtt_client_id(&self) -> &str {
        &self.mqtt_client_id
    }

    pub fn mqtt_keep_alive(&self) -> Duration {
        Duration::from_secs(self.mqtt_keep_alive_secs)
    }

    pub fn mqtt_username(&self) -> Option<&str> {
        self.mqtt_username.as_deref()
    }

    pub fn mqtt_password(&self) -> Option<&str> {
        self.mqtt_password.as_deref()
    }

    pub fn topic_prefix(&self) -> &str {
        &self.topic_prefix
    }

    pub fn rest_base_url(&self) -> &str {
        &self.rest_base_url
    }

    pub fn rest_timeout(&self) -> Duration {
        Duration::from_millis(self.rest_timeout_ms)
    }

    /// Delays after OPENING, OPENED and CLOSING, in that order
    pub fn barrier_timings(&self) -> [Duration; 3] {
        [
            Duration::from_millis(self.barrier_opening_ms),
            Duration::from_millis(self.barrier_opened_ms),
            Duration::from_millis(self.barrier_closing_ms),
        ]
    }

    pub fn spot_ids(&self) -> &[String] {
        &self.spot_ids
    }

    pub fn threshold_cm(&self) -> f64 {
        self.threshold_cm
    }

    pub fn debounce_n(&self) -> u32 {
        self.debounce_n
    }

    pub fn read_interval(&self) -> Duration {
        Duration::from_millis(self.read_interval_ms)
    }

    pub fn free_distance_cm(&self) -> (f64, f64) {
        (self.free_distance_cm[0], self.free_distance_cm[1])
    }

    pub fn park_distance_cm(&self) -> (f64, f64) {
        (self.park_distance_cm[0], self.park_distance_cm[1])
    }

    pub fn noise_cm(&self) -> f64 {
        self.noise_cm
    }

    pub fn gate_occupied_range(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.gate_occupied_ms[0]),
            Duration::from_millis(self.gate_occupied_ms[1]),
        )
    }

    pub fn gate_idle_range(&self) -> (Duration, Duration) {
        (Duration::from_millis(self.gate_idle_ms[0]), Duration::from_millis(self.gate_idle_ms[1]))
    }

    pub fn roles(&self) -> &RolesConfig {
        &self.roles
    }

    pub fn broker_enabled(&self) -> bool {
        self.broker_enabled
    }

    pub fn broker_bind_address(&self) -> &str {
        &self.broker_bind_address
    }

    pub fn broker_port(&self) -> u16 {
        self.broker_port
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn status_api_port(&self) -> u16 {
        self.status_api_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method to override barrier phase delays (ms)
    pub fn with_barrier_timings(mut self, opening_ms: u64, opened_ms: u64, closing_ms: u64) -> Self {
        self.barrier_opening_ms = opening_ms;
        self.barrier_opened_ms = opened_ms;
        self.barrier_closing_ms = closing_ms;
        self
    }

    /// Builder method to override the spot layout
    pub fn with_spot_ids(mut self, spot_ids: Vec<String>) -> Self {
        self.spot_ids = spot_ids;
        self
    }
}
