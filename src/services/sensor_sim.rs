//! Simulated sensor node: parking-spot distance sensors plus entry/exit gates
//!
//! Each spot has a small world model (car present or not, switching after a
//! random parked/free duration scaled by the spot's activity). Raw distances
//! are drawn from the park or free range with uniform noise and fed through
//! the occupancy detector. Only changes of the debounced status are
//! published, retained, so late subscribers see the current lot state.

use crate::domain::messages::{GateSensorPayload, SpotStatusPayload};
use crate::domain::topics::Topics;
use crate::domain::types::{now_ts, Gate, SpotId, SpotStatus};
use crate::infra::config::Config;
use crate::io::bus::BusSender;
use crate::services::detector::Spot;
use crate::services::gate_sensor::{GateSensor, RandomSchedule, ToggleSchedule};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rumqttc::QoS;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info};

const ACTIVITY_RANGE: (f64, f64) = (0.6, 1.6);
const PARKED_SECS: (f64, f64) = (45.0, 180.0);
const FREE_SECS: (f64, f64) = (30.0, 150.0);

/// Distance ranges reported with and without a car, plus sensor noise
#[derive(Debug, Clone, Copy)]
pub struct DistanceModel {
    pub free_cm: (f64, f64),
    pub park_cm: (f64, f64),
    pub noise_cm: f64,
}

impl DistanceModel {
    pub fn from_config(config: &Config) -> Self {
        Self {
            free_cm: config.free_distance_cm(),
            park_cm: config.park_distance_cm(),
            noise_cm: config.noise_cm(),
        }
    }

    pub fn sample(&self, has_car: bool, rng: &mut StdRng) -> f64 {
        let (lo, hi) = if has_car { self.park_cm } else { self.free_cm };
        let base = uniform(rng, lo, hi);
        let noise = uniform(rng, -self.noise_cm.abs(), self.noise_cm.abs());
        (base + noise).max(0.0)
    }
}

fn uniform(rng: &mut StdRng, a: f64, b: f64) -> f64 {
    if a < b {
        rng.gen_range(a..=b)
    } else if b < a {
        rng.gen_range(b..=a)
    } else {
        a
    }
}

/// One parking spot with its simulated car and debounced detector
pub struct SimulatedSpot {
    spot: Spot,
    has_car: bool,
    activity: f64,
    next_switch: Instant,
    last_published: Option<SpotStatus>,
}

impl SimulatedSpot {
    pub fn new(id: SpotId, now: Instant, rng: &mut StdRng) -> Self {
        let activity = uniform(rng, ACTIVITY_RANGE.0, ACTIVITY_RANGE.1);
        let mut spot = Self {
            spot: Spot::new(id),
            has_car: false,
            activity,
            next_switch: now,
            last_published: None,
        };
        spot.next_switch = now + spot.dwell(rng);
        spot
    }

    fn dwell(&self, rng: &mut StdRng) -> Duration {
        let (lo, hi) = if self.has_car { PARKED_SECS } else { FREE_SECS };
        Duration::from_secs_f64(uniform(rng, lo, hi) / self.activity)
    }

    fn update_world(&mut self, now: Instant, rng: &mut StdRng) {
        if now >= self.next_switch {
            self.has_car = !self.has_car;
            self.next_switch = now + self.dwell(rng);
        }
    }

    /// Take one reading; returns the stable status if it changed since the last publish
    pub fn read(
        &mut self,
        now: Instant,
        model: &DistanceModel,
        threshold_cm: f64,
        debounce_n: u32,
        rng: &mut StdRng,
    ) -> Option<SpotStatus> {
        self.update_world(now, rng);
        let distance = model.sample(self.has_car, rng);
        let status = self.spot.observe(distance, threshold_cm, debounce_n);
        if self.last_published == Some(status) {
            return None;
        }
        self.last_published = Some(status);
        Some(status)
    }

    pub fn id(&self) -> &SpotId {
        self.spot.id()
    }

    pub fn has_car(&self) -> bool {
        self.has_car
    }

    pub fn raw_distance_cm(&self) -> f64 {
        self.spot.raw_distance_cm()
    }
}

struct SimulatedGate<S: ToggleSchedule> {
    sensor: GateSensor<S>,
    last_published: Option<SpotStatus>,
}

impl<S: ToggleSchedule> SimulatedGate<S> {
    fn step(&mut self, now: Instant) -> Option<SpotStatus> {
        let state = self.sensor.step(now);
        if self.last_published == Some(state) {
            return None;
        }
        self.last_published = Some(state);
        Some(state)
    }
}

pub struct SensorNode<S: ToggleSchedule> {
    spots: Vec<SimulatedSpot>,
    entry: SimulatedGate<S>,
    exit: SimulatedGate<S>,
    model: DistanceModel,
    threshold_cm: f64,
    debounce_n: u32,
    topics: Topics,
    bus: BusSender,
    rng: StdRng,
}

impl SensorNode<RandomSchedule> {
    /// Node for every configured spot, with random gate intervals
    pub fn from_config(config: &Config, bus: BusSender) -> Self {
        let schedule = || RandomSchedule::new(config.gate_occupied_range(), config.gate_idle_range());
        SensorNode::new(config, bus, schedule(), schedule(), StdRng::from_entropy())
    }
}

impl<S: ToggleSchedule> SensorNode<S> {
    pub fn new(config: &Config, bus: BusSender, entry_schedule: S, exit_schedule: S, mut rng: StdRng) -> Self {
        let now = Instant::now();
        let topics = Topics::new(config.topic_prefix());
        let spots = config
            .spot_ids()
            .iter()
            .map(|id| SimulatedSpot::new(SpotId(id.clone()), now, &mut rng))
            .collect();
        let make_gate = |gate: Gate, schedule: S| SimulatedGate {
            sensor: GateSensor::new(gate.as_str().to_ascii_uppercase(), topics.gate_sensor(gate), now, schedule),
            last_published: None,
        };
        let entry = make_gate(Gate::Entry, entry_schedule);
        let exit = make_gate(Gate::Exit, exit_schedule);

        Self {
            spots,
            entry,
            exit,
            model: DistanceModel::from_config(config),
            threshold_cm: config.threshold_cm(),
            debounce_n: config.debounce_n(),
            topics,
            bus,
            rng,
        }
    }

    pub fn spots(&self) -> &[SimulatedSpot] {
        &self.spots
    }

    /// Read every sensor once and publish changes; returns the number published
    pub async fn tick(&mut self, now: Instant) -> usize {
        let mut published = 0;

        for spot in self.spots.iter_mut() {
            let Some(status) = spot.read(now, &self.model, self.threshold_cm, self.debounce_n, &mut self.rng) else {
                continue;
            };
            let payload = SpotStatusPayload {
                id: spot.id().to_string(),
                status,
                distance_cm: (spot.raw_distance_cm() * 10.0).round() / 10.0,
                threshold_cm: self.threshold_cm,
                debounce_n: self.debounce_n,
                ts: now_ts(),
            };
            let topic = self.topics.spot_status(spot.id());
            if self.bus.publish_json(topic, &payload, QoS::AtLeastOnce, true).await {
                published += 1;
                debug!(spot_id = %payload.id, status = %status, distance_cm = %payload.distance_cm, "spot_published");
            }
        }

        for gate in [&mut self.entry, &mut self.exit] {
            let Some(status) = gate.step(now) else {
                continue;
            };
            let payload = GateSensorPayload { status, ts: now_ts() };
            if self.bus.publish_json(gate.sensor.topic().to_string(), &payload, QoS::AtLeastOnce, true).await {
                published += 1;
                debug!(gate = %gate.sensor.name(), status = %status, "gate_published");
            }
        }

        published
    }

    pub async fn run(mut self, read_interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(spots = %self.spots.len(), interval_ms = %read_interval.as_millis(), "sensor_node_started");
        let mut interval = tokio::time::interval(read_interval);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(Instant::now()).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("sensor_node_stopped");
    }
}
