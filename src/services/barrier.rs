//! Barrier controller - timed open/close sequence per barrier
//!
//! CLOSED → OPENING → OPENED → CLOSING → CLOSED. Each phase is published on
//! the barrier's state topic before the delay for the next phase starts.
//! Every OPEN command spawns its own task, so a sequence never blocks message
//! dispatch or another barrier's sequence.
//!
//! An OPEN for a barrier that is already mid-sequence is ignored; the
//! barrier accepts a new OPEN once its previous sequence published CLOSED.

use crate::domain::messages::{BarrierCommand, BarrierStatePayload};
use crate::domain::topics::Topics;
use crate::domain::types::{BarrierAction, BarrierId, BarrierPhase};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::bus::BusSender;
use parking_lot::Mutex;
use rumqttc::QoS;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

/// Delays spent in each moving/open phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierTimings {
    pub opening: Duration,
    pub opened: Duration,
    pub closing: Duration,
}

impl BarrierTimings {
    pub fn from_config(config: &Config) -> Self {
        let [opening, opened, closing] = config.barrier_timings();
        Self { opening, opened, closing }
    }

    /// Delay before leaving `phase`; None once the barrier is closed
    pub fn dwell(&self, phase: BarrierPhase) -> Option<Duration> {
        match phase {
            BarrierPhase::Opening => Some(self.opening),
            BarrierPhase::Opened => Some(self.opened),
            BarrierPhase::Closing => Some(self.closing),
            BarrierPhase::Closed => None,
        }
    }

    pub fn total(&self) -> Duration {
        self.opening + self.opened + self.closing
    }
}

/// One live open/close cycle; dropped when it reaches CLOSED
#[derive(Debug)]
pub struct BarrierSequence {
    barrier_id: BarrierId,
    phase: BarrierPhase,
    started_at: Instant,
}

impl BarrierSequence {
    pub fn new(barrier_id: BarrierId) -> Self {
        Self { barrier_id, phase: BarrierPhase::Closed, started_at: Instant::now() }
    }

    /// Move to the next phase and return it with the time to hold it
    pub fn advance(&mut self, timings: &BarrierTimings) -> (BarrierPhase, Option<Duration>) {
        self.phase = self.phase.next();
        (self.phase, timings.dwell(self.phase))
    }

    pub fn phase(&self) -> BarrierPhase {
        self.phase
    }

    pub fn barrier_id(&self) -> &BarrierId {
        &self.barrier_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

type ActiveSet = Arc<Mutex<FxHashSet<BarrierId>>>;

/// Releases a barrier's active slot when its task ends, even on cancellation
struct ActiveGuard {
    active: ActiveSet,
    barrier_id: BarrierId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.barrier_id);
    }
}

pub struct BarrierController {
    bus: BusSender,
    topics: Topics,
    timings: BarrierTimings,
    active: ActiveSet,
    metrics: Arc<Metrics>,
}

impl BarrierController {
    pub fn new(bus: BusSender, topics: Topics, timings: BarrierTimings, metrics: Arc<Metrics>) -> Self {
        Self { bus, topics, timings, active: Arc::new(Mutex::new(FxHashSet::default())), metrics }
    }

    /// Whether a sequence is currently running for this barrier
    pub fn is_active(&self, barrier_id: &BarrierId) -> bool {
        self.active.lock().contains(barrier_id)
    }

    /// Handle a command; returns the spawned sequence task, if any
    pub fn on_command(&self, barrier_id: BarrierId, command: BarrierCommand) -> Option<JoinHandle<()>> {
        match command.action {
            BarrierAction::Open => self.open(barrier_id),
        }
    }

    fn open(&self, barrier_id: BarrierId) -> Option<JoinHandle<()>> {
        if !self.active.lock().insert(barrier_id.clone()) {
            self.metrics.record_barrier_ignored();
            warn!(barrier_id = %barrier_id, "barrier_open_ignored_busy");
            return None;
        }
        self.metrics.record_barrier_started();

        let guard = ActiveGuard { active: self.active.clone(), barrier_id: barrier_id.clone() };
        let sequence = BarrierSequence::new(barrier_id);
        let bus = self.bus.clone();
        let topic = self.topics.barrier_state(sequence.barrier_id());
        let timings = self.timings;
        let metrics = self.metrics.clone();

        Some(tokio::spawn(async move {
            let _guard = guard;
            run_sequence(sequence, bus, topic, timings, metrics).await;
        }))
    }
}

async fn run_sequence(
    mut sequence: BarrierSequence,
    bus: BusSender,
    topic: String,
    timings: BarrierTimings,
    metrics: Arc<Metrics>,
) {
    info!(barrier_id = %sequence.barrier_id(), "barrier_sequence_started");

    loop {
        let (phase, dwell) = sequence.advance(&timings);
        let payload = BarrierStatePayload { state: phase };
        if !bus.publish_json(topic.clone(), &payload, QoS::AtLeastOnce, false).await {
            warn!(barrier_id = %sequence.barrier_id(), phase = %phase, "barrier_sequence_aborted");
            return;
        }
        info!(barrier_id = %sequence.barrier_id(), phase = %phase, "barrier_phase");

        match dwell {
            Some(delay) => tokio::time::sleep(delay).await,
            None => break,
        }
    }

    metrics.record_barrier_completed();
    info!(
        barrier_id = %sequence.barrier_id(),
        duration_ms = %sequence.elapsed().as_millis(),
        "barrier_sequence_completed"
    );
}
