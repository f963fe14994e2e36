//! Entry/exit arbitration
//!
//! Requests a barrier open when a gate sensor turns OCCUPIED. The entry gate
//! is opened only while the last observed availability count is positive; a
//! denied entry is neither queued nor retried. The exit gate always opens.

use crate::domain::messages::{AvailabilityEvent, BarrierCommandPayload, GateSensorEvent};
use crate::domain::topics::Topics;
use crate::domain::types::{now_ts, BarrierAction, Gate, SpotStatus};
use crate::infra::metrics::Metrics;
use crate::io::bus::BusSender;
use rumqttc::QoS;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of one gate-sensor event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// OPEN command published
    Opened,
    /// Entry requested while the lot is full
    Denied,
    /// Not a transition to OCCUPIED
    Ignored,
}

pub struct Arbitration {
    bus: BusSender,
    topics: Topics,
    available: i64,
    entry_state: Option<SpotStatus>,
    exit_state: Option<SpotStatus>,
    metrics: Arc<Metrics>,
}

impl Arbitration {
    /// Availability is unknown (treated as 0) until the first summary arrives
    pub fn new(bus: BusSender, topics: Topics, metrics: Arc<Metrics>) -> Self {
        Self { bus, topics, available: 0, entry_state: None, exit_state: None, metrics }
    }

    pub fn available(&self) -> i64 {
        self.available
    }

    pub fn on_availability(&mut self, event: AvailabilityEvent) {
        if event.count != self.available {
            debug!(previous = %self.available, count = %event.count, "availability_updated");
        }
        self.available = event.count;
    }

    pub async fn on_gate_sensor(&mut self, gate: Gate, event: GateSensorEvent) -> Decision {
        let slot = match gate {
            Gate::Entry => &mut self.entry_state,
            Gate::Exit => &mut self.exit_state,
        };
        let previous = slot.replace(event.status);

        // Repeated OCCUPIED (e.g. broker redelivery) is not a new car
        if event.status != SpotStatus::Occupied || previous == Some(SpotStatus::Occupied) {
            return Decision::Ignored;
        }

        if gate == Gate::Entry && self.available <= 0 {
            self.metrics.record_entry_denied();
            info!(gate = %gate, available = %self.available, "entry_denied_full");
            return Decision::Denied;
        }

        let barrier_id = gate.barrier_id();
        let payload = BarrierCommandPayload { action: BarrierAction::Open, ts: now_ts() };
        if !self.bus.publish_json(self.topics.barrier_cmd(&barrier_id), &payload, QoS::AtLeastOnce, false).await {
            warn!(gate = %gate, "open_command_not_queued");
            return Decision::Ignored;
        }

        self.metrics.record_open_command();
        info!(gate = %gate, barrier_id = %barrier_id, available = %self.available, "open_command_published");
        Decision::Opened
    }
}
