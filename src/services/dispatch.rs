//! Single cooperative dispatch path from the bus to the service handlers
//!
//! Messages are handled one at a time in arrival order. Each topic is routed,
//! its payload decoded once, then handed to every enabled role that cares
//! about it. Malformed payloads and unroutable topics are counted and dropped
//! before any handler runs. Barrier sequences are spawned and never awaited
//! here. An attached `ParkingView` tracks spot and barrier state even when
//! the availability role is off.

use crate::domain::messages::{
    AvailabilityEvent, BarrierCommand, BarrierStateEvent, GateSensorEvent, SpotStatusEvent,
};
use crate::domain::topics::{Route, Topics};
use crate::domain::types::Gate;
use crate::domain::MessageError;
use crate::infra::metrics::Metrics;
use crate::io::bus::BusMessage;
use crate::services::arbitration::Arbitration;
use crate::services::availability::{AvailabilityAggregator, SharedView};
use crate::services::barrier::BarrierController;
use crate::services::forwarder::Forwarder;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub struct Dispatcher {
    topics: Topics,
    metrics: Arc<Metrics>,
    forwarder: Option<Forwarder>,
    barrier: Option<BarrierController>,
    arbitration: Option<Arbitration>,
    availability: Option<AvailabilityAggregator>,
    view: Option<SharedView>,
}

impl Dispatcher {
    /// Dispatcher with no roles; add them with the `with_*` builders
    pub fn new(topics: Topics, metrics: Arc<Metrics>) -> Self {
        Self { topics, metrics, forwarder: None, barrier: None, arbitration: None, availability: None, view: None }
    }

    pub fn with_forwarder(mut self, forwarder: Forwarder) -> Self {
        self.forwarder = Some(forwarder);
        self
    }

    pub fn with_barrier(mut self, barrier: BarrierController) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn with_arbitration(mut self, arbitration: Arbitration) -> Self {
        self.arbitration = Some(arbitration);
        self
    }

    pub fn with_availability(mut self, availability: AvailabilityAggregator) -> Self {
        self.availability = Some(availability);
        self
    }

    /// View served by the status API; the availability role keeps its own reference
    pub fn with_view(mut self, view: SharedView) -> Self {
        self.view = Some(view);
        self
    }

    pub fn forwarder(&self) -> Option<&Forwarder> {
        self.forwarder.as_ref()
    }

    pub fn arbitration(&self) -> Option<&Arbitration> {
        self.arbitration.as_ref()
    }

    /// Topic filters needed by the enabled roles, without duplicates
    pub fn subscriptions(&self) -> Vec<String> {
        let t = &self.topics;
        let mut filters = Vec::new();
        if self.forwarder.is_some() || self.availability.is_some() || self.view.is_some() {
            filters.push(t.spot_status_filter());
            filters.push(t.barrier_state_filter());
        }
        if self.barrier.is_some() {
            filters.push(t.barrier_cmd_filter());
        }
        if self.arbitration.is_some() {
            filters.push(t.gate_sensor(Gate::Entry));
            filters.push(t.gate_sensor(Gate::Exit));
            filters.push(t.available());
        }
        filters
    }

    /// Publish startup state (the initial availability count)
    pub async fn start(&mut self) {
        if let Some(availability) = self.availability.as_mut() {
            availability.publish_current().await;
        }
    }

    /// Handle one message; returns the barrier task if one was spawned
    pub async fn dispatch(&mut self, message: BusMessage) -> Option<JoinHandle<()>> {
        let Some(route) = self.topics.route(&message.topic) else {
            self.metrics.record_message_unroutable();
            debug!(topic = %message.topic, "message_unroutable");
            return None;
        };

        match route {
            Route::SpotStatus(_) => {
                let event = self.decode(&message, SpotStatusEvent::decode)?;
                if let Some(forwarder) = self.forwarder.as_mut() {
                    forwarder.on_spot_status(&event).await;
                }
                if let Some(availability) = self.availability.as_mut() {
                    availability.on_spot_status(&event).await;
                } else if let Some(view) = self.view.as_ref() {
                    view.write().apply_spot_status(&event);
                }
            }
            Route::BarrierState(barrier_id) => {
                let event = self.decode(&message, BarrierStateEvent::decode)?;
                if let Some(availability) = self.availability.as_mut() {
                    availability.on_barrier_state(barrier_id.clone(), event);
                } else if let Some(view) = self.view.as_ref() {
                    view.write().set_barrier(barrier_id.clone(), event.state);
                }
                if let Some(forwarder) = self.forwarder.as_mut() {
                    forwarder.on_barrier_state(&barrier_id, event).await;
                }
            }
            Route::BarrierCommand(barrier_id) => {
                let command = self.decode(&message, BarrierCommand::decode)?;
                return self.barrier.as_ref().and_then(|barrier| barrier.on_command(barrier_id, command));
            }
            Route::GateSensor(gate) => {
                let event = self.decode(&message, GateSensorEvent::decode)?;
                if let Some(arbitration) = self.arbitration.as_mut() {
                    arbitration.on_gate_sensor(gate, event).await;
                }
            }
            Route::Availability => {
                let event = self.decode(&message, AvailabilityEvent::decode)?;
                if let Some(arbitration) = self.arbitration.as_mut() {
                    arbitration.on_availability(event);
                }
            }
            Route::NewSpot => {
                debug!(topic = %message.topic, "new_spot_observed");
            }
        }
        None
    }

    /// Decode a payload, counting and dropping it if malformed
    fn decode<T>(&self, message: &BusMessage, decoder: fn(&[u8]) -> Result<T, MessageError>) -> Option<T> {
        match decoder(&message.payload) {
            Ok(value) => Some(value),
            Err(e) => {
                self.metrics.record_message_malformed();
                debug!(topic = %message.topic, error = %e, "message_malformed");
                None
            }
        }
    }

    /// Drain the inbound channel until it closes or shutdown is signalled
    pub async fn run(&mut self, mut rx: mpsc::Receiver<BusMessage>, mut shutdown: watch::Receiver<bool>) {
        self.start().await;
        info!(filters = ?self.subscriptions(), "dispatcher_started");

        loop {
            tokio::select! {
                message = rx.recv() => {
                    match message {
                        Some(m) => {
                            self.dispatch(m).await;
                        }
                        None => break,
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("dispatcher_stopped");
    }
}
