//! Availability aggregation for the lot display
//!
//! Tracks the latest stable status of every configured spot and publishes the
//! free count (retained) whenever it changes. The same view backs the status
//! HTTP API, together with the last observed barrier phases.

use crate::domain::messages::{AvailabilityPayload, BarrierStateEvent, SpotStatusEvent};
use crate::domain::topics::Topics;
use crate::domain::types::{normalize_spot_id, now_ts, BarrierId, BarrierPhase, SpotId, SpotStatus};
use crate::io::bus::BusSender;
use parking_lot::RwLock;
use rumqttc::QoS;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParkingSummary {
    pub total: usize,
    pub occupied: usize,
    pub free: usize,
}

/// Latest known lot state
#[derive(Debug, Default)]
pub struct ParkingView {
    spots: BTreeMap<SpotId, SpotStatus>,
    barriers: BTreeMap<BarrierId, BarrierPhase>,
}

impl ParkingView {
    /// Every configured spot starts FREE; ids that do not normalize are skipped
    pub fn new<S: AsRef<str>>(spot_ids: &[S]) -> Self {
        let spots = spot_ids
            .iter()
            .filter_map(|id| normalize_spot_id(id.as_ref()))
            .map(|id| (id, SpotStatus::Free))
            .collect();
        Self { spots, barriers: BTreeMap::new() }
    }

    pub fn summary(&self) -> ParkingSummary {
        let total = self.spots.len();
        let occupied = self.spots.values().filter(|s| **s == SpotStatus::Occupied).count();
        ParkingSummary { total, occupied, free: total - occupied }
    }

    /// Returns false for spots outside the configured set
    pub fn set_spot(&mut self, spot_id: &SpotId, status: SpotStatus) -> bool {
        match self.spots.get_mut(spot_id) {
            Some(current) => {
                *current = status;
                true
            }
            None => false,
        }
    }

    /// Apply a bus status event; None when the id is invalid or not configured
    pub fn apply_spot_status(&mut self, event: &SpotStatusEvent) -> Option<ParkingSummary> {
        let Some(spot_id) = normalize_spot_id(event.spot_id.as_str()) else {
            debug!(spot_id = %event.spot_id, "view_spot_id_invalid");
            return None;
        };
        if !self.set_spot(&spot_id, event.status) {
            debug!(spot_id = %spot_id, "view_spot_unknown");
            return None;
        }
        Some(self.summary())
    }

    pub fn spot(&self, spot_id: &SpotId) -> Option<SpotStatus> {
        self.spots.get(spot_id).copied()
    }

    pub fn set_barrier(&mut self, barrier_id: BarrierId, phase: BarrierPhase) {
        self.barriers.insert(barrier_id, phase);
    }

    pub fn barriers(&self) -> &BTreeMap<BarrierId, BarrierPhase> {
        &self.barriers
    }
}

pub type SharedView = Arc<RwLock<ParkingView>>;

pub struct AvailabilityAggregator {
    view: SharedView,
    bus: BusSender,
    topics: Topics,
    last_published: Option<usize>,
}

impl AvailabilityAggregator {
    pub fn new(view: SharedView, bus: BusSender, topics: Topics) -> Self {
        Self { view, bus, topics, last_published: None }
    }

    pub fn view(&self) -> &SharedView {
        &self.view
    }

    /// Publish the current count unconditionally (startup)
    pub async fn publish_current(&mut self) {
        let free = self.view.read().summary().free;
        self.publish(free).await;
    }

    pub async fn on_spot_status(&mut self, event: &SpotStatusEvent) {
        let Some(summary) = self.view.write().apply_spot_status(event) else {
            return;
        };

        if self.last_published != Some(summary.free) {
            self.publish(summary.free).await;
        }
    }

    pub fn on_barrier_state(&mut self, barrier_id: BarrierId, event: BarrierStateEvent) {
        self.view.write().set_barrier(barrier_id, event.state);
    }

    async fn publish(&mut self, free: usize) {
        let payload = AvailabilityPayload { count: free, ts: now_ts() };
        if self.bus.publish_json(self.topics.available(), &payload, QoS::AtLeastOnce, true).await {
            self.last_published = Some(free);
            info!(count = %free, "availability_published");
        }
    }
}
