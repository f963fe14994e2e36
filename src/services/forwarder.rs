//! Mirrors bus-observed spot and barrier state into the REST store
//!
//! Spot updates are idempotent upserts: `PUT` the status, and on NotFound
//! create the place (`POST`), announce it once on the config topic, then
//! retry the `PUT` exactly once. Conflict/already-exists on create counts as
//! success, since two messages for the same new spot may race. Transport
//! failures are logged and the event is dropped; the next event for the same
//! entity overwrites the store state again.

use crate::domain::messages::{BarrierStateEvent, NewSpotPayload, SpotConfigCmd, SpotStatusEvent};
use crate::domain::topics::Topics;
use crate::domain::types::{BarrierId, SpotId};
use crate::infra::metrics::Metrics;
use crate::io::bus::BusSender;
use crate::io::rest::{
    BarrierStateUpdate, CreateOutcome, PlaceCreate, PlaceStatusUpdate, PlaceStore, StoreError,
    UpdateOutcome,
};
use rumqttc::QoS;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Spot IDs whose "new spot" announcement has been published
///
/// Append-only for the life of the process; a restart may re-announce.
#[derive(Debug, Default)]
pub struct AnnouncedSpots {
    ids: FxHashSet<SpotId>,
}

impl AnnouncedSpots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, spot_id: &SpotId) -> bool {
        self.ids.contains(spot_id)
    }

    /// Returns false if the id was already registered
    pub fn insert(&mut self, spot_id: SpotId) -> bool {
        self.ids.insert(spot_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

pub struct Forwarder {
    store: Arc<dyn PlaceStore>,
    bus: BusSender,
    topics: Topics,
    announced: AnnouncedSpots,
    metrics: Arc<Metrics>,
}

impl Forwarder {
    pub fn new(store: Arc<dyn PlaceStore>, bus: BusSender, topics: Topics, metrics: Arc<Metrics>) -> Self {
        Self { store, bus, topics, announced: AnnouncedSpots::new(), metrics }
    }

    pub fn announced(&self) -> &AnnouncedSpots {
        &self.announced
    }

    /// Upsert one spot status into the store
    pub async fn on_spot_status(&mut self, event: &SpotStatusEvent) {
        let spot_id = &event.spot_id;
        if spot_id.as_str().is_empty() {
            return;
        }
        let body = PlaceStatusUpdate::from(event);

        match self.put_status(spot_id, &body).await {
            Some(UpdateOutcome::Updated) => {
                debug!(spot_id = %spot_id, status = %event.status, "spot_forwarded");
            }
            Some(UpdateOutcome::Rejected(code)) => {
                warn!(spot_id = %spot_id, status = %event.status, http_status = %code, "spot_update_rejected");
            }
            Some(UpdateOutcome::NotFound) => {
                self.metrics.record_rest_not_found();
                self.create_and_retry(event, &body).await;
            }
            None => {}
        }
    }

    async fn create_and_retry(&mut self, event: &SpotStatusEvent, body: &PlaceStatusUpdate) {
        let spot_id = &event.spot_id;
        let create = PlaceCreate::from_event(event);

        self.metrics.record_rest_call();
        let created = match self.store.create_place(&create).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.record_transport_failure("create_place", spot_id.as_str(), &e);
                return;
            }
        };

        match created {
            CreateOutcome::Created => {
                self.metrics.record_spot_created();
                info!(spot_id = %spot_id, "spot_created");
            }
            CreateOutcome::AlreadyExists => {
                debug!(spot_id = %spot_id, "spot_already_exists");
            }
            CreateOutcome::Rejected(code) => {
                warn!(spot_id = %spot_id, http_status = %code, "spot_create_rejected");
            }
        }

        if created.exists() {
            self.announce_once(spot_id).await;
        }

        match self.put_status(spot_id, body).await {
            Some(UpdateOutcome::Updated) => {
                info!(spot_id = %spot_id, status = %event.status, "spot_forwarded_after_create");
            }
            Some(outcome) => {
                warn!(spot_id = %spot_id, outcome = ?outcome, "spot_retry_failed");
            }
            None => {}
        }
    }

    /// Publish the new-spot announcement unless this id was already announced
    async fn announce_once(&mut self, spot_id: &SpotId) {
        if self.announced.contains(spot_id) {
            return;
        }
        let payload = NewSpotPayload { id: spot_id.to_string(), cmd: SpotConfigCmd::Add };
        if self.bus.publish_json(self.topics.new_spot(), &payload, QoS::AtLeastOnce, false).await {
            self.announced.insert(spot_id.clone());
            self.metrics.record_announcement();
            info!(spot_id = %spot_id, "new_spot_announced");
        }
    }

    async fn put_status(&self, spot_id: &SpotId, body: &PlaceStatusUpdate) -> Option<UpdateOutcome> {
        self.metrics.record_rest_call();
        match self.store.update_place_status(spot_id, body).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                self.record_transport_failure("update_place_status", spot_id.as_str(), &e);
                None
            }
        }
    }

    /// Mirror a barrier phase; barriers are provisioned out of band, so no create path
    pub async fn on_barrier_state(&mut self, barrier_id: &BarrierId, event: BarrierStateEvent) {
        let body = BarrierStateUpdate { state: event.state };
        self.metrics.record_rest_call();
        match self.store.update_barrier_state(barrier_id, &body).await {
            Ok(UpdateOutcome::Updated) => {
                debug!(barrier_id = %barrier_id, state = %event.state, "barrier_state_forwarded");
            }
            Ok(outcome) => {
                warn!(barrier_id = %barrier_id, state = %event.state, outcome = ?outcome, "barrier_state_rejected");
            }
            Err(e) => self.record_transport_failure("update_barrier_state", barrier_id.as_str(), &e),
        }
    }

    fn record_transport_failure(&self, call: &'static str, id: &str, e: &StoreError) {
        self.metrics.record_rest_transport_failure();
        warn!(call = call, id = %id, error = %e, "rest_transport_failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::messages::SpotReadings;
    use crate::domain::types::{BarrierPhase, SpotStatus};
    use crate::io::bus::{create_bus_channel, OutboundMessage};
    use crate::io::memory_store::{MemoryPlaceStore, StoreCall};
    use tokio::sync::mpsc;

    const PREFIX: &str = "smart_parking_2026";

    fn forwarder(store: Arc<MemoryPlaceStore>) -> (Forwarder, mpsc::Receiver<OutboundMessage>) {
        let (bus, rx) = create_bus_channel(64);
        let fwd = Forwarder::new(store, bus, Topics::new(PREFIX), Arc::new(Metrics::new()));
        (fwd, rx)
    }

    fn spot_event(id: &str, status: SpotStatus) -> SpotStatusEvent {
        SpotStatusEvent {
            spot_id: SpotId(id.to_string()),
            status,
            label: None,
            readings: SpotReadings { distance_cm: Some(20.0), threshold_cm: Some(50.0), debounce_n: Some(4) },
        }
    }

    fn drain(rx: &mut mpsc::Receiver<OutboundMessage>) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    fn spot(id: &str) -> SpotId {
        SpotId(id.to_string())
    }

    #[tokio::test]
    async fn test_known_spot_single_put() {
        let store = Arc::new(MemoryPlaceStore::new().with_place("A01"));
        let (mut fwd, mut rx) = forwarder(store.clone());

        fwd.on_spot_status(&spot_event("A01", SpotStatus::Occupied)).await;

        assert_eq!(store.calls(), vec![StoreCall::UpdateStatus(spot("A01"), SpotStatus::Occupied)]);
        assert_eq!(store.place("A01").unwrap().status, SpotStatus::Occupied);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_unknown_spot_create_announce_retry() {
        let store = Arc::new(MemoryPlaceStore::new());
        let (mut fwd, mut rx) = forwarder(store.clone());

        fwd.on_spot_status(&spot_event("A05", SpotStatus::Occupied)).await;

        assert_eq!(
            store.calls(),
            vec![
                StoreCall::UpdateStatus(spot("A05"), SpotStatus::Occupied),
                StoreCall::Create(spot("A05")),
                StoreCall::UpdateStatus(spot("A05"), SpotStatus::Occupied),
            ]
        );
        assert_eq!(store.place("A05").unwrap().status, SpotStatus::Occupied);

        let published = drain(&mut rx);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "smart_parking_2026/parking/config/new_spot");
        assert!(!published[0].retain);
        assert_eq!(published[0].json().unwrap(), serde_json::json!({"id": "A05", "cmd": "ADD"}));
    }

    #[tokio::test]
    async fn test_repeated_not_found_announces_once() {
        let store = Arc::new(MemoryPlaceStore::new().with_forgetful_creates());
        let (mut fwd, mut rx) = forwarder(store.clone());

        let event = spot_event("A07", SpotStatus::Free);
        fwd.on_spot_status(&event).await;
        fwd.on_spot_status(&event).await;
        fwd.on_spot_status(&event).await;

        // Each event: PUT(404), POST, PUT(404 again) - no further retries
        assert_eq!(store.calls().len(), 9);
        assert_eq!(drain(&mut rx).len(), 1);
        assert!(fwd.announced().contains(&spot("A07")));
    }

    #[tokio::test]
    async fn test_conflict_on_create_counts_as_created() {
        let store = Arc::new(MemoryPlaceStore::new().with_racing_creates());
        let (mut fwd, mut rx) = forwarder(store.clone());

        fwd.on_spot_status(&spot_event("A09", SpotStatus::Occupied)).await;

        assert_eq!(store.calls().len(), 3);
        assert_eq!(store.place("A09").unwrap().status, SpotStatus::Occupied);
        assert_eq!(drain(&mut rx).len(), 1);
    }

    #[tokio::test]
    async fn test_transport_failure_not_retried() {
        let store = Arc::new(MemoryPlaceStore::new());
        store.set_offline(true);
        let metrics = Arc::new(Metrics::new());
        let (bus, mut rx) = create_bus_channel(8);
        let mut fwd = Forwarder::new(store.clone(), bus, Topics::new(PREFIX), metrics.clone());

        fwd.on_spot_status(&spot_event("A02", SpotStatus::Occupied)).await;

        assert!(store.calls().is_empty());
        assert!(drain(&mut rx).is_empty());
        let summary = metrics.report();
        assert_eq!(summary.rest_calls, 1);
        assert_eq!(summary.rest_transport_failures, 1);

        // Store comes back: the next event self-heals
        store.set_offline(false);
        fwd.on_spot_status(&spot_event("A02", SpotStatus::Occupied)).await;
        assert_eq!(store.place("A02").unwrap().status, SpotStatus::Occupied);
    }

    #[tokio::test]
    async fn test_create_transport_failure_aborts_without_retry() {
        let store = Arc::new(MemoryPlaceStore::new().with_create_timeouts());
        let metrics = Arc::new(Metrics::new());
        let (bus, mut rx) = create_bus_channel(8);
        let mut fwd = Forwarder::new(store.clone(), bus, Topics::new(PREFIX), metrics.clone());

        fwd.on_spot_status(&spot_event("A03", SpotStatus::Occupied)).await;

        assert_eq!(
            store.calls(),
            vec![StoreCall::UpdateStatus(spot("A03"), SpotStatus::Occupied), StoreCall::Create(spot("A03"))]
        );
        assert!(drain(&mut rx).is_empty());
        assert!(fwd.announced().is_empty());
        let summary = metrics.report();
        assert_eq!(summary.rest_calls, 2);
        assert_eq!(summary.rest_transport_failures, 1);
        assert_eq!(summary.announcements_published, 0);
    }

    #[tokio::test]
    async fn test_rejected_create_skips_announcement_but_retries_once() {
        let store = Arc::new(MemoryPlaceStore::new().with_rejected_creates(500));
        let metrics = Arc::new(Metrics::new());
        let (bus, mut rx) = create_bus_channel(8);
        let mut fwd = Forwarder::new(store.clone(), bus, Topics::new(PREFIX), metrics.clone());

        fwd.on_spot_status(&spot_event("A04", SpotStatus::Free)).await;

        assert_eq!(
            store.calls(),
            vec![
                StoreCall::UpdateStatus(spot("A04"), SpotStatus::Free),
                StoreCall::Create(spot("A04")),
                StoreCall::UpdateStatus(spot("A04"), SpotStatus::Free),
            ]
        );
        assert!(store.place("A04").is_none());
        assert!(drain(&mut rx).is_empty());
        assert!(!fwd.announced().contains(&spot("A04")));
        let summary = metrics.report();
        assert_eq!(summary.rest_calls, 3);
        assert_eq!(summary.rest_transport_failures, 0);
        assert_eq!(summary.spots_created, 0);
    }

    #[tokio::test]
    async fn test_barrier_state_forwarded_without_create() {
        let store = Arc::new(MemoryPlaceStore::new());
        let (mut fwd, mut rx) = forwarder(store.clone());

        let barrier = BarrierId("entry".to_string());
        fwd.on_barrier_state(&barrier, BarrierStateEvent { state: BarrierPhase::Opening }).await;

        assert_eq!(store.calls(), vec![StoreCall::UpdateBarrier(barrier, BarrierPhase::Opening)]);
        assert_eq!(store.barrier("entry"), Some(BarrierPhase::Opening));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_registry_append_only() {
        let mut registry = AnnouncedSpots::new();
        assert!(registry.is_empty());
        assert!(registry.insert(spot("A01")));
        assert!(!registry.insert(spot("A01")));
        assert_eq!(registry.len(), 1);
    }
}
