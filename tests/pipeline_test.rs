//! End-to-end dispatch tests: synthetic bus messages in, store calls and
//! bus publications out, with no broker or HTTP server involved.

use parking_lot::RwLock;
use smart_parking::domain::{BarrierPhase, SpotId, SpotStatus, Topics};
use smart_parking::infra::Metrics;
use smart_parking::io::memory_store::StoreCall;
use smart_parking::io::{create_bus_channel, BusMessage, MemoryPlaceStore, OutboundMessage};
use smart_parking::services::{
    Arbitration, AvailabilityAggregator, BarrierController, BarrierTimings, Dispatcher, Forwarder,
    ParkingView,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const PREFIX: &str = "smart_parking_2026";

struct Harness {
    dispatcher: Dispatcher,
    egress: mpsc::Receiver<OutboundMessage>,
    store: Arc<MemoryPlaceStore>,
    metrics: Arc<Metrics>,
}

impl Harness {
    fn new(store: MemoryPlaceStore, spots: &[&str]) -> Self {
        let topics = Topics::new(PREFIX);
        let metrics = Arc::new(Metrics::new());
        let store = Arc::new(store);
        let (bus, egress) = create_bus_channel(256);
        let view = Arc::new(RwLock::new(ParkingView::new(spots)));
        let timings = BarrierTimings {
            opening: Duration::from_secs(2),
            opened: Duration::from_secs(5),
            closing: Duration::from_secs(2),
        };

        let dispatcher = Dispatcher::new(topics.clone(), metrics.clone())
            .with_forwarder(Forwarder::new(store.clone(), bus.clone(), topics.clone(), metrics.clone()))
            .with_barrier(BarrierController::new(bus.clone(), topics.clone(), timings, metrics.clone()))
            .with_arbitration(Arbitration::new(bus.clone(), topics.clone(), metrics.clone()))
            .with_availability(AvailabilityAggregator::new(view, bus, topics));

        Self { dispatcher, egress, store, metrics }
    }

    async fn send(&mut self, topic: &str, payload: &str) {
        let message = BusMessage::new(format!("{PREFIX}/{topic}"), payload.to_string());
        if let Some(handle) = self.dispatcher.dispatch(message).await {
            // Detached like in production; the test clock drives it
            drop(handle);
        }
    }

    fn published(&mut self) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = self.egress.try_recv() {
            out.push(msg);
        }
        out
    }

    /// Feed every publication back through the dispatcher, as a broker would
    async fn loop_back(&mut self) -> Vec<OutboundMessage> {
        let published = self.published();
        for msg in &published {
            let message = BusMessage::new(msg.topic.clone(), msg.payload.clone());
            self.dispatcher.dispatch(message).await;
        }
        published
    }
}

fn on_topic<'a>(messages: &'a [OutboundMessage], suffix: &str) -> Vec<&'a OutboundMessage> {
    messages.iter().filter(|m| m.topic.ends_with(suffix)).collect()
}

#[tokio::test]
async fn test_new_spot_is_created_announced_and_updated() {
    let mut h = Harness::new(MemoryPlaceStore::new(), &["A05"]);

    h.send("parking/spots/A05/status", r#"{"id":"A05","status":"OCCUPIED","distance_cm":21.3}"#).await;

    assert_eq!(
        h.store.calls(),
        vec![
            StoreCall::UpdateStatus(SpotId("A05".to_string()), SpotStatus::Occupied),
            StoreCall::Create(SpotId("A05".to_string())),
            StoreCall::UpdateStatus(SpotId("A05".to_string()), SpotStatus::Occupied),
        ]
    );
    assert_eq!(h.store.place("A05").unwrap().status, SpotStatus::Occupied);

    let published = h.published();
    let announcements = on_topic(&published, "/parking/config/new_spot");
    assert_eq!(announcements.len(), 1);
    assert_eq!(announcements[0].json().unwrap(), serde_json::json!({"id": "A05", "cmd": "ADD"}));
}

#[tokio::test]
async fn test_redelivered_event_announces_once() {
    let mut h = Harness::new(MemoryPlaceStore::new().with_forgetful_creates(), &[]);

    for _ in 0..3 {
        h.send("parking/spots/A07/status", r#"{"id":"A07","status":"FREE"}"#).await;
    }

    let published = h.published();
    assert_eq!(on_topic(&published, "/parking/config/new_spot").len(), 1);
    let summary = h.metrics.report();
    assert_eq!(summary.rest_calls, 9);
    assert_eq!(summary.rest_not_found, 3);
    assert_eq!(summary.announcements_published, 1);
}

#[tokio::test]
async fn test_full_lot_denies_entry() {
    let mut h = Harness::new(MemoryPlaceStore::new().with_place("A01"), &["A01"]);

    h.send("parking/display/available", r#"{"count":0,"ts":"2026-01-01T10:00:00"}"#).await;
    h.send("parking/entry_sensor/status", r#"{"status":"OCCUPIED","ts":"2026-01-01T10:00:01"}"#).await;

    let published = h.published();
    assert!(on_topic(&published, "/parking/barriers/entry/cmd").is_empty());
    assert_eq!(h.metrics.report().entries_denied, 1);
}

#[tokio::test]
async fn test_available_lot_opens_entry_once() {
    let mut h = Harness::new(MemoryPlaceStore::new(), &[]);

    h.send("parking/display/available", r#"{"count":5}"#).await;
    h.send("parking/entry_sensor/status", r#"{"status":"OCCUPIED"}"#).await;

    let published = h.published();
    let commands = on_topic(&published, "/parking/barriers/entry/cmd");
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].json().unwrap()["action"], "OPEN");
}

#[tokio::test(start_paused = true)]
async fn test_car_entering_drives_barrier_and_store() {
    let mut h = Harness::new(MemoryPlaceStore::new().with_place("A01"), &["A01", "A02"]);
    h.dispatcher.start().await;

    // Availability published at startup is what arbitration reads
    let startup = h.loop_back().await;
    assert_eq!(on_topic(&startup, "/parking/display/available")[0].json().unwrap()["count"], 2);

    h.send("parking/entry_sensor/status", r#"{"status":"OCCUPIED"}"#).await;
    let commands = h.loop_back().await;
    assert_eq!(on_topic(&commands, "/parking/barriers/entry/cmd").len(), 1);

    // Let the whole sequence run, looping the states back to the forwarder
    let mut states = Vec::new();
    for _ in 0..12 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        for msg in h.loop_back().await {
            if msg.topic.ends_with("/parking/barriers/entry/state") {
                states.push(msg.json().unwrap()["state"].as_str().unwrap().to_string());
            }
        }
    }

    assert_eq!(states, vec!["OPENING", "OPENED", "CLOSING", "CLOSED"]);
    let barrier_calls: Vec<_> = h
        .store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, StoreCall::UpdateBarrier(..)))
        .collect();
    assert_eq!(barrier_calls.len(), 4);
    assert_eq!(h.store.barrier("entry"), Some(BarrierPhase::Closed));

    // The car parks: availability drops and the store sees the update
    h.send("parking/spots/A01/status", r#"{"id":"A01","status":"OCCUPIED"}"#).await;
    let published = h.published();
    assert_eq!(on_topic(&published, "/parking/display/available")[0].json().unwrap()["count"], 1);
    assert_eq!(h.store.place("A01").unwrap().status, SpotStatus::Occupied);
    assert_eq!(h.metrics.report().barrier_sequences_completed, 1);
    assert_eq!(
        h.store.calls().last(),
        Some(&StoreCall::UpdateStatus(SpotId("A01".to_string()), SpotStatus::Occupied))
    );
}

#[tokio::test]
async fn test_store_outage_drops_event_without_retry() {
    let mut h = Harness::new(MemoryPlaceStore::new().with_place("A02"), &["A02"]);
    h.store.set_offline(true);

    h.send("parking/spots/A02/status", r#"{"id":"A02","status":"OCCUPIED"}"#).await;
    assert!(h.store.calls().is_empty());
    assert_eq!(h.metrics.report().rest_transport_failures, 1);

    h.store.set_offline(false);
    h.send("parking/spots/A02/status", r#"{"id":"A02","status":"OCCUPIED"}"#).await;
    assert_eq!(h.store.place("A02").unwrap().status, SpotStatus::Occupied);
}
