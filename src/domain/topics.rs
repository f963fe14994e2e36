//! Topic layout under the site prefix
//!
//! All topics live under `{prefix}/parking/...`. `route()` classifies an
//! incoming topic by its structural position, so the barrier and spot IDs are
//! taken from the second-to-last segment.

use crate::domain::types::{BarrierId, Gate, SpotId};
use smallvec::SmallVec;

/// Where an incoming topic should be dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    SpotStatus(SpotId),
    BarrierState(BarrierId),
    BarrierCommand(BarrierId),
    GateSensor(Gate),
    Availability,
    NewSpot,
}

/// Builds and parses topic names for one site prefix
#[derive(Debug, Clone)]
pub struct Topics {
    prefix: String,
}

impl Topics {
    pub fn new(prefix: &str) -> Self {
        Self { prefix: prefix.trim_end_matches('/').to_string() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn spot_status(&self, spot_id: &SpotId) -> String {
        format!("{}/parking/spots/{}/status", self.prefix, spot_id)
    }

    pub fn spot_status_filter(&self) -> String {
        format!("{}/parking/spots/+/status", self.prefix)
    }

    pub fn barrier_state(&self, barrier_id: &BarrierId) -> String {
        format!("{}/parking/barriers/{}/state", self.prefix, barrier_id)
    }

    pub fn barrier_state_filter(&self) -> String {
        format!("{}/parking/barriers/+/state", self.prefix)
    }

    pub fn barrier_cmd(&self, barrier_id: &BarrierId) -> String {
        format!("{}/parking/barriers/{}/cmd", self.prefix, barrier_id)
    }

    pub fn barrier_cmd_filter(&self) -> String {
        format!("{}/parking/barriers/+/cmd", self.prefix)
    }

    pub fn gate_sensor(&self, gate: Gate) -> String {
        format!("{}/parking/{}_sensor/status", self.prefix, gate.as_str())
    }

    pub fn available(&self) -> String {
        format!("{}/parking/display/available", self.prefix)
    }

    pub fn new_spot(&self) -> String {
        format!("{}/parking/config/new_spot", self.prefix)
    }

    /// Classify a concrete topic; None for topics outside the layout
    pub fn route(&self, topic: &str) -> Option<Route> {
        let rest = topic.strip_prefix(self.prefix.as_str())?.strip_prefix('/')?;
        let segments: SmallVec<[&str; 6]> = rest.split('/').collect();

        match segments.as_slice() {
            ["parking", "spots", id, "status"] if !id.is_empty() => {
                Some(Route::SpotStatus(SpotId(id.to_string())))
            }
            ["parking", "barriers", id, "state"] if !id.is_empty() => {
                Some(Route::BarrierState(BarrierId(id.to_string())))
            }
            ["parking", "barriers", id, "cmd"] if !id.is_empty() => {
                Some(Route::BarrierCommand(BarrierId(id.to_string())))
            }
            ["parking", "entry_sensor", "status"] => Some(Route::GateSensor(Gate::Entry)),
            ["parking", "exit_sensor", "status"] => Some(Route::GateSensor(Gate::Exit)),
            ["parking", "display", "available"] => Some(Route::Availability),
            ["parking", "config", "new_spot"] => Some(Route::NewSpot),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topics() -> Topics {
        Topics::new("smart_parking_2026")
    }

    #[test]
    fn test_build_topics() {
        let t = topics();
        assert_eq!(
            t.spot_status(&SpotId("A05".to_string())),
            "smart_parking_2026/parking/spots/A05/status"
        );
        assert_eq!(t.barrier_cmd(&Gate::Entry.barrier_id()), "smart_parking_2026/parking/barriers/entry/cmd");
        assert_eq!(t.gate_sensor(Gate::Exit), "smart_parking_2026/parking/exit_sensor/status");
        assert_eq!(t.spot_status_filter(), "smart_parking_2026/parking/spots/+/status");
        assert_eq!(t.new_spot(), "smart_parking_2026/parking/config/new_spot");
    }

    #[test]
    fn test_trailing_slash_prefix() {
        let t = Topics::new("site/");
        assert_eq!(t.available(), "site/parking/display/available");
    }

    #[test]
    fn test_route_known_topics() {
        let t = topics();
        assert_eq!(
            t.route("smart_parking_2026/parking/spots/A05/status"),
            Some(Route::SpotStatus(SpotId("A05".to_string())))
        );
        assert_eq!(
            t.route("smart_parking_2026/parking/barriers/exit/state"),
            Some(Route::BarrierState(BarrierId("exit".to_string())))
        );
        assert_eq!(
            t.route("smart_parking_2026/parking/barriers/entry/cmd"),
            Some(Route::BarrierCommand(BarrierId("entry".to_string())))
        );
        assert_eq!(
            t.route("smart_parking_2026/parking/entry_sensor/status"),
            Some(Route::GateSensor(Gate::Entry))
        );
        assert_eq!(t.route("smart_parking_2026/parking/display/available"), Some(Route::Availability));
    }

    #[test]
    fn test_route_rejects_foreign_topics() {
        let t = topics();
        assert_eq!(t.route("other_site/parking/spots/A05/status"), None);
        assert_eq!(t.route("smart_parking_2026/parking/spots//status"), None);
        assert_eq!(t.route("smart_parking_2026/parking/spots/A05/status/extra"), None);
        assert_eq!(t.route("smart_parking_20260/parking/display/available"), None);
        assert_eq!(t.route("smart_parking_2026/parking/barriers/entry/unknown"), None);
    }
}
