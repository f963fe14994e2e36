//! REST store client
//!
//! The store is owned by another service; the forwarder only mirrors bus state
//! into it. `PlaceStore` is the seam: `RestPlaceStore` talks HTTP, tests use
//! `io::memory_store::MemoryPlaceStore`.

use crate::domain::messages::SpotStatusEvent;
use crate::domain::types::{BarrierId, BarrierPhase, SpotId, SpotStatus};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Result of an update (`PUT`) call that reached the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// Unknown id; the caller decides whether to create it
    NotFound,
    Rejected(u16),
}

/// Result of a create (`POST`) call that reached the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// Conflict or 200 from a concurrent/previous create; not an error
    AlreadyExists,
    Rejected(u16),
}

impl CreateOutcome {
    /// The resource exists after this call
    pub fn exists(&self) -> bool {
        matches!(self, CreateOutcome::Created | CreateOutcome::AlreadyExists)
    }
}

/// The call never produced an HTTP response; not retried
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid store url: {0}")]
    InvalidUrl(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StoreError::Timeout
        } else if e.is_connect() {
            StoreError::Connect(e.to_string())
        } else {
            StoreError::Transport(e.to_string())
        }
    }
}

/// Body of `PUT /places/{id}/status`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceStatusUpdate {
    pub status: SpotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce: Option<i64>,
}

impl From<&SpotStatusEvent> for PlaceStatusUpdate {
    fn from(event: &SpotStatusEvent) -> Self {
        Self {
            status: event.status,
            distance: event.readings.distance_cm,
            threshold: event.readings.threshold_cm,
            debounce: event.readings.debounce_n,
        }
    }
}

/// Body of `POST /places`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaceCreate {
    pub id: SpotId,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce: Option<i64>,
}

impl PlaceCreate {
    /// Label defaults to the spot id
    pub fn from_event(event: &SpotStatusEvent) -> Self {
        Self {
            id: event.spot_id.clone(),
            label: event.label.clone().unwrap_or_else(|| event.spot_id.to_string()),
            distance: event.readings.distance_cm,
            threshold: event.readings.threshold_cm,
            debounce: event.readings.debounce_n,
        }
    }
}

/// Body of `PUT /barrier/{id}/state`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BarrierStateUpdate {
    pub state: BarrierPhase,
}

#[async_trait]
pub trait PlaceStore: Send + Sync {
    async fn update_place_status(
        &self,
        spot_id: &SpotId,
        body: &PlaceStatusUpdate,
    ) -> Result<UpdateOutcome, StoreError>;

    async fn create_place(&self, body: &PlaceCreate) -> Result<CreateOutcome, StoreError>;

    async fn update_barrier_state(
        &self,
        barrier_id: &BarrierId,
        body: &BarrierStateUpdate,
    ) -> Result<UpdateOutcome, StoreError>;
}

fn update_outcome(status: StatusCode) -> UpdateOutcome {
    if status.is_success() {
        UpdateOutcome::Updated
    } else if status == StatusCode::NOT_FOUND {
        UpdateOutcome::NotFound
    } else {
        UpdateOutcome::Rejected(status.as_u16())
    }
}

fn create_outcome(status: StatusCode) -> CreateOutcome {
    match status {
        StatusCode::CREATED => CreateOutcome::Created,
        StatusCode::OK | StatusCode::CONFLICT => CreateOutcome::AlreadyExists,
        other => CreateOutcome::Rejected(other.as_u16()),
    }
}

/// HTTP implementation of `PlaceStore`
pub struct RestPlaceStore {
    base_url: Url,
    client: reqwest::Client,
}

impl RestPlaceStore {
    /// Create a client once for reuse (connection pooling) with a fixed timeout
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url).map_err(|e| StoreError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::InvalidUrl(base_url.to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, client })
    }

    /// Append path segments (percent-encoded) to the base url
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl PlaceStore for RestPlaceStore {
    async fn update_place_status(
        &self,
        spot_id: &SpotId,
        body: &PlaceStatusUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let url = self.endpoint(&["places", spot_id.as_str(), "status"])?;
        let response = self.client.put(url).json(body).send().await?;
        debug!(spot_id = %spot_id, status = %response.status().as_u16(), "rest_place_status");
        Ok(update_outcome(response.status()))
    }

    async fn create_place(&self, body: &PlaceCreate) -> Result<CreateOutcome, StoreError> {
        let url = self.endpoint(&["places"])?;
        let response = self.client.post(url).json(body).send().await?;
        debug!(spot_id = %body.id, status = %response.status().as_u16(), "rest_place_create");
        Ok(create_outcome(response.status()))
    }

    async fn update_barrier_state(
        &self,
        barrier_id: &BarrierId,
        body: &BarrierStateUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let url = self.endpoint(&["barrier", barrier_id.as_str(), "state"])?;
        let response = self.client.put(url).json(body).send().await?;
        debug!(barrier_id = %barrier_id, status = %response.status().as_u16(), "rest_barrier_state");
        Ok(update_outcome(response.status()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::messages::SpotReadings;

    fn event() -> SpotStatusEvent {
        SpotStatusEvent {
            spot_id: SpotId("A05".to_string()),
            status: SpotStatus::Occupied,
            label: None,
            readings: SpotReadings { distance_cm: Some(21.5), threshold_cm: None, debounce_n: Some(4) },
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(update_outcome(StatusCode::OK), UpdateOutcome::Updated);
        assert_eq!(update_outcome(StatusCode::NOT_FOUND), UpdateOutcome::NotFound);
        assert_eq!(update_outcome(StatusCode::BAD_REQUEST), UpdateOutcome::Rejected(400));
        assert_eq!(create_outcome(StatusCode::CREATED), CreateOutcome::Created);
        assert_eq!(create_outcome(StatusCode::CONFLICT), CreateOutcome::AlreadyExists);
        assert_eq!(create_outcome(StatusCode::OK), CreateOutcome::AlreadyExists);
        assert_eq!(create_outcome(StatusCode::INTERNAL_SERVER_ERROR), CreateOutcome::Rejected(500));
        assert!(!CreateOutcome::Rejected(500).exists());
    }

    #[test]
    fn test_update_body_omits_absent_fields() {
        let body = PlaceStatusUpdate::from(&event());
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"status": "OCCUPIED", "distance": 21.5, "debounce": 4}));
    }

    #[test]
    fn test_create_body_label_defaults_to_id() {
        let body = PlaceCreate::from_event(&event());
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "A05", "label": "A05", "distance": 21.5, "debounce": 4})
        );
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let store = RestPlaceStore::new("http://localhost:3000", Duration::from_secs(2)).unwrap();
        let url = store.endpoint(&["places", "A 05", "status"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/places/A%2005/status");

        let store = RestPlaceStore::new("http://store.local/api/", Duration::from_secs(2)).unwrap();
        let url = store.endpoint(&["barrier", "entry", "state"]).unwrap();
        assert_eq!(url.as_str(), "http://store.local/api/barrier/entry/state");
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            RestPlaceStore::new("not a url", Duration::from_secs(1)),
            Err(StoreError::InvalidUrl(_))
        ));
    }
}
