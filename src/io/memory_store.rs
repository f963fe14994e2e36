//! In-process `PlaceStore` for tests and offline runs
//!
//! Behaves like the REST backend: unknown places answer NotFound, a second
//! create answers AlreadyExists, and barrier updates upsert. Every call is
//! recorded so tests can assert on the exact side-effect sequence.

use crate::domain::types::{BarrierId, BarrierPhase, SpotId, SpotStatus};
use crate::io::rest::{
    BarrierStateUpdate, CreateOutcome, PlaceCreate, PlaceStatusUpdate, PlaceStore, StoreError,
    UpdateOutcome,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

/// One recorded call against the store
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    UpdateStatus(SpotId, SpotStatus),
    Create(SpotId),
    UpdateBarrier(BarrierId, BarrierPhase),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceRecord {
    pub label: String,
    pub status: SpotStatus,
    pub distance: Option<f64>,
}

#[derive(Default)]
struct State {
    places: FxHashMap<SpotId, PlaceRecord>,
    barriers: FxHashMap<BarrierId, BarrierPhase>,
    calls: Vec<StoreCall>,
    forget_creates: bool,
    race_creates: bool,
    create_timeouts: bool,
    create_rejection: Option<u16>,
    offline: bool,
}

#[derive(Default)]
pub struct MemoryPlaceStore {
    state: Mutex<State>,
}

impl MemoryPlaceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-provision a place (status FREE)
    pub fn with_place(self, spot_id: &str) -> Self {
        self.state.lock().places.insert(
            SpotId(spot_id.to_string()),
            PlaceRecord { label: spot_id.to_string(), status: SpotStatus::Free, distance: None },
        );
        self
    }

    /// Creates answer Created but nothing is stored, so updates keep answering NotFound
    pub fn with_forgetful_creates(self) -> Self {
        self.state.lock().forget_creates = true;
        self
    }

    /// Another writer wins every create: the place appears and the call answers AlreadyExists
    pub fn with_racing_creates(self) -> Self {
        self.state.lock().race_creates = true;
        self
    }

    /// Creates are sent but time out before an answer; other calls work
    pub fn with_create_timeouts(self) -> Self {
        self.state.lock().create_timeouts = true;
        self
    }

    /// Creates answer with this HTTP status and store nothing
    pub fn with_rejected_creates(self, code: u16) -> Self {
        self.state.lock().create_rejection = Some(code);
        self
    }

    /// Every call fails with a connect error
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().calls.clone()
    }

    pub fn place(&self, spot_id: &str) -> Option<PlaceRecord> {
        self.state.lock().places.get(&SpotId(spot_id.to_string())).cloned()
    }

    pub fn barrier(&self, barrier_id: &str) -> Option<BarrierPhase> {
        self.state.lock().barriers.get(&BarrierId(barrier_id.to_string())).copied()
    }
}

#[async_trait]
impl PlaceStore for MemoryPlaceStore {
    async fn update_place_status(
        &self,
        spot_id: &SpotId,
        body: &PlaceStatusUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(StoreError::Connect("store offline".to_string()));
        }
        state.calls.push(StoreCall::UpdateStatus(spot_id.clone(), body.status));
        match state.places.get_mut(spot_id) {
            Some(place) => {
                place.status = body.status;
                if body.distance.is_some() {
                    place.distance = body.distance;
                }
                Ok(UpdateOutcome::Updated)
            }
            None => Ok(UpdateOutcome::NotFound),
        }
    }

    async fn create_place(&self, body: &PlaceCreate) -> Result<CreateOutcome, StoreError> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(StoreError::Connect("store offline".to_string()));
        }
        state.calls.push(StoreCall::Create(body.id.clone()));
        if state.create_timeouts {
            return Err(StoreError::Timeout);
        }
        if let Some(code) = state.create_rejection {
            return Ok(CreateOutcome::Rejected(code));
        }
        if state.places.contains_key(&body.id) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        if !state.forget_creates {
            let record = PlaceRecord {
                label: body.label.clone(),
                status: SpotStatus::Free,
                distance: body.distance,
            };
            state.places.insert(body.id.clone(), record);
        }
        if state.race_creates {
            return Ok(CreateOutcome::AlreadyExists);
        }
        Ok(CreateOutcome::Created)
    }

    async fn update_barrier_state(
        &self,
        barrier_id: &BarrierId,
        body: &BarrierStateUpdate,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut state = self.state.lock();
        if state.offline {
            return Err(StoreError::Connect("store offline".to_string()));
        }
        state.calls.push(StoreCall::UpdateBarrier(barrier_id.clone(), body.state));
        state.barriers.insert(barrier_id.clone(), body.state);
        Ok(UpdateOutcome::Updated)
    }
}
