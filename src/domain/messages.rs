//! Bus payloads: strict decoders for inbound messages, serializable outbound payloads
//!
//! Unknown or extra JSON fields are ignored. Enumerated fields (status, state,
//! action) must hold one of their known values, otherwise the whole message is
//! rejected as malformed.

use crate::domain::error::MessageError;
use crate::domain::types::{BarrierAction, BarrierPhase, SpotId, SpotStatus};
use serde::Serialize;
use serde_json::{Map, Value};

type Object = Map<String, Value>;

fn parse_object(payload: &[u8]) -> Result<Object, MessageError> {
    let text = std::str::from_utf8(payload).map_err(|_| MessageError::InvalidUtf8)?;
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        _ => Err(MessageError::NotAnObject),
    }
}

fn required_str<'a>(object: &'a Object, field: &'static str) -> Result<&'a str, MessageError> {
    match object.get(field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        _ => Err(MessageError::MissingField(field)),
    }
}

/// Numeric field (integer or float); anything else reads as absent
fn optional_f64(object: &Object, field: &str) -> Option<f64> {
    object.get(field).and_then(Value::as_f64)
}

/// Integer field; floats and non-numbers read as absent
fn optional_i64(object: &Object, field: &str) -> Option<i64> {
    object.get(field).and_then(Value::as_i64)
}

/// Sensor measurements carried alongside a spot status
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpotReadings {
    pub distance_cm: Option<f64>,
    pub threshold_cm: Option<f64>,
    pub debounce_n: Option<i64>,
}

/// `parking/spots/{id}/status`
#[derive(Debug, Clone, PartialEq)]
pub struct SpotStatusEvent {
    pub spot_id: SpotId,
    pub status: SpotStatus,
    pub label: Option<String>,
    pub readings: SpotReadings,
}

impl SpotStatusEvent {
    pub fn decode(payload: &[u8]) -> Result<Self, MessageError> {
        let object = parse_object(payload)?;
        let spot_id = SpotId(required_str(&object, "id")?.to_string());
        let status = required_str(&object, "status")?.parse()?;
        let label = match object.get("label") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };
        let readings = SpotReadings {
            distance_cm: optional_f64(&object, "distance_cm"),
            threshold_cm: optional_f64(&object, "threshold_cm"),
            debounce_n: optional_i64(&object, "debounce_n"),
        };
        Ok(Self { spot_id, status, label, readings })
    }
}

/// `parking/barriers/{id}/state`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarrierStateEvent {
    pub state: BarrierPhase,
}

impl BarrierStateEvent {
    pub fn decode(payload: &[u8]) -> Result<Self, MessageError> {
        let object = parse_object(payload)?;
        let state = required_str(&object, "state")?.parse()?;
        Ok(Self { state })
    }
}

/// `parking/barriers/{id}/cmd`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarrierCommand {
    pub action: BarrierAction,
}

impl BarrierCommand {
    pub fn decode(payload: &[u8]) -> Result<Self, MessageError> {
        let object = parse_object(payload)?;
        let action = match required_str(&object, "action")? {
            "OPEN" => BarrierAction::Open,
            other => {
                return Err(MessageError::UnknownValue { kind: "action", value: other.to_string() })
            }
        };
        Ok(Self { action })
    }
}

/// `parking/entry_sensor/status` and `parking/exit_sensor/status`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateSensorEvent {
    pub status: SpotStatus,
}

impl GateSensorEvent {
    pub fn decode(payload: &[u8]) -> Result<Self, MessageError> {
        let object = parse_object(payload)?;
        let status = required_str(&object, "status")?.parse()?;
        Ok(Self { status })
    }
}

/// `parking/display/available`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AvailabilityEvent {
    pub count: i64,
}

impl AvailabilityEvent {
    pub fn decode(payload: &[u8]) -> Result<Self, MessageError> {
        let object = parse_object(payload)?;
        let count = optional_i64(&object, "count").ok_or(MessageError::MissingField("count"))?;
        Ok(Self { count })
    }
}

/// Outbound spot status published by a sensor node
#[derive(Debug, Clone, Serialize)]
pub struct SpotStatusPayload {
    pub id: String,
    pub status: SpotStatus,
    pub distance_cm: f64,
    pub threshold_cm: f64,
    pub debounce_n: u32,
    pub ts: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BarrierStatePayload {
    pub state: BarrierPhase,
}

#[derive(Debug, Clone, Serialize)]
pub struct BarrierCommandPayload {
    pub action: BarrierAction,
    pub ts: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpotConfigCmd {
    Add,
}

/// One-time announcement that a spot now exists in the store
#[derive(Debug, Clone, Serialize)]
pub struct NewSpotPayload {
    pub id: String,
    pub cmd: SpotConfigCmd,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateSensorPayload {
    pub status: SpotStatus,
    pub ts: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityPayload {
    pub count: usize,
    pub ts: String,
}
