//! Shared types for the parking pipeline

use crate::domain::error::MessageError;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Newtype wrapper for parking spot IDs (e.g. "A05")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpotId(pub String);

impl SpotId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SpotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Newtype wrapper for barrier IDs (e.g. "entry", "exit")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BarrierId(pub String);

impl BarrierId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BarrierId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Occupancy of a parking spot or a gate sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpotStatus {
    Free,
    Occupied,
}

impl SpotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpotStatus::Free => "FREE",
            SpotStatus::Occupied => "OCCUPIED",
        }
    }
}

impl std::fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SpotStatus {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FREE" => Ok(SpotStatus::Free),
            "OCCUPIED" => Ok(SpotStatus::Occupied),
            other => Err(MessageError::UnknownValue { kind: "status", value: other.to_string() }),
        }
    }
}

/// Phase of a barrier's open/close sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarrierPhase {
    Closed,
    Opening,
    Opened,
    Closing,
}

impl BarrierPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarrierPhase::Closed => "CLOSED",
            BarrierPhase::Opening => "OPENING",
            BarrierPhase::Opened => "OPENED",
            BarrierPhase::Closing => "CLOSING",
        }
    }

    /// Phase that follows this one in the sequence; `Closed` wraps to `Opening`
    pub fn next(&self) -> BarrierPhase {
        match self {
            BarrierPhase::Closed => BarrierPhase::Opening,
            BarrierPhase::Opening => BarrierPhase::Opened,
            BarrierPhase::Opened => BarrierPhase::Closing,
            BarrierPhase::Closing => BarrierPhase::Closed,
        }
    }
}

impl std::fmt::Display for BarrierPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BarrierPhase {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CLOSED" => Ok(BarrierPhase::Closed),
            "OPENING" => Ok(BarrierPhase::Opening),
            "OPENED" => Ok(BarrierPhase::Opened),
            "CLOSING" => Ok(BarrierPhase::Closing),
            other => Err(MessageError::UnknownValue { kind: "state", value: other.to_string() }),
        }
    }
}

/// Command understood by the barrier controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarrierAction {
    Open,
}

/// Physical crossing point watched by a gate sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    Entry,
    Exit,
}

impl Gate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::Entry => "entry",
            Gate::Exit => "exit",
        }
    }

    /// Barrier that guards this gate
    pub fn barrier_id(&self) -> BarrierId {
        BarrierId(self.as_str().to_string())
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current wall-clock time as an RFC 3339 string with second precision
pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Normalize a spot ID to the `A01` form (accepts `A1`, `a01`, ` A01 `)
///
/// Returns None for IDs that are not a letter `A` followed by digits.
pub fn normalize_spot_id(raw: &str) -> Option<SpotId> {
    let upper = raw.trim().to_ascii_uppercase();
    let digits = upper.strip_prefix('A')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: u32 = digits.parse().ok()?;
    Some(SpotId(format!("A{:02}", number)))
}
