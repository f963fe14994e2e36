//! Domain models - core parking types, topic layout and bus payloads
//!
//! This module contains the canonical data types used throughout the system:
//! - `types` - `SpotStatus`, `BarrierPhase`, `Gate` and ID newtypes
//! - `topics` - building and routing `{prefix}/parking/...` topics
//! - `messages` - strict decoders for inbound payloads, outbound payload shapes
//! - `error` - `MessageError` for malformed messages

pub mod error;
pub mod messages;
pub mod topics;
pub mod types;

pub use error::MessageError;
pub use topics::{Route, Topics};
pub use types::{BarrierId, BarrierPhase, Gate, SpotId, SpotStatus};
