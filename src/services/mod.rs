//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `detector` - Debounced occupancy detection per spot
//! - `gate_sensor` - Timer-driven entry/exit gate sensor
//! - `forwarder` - Idempotent mirroring of bus state into the REST store
//! - `barrier` - Concurrent timed open/close sequence per barrier
//! - `arbitration` - Entry/exit open decisions from gate sensors and availability
//! - `availability` - Free-count aggregation and the shared lot view
//! - `dispatch` - Single dispatch loop routing bus messages to the roles
//! - `sensor_sim` - Simulated sensor node

pub mod arbitration;
pub mod availability;
pub mod barrier;
pub mod detector;
pub mod dispatch;
pub mod forwarder;
pub mod gate_sensor;
pub mod sensor_sim;

// Re-export commonly used types
pub use arbitration::Arbitration;
pub use availability::{AvailabilityAggregator, ParkingView, SharedView};
pub use barrier::{BarrierController, BarrierTimings};
pub use dispatch::Dispatcher;
pub use forwarder::Forwarder;
pub use sensor_sim::SensorNode;
