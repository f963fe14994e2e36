//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `bus` - Typed inbound/outbound channels between MQTT and the services
//! - `mqtt` - MQTT client feeding the dispatch channel
//! - `mqtt_egress` - MQTT publisher draining the outbound channel
//! - `rest` - REST place store client (`PlaceStore` trait)
//! - `memory_store` - In-process `PlaceStore` for tests and offline runs
//! - `status_api` - Read-only HTTP status endpoints

pub mod bus;
pub mod memory_store;
pub mod mqtt;
pub mod mqtt_egress;
pub mod rest;
pub mod status_api;

// Re-export commonly used types
pub use bus::{create_bus_channel, BusMessage, BusSender, OutboundMessage};
pub use memory_store::MemoryPlaceStore;
pub use mqtt_egress::MqttPublisher;
pub use rest::{PlaceStore, RestPlaceStore, StoreError};
