//! Basalt Appliance - typed REST client for the storage appliance
//!
//! The appliance is the source of truth for volume existence, metadata,
//! and ACLs. This crate provides the wire entity model, the transport
//! (session-key auth with transparent refresh), the typed operation set,
//! the `ApplianceGateway` trait the orchestrator consumes, and an
//! in-memory mock for testing without an array.

pub mod client;
pub mod entities;
pub mod error;
pub mod gateway;
pub mod http;
pub mod mock;

pub use client::ApplianceClient;
pub use entities::{
    AclPolicy, AdminState, BlockVolume, EndpointInfo, Initiator, InitiatorRef, Metadata,
    StorageEndpoint, Volume, META_FSTYPE, META_PERSISTENCE, STORAGE_ENDPOINT_NAME,
    BLOCK_VOLUME_NAME,
};
pub use error::{ApplianceError, Result};
pub use gateway::ApplianceGateway;
pub use http::{Transport, TransportConfig};
pub use mock::MockAppliance;
