//! Basalt Host - the attach/detach pipeline
//!
//! Coordinates array-side provisioning, initiator registration and ACL
//! updates, iSCSI session management, block-device discovery (including
//! multipath assembly), and filesystem formatting/mounting. The volume
//! orchestrator serializes all mutating operations behind a single
//! process-wide mutex; the appliance is the source of truth and no volume
//! state is kept in memory across requests.

pub mod command;
pub mod error;
pub mod initiator;
pub mod iscsi;
pub mod linux;
pub mod mock;
pub mod mount;
pub mod orchestrator;
pub mod traits;

pub use command::CmdOutput;
pub use error::{HostError, Result};
pub use initiator::InitiatorManager;
pub use linux::LinuxHost;
pub use mock::MockHost;
pub use orchestrator::{Orchestrator, OrchestratorConfig, VolumeEntry};
pub use traits::HostRuntime;
