//! Basalt Core - shared types for the basalt volume agent
//!
//! This crate provides:
//! - Volume option parsing, config-file merging, and default application
//! - The agent configuration file model
//! - Request contexts carrying a trace id through logs and outbound headers
//! - Error types with miette diagnostics

pub mod config;
pub mod context;
pub mod error;
pub mod options;

pub use config::{AgentConfig, Framework};
pub use context::ReqContext;
pub use error::{CoreError, Result};
pub use options::{PersistenceMode, VolumeOpts};

/// Prefix applied to every volume name before it is sent to the appliance,
/// so the agent can enumerate only its own volumes.
pub const VOLUME_PREFIX: &str = "BASALT-";

/// Root under which per-volume mount points are derived. The docker v2
/// plugin framework requires static mounts to live under /mnt.
pub const MOUNT_ROOT: &str = "/mnt";

/// Qualify a user-facing volume name with the agent prefix. Idempotent.
pub fn qualify_name(name: &str) -> String {
    if name.starts_with(VOLUME_PREFIX) {
        name.to_string()
    } else {
        format!("{}{}", VOLUME_PREFIX, name)
    }
}

/// Strip the agent prefix from an appliance-side name for user presentation.
pub fn strip_name(name: &str) -> &str {
    name.strip_prefix(VOLUME_PREFIX).unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualify_name_is_idempotent() {
        assert_eq!(qualify_name("data"), "BASALT-data");
        assert_eq!(qualify_name("BASALT-data"), "BASALT-data");
    }

    #[test]
    fn test_strip_name() {
        assert_eq!(strip_name("BASALT-data"), "data");
        assert_eq!(strip_name("data"), "data");
    }

    #[test]
    fn test_qualify_strip_round_trip() {
        assert_eq!(strip_name(&qualify_name("vol-1")), "vol-1");
    }
}
