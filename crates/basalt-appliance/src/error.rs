use miette::Diagnostic;
use thiserror::Error;

/// Error type for appliance REST operations
#[derive(Error, Debug, Diagnostic)]
pub enum ApplianceError {
    /// The appliance reports the entity absent
    #[error("Not found on appliance: {entity}")]
    #[diagnostic(
        code(basalt::appliance::not_found),
        help("The appliance is the source of truth; the entity may have been removed by another host")
    )]
    NotFound { entity: String },

    /// Creating an entity that already exists
    #[error("Already exists on appliance: {entity}")]
    #[diagnostic(code(basalt::appliance::conflict))]
    Conflict { entity: String },

    /// Authentication failed even after a session refresh
    #[error("Appliance authentication failed: {message}")]
    #[diagnostic(
        code(basalt::appliance::auth),
        help("Check the 'username' and 'password' config values")
    )]
    Auth { message: String },

    /// Network-level failure reaching the appliance
    #[error("Appliance transport error: {message}")]
    #[diagnostic(
        code(basalt::appliance::transport),
        help("Verify the 'datera-cluster' address is reachable and the 'ssl' setting matches the appliance")
    )]
    Transport { message: String },

    /// The appliance returned a non-success status
    #[error("Appliance API error (status {status}): {body}")]
    #[diagnostic(code(basalt::appliance::api))]
    Api { status: u16, body: String },

    /// Response body could not be decoded
    #[error("Could not decode appliance response: {message}")]
    #[diagnostic(code(basalt::appliance::serialization))]
    Serialization { message: String },
}

/// Result type alias for appliance operations
pub type Result<T> = std::result::Result<T, ApplianceError>;

impl ApplianceError {
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
        }
    }

    pub fn conflict(entity: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
        }
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api {
            status,
            body: body.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
