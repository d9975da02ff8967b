use miette::Diagnostic;
use thiserror::Error;

/// Error type for core configuration and option handling
#[derive(Error, Debug, Diagnostic)]
pub enum CoreError {
    /// Invalid configuration file contents
    #[error("Invalid configuration: {message}")]
    #[diagnostic(
        code(basalt::core::invalid_config),
        help("{suggestion}")
    )]
    InvalidConfig { message: String, suggestion: String },

    /// Config file could not be read or parsed
    #[error("Could not load config file '{path}': {message}")]
    #[diagnostic(
        code(basalt::core::config_io),
        help("Generate a template with `basalt --genconfig bare` and fill in the cluster address and credentials")
    )]
    ConfigIo { path: String, message: String },

    /// Invalid volume option value
    #[error("Invalid value '{value}' for volume option '{key}'")]
    #[diagnostic(
        code(basalt::core::invalid_option),
        help("Run `basalt --print-opts` to see supported options and defaults")
    )]
    InvalidOption { key: String, value: String },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn invalid_config(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn config_io(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigIo {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn invalid_option(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidOption {
            key: key.into(),
            value: value.into(),
        }
    }
}
