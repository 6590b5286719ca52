//! Typed errors and their mapping onto process exit codes.

use thiserror::Error;

/// One variant per error-kind row the host distinguishes.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("missing required option: {0}")]
    MissingRequiredOption(String),

    #[error("invalid plugin chain: {0}")]
    InvalidPluginChain(String),

    #[error("plugin error: {0}")]
    Plugin(String),

    #[error("io error: {0}")]
    Io(String),
}

impl EngineError {
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::InvalidArgument(_) => super::cli::EXIT_INVALID_ARGUMENT,
            EngineError::MissingRequiredOption(_) => super::cli::EXIT_MISSING_REQUIRED_OPTION,
            EngineError::InvalidPluginChain(_) => super::cli::EXIT_INVALID_PLUGIN_CHAIN,
            EngineError::Plugin(_) => super::cli::EXIT_PLUGIN_ERROR,
            EngineError::Io(_) => super::cli::EXIT_IO_ERROR,
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<hound::Error> for EngineError {
    fn from(err: hound::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}
