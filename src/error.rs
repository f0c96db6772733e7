use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::runner::CommandOutput;

/// Errors raised while resolving configuration or driving a native service manager.
///
/// `NotInstalled` and `AlreadyInDesiredState` are not errors; they are
/// reported through [`crate::outcome::OutcomeStatus`].
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigurationInvalid { path: PathBuf, reason: String },

    #[error("Invalid service descriptor field `{field}`: {reason}")]
    InvalidDescriptor { field: String, reason: String },

    #[error("{tool} failed: {detail}")]
    NativeToolFailure { tool: String, detail: String },

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("I/O error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },
}

impl ServiceError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn native(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::NativeToolFailure {
            tool: tool.into(),
            detail: detail.into(),
        }
    }

    /// Build a `NativeToolFailure` from a command that exited unsuccessfully.
    pub fn from_output(tool: impl Into<String>, output: &CommandOutput) -> Self {
        Self::native(tool, output.diagnostic())
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }
}
