//! Verbs accepted on the command line and the result of executing one.

use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

use crate::error::ServiceError;
use crate::platform::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    /// Register the service and start it
    Install,
    /// Stop the service and remove its registration
    Uninstall,
    Start,
    Stop,
    Restart,
    /// Report the native manager's view of the service
    Status,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Install => "install",
            Self::Uninstall => "uninstall",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Status => "status",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OutcomeStatus {
    Success,
    AlreadyInDesiredState,
    NotInstalled,
    Error,
}

impl OutcomeStatus {
    /// Process exit code reported for this status
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Success | Self::AlreadyInDesiredState => 0,
            Self::Error => 1,
            Self::NotInstalled => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub verb: Verb,
    pub platform: Platform,
    pub status: OutcomeStatus,
    pub detail: String,
}

impl Outcome {
    pub fn new(verb: Verb, platform: Platform, status: OutcomeStatus, detail: impl Into<String>) -> Self {
        Self {
            verb,
            platform,
            status,
            detail: detail.into(),
        }
    }

    pub fn success(verb: Verb, platform: Platform, detail: impl Into<String>) -> Self {
        Self::new(verb, platform, OutcomeStatus::Success, detail)
    }

    pub fn error(verb: Verb, platform: Platform, err: &ServiceError) -> Self {
        Self::new(verb, platform, OutcomeStatus::Error, err.to_string())
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }
}
