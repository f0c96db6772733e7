//! Native service lifecycle control.
//!
//! Installs, removes, starts, stops, restarts and inspects a long-running
//! program as an operating-system service, delegating supervision to the
//! platform's own manager:
//! - Linux: systemd (unit file + systemctl)
//! - macOS: launchd (property list + launchctl)
//! - Windows: Service Control Manager (Windows API)

pub mod cli;
pub mod config;
pub mod control;
pub mod controller;
pub mod descriptor;
pub mod error;
pub mod logging;
pub mod outcome;
pub mod platform;
pub mod render;
pub mod runner;
pub mod service_host;

pub use config::{RetryStrategy, ServiceConfig};
pub use control::{ServiceBackend, StatusReport, select_backend};
pub use controller::ServiceController;
pub use descriptor::{RestartPolicy, ServiceDescriptor};
pub use error::ServiceError;
pub use logging::EventLog;
pub use outcome::{Outcome, OutcomeStatus, Verb};
pub use platform::Platform;
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
