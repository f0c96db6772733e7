//! Service lifecycle control - delegates to OS-native service managers
//!
//! Provides a uniform capability set over the different managers:
//! - macOS: launchd (launchctl)
//! - Linux: systemd (systemctl)
//! - Windows: Service Control Manager (Windows API)
//!
//! Backends are selected from a [`Platform`] value rather than the compile
//! target, so every backend builds (and is testable) on every host.

use std::path::PathBuf;
use std::sync::Arc;

use crate::descriptor::ServiceDescriptor;
use crate::error::ServiceError;
use crate::platform::Platform;
use crate::runner::CommandRunner;

mod file_ops;
pub mod linux_control;
pub mod macos_control;
pub mod windows_control;

pub use linux_control::SystemdBackend;
pub use macos_control::LaunchdBackend;
pub use windows_control::{NativeScm, ServiceControlManager, WindowsBackend, WindowsServiceSpec};

/// Native manager's view of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub running: bool,
    /// Raw text reported by the native tool
    pub report: String,
}

impl StatusReport {
    pub fn new(running: bool, report: impl Into<String>) -> Self {
        Self {
            running,
            report: report.into(),
        }
    }
}

/// Capabilities every native backend provides.
///
/// Operations block until the native tool or API call completes. A failed
/// call is returned as `NativeToolFailure` and never retried here.
pub trait ServiceBackend {
    fn platform(&self) -> Platform;

    /// Definition file written by `install`, for platforms that use one
    fn definition_path(&self, d: &ServiceDescriptor) -> Option<PathBuf>;

    fn exists(&self, d: &ServiceDescriptor) -> Result<bool, ServiceError>;

    /// Render and register the service without starting it
    fn install(&self, d: &ServiceDescriptor) -> Result<(), ServiceError>;

    /// Deregister the service and remove its definition file
    fn uninstall(&self, d: &ServiceDescriptor) -> Result<(), ServiceError>;

    fn start(&self, d: &ServiceDescriptor) -> Result<(), ServiceError>;

    fn stop(&self, d: &ServiceDescriptor) -> Result<(), ServiceError>;

    fn restart(&self, d: &ServiceDescriptor) -> Result<(), ServiceError>;

    /// Current run state; a stopped or unknown service is not an error
    fn query_status(&self, d: &ServiceDescriptor) -> Result<StatusReport, ServiceError>;
}

/// Pick the native backend for `platform`.
pub fn select_backend(
    platform: &Platform,
    runner: Arc<dyn CommandRunner>,
) -> Result<Box<dyn ServiceBackend>, ServiceError> {
    match platform {
        Platform::Linux => Ok(Box::new(SystemdBackend::new(runner))),
        Platform::Darwin => Ok(Box::new(LaunchdBackend::new(runner))),
        Platform::Windows => Ok(Box::new(WindowsBackend::new(runner, Box::new(NativeScm)))),
        Platform::Other(os) => Err(ServiceError::UnsupportedPlatform(format!(
            "no native service manager backend for '{os}' (supported: linux, darwin, win32)"
        ))),
    }
}
