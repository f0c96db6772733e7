//! Windows service control using the Service Control Manager (SCM)
//!
//! Registration, start and stop go through the SCM API (see [`NativeScm`]);
//! status comes from `sc query`. Windows keeps no definition file on disk.
//!
//! The registered binary is servicectl itself in service-host mode (see
//! [`crate::service_host`]), which speaks the SCM protocol and runs the
//! configured command as a child.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{ServiceBackend, StatusReport};
use crate::descriptor::{RestartPolicy, ServiceDescriptor};
use crate::error::ServiceError;
use crate::platform::Platform;
use crate::render::escape::windows_command_line;
use crate::runner::CommandRunner;
use crate::service_host::HostCommand;

cfg_if::cfg_if! {
    if #[cfg(target_os = "windows")] {
        mod scm;
        pub use scm::NativeScm;
    } else {
        /// SCM stand-in for hosts without a Service Control Manager
        #[derive(Debug, Default, Clone, Copy)]
        pub struct NativeScm;

        impl NativeScm {
            fn unavailable<T>() -> Result<T, ServiceError> {
                Err(ServiceError::native(
                    "Service Control Manager",
                    "only available on Windows hosts",
                ))
            }
        }

        impl ServiceControlManager for NativeScm {
            fn exists(&self, _name: &str) -> Result<bool, ServiceError> {
                Self::unavailable()
            }
            fn create(&self, _spec: &WindowsServiceSpec) -> Result<(), ServiceError> {
                Self::unavailable()
            }
            fn delete(&self, _name: &str) -> Result<(), ServiceError> {
                Self::unavailable()
            }
            fn start(&self, _name: &str) -> Result<(), ServiceError> {
                Self::unavailable()
            }
            fn stop(&self, _name: &str) -> Result<(), ServiceError> {
                Self::unavailable()
            }
        }
    }
}

/// Reset the SCM failure counter after a day without failures
pub const FAILURE_RESET_PERIOD_SECS: u32 = 86_400;

const SC: &str = "sc";

/// Everything the SCM needs to register one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsServiceSpec {
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// Quoted host command line stored as the service's binary path
    pub command_line: String,
    /// Restart delay in milliseconds for each consecutive failure
    pub restart_delays_ms: Vec<u32>,
    pub reset_period_secs: u32,
    /// `KEY=value` strings for the service's `Environment` registry value
    pub environment: Vec<String>,
}

impl WindowsServiceSpec {
    /// Registration for `d`, hosted by the servicectl binary at `host_exe`
    pub fn from_descriptor(d: &ServiceDescriptor, host_exe: &Path) -> Result<Self, ServiceError> {
        d.validate()?;
        let host = HostCommand::from_descriptor(d);
        Ok(Self {
            name: d.windows_service_name().to_string(),
            display_name: d.name.clone(),
            description: d.description.clone(),
            command_line: windows_command_line(&host.host_argv(host_exe)),
            restart_delays_ms: windows_failure_actions(&d.restart_policy)?,
            reset_period_secs: FAILURE_RESET_PERIOD_SECS,
            environment: d
                .environment
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect(),
        })
    }
}

/// SCM restart actions for a restart policy, one per allowed retry.
pub fn windows_failure_actions(policy: &RestartPolicy) -> Result<Vec<u32>, ServiceError> {
    policy.validate()?;
    Ok(policy
        .delays()
        .map(|secs| (secs * 1000.0).round().min(u32::MAX as f64) as u32)
        .collect())
}

/// Operations the backend needs from the Service Control Manager.
pub trait ServiceControlManager {
    fn exists(&self, name: &str) -> Result<bool, ServiceError>;
    /// Create the service, set its description, failure actions and environment
    fn create(&self, spec: &WindowsServiceSpec) -> Result<(), ServiceError>;
    fn delete(&self, name: &str) -> Result<(), ServiceError>;
    fn start(&self, name: &str) -> Result<(), ServiceError>;
    /// Stop and wait for the service to report STOPPED; already stopped is success
    fn stop(&self, name: &str) -> Result<(), ServiceError>;
}

/// Parsed `sc query` state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScState {
    Running,
    Other(String),
    /// `sc` reported the service does not exist (error 1060)
    Missing,
}

/// Extract the `STATE` line from `sc query` output.
pub fn parse_sc_query(output: &str) -> ScState {
    if output.contains("1060") {
        return ScState::Missing;
    }
    let state = output
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("STATE"))
        .and_then(|l| l.split_whitespace().last());
    match state {
        Some("RUNNING") => ScState::Running,
        Some(other) => ScState::Other(other.to_string()),
        None => ScState::Other("UNKNOWN".to_string()),
    }
}

pub struct WindowsBackend {
    runner: Arc<dyn CommandRunner>,
    scm: Box<dyn ServiceControlManager>,
    host_exe: Option<PathBuf>,
}

impl WindowsBackend {
    pub fn new(runner: Arc<dyn CommandRunner>, scm: Box<dyn ServiceControlManager>) -> Self {
        Self {
            runner,
            scm,
            host_exe: None,
        }
    }

    /// Register `path` as the service host instead of the running executable
    pub fn with_host_exe(mut self, path: impl Into<PathBuf>) -> Self {
        self.host_exe = Some(path.into());
        self
    }

    fn host_exe(&self) -> Result<PathBuf, ServiceError> {
        match &self.host_exe {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe()
                .map_err(|e| ServiceError::io("locating the servicectl executable", e)),
        }
    }
}

impl ServiceBackend for WindowsBackend {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    fn definition_path(&self, _d: &ServiceDescriptor) -> Option<PathBuf> {
        None
    }

    fn exists(&self, d: &ServiceDescriptor) -> Result<bool, ServiceError> {
        self.scm.exists(d.windows_service_name())
    }

    fn install(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        let spec = WindowsServiceSpec::from_descriptor(d, &self.host_exe()?)?;
        self.scm.create(&spec)
    }

    fn uninstall(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.scm.delete(d.windows_service_name())
    }

    fn start(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.scm.start(d.windows_service_name())
    }

    fn stop(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.scm.stop(d.windows_service_name())
    }

    /// The SCM has no native restart - stop (waiting for STOPPED) then start
    fn restart(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.scm.stop(d.windows_service_name())?;
        self.scm.start(d.windows_service_name())
    }

    fn query_status(&self, d: &ServiceDescriptor) -> Result<StatusReport, ServiceError> {
        let name = d.windows_service_name();
        let output = self.runner.run(SC, &["query", name])?;
        let text = if output.stdout.trim().is_empty() {
            output.diagnostic()
        } else {
            output.stdout.trim_end().to_string()
        };

        Ok(match parse_sc_query(&text) {
            ScState::Running => StatusReport::new(true, text),
            ScState::Other(_) => StatusReport::new(false, text),
            ScState::Missing => StatusReport::new(false, format!("{text}\n{name} is not installed")),
        })
    }
}
