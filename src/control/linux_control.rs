//! Linux service control using systemd (unit file + systemctl)

use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use super::file_ops::{remove_file_if_exists, write_file_atomic};
use super::{ServiceBackend, StatusReport};
use crate::descriptor::ServiceDescriptor;
use crate::error::ServiceError;
use crate::platform::Platform;
use crate::render::{DefinitionFormat, render_definition};
use crate::runner::{CommandOutput, CommandRunner};

pub const DEFAULT_UNIT_DIR: &str = "/etc/systemd/system";

const SYSTEMCTL: &str = "systemctl";

pub struct SystemdBackend {
    runner: Arc<dyn CommandRunner>,
    unit_dir: PathBuf,
}

impl SystemdBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            unit_dir: PathBuf::from(DEFAULT_UNIT_DIR),
        }
    }

    /// Write unit files somewhere other than `/etc/systemd/system`
    pub fn with_unit_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.unit_dir = dir.into();
        self
    }

    pub fn unit_path(&self, d: &ServiceDescriptor) -> PathBuf {
        self.unit_dir.join(unit_file_name(d))
    }

    /// Run systemctl and fail on a non-zero exit
    fn systemctl(&self, args: &[&str]) -> Result<CommandOutput, ServiceError> {
        let output = self.runner.run(SYSTEMCTL, args)?;
        if !output.success() {
            return Err(ServiceError::from_output(
                format!("{SYSTEMCTL} {}", args.join(" ")),
                &output,
            ));
        }
        Ok(output)
    }
}

fn unit_file_name(d: &ServiceDescriptor) -> String {
    format!("{}.service", d.unit_name())
}

impl ServiceBackend for SystemdBackend {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn definition_path(&self, d: &ServiceDescriptor) -> Option<PathBuf> {
        Some(self.unit_path(d))
    }

    /// The unit file is the registration; its presence is the existence check
    fn exists(&self, d: &ServiceDescriptor) -> Result<bool, ServiceError> {
        Ok(self.unit_path(d).is_file())
    }

    fn install(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        let content = render_definition(d, DefinitionFormat::SystemdUnit)?;
        let unit_path = self.unit_path(d);

        write_file_atomic(&unit_path, &content)?;
        debug!("wrote {}", unit_path.display());

        self.systemctl(&["daemon-reload"])?;
        self.systemctl(&["enable", &unit_file_name(d)])?;
        Ok(())
    }

    fn uninstall(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.systemctl(&["disable", &unit_file_name(d)])?;
        remove_file_if_exists(&self.unit_path(d))?;
        self.systemctl(&["daemon-reload"])?;
        Ok(())
    }

    fn start(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.systemctl(&["start", &unit_file_name(d)]).map(drop)
    }

    fn stop(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.systemctl(&["stop", &unit_file_name(d)]).map(drop)
    }

    fn restart(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.systemctl(&["restart", &unit_file_name(d)]).map(drop)
    }

    fn query_status(&self, d: &ServiceDescriptor) -> Result<StatusReport, ServiceError> {
        // systemctl status exits 0 when active, 3 when inactive, 4 for an
        // unknown unit; all of these are reports, not failures
        let output = self
            .runner
            .run(SYSTEMCTL, &["status", &unit_file_name(d), "--no-pager"])?;

        let report = if output.stdout.trim().is_empty() {
            output.diagnostic()
        } else {
            output.stdout.trim_end().to_string()
        };
        Ok(StatusReport::new(output.success(), report))
    }
}
