//! macOS service control using launchd (property list + launchctl)

use std::fs;
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

pub const DEFAULT_PLIST_DIR: &str = "/Library/LaunchDaemons";

const LAUNCHCTL: &str = "launchctl";

pub struct LaunchdBackend {
    runner: Arc<dyn CommandRunner>,
    plist_dir: PathBuf,
}

/// One row of `launchctl list`: `PID\tStatus\tLabel`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchdEntry {
    /// `None` when the job is loaded but not running (`-`)
    pub pid: Option<u32>,
    pub last_exit_status: Option<i32>,
    pub line: String,
}

/// Find `label` in `launchctl list` output.
pub fn find_launchd_entry(list_output: &str, label: &str) -> Option<LaunchdEntry> {
    list_output.lines().find_map(|line| {
        let mut cols = line.split_whitespace();
        let pid = cols.next()?;
        let status = cols.next()?;
        let entry_label = cols.next()?;
        if entry_label != label {
            return None;
        }
        Some(LaunchdEntry {
            pid: pid.parse().ok(),
            last_exit_status: status.parse().ok(),
            line: line.to_string(),
        })
    })
}

impl LaunchdBackend {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            plist_dir: PathBuf::from(DEFAULT_PLIST_DIR),
        }
    }

    /// Write property lists somewhere other than `/Library/LaunchDaemons`
    pub fn with_plist_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.plist_dir = dir.into();
        self
    }

    pub fn plist_path(&self, d: &ServiceDescriptor) -> PathBuf {
        self.plist_dir.join(format!("{}.plist", d.launchd_label()))
    }

    /// Run launchctl and fail on a non-zero exit
    fn launchctl(&self, args: &[&str]) -> Result<CommandOutput, ServiceError> {
        let output = self.runner.run(LAUNCHCTL, args)?;
        if !output.success() {
            return Err(ServiceError::from_output(
                format!("{LAUNCHCTL} {}", args.join(" ")),
                &output,
            ));
        }
        Ok(output)
    }

    fn plist_arg(&self, d: &ServiceDescriptor) -> Result<String, ServiceError> {
        let path = self.plist_path(d);
        path.to_str()
            .map(str::to_string)
            .ok_or_else(|| ServiceError::invalid("plistPath", "Invalid plist file path"))
    }
}

impl ServiceBackend for LaunchdBackend {
    fn platform(&self) -> Platform {
        Platform::Darwin
    }

    fn definition_path(&self, d: &ServiceDescriptor) -> Option<PathBuf> {
        Some(self.plist_path(d))
    }

    fn exists(&self, d: &ServiceDescriptor) -> Result<bool, ServiceError> {
        Ok(self.plist_path(d).is_file())
    }

    fn install(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        let content = render_definition(d, DefinitionFormat::LaunchdPlist)?;

        // launchd refuses to start a job whose log paths can't be opened
        fs::create_dir_all(&d.log_directory).map_err(|e| {
            ServiceError::io(format!("creating log directory {}", d.log_directory.display()), e)
        })?;

        let plist_path = self.plist_path(d);
        write_file_atomic(&plist_path, &content)?;
        debug!("wrote {}", plist_path.display());

        self.launchctl(&["load", "-w", &self.plist_arg(d)?])?;
        Ok(())
    }

    fn uninstall(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.launchctl(&["unload", "-w", &self.plist_arg(d)?])?;
        remove_file_if_exists(&self.plist_path(d))
    }

    fn start(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.launchctl(&["start", &d.launchd_label()]).map(drop)
    }

    fn stop(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.launchctl(&["stop", &d.launchd_label()]).map(drop)
    }

    /// kickstart -k kills the running instance and starts it again
    fn restart(&self, d: &ServiceDescriptor) -> Result<(), ServiceError> {
        let target = format!("system/{}", d.launchd_label());
        self.launchctl(&["kickstart", "-k", &target]).map(drop)
    }

    fn query_status(&self, d: &ServiceDescriptor) -> Result<StatusReport, ServiceError> {
        let label = d.launchd_label();
        let output = self.launchctl(&["list"])?;

        // report the matching `launchctl list` row as-is, followed by a summary
        let report = match find_launchd_entry(&output.stdout, &label) {
            Some(LaunchdEntry { pid: Some(pid), line, .. }) => {
                StatusReport::new(true, format!("{line}\n{label} is running (pid {pid})"))
            }
            Some(LaunchdEntry { pid: None, last_exit_status, line }) => {
                let exit = last_exit_status
                    .map(|s| format!(", last exit status {s}"))
                    .unwrap_or_default();
                StatusReport::new(false, format!("{line}\n{label} is loaded but not running{exit}"))
            }
            None => StatusReport::new(false, format!("{label} is not loaded (not running)")),
        };
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "PID\tStatus\tLabel\n\
                        -\t0\tcom.apple.something\n\
                        412\t0\tcom.demo\n\
                        -\t78\tcom.demo.helper\n";

    #[test]
    fn finds_exact_label_only() {
        let entry = find_launchd_entry(LIST, "com.demo").unwrap();
        assert_eq!(entry.pid, Some(412));
        assert_eq!(entry.last_exit_status, Some(0));

        let helper = find_launchd_entry(LIST, "com.demo.helper").unwrap();
        assert_eq!(helper.pid, None);
        assert_eq!(helper.last_exit_status, Some(78));

        assert!(find_launchd_entry(LIST, "com.dem").is_none());
    }
}
