//! Service host for the Windows Service Control Manager.
//!
//! The SCM only talks to processes that connect through
//! `StartServiceCtrlDispatcher`, which a plain runtime such as `node.exe`
//! never does. On Windows `install` therefore registers
//! `servicectl --service-host <name> --log-dir <dir> -- <command...>`; the host
//! reports RUNNING, supervises the configured command and reports STOPPED
//! when the command exits or the SCM asks it to stop.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

use crate::cli::Args;
use crate::descriptor::ServiceDescriptor;
use crate::error::ServiceError;

pub const HOST_FLAG: &str = "--service-host";
pub const LOG_DIR_FLAG: &str = "--log-dir";

/// The command a host supervises, with the directory receiving its output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    pub name: String,
    pub log_dir: PathBuf,
    pub argv: Vec<String>,
}

impl HostCommand {
    pub fn from_descriptor(d: &ServiceDescriptor) -> Self {
        Self {
            name: d.windows_service_name().to_string(),
            log_dir: d.log_directory.clone(),
            argv: d.command_line(),
        }
    }

    /// Host invocation requested on the command line, if any
    pub fn from_args(args: &Args) -> Option<Self> {
        let name = args.service_host.clone()?;
        let log_dir = args.log_dir.clone()?;
        Some(Self {
            name,
            log_dir,
            argv: args.command.clone(),
        })
    }

    /// Arguments registered with the SCM: `host_exe` followed by the host flags and the command
    pub fn host_argv(&self, host_exe: &Path) -> Vec<String> {
        let mut argv = vec![
            host_exe.to_string_lossy().into_owned(),
            HOST_FLAG.to_string(),
            self.name.clone(),
            LOG_DIR_FLAG.to_string(),
            self.log_dir.to_string_lossy().into_owned(),
            "--".to_string(),
        ];
        argv.extend(self.argv.iter().cloned());
        argv
    }

    /// Same file names launchd uses for the program's stdout
    pub fn stdout_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.out.log", self.name))
    }

    pub fn stderr_path(&self) -> PathBuf {
        self.log_dir.join(format!("{}.err.log", self.name))
    }

    /// Build the child process: output appended to the log files, stdin closed,
    /// working directory set to the program's directory.
    ///
    /// The environment is inherited; the SCM already applied the service's
    /// `Environment` registry value to the host.
    pub fn command(&self) -> Result<Command, ServiceError> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| ServiceError::invalid("command", "no program to host"))?;

        fs::create_dir_all(&self.log_dir)
            .map_err(|e| ServiceError::io(format!("creating {}", self.log_dir.display()), e))?;
        let stdout = append(&self.stdout_path())?;
        let stderr = append(&self.stderr_path())?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr);
        if let Some(dir) = self.argv.last().map(Path::new).and_then(Path::parent) {
            if dir.is_absolute() {
                command.current_dir(dir);
            }
        }
        Ok(command)
    }

    pub fn spawn(&self) -> Result<Child, ServiceError> {
        self.command()?
            .spawn()
            .map_err(|e| ServiceError::io(format!("starting {}", self.argv.join(" ")), e))
    }
}

fn append(path: &Path) -> Result<File, ServiceError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| ServiceError::io(format!("opening {}", path.display()), e))
}

/// Exit code the host reports to the SCM for a finished child; anything but 0
/// counts as a failure and triggers the configured restart actions.
pub fn service_exit_code(status: ExitStatus) -> u32 {
    match status.code() {
        Some(code) => code as u32,
        // terminated without an exit code
        None => 1,
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "windows")] {
        mod dispatcher;

        /// Connect to the SCM and host `cmd` until it exits or the service is stopped
        pub fn run(cmd: HostCommand) -> Result<(), ServiceError> {
            dispatcher::run(cmd)
        }
    } else {
        pub fn run(_cmd: HostCommand) -> Result<(), ServiceError> {
            Err(ServiceError::UnsupportedPlatform(
                "the service host only runs under the Windows Service Control Manager".to_string(),
            ))
        }
    }
}
