//! Synchronous execution of native service-management tools.
//!
//! Arguments are always passed as an argv vector, never through a shell, so
//! descriptor content can not be reinterpreted as shell syntax.

use std::process::Command;

use log::debug;

use crate::error::ServiceError;

/// Captured result of one external tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Best available diagnostic text: stderr, then stdout, then the exit code.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.code {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Seam between backends and the processes they launch.
pub trait CommandRunner {
    /// Run `program` to completion. Only a failure to launch the program is an
    /// `Err`; a non-zero exit is returned in the [`CommandOutput`].
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ServiceError>;
}

/// Runs tools found on `PATH` with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ServiceError> {
        let resolved = which::which(program).map_err(|e| {
            ServiceError::native(program, format!("{program} not found in PATH: {e}"))
        })?;

        debug!("exec: {} {}", resolved.display(), args.join(" "));

        let output = Command::new(&resolved)
            .args(args)
            .output()
            .map_err(|e| ServiceError::native(program, format!("Failed to execute {program}: {e}")))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_prefers_stderr() {
        let out = CommandOutput {
            code: Some(1),
            stdout: "ignored".into(),
            stderr: "  Unit demo.service not found.\n".into(),
        };
        assert_eq!(out.diagnostic(), "Unit demo.service not found.");
    }

    #[test]
    fn diagnostic_falls_back_to_exit_code() {
        let out = CommandOutput {
            code: Some(5),
            ..Default::default()
        };
        assert_eq!(out.diagnostic(), "exited with status 5");
        assert!(!out.success());
    }

    #[test]
    fn missing_tool_is_reported_not_panicked() {
        let err = SystemRunner
            .run("definitely-not-a-real-service-tool-xyz", &[])
            .unwrap_err();
        assert!(matches!(err, ServiceError::NativeToolFailure { .. }));
        assert!(err.to_string().contains("not found"));
    }
}
