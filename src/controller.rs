//! Verb dispatch over a native service backend.
//!
//! Every verb returns an [`Outcome`]; nothing here panics or retries. Absent
//! registrations are reported as `NotInstalled` and never auto-installed.

use std::sync::Arc;

use crate::control::{ServiceBackend, select_backend};
use crate::descriptor::ServiceDescriptor;
use crate::error::ServiceError;
use crate::logging::EventLog;
use crate::outcome::{Outcome, OutcomeStatus, Verb};
use crate::platform::Platform;
use crate::runner::CommandRunner;

pub struct ServiceController {
    backend: Box<dyn ServiceBackend>,
    log: EventLog,
}

impl ServiceController {
    pub fn new(backend: Box<dyn ServiceBackend>, log: EventLog) -> Self {
        Self { backend, log }
    }

    pub fn platform(&self) -> Platform {
        self.backend.platform()
    }

    pub fn execute(&self, verb: Verb, d: &ServiceDescriptor) -> Outcome {
        self.log.debug(format_args!("{verb} {} on {}", d.name, self.platform()));
        match verb {
            Verb::Install => self.install(d),
            Verb::Uninstall => self.uninstall(d),
            Verb::Start => self.start(d),
            Verb::Stop => self.stop(d),
            Verb::Restart => self.restart(d),
            Verb::Status => self.status(d),
        }
    }

    /// Register and start the service. An existing registration is left untouched.
    pub fn install(&self, d: &ServiceDescriptor) -> Outcome {
        let verb = Verb::Install;
        match self.backend.exists(d) {
            Ok(true) => {
                self.log.info(format_args!("{} is already installed", d.name));
                return self.outcome(
                    verb,
                    OutcomeStatus::AlreadyInDesiredState,
                    format!("{} is already installed", d.name),
                );
            }
            Ok(false) => {}
            Err(e) => return self.fail(verb, &e),
        }

        if let Err(e) = self.backend.install(d) {
            return self.fail_with_leftover(verb, d, format!("install failed: {e}"));
        }
        self.log.info(format_args!("{} installed", d.name));

        if let Err(e) = self.backend.start(d) {
            return self.fail_with_leftover(
                verb,
                d,
                format!("{} was registered but failed to start: {e}", d.name),
            );
        }
        self.log.info(format_args!("{} started", d.name));
        self.outcome(verb, OutcomeStatus::Success, format!("{} installed and started", d.name))
    }

    /// Stop (best effort) and deregister the service.
    pub fn uninstall(&self, d: &ServiceDescriptor) -> Outcome {
        let verb = Verb::Uninstall;
        if let Some(outcome) = self.require_installed(verb, d) {
            return outcome;
        }

        if let Err(e) = self.backend.stop(d) {
            self.log
                .warn(format_args!("stopping {} before uninstall failed: {e}", d.name));
        }

        match self.backend.uninstall(d) {
            Ok(()) => {
                self.log.info(format_args!("{} uninstalled", d.name));
                self.outcome(verb, OutcomeStatus::Success, format!("{} uninstalled", d.name))
            }
            Err(e) => self.fail(verb, &e),
        }
    }

    pub fn start(&self, d: &ServiceDescriptor) -> Outcome {
        self.lifecycle(Verb::Start, d, "started", |b, d| b.start(d))
    }

    pub fn stop(&self, d: &ServiceDescriptor) -> Outcome {
        self.lifecycle(Verb::Stop, d, "stopped", |b, d| b.stop(d))
    }

    pub fn restart(&self, d: &ServiceDescriptor) -> Outcome {
        self.lifecycle(Verb::Restart, d, "restarted", |b, d| b.restart(d))
    }

    /// Report the native manager's view. A stopped service is still a success.
    pub fn status(&self, d: &ServiceDescriptor) -> Outcome {
        match self.backend.query_status(d) {
            Ok(report) => {
                let state = if report.running { "running" } else { "not running" };
                self.log.info(format_args!("{} is {state}", d.name));
                self.outcome(Verb::Status, OutcomeStatus::Success, report.report)
            }
            Err(e) => self.fail(Verb::Status, &e),
        }
    }

    fn lifecycle(
        &self,
        verb: Verb,
        d: &ServiceDescriptor,
        done: &str,
        op: impl FnOnce(&dyn ServiceBackend, &ServiceDescriptor) -> Result<(), ServiceError>,
    ) -> Outcome {
        if let Some(outcome) = self.require_installed(verb, d) {
            return outcome;
        }
        match op(self.backend.as_ref(), d) {
            Ok(()) => {
                self.log.info(format_args!("{} {done}", d.name));
                self.outcome(verb, OutcomeStatus::Success, format!("{} {done}", d.name))
            }
            Err(e) => self.fail(verb, &e),
        }
    }

    /// `Some(outcome)` when the verb must stop here: not installed or the check failed
    fn require_installed(&self, verb: Verb, d: &ServiceDescriptor) -> Option<Outcome> {
        match self.backend.exists(d) {
            Ok(true) => None,
            Ok(false) => {
                let detail = format!("{} is not installed; run `install` first", d.name);
                self.log.error(format_args!("cannot {verb}: {detail}"));
                Some(self.outcome(verb, OutcomeStatus::NotInstalled, detail))
            }
            Err(e) => Some(self.fail(verb, &e)),
        }
    }

    fn fail(&self, verb: Verb, e: &ServiceError) -> Outcome {
        self.log.error(format_args!("{verb} failed: {e}"));
        Outcome::error(verb, self.platform(), e)
    }

    /// Error outcome that names any definition file still on disk
    fn fail_with_leftover(&self, verb: Verb, d: &ServiceDescriptor, mut detail: String) -> Outcome {
        if let Some(path) = self.backend.definition_path(d).filter(|p| p.exists()) {
            detail.push_str(&format!(
                "; the service definition was left in place at {}",
                path.display()
            ));
        }
        self.log.error(format_args!("{detail}"));
        self.outcome(verb, OutcomeStatus::Error, detail)
    }

    fn outcome(&self, verb: Verb, status: OutcomeStatus, detail: String) -> Outcome {
        Outcome::new(verb, self.platform(), status, detail)
    }
}

/// Select the backend for `platform` and execute `verb`.
///
/// An unsupported platform yields an `Error` outcome before any native call.
pub fn run(
    platform: Platform,
    verb: Verb,
    d: &ServiceDescriptor,
    runner: Arc<dyn CommandRunner>,
    log: EventLog,
) -> Outcome {
    match select_backend(&platform, runner) {
        Ok(backend) => ServiceController::new(backend, log).execute(verb, d),
        Err(e) => {
            log.error(format_args!("{e}"));
            Outcome::error(verb, platform, &e)
        }
    }
}
