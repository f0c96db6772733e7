//! Shared fakes for integration tests
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{Level, Log, Metadata, Record};
use servicectl::control::{ServiceControlManager, WindowsServiceSpec};
use servicectl::{
    CommandOutput, CommandRunner, EventLog, Platform, ServiceBackend, ServiceDescriptor,
    ServiceError, StatusReport,
};

/// Demo descriptor with absolute paths on every host
pub fn demo_descriptor(root: &Path) -> ServiceDescriptor {
    ServiceDescriptor::new("demo", root.join("opt/demo/app"))
        .env("NODE_ENV", "production")
        .log_directory(root.join("logs"))
}

pub fn output(code: i32, stdout: &str, stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    }
}

/// Split a command line the way `CommandLineToArgvW` does.
pub fn split_windows(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut in_quotes = false;
    let mut backslashes = 0usize;

    for c in line.chars() {
        match c {
            '\\' => {
                backslashes += 1;
                in_arg = true;
            }
            '"' => {
                current.extend(std::iter::repeat_n('\\', backslashes / 2));
                if backslashes % 2 == 1 {
                    current.push('"');
                } else {
                    in_quotes = !in_quotes;
                }
                backslashes = 0;
                in_arg = true;
            }
            ' ' | '\t' if !in_quotes => {
                current.extend(std::iter::repeat_n('\\', backslashes));
                backslashes = 0;
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            _ => {
                current.extend(std::iter::repeat_n('\\', backslashes));
                backslashes = 0;
                current.push(c);
                in_arg = true;
            }
        }
    }
    current.extend(std::iter::repeat_n('\\', backslashes));
    if in_arg {
        args.push(current);
    }
    args
}

/// Records every invocation as one `program arg arg` string and replays
/// scripted outputs; unscripted commands succeed with empty output.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<String>>,
    scripted: Mutex<Vec<(String, CommandOutput)>>,
}

impl FakeRunner {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Reply with `output` to any command line starting with `prefix`
    pub fn script(&self, prefix: &str, output: CommandOutput) {
        self.scripted.lock().unwrap().push((prefix.to_string(), output));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ServiceError> {
        let line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(line.clone());

        let scripted = self.scripted.lock().unwrap();
        Ok(scripted
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_else(|| output(0, "", "")))
    }
}

#[derive(Debug, Default)]
pub struct BackendState {
    pub installed: bool,
    pub running: bool,
    pub calls: Vec<&'static str>,
    /// Operation names that fail with a `NativeToolFailure`
    pub failing: BTreeSet<&'static str>,
}

/// In-memory backend; clones share state so a test can inspect it after
/// handing one to the controller.
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub state: Arc<Mutex<BackendState>>,
    pub definition: Option<PathBuf>,
}

impl FakeBackend {
    pub fn installed() -> Self {
        let backend = Self::default();
        backend.state.lock().unwrap().installed = true;
        backend
    }

    pub fn fail(&self, op: &'static str) {
        self.state.lock().unwrap().failing.insert(op);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, op: &'static str) -> Result<std::sync::MutexGuard<'_, BackendState>, ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(op);
        if state.failing.contains(op) {
            return Err(ServiceError::native(format!("fake {op}"), "exit status 1: boom"));
        }
        Ok(state)
    }
}

impl ServiceBackend for FakeBackend {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn definition_path(&self, _d: &ServiceDescriptor) -> Option<PathBuf> {
        self.definition.clone()
    }

    fn exists(&self, _d: &ServiceDescriptor) -> Result<bool, ServiceError> {
        Ok(self.record("exists")?.installed)
    }

    fn install(&self, _d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.record("install")?.installed = true;
        Ok(())
    }

    fn uninstall(&self, _d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.record("uninstall")?.installed = false;
        Ok(())
    }

    fn start(&self, _d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.record("start")?.running = true;
        Ok(())
    }

    fn stop(&self, _d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.record("stop")?.running = false;
        Ok(())
    }

    fn restart(&self, _d: &ServiceDescriptor) -> Result<(), ServiceError> {
        self.record("restart")?.running = true;
        Ok(())
    }

    fn query_status(&self, d: &ServiceDescriptor) -> Result<StatusReport, ServiceError> {
        let state = self.record("query_status")?;
        let text = if state.running { "active (running)" } else { "inactive (dead)" };
        Ok(StatusReport::new(state.running, format!("{}: {text}", d.name)))
    }
}

#[derive(Debug, Default)]
pub struct ScmState {
    pub services: BTreeMap<String, WindowsServiceSpec>,
    pub running: BTreeSet<String>,
    pub calls: Vec<String>,
}

/// In-memory Service Control Manager
#[derive(Clone, Default)]
pub struct FakeScm {
    pub state: Arc<Mutex<ScmState>>,
}

impl FakeScm {
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn spec(&self, name: &str) -> Option<WindowsServiceSpec> {
        self.state.lock().unwrap().services.get(name).cloned()
    }
}

impl ServiceControlManager for FakeScm {
    fn exists(&self, name: &str) -> Result<bool, ServiceError> {
        Ok(self.state.lock().unwrap().services.contains_key(name))
    }

    fn create(&self, spec: &WindowsServiceSpec) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create {}", spec.name));
        state.services.insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete {name}"));
        state.services.remove(name);
        Ok(())
    }

    fn start(&self, name: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("start {name}"));
        state.running.insert(name.to_string());
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<(), ServiceError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("stop {name}"));
        state.running.remove(name);
        Ok(())
    }
}

/// Logger that keeps every record for later assertions
#[derive(Default)]
pub struct CaptureLog {
    records: Mutex<Vec<(Level, String, String)>>,
}

impl CaptureLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn event_log(self: &Arc<Self>, target: &str) -> EventLog {
        EventLog::with_sink(target, self.clone())
    }

    pub fn records(&self) -> Vec<(Level, String, String)> {
        self.records.lock().unwrap().clone()
    }

    pub fn has(&self, level: Level, needle: &str) -> bool {
        self.records()
            .iter()
            .any(|(l, _, msg)| *l == level && msg.contains(needle))
    }
}

impl Log for CaptureLog {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &Record<'_>) {
        self.records.lock().unwrap().push((
            record.level(),
            record.target().to_string(),
            record.args().to_string(),
        ));
    }

    fn flush(&self) {}
}
