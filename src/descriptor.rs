//! Resolved, validated description of the service to register.
//!
//! A descriptor is built once per invocation from [`ServiceConfig`] and never
//! mutated afterwards. Every renderer calls [`ServiceDescriptor::validate`]
//! before interpolating any field into a definition or a command line.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::config::{RetryStrategy, ServiceConfig};
use crate::error::ServiceError;

/// Restart behaviour forwarded to the native manager; never enforced in-process.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartPolicy {
    pub max_retries: u32,
    pub initial_delay_secs: f64,
    pub backoff_multiplier: f64,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        RetryStrategy::default().into()
    }
}

impl From<RetryStrategy> for RestartPolicy {
    fn from(r: RetryStrategy) -> Self {
        Self {
            max_retries: r.max_retries,
            initial_delay_secs: r.wait,
            backoff_multiplier: 1.0 + r.grow,
        }
    }
}

/// Upper bound on advisory retries handed to a native manager
pub const MAX_RETRIES: u32 = 100;

/// Longest single restart delay; backoff saturates here
pub const MAX_RESTART_DELAY_SECS: f64 = 3600.0;

impl RestartPolicy {
    /// Delay before each retry: `initial * multiplier^n` for `n in 0..max_retries`,
    /// capped at [`MAX_RESTART_DELAY_SECS`].
    pub fn delays(&self) -> impl Iterator<Item = f64> + '_ {
        let first = self.initial_delay_secs.min(MAX_RESTART_DELAY_SECS);
        std::iter::successors(Some(first), |delay| {
            Some((delay * self.backoff_multiplier).min(MAX_RESTART_DELAY_SECS))
        })
        .take(self.max_retries as usize)
    }

    /// Delay before the final retry (the initial delay when retries are disabled)
    pub fn max_delay_secs(&self) -> f64 {
        self.delays().last().unwrap_or(self.initial_delay_secs)
    }

    pub fn total_delay_secs(&self) -> f64 {
        self.delays().sum()
    }

    /// Reject retry counts and delays no native manager can hold.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.max_retries > MAX_RETRIES {
            return Err(ServiceError::invalid(
                "restartPolicy.maxRetries",
                format!("{} exceeds the limit of {MAX_RETRIES}", self.max_retries),
            ));
        }
        if !self.initial_delay_secs.is_finite()
            || self.initial_delay_secs < 0.0
            || self.initial_delay_secs > MAX_RESTART_DELAY_SECS
        {
            return Err(ServiceError::invalid(
                "restartPolicy.initialDelaySeconds",
                format!("must be a number between 0 and {MAX_RESTART_DELAY_SECS}"),
            ));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ServiceError::invalid(
                "restartPolicy.backoffMultiplier",
                "must be a finite number of at least 1.0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDescriptor {
    pub name: String,
    pub description: String,
    pub executable_path: PathBuf,
    /// Runtime launching `executable_path` (e.g. `/usr/bin/node` or `C:\\Program Files\\nodejs\\node.exe`)
    pub interpreter: Option<PathBuf>,
    pub runtime_args: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub restart_policy: RestartPolicy,
    pub log_directory: PathBuf,
}

impl ServiceDescriptor {
    /// Minimal descriptor with defaults for everything but the name and program.
    pub fn new(name: impl Into<String>, executable_path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            description: format!("{name} service"),
            name,
            executable_path: executable_path.into(),
            interpreter: None,
            runtime_args: Vec::new(),
            environment: BTreeMap::new(),
            restart_policy: RestartPolicy::default(),
            log_directory: PathBuf::from("/var/log"),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.runtime_args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    pub fn restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    pub fn log_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_directory = dir.into();
        self
    }

    /// Resolve a configuration file into a descriptor.
    ///
    /// Relative paths resolve against `base_dir`. A bare interpreter name such
    /// as `node` is looked up next to the program first and then on `PATH`.
    /// The target executable must exist; otherwise the whole invocation fails
    /// with `ConfigurationMissing`.
    pub fn from_config(cfg: &ServiceConfig, base_dir: &Path) -> Result<Self, ServiceError> {
        let executable_path = resolve(base_dir, &cfg.script_path);
        if !executable_path.exists() {
            return Err(ServiceError::ConfigurationMissing(format!(
                "cannot find target program at {}",
                executable_path.display()
            )));
        }

        let description = if cfg.description.trim().is_empty() {
            format!("{} service", cfg.service_name)
        } else {
            cfg.description.clone()
        };

        let interpreter = match cfg.interpreter.trim() {
            "" => None,
            raw => Some(resolve_interpreter(base_dir, raw, env::var_os("PATH"))?),
        };

        let descriptor = Self {
            name: cfg.service_name.clone(),
            description,
            executable_path,
            interpreter,
            runtime_args: cfg.node_options.clone(),
            environment: cfg.env.clone(),
            restart_policy: cfg.retry_strategy.clone().into(),
            log_directory: resolve(base_dir, &cfg.log_path),
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Reject anything that could break out of a definition file or a command line.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.name.is_empty() {
            return Err(ServiceError::invalid("name", "must not be empty"));
        }
        if let Some(c) = self
            .name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '@')))
        {
            return Err(ServiceError::invalid(
                "name",
                format!("character {c:?} is not allowed (use letters, digits, '.', '_', '-', '@')"),
            ));
        }
        if self.name.chars().all(|c| c == '.') {
            return Err(ServiceError::invalid("name", "must not consist only of '.'"));
        }
        // `demo@` would be a systemd template unit that cannot be enabled on its own
        if self.name.starts_with('@') || self.name.ends_with('@') {
            return Err(ServiceError::invalid("name", "must not start or end with '@'"));
        }

        check_text("description", &self.description)?;
        check_path("executablePath", &self.executable_path)?;
        if let Some(interpreter) = &self.interpreter {
            check_path("interpreter", interpreter)?;
        }
        for arg in &self.runtime_args {
            check_text("runtimeArgs", arg)?;
        }
        for (key, value) in &self.environment {
            check_env_key(key)?;
            check_text(&format!("environment.{key}"), value)?;
        }
        check_path("logDirectory", &self.log_directory)?;
        self.restart_policy.validate()
    }

    /// systemd unit name (lower-cased service name, without `.service`)
    pub fn unit_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// launchd label, also the plist file stem
    pub fn launchd_label(&self) -> String {
        format!("com.{}", self.name)
    }

    pub fn windows_service_name(&self) -> &str {
        &self.name
    }

    /// Full argv used to launch the service: interpreter, runtime args, program.
    pub fn command_line(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.runtime_args.len() + 2);
        if let Some(interpreter) = &self.interpreter {
            argv.push(interpreter.to_string_lossy().into_owned());
            argv.extend(self.runtime_args.iter().cloned());
        }
        argv.push(self.executable_path.to_string_lossy().into_owned());
        argv
    }
}

fn resolve(base_dir: &Path, raw: &str) -> PathBuf {
    let path = Path::new(raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Absolute paths pass through; `bin/node` joins `base_dir`; `node` goes
/// through a `which` lookup over `base_dir` followed by `search_path`.
fn resolve_interpreter(
    base_dir: &Path,
    raw: &str,
    search_path: Option<OsString>,
) -> Result<PathBuf, ServiceError> {
    let path = Path::new(raw);
    if path.is_absolute() || path.components().count() > 1 {
        return Ok(resolve(base_dir, raw));
    }

    let mut dirs = vec![base_dir.to_path_buf()];
    if let Some(search_path) = &search_path {
        dirs.extend(env::split_paths(search_path));
    }
    let dirs = env::join_paths(dirs).map_err(|e| ServiceError::invalid("interpreter", e.to_string()))?;
    which::which_in(raw, Some(dirs), base_dir).map_err(|e| {
        ServiceError::ConfigurationMissing(format!(
            "cannot find interpreter `{raw}` next to the program or on PATH: {e}"
        ))
    })
}

fn check_text(field: &str, value: &str) -> Result<(), ServiceError> {
    match value.chars().find(|c| c.is_control()) {
        Some(c) => Err(ServiceError::invalid(
            field,
            format!("control character {c:?} is not allowed"),
        )),
        None => Ok(()),
    }
}

fn check_path(field: &str, path: &Path) -> Result<(), ServiceError> {
    let text = path
        .to_str()
        .ok_or_else(|| ServiceError::invalid(field, "path is not valid UTF-8"))?;
    check_text(field, text)?;
    if !path.is_absolute() {
        return Err(ServiceError::invalid(
            field,
            format!("{} is not an absolute path", path.display()),
        ));
    }
    if path.components().any(|c| c == Component::ParentDir) {
        return Err(ServiceError::invalid(
            field,
            format!("{} contains a '..' component", path.display()),
        ));
    }
    Ok(())
}

fn check_env_key(key: &str) -> Result<(), ServiceError> {
    let mut chars = key.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ServiceError::invalid(
            "environment",
            format!("{key:?} is not a valid variable name"),
        ))
    }
}
