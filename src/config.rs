use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// File name looked up next to the executable when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "service.toml";

/// On‑disk TOML description of the service to manage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub service_name: String,
    #[serde(default)]
    pub description: String,
    /// Program (or script) to run; relative paths resolve against the program directory
    pub script_path: String,
    /// Runtime that launches `script_path`; empty runs the script directly
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Runtime flags placed between the interpreter and the script
    #[serde(default)]
    pub node_options: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_log_path")]
    pub log_path: String,
    #[serde(default)]
    pub retry_strategy: RetryStrategy,
}

/// Bare name resolved through `PATH` at load time, so one default serves
/// `/usr/bin/node` and `node.exe` alike.
fn default_interpreter() -> String {
    "node".to_string()
}

fn default_log_path() -> String {
    "logs".to_string()
}

/// Advisory restart behaviour handed to the native manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryStrategy {
    pub max_retries: u32,
    /// Seconds before the first restart
    pub wait: f64,
    /// Fractional growth of the wait after each failure (0.5 → +50%)
    pub grow: f64,
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            wait: 1.0,
            grow: 0.5,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            service_name: "MyNodeApiService".into(),
            description: "Node.js API running as a native service".into(),
            script_path: "app.js".into(),
            interpreter: default_interpreter(),
            node_options: vec!["--harmony".into(), "--max_old_space_size=4096".into()],
            env: BTreeMap::from([("NODE_ENV".to_string(), "production".to_string())]),
            log_path: default_log_path(),
            retry_strategy: RetryStrategy::default(),
        }
    }
}

impl ServiceConfig {
    /// Load and parse a configuration file.
    ///
    /// A missing file is `ConfigurationMissing`; anything else that prevents
    /// reading or parsing it is `ConfigurationInvalid`.
    pub fn load(path: &Path) -> Result<Self, ServiceError> {
        if !path.exists() {
            return Err(ServiceError::ConfigurationMissing(format!(
                "config file not found at {}",
                path.display()
            )));
        }

        let raw = fs::read_to_string(path).map_err(|e| ServiceError::ConfigurationInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::parse(&raw).map_err(|reason| ServiceError::ConfigurationInvalid {
            path: path.to_path_buf(),
            reason,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        toml::from_str(raw).map_err(|e| e.to_string())
    }

    /// Serialize to TOML, e.g. to seed a new configuration file
    pub fn to_toml(&self) -> Result<String, ServiceError> {
        toml::to_string_pretty(self).map_err(|e| ServiceError::ConfigurationInvalid {
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
            reason: e.to_string(),
        })
    }
}

/// Directory holding the running executable; relative config paths resolve against it.
pub fn program_dir() -> Result<PathBuf, ServiceError> {
    let exe = std::env::current_exe()
        .map_err(|e| ServiceError::io("locating the current executable", e))?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        ServiceError::ConfigurationMissing(format!(
            "executable {} has no parent directory",
            exe.display()
        ))
    })
}

/// Config path from the command line, or `service.toml` beside the program.
pub fn resolve_config_path(explicit: Option<&Path>, program_dir: &Path) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => program_dir.join(DEFAULT_CONFIG_FILE),
    }
}
