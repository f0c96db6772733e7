//! launchd plist file generation for macOS daemon services.

use std::path::PathBuf;

use plist::{Dictionary, Value};

use crate::descriptor::ServiceDescriptor;
use crate::error::ServiceError;

/// File receiving the service's stdout
pub fn stdout_log_path(d: &ServiceDescriptor) -> PathBuf {
    d.log_directory.join(format!("{}.out.log", d.name))
}

/// File receiving the service's stderr
pub fn stderr_log_path(d: &ServiceDescriptor) -> PathBuf {
    d.log_directory.join(format!("{}.err.log", d.name))
}

/// Generate a launchd property list. The descriptor must already be validated.
pub(super) fn render(d: &ServiceDescriptor) -> Result<String, ServiceError> {
    let mut plist = Dictionary::new();

    plist.insert("Label".to_string(), Value::String(d.launchd_label()));

    let program_args = d.command_line().into_iter().map(Value::String).collect();
    plist.insert("ProgramArguments".to_string(), Value::Array(program_args));

    if !d.environment.is_empty() {
        let mut env = Dictionary::new();
        for (key, value) in &d.environment {
            env.insert(key.clone(), Value::String(value.clone()));
        }
        plist.insert("EnvironmentVariables".to_string(), Value::Dictionary(env));
    }

    plist.insert("RunAtLoad".to_string(), Value::Boolean(true));

    // Relaunch only after abnormal exits, mirroring Restart=on-failure
    let mut keep_alive = Dictionary::new();
    keep_alive.insert("SuccessfulExit".to_string(), Value::Boolean(false));
    plist.insert("KeepAlive".to_string(), Value::Dictionary(keep_alive));

    // launchd has no retry budget; the initial delay becomes its throttle
    let throttle = (d.restart_policy.initial_delay_secs.ceil() as u64).max(1);
    plist.insert("ThrottleInterval".to_string(), Value::Integer(throttle.into()));

    plist.insert(
        "StandardOutPath".to_string(),
        Value::String(stdout_log_path(d).to_string_lossy().into_owned()),
    );
    plist.insert(
        "StandardErrorPath".to_string(),
        Value::String(stderr_log_path(d).to_string_lossy().into_owned()),
    );

    let mut buf = Vec::new();
    plist::to_writer_xml(&mut buf, &Value::Dictionary(plist))
        .map_err(|e| ServiceError::native("plist", format!("Failed to generate plist: {e}")))?;

    String::from_utf8(buf)
        .map_err(|e| ServiceError::native("plist", format!("Plist contains invalid UTF-8: {e}")))
}
