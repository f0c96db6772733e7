//! Systemd unit file generation.

use crate::descriptor::ServiceDescriptor;

use super::escape::{systemd_env_assignment, systemd_exec_word, systemd_text};
use super::systemd_timespan;

/// Generate unit file content. The descriptor must already be validated.
pub(super) fn render(d: &ServiceDescriptor) -> String {
    let mut content = String::with_capacity(1024);
    let policy = &d.restart_policy;

    // [Unit] section
    content.push_str("[Unit]\n");
    content.push_str(&format!("Description={}\n", systemd_text(&d.description)));
    content.push_str("After=network.target\n");
    // Allow every advisory retry inside the window before systemd gives up
    let window = (policy.total_delay_secs().ceil() as u64).saturating_mul(2).max(10);
    content.push_str(&format!("StartLimitIntervalSec={window}s\n"));
    content.push_str(&format!(
        "StartLimitBurst={}\n",
        policy.max_retries.saturating_add(1)
    ));
    content.push('\n');

    // [Service] section
    content.push_str("[Service]\n");
    let exec_start = d
        .command_line()
        .iter()
        .map(|word| systemd_exec_word(word))
        .collect::<Vec<_>>()
        .join(" ");
    content.push_str(&format!("ExecStart={exec_start}\n"));

    content.push_str("Restart=on-failure\n");
    content.push_str(&format!(
        "RestartSec={}\n",
        systemd_timespan(policy.initial_delay_secs)
    ));
    if policy.max_retries > 0 && policy.backoff_multiplier > 1.0 {
        // systemd >= 254; older versions ignore these with a warning
        content.push_str(&format!("RestartSteps={}\n", policy.max_retries));
        content.push_str(&format!(
            "RestartMaxDelaySec={}\n",
            systemd_timespan(policy.max_delay_secs())
        ));
    }

    for (key, value) in &d.environment {
        content.push_str(&format!(
            "Environment={}\n",
            systemd_env_assignment(key, value)
        ));
    }

    content.push_str("StandardOutput=syslog\n");
    content.push_str("StandardError=syslog\n");
    content.push_str(&format!("SyslogIdentifier={}\n", d.unit_name()));
    content.push('\n');

    // [Install] section
    content.push_str("[Install]\n");
    content.push_str("WantedBy=multi-user.target\n");

    content
}
