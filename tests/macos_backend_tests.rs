mod common;

use std::path::Path;
use std::sync::Arc;

use common::{CaptureLog, FakeRunner, demo_descriptor, output};
use plist::Value;
use servicectl::control::LaunchdBackend;
use servicectl::{CommandRunner, OutcomeStatus, ServiceBackend, ServiceController, Verb};

fn backend(runner: &Arc<FakeRunner>, plist_dir: &Path) -> LaunchdBackend {
    LaunchdBackend::new(runner.clone() as Arc<dyn CommandRunner>).with_plist_dir(plist_dir)
}

fn controller(runner: &Arc<FakeRunner>, plist_dir: &Path) -> ServiceController {
    ServiceController::new(
        Box::new(backend(runner, plist_dir)),
        CaptureLog::new().event_log("demo"),
    )
}

#[test]
fn install_writes_plist_loads_and_starts() {
    let root = tempfile::tempdir().unwrap();
    let plist_dir = root.path().join("LaunchDaemons");
    let d = demo_descriptor(root.path());
    let runner = FakeRunner::new();

    let outcome = controller(&runner, &plist_dir).execute(Verb::Install, &d);
    assert_eq!(outcome.status, OutcomeStatus::Success, "{}", outcome.detail);

    let plist_path = plist_dir.join("com.demo.plist");
    let value = Value::from_file(&plist_path).unwrap();
    let dict = value.as_dictionary().unwrap();
    assert_eq!(dict.get("Label").and_then(Value::as_string), Some("com.demo"));
    assert_eq!(dict.get("RunAtLoad").and_then(Value::as_boolean), Some(true));
    let env = dict.get("EnvironmentVariables").and_then(Value::as_dictionary).unwrap();
    assert_eq!(env.get("NODE_ENV").and_then(Value::as_string), Some("production"));
    let stdout = dict.get("StandardOutPath").and_then(Value::as_string).unwrap();
    assert!(stdout.ends_with("demo.out.log"));

    // launchd needs the log directory to exist before it opens the log files
    assert!(d.log_directory.is_dir());
    assert_eq!(
        runner.calls(),
        vec![
            format!("launchctl load -w {}", plist_path.display()),
            "launchctl start com.demo".to_string(),
        ]
    );
}

#[test]
fn status_reports_running_pid() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new();
    runner.script("launchctl list", output(0, "PID\tStatus\tLabel\n412\t0\tcom.demo\n", ""));

    let outcome = controller(&runner, root.path()).execute(Verb::Status, &demo_descriptor(root.path()));

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert!(outcome.detail.contains("412\t0\tcom.demo"));
    assert!(outcome.detail.contains("running (pid 412)"));
}

#[test]
fn status_of_loaded_but_stopped_job() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new();
    runner.script("launchctl list", output(0, "-\t78\tcom.demo\n", ""));

    let outcome = controller(&runner, root.path()).execute(Verb::Status, &demo_descriptor(root.path()));

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert!(outcome.detail.contains("loaded but not running, last exit status 78"));
}

#[test]
fn failing_launchctl_list_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new();
    runner.script("launchctl list", output(1, "", "Could not connect to launchd"));

    let outcome = controller(&runner, root.path()).execute(Verb::Status, &demo_descriptor(root.path()));

    assert_eq!(outcome.status, OutcomeStatus::Error);
    assert!(outcome.detail.contains("Could not connect"));
}

#[test]
fn restart_kicks_the_system_domain_job() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new();
    let d = demo_descriptor(root.path());
    let c = controller(&runner, root.path());
    c.execute(Verb::Install, &d);

    let outcome = c.execute(Verb::Restart, &d);

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert_eq!(runner.calls().last().unwrap(), "launchctl kickstart -k system/com.demo");
}

#[test]
fn uninstall_unloads_and_removes_plist() {
    let root = tempfile::tempdir().unwrap();
    let runner = FakeRunner::new();
    let d = demo_descriptor(root.path());
    let c = controller(&runner, root.path());
    c.execute(Verb::Install, &d);

    let outcome = c.execute(Verb::Uninstall, &d);

    assert_eq!(outcome.status, OutcomeStatus::Success);
    assert!(!root.path().join("com.demo.plist").exists());
    assert!(!backend(&runner, root.path()).exists(&d).unwrap());
    let unload = format!("launchctl unload -w {}", root.path().join("com.demo.plist").display());
    assert!(runner.calls().contains(&unload));
}
