use std::fs;
use std::path::{Path, PathBuf};

use servicectl::{ServiceConfig, ServiceDescriptor, ServiceError};

fn example_config() -> ServiceConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("service.example.toml");
    ServiceConfig::load(&path).unwrap()
}

#[test]
fn shipped_example_matches_defaults() {
    assert_eq!(example_config(), ServiceConfig::default());
}

/// Stand-in runtime named the way the host names executables.
fn install_runtime(dir: &Path) -> PathBuf {
    let node = dir.join(if cfg!(windows) { "node.exe" } else { "node" });
    fs::write(&node, "").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&node, fs::Permissions::from_mode(0o755)).unwrap();
    }
    node
}

#[test]
fn example_resolves_against_program_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.js"), "console.log('hi')").unwrap();
    let node = install_runtime(dir.path());

    let d = ServiceDescriptor::from_config(&example_config(), dir.path()).unwrap();

    assert_eq!(d.name, "MyNodeApiService");
    assert_eq!(d.executable_path, dir.path().join("app.js"));
    assert_eq!(d.log_directory, dir.path().join("logs"));
    let argv = d.command_line();
    assert!(argv[0].eq_ignore_ascii_case(node.to_str().unwrap()), "{argv:?}");
    assert_eq!(argv[1..3], ["--harmony", "--max_old_space_size=4096"]);
    assert_eq!(d.restart_policy.max_retries, 3);
}

#[test]
fn default_interpreter_is_portable_and_resolves_to_an_absolute_path() {
    let cfg = ServiceConfig::default();
    assert_eq!(cfg.interpreter, "node");
    assert!(!Path::new(&cfg.interpreter).has_root());

    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.js"), "").unwrap();
    let node = install_runtime(dir.path());

    let d = ServiceDescriptor::from_config(&cfg, dir.path()).unwrap();
    let interpreter = d.interpreter.unwrap();
    assert!(interpreter.is_absolute());
    // PATHEXT lookups may report `node.EXE`
    assert!(interpreter.to_str().unwrap().eq_ignore_ascii_case(node.to_str().unwrap()));
    if cfg!(windows) {
        let ext = interpreter.extension().and_then(|e| e.to_str()).unwrap();
        assert!(ext.eq_ignore_ascii_case("exe"));
    }
}

#[test]
fn missing_target_program_fails_before_any_service_action() {
    let dir = tempfile::tempdir().unwrap();
    let err = ServiceDescriptor::from_config(&example_config(), dir.path()).unwrap_err();
    assert!(matches!(err, ServiceError::ConfigurationMissing(ref msg) if msg.contains("app.js")));
}
