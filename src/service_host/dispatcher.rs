//! `windows-service` glue: dispatcher entry point, control handler and status reports.

use std::ffi::OsString;
use std::sync::OnceLock;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use log::{error, info, warn};
use windows_service::service::{
    ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState, ServiceStatus,
    ServiceType,
};
use windows_service::service_control_handler::{
    self, ServiceControlHandlerResult, ServiceStatusHandle,
};
use windows_service::{define_windows_service, service_dispatcher};

use super::{HostCommand, service_exit_code};
use crate::error::ServiceError;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const STOP_WAIT_HINT: Duration = Duration::from_secs(10);

/// `service_main` receives no user data, so the command is parked here first
static HOSTED: OnceLock<HostCommand> = OnceLock::new();

define_windows_service!(ffi_service_main, service_main);

pub(super) fn run(cmd: HostCommand) -> Result<(), ServiceError> {
    let name = cmd.name.clone();
    HOSTED
        .set(cmd)
        .map_err(|_| ServiceError::native("service host", "already hosting a service"))?;
    service_dispatcher::start(&name, ffi_service_main)
        .map_err(|e| ServiceError::native("StartServiceCtrlDispatcher", e.to_string()))
}

fn service_main(_arguments: Vec<OsString>) {
    let Some(cmd) = HOSTED.get() else {
        return;
    };
    if let Err(e) = host(cmd) {
        error!("{}: {e}", cmd.name);
    }
}

fn host(cmd: &HostCommand) -> Result<(), ServiceError> {
    let (stop_tx, stop_rx) = mpsc::channel();
    let event_handler = move |control_event: ServiceControl| match control_event {
        ServiceControl::Stop | ServiceControl::Shutdown => {
            let _ = stop_tx.send(());
            ServiceControlHandlerResult::NoError
        }
        ServiceControl::Interrogate => ServiceControlHandlerResult::NoError,
        _ => ServiceControlHandlerResult::NotImplemented,
    };
    let status = service_control_handler::register(&cmd.name, event_handler)
        .map_err(|e| ServiceError::native("RegisterServiceCtrlHandlerEx", e.to_string()))?;

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            report(&status, ServiceState::Stopped, ServiceExitCode::ServiceSpecific(1));
            return Err(e);
        }
    };
    report(&status, ServiceState::Running, ServiceExitCode::Win32(0));
    info!("{}: hosting pid {}", cmd.name, child.id());

    let exit_code = loop {
        match stop_rx.recv_timeout(POLL_INTERVAL) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                report(&status, ServiceState::StopPending, ServiceExitCode::Win32(0));
                if let Err(e) = child.kill() {
                    warn!("{}: failed to stop pid {}: {e}", cmd.name, child.id());
                }
                let _ = child.wait();
                info!("{}: stopped on request", cmd.name);
                break ServiceExitCode::Win32(0);
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        match child.try_wait() {
            Ok(Some(exit)) => {
                let code = service_exit_code(exit);
                if code == 0 {
                    info!("{}: program exited", cmd.name);
                    break ServiceExitCode::Win32(0);
                }
                warn!("{}: program exited with {code}", cmd.name);
                break ServiceExitCode::ServiceSpecific(code);
            }
            Ok(None) => {}
            Err(e) => {
                error!("{}: lost track of pid {}: {e}", cmd.name, child.id());
                let _ = child.kill();
                break ServiceExitCode::ServiceSpecific(1);
            }
        }
    };

    report(&status, ServiceState::Stopped, exit_code);
    Ok(())
}

fn report(handle: &ServiceStatusHandle, state: ServiceState, exit_code: ServiceExitCode) {
    let controls_accepted = if state == ServiceState::Running {
        ServiceControlAccept::STOP | ServiceControlAccept::SHUTDOWN
    } else {
        ServiceControlAccept::empty()
    };
    let wait_hint = if state == ServiceState::StopPending {
        STOP_WAIT_HINT
    } else {
        Duration::default()
    };
    let status = ServiceStatus {
        service_type: ServiceType::OWN_PROCESS,
        current_state: state,
        controls_accepted,
        exit_code,
        checkpoint: 0,
        wait_hint,
        process_id: None,
    };
    if let Err(e) = handle.set_service_status(status) {
        warn!("failed to report {state:?} to the SCM: {e}");
    }
}
