//! Native Service Control Manager access through the Windows API.

use std::ffi::c_void;
use std::mem;
use std::thread;
use std::time::{Duration, Instant};

use windows::Win32::Foundation::{
    ERROR_SERVICE_ALREADY_RUNNING, ERROR_SERVICE_DOES_NOT_EXIST, ERROR_SERVICE_NOT_ACTIVE,
};
use windows::Win32::System::Registry::{
    HKEY, HKEY_LOCAL_MACHINE, KEY_WRITE, REG_MULTI_SZ, REG_OPTION_NON_VOLATILE, RegCloseKey,
    RegCreateKeyExW, RegSetValueExW,
};
use windows::Win32::System::Services::{
    ChangeServiceConfig2W, CloseServiceHandle, ControlService, CreateServiceW, DeleteService,
    OpenSCManagerW, OpenServiceW, QueryServiceStatus, SC_ACTION, SC_ACTION_RESTART, SC_HANDLE,
    SC_MANAGER_ALL_ACCESS, SC_MANAGER_CONNECT, SERVICE_ALL_ACCESS, SERVICE_AUTO_START,
    SERVICE_CONFIG_DESCRIPTION, SERVICE_CONFIG_DESCRIPTION_W, SERVICE_CONFIG_FAILURE_ACTIONS,
    SERVICE_CONFIG_FAILURE_ACTIONS_FLAG, SERVICE_CONTROL_STOP, SERVICE_ERROR_NORMAL,
    SERVICE_FAILURE_ACTIONS_FLAG, SERVICE_FAILURE_ACTIONSW, SERVICE_QUERY_STATUS, SERVICE_STATUS,
    SERVICE_STOPPED, SERVICE_WIN32_OWN_PROCESS,
};
use windows::core::{PCWSTR, PWSTR};

use super::{ServiceControlManager, WindowsServiceSpec};
use crate::error::ServiceError;

const TOOL: &str = "Service Control Manager";
const STOP_TIMEOUT: Duration = Duration::from_secs(30);

/// Windows API backed SCM client
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeScm;

/// RAII wrapper for SC_HANDLE (manager or service handle)
struct ScHandle(SC_HANDLE);

impl ScHandle {
    fn handle(&self) -> SC_HANDLE {
        self.0
    }
}

impl Drop for ScHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            unsafe {
                let _ = CloseServiceHandle(self.0);
            }
        }
    }
}

/// RAII wrapper for a registry key
struct RegistryHandle(HKEY);

impl Drop for RegistryHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            unsafe {
                let _ = RegCloseKey(self.0);
            }
        }
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(Some(0)).collect()
}

fn scm_error(action: &str, e: windows::core::Error) -> ServiceError {
    ServiceError::native(TOOL, format!("{action}: {e}"))
}

fn open_manager(access: u32) -> Result<ScHandle, ServiceError> {
    let handle = unsafe { OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), access) }
        .map_err(|e| scm_error("Failed to open Service Control Manager", e))?;
    Ok(ScHandle(handle))
}

fn open_service(manager: &ScHandle, name: &str, access: u32) -> Result<ScHandle, windows::core::Error> {
    let name = wide(name);
    let handle = unsafe { OpenServiceW(manager.handle(), PCWSTR(name.as_ptr()), access) }?;
    Ok(ScHandle(handle))
}

fn query_state(service: &ScHandle) -> Result<SERVICE_STATUS, ServiceError> {
    let mut status: SERVICE_STATUS = unsafe { mem::zeroed() };
    unsafe { QueryServiceStatus(service.handle(), &mut status) }
        .map_err(|e| scm_error("Failed to query service status", e))?;
    Ok(status)
}

fn set_description(service: &ScHandle, description: &str) -> Result<(), ServiceError> {
    let mut desc = wide(description);
    let info = SERVICE_CONFIG_DESCRIPTION_W {
        lpDescription: PWSTR(desc.as_mut_ptr()),
    };
    unsafe {
        ChangeServiceConfig2W(
            service.handle(),
            SERVICE_CONFIG_DESCRIPTION,
            Some(&info as *const _ as *const c_void),
        )
    }
    .map_err(|e| scm_error("Failed to set service description", e))
}

fn set_failure_actions(service: &ScHandle, spec: &WindowsServiceSpec) -> Result<(), ServiceError> {
    if spec.restart_delays_ms.is_empty() {
        return Ok(());
    }

    let mut actions: Vec<SC_ACTION> = spec
        .restart_delays_ms
        .iter()
        .map(|&delay| SC_ACTION {
            Type: SC_ACTION_RESTART,
            Delay: delay,
        })
        .collect();

    let failure_actions = SERVICE_FAILURE_ACTIONSW {
        dwResetPeriod: spec.reset_period_secs,
        lpRebootMsg: PWSTR::null(),
        lpCommand: PWSTR::null(),
        cActions: actions.len() as u32,
        lpsaActions: actions.as_mut_ptr(),
    };

    unsafe {
        ChangeServiceConfig2W(
            service.handle(),
            SERVICE_CONFIG_FAILURE_ACTIONS,
            Some(&failure_actions as *const _ as *const c_void),
        )
    }
    .map_err(|e| scm_error("Failed to set failure actions", e))?;

    // The host reports STOPPED with a non-zero exit code when the program
    // fails; without this flag the SCM only restarts on a host crash.
    let flag = SERVICE_FAILURE_ACTIONS_FLAG {
        fFailureActionsOnNonCrashFailures: true.into(),
    };
    unsafe {
        ChangeServiceConfig2W(
            service.handle(),
            SERVICE_CONFIG_FAILURE_ACTIONS_FLAG,
            Some(&flag as *const _ as *const c_void),
        )
    }
    .map_err(|e| scm_error("Failed to enable failure actions on non-crash failures", e))
}

/// Store `KEY=value` pairs in the service key's `Environment` multi-string
fn set_environment(name: &str, environment: &[String]) -> Result<(), ServiceError> {
    if environment.is_empty() {
        return Ok(());
    }

    let key_path = wide(&format!("SYSTEM\\CurrentControlSet\\Services\\{name}"));
    let mut key = HKEY::default();
    unsafe {
        RegCreateKeyExW(
            HKEY_LOCAL_MACHINE,
            PCWSTR(key_path.as_ptr()),
            None,
            PCWSTR::null(),
            REG_OPTION_NON_VOLATILE,
            KEY_WRITE,
            None,
            &mut key,
            None,
        )
    }
    .ok()
    .map_err(|e| scm_error("Failed to open service registry key", e))?;
    let key = RegistryHandle(key);

    // REG_MULTI_SZ: NUL-separated strings terminated by an extra NUL
    let mut data: Vec<u16> = Vec::new();
    for entry in environment {
        data.extend(entry.encode_utf16());
        data.push(0);
    }
    data.push(0);
    let bytes: Vec<u8> = data.iter().flat_map(|w| w.to_le_bytes()).collect();

    let value_name = wide("Environment");
    unsafe {
        RegSetValueExW(
            key.0,
            PCWSTR(value_name.as_ptr()),
            None,
            REG_MULTI_SZ,
            Some(&bytes),
        )
    }
    .ok()
    .map_err(|e| scm_error("Failed to write service environment", e))
}

impl ServiceControlManager for NativeScm {
    fn exists(&self, name: &str) -> Result<bool, ServiceError> {
        let manager = open_manager(SC_MANAGER_CONNECT)?;
        match open_service(&manager, name, SERVICE_QUERY_STATUS) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ERROR_SERVICE_DOES_NOT_EXIST.to_hresult() => Ok(false),
            Err(e) => Err(scm_error("Failed to open service", e)),
        }
    }

    fn create(&self, spec: &WindowsServiceSpec) -> Result<(), ServiceError> {
        let manager = open_manager(SC_MANAGER_ALL_ACCESS)?;

        let name = wide(&spec.name);
        let display_name = wide(&spec.display_name);
        let binary_path = wide(&spec.command_line);

        let handle = unsafe {
            CreateServiceW(
                manager.handle(),
                PCWSTR(name.as_ptr()),
                PCWSTR(display_name.as_ptr()),
                SERVICE_ALL_ACCESS,
                SERVICE_WIN32_OWN_PROCESS,
                SERVICE_AUTO_START,
                SERVICE_ERROR_NORMAL,
                PCWSTR(binary_path.as_ptr()),
                PCWSTR::null(),
                None,
                PCWSTR::null(),
                PCWSTR::null(),
                PCWSTR::null(),
            )
        }
        .map_err(|e| scm_error("Failed to create service", e))?;
        let service = ScHandle(handle);

        set_description(&service, &spec.description)?;
        set_failure_actions(&service, spec)?;
        set_environment(&spec.name, &spec.environment)
    }

    fn delete(&self, name: &str) -> Result<(), ServiceError> {
        let manager = open_manager(SC_MANAGER_ALL_ACCESS)?;
        let service = open_service(&manager, name, SERVICE_ALL_ACCESS)
            .map_err(|e| scm_error("Failed to open service for deletion", e))?;
        unsafe { DeleteService(service.handle()) }
            .map_err(|e| scm_error("Failed to delete service", e))
    }

    fn start(&self, name: &str) -> Result<(), ServiceError> {
        let manager = open_manager(SC_MANAGER_CONNECT)?;
        let service = open_service(&manager, name, SERVICE_ALL_ACCESS)
            .map_err(|e| scm_error("Failed to open service for start", e))?;
        match unsafe { windows::Win32::System::Services::StartServiceW(service.handle(), None) } {
            Ok(()) => Ok(()),
            Err(e) if e.code() == ERROR_SERVICE_ALREADY_RUNNING.to_hresult() => Ok(()),
            Err(e) => Err(scm_error("Failed to start service", e)),
        }
    }

    fn stop(&self, name: &str) -> Result<(), ServiceError> {
        let manager = open_manager(SC_MANAGER_CONNECT)?;
        let service = open_service(&manager, name, SERVICE_ALL_ACCESS)
            .map_err(|e| scm_error("Failed to open service for stop", e))?;

        let mut status: SERVICE_STATUS = unsafe { mem::zeroed() };
        match unsafe { ControlService(service.handle(), SERVICE_CONTROL_STOP, &mut status) } {
            Ok(()) => {}
            Err(e) if e.code() == ERROR_SERVICE_NOT_ACTIVE.to_hresult() => return Ok(()),
            Err(e) => return Err(scm_error("Failed to stop service", e)),
        }

        let deadline = Instant::now() + STOP_TIMEOUT;
        while query_state(&service)?.dwCurrentState != SERVICE_STOPPED {
            if Instant::now() >= deadline {
                return Err(ServiceError::native(
                    TOOL,
                    format!("{name} did not stop within {}s", STOP_TIMEOUT.as_secs()),
                ));
            }
            thread::sleep(Duration::from_millis(250));
        }
        Ok(())
    }
}
