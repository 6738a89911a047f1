// src/utils/services.rs

use anyhow::{Context, Result};
use tracing::error;
use widestring::U16CString;
use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::{ERROR_SERVICE_ALREADY_RUNNING, ERROR_SERVICE_NOT_ACTIVE},
        System::Services::{
            CloseServiceHandle, ControlService, OpenSCManagerW, OpenServiceW, StartServiceW,
            SC_HANDLE, SC_MANAGER_CONNECT, SERVICE_CONTROL_STOP, SERVICE_QUERY_STATUS,
            SERVICE_START, SERVICE_STATUS, SERVICE_STOP,
        },
    },
};

/// Closes a service control handle when dropped.
struct ServiceHandle(SC_HANDLE);

impl Drop for ServiceHandle {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = CloseServiceHandle(self.0) {
                error!("Failed to close service handle: {:?}", e);
            }
        }
    }
}

fn open_service(service_name: &str, access: u32) -> Result<(ServiceHandle, ServiceHandle)> {
    let scm = unsafe { OpenSCManagerW(PCWSTR::null(), PCWSTR::null(), SC_MANAGER_CONNECT) }
        .context("Failed to open Service Control Manager")?;
    let scm = ServiceHandle(scm);

    let wide_name = U16CString::from_str(service_name)
        .with_context(|| format!("Invalid service name '{}'", service_name))?;
    let service = unsafe { OpenServiceW(scm.0, PCWSTR::from_raw(wide_name.as_ptr()), access) }
        .with_context(|| format!("Failed to open service '{}'", service_name))?;

    Ok((ServiceHandle(service), scm))
}

/// Sends a stop control to a service.
///
/// A service that is already stopped is treated as success.
pub fn stop_service(service_name: &str) -> Result<()> {
    let (service, _scm) = open_service(service_name, SERVICE_STOP | SERVICE_QUERY_STATUS)?;

    let mut status = SERVICE_STATUS::default();
    match unsafe { ControlService(service.0, SERVICE_CONTROL_STOP, &mut status) } {
        Ok(_) => Ok(()),
        Err(e) if e.code() == ERROR_SERVICE_NOT_ACTIVE.to_hresult() => Ok(()),
        Err(e) => Err(anyhow::anyhow!(
            "Failed to stop service '{}': {:?}",
            service_name,
            e
        )),
    }
}

/// Starts a service.
///
/// A service that is already running is treated as success.
pub fn start_service(service_name: &str) -> Result<()> {
    let (service, _scm) = open_service(service_name, SERVICE_START | SERVICE_QUERY_STATUS)?;

    match unsafe { StartServiceW(service.0, None) } {
        Ok(_) => Ok(()),
        Err(e) if e.code() == ERROR_SERVICE_ALREADY_RUNNING.to_hresult() => Ok(()),
        Err(e) => Err(anyhow::anyhow!(
            "Failed to start service '{}': {:?}",
            service_name,
            e
        )),
    }
}
