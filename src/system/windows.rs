// src/system/windows.rs

use std::path::Path;

use anyhow::{Context, Result};
use sysinfo::{ProcessesToUpdate, System};

use super::{CleanupSummary, CommandOutput, Hive, ProcessInfo, StartMode, SystemProbe};
use crate::utils::{
    command::{self, run_powershell},
    files,
    registry::{list_registry_values, read_registry_value, write_registry_value, RegistryValue},
    services,
    windows::{is_elevated, set_timer_resolution},
};

const SERVICES_ROOT: &str = r"SYSTEM\CurrentControlSet\Services";

/// [`SystemProbe`] backed by the live Windows registry, Service Control
/// Manager and process launcher.
#[derive(Debug, Default)]
pub struct WindowsSystem;

impl WindowsSystem {
    pub fn new() -> Self {
        Self
    }
}

fn service_key(service: &str) -> String {
    format!("{}\\{}", SERVICES_ROOT, service)
}

impl SystemProbe for WindowsSystem {
    fn read_dword(&self, hive: Hive, path: &str, name: &str) -> Result<Option<u32>> {
        match read_registry_value(hive, path, name)? {
            Some(RegistryValue::Dword(value)) => Ok(Some(value)),
            Some(other) => anyhow::bail!(
                "Expected DWORD for '{}\\{}\\{}', found {}",
                hive,
                path,
                name,
                other
            ),
            None => Ok(None),
        }
    }

    fn read_string(&self, hive: Hive, path: &str, name: &str) -> Result<Option<String>> {
        Ok(read_registry_value(hive, path, name)?.map(|value| match value {
            RegistryValue::String(s) => s,
            RegistryValue::Dword(d) => d.to_string(),
        }))
    }

    fn write_dword(&self, hive: Hive, path: &str, name: &str, value: u32) -> Result<()> {
        write_registry_value(hive, path, name, &RegistryValue::Dword(value))
    }

    fn write_string(&self, hive: Hive, path: &str, name: &str, value: &str) -> Result<()> {
        write_registry_value(hive, path, name, &RegistryValue::String(value.to_string()))
    }

    fn service_start_mode(&self, service: &str) -> Result<Option<StartMode>> {
        let code = self.read_dword(Hive::LocalMachine, &service_key(service), "Start")?;
        Ok(code.and_then(StartMode::from_code))
    }

    fn set_service_start_mode(&self, service: &str, mode: StartMode) -> Result<()> {
        if self.service_start_mode(service)?.is_none() {
            anyhow::bail!("Service '{}' is not installed", service);
        }
        write_registry_value(
            Hive::LocalMachine,
            &service_key(service),
            "Start",
            &RegistryValue::Dword(mode.code()),
        )
        .with_context(|| format!("Failed to set start mode of '{}' to {}", service, mode))
    }

    fn stop_service(&self, service: &str) -> Result<()> {
        services::stop_service(service)
    }

    fn start_service(&self, service: &str) -> Result<()> {
        services::start_service(service)
    }

    fn run(&self, exe: &str, args: &[&str]) -> Result<CommandOutput> {
        command::run_process(exe, args)
    }

    fn spawn(&self, exe: &str, args: &[&str]) -> Result<()> {
        command::spawn_process(exe, args)
    }

    fn program_exists(&self, path: &str) -> bool {
        command::program_exists(path)
    }

    fn query_inventory(&self, class: &str, field: &str) -> Result<Vec<String>> {
        let script = format!(
            "Get-CimInstance -ClassName {} | Select-Object -ExpandProperty {}",
            class, field
        );
        let output = run_powershell(&script)?;
        if output.exit_code != 0 {
            anyhow::bail!("Inventory query for {}.{} failed: {}", class, field, output);
        }
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn list_values(&self, hive: Hive, path: &str) -> Result<Vec<(String, String)>> {
        list_registry_values(hive, path)
    }

    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::All, true);
        Ok(sys
            .processes()
            .iter()
            .map(|(pid, process)| ProcessInfo {
                name: process
                    .name()
                    .to_string_lossy()
                    .trim_end_matches(".exe")
                    .to_string(),
                pid: pid.as_u32(),
                working_set: process.memory(),
                cpu_millis: process.accumulated_cpu_time(),
            })
            .collect())
    }

    fn list_directory(&self, dir: &Path) -> Result<Vec<String>> {
        files::list_directory(dir)
    }

    fn clean_directory(&self, dir: &Path) -> Result<CleanupSummary> {
        files::clean_directory(dir)
    }

    fn is_elevated(&self) -> bool {
        is_elevated()
    }

    fn set_timer_resolution(&self, enabled: bool) -> Result<()> {
        set_timer_resolution(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processes_include_this_one() {
        let own = std::process::id();
        let processes = WindowsSystem::new().processes().unwrap();
        let me = processes.iter().find(|p| p.pid == own).unwrap();
        assert!(!me.name.is_empty());
        assert!(me.working_set > 0);
    }

    #[test]
    fn test_listing_a_missing_run_key_is_empty() {
        let values = WindowsSystem::new()
            .list_values(Hive::CurrentUser, r"Software\WinOptSystemTest\Absent")
            .unwrap();
        assert!(values.is_empty());
    }
}
