// src/system/mod.rs

pub mod memory;
#[cfg(windows)]
pub mod windows;

use std::{fmt, path::Path};

use anyhow::Result;
use strum_macros::{Display, EnumIter, EnumString};

pub use memory::MemorySystem;
#[cfg(windows)]
pub use windows::WindowsSystem;

/// Registry hives the engine reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum Hive {
    #[strum(serialize = "HKCU")]
    CurrentUser,
    #[strum(serialize = "HKLM")]
    LocalMachine,
}

/// Service start types as stored in `HKLM\SYSTEM\CurrentControlSet\Services\<name>\Start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum StartMode {
    Boot,
    System,
    Auto,
    Demand,
    Disabled,
}

impl StartMode {
    pub fn code(self) -> u32 {
        match self {
            StartMode::Boot => 0,
            StartMode::System => 1,
            StartMode::Auto => 2,
            StartMode::Demand => 3,
            StartMode::Disabled => 4,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(StartMode::Boot),
            1 => Some(StartMode::System),
            2 => Some(StartMode::Auto),
            3 => Some(StartMode::Demand),
            4 => Some(StartMode::Disabled),
            _ => None,
        }
    }
}

/// Captured result of an external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// stdout and stderr joined and trimmed.
    pub fn combined(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr).trim().to_string()
    }
}

/// One-line rendering used in reports: `OK` for a quiet success, the output
/// text otherwise, prefixed with the exit code on failure.
impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let combined = self.combined();
        if self.exit_code != 0 {
            write!(f, "ExitCode {}: {}", self.exit_code, combined)
        } else if combined.is_empty() {
            write!(f, "OK")
        } else {
            write!(f, "{}", combined)
        }
    }
}

/// One running process as seen by the maintenance reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub name: String,
    pub pid: u32,
    /// Working set in bytes.
    pub working_set: u64,
    /// Total CPU time consumed, in milliseconds.
    pub cpu_millis: u64,
}

impl ProcessInfo {
    pub fn working_set_mb(&self) -> u64 {
        self.working_set / (1024 * 1024)
    }
}

/// What a directory cleanup removed and what it had to leave behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub deleted_files: usize,
    pub deleted_dirs: usize,
    /// Entries that were in use or protected.
    pub skipped: usize,
}

/// Primitive OS operations consumed by the tweak engine.
///
/// Every call is synchronous and fallible. Reads return `Ok(None)` when the
/// value or service does not exist. `run` only fails when the process cannot
/// be started; a non-zero exit code is a normal result.
pub trait SystemProbe: Send + Sync {
    fn read_dword(&self, hive: Hive, path: &str, name: &str) -> Result<Option<u32>>;

    fn read_string(&self, hive: Hive, path: &str, name: &str) -> Result<Option<String>>;

    fn write_dword(&self, hive: Hive, path: &str, name: &str, value: u32) -> Result<()>;

    fn write_string(&self, hive: Hive, path: &str, name: &str, value: &str) -> Result<()>;

    fn service_start_mode(&self, service: &str) -> Result<Option<StartMode>>;

    fn set_service_start_mode(&self, service: &str, mode: StartMode) -> Result<()>;

    /// Stops a service. Stopping a service that is not running succeeds.
    fn stop_service(&self, service: &str) -> Result<()>;

    /// Starts a service. Starting a service that is already running succeeds.
    fn start_service(&self, service: &str) -> Result<()>;

    fn run(&self, exe: &str, args: &[&str]) -> Result<CommandOutput>;

    /// Starts `exe` detached and returns without waiting for it to exit.
    fn spawn(&self, exe: &str, args: &[&str]) -> Result<()>;

    /// Whether an executable exists at `path` (environment variables expanded).
    fn program_exists(&self, path: &str) -> bool;

    /// Reads `field` from every instance of an inventory class
    /// (e.g. `Win32_VideoController`, `PNPDeviceID`).
    fn query_inventory(&self, class: &str, field: &str) -> Result<Vec<String>>;

    /// Every value directly under a key as `(name, data)`, data rendered as
    /// text. A missing key has no values.
    fn list_values(&self, hive: Hive, path: &str) -> Result<Vec<(String, String)>>;

    fn processes(&self) -> Result<Vec<ProcessInfo>>;

    /// Entry names directly inside `dir`; empty when it does not exist.
    fn list_directory(&self, dir: &Path) -> Result<Vec<String>>;

    /// Deletes every top-level file and folder inside `dir`, skipping
    /// entries that cannot be removed.
    fn clean_directory(&self, dir: &Path) -> Result<CleanupSummary>;

    fn is_elevated(&self) -> bool;

    /// Requests (or releases) a 0.5 ms system timer resolution for the
    /// lifetime of this process.
    fn set_timer_resolution(&self, enabled: bool) -> Result<()>;
}

/// The probe for the current host: the real OS on Windows, an in-memory
/// preview everywhere else.
pub fn host_system() -> std::sync::Arc<dyn SystemProbe> {
    #[cfg(windows)]
    {
        std::sync::Arc::new(WindowsSystem::new())
    }

    #[cfg(not(windows))]
    {
        tracing::warn!("Not running on Windows; using in-memory preview system.");
        std::sync::Arc::new(MemorySystem::preview())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_start_mode_codes_round_trip() {
        for mode in StartMode::iter() {
            assert_eq!(StartMode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(StartMode::from_code(7), None);
    }

    #[test]
    fn test_start_mode_parses_sc_names() {
        assert_eq!(StartMode::from_str("disabled").unwrap(), StartMode::Disabled);
        assert_eq!(StartMode::Demand.to_string(), "demand");
    }

    #[test]
    fn test_command_output_rendering() {
        assert_eq!(CommandOutput::success("").to_string(), "OK");
        assert_eq!(CommandOutput::success("  done \n").to_string(), "done");
        assert_eq!(
            CommandOutput::failure(5, "Access is denied.").to_string(),
            "ExitCode 5: Access is denied."
        );
    }

    #[test]
    fn test_working_set_in_megabytes() {
        let process = ProcessInfo {
            name: "game".into(),
            pid: 10,
            working_set: 524_288_000 + 1024,
            cpu_millis: 0,
        };
        assert_eq!(process.working_set_mb(), 500);
    }
}
