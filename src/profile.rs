// src/profile.rs

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    errors::{TweakError, TweakResult},
    store::{write_json_atomically, ManagedStateStore},
    system::{Hive, ProcessInfo, SystemProbe},
    tweaks::power::{find_scheme, SCHEME_GUID},
    utils::unix_timestamp,
};

pub const STATE_SCHEMA_VERSION: u32 = 1;

const GAME_BAR: &str = r"Software\Microsoft\GameBar";
const AUTO_GAME_MODE: &str = "AutoGameModeEnabled";
const PERFORMANCE_SCHEMES: [&str; 2] = ["High performance", "Ultimate Performance"];
const RUN_KEY: &str = r"Software\Microsoft\Windows\CurrentVersion\Run";

fn default_schema_version() -> u32 {
    STATE_SCHEMA_VERSION
}

/// Snapshot taken before the gaming profile is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Unix seconds, UTC.
    pub saved_at_utc: u64,
    pub previous_power_scheme_guid: Option<String>,
    pub previous_auto_game_mode_enabled: Option<u32>,
}

/// Builds the header shared by every profile report.
fn header(title: &str) -> Vec<String> {
    vec![title.to_string(), "=".repeat(70)]
}

/// `%APPDATA%\Microsoft\Windows\Start Menu\Programs\Startup`.
fn default_startup_dir() -> PathBuf {
    env::var_os("APPDATA")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join("Microsoft")
        .join("Windows")
        .join("Start Menu")
        .join("Programs")
        .join("Startup")
}

/// The `limit` heaviest processes by `weight`, ties broken by name.
fn heaviest(
    mut processes: Vec<ProcessInfo>,
    limit: usize,
    weight: impl Fn(&ProcessInfo) -> u64,
) -> Vec<ProcessInfo> {
    processes.sort_by(|a, b| weight(b).cmp(&weight(a)).then_with(|| a.name.cmp(&b.name)));
    processes.truncate(limit);
    processes
}

fn memory_line(process: &ProcessInfo) -> String {
    format!(
        "- {} (PID {}) - {} MB",
        process.name,
        process.pid,
        process.working_set_mb()
    )
}

fn push_entries(lines: &mut Vec<String>, entries: impl IntoIterator<Item = String>) {
    let start = lines.len();
    lines.extend(entries.into_iter().map(|entry| format!("- {}", entry)));
    if lines.len() == start {
        lines.push("- None".into());
    }
}

/// Gaming profile snapshot/rollback and the maintenance actions.
pub struct ProfileManager {
    system: Arc<dyn SystemProbe>,
    store: Arc<ManagedStateStore>,
    rollback_path: PathBuf,
    temp_dir: PathBuf,
    startup_dir: PathBuf,
}

impl ProfileManager {
    pub fn new(
        system: Arc<dyn SystemProbe>,
        store: Arc<ManagedStateStore>,
        rollback_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            system,
            store,
            rollback_path: rollback_path.into(),
            temp_dir: env::temp_dir(),
            startup_dir: default_startup_dir(),
        }
    }

    /// Points the quick fixes and startup report at other folders.
    pub fn with_folders(
        mut self,
        temp_dir: impl Into<PathBuf>,
        startup_dir: impl Into<PathBuf>,
    ) -> Self {
        self.temp_dir = temp_dir.into();
        self.startup_dir = startup_dir.into();
        self
    }

    pub fn rollback_path(&self) -> &Path {
        &self.rollback_path
    }

    fn run_entries(&self, hive: Hive) -> TweakResult<Vec<(String, String)>> {
        Ok(self.system.list_values(hive, RUN_KEY)?)
    }

    /// First value of an inventory field, or "Unknown".
    fn inventory_value(&self, class: &str, field: &str) -> String {
        match self.system.query_inventory(class, field) {
            Ok(values) => values
                .into_iter()
                .next()
                .unwrap_or_else(|| "Unknown".into()),
            Err(e) => {
                debug!("Inventory {}.{} unavailable: {:#}", class, field, e);
                "Unknown".into()
            }
        }
    }

    fn active_scheme(&self) -> TweakResult<Option<String>> {
        let output = self.system.run("powercfg", &["/getactivescheme"])?;
        Ok(SCHEME_GUID
            .find(&output.stdout)
            .map(|m| m.as_str().to_string()))
    }

    fn game_mode(&self) -> TweakResult<Option<u32>> {
        Ok(self.system.read_dword(Hive::CurrentUser, GAME_BAR, AUTO_GAME_MODE)?)
    }

    /// Loads the rollback snapshot, `None` when it was never written.
    pub fn load_state(&self) -> TweakResult<Option<OptimizationState>> {
        let contents = match fs::read_to_string(&self.rollback_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(TweakError::io(&self.rollback_path, e)),
        };
        Ok(Some(serde_json::from_str(&contents)?))
    }

    /// Snapshots the power scheme and Game Mode, then switches to a
    /// performance scheme and turns Game Mode on.
    pub fn apply_gaming_profile(&self) -> TweakResult<String> {
        let mut lines = header("Applying Safe Gaming Profile");

        let state = OptimizationState {
            schema_version: STATE_SCHEMA_VERSION,
            saved_at_utc: unix_timestamp(),
            previous_power_scheme_guid: self.active_scheme()?,
            previous_auto_game_mode_enabled: self.game_mode()?,
        };
        write_json_atomically(&self.rollback_path, &state)?;
        info!("Saved rollback state to {}", self.rollback_path.display());
        lines.push(format!("Saved rollback state to: {}", self.rollback_path.display()));

        let list = self.system.run("powercfg", &["/list"])?;
        match find_scheme(&list.stdout, &PERFORMANCE_SCHEMES) {
            Some(guid) => {
                let output = self.system.run("powercfg", &["/setactive", &guid])?;
                lines.push(format!("Set power plan: {}", output));
            }
            None => lines.push("Set power plan: skipped (high performance plan not found)".into()),
        }

        self.system
            .write_dword(Hive::CurrentUser, GAME_BAR, AUTO_GAME_MODE, 1)?;
        lines.push(format!("Set Game Mode: {}=1", AUTO_GAME_MODE));

        lines.push(String::new());
        lines.push("Done. If a setting fails, run this app as Administrator.".into());
        Ok(lines.join("\n"))
    }

    /// Restores what [`apply_gaming_profile`](Self::apply_gaming_profile)
    /// captured. The snapshot file stays on disk.
    pub fn rollback(&self) -> TweakResult<String> {
        let mut lines = header("Rollback Safe Gaming Profile");

        let state = match self.load_state() {
            Ok(Some(state)) => state,
            Ok(None) => {
                lines.push("No rollback state found.".into());
                lines.push(format!("Expected: {}", self.rollback_path.display()));
                return Ok(lines.join("\n"));
            }
            Err(e) => {
                warn!("Rollback state unreadable: {}", e);
                lines.push(format!("Rollback state unreadable: {}", e));
                return Ok(lines.join("\n"));
            }
        };

        lines.push(format!("Loaded state from: {}", self.rollback_path.display()));
        lines.push(format!("State timestamp (UTC): {}", state.saved_at_utc));

        match state.previous_power_scheme_guid.as_deref() {
            Some(guid) if !guid.trim().is_empty() => {
                let output = self.system.run("powercfg", &["/setactive", guid])?;
                lines.push(format!("Restore power plan: {}", output));
            }
            _ => lines.push("Restore power plan: skipped (no saved value)".into()),
        }

        match state.previous_auto_game_mode_enabled {
            Some(value) => {
                self.system
                    .write_dword(Hive::CurrentUser, GAME_BAR, AUTO_GAME_MODE, value)?;
                lines.push(format!("Restore Game Mode: {}={}", AUTO_GAME_MODE, value));
            }
            None => lines.push("Restore Game Mode: skipped (no saved value)".into()),
        }

        debug!("Rollback finished");
        lines.push(String::new());
        lines.push("Rollback finished.".into());
        Ok(lines.join("\n"))
    }

    /// Read-only summary of the current system and app state.
    pub fn analyze(&self) -> TweakResult<String> {
        let mut lines = header("WinOpt Analysis");
        lines.push(format!("Time: {} (UTC)", unix_timestamp()));
        lines.push(format!("Running as admin: {}", self.system.is_elevated()));
        lines.push(String::new());

        lines.push(format!(
            "Active power scheme GUID: {}",
            self.active_scheme()?.unwrap_or_else(|| "Unknown".into())
        ));
        lines.push(format!(
            "Game Mode ({}): {}",
            AUTO_GAME_MODE,
            self.game_mode()?
                .map_or_else(|| "Not set".to_string(), |v| v.to_string())
        ));
        lines.push(String::new());

        lines.push("Managed tweaks:".into());
        match self.store.entries() {
            Ok(entries) if entries.is_empty() => lines.push("- None recorded".into()),
            Ok(entries) => {
                for (key, on) in entries {
                    lines.push(format!("- {}: {}", key, if on { "ON" } else { "OFF" }));
                }
            }
            Err(e) => lines.push(format!("- Unreadable: {}", e)),
        }
        lines.push(String::new());

        lines.push("Startup apps (quick count):".into());
        lines.push(format!("- HKCU Run: {}", self.run_entries(Hive::CurrentUser)?.len()));
        lines.push(format!("- HKLM Run: {}", self.run_entries(Hive::LocalMachine)?.len()));
        lines.push(format!(
            "- Startup folder items: {}",
            self.system.list_directory(&self.startup_dir)?.len()
        ));
        lines.push(String::new());

        lines.push("Top memory processes:".into());
        for process in heaviest(self.system.processes()?, 10, |p| p.working_set) {
            lines.push(memory_line(&process));
        }
        lines.push(String::new());

        lines.push("Saved rollback state:".into());
        lines.push(if self.rollback_path.exists() {
            format!("- Found: {}", self.rollback_path.display())
        } else {
            "- None found".into()
        });
        Ok(lines.join("\n"))
    }

    /// Flushes the DNS cache and empties the temp folder.
    pub fn quick_fixes(&self) -> TweakResult<String> {
        let mut lines = header("Quick Fixes");
        lines.push(format!("Timestamp: {} (UTC)", unix_timestamp()));
        lines.push(String::new());

        lines.push("DNS cache flush:".into());
        lines.push(match self.system.run("ipconfig", &["/flushdns"]) {
            Ok(output) => output.to_string(),
            Err(e) => format!("Failed: {:#}", e),
        });
        lines.push(String::new());

        lines.push("Temp cleanup:".into());
        lines.push(format!("- Path: {}", self.temp_dir.display()));
        match self.system.clean_directory(&self.temp_dir) {
            Ok(summary) => {
                lines.push(format!("- Deleted files: {}", summary.deleted_files));
                lines.push(format!("- Deleted folders: {}", summary.deleted_dirs));
                lines.push(format!("- Skipped (in use/protected): {}", summary.skipped));
            }
            Err(e) => {
                warn!("Temp cleanup failed: {:#}", e);
                lines.push(format!("- Failed: {:#}", e));
            }
        }
        lines.push(String::new());

        lines.push("Quick fixes finished.".into());
        Ok(lines.join("\n"))
    }

    /// Lists the Run keys and the Startup folder. Changes nothing.
    pub fn startup_report(&self) -> TweakResult<String> {
        let mut lines = header("Startup Optimizer");
        lines.push("Review high-impact startup apps and disable only non-essential entries.".into());
        lines.push(String::new());

        for (hive, label) in [
            (Hive::CurrentUser, "HKCU Run entries:"),
            (Hive::LocalMachine, "HKLM Run entries:"),
        ] {
            lines.push(label.into());
            let entries = self.run_entries(hive)?;
            push_entries(
                &mut lines,
                entries
                    .into_iter()
                    .map(|(name, value)| format!("{} => {}", name, value)),
            );
            lines.push(String::new());
        }

        lines.push(format!("Startup folder: {}", self.startup_dir.display()));
        push_entries(&mut lines, self.system.list_directory(&self.startup_dir)?);
        lines.push(String::new());

        lines.push("Tip: Use Task Manager > Startup Apps to disable entries safely.".into());
        Ok(lines.join("\n"))
    }

    /// Memory-heavy processes and general suggestions. Changes nothing.
    pub fn app_report(&self) -> TweakResult<String> {
        let mut lines = header("App Optimizer");
        lines.push("Suggestions are informational and non-destructive.".into());
        lines.push(String::new());

        let processes = self.system.processes()?;
        lines.push(format!("Running process count: {}", processes.len()));
        lines.push(String::new());

        lines.push("Top memory usage:".into());
        for process in heaviest(processes, 12, |p| p.working_set) {
            lines.push(memory_line(&process));
        }
        lines.push(String::new());

        lines.push("Quick actions:".into());
        lines.push("- Close browser tabs/windows you are not using.".into());
        lines.push("- Disable overlays you do not need (Discord, GeForce, Xbox Game Bar).".into());
        lines.push("- Keep antivirus and drivers enabled.".into());
        Ok(lines.join("\n"))
    }

    /// Machine facts plus the busiest processes by CPU time and memory.
    pub fn resource_report(&self) -> TweakResult<String> {
        let mut lines = header("System Resource Report");
        lines.push(format!("Timestamp: {} (UTC)", unix_timestamp()));
        lines.push(format!(
            "Machine: {}",
            self.inventory_value("Win32_ComputerSystem", "Name")
        ));
        lines.push(format!(
            "OS: {}",
            self.inventory_value("Win32_OperatingSystem", "Caption")
        ));
        let architecture = self.inventory_value("Win32_OperatingSystem", "OSArchitecture");
        lines.push(format!(
            "64-bit OS: {}",
            if architecture == "Unknown" {
                architecture
            } else {
                architecture.contains("64").to_string()
            }
        ));
        lines.push(format!(
            "Logical CPU cores: {}",
            self.inventory_value("Win32_Processor", "NumberOfLogicalProcessors")
        ));
        lines.push(String::new());

        let processes = self.system.processes()?;
        lines.push("Top CPU processes:".into());
        for process in heaviest(processes.clone(), 10, |p| p.cpu_millis) {
            lines.push(format!(
                "- {} (PID {}) - {:.1} s CPU",
                process.name,
                process.pid,
                process.cpu_millis as f64 / 1000.0
            ));
        }
        lines.push(String::new());

        lines.push("Top memory processes:".into());
        for process in heaviest(processes, 10, |p| p.working_set) {
            lines.push(memory_line(&process));
        }
        Ok(lines.join("\n"))
    }

    /// Creates a System Restore checkpoint. Requires elevation.
    pub fn create_restore_point(&self) -> TweakResult<String> {
        let elevated = self.system.is_elevated();
        let mut lines = header("System Restore");
        lines.push(format!("Time: {} (UTC)", unix_timestamp()));
        lines.push(format!("Running as admin: {}", elevated));
        lines.push(String::new());

        if !elevated {
            lines.push("Restore point requires Administrator privileges.".into());
            lines.push("Run this app as Administrator and retry.".into());
            return Ok(lines.join("\n"));
        }

        let command = format!(
            "Checkpoint-Computer -Description 'WinOpt-{}' -RestorePointType 'MODIFY_SETTINGS'",
            unix_timestamp()
        );
        let output = self.system.run(
            "powershell.exe",
            &["-NoProfile", "-ExecutionPolicy", "Bypass", "-Command", &command],
        )?;
        lines.push("Checkpoint-Computer result:".into());
        lines.push(output.to_string());
        lines.push(String::new());
        lines.push(
            "If restore points are disabled, enable System Protection for your drive and retry."
                .into(),
        );
        Ok(lines.join("\n"))
    }
}
