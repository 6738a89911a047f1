// src/system/memory.rs

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
};

use anyhow::Result;

use super::{CleanupSummary, CommandOutput, Hive, ProcessInfo, StartMode, SystemProbe};

/// A mutating call observed by [`MemorySystem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemCall {
    WriteDword {
        hive: Hive,
        path: String,
        name: String,
        value: u32,
    },
    WriteString {
        hive: Hive,
        path: String,
        name: String,
        value: String,
    },
    SetStartMode {
        service: String,
        mode: StartMode,
    },
    StopService(String),
    StartService(String),
    Run {
        exe: String,
        args: Vec<String>,
    },
    /// A detached launch nobody waits on.
    Spawn {
        exe: String,
        args: Vec<String>,
    },
    CleanDirectory(PathBuf),
    TimerResolution(bool),
}

impl SystemCall {
    /// Name of the service a stop/disable-style call targets, if any.
    pub fn service_target(&self) -> Option<&str> {
        match self {
            SystemCall::SetStartMode { service, .. }
            | SystemCall::StopService(service)
            | SystemCall::StartService(service) => Some(service),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum StoredValue {
    Dword(u32),
    String(String),
}

#[derive(Debug, Clone)]
struct ServiceEntry {
    mode: StartMode,
    running: bool,
}

#[derive(Debug, Clone)]
struct DirectoryEntry {
    name: String,
    folder: bool,
    locked: bool,
}

#[derive(Default)]
struct MemoryState {
    values: HashMap<(Hive, String, String), StoredValue>,
    /// Value names as first written, keyed like `values`.
    names: HashMap<(Hive, String, String), String>,
    processes: Vec<ProcessInfo>,
    directories: HashMap<PathBuf, Vec<DirectoryEntry>>,
    services: HashMap<String, ServiceEntry>,
    programs: HashSet<String>,
    inventory: HashMap<(String, String), Vec<String>>,
    journal: Vec<SystemCall>,
    timer_resolution: bool,
}

type CommandHandler = Box<dyn Fn(&str, &[&str]) -> Option<CommandOutput> + Send + Sync>;

/// In-memory [`SystemProbe`].
///
/// Registry paths, value names and service names are matched
/// case-insensitively, like the real registry. Every mutation is appended to a
/// journal so callers can assert on exactly what would have been changed.
pub struct MemorySystem {
    state: Mutex<MemoryState>,
    handlers: Mutex<Vec<CommandHandler>>,
    elevated: AtomicBool,
    reads: AtomicUsize,
}

impl Default for MemorySystem {
    fn default() -> Self {
        Self::new()
    }
}

fn value_key(hive: Hive, path: &str, name: &str) -> (Hive, String, String) {
    (hive, path.to_lowercase(), name.to_lowercase())
}

fn render_command(exe: &str, args: &[String]) -> String {
    std::iter::once(exe.to_string())
        .chain(args.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}

impl MemoryState {
    fn store(&mut self, hive: Hive, path: &str, name: &str, value: StoredValue) {
        let key = value_key(hive, path, name);
        self.names.entry(key.clone()).or_insert_with(|| name.to_string());
        self.values.insert(key, value);
    }
}

impl MemorySystem {
    /// An empty, elevated system.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            handlers: Mutex::new(Vec::new()),
            elevated: AtomicBool::new(true),
            reads: AtomicUsize::new(0),
        }
    }

    /// A system seeded with the services and power tooling a stock Windows
    /// install exposes, used when the app runs off Windows.
    pub fn preview() -> Self {
        let system = Self::new();
        for (service, mode) in [
            ("SensorService", StartMode::Demand),
            ("lfsvc", StartMode::Demand),
            ("WebClient", StartMode::Demand),
            ("wuauserv", StartMode::Demand),
            ("UsoSvc", StartMode::Auto),
            ("WaaSMedicSvc", StartMode::Demand),
            ("SysMain", StartMode::Auto),
            ("WSearch", StartMode::Auto),
            ("Spooler", StartMode::Auto),
            ("XblAuthManager", StartMode::Demand),
            ("XblGameSave", StartMode::Demand),
            ("XboxNetApiSvc", StartMode::Demand),
            ("XboxGipSvc", StartMode::Demand),
            ("Fax", StartMode::Demand),
            ("MapsBroker", StartMode::Auto),
            ("PhoneSvc", StartMode::Demand),
            ("WerSvc", StartMode::Demand),
            ("WpnService", StartMode::Auto),
        ] {
            system.install_service(service, mode, mode == StartMode::Auto);
        }
        system.on_command(|exe, args| match (exe, args) {
            ("powercfg", ["/getactivescheme"]) => Some(CommandOutput::success(
                "Power Scheme GUID: 381b4222-f694-41f0-9685-ff5bb260df2e  (Balanced)",
            )),
            ("powercfg", ["/list"]) => Some(CommandOutput::success(
                "Power Scheme GUID: 381b4222-f694-41f0-9685-ff5bb260df2e  (Balanced) *\n\
                 Power Scheme GUID: 8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c  (High performance)",
            )),
            _ => None,
        });
        system.set_processes(vec![
            ProcessInfo {
                name: "explorer".into(),
                pid: 4312,
                working_set: 182 * 1024 * 1024,
                cpu_millis: 41_250,
            },
            ProcessInfo {
                name: "svchost".into(),
                pid: 1188,
                working_set: 64 * 1024 * 1024,
                cpu_millis: 9_870,
            },
            ProcessInfo {
                name: "winopt".into(),
                pid: 7720,
                working_set: 96 * 1024 * 1024,
                cpu_millis: 2_310,
            },
        ]);
        system
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_elevated(&self, elevated: bool) {
        self.elevated.store(elevated, Ordering::SeqCst);
    }

    /// Sets a DWORD without journaling it (an out-of-band change).
    pub fn set_dword(&self, hive: Hive, path: &str, name: &str, value: u32) {
        self.state()
            .store(hive, path, name, StoredValue::Dword(value));
    }

    /// Sets a string value without journaling it.
    pub fn set_string(&self, hive: Hive, path: &str, name: &str, value: &str) {
        self.state()
            .store(hive, path, name, StoredValue::String(value.to_string()));
    }

    pub fn remove_value(&self, hive: Hive, path: &str, name: &str) {
        let key = value_key(hive, path, name);
        let mut state = self.state();
        state.values.remove(&key);
        state.names.remove(&key);
    }

    pub fn dword(&self, hive: Hive, path: &str, name: &str) -> Option<u32> {
        match self.state().values.get(&value_key(hive, path, name)) {
            Some(StoredValue::Dword(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn string(&self, hive: Hive, path: &str, name: &str) -> Option<String> {
        match self.state().values.get(&value_key(hive, path, name)) {
            Some(StoredValue::String(value)) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn install_service(&self, service: &str, mode: StartMode, running: bool) {
        self.state()
            .services
            .insert(service.to_lowercase(), ServiceEntry { mode, running });
    }

    pub fn start_mode(&self, service: &str) -> Option<StartMode> {
        self.state()
            .services
            .get(&service.to_lowercase())
            .map(|entry| entry.mode)
    }

    pub fn is_running(&self, service: &str) -> bool {
        self.state()
            .services
            .get(&service.to_lowercase())
            .is_some_and(|entry| entry.running)
    }

    pub fn install_program(&self, path: &str) {
        self.state().programs.insert(path.to_lowercase());
    }

    pub fn set_inventory(&self, class: &str, field: &str, values: &[&str]) {
        self.state().inventory.insert(
            (class.to_lowercase(), field.to_lowercase()),
            values.iter().map(|v| v.to_string()).collect(),
        );
    }

    pub fn set_processes(&self, processes: Vec<ProcessInfo>) {
        self.state().processes = processes;
    }

    /// Adds a file to a fake directory. Locked entries survive a cleanup.
    pub fn add_file(&self, dir: &Path, name: &str, locked: bool) {
        self.add_entry(dir, name, false, locked);
    }

    pub fn add_folder(&self, dir: &Path, name: &str, locked: bool) {
        self.add_entry(dir, name, true, locked);
    }

    fn add_entry(&self, dir: &Path, name: &str, folder: bool, locked: bool) {
        self.state()
            .directories
            .entry(dir.to_path_buf())
            .or_default()
            .push(DirectoryEntry {
                name: name.to_string(),
                folder,
                locked,
            });
    }

    /// Registers a scripted command response. Handlers are consulted newest
    /// first; the first `Some` wins.
    pub fn on_command<F>(&self, handler: F)
    where
        F: Fn(&str, &[&str]) -> Option<CommandOutput> + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    pub fn journal(&self) -> Vec<SystemCall> {
        self.state().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state().journal.clear();
    }

    /// Number of registry writes recorded under `hive`.
    pub fn writes_under(&self, hive: Hive) -> usize {
        self.state()
            .journal
            .iter()
            .filter(|call| match call {
                SystemCall::WriteDword { hive: h, .. } | SystemCall::WriteString { hive: h, .. } => {
                    *h == hive
                }
                _ => false,
            })
            .count()
    }

    /// Commands run so far, rendered as `exe arg arg`.
    pub fn commands(&self) -> Vec<String> {
        self.state()
            .journal
            .iter()
            .filter_map(|call| match call {
                SystemCall::Run { exe, args } => Some(render_command(exe, args)),
                _ => None,
            })
            .collect()
    }

    /// Detached launches so far, rendered like [`MemorySystem::commands`].
    pub fn spawned(&self) -> Vec<String> {
        self.state()
            .journal
            .iter()
            .filter_map(|call| match call {
                SystemCall::Spawn { exe, args } => Some(render_command(exe, args)),
                _ => None,
            })
            .collect()
    }

    /// Total read-side calls served, used to observe whether probing happened.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn timer_resolution_active(&self) -> bool {
        self.state().timer_resolution
    }

    fn count_read(&self) {
        self.reads.fetch_add(1, Ordering::SeqCst);
    }

    fn builtin_command(&self, exe: &str, args: &[&str]) -> Option<CommandOutput> {
        match (exe.to_lowercase().as_str(), args) {
            ("sc.exe" | "sc", ["query", service]) => {
                let state = self.state();
                Some(match state.services.get(&service.to_lowercase()) {
                    Some(entry) => {
                        let label = if entry.running { "4  RUNNING" } else { "1  STOPPED" };
                        CommandOutput::success(format!(
                            "SERVICE_NAME: {}\n        STATE              : {}",
                            service, label
                        ))
                    }
                    None => CommandOutput::failure(
                        1060,
                        "The specified service does not exist as an installed service.",
                    ),
                })
            }
            _ => None,
        }
    }
}

impl SystemProbe for MemorySystem {
    fn read_dword(&self, hive: Hive, path: &str, name: &str) -> Result<Option<u32>> {
        self.count_read();
        match self.state().values.get(&value_key(hive, path, name)) {
            Some(StoredValue::Dword(value)) => Ok(Some(*value)),
            Some(StoredValue::String(_)) => {
                anyhow::bail!("Value '{}' under '{}' is not a DWORD", name, path)
            }
            None => Ok(None),
        }
    }

    fn read_string(&self, hive: Hive, path: &str, name: &str) -> Result<Option<String>> {
        self.count_read();
        match self.state().values.get(&value_key(hive, path, name)) {
            Some(StoredValue::String(value)) => Ok(Some(value.clone())),
            Some(StoredValue::Dword(value)) => Ok(Some(value.to_string())),
            None => Ok(None),
        }
    }

    fn write_dword(&self, hive: Hive, path: &str, name: &str, value: u32) -> Result<()> {
        let mut state = self.state();
        state.store(hive, path, name, StoredValue::Dword(value));
        state.journal.push(SystemCall::WriteDword {
            hive,
            path: path.to_string(),
            name: name.to_string(),
            value,
        });
        Ok(())
    }

    fn write_string(&self, hive: Hive, path: &str, name: &str, value: &str) -> Result<()> {
        let mut state = self.state();
        state.store(hive, path, name, StoredValue::String(value.to_string()));
        state.journal.push(SystemCall::WriteString {
            hive,
            path: path.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        });
        Ok(())
    }

    fn service_start_mode(&self, service: &str) -> Result<Option<StartMode>> {
        self.count_read();
        Ok(self.start_mode(service))
    }

    fn set_service_start_mode(&self, service: &str, mode: StartMode) -> Result<()> {
        let mut state = self.state();
        state.journal.push(SystemCall::SetStartMode {
            service: service.to_string(),
            mode,
        });
        match state.services.get_mut(&service.to_lowercase()) {
            Some(entry) => {
                entry.mode = mode;
                Ok(())
            }
            None => anyhow::bail!("Service '{}' is not installed", service),
        }
    }

    fn stop_service(&self, service: &str) -> Result<()> {
        let mut state = self.state();
        state
            .journal
            .push(SystemCall::StopService(service.to_string()));
        match state.services.get_mut(&service.to_lowercase()) {
            Some(entry) => {
                entry.running = false;
                Ok(())
            }
            None => anyhow::bail!("Service '{}' is not installed", service),
        }
    }

    fn start_service(&self, service: &str) -> Result<()> {
        let mut state = self.state();
        state
            .journal
            .push(SystemCall::StartService(service.to_string()));
        match state.services.get_mut(&service.to_lowercase()) {
            Some(entry) if entry.mode == StartMode::Disabled => {
                anyhow::bail!("Service '{}' is disabled", service)
            }
            Some(entry) => {
                entry.running = true;
                Ok(())
            }
            None => anyhow::bail!("Service '{}' is not installed", service),
        }
    }

    fn run(&self, exe: &str, args: &[&str]) -> Result<CommandOutput> {
        self.count_read();
        self.state().journal.push(SystemCall::Run {
            exe: exe.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });

        let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(output) = handlers.iter().rev().find_map(|handler| handler(exe, args)) {
            return Ok(output);
        }
        drop(handlers);

        Ok(self
            .builtin_command(exe, args)
            .unwrap_or_else(|| CommandOutput::success("")))
    }

    fn spawn(&self, exe: &str, args: &[&str]) -> Result<()> {
        self.state().journal.push(SystemCall::Spawn {
            exe: exe.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        });
        Ok(())
    }

    fn program_exists(&self, path: &str) -> bool {
        self.state().programs.contains(&path.to_lowercase())
    }

    fn query_inventory(&self, class: &str, field: &str) -> Result<Vec<String>> {
        self.count_read();
        Ok(self
            .state()
            .inventory
            .get(&(class.to_lowercase(), field.to_lowercase()))
            .cloned()
            .unwrap_or_default())
    }

    fn list_values(&self, hive: Hive, path: &str) -> Result<Vec<(String, String)>> {
        self.count_read();
        let state = self.state();
        let path = path.to_lowercase();
        let mut values: Vec<(String, String)> = state
            .values
            .iter()
            .filter(|((h, p, _), _)| *h == hive && *p == path)
            .map(|(key, value)| {
                let name = state.names.get(key).cloned().unwrap_or_else(|| key.2.clone());
                let text = match value {
                    StoredValue::Dword(v) => v.to_string(),
                    StoredValue::String(s) => s.clone(),
                };
                (name, text)
            })
            .collect();
        values.sort();
        Ok(values)
    }

    fn processes(&self) -> Result<Vec<ProcessInfo>> {
        self.count_read();
        Ok(self.state().processes.clone())
    }

    fn list_directory(&self, dir: &Path) -> Result<Vec<String>> {
        self.count_read();
        let mut names: Vec<String> = self
            .state()
            .directories
            .get(dir)
            .map(|entries| entries.iter().map(|e| e.name.clone()).collect())
            .unwrap_or_default();
        names.sort();
        Ok(names)
    }

    fn clean_directory(&self, dir: &Path) -> Result<CleanupSummary> {
        let mut state = self.state();
        state.journal.push(SystemCall::CleanDirectory(dir.to_path_buf()));
        let mut summary = CleanupSummary::default();
        if let Some(entries) = state.directories.get_mut(dir) {
            entries.retain(|entry| {
                if entry.locked {
                    summary.skipped += 1;
                } else if entry.folder {
                    summary.deleted_dirs += 1;
                } else {
                    summary.deleted_files += 1;
                }
                entry.locked
            });
        }
        Ok(summary)
    }

    fn is_elevated(&self) -> bool {
        self.elevated.load(Ordering::SeqCst)
    }

    fn set_timer_resolution(&self, enabled: bool) -> Result<()> {
        let mut state = self.state();
        state.timer_resolution = enabled;
        state.journal.push(SystemCall::TimerResolution(enabled));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_is_case_insensitive() {
        let system = MemorySystem::new();
        system
            .write_dword(Hive::CurrentUser, r"Software\Test", "Value", 7)
            .unwrap();
        assert_eq!(
            system
                .read_dword(Hive::CurrentUser, r"SOFTWARE\test", "value")
                .unwrap(),
            Some(7)
        );
        assert_eq!(
            system
                .read_dword(Hive::LocalMachine, r"Software\Test", "Value")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_out_of_band_changes_are_not_journaled() {
        let system = MemorySystem::new();
        system.set_dword(Hive::LocalMachine, r"Software\Test", "Value", 1);
        assert!(system.journal().is_empty());
        system
            .write_dword(Hive::LocalMachine, r"Software\Test", "Value", 2)
            .unwrap();
        assert_eq!(system.writes_under(Hive::LocalMachine), 1);
        assert_eq!(system.writes_under(Hive::CurrentUser), 0);
    }

    #[test]
    fn test_stop_and_query_service() {
        let system = MemorySystem::new();
        system.install_service("wuauserv", StartMode::Demand, true);
        let running = system.run("sc.exe", &["query", "wuauserv"]).unwrap();
        assert!(running.stdout.contains("RUNNING"));

        system.stop_service("wuauserv").unwrap();
        // Stopping twice is fine.
        system.stop_service("wuauserv").unwrap();
        let stopped = system.run("sc.exe", &["query", "wuauserv"]).unwrap();
        assert!(stopped.stdout.contains("STOPPED"));
    }

    #[test]
    fn test_missing_service_operations_fail() {
        let system = MemorySystem::new();
        assert!(system.service_start_mode("Nope").unwrap().is_none());
        assert!(system
            .set_service_start_mode("Nope", StartMode::Disabled)
            .is_err());
        assert!(system.stop_service("Nope").is_err());
    }

    #[test]
    fn test_scripted_commands_take_precedence() {
        let system = MemorySystem::new();
        system.on_command(|exe, _| (exe == "bcdedit").then(|| CommandOutput::success("first")));
        system.on_command(|exe, _| (exe == "bcdedit").then(|| CommandOutput::success("second")));
        let output = system.run("bcdedit", &["/enum"]).unwrap();
        assert_eq!(output.stdout, "second");
        assert_eq!(system.commands(), vec!["bcdedit /enum".to_string()]);
    }

    #[test]
    fn test_spawn_is_journaled_apart_from_run() {
        let system = MemorySystem::new();
        system.spawn("explorer.exe", &["ms-settings:startupapps"]).unwrap();
        assert_eq!(system.spawned(), vec!["explorer.exe ms-settings:startupapps".to_string()]);
        assert!(system.commands().is_empty());
        assert_eq!(system.read_count(), 0);
    }

    #[test]
    fn test_list_values_keeps_original_names() {
        let system = MemorySystem::new();
        let run = r"Software\Microsoft\Windows\CurrentVersion\Run";
        system.set_string(Hive::CurrentUser, run, "Steam", r"C:\Steam\steam.exe -silent");
        system
            .write_dword(Hive::CurrentUser, &run.to_uppercase(), "Counter", 4)
            .unwrap();
        system.set_string(Hive::LocalMachine, run, "Other", "x");

        assert_eq!(
            system.list_values(Hive::CurrentUser, run).unwrap(),
            vec![
                ("Counter".to_string(), "4".to_string()),
                ("Steam".to_string(), r"C:\Steam\steam.exe -silent".to_string()),
            ]
        );

        system.remove_value(Hive::CurrentUser, run, "steam");
        assert_eq!(system.list_values(Hive::CurrentUser, run).unwrap().len(), 1);
        assert!(system
            .list_values(Hive::CurrentUser, r"Software\Nothing")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_clean_directory_skips_locked_entries() {
        let system = MemorySystem::new();
        let temp = Path::new(r"C:\Temp");
        system.add_file(temp, "a.tmp", false);
        system.add_file(temp, "pagefile.lock", true);
        system.add_folder(temp, "cache", false);

        let summary = system.clean_directory(temp).unwrap();
        assert_eq!(
            summary,
            CleanupSummary {
                deleted_files: 1,
                deleted_dirs: 1,
                skipped: 1,
            }
        );
        assert_eq!(system.list_directory(temp).unwrap(), vec!["pagefile.lock".to_string()]);
        assert_eq!(
            system.journal(),
            vec![SystemCall::CleanDirectory(temp.to_path_buf())]
        );
    }
}
