// src/tweaks/services.rs

use anyhow::Result;
use tracing::{debug, warn};

use super::{
    managed::ManagedAction,
    method::{combine_signals, run_step, Elevation, Report, Signal, TweakContext, TweakMethod},
    LiveState,
};
use crate::system::{StartMode, SystemProbe};

/// Services no tweak may ever reconfigure, stop or start.
pub const PROTECTED_SERVICES: &[&str] = &[
    "RpcSs",
    "RpcEptMapper",
    "DcomLaunch",
    "Winmgmt",
    "NlaSvc",
    "EventLog",
    "LSM",
    "PlugPlay",
    "Power",
    "BFE",
    "MpsSvc",
    "Dhcp",
    "Dnscache",
    "CryptSvc",
    "ProfSvc",
    "Schedule",
    "SamSs",
    "gpsvc",
    "AudioSrv",
    "AudioEndpointBuilder",
];

pub fn is_protected(service: &str) -> bool {
    PROTECTED_SERVICES
        .iter()
        .any(|protected| protected.eq_ignore_ascii_case(service))
}

/// How a multi-service toggle decides its live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quorum {
    /// Every listed service is a signal; a missing one counts against.
    AllListed,
    /// Only installed services count; none installed reads as unknown.
    AnyPresent,
}

/// Moves a fixed set of services between two start modes.
#[derive(Debug, Clone)]
pub struct ServiceToggle {
    pub services: Vec<&'static str>,
    /// Start mode while the tweak is enabled.
    pub on: StartMode,
    /// Start mode restored when the tweak is reverted.
    pub off: StartMode,
    pub quorum: Quorum,
    /// Stop on enable, start on revert.
    pub control_running: bool,
    pub message: &'static str,
    pub notice: &'static str,
}

impl ServiceToggle {
    pub fn new(services: &[&'static str], on: StartMode, off: StartMode) -> Self {
        Self {
            services: services.to_vec(),
            on,
            off,
            quorum: Quorum::AllListed,
            control_running: false,
            message: "Service startup updated.",
            notice: "Admin required.",
        }
    }

    pub fn quorum(mut self, quorum: Quorum) -> Self {
        self.quorum = quorum;
        self
    }

    pub fn control_running(mut self) -> Self {
        self.control_running = true;
        self
    }

    pub fn message(mut self, message: &'static str) -> Self {
        self.message = message;
        self
    }

    pub fn admin_notice(mut self, notice: &'static str) -> Self {
        self.notice = notice;
        self
    }
}

/// Sets a service's start mode as an independent sub-step.
///
/// Returns whether the change went through; absent, protected and failing
/// services are reported and skipped.
fn set_start_mode(system: &dyn SystemProbe, report: &mut Report, service: &str, mode: StartMode) -> bool {
    if is_protected(service) {
        warn!("Refusing to touch protected service {:?}", service);
        report.line(format!("Skipped: {} (protected service).", service));
        return false;
    }

    let result = match system.service_start_mode(service) {
        Ok(Some(_)) => system.set_service_start_mode(service, mode),
        Ok(None) => {
            debug!("{:?} is not installed", service);
            report.line(format!("Skipped: {} (not present or access denied).", service));
            return false;
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            report.line(format!("{}: start mode set to {}.", service, mode));
            true
        }
        Err(e) => {
            warn!("{:?} start mode -> {} failed: {:#}", service, mode, e);
            report.line(format!("Skipped: {} (not present or access denied).", service));
            false
        }
    }
}

fn set_running(system: &dyn SystemProbe, report: &mut Report, service: &str, running: bool) {
    if is_protected(service) {
        return;
    }

    let result = if running {
        system.start_service(service)
    } else {
        system.stop_service(service)
    };
    let verb = if running { "start" } else { "stop" };
    match result {
        Ok(()) => report.line(format!("{}: {} requested.", service, verb)),
        Err(e) => {
            warn!("Could not {} {:?}: {:#}", verb, service, e);
            report.line(format!("{}: could not {} ({:#}).", service, verb, e));
        }
    }
}

fn kill_process(system: &dyn SystemProbe, report: &mut Report, image: &str) {
    run_step(system, report, "taskkill", &["/IM", image, "/F"]);
}

impl TweakMethod for ServiceToggle {
    fn elevation(&self) -> Elevation {
        Elevation::Required(self.notice)
    }

    fn apply(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        let mode = if enabled { self.on } else { self.off };
        for service in &self.services {
            let changed = set_start_mode(ctx.system, report, service, mode);
            if changed && self.control_running {
                set_running(ctx.system, report, service, !enabled);
            }
        }
        report.line(self.message);
        Ok(())
    }

    fn probe(&self, ctx: &TweakContext<'_>) -> Result<LiveState> {
        let mut signals = Vec::with_capacity(self.services.len());
        for service in &self.services {
            let signal = Signal::compare(ctx.system.service_start_mode(service)?, self.on);
            if self.quorum == Quorum::AnyPresent && signal == Signal::Absent {
                continue;
            }
            signals.push(signal);
        }

        Ok(match self.quorum {
            Quorum::AllListed => combine_signals(&signals),
            Quorum::AnyPresent if signals.is_empty() => LiveState::Unknown,
            Quorum::AnyPresent => LiveState::from_bool(signals.iter().all(|s| *s == Signal::Match)),
        })
    }
}

/// Temporarily stops or starts a service without touching its start mode.
#[derive(Debug, Clone)]
pub struct ServicePause {
    pub service: &'static str,
    pub message: &'static str,
}

impl TweakMethod for ServicePause {
    fn elevation(&self) -> Elevation {
        Elevation::Required("Admin required.")
    }

    fn apply(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        set_running(ctx.system, report, self.service, !enabled);
        report.line(self.message);
        Ok(())
    }

    fn probe(&self, ctx: &TweakContext<'_>) -> Result<LiveState> {
        let output = ctx.system.run("sc.exe", &["query", self.service])?;
        if output.exit_code != 0 {
            return Ok(LiveState::Unknown);
        }
        Ok(LiveState::from_bool(
            output.stdout.to_ascii_uppercase().contains("STOPPED"),
        ))
    }
}

/// A service in a curated trim and the start mode it returns to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimEntry {
    pub service: &'static str,
    pub restore: StartMode,
}

const fn trim(service: &'static str, restore: StartMode) -> TrimEntry {
    TrimEntry { service, restore }
}

/// Optional Xbox, fax, maps, phone and error-reporting services.
pub const SAFE_TRIM: &[TrimEntry] = &[
    trim("XblAuthManager", StartMode::Demand),
    trim("XblGameSave", StartMode::Demand),
    trim("XboxNetApiSvc", StartMode::Demand),
    trim("XboxGipSvc", StartMode::Demand),
    trim("Fax", StartMode::Demand),
    trim("MapsBroker", StartMode::Demand),
    trim("PhoneSvc", StartMode::Demand),
    trim("WMPNetworkSvc", StartMode::Demand),
    trim("WerSvc", StartMode::Demand),
];

/// Notifications, printing, prefetch and indexing on top of [`SAFE_TRIM`].
pub const HARDCORE_EXTRAS: &[TrimEntry] = &[
    trim("WpnService", StartMode::Auto),
    trim("WpnUserService", StartMode::Demand),
    trim("Spooler", StartMode::Auto),
    trim("SysMain", StartMode::Auto),
    trim("WSearch", StartMode::Auto),
];

pub const SELECTIVE_BACKGROUND: &[TrimEntry] = &[
    trim("XboxGipSvc", StartMode::Demand),
    trim("XblAuthManager", StartMode::Demand),
    trim("XblGameSave", StartMode::Demand),
    trim("Fax", StartMode::Demand),
    trim("Spooler", StartMode::Auto),
];

/// AMD user-mode helpers that are safe to park. Display driver services are
/// never listed.
pub const AMD_TRIM: &[TrimEntry] = &[
    trim("AMD External Events Utility", StartMode::Demand),
    trim("AMD Crash Defender Service", StartMode::Demand),
    trim("amdfendrsr", StartMode::Demand),
    trim("AUEPLauncher", StartMode::Demand),
    trim("amdlogsr", StartMode::Demand),
];

/// Disables a curated allow-list of services and restores each one to its
/// own default on revert.
#[derive(Debug, Clone)]
pub struct ServiceTrim {
    /// Used in report lines, e.g. "AMD" or "competitive".
    pub label: &'static str,
    pub entries: Vec<TrimEntry>,
    /// Stop services when trimming; start auto-start ones on revert.
    pub control_running: bool,
    /// Process images killed when trimming.
    pub processes: Vec<&'static str>,
    /// Lines appended after every run.
    pub footer: Vec<&'static str>,
    pub notice: &'static str,
}

impl ServiceTrim {
    pub fn new(label: &'static str, entries: &[TrimEntry]) -> Self {
        Self {
            label,
            entries: entries.to_vec(),
            control_running: false,
            processes: Vec::new(),
            footer: Vec::new(),
            notice: "Admin required.",
        }
    }

    pub fn competitive(hardcore: bool) -> Self {
        let mut entries = SAFE_TRIM.to_vec();
        let mut footer = vec!["Done. Re-enable toggle to restore default startup modes."];
        if hardcore {
            entries.extend_from_slice(HARDCORE_EXTRAS);
            footer.push(
                "Warning: Hardcore trim may disable notifications, search indexing, printing, or Xbox features until reverted.",
            );
        }

        Self {
            label: if hardcore { "hardcore competitive" } else { "safe competitive" },
            entries,
            control_running: true,
            processes: vec!["OneDrive.exe", "PhoneExperienceHost.exe", "YourPhone.exe"],
            footer,
            notice: "Admin required.",
        }
    }

    pub fn selective_background() -> Self {
        Self {
            label: "background",
            entries: SELECTIVE_BACKGROUND.to_vec(),
            control_running: true,
            processes: vec!["OneDrive.exe", "PhoneExperienceHost.exe"],
            footer: Vec::new(),
            notice: "Admin required.",
        }
    }

    pub fn amd() -> Self {
        Self::new("AMD", AMD_TRIM).admin_notice("Admin required for AMD service tuning.")
    }

    pub fn admin_notice(mut self, notice: &'static str) -> Self {
        self.notice = notice;
        self
    }
}

impl ManagedAction for ServiceTrim {
    fn elevation(&self) -> Elevation {
        Elevation::Required(self.notice)
    }

    fn run(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        report.line(if enabled {
            format!("Applying {} service trim...", self.label)
        } else {
            format!("Reverting {} service trim to defaults...", self.label)
        });

        let mut changed = 0;
        for entry in &self.entries {
            let mode = if enabled { StartMode::Disabled } else { entry.restore };
            if !set_start_mode(ctx.system, report, entry.service, mode) {
                continue;
            }
            changed += 1;

            if !self.control_running {
                continue;
            }
            if enabled {
                set_running(ctx.system, report, entry.service, false);
            } else if entry.restore == StartMode::Auto {
                set_running(ctx.system, report, entry.service, true);
            }
        }

        if changed == 0 {
            report.line(format!("No {} services found.", self.label));
        } else {
            report.line(format!(
                "{} service start mode updated for {} services.",
                self.label, changed
            ));
        }

        if enabled {
            for image in &self.processes {
                kill_process(ctx.system, report, image);
            }
        }

        for line in &self.footer {
            report.line(*line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::ManagedStateStore,
        system::{memory::SystemCall, MemorySystem},
    };

    fn context<'a>(system: &'a MemorySystem, store: &'a ManagedStateStore) -> TweakContext<'a> {
        TweakContext {
            key: "test",
            system,
            store,
        }
    }

    #[test]
    fn test_any_present_ignores_missing_services() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        let toggle = ServiceToggle::new(&["SensorService", "lfsvc"], StartMode::Disabled, StartMode::Demand)
            .quorum(Quorum::AnyPresent);

        assert_eq!(toggle.probe(&context(&system, &store)).unwrap(), LiveState::Unknown);

        system.install_service("lfsvc", StartMode::Demand, false);
        assert_eq!(toggle.probe(&context(&system, &store)).unwrap(), LiveState::Off);

        toggle.apply(&context(&system, &store), true, &mut Report::default()).unwrap();
        assert_eq!(toggle.probe(&context(&system, &store)).unwrap(), LiveState::On);
    }

    #[test]
    fn test_all_listed_missing_service_is_off() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        system.install_service("wuauserv", StartMode::Disabled, false);
        system.install_service("UsoSvc", StartMode::Disabled, false);
        let toggle = ServiceToggle::new(
            &["wuauserv", "UsoSvc", "WaaSMedicSvc"],
            StartMode::Disabled,
            StartMode::Demand,
        );

        assert_eq!(toggle.probe(&context(&system, &store)).unwrap(), LiveState::Off);
    }

    #[test]
    fn test_control_running_stops_and_starts() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        system.install_service("SysMain", StartMode::Auto, true);
        let toggle =
            ServiceToggle::new(&["SysMain"], StartMode::Disabled, StartMode::Auto).control_running();

        toggle.apply(&context(&system, &store), true, &mut Report::default()).unwrap();
        assert_eq!(system.start_mode("SysMain"), Some(StartMode::Disabled));
        assert!(!system.is_running("SysMain"));

        toggle.apply(&context(&system, &store), false, &mut Report::default()).unwrap();
        assert_eq!(system.start_mode("SysMain"), Some(StartMode::Auto));
        assert!(system.is_running("SysMain"));
    }

    #[test]
    fn test_trim_skips_absent_services_and_continues() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        system.install_service("WerSvc", StartMode::Demand, true);

        let mut report = Report::default();
        ServiceTrim::competitive(false)
            .run(&context(&system, &store), true, &mut report)
            .unwrap();

        assert!(report
            .lines()
            .contains(&"Skipped: XblAuthManager (not present or access denied).".to_string()));
        assert_eq!(system.start_mode("WerSvc"), Some(StartMode::Disabled));
        assert!(!system.is_running("WerSvc"));
        assert!(system
            .commands()
            .contains(&"taskkill /IM YourPhone.exe /F".to_string()));
    }

    #[test]
    fn test_trim_never_touches_protected_services() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        system.install_service("RpcSs", StartMode::Auto, true);
        system.install_service("Fax", StartMode::Demand, false);
        let curated = ServiceTrim::new(
            "test",
            &[trim("RpcSs", StartMode::Auto), trim("Fax", StartMode::Demand)],
        );

        let mut report = Report::default();
        curated.run(&context(&system, &store), true, &mut report).unwrap();

        assert!(system
            .journal()
            .iter()
            .all(|call| call.service_target() != Some("RpcSs")));
        assert_eq!(system.start_mode("RpcSs"), Some(StartMode::Auto));
        assert_eq!(system.start_mode("Fax"), Some(StartMode::Disabled));
    }

    #[test]
    fn test_curated_lists_exclude_protected_services() {
        for list in [SAFE_TRIM, HARDCORE_EXTRAS, SELECTIVE_BACKGROUND, AMD_TRIM] {
            assert!(list.iter().all(|entry| !is_protected(entry.service)));
        }
    }

    #[test]
    fn test_revert_restores_per_service_defaults() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        system.install_service("Spooler", StartMode::Disabled, false);
        system.install_service("WpnUserService", StartMode::Disabled, false);

        ServiceTrim::competitive(true)
            .run(&context(&system, &store), false, &mut Report::default())
            .unwrap();

        assert_eq!(system.start_mode("Spooler"), Some(StartMode::Auto));
        assert!(system.is_running("Spooler"));
        assert_eq!(system.start_mode("WpnUserService"), Some(StartMode::Demand));
        assert!(system.journal().contains(&SystemCall::StartService("Spooler".into())));
        assert!(system.commands().is_empty());
    }

    #[test]
    fn test_amd_trim_without_services() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        let mut report = Report::default();
        ServiceTrim::amd()
            .run(&context(&system, &store), true, &mut report)
            .unwrap();
        assert!(report.lines().contains(&"No AMD services found.".to_string()));
        assert!(system
            .journal()
            .iter()
            .all(|call| !matches!(call, SystemCall::SetStartMode { .. })));
    }

    #[test]
    fn test_service_pause_probe() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        let pause = ServicePause {
            service: "wuauserv",
            message: "Windows Update service toggled temporarily.",
        };

        assert_eq!(pause.probe(&context(&system, &store)).unwrap(), LiveState::Unknown);

        system.install_service("wuauserv", StartMode::Demand, true);
        assert_eq!(pause.probe(&context(&system, &store)).unwrap(), LiveState::Off);

        pause.apply(&context(&system, &store), true, &mut Report::default()).unwrap();
        assert_eq!(pause.probe(&context(&system, &store)).unwrap(), LiveState::On);
    }
}
