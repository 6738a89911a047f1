// src/tweaks/latency.rs

use anyhow::Result;
use tracing::debug;

use super::{
    method::{combine_signals, Report, TweakContext, TweakMethod},
    registry::RegistrySetting,
    LiveState,
};
use crate::system::Hive;

const GAME_DVR: &str = r"SOFTWARE\Microsoft\Windows\CurrentVersion\GameDVR";
const GAME_CONFIG_STORE: &str = r"System\GameConfigStore";
const SYSTEM_PROFILE: &str = r"SOFTWARE\Microsoft\Windows NT\CurrentVersion\Multimedia\SystemProfile";
const GAMES_TASK: &str =
    r"SOFTWARE\Microsoft\Windows NT\CurrentVersion\Multimedia\SystemProfile\Tasks\Games";

/// Per-user capture settings.
pub const USER_SETTINGS: [RegistrySetting; 2] = [
    RegistrySetting::dword(Hive::CurrentUser, GAME_CONFIG_STORE, "GameDVR_Enabled", 0, 1),
    RegistrySetting::dword(Hive::CurrentUser, GAME_DVR, "AppCaptureEnabled", 0, 1),
];

/// Machine-wide multimedia scheduler settings.
pub const SYSTEM_SETTINGS: [RegistrySetting; 5] = [
    RegistrySetting::dword(Hive::LocalMachine, SYSTEM_PROFILE, "NetworkThrottlingIndex", 0xFFFF_FFFF, 10),
    RegistrySetting::dword(Hive::LocalMachine, SYSTEM_PROFILE, "SystemResponsiveness", 0, 20),
    RegistrySetting::string(Hive::LocalMachine, GAMES_TASK, "Scheduling Category", "High", "Medium")
        .write_only(),
    RegistrySetting::string(Hive::LocalMachine, GAMES_TASK, "Priority", "6", "2").write_only(),
    RegistrySetting::string(Hive::LocalMachine, GAMES_TASK, "SFIO Priority", "High", "Normal")
        .write_only(),
];

/// Capture, scheduler and network throttling settings.
///
/// The per-user half applies without elevation; the machine-wide half is
/// skipped with a notice when the process is not elevated.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowLatencyMode;

impl TweakMethod for LowLatencyMode {
    fn apply(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        for setting in &USER_SETTINGS {
            setting.write(ctx.system, enabled)?;
        }

        if ctx.system.is_elevated() {
            for setting in &SYSTEM_SETTINGS {
                setting.write(ctx.system, enabled)?;
            }
            report.line("Full low-latency profile applied.");
        } else {
            debug!("{:?}: not elevated, skipping machine-wide settings", ctx.key);
            report.line("User-level latency settings applied.");
            report.line("Admin required for full scheduler/network latency profile.");
        }

        report.line("Restart game(s) to apply runtime-side effects.");
        Ok(())
    }

    fn probe(&self, ctx: &TweakContext<'_>) -> Result<LiveState> {
        let signals = USER_SETTINGS
            .iter()
            .chain(SYSTEM_SETTINGS.iter())
            .filter(|setting| setting.probed)
            .map(|setting| setting.signal(ctx.system))
            .collect::<Result<Vec<_>>>()?;
        Ok(combine_signals(&signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::ManagedStateStore, system::MemorySystem};

    fn context<'a>(system: &'a MemorySystem, store: &'a ManagedStateStore) -> TweakContext<'a> {
        TweakContext {
            key: "low_latency_mode",
            system,
            store,
        }
    }

    #[test]
    fn test_unelevated_applies_user_half_only() {
        let system = MemorySystem::new();
        system.set_elevated(false);
        let store = ManagedStateStore::new("unused.json");

        let mut report = Report::default();
        LowLatencyMode.apply(&context(&system, &store), true, &mut report).unwrap();

        assert_eq!(system.writes_under(Hive::CurrentUser), 2);
        assert_eq!(system.writes_under(Hive::LocalMachine), 0);
        assert!(report
            .lines()
            .contains(&"Admin required for full scheduler/network latency profile.".to_string()));
        // Three signals match, the fourth is absent.
        assert_eq!(LowLatencyMode.probe(&context(&system, &store)).unwrap(), LiveState::Off);
    }

    #[test]
    fn test_elevated_round_trip() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");

        LowLatencyMode.apply(&context(&system, &store), true, &mut Report::default()).unwrap();
        assert_eq!(
            system.dword(Hive::LocalMachine, SYSTEM_PROFILE, "NetworkThrottlingIndex"),
            Some(0xFFFF_FFFF)
        );
        assert_eq!(
            system.string(Hive::LocalMachine, GAMES_TASK, "SFIO Priority").as_deref(),
            Some("High")
        );
        assert_eq!(LowLatencyMode.probe(&context(&system, &store)).unwrap(), LiveState::On);

        LowLatencyMode.apply(&context(&system, &store), false, &mut Report::default()).unwrap();
        assert_eq!(LowLatencyMode.probe(&context(&system, &store)).unwrap(), LiveState::Off);
    }

    #[test]
    fn test_three_of_four_signals_is_off() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        system.set_dword(Hive::CurrentUser, GAME_CONFIG_STORE, "GameDVR_Enabled", 0);
        system.set_dword(Hive::CurrentUser, GAME_DVR, "AppCaptureEnabled", 0);
        system.set_dword(Hive::LocalMachine, SYSTEM_PROFILE, "SystemResponsiveness", 0);
        system.set_dword(Hive::LocalMachine, SYSTEM_PROFILE, "NetworkThrottlingIndex", 10);

        assert_eq!(LowLatencyMode.probe(&context(&system, &store)).unwrap(), LiveState::Off);
    }
}
