// src/tweaks/registry.rs

use anyhow::{Context, Result};
use tracing::trace;

use super::{
    method::{combine_signals, Elevation, Report, Signal, TweakContext, TweakMethod},
    LiveState,
};
use crate::system::{Hive, SystemProbe};

/// Value written for each toggle direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryData {
    Dword { on: u32, off: u32 },
    String { on: &'static str, off: &'static str },
}

/// One registry value managed by a tweak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySetting {
    pub hive: Hive,
    /// Subkey path, relative to the hive.
    pub path: &'static str,
    pub name: &'static str,
    pub data: RegistryData,
    /// Whether the value takes part in probing.
    pub probed: bool,
}

impl RegistrySetting {
    pub const fn dword(hive: Hive, path: &'static str, name: &'static str, on: u32, off: u32) -> Self {
        Self {
            hive,
            path,
            name,
            data: RegistryData::Dword { on, off },
            probed: true,
        }
    }

    pub const fn string(
        hive: Hive,
        path: &'static str,
        name: &'static str,
        on: &'static str,
        off: &'static str,
    ) -> Self {
        Self {
            hive,
            path,
            name,
            data: RegistryData::String { on, off },
            probed: true,
        }
    }

    /// Written on apply but ignored by the probe.
    pub const fn write_only(mut self) -> Self {
        self.probed = false;
        self
    }

    pub fn write(&self, system: &dyn SystemProbe, enabled: bool) -> Result<()> {
        trace!("{}\\{}\\{} -> enabled={}", self.hive, self.path, self.name, enabled);
        let written = match self.data {
            RegistryData::Dword { on, off } => {
                system.write_dword(self.hive, self.path, self.name, if enabled { on } else { off })
            }
            RegistryData::String { on, off } => {
                system.write_string(self.hive, self.path, self.name, if enabled { on } else { off })
            }
        };
        written.with_context(|| format!("Failed to write {}\\{}\\{}", self.hive, self.path, self.name))
    }

    /// Compares the live value against the "enabled" value.
    pub fn signal(&self, system: &dyn SystemProbe) -> Result<Signal> {
        Ok(match self.data {
            RegistryData::Dword { on, .. } => {
                Signal::compare(system.read_dword(self.hive, self.path, self.name)?, on)
            }
            RegistryData::String { on, .. } => Signal::compare(
                system.read_string(self.hive, self.path, self.name)?.as_deref(),
                on,
            ),
        })
    }
}

/// Probes every setting flagged as probed.
pub fn probe_settings(system: &dyn SystemProbe, settings: &[RegistrySetting]) -> Result<LiveState> {
    let signals = settings
        .iter()
        .filter(|setting| setting.probed)
        .map(|setting| setting.signal(system))
        .collect::<Result<Vec<_>>>()?;
    Ok(combine_signals(&signals))
}

/// A tweak made purely of registry values.
#[derive(Debug, Clone)]
pub struct RegistryToggle {
    /// Report line written after a successful apply.
    pub message: &'static str,
    pub settings: Vec<RegistrySetting>,
    notice: Option<&'static str>,
}

impl RegistryToggle {
    /// Tweaks that touch HKLM require elevation.
    pub fn new(message: &'static str, settings: Vec<RegistrySetting>) -> Self {
        let notice = settings
            .iter()
            .any(|setting| setting.hive == Hive::LocalMachine)
            .then_some("Admin required.");
        Self {
            message,
            settings,
            notice,
        }
    }

    /// Overrides the notice shown when elevation is missing.
    pub fn admin_notice(mut self, notice: &'static str) -> Self {
        self.notice = Some(notice);
        self
    }
}

impl TweakMethod for RegistryToggle {
    fn elevation(&self) -> Elevation {
        match self.notice {
            Some(notice) => Elevation::Required(notice),
            None => Elevation::NotRequired,
        }
    }

    fn apply(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        for setting in &self.settings {
            setting.write(ctx.system, enabled)?;
        }
        report.line(self.message);
        Ok(())
    }

    fn probe(&self, ctx: &TweakContext<'_>) -> Result<LiveState> {
        probe_settings(ctx.system, &self.settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::ManagedStateStore, system::MemorySystem};

    const STICKY: &str = r"Control Panel\Accessibility\StickyKeys";

    fn sticky_keys() -> RegistryToggle {
        RegistryToggle::new(
            "StickyKeys flags updated.",
            vec![RegistrySetting::string(Hive::CurrentUser, STICKY, "Flags", "506", "510")],
        )
    }

    #[test]
    fn test_round_trip() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        let ctx = TweakContext {
            key: "sticky_keys_guard",
            system: &system,
            store: &store,
        };
        let toggle = sticky_keys();

        assert_eq!(toggle.probe(&ctx).unwrap(), LiveState::Unknown);

        let mut report = Report::default();
        toggle.apply(&ctx, true, &mut report).unwrap();
        assert_eq!(system.string(Hive::CurrentUser, STICKY, "Flags").as_deref(), Some("506"));
        assert_eq!(toggle.probe(&ctx).unwrap(), LiveState::On);
        assert_eq!(report.lines(), ["StickyKeys flags updated."]);

        toggle.apply(&ctx, false, &mut Report::default()).unwrap();
        assert_eq!(toggle.probe(&ctx).unwrap(), LiveState::Off);
    }

    #[test]
    fn test_elevation_follows_hive() {
        assert_eq!(sticky_keys().elevation(), Elevation::NotRequired);

        let policy = RegistryToggle::new(
            "Policy updated.",
            vec![RegistrySetting::dword(Hive::LocalMachine, r"SOFTWARE\Policies\X", "Y", 0, 1)],
        );
        assert_eq!(policy.elevation(), Elevation::Required("Admin required."));
        assert_eq!(
            policy.admin_notice("Custom.").elevation(),
            Elevation::Required("Custom.")
        );
    }

    #[test]
    fn test_write_only_settings_are_not_probed() {
        let system = MemorySystem::new();
        let settings = [
            RegistrySetting::dword(Hive::CurrentUser, r"Software\A", "Probed", 0, 1),
            RegistrySetting::dword(Hive::CurrentUser, r"Software\B", "Ignored", 0, 1).write_only(),
        ];
        system.set_dword(Hive::CurrentUser, r"Software\A", "Probed", 0);
        assert_eq!(probe_settings(&system, &settings).unwrap(), LiveState::On);
    }
}
