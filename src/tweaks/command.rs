// src/tweaks/command.rs

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::{
    method::{Elevation, Report, Signal, TweakContext, TweakMethod},
    registry::RegistrySetting,
    LiveState,
};
use crate::system::SystemProbe;

static PLATFORM_CLOCK_FORCED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)useplatformclock\s+Yes").unwrap());

/// How a command-driven tweak reads its state back.
#[derive(Debug, Clone, Copy)]
pub enum CommandProbe {
    /// `powercfg /a` no longer offers hibernation.
    HibernateUnavailable,
    /// `bcdedit /enum` does not force the platform clock.
    PlatformClockReleased,
    /// A single registry value written by the tool itself.
    Registry(RegistrySetting),
}

impl CommandProbe {
    fn probe(&self, system: &dyn SystemProbe) -> Result<LiveState> {
        match self {
            CommandProbe::HibernateUnavailable => {
                let output = system.run("powercfg", &["/a"])?;
                let text = output.combined().to_lowercase();
                Ok(
                    if text.contains("hibernate has not been enabled")
                        || text.contains("hibernation has not been enabled")
                    {
                        LiveState::On
                    } else if text.contains("hibernate") {
                        LiveState::Off
                    } else {
                        LiveState::Unknown
                    },
                )
            }
            CommandProbe::PlatformClockReleased => {
                let output = system.run("bcdedit", &["/enum"])?;
                if output.exit_code != 0 {
                    // bcdedit refuses to enumerate without elevation.
                    return Ok(LiveState::Unknown);
                }
                Ok(LiveState::from_bool(
                    !PLATFORM_CLOCK_FORCED.is_match(&output.stdout),
                ))
            }
            CommandProbe::Registry(setting) => Ok(match setting.signal(system)? {
                Signal::Match => LiveState::On,
                Signal::Mismatch => LiveState::Off,
                Signal::Absent => LiveState::Unknown,
            }),
        }
    }
}

/// Runs one external command per direction.
#[derive(Debug, Clone)]
pub struct CommandToggle {
    pub exe: &'static str,
    pub enable_args: &'static [&'static str],
    pub disable_args: &'static [&'static str],
    /// Report line written after the command ran.
    pub message: Option<&'static str>,
    pub probe: CommandProbe,
}

impl TweakMethod for CommandToggle {
    fn elevation(&self) -> Elevation {
        Elevation::Required("Admin required.")
    }

    fn apply(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        let args = if enabled {
            self.enable_args
        } else {
            self.disable_args
        };
        // A missing tool is a failure of the whole toggle.
        let output = ctx.system.run(self.exe, args)?;
        report.command(&output);
        if let Some(message) = self.message {
            report.line(message);
        }
        Ok(())
    }

    fn probe(&self, ctx: &TweakContext<'_>) -> Result<LiveState> {
        self.probe.probe(ctx.system)
    }
}

/// Opens `exe` for the user without waiting for it to close. A launch failure
/// is logged only.
pub(crate) fn launch(system: &dyn SystemProbe, exe: &str, args: &[&str]) {
    if let Err(e) = system.spawn(exe, args) {
        warn!("{} {:?} could not be launched: {:#}", exe, args, e);
    }
}
