// src/tweaks/power.rs

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{
    method::{run_step, Elevation, Report, TweakContext, TweakMethod},
    LiveState,
};
use crate::system::SystemProbe;

/// Template GUID of the hidden Ultimate Performance scheme.
pub const ULTIMATE_TEMPLATE: &str = "e9a42b02-d5df-448d-aa00-03f14749eb61";

const PROCESSOR_SUBGROUP: &str = "54533251-82be-4824-96c1-47b60b740d00";
const MIN_PROCESSOR_STATE: &str = "893dee8e-2bef-41e0-89c6-b55d0929964c";
const USB_SUBGROUP: &str = "2a737441-1930-4402-8d77-b2bebba308a3";
const USB_SELECTIVE_SUSPEND: &str = "4f971e89-eebd-4455-a8de-9e59040e7347";
const IDLE_SUBGROUP: &str = "501a4d13-42af-4429-9fd1-a8218c268e20";
const IDLE_DISABLE: &str = "ee12f906-d277-404b-b6da-e5fa1a576df5";

pub(crate) static SCHEME_GUID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Fa-f0-9-]{36}").unwrap());

static AC_SETTING_INDEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)Current AC Power Setting Index:\s*0x([0-9a-f]+)").unwrap()
});

/// First scheme GUID on a `powercfg /list` line whose name contains any of
/// `names` (case-insensitive).
pub fn find_scheme(list: &str, names: &[&str]) -> Option<String> {
    list.lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            names.iter().any(|name| lower.contains(&name.to_lowercase()))
        })
        .find_map(|line| SCHEME_GUID.find(line).map(|m| m.as_str().to_string()))
}

fn list_schemes(system: &dyn SystemProbe) -> Result<String> {
    Ok(system.run("powercfg", &["/list"])?.stdout)
}

fn set_index(system: &dyn SystemProbe, report: &mut Report, ac_dc: &str, subgroup: &str, setting: &str, value: &str) {
    run_step(system, report, "powercfg", &[ac_dc, "scheme_current", subgroup, setting, value]);
}

/// Activates Ultimate Performance (duplicating it once if the scheme does
/// not exist yet) and pins the processor and USB settings.
pub(crate) fn apply_ultimate_plan(system: &dyn SystemProbe, enabled: bool, report: &mut Report) -> Result<()> {
    if enabled {
        let mut guid = find_scheme(&list_schemes(system)?, &["Ultimate Performance"]);
        if guid.is_none() {
            run_step(system, report, "powercfg", &["/duplicatescheme", ULTIMATE_TEMPLATE]);
            guid = find_scheme(&list_schemes(system)?, &["Ultimate Performance"]);
        }
        match guid {
            Some(guid) => {
                debug!("Activating Ultimate Performance scheme {}", guid);
                run_step(system, report, "powercfg", &["/setactive", &guid]);
            }
            None => report.line("Ultimate Performance scheme not available."),
        }
    }

    set_index(system, report, "/setacvalueindex", PROCESSOR_SUBGROUP, MIN_PROCESSOR_STATE, "100");
    set_index(system, report, "/setdcvalueindex", PROCESSOR_SUBGROUP, MIN_PROCESSOR_STATE, "100");
    set_index(
        system,
        report,
        "/setacvalueindex",
        USB_SUBGROUP,
        USB_SELECTIVE_SUSPEND,
        if enabled { "0" } else { "1" },
    );
    run_step(system, report, "powercfg", &["/setactive", "scheme_current"]);
    Ok(())
}

/// Ultimate Performance plan with full minimum CPU state.
#[derive(Debug, Clone, Copy, Default)]
pub struct UltimatePowerPlan;

impl TweakMethod for UltimatePowerPlan {
    fn elevation(&self) -> Elevation {
        Elevation::Required("Admin required.")
    }

    fn apply(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        apply_ultimate_plan(ctx.system, enabled, report)
    }

    fn probe(&self, ctx: &TweakContext<'_>) -> Result<LiveState> {
        let output = ctx.system.run("powercfg", &["/getactivescheme"])?;
        if output.exit_code != 0 {
            return Ok(LiveState::Unknown);
        }
        Ok(LiveState::from_bool(
            output.stdout.to_lowercase().contains("ultimate performance"),
        ))
    }
}

/// Ultimate plan plus disabled processor idle states.
#[derive(Debug, Clone, Copy, Default)]
pub struct PowerHardcore;

impl TweakMethod for PowerHardcore {
    fn elevation(&self) -> Elevation {
        Elevation::Required("Admin required.")
    }

    fn apply(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        let system = ctx.system;
        if enabled {
            apply_ultimate_plan(system, true, report)?;
            set_index(system, report, "/setacvalueindex", IDLE_SUBGROUP, IDLE_DISABLE, "0");
            set_index(system, report, "/setdcvalueindex", IDLE_SUBGROUP, IDLE_DISABLE, "0");
            report.line("Power hardcore mode enabled.");
        } else {
            set_index(system, report, "/setacvalueindex", IDLE_SUBGROUP, IDLE_DISABLE, "2");
            set_index(system, report, "/setdcvalueindex", IDLE_SUBGROUP, IDLE_DISABLE, "2");
            apply_ultimate_plan(system, false, report)?;
            report.line("Power hardcore mode disabled.");
        }
        run_step(system, report, "powercfg", &["/setactive", "scheme_current"]);
        Ok(())
    }

    fn probe(&self, ctx: &TweakContext<'_>) -> Result<LiveState> {
        let output = ctx
            .system
            .run("powercfg", &["/q", "scheme_current", IDLE_SUBGROUP, IDLE_DISABLE])?;
        if output.exit_code != 0 {
            return Ok(LiveState::Unknown);
        }
        Ok(match AC_SETTING_INDEX.captures(&output.stdout) {
            Some(caps) => LiveState::from_bool(
                u32::from_str_radix(&caps[1], 16).map_or(false, |value| value == 0),
            ),
            None => LiveState::Unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    };

    use super::*;
    use crate::{
        store::ManagedStateStore,
        system::{CommandOutput, MemorySystem},
    };

    const ULTIMATE_GUID: &str = "d8a4c1f2-1b7a-4c8e-9f3d-2a6b5c4e3f21";

    /// Scripts `powercfg` so that `/duplicatescheme` makes the Ultimate plan
    /// appear in `/list` and `/setactive <guid>` changes the active scheme.
    fn scripted_powercfg(system: &MemorySystem) {
        let duplicated = Arc::new(AtomicBool::new(false));
        let active_ultimate = Arc::new(AtomicBool::new(false));
        system.on_command(move |exe, args| {
            if exe != "powercfg" {
                return None;
            }
            match args {
                ["/duplicatescheme", _] => {
                    duplicated.store(true, Ordering::SeqCst);
                    Some(CommandOutput::success(format!(
                        "Power Scheme GUID: {}  (Ultimate Performance)",
                        ULTIMATE_GUID
                    )))
                }
                ["/list"] => {
                    let mut list = String::from(
                        "Power Scheme GUID: 381b4222-f694-41f0-9685-ff5bb260df2e  (Balanced) *",
                    );
                    if duplicated.load(Ordering::SeqCst) {
                        list.push_str(&format!(
                            "\nPower Scheme GUID: {}  (Ultimate Performance)",
                            ULTIMATE_GUID
                        ));
                    }
                    Some(CommandOutput::success(list))
                }
                ["/setactive", guid] if *guid == ULTIMATE_GUID => {
                    active_ultimate.store(true, Ordering::SeqCst);
                    Some(CommandOutput::success(""))
                }
                ["/getactivescheme"] => Some(CommandOutput::success(
                    if active_ultimate.load(Ordering::SeqCst) {
                        format!("Power Scheme GUID: {}  (Ultimate Performance)", ULTIMATE_GUID)
                    } else {
                        "Power Scheme GUID: 381b4222-f694-41f0-9685-ff5bb260df2e  (Balanced)".to_string()
                    },
                )),
                _ => None,
            }
        });
    }

    fn ctx<'a>(system: &'a MemorySystem, store: &'a ManagedStateStore) -> TweakContext<'a> {
        TweakContext {
            key: "ultimate_power_plan",
            system,
            store,
        }
    }

    #[test]
    fn test_find_scheme() {
        let list = "Power Scheme GUID: 381b4222-f694-41f0-9685-ff5bb260df2e  (Balanced) *\n\
                    Power Scheme GUID: 8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c  (High performance)";
        assert_eq!(
            find_scheme(list, &["high performance", "Ultimate Performance"]).as_deref(),
            Some("8c5e7fda-e8bf-4a96-9a85-a6e23a8c635c")
        );
        assert_eq!(find_scheme(list, &["Ultimate Performance"]), None);
    }

    #[test]
    fn test_ultimate_plan_duplicates_only_once() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        scripted_powercfg(&system);
        let plan = UltimatePowerPlan;

        assert_eq!(plan.probe(&ctx(&system, &store)).unwrap(), LiveState::Off);

        plan.apply(&ctx(&system, &store), true, &mut Report::default()).unwrap();
        plan.apply(&ctx(&system, &store), true, &mut Report::default()).unwrap();

        let duplicates = system
            .commands()
            .iter()
            .filter(|c| c.starts_with("powercfg /duplicatescheme"))
            .count();
        assert_eq!(duplicates, 1);
        assert_eq!(plan.probe(&ctx(&system, &store)).unwrap(), LiveState::On);
        assert!(system.commands().contains(&format!(
            "powercfg /setacvalueindex scheme_current {} {} 0",
            USB_SUBGROUP, USB_SELECTIVE_SUSPEND
        )));
    }

    #[test]
    fn test_power_hardcore_probe_reads_ac_index() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        system.on_command(|exe, args| {
            (exe == "powercfg" && args.first() == Some(&"/q")).then(|| {
                CommandOutput::success(
                    "    Minimum Possible Setting: 0x00000000\n\
                     Current AC Power Setting Index: 0x00000002\n\
                     Current DC Power Setting Index: 0x00000002",
                )
            })
        });
        assert_eq!(PowerHardcore.probe(&ctx(&system, &store)).unwrap(), LiveState::Off);

        system.on_command(|exe, args| {
            (exe == "powercfg" && args.first() == Some(&"/q")).then(|| {
                CommandOutput::success("Current AC Power Setting Index: 0x00000000")
            })
        });
        assert_eq!(PowerHardcore.probe(&ctx(&system, &store)).unwrap(), LiveState::On);
    }

    #[test]
    fn test_power_hardcore_revert_restores_idle() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        PowerHardcore
            .apply(&ctx(&system, &store), false, &mut Report::default())
            .unwrap();
        let commands = system.commands();
        assert!(commands.contains(&format!(
            "powercfg /setdcvalueindex scheme_current {} {} 2",
            IDLE_SUBGROUP, IDLE_DISABLE
        )));
        assert!(!commands.iter().any(|c| c.contains("/duplicatescheme")));
    }
}
