// src/tweaks/network.rs

use anyhow::Result;

use super::{
    managed::ManagedAction,
    method::{run_step, Elevation, Report, TweakContext},
};

/// PowerShell that switches NIC power saving, interrupt moderation, EEE and
/// link speed on every physical adapter. Each property is best effort.
pub fn adapter_script(enable: bool) -> String {
    let power = if enable { "Disabled" } else { "Enabled" };
    let moderation = if enable { "Disabled" } else { "Enabled" };
    let eee = if enable { "Off" } else { "On" };
    let speed = if enable {
        "1.0 Gbps Full Duplex"
    } else {
        "Auto Negotiation"
    };

    [
        "$adapters = Get-NetAdapter -Physical -ErrorAction SilentlyContinue;".to_string(),
        "foreach ($a in $adapters) {".to_string(),
        format!("try {{ Set-NetAdapterPowerManagement -Name $a.Name -AllowComputerToTurnOffDevice {power} -ErrorAction Stop }} catch {{ }};"),
        format!("try {{ Set-NetAdapterAdvancedProperty -Name $a.Name -DisplayName 'Interrupt Moderation' -DisplayValue '{moderation}' -NoRestart -ErrorAction Stop }} catch {{ }};"),
        format!("try {{ Set-NetAdapterAdvancedProperty -Name $a.Name -DisplayName 'Energy-Efficient Ethernet' -DisplayValue '{eee}' -NoRestart -ErrorAction Stop }} catch {{ }};"),
        format!("try {{ Set-NetAdapterAdvancedProperty -Name $a.Name -DisplayName 'Speed & Duplex' -DisplayValue '{speed}' -NoRestart -ErrorAction Stop }} catch {{ }};"),
        "}".to_string(),
    ]
    .concat()
}

fn optimize_adapters(ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) {
    let script = adapter_script(enabled);
    let args = [
        "-NoProfile",
        "-ExecutionPolicy",
        "Bypass",
        "-Command",
        script.as_str(),
    ];
    match ctx.system.run("powershell.exe", &args) {
        Ok(output) if output.exit_code == 0 && output.combined().is_empty() => {
            report.line("Network driver optimization command completed.")
        }
        Ok(output) => report.command(&output),
        Err(e) => report.line(format!("Network driver optimization could not run: {:#}", e)),
    }
}

/// Adapter-level latency settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkDriverOptimize;

impl ManagedAction for NetworkDriverOptimize {
    fn elevation(&self) -> Elevation {
        Elevation::Required("Admin required for network driver optimization.")
    }

    fn run(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        optimize_adapters(ctx, enabled, report);
        report.line("Restart required to fully apply NIC driver-level changes.");
        Ok(())
    }
}

/// Adapter settings plus a full stack reset when enabling.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkHardcore;

const RESET_SEQUENCE: &[(&str, &[&str])] = &[
    ("netsh", &["winsock", "reset"]),
    ("netsh", &["int", "ip", "reset"]),
    ("ipconfig", &["/flushdns"]),
    ("ipconfig", &["/release"]),
    ("ipconfig", &["/renew"]),
];

impl ManagedAction for NetworkHardcore {
    fn elevation(&self) -> Elevation {
        Elevation::Required("Admin required for network driver optimization.")
    }

    fn run(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        optimize_adapters(ctx, enabled, report);
        if enabled {
            for (exe, args) in RESET_SEQUENCE {
                run_step(ctx.system, report, exe, args);
            }
            report.line("Network hardcore sequence applied. Restart recommended.");
        } else {
            report.line(
                "Network hardcore disabled. Adapter settings returned to safer defaults where supported.",
            );
        }
        Ok(())
    }
}
