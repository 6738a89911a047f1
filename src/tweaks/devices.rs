// src/tweaks/devices.rs

use anyhow::{Context, Result};
use tracing::debug;

use super::{
    command::launch,
    managed::ManagedAction,
    method::{run_step, Elevation, Report, TweakContext, TweakMethod},
    LiveState,
};
use crate::system::{Hive, SystemProbe};

pub const NVIDIA_SMI: &str = r"%ProgramFiles%\NVIDIA Corporation\NVSMI\nvidia-smi.exe";

const MSI_VALUE: &str = "MSISupported";

fn msi_key(pnp_device_id: &str) -> String {
    format!(
        r"SYSTEM\CurrentControlSet\Enum\{}\Device Parameters\Interrupt Management\MessageSignaledInterruptProperties",
        pnp_device_id
    )
}

/// PNP ids of display adapters sitting on the PCI bus.
fn pci_gpus(system: &dyn SystemProbe) -> Result<Vec<String>> {
    Ok(system
        .query_inventory("Win32_VideoController", "PNPDeviceID")?
        .into_iter()
        .filter(|id| id.to_ascii_uppercase().starts_with("PCI\\"))
        .collect())
}

/// Message-signaled interrupts for every PCI GPU.
#[derive(Debug, Clone, Copy, Default)]
pub struct GpuMsiMode;

impl TweakMethod for GpuMsiMode {
    fn elevation(&self) -> Elevation {
        Elevation::Required("Admin required.")
    }

    fn apply(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        let gpus = pci_gpus(ctx.system).context("GPU MSI operation failed")?;
        for gpu in &gpus {
            debug!("{:?} -> MSISupported={}", gpu, enabled);
            ctx.system
                .write_dword(Hive::LocalMachine, &msi_key(gpu), MSI_VALUE, u32::from(enabled))
                .context("GPU MSI operation failed")?;
        }

        if gpus.is_empty() {
            report.line("No compatible PCI GPU registry path found.");
        } else {
            report.line(format!(
                "GPU MSI mode updated for {} device(s). Restart required.",
                gpus.len()
            ));
        }
        Ok(())
    }

    /// A GPU without the value runs line-based interrupts, so it reads as off.
    fn probe(&self, ctx: &TweakContext<'_>) -> Result<LiveState> {
        let gpus = pci_gpus(ctx.system)?;
        if gpus.is_empty() {
            return Ok(LiveState::Unknown);
        }
        for gpu in &gpus {
            if ctx.system.read_dword(Hive::LocalMachine, &msi_key(gpu), MSI_VALUE)? != Some(1) {
                return Ok(LiveState::Off);
            }
        }
        Ok(LiveState::On)
    }
}

/// Persistence mode through `nvidia-smi` plus control panel guidance.
#[derive(Debug, Clone, Copy, Default)]
pub struct NvidiaLatencyProfile;

impl ManagedAction for NvidiaLatencyProfile {
    fn run(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        if ctx.system.program_exists(NVIDIA_SMI) {
            run_step(ctx.system, report, NVIDIA_SMI, &["-pm", if enabled { "1" } else { "0" }]);
        } else {
            report.line("nvidia-smi not found; applied guidance only.");
        }

        launch(ctx.system, "nvcplui.exe", &[]);
        report.line(
            "Open NVIDIA Control Panel and set: Low Latency Mode=On/Ultra, Power Management=Prefer Maximum Performance, Shader Cache=On, V-Sync=Off.",
        );
        Ok(())
    }
}

/// Opens the Startup Apps page for manual cleanup.
#[derive(Debug, Clone, Copy, Default)]
pub struct StartupCleanupAssist;

impl ManagedAction for StartupCleanupAssist {
    fn run(&self, ctx: &TweakContext<'_>, _enabled: bool, report: &mut Report) -> Result<()> {
        launch(ctx.system, "explorer.exe", &["ms-settings:startupapps"]);
        report.line("Opened Startup Apps settings for manual cleanup.");
        Ok(())
    }
}

/// 0.5 ms timer resolution held for the lifetime of the app.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerResolution;

impl ManagedAction for TimerResolution {
    fn run(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()> {
        if enabled {
            ctx.system
                .set_timer_resolution(true)
                .context("Failed to request timer resolution")?;
            report.line("High timer resolution requested (0.5 ms).");
        } else {
            ctx.system.set_timer_resolution(false)?;
            report.line("Timer resolution request released.");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::ManagedStateStore, system::MemorySystem};

    const GPU: &str = r"PCI\VEN_10DE&DEV_2684&SUBSYS_16F310DE&REV_A1\4&2D4F6C2&0&0008";

    fn context<'a>(system: &'a MemorySystem, store: &'a ManagedStateStore) -> TweakContext<'a> {
        TweakContext {
            key: "gpu_msi_mode",
            system,
            store,
        }
    }

    #[test]
    fn test_msi_without_gpus() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        system.set_inventory("Win32_VideoController", "PNPDeviceID", &[r"ROOT\BasicDisplay\0000"]);

        assert_eq!(GpuMsiMode.probe(&context(&system, &store)).unwrap(), LiveState::Unknown);

        let mut report = Report::default();
        GpuMsiMode.apply(&context(&system, &store), true, &mut report).unwrap();
        assert_eq!(report.lines(), ["No compatible PCI GPU registry path found."]);
        assert_eq!(system.writes_under(Hive::LocalMachine), 0);
    }

    #[test]
    fn test_msi_round_trip() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        system.set_inventory("Win32_VideoController", "PNPDeviceID", &[GPU]);

        assert_eq!(GpuMsiMode.probe(&context(&system, &store)).unwrap(), LiveState::Off);
        GpuMsiMode.apply(&context(&system, &store), true, &mut Report::default()).unwrap();
        assert_eq!(system.dword(Hive::LocalMachine, &msi_key(GPU), MSI_VALUE), Some(1));
        assert_eq!(GpuMsiMode.probe(&context(&system, &store)).unwrap(), LiveState::On);
    }

    #[test]
    fn test_nvidia_profile_without_smi() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        let mut report = Report::default();
        NvidiaLatencyProfile
            .run(&context(&system, &store), true, &mut report)
            .unwrap();
        assert_eq!(report.lines()[0], "nvidia-smi not found; applied guidance only.");
        assert!(system.commands().is_empty());
        assert_eq!(system.spawned(), ["nvcplui.exe"]);
    }

    #[test]
    fn test_nvidia_profile_with_smi() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        system.install_program(NVIDIA_SMI);
        NvidiaLatencyProfile
            .run(&context(&system, &store), false, &mut Report::default())
            .unwrap();
        assert_eq!(system.commands(), [format!("{} -pm 0", NVIDIA_SMI)]);
    }

    #[test]
    fn test_timer_resolution_toggles() {
        let system = MemorySystem::new();
        let store = ManagedStateStore::new("unused.json");
        TimerResolution.run(&context(&system, &store), true, &mut Report::default()).unwrap();
        assert!(system.timer_resolution_active());
        TimerResolution.run(&context(&system, &store), false, &mut Report::default()).unwrap();
        assert!(!system.timer_resolution_active());
    }
}
