// src/tweaks/catalog.rs

use super::{
    command::{CommandProbe, CommandToggle},
    devices::{GpuMsiMode, NvidiaLatencyProfile, StartupCleanupAssist, TimerResolution},
    latency::LowLatencyMode,
    managed::Managed,
    network::{NetworkDriverOptimize, NetworkHardcore},
    power::{PowerHardcore, UltimatePowerPlan},
    registry::{RegistrySetting, RegistryToggle},
    services::{Quorum, ServicePause, ServiceToggle, ServiceTrim},
    Tweak, TweakCategory,
};
use crate::system::{Hive::*, StartMode};

/// Every supported tweak, in display order.
pub fn all_tweaks() -> Vec<Tweak> {
    vec![
        sensor_suite_off(),
        sticky_keys_guard(),
        telemetry_zero(),
        voice_activation_off(),
        webdav_scan_off(),
        whql_only(),
        wu_control(),
        wu_core_off(),
        amd_chill_off(),
        amd_power_hold(),
        amd_service_trim(),
        cloud_sync_off(),
        do_solo_mode(),
        process_count_reduction(),
        nudge_blocker(),
        low_latency_mode(),
        network_driver_optimize(),
        ultimate_power_plan(),
        memory_integrity_off(),
        gpu_msi_mode(),
        hpet_tune_off(),
        startup_cleanup_assist(),
        nvidia_latency_profile(),
        wu_tournament_mode(),
        sysmain_off(),
        search_indexing_off(),
        selective_background_services_off(),
        competitive_service_trim(),
        hardcore_service_trim(),
        network_hardcore_mode(),
        power_hardcore_mode(),
        timer_resolution_mode(),
        background_apps_off(),
        hibernation_off(),
        gamebar_overlay_off(),
        widgets_feed_off(),
        ads_id_off(),
        search_highlights_off(),
        remote_assistance_off(),
        fast_startup_off(),
        print_spooler_off(),
        smb1_off(),
    ]
}

pub fn sensor_suite_off() -> Tweak {
    Tweak::new(
        "sensor_suite_off",
        "Sensor Suite Off",
        "Disables sensor/location related services and reduces unnecessary polling during gaming.",
        TweakCategory::Services,
        ServiceToggle::new(&["SensorService", "lfsvc"], StartMode::Disabled, StartMode::Demand)
            .quorum(Quorum::AnyPresent)
            .message("Sensor services updated."),
    )
}

pub fn sticky_keys_guard() -> Tweak {
    Tweak::new(
        "sticky_keys_guard",
        "StickyKeys Guard",
        "Prevents accidental StickyKeys popups and focus steal while gaming.",
        TweakCategory::System,
        RegistryToggle::new(
            "StickyKeys flags updated.",
            vec![RegistrySetting::string(
                CurrentUser,
                r"Control Panel\Accessibility\StickyKeys",
                "Flags",
                "506",
                "510",
            )],
        ),
    )
}

pub fn telemetry_zero() -> Tweak {
    Tweak::new(
        "telemetry_zero",
        "Telemetry Zero",
        "Forces diagnostic telemetry to minimum policy when allowed.",
        TweakCategory::Privacy,
        RegistryToggle::new(
            "Telemetry policy updated.",
            vec![RegistrySetting::dword(
                LocalMachine,
                r"SOFTWARE\Policies\Microsoft\Windows\DataCollection",
                "AllowTelemetry",
                0,
                1,
            )],
        )
        .admin_notice("Admin required to edit telemetry policy under HKLM."),
    )
    .with_warning()
}

pub fn voice_activation_off() -> Tweak {
    Tweak::new(
        "voice_activation_off",
        "Voice Activation Off",
        "Disables voice activation listeners to reduce idle background activity.",
        TweakCategory::Privacy,
        RegistryToggle::new(
            "Voice activation settings updated.",
            vec![
                RegistrySetting::dword(
                    CurrentUser,
                    r"Software\Microsoft\Speech_OneCore\Settings\VoiceActivation",
                    "AgentActivationEnabled",
                    0,
                    1,
                ),
                RegistrySetting::dword(
                    CurrentUser,
                    r"Software\Microsoft\Speech_OneCore\Settings\VoiceActivation\UserPreferenceForAllApps",
                    "AgentActivationOnLockScreenEnabled",
                    0,
                    1,
                )
                .write_only(),
            ],
        ),
    )
}

pub fn webdav_scan_off() -> Tweak {
    Tweak::new(
        "webdav_scan_off",
        "WebDAV Scan Off",
        "Stops WebClient polling to reduce remote scan wakeups.",
        TweakCategory::Services,
        ServiceToggle::new(&["WebClient"], StartMode::Disabled, StartMode::Demand)
            .message("WebClient startup updated.")
            .admin_notice("Admin required to change WebClient service startup."),
    )
}

pub fn whql_only() -> Tweak {
    Tweak::new(
        "whql_only",
        "WHQL Only",
        "Reports driver status and enforces safer certified-driver workflow.",
        TweakCategory::System,
        RegistryToggle::new(
            "Driver search policy updated.",
            vec![RegistrySetting::dword(
                LocalMachine,
                r"SOFTWARE\Microsoft\Windows\CurrentVersion\DriverSearching",
                "SearchOrderConfig",
                0,
                1,
            )],
        ),
    )
}

pub fn wu_control() -> Tweak {
    Tweak::new(
        "wu_control",
        "WU Control",
        "Shows Windows Update state and allows safer scheduling strategy.",
        TweakCategory::Services,
        RegistryToggle::new(
            "Windows Update auto-update policy updated.",
            vec![RegistrySetting::dword(
                LocalMachine,
                r"SOFTWARE\Policies\Microsoft\Windows\WindowsUpdate\AU",
                "NoAutoUpdate",
                1,
                0,
            )],
        ),
    )
    .with_warning()
}

pub fn wu_core_off() -> Tweak {
    Tweak::new(
        "wu_core_off",
        "WU Core Off",
        "Attempts to pause core Windows Update services (admin required).",
        TweakCategory::Services,
        ServiceToggle::new(
            &["wuauserv", "UsoSvc", "WaaSMedicSvc"],
            StartMode::Disabled,
            StartMode::Demand,
        )
        .message("Windows Update services updated.")
        .admin_notice("Admin required to control Windows Update services."),
    )
    .with_warning()
}

pub fn amd_chill_off() -> Tweak {
    Tweak::new(
        "amd_chill_off",
        "AMD Chill Off",
        "Disables Radeon Chill and related frame pacing power-saver behavior.",
        TweakCategory::Services,
        Managed(ServiceTrim::amd()),
    )
}

pub fn amd_power_hold() -> Tweak {
    Tweak::new(
        "amd_power_hold",
        "AMD Power Hold",
        "Keeps steadier GPU clocks under sustained load.",
        TweakCategory::Services,
        Managed(ServiceTrim::amd()),
    )
    .with_warning()
}

pub fn amd_service_trim() -> Tweak {
    Tweak::new(
        "amd_service_trim",
        "AMD Service Trim",
        "Cuts non-essential AMD background services.",
        TweakCategory::Services,
        Managed(ServiceTrim::amd()),
    )
}

pub fn cloud_sync_off() -> Tweak {
    Tweak::new(
        "cloud_sync_off",
        "Cloud Sync Off",
        "Disables settings sync across devices to reduce background churn.",
        TweakCategory::Privacy,
        RegistryToggle::new(
            "Cloud sync policy updated.",
            vec![RegistrySetting::dword(
                CurrentUser,
                r"Software\Microsoft\Windows\CurrentVersion\SettingSync",
                "SyncPolicy",
                5,
                0,
            )],
        ),
    )
}

pub fn do_solo_mode() -> Tweak {
    Tweak::new(
        "do_solo_mode",
        "DO Solo Mode",
        "Forces Delivery Optimization to Microsoft-only download mode.",
        TweakCategory::Network,
        RegistryToggle::new(
            "Delivery Optimization mode updated.",
            vec![RegistrySetting::dword(
                LocalMachine,
                r"SOFTWARE\Policies\Microsoft\Windows\DeliveryOptimization",
                "DODownloadMode",
                0,
                1,
            )],
        ),
    )
}

pub fn process_count_reduction() -> Tweak {
    Tweak::new(
        "process_count_reduction",
        "Process Count Reduction",
        "Consolidates service host process count to reduce background process load.",
        TweakCategory::System,
        RegistryToggle::new(
            "Process count reduction policy updated.",
            vec![RegistrySetting::dword(
                LocalMachine,
                r"SYSTEM\CurrentControlSet\Control",
                "SvcHostSplitThresholdInKB",
                3_670_016,
                0,
            )],
        ),
    )
    .with_warning()
}

pub fn nudge_blocker() -> Tweak {
    Tweak::new(
        "nudge_blocker",
        "Nudge Blocker",
        "Reduces notifications and feedback prompts during sessions.",
        TweakCategory::Privacy,
        RegistryToggle::new(
            "Nudges and prompts policy updated.",
            vec![
                RegistrySetting::dword(
                    CurrentUser,
                    r"Software\Microsoft\Windows\CurrentVersion\UserProfileEngagement",
                    "ScoobeSystemSettingEnabled",
                    0,
                    1,
                ),
                RegistrySetting::dword(
                    CurrentUser,
                    r"Software\Microsoft\Siuf\Rules",
                    "NumberOfSIUFInPeriod",
                    0,
                    1,
                )
                .write_only(),
                RegistrySetting::dword(
                    CurrentUser,
                    r"Software\Microsoft\Windows\CurrentVersion\ContentDeliveryManager",
                    "SubscribedContent-338389Enabled",
                    0,
                    1,
                )
                .write_only(),
            ],
        ),
    )
}

pub fn low_latency_mode() -> Tweak {
    Tweak::new(
        "low_latency_mode",
        "Low Latency Mode",
        "Applies scheduler, network throttling, and DVR-related settings to reduce system-side input and frame delay.",
        TweakCategory::Latency,
        LowLatencyMode,
    )
    .with_warning()
}

pub fn network_driver_optimize() -> Tweak {
    Tweak::new(
        "network_driver_optimize",
        "Network Driver Optimize",
        "Disables common NIC power-saving/latency features and applies gaming-friendly network adapter settings.",
        TweakCategory::Network,
        Managed(NetworkDriverOptimize),
    )
    .with_warning()
    .with_restart()
}

pub fn ultimate_power_plan() -> Tweak {
    Tweak::new(
        "ultimate_power_plan",
        "Ultimate Power Plan",
        "Enables Ultimate Performance, sets minimum CPU state to 100%, and disables USB selective suspend.",
        TweakCategory::Power,
        UltimatePowerPlan,
    )
    .with_warning()
}

pub fn memory_integrity_off() -> Tweak {
    Tweak::new(
        "memory_integrity_off",
        "Memory Integrity Off",
        "Turns off Core Isolation Memory Integrity (security tradeoff).",
        TweakCategory::System,
        RegistryToggle::new(
            "Memory Integrity setting updated. Restart required.",
            vec![RegistrySetting::dword(
                LocalMachine,
                r"SYSTEM\CurrentControlSet\Control\DeviceGuard\Scenarios\HypervisorEnforcedCodeIntegrity",
                "Enabled",
                0,
                1,
            )],
        ),
    )
    .with_warning()
    .with_restart()
}

pub fn gpu_msi_mode() -> Tweak {
    Tweak::new(
        "gpu_msi_mode",
        "GPU MSI Mode",
        "Enables MSI interrupt mode for detected PCI GPUs (advanced).",
        TweakCategory::Latency,
        GpuMsiMode,
    )
    .with_warning()
    .with_restart()
}

pub fn hpet_tune_off() -> Tweak {
    Tweak::new(
        "hpet_tune_off",
        "HPET Tune Off",
        "Disables forced platform clock usage via boot config (hardware-dependent).",
        TweakCategory::Latency,
        CommandToggle {
            exe: "bcdedit",
            enable_args: &["/deletevalue", "useplatformclock"],
            disable_args: &["/set", "useplatformclock", "true"],
            message: Some("HPET/clock policy updated. Restart required."),
            probe: CommandProbe::PlatformClockReleased,
        },
    )
    .with_warning()
    .with_restart()
}

pub fn startup_cleanup_assist() -> Tweak {
    Tweak::new(
        "startup_cleanup_assist",
        "Startup Cleanup Assist",
        "Opens startup app controls and records managed state for clean boot workflow.",
        TweakCategory::System,
        Managed(StartupCleanupAssist),
    )
}

pub fn nvidia_latency_profile() -> Tweak {
    Tweak::new(
        "nvidia_latency_profile",
        "NVIDIA Latency Profile",
        "Applies available NVIDIA CLI settings and opens guidance for low-latency control panel values.",
        TweakCategory::Latency,
        Managed(NvidiaLatencyProfile),
    )
    .with_warning()
}

pub fn wu_tournament_mode() -> Tweak {
    Tweak::new(
        "wu_tournament_mode",
        "WU Tournament Mode",
        "Stops the Windows Update service for the current session without changing its startup type.",
        TweakCategory::Services,
        ServicePause {
            service: "wuauserv",
            message: "Windows Update service toggled temporarily.",
        },
    )
}

pub fn sysmain_off() -> Tweak {
    Tweak::new(
        "sysmain_off",
        "SysMain Off",
        "Disables SysMain prefetching and stops the service.",
        TweakCategory::Services,
        ServiceToggle::new(&["SysMain"], StartMode::Disabled, StartMode::Auto)
            .control_running()
            .message("SysMain startup updated."),
    )
}

pub fn search_indexing_off() -> Tweak {
    Tweak::new(
        "search_indexing_off",
        "Search Indexing Off",
        "Disables Windows Search indexing and stops the indexer.",
        TweakCategory::Services,
        ServiceToggle::new(&["WSearch"], StartMode::Disabled, StartMode::Auto)
            .control_running()
            .message("Windows Search startup updated."),
    )
}

pub fn selective_background_services_off() -> Tweak {
    Tweak::new(
        "selective_background_services_off",
        "Selective Background Services Off",
        "Disables Xbox accessory, fax and print services and closes OneDrive and Phone Link.",
        TweakCategory::Services,
        Managed(ServiceTrim::selective_background()),
    )
}

pub fn competitive_service_trim() -> Tweak {
    Tweak::new(
        "competitive_service_trim",
        "Competitive Service Trim",
        "Disables a curated set of optional services; turning it off restores their default startup.",
        TweakCategory::Services,
        Managed(ServiceTrim::competitive(false)),
    )
    .with_warning()
}

pub fn hardcore_service_trim() -> Tweak {
    Tweak::new(
        "hardcore_service_trim",
        "Hardcore Service Trim",
        "Competitive trim plus notifications, printing, SysMain and search indexing.",
        TweakCategory::Services,
        Managed(ServiceTrim::competitive(true)),
    )
    .with_warning()
}

pub fn network_hardcore_mode() -> Tweak {
    Tweak::new(
        "network_hardcore_mode",
        "Network Hardcore Mode",
        "Applies adapter optimizations and resets Winsock, TCP/IP and DNS state.",
        TweakCategory::Network,
        Managed(NetworkHardcore),
    )
    .with_warning()
    .with_restart()
}

pub fn power_hardcore_mode() -> Tweak {
    Tweak::new(
        "power_hardcore_mode",
        "Power Hardcore Mode",
        "Ultimate Performance plus disabled processor idle states.",
        TweakCategory::Power,
        PowerHardcore,
    )
    .with_warning()
}

pub fn timer_resolution_mode() -> Tweak {
    Tweak::new(
        "timer_resolution_mode",
        "Timer Resolution Mode",
        "Requests a 0.5 ms system timer resolution while the app is running.",
        TweakCategory::Latency,
        Managed(TimerResolution),
    )
}

pub fn background_apps_off() -> Tweak {
    Tweak::new(
        "background_apps_off",
        "Background Apps Off",
        "Blocks Store apps from running in the background.",
        TweakCategory::Privacy,
        RegistryToggle::new(
            "Background apps permission policy updated.",
            vec![RegistrySetting::dword(
                CurrentUser,
                r"Software\Microsoft\Windows\CurrentVersion\BackgroundAccessApplications",
                "GlobalUserDisabled",
                1,
                0,
            )],
        ),
    )
}

pub fn hibernation_off() -> Tweak {
    Tweak::new(
        "hibernation_off",
        "Hibernation Off",
        "Disables hibernation to reduce disk footprint and hiberfile writes.",
        TweakCategory::Power,
        CommandToggle {
            exe: "powercfg",
            enable_args: &["/hibernate", "off"],
            disable_args: &["/hibernate", "on"],
            message: None,
            probe: CommandProbe::HibernateUnavailable,
        },
    )
}

pub fn gamebar_overlay_off() -> Tweak {
    Tweak::new(
        "gamebar_overlay_off",
        "GameBar Overlay Off",
        "Disables Xbox Game Bar overlays and capture background activity.",
        TweakCategory::Latency,
        RegistryToggle::new(
            "Game Bar / DVR overlay settings updated.",
            vec![
                RegistrySetting::dword(CurrentUser, r"Software\Microsoft\GameBar", "ShowStartupPanel", 0, 1)
                    .write_only(),
                RegistrySetting::dword(
                    CurrentUser,
                    r"SOFTWARE\Microsoft\Windows\CurrentVersion\GameDVR",
                    "AppCaptureEnabled",
                    0,
                    1,
                ),
                RegistrySetting::dword(CurrentUser, r"System\GameConfigStore", "GameDVR_Enabled", 0, 1)
                    .write_only(),
            ],
        ),
    )
}

pub fn widgets_feed_off() -> Tweak {
    Tweak::new(
        "widgets_feed_off",
        "Widgets Feed Off",
        "Turns off widgets feed and taskbar widget integration.",
        TweakCategory::Privacy,
        RegistryToggle::new(
            "Widgets feed setting updated.",
            vec![RegistrySetting::dword(
                CurrentUser,
                r"Software\Microsoft\Windows\CurrentVersion\Explorer\Advanced",
                "TaskbarDa",
                0,
                1,
            )],
        ),
    )
}

pub fn ads_id_off() -> Tweak {
    Tweak::new(
        "ads_id_off",
        "Ads ID Off",
        "Disables advertising ID and personalized ad tracking.",
        TweakCategory::Privacy,
        RegistryToggle::new(
            "Advertising ID setting updated.",
            vec![RegistrySetting::dword(
                CurrentUser,
                r"Software\Microsoft\Windows\CurrentVersion\AdvertisingInfo",
                "Enabled",
                0,
                1,
            )],
        ),
    )
    .with_warning()
}

pub fn search_highlights_off() -> Tweak {
    Tweak::new(
        "search_highlights_off",
        "Search Highlights Off",
        "Disables search highlights and web suggestions in search.",
        TweakCategory::Privacy,
        RegistryToggle::new(
            "Search highlights setting updated.",
            vec![RegistrySetting::dword(
                CurrentUser,
                r"Software\Microsoft\Windows\CurrentVersion\SearchSettings",
                "IsDynamicSearchBoxEnabled",
                0,
                1,
            )],
        ),
    )
}

pub fn remote_assistance_off() -> Tweak {
    Tweak::new(
        "remote_assistance_off",
        "Remote Assistance Off",
        "Disables Remote Assistance to reduce remote exposure.",
        TweakCategory::Privacy,
        RegistryToggle::new(
            "Remote Assistance policy updated.",
            vec![RegistrySetting::dword(
                LocalMachine,
                r"SYSTEM\CurrentControlSet\Control\Remote Assistance",
                "fAllowToGetHelp",
                0,
                1,
            )],
        ),
    )
    .with_warning()
}

pub fn fast_startup_off() -> Tweak {
    Tweak::new(
        "fast_startup_off",
        "Fast Startup Off",
        "Disables fast startup for cleaner full shutdown behavior.",
        TweakCategory::Power,
        RegistryToggle::new(
            "Fast Startup setting updated.",
            vec![RegistrySetting::dword(
                LocalMachine,
                r"SYSTEM\CurrentControlSet\Control\Session Manager\Power",
                "HiberbootEnabled",
                0,
                1,
            )],
        ),
    )
    .with_restart()
}

pub fn print_spooler_off() -> Tweak {
    Tweak::new(
        "print_spooler_off",
        "Print Spooler Off",
        "Disables Print Spooler service on systems without printers.",
        TweakCategory::Services,
        ServiceToggle::new(&["Spooler"], StartMode::Disabled, StartMode::Auto)
            .message("Print Spooler startup updated."),
    )
    .with_warning()
}

pub fn smb1_off() -> Tweak {
    Tweak::new(
        "smb1_off",
        "SMB1 Off",
        "Disables legacy SMB1 protocol support for stronger security.",
        TweakCategory::Network,
        CommandToggle {
            exe: "dism.exe",
            enable_args: &["/online", "/disable-feature", "/featurename:SMB1Protocol", "/NoRestart"],
            disable_args: &["/online", "/enable-feature", "/featurename:SMB1Protocol", "/NoRestart"],
            message: None,
            probe: CommandProbe::Registry(RegistrySetting::dword(
                LocalMachine,
                r"SYSTEM\CurrentControlSet\Services\LanmanServer\Parameters",
                "SMB1",
                0,
                1,
            )),
        },
    )
    .with_warning()
    .with_restart()
}
