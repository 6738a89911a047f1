// src/utils/windows.rs

use anyhow::Result;
use windows::Win32::{
    Foundation::{CloseHandle, HANDLE},
    Security::{GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY},
    System::Threading::{GetCurrentProcess, OpenProcessToken},
};

/// 0.5 ms, in 100 ns units.
const TIMER_RESOLUTION_100NS: u32 = 5_000;

#[link(name = "ntdll")]
extern "system" {
    fn NtSetTimerResolution(
        desired_resolution: u32,
        set_resolution: u8,
        current_resolution: *mut u32,
    ) -> i32;
}

/// Checks if the current process is running with elevated (administrator) privileges.
pub fn is_elevated() -> bool {
    let mut handle = HANDLE::default();
    if unsafe { OpenProcessToken(GetCurrentProcess(), TOKEN_QUERY, &mut handle).is_err() } {
        return false;
    }

    let mut elevation = TOKEN_ELEVATION::default();
    let size = std::mem::size_of::<TOKEN_ELEVATION>() as u32;
    let mut ret_size = size;
    let queried = unsafe {
        GetTokenInformation(
            handle,
            TokenElevation,
            Some(&mut elevation as *mut _ as *mut _),
            size,
            &mut ret_size,
        )
        .is_ok()
    };

    if unsafe { CloseHandle(handle).is_err() } {
        return false;
    }

    queried && elevation.TokenIsElevated != 0
}

/// Requests or releases a 0.5 ms timer resolution for this process.
pub fn set_timer_resolution(enabled: bool) -> Result<()> {
    let mut current = 0u32;
    let status = unsafe {
        NtSetTimerResolution(TIMER_RESOLUTION_100NS, u8::from(enabled), &mut current)
    };
    if status != 0 {
        anyhow::bail!("NtSetTimerResolution failed with status {:#010x}", status);
    }
    tracing::debug!(
        "Timer resolution {} (current {} x 100ns)",
        if enabled { "requested" } else { "released" },
        current
    );
    Ok(())
}
