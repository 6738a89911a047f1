// src/utils/command.rs

use std::{
    path::Path,
    process::{Command, Stdio},
};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::system::CommandOutput;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

static ENV_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"%([A-Za-z0-9_()]+)%").unwrap());

/// Runs an executable with a hidden console window and captures its output.
///
/// Returns `Err` only when the process could not be started.
pub fn run_process(exe: &str, args: &[&str]) -> Result<CommandOutput> {
    let mut command = Command::new(expand_env_vars(exe));
    command.args(args);

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    let output = command
        .output()
        .with_context(|| format!("Failed to start '{}'", exe))?;

    let result = CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };
    tracing::debug!("{} {:?} -> exit {}", exe, args, result.exit_code);
    Ok(result)
}

/// Starts an executable detached from our stdio and returns as soon as it is
/// running.
pub fn spawn_process(exe: &str, args: &[&str]) -> Result<()> {
    let mut command = Command::new(expand_env_vars(exe));
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.creation_flags(CREATE_NO_WINDOW);
    }

    let child = command
        .spawn()
        .with_context(|| format!("Failed to start '{}'", exe))?;
    tracing::debug!("{} {:?} started as pid {}", exe, args, child.id());
    Ok(())
}

/// Runs a PowerShell snippet non-interactively.
pub fn run_powershell(script: &str) -> Result<CommandOutput> {
    run_process(
        "powershell.exe",
        &[
            "-NoProfile",
            "-ExecutionPolicy",
            "Bypass",
            "-Command",
            script,
        ],
    )
}

/// Expands `%NAME%` references; unknown variables are left untouched.
pub fn expand_env_vars(input: &str) -> String {
    ENV_VAR
        .replace_all(input, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

pub fn program_exists(path: &str) -> bool {
    Path::new(&expand_env_vars(path)).is_file()
}
