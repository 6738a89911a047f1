// src/tweaks/method.rs

use anyhow::Result;
use tracing::warn;

use super::LiveState;
use crate::{
    store::ManagedStateStore,
    system::{CommandOutput, SystemProbe},
};

/// Everything a method may touch while applying or probing one tweak.
pub struct TweakContext<'a> {
    /// Catalog key of the tweak being handled.
    pub key: &'a str,
    pub system: &'a dyn SystemProbe,
    pub store: &'a ManagedStateStore,
}

/// Whether a method must run elevated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Elevation {
    NotRequired,
    /// Carries the notice shown when the process is not elevated.
    Required(&'static str),
}

/// Body lines of a toggle report, in the order the steps ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    lines: Vec<String>,
}

impl Report {
    pub fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Records the one-line rendering of a command result.
    pub fn command(&mut self, output: &CommandOutput) {
        self.lines.push(output.to_string());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

/// Outcome of comparing one OS value against the tweak's "enabled" value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Match,
    Mismatch,
    Absent,
}

impl Signal {
    pub fn compare<T: PartialEq>(actual: Option<T>, expected: T) -> Self {
        match actual {
            Some(value) if value == expected => Signal::Match,
            Some(_) => Signal::Mismatch,
            None => Signal::Absent,
        }
    }
}

/// Folds probe signals into a live state.
///
/// A lone signal maps directly, with an absent value reading as `Unknown`.
/// With several signals every one must match for `On`; anything else,
/// absent values included, is `Off`.
pub fn combine_signals(signals: &[Signal]) -> LiveState {
    match signals {
        [] => LiveState::Unknown,
        [Signal::Match] => LiveState::On,
        [Signal::Mismatch] => LiveState::Off,
        [Signal::Absent] => LiveState::Unknown,
        many => LiveState::from_bool(many.iter().all(|s| *s == Signal::Match)),
    }
}

/// Runs an external command as one independent sub-step.
///
/// A process that cannot be started is recorded in the report instead of
/// aborting the remaining steps.
pub fn run_step(
    system: &dyn SystemProbe,
    report: &mut Report,
    exe: &str,
    args: &[&str],
) -> Option<CommandOutput> {
    match system.run(exe, args) {
        Ok(output) => {
            report.command(&output);
            Some(output)
        }
        Err(e) => {
            warn!("{} {:?} could not run: {:#}", exe, args, e);
            report.line(format!("{}: {:#}", exe, e));
            None
        }
    }
}

/// Strategy that applies and probes one tweak.
pub trait TweakMethod: Send + Sync {
    fn elevation(&self) -> Elevation {
        Elevation::NotRequired
    }

    /// Drives the OS towards `enabled`, appending progress to `report`.
    ///
    /// Only called once the elevation requirement is satisfied.
    fn apply(&self, ctx: &TweakContext<'_>, enabled: bool, report: &mut Report) -> Result<()>;

    /// Reads the live state. Must not mutate anything.
    fn probe(&self, ctx: &TweakContext<'_>) -> Result<LiveState>;
}
