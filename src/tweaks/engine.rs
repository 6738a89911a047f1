// src/tweaks/engine.rs

use std::{fmt, sync::Arc};

use tracing::{debug, error, info, span, Level};

use super::{
    method::{Elevation, Report, TweakContext},
    Catalog, LiveState, CATALOG,
};
use crate::{
    errors::TweakResult, store::ManagedStateStore, system::SystemProbe, utils::unix_timestamp,
};

/// How an apply ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Applied,
    /// Nothing was written because the process is not elevated.
    AdminRequired,
    /// The method failed part-way; the message is also in the report body.
    Failed(String),
}

/// Text result of one apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleReport {
    pub key: String,
    pub enabled: bool,
    /// Unix seconds, UTC.
    pub time: u64,
    pub lines: Vec<String>,
    pub outcome: ToggleOutcome,
}

impl fmt::Display for ToggleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Tweak Toggle: {}", self.key)?;
        writeln!(f, "{}", "=".repeat(70))?;
        writeln!(f, "State: {}", if self.enabled { "ON" } else { "OFF" })?;
        writeln!(f, "Time: {} (UTC)", self.time)?;
        writeln!(f)?;
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Applies and probes catalog tweaks against one system.
pub struct TweakEngine {
    system: Arc<dyn SystemProbe>,
    store: Arc<ManagedStateStore>,
    catalog: &'static Catalog,
}

impl TweakEngine {
    pub fn new(system: Arc<dyn SystemProbe>, store: Arc<ManagedStateStore>) -> Self {
        Self::with_catalog(system, store, &CATALOG)
    }

    pub fn with_catalog(
        system: Arc<dyn SystemProbe>,
        store: Arc<ManagedStateStore>,
        catalog: &'static Catalog,
    ) -> Self {
        Self {
            system,
            store,
            catalog,
        }
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.catalog
    }

    pub fn system(&self) -> &Arc<dyn SystemProbe> {
        &self.system
    }

    pub fn store(&self) -> &Arc<ManagedStateStore> {
        &self.store
    }

    /// Drives the OS towards `enabled` for `key`.
    ///
    /// Only an unknown key is an error. Missing elevation and OS failures are
    /// reported in the returned [`ToggleReport`].
    pub fn apply(&self, key: &str, enabled: bool) -> TweakResult<ToggleReport> {
        let tweak = self.catalog.entry(key)?;
        let key = tweak.definition.key;
        let span = span!(Level::DEBUG, "apply", key);
        let _enter = span.enter();

        let ctx = TweakContext {
            key,
            system: self.system.as_ref(),
            store: self.store.as_ref(),
        };
        let mut report = Report::default();

        let outcome = match tweak.method.elevation() {
            Elevation::Required(notice) if !self.system.is_elevated() => {
                info!("{:?} needs elevation; nothing written", key);
                report.line(notice);
                ToggleOutcome::AdminRequired
            }
            _ => match tweak.method.apply(&ctx, enabled, &mut report) {
                Ok(()) => {
                    debug!("{:?} -> {}", key, enabled);
                    ToggleOutcome::Applied
                }
                Err(e) => {
                    error!("{:?} -> {} failed: {:#}", key, enabled, e);
                    report.line(format!("Toggle action failed: {:#}", e));
                    ToggleOutcome::Failed(format!("{:#}", e))
                }
            },
        };

        Ok(ToggleReport {
            key: key.to_string(),
            enabled,
            time: unix_timestamp(),
            lines: report.into_lines(),
            outcome,
        })
    }

    /// Reads the live state of `key`. Read failures become `Unknown`.
    pub fn probe(&self, key: &str) -> TweakResult<LiveState> {
        let tweak = self.catalog.entry(key)?;
        let ctx = TweakContext {
            key: tweak.definition.key,
            system: self.system.as_ref(),
            store: self.store.as_ref(),
        };

        Ok(match tweak.method.probe(&ctx) {
            Ok(state) => state,
            Err(e) => {
                debug!("{:?} probe failed: {:#}", tweak.definition.key, e);
                LiveState::Unknown
            }
        })
    }
}
