// src/reconcile.rs

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use tracing::{debug, warn};

use crate::tweaks::{LiveState, TweakEngine};

/// Whether a pass was asked for by the user or by a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// Surfaces a drift summary.
    Interactive,
    Background,
}

/// Probe results of one completed pass, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResults {
    pub mode: ReconcileMode,
    pub states: Vec<(&'static str, LiveState)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Another pass was already in flight; nothing was probed.
    Skipped,
    Completed(ProbeResults),
}

/// Held for the duration of a pass; releases the in-flight flag on drop.
#[derive(Debug)]
pub struct PassToken {
    in_flight: Arc<AtomicBool>,
}

impl Drop for PassToken {
    fn drop(&mut self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

/// Runs reconciliation passes, at most one at a time.
#[derive(Clone)]
pub struct Reconciler {
    engine: Arc<TweakEngine>,
    in_flight: Arc<AtomicBool>,
}

impl Reconciler {
    pub fn new(engine: Arc<TweakEngine>) -> Self {
        Self {
            engine,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Claims the pass slot, or `None` when a pass is already running.
    pub fn try_begin(&self) -> Option<PassToken> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| PassToken {
                in_flight: Arc::clone(&self.in_flight),
            })
    }

    /// Probes every catalog entry concurrently.
    pub fn run(&self, mode: ReconcileMode) -> ReconcileOutcome {
        let Some(_token) = self.try_begin() else {
            debug!("Reconcile pass already in flight; dropping {:?} request", mode);
            return ReconcileOutcome::Skipped;
        };
        ReconcileOutcome::Completed(self.probe_all(mode))
    }

    fn probe_all(&self, mode: ReconcileMode) -> ProbeResults {
        let keys: Vec<&'static str> = self.engine.catalog().list().map(|d| d.key).collect();
        let engine = self.engine.as_ref();

        let states = thread::scope(|scope| {
            let handles: Vec<_> = keys
                .iter()
                .map(|&key| scope.spawn(move || (key, engine.probe(key))))
                .collect();

            handles
                .into_iter()
                .zip(&keys)
                .map(|(handle, &key)| match handle.join() {
                    Ok((key, Ok(state))) => (key, state),
                    Ok((key, Err(e))) => {
                        warn!("Probe of {:?} failed: {}", key, e);
                        (key, LiveState::Unknown)
                    }
                    Err(_) => {
                        warn!("Probe of {:?} panicked", key);
                        (key, LiveState::Unknown)
                    }
                })
                .collect()
        });

        ProbeResults { mode, states }
    }
}

/// `Re-apply available for: a, b, c (+N more)`, or `None` without drift.
pub fn drift_summary(titles: &[&str], limit: usize) -> Option<String> {
    if titles.is_empty() {
        return None;
    }
    // At least one title is always named.
    let limit = limit.max(1);
    let shown = titles.iter().take(limit).copied().collect::<Vec<_>>().join(", ");
    let suffix = if titles.len() > limit {
        format!(" (+{} more)", titles.len() - limit)
    } else {
        String::new()
    };
    Some(format!("Re-apply available for: {}{}", shown, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{store::ManagedStateStore, system::MemorySystem, tweaks::CATALOG};

    fn reconciler(dir: &tempfile::TempDir) -> (Reconciler, Arc<MemorySystem>) {
        let system = Arc::new(MemorySystem::new());
        let store = Arc::new(ManagedStateStore::new(dir.path().join("managed.json")));
        let engine = Arc::new(TweakEngine::new(system.clone(), store));
        (Reconciler::new(engine), system)
    }

    #[test]
    fn test_pass_probes_every_key_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, _) = reconciler(&dir);

        let ReconcileOutcome::Completed(results) = reconciler.run(ReconcileMode::Background) else {
            panic!("pass was skipped");
        };
        let keys: Vec<_> = results.states.iter().map(|(k, _)| *k).collect();
        let expected: Vec<_> = CATALOG.list().map(|d| d.key).collect();
        assert_eq!(keys, expected);
        assert!(!reconciler.is_running());
    }

    #[test]
    fn test_pass_in_flight_is_skipped_without_probing() {
        let dir = tempfile::tempdir().unwrap();
        let (reconciler, system) = reconciler(&dir);

        let token = reconciler.try_begin().unwrap();
        let reads = system.read_count();
        assert_eq!(reconciler.run(ReconcileMode::Interactive), ReconcileOutcome::Skipped);
        assert_eq!(system.read_count(), reads);

        drop(token);
        assert!(matches!(
            reconciler.run(ReconcileMode::Interactive),
            ReconcileOutcome::Completed(_)
        ));
        assert!(system.read_count() > reads);
    }

    #[test]
    fn test_drift_summary_truncates() {
        assert_eq!(drift_summary(&[], 6), None);
        assert_eq!(
            drift_summary(&["A", "B"], 6).as_deref(),
            Some("Re-apply available for: A, B")
        );
        let titles = ["A", "B", "C", "D", "E", "F", "G", "H"];
        assert_eq!(
            drift_summary(&titles, 6).as_deref(),
            Some("Re-apply available for: A, B, C, D, E, F (+2 more)")
        );
    }

    #[test]
    fn test_drift_summary_zero_limit_names_one_title() {
        assert_eq!(
            drift_summary(&["A", "B", "C"], 0).as_deref(),
            Some("Re-apply available for: A (+2 more)")
        );
        assert_eq!(
            drift_summary(&["A"], 0).as_deref(),
            Some("Re-apply available for: A")
        );
    }
}
