// src/state.rs

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use indexmap::IndexMap;
use tracing::debug;

use crate::{
    reconcile::{drift_summary, ProbeResults, ReconcileMode},
    tweaks::{Catalog, LiveState, ToggleOutcome, ToggleReport, TweakDefinition},
};

/// State of the last apply for one tweak.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TweakStatus {
    #[default]
    Idle,
    Busy,
    Failed(String),
}

/// Session-only view state of one tweak.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TweakRuntimeState {
    /// Last value the user asked for.
    pub desired_enabled: bool,
    /// What the switch shows.
    pub toggle_on: bool,
    pub live_state: LiveState,
    /// The OS reported off while the user wants it on.
    pub has_drift: bool,
    pub status: TweakStatus,
    /// A restart-requiring apply happened this session.
    pub pending_restart: bool,
}

/// An apply the UI should dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyRequest {
    pub key: &'static str,
    pub enabled: bool,
}

/// Notification sent to board subscribers after a value changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardChange {
    Toggle { key: &'static str, on: bool },
    LiveState { key: &'static str, state: LiveState },
    Status { key: &'static str, status: TweakStatus },
    Output(String),
    StatusLine(String),
}

#[derive(Debug)]
pub struct BoardEntry {
    pub definition: &'static TweakDefinition,
    pub state: TweakRuntimeState,
}

/// Suppresses toggle events while alive. Released on drop, unwinding included.
#[must_use = "toggle events are only suppressed while the guard is alive"]
#[derive(Debug)]
pub struct SuppressionGuard {
    depth: Arc<AtomicUsize>,
}

impl Drop for SuppressionGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

type Observer = Box<dyn Fn(&BoardChange)>;

/// Presentation state for the tweak view, owned by the UI thread.
///
/// Every change of the switch position raises a toggle event. Toggle events
/// queue an [`ApplyRequest`] unless suppressed; probe results are written
/// under suppression so they never feed back into applies.
pub struct TweakBoard {
    entries: IndexMap<&'static str, BoardEntry>,
    observers: Vec<Observer>,
    suppression: Arc<AtomicUsize>,
    apply_queue: Vec<ApplyRequest>,
    output: String,
    status_line: String,
    summary_limit: usize,
}

impl TweakBoard {
    pub fn new(catalog: &'static Catalog, summary_limit: usize) -> Self {
        let entries = catalog
            .list()
            .map(|definition| {
                (
                    definition.key,
                    BoardEntry {
                        definition,
                        state: TweakRuntimeState::default(),
                    },
                )
            })
            .collect();

        Self {
            entries,
            observers: Vec::new(),
            suppression: Arc::new(AtomicUsize::new(0)),
            apply_queue: Vec::new(),
            output: String::new(),
            status_line: String::from("Ready"),
            summary_limit,
        }
    }

    pub fn subscribe(&mut self, observer: impl Fn(&BoardChange) + 'static) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&self, change: BoardChange) {
        for observer in &self.observers {
            observer(&change);
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &BoardEntry> + '_ {
        self.entries.values()
    }

    pub fn entry(&self, key: &str) -> Option<&BoardEntry> {
        self.entries.get(key)
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn status_line(&self) -> &str {
        &self.status_line
    }

    pub fn restart_pending(&self) -> bool {
        self.entries.values().any(|entry| entry.state.pending_restart)
    }

    pub fn suppress_toggle_events(&self) -> SuppressionGuard {
        self.suppression.fetch_add(1, Ordering::SeqCst);
        SuppressionGuard {
            depth: Arc::clone(&self.suppression),
        }
    }

    pub fn toggle_events_suppressed(&self) -> bool {
        self.suppression.load(Ordering::SeqCst) > 0
    }

    /// User flipped a switch. Returns whether an apply was queued.
    pub fn request_toggle(&mut self, key: &str, enabled: bool) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        let key = entry.definition.key;
        entry.state.desired_enabled = enabled;
        entry.state.has_drift = false;
        self.write_toggle(key, enabled);
        self.toggle_event(key, enabled)
    }

    /// Moves a switch programmatically; raises a toggle event if it moved.
    pub fn set_toggle(&mut self, key: &str, on: bool) -> bool {
        let Some(key) = self.entries.get(key).map(|entry| entry.definition.key) else {
            return false;
        };
        if self.write_toggle(key, on) {
            self.toggle_event(key, on)
        } else {
            false
        }
    }

    fn write_toggle(&mut self, key: &'static str, on: bool) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        if entry.state.toggle_on == on {
            return false;
        }
        entry.state.toggle_on = on;
        self.notify(BoardChange::Toggle { key, on });
        true
    }

    fn toggle_event(&mut self, key: &'static str, enabled: bool) -> bool {
        if self.toggle_events_suppressed() {
            return false;
        }
        self.apply_queue.push(ApplyRequest { key, enabled });
        true
    }

    /// Drains the pending apply requests.
    pub fn take_apply_requests(&mut self) -> Vec<ApplyRequest> {
        std::mem::take(&mut self.apply_queue)
    }

    pub fn set_live_state(&mut self, key: &str, state: LiveState) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        if entry.state.live_state == state {
            return;
        }
        entry.state.live_state = state;
        let key = entry.definition.key;
        self.notify(BoardChange::LiveState { key, state });
    }

    pub fn set_status(&mut self, key: &str, status: TweakStatus) {
        let Some(entry) = self.entries.get_mut(key) else {
            return;
        };
        if entry.state.status == status {
            return;
        }
        entry.state.status = status.clone();
        let key = entry.definition.key;
        self.notify(BoardChange::Status { key, status });
    }

    pub fn set_output(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.output == text {
            return;
        }
        self.output = text.clone();
        self.notify(BoardChange::Output(text));
    }

    pub fn set_status_line(&mut self, text: impl Into<String>) {
        let text = text.into();
        if self.status_line == text {
            return;
        }
        self.status_line = text.clone();
        self.notify(BoardChange::StatusLine(text));
    }

    /// Records a finished apply. Returns `true` when the user should be told
    /// to restart.
    pub fn complete_apply(&mut self, report: &ToggleReport) -> bool {
        let Some(entry) = self.entries.get_mut(report.key.as_str()) else {
            return false;
        };
        let key = entry.definition.key;
        let title = entry.definition.title;
        let needs_restart =
            entry.definition.requires_restart && report.outcome == ToggleOutcome::Applied;
        if needs_restart {
            entry.state.pending_restart = true;
        }

        let (status, line) = match &report.outcome {
            ToggleOutcome::Applied if needs_restart => {
                (TweakStatus::Idle, format!("{} updated (restart required)", title))
            }
            ToggleOutcome::Applied => (
                TweakStatus::Idle,
                format!("{} {}", title, if report.enabled { "enabled" } else { "disabled" }),
            ),
            ToggleOutcome::AdminRequired => (
                TweakStatus::Failed("Administrator rights required".into()),
                format!("{} requires administrator", title),
            ),
            ToggleOutcome::Failed(message) => (
                TweakStatus::Failed(message.clone()),
                format!("{} toggle failed", title),
            ),
        };

        self.set_status(key, status);
        self.set_output(report.to_string());
        self.set_status_line(line);
        needs_restart
    }

    /// Writes a pass into the board under toggle-event suppression and
    /// returns the titles that drifted.
    ///
    /// `On`/`Off` move the switch; `Unknown` leaves it where it is.
    pub fn apply_probe_results(&mut self, results: &ProbeResults) -> Vec<&'static str> {
        let _guard = self.suppress_toggle_events();
        let mut drifted = Vec::new();

        for &(key, state) in &results.states {
            self.set_live_state(key, state);
            if let Some(on) = state.as_bool() {
                self.set_toggle(key, on);
            }

            let Some(entry) = self.entries.get_mut(key) else {
                continue;
            };
            entry.state.has_drift = state == LiveState::Off && entry.state.desired_enabled;
            if entry.state.has_drift {
                drifted.push(entry.definition.title);
            }
        }

        debug!("Reconcile pass applied, {} drifted", drifted.len());
        if results.mode == ReconcileMode::Interactive {
            if let Some(summary) = drift_summary(&drifted, self.summary_limit) {
                self.set_output(summary);
            }
        }
        drifted
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, panic, rc::Rc};

    use super::*;
    use crate::tweaks::CATALOG;

    fn board() -> TweakBoard {
        TweakBoard::new(&CATALOG, 6)
    }

    fn results(mode: ReconcileMode, states: &[(&'static str, LiveState)]) -> ProbeResults {
        ProbeResults {
            mode,
            states: states.to_vec(),
        }
    }

    #[test]
    fn test_user_toggle_queues_apply() {
        let mut board = board();
        assert!(board.request_toggle("telemetry_zero", true));
        assert_eq!(
            board.take_apply_requests(),
            vec![ApplyRequest {
                key: "telemetry_zero",
                enabled: true
            }]
        );
        assert!(board.take_apply_requests().is_empty());
        assert!(board.entry("telemetry_zero").unwrap().state.desired_enabled);
    }

    #[test]
    fn test_probe_results_never_queue_applies() {
        let mut board = board();
        board.apply_probe_results(&results(
            ReconcileMode::Background,
            &[("telemetry_zero", LiveState::On), ("sysmain_off", LiveState::Off)],
        ));
        assert!(board.take_apply_requests().is_empty());
        assert!(board.entry("telemetry_zero").unwrap().state.toggle_on);
        assert!(!board.toggle_events_suppressed());
    }

    #[test]
    fn test_unsuppressed_programmatic_change_queues_apply() {
        let mut board = board();
        assert!(board.set_toggle("sysmain_off", true));
        assert!(!board.set_toggle("sysmain_off", true));
        assert_eq!(board.take_apply_requests().len(), 1);
    }

    #[test]
    fn test_drift_detection_flips_toggle() {
        let mut board = board();
        board.request_toggle("telemetry_zero", true);
        board.take_apply_requests();

        let drifted = board.apply_probe_results(&results(
            ReconcileMode::Interactive,
            &[("telemetry_zero", LiveState::Off), ("ads_id_off", LiveState::Off)],
        ));

        assert_eq!(drifted, vec!["Telemetry Zero"]);
        let state = &board.entry("telemetry_zero").unwrap().state;
        assert!(state.has_drift);
        assert!(!state.toggle_on);
        assert_eq!(state.live_state, LiveState::Off);
        assert_eq!(board.output(), "Re-apply available for: Telemetry Zero");
    }

    #[test]
    fn test_unknown_leaves_toggle_untouched() {
        let mut board = board();
        board.request_toggle("hpet_tune_off", true);
        board.apply_probe_results(&results(
            ReconcileMode::Interactive,
            &[("hpet_tune_off", LiveState::Unknown)],
        ));
        let state = &board.entry("hpet_tune_off").unwrap().state;
        assert!(state.toggle_on);
        assert!(!state.has_drift);
        assert_eq!(state.live_state, LiveState::Unknown);
    }

    #[test]
    fn test_background_pass_has_no_summary() {
        let mut board = board();
        board.request_toggle("telemetry_zero", true);
        board.apply_probe_results(&results(
            ReconcileMode::Background,
            &[("telemetry_zero", LiveState::Off)],
        ));
        assert_eq!(board.output(), "");
    }

    #[test]
    fn test_summary_is_truncated() {
        let mut board = board();
        let keys: Vec<&'static str> = CATALOG.list().take(8).map(|d| d.key).collect();
        for key in &keys {
            board.request_toggle(key, true);
        }
        let states: Vec<_> = keys.iter().map(|&k| (k, LiveState::Off)).collect();
        board.apply_probe_results(&results(ReconcileMode::Interactive, &states));
        assert!(board.output().ends_with(" (+2 more)"));
    }

    #[test]
    fn test_suppression_released_on_panic() {
        let board = board();
        let outcome = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            let _guard = board.suppress_toggle_events();
            assert!(board.toggle_events_suppressed());
            panic!("probe writer crashed");
        }));
        assert!(outcome.is_err());
        assert!(!board.toggle_events_suppressed());
    }

    #[test]
    fn test_observers_see_changes() {
        let mut board = board();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        board.subscribe(move |change| sink.borrow_mut().push(change.clone()));

        board.request_toggle("sticky_keys_guard", true);
        board.set_live_state("sticky_keys_guard", LiveState::On);
        board.set_live_state("sticky_keys_guard", LiveState::On);
        board.set_status_line("Working");

        assert_eq!(
            *seen.borrow(),
            vec![
                BoardChange::Toggle {
                    key: "sticky_keys_guard",
                    on: true
                },
                BoardChange::LiveState {
                    key: "sticky_keys_guard",
                    state: LiveState::On
                },
                BoardChange::StatusLine("Working".into()),
            ]
        );
    }

    #[test]
    fn test_complete_apply_status_lines() {
        let mut board = board();
        let mut report = ToggleReport {
            key: "telemetry_zero".into(),
            enabled: true,
            time: 0,
            lines: vec!["Telemetry policy updated.".into()],
            outcome: ToggleOutcome::Applied,
        };
        assert!(!board.complete_apply(&report));
        assert_eq!(board.status_line(), "Telemetry Zero enabled");
        assert!(board.output().starts_with("Tweak Toggle: telemetry_zero"));

        report.key = "memory_integrity_off".into();
        assert!(board.complete_apply(&report));
        assert_eq!(board.status_line(), "Memory Integrity Off updated (restart required)");
        assert!(board.restart_pending());

        report.key = "smb1_off".into();
        report.outcome = ToggleOutcome::Failed("dism failed".into());
        assert!(!board.complete_apply(&report));
        assert_eq!(board.status_line(), "SMB1 Off toggle failed");
        assert_eq!(
            board.entry("smb1_off").unwrap().state.status,
            TweakStatus::Failed("dism failed".into())
        );
    }
}
