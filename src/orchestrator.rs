// src/orchestrator.rs

use std::{sync::Arc, thread, time::Duration};

use anyhow::Context;
use crossbeam::channel;
use strum_macros::Display;

use crate::{
    errors::TweakResult,
    profile::ProfileManager,
    reconcile::{ReconcileMode, ReconcileOutcome, Reconciler},
    tweaks::{LiveState, ToggleReport, TweakEngine},
};

/// Gaming profile and maintenance actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ProfileAction {
    #[strum(serialize = "Apply gaming profile")]
    ApplyGamingProfile,
    Rollback,
    Analyze,
    #[strum(serialize = "Create restore point")]
    RestorePoint,
    #[strum(serialize = "Quick fixes")]
    QuickFixes,
    #[strum(serialize = "Startup report")]
    StartupReport,
    #[strum(serialize = "App report")]
    AppReport,
    #[strum(serialize = "Resource report")]
    ResourceReport,
}

/// Represents a task to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TweakTask {
    Apply { key: String, enabled: bool },
    Probe { key: String },
    Reconcile(ReconcileMode),
    Profile(ProfileAction),
}

/// Represents the result of a processed task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    Applied(ToggleReport),
    Probed { key: String, state: LiveState },
    Reconciled(ReconcileOutcome),
    Profile { action: ProfileAction, output: String },
    /// The task could not run at all.
    Failed { task: TweakTask, error: String },
}

/// Runs engine work on ad hoc threads and hands results back to the UI.
pub struct TaskOrchestrator {
    engine: Arc<TweakEngine>,
    reconciler: Reconciler,
    profile: Arc<ProfileManager>,
    result_receiver: channel::Receiver<TaskResult>,
    result_sender: channel::Sender<TaskResult>,
}

impl TaskOrchestrator {
    pub fn new(engine: Arc<TweakEngine>, profile: Arc<ProfileManager>) -> Self {
        let (result_sender, result_receiver) = channel::unbounded::<TaskResult>();
        Self {
            reconciler: Reconciler::new(Arc::clone(&engine)),
            engine,
            profile,
            result_sender,
            result_receiver,
        }
    }

    pub fn engine(&self) -> &Arc<TweakEngine> {
        &self.engine
    }

    pub fn reconcile_in_flight(&self) -> bool {
        self.reconciler.is_running()
    }

    /// Submits a new task to be processed.
    pub fn submit_task(&self, task: TweakTask) -> anyhow::Result<()> {
        let result_sender = self.result_sender.clone();
        let engine = Arc::clone(&self.engine);
        let reconciler = self.reconciler.clone();
        let profile = Arc::clone(&self.profile);
        let name = format!("task-{:?}", task);

        thread::Builder::new()
            .name(name)
            .spawn(move || {
                let result = run_task(&engine, &reconciler, &profile, task);
                if let Err(e) = result_sender.send(result) {
                    tracing::error!("Failed to send result: {:?}", e);
                }
            })
            .context("Failed to spawn task thread")?;
        Ok(())
    }

    /// Attempts to receive a task result without blocking.
    pub fn try_recv_result(&self) -> Option<TaskResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result_timeout(&self, timeout: Duration) -> Option<TaskResult> {
        self.result_receiver.recv_timeout(timeout).ok()
    }
}

fn run_task(
    engine: &TweakEngine,
    reconciler: &Reconciler,
    profile: &ProfileManager,
    task: TweakTask,
) -> TaskResult {
    let outcome: TweakResult<TaskResult> = match &task {
        TweakTask::Apply { key, enabled } => engine.apply(key, *enabled).map(TaskResult::Applied),
        TweakTask::Probe { key } => engine.probe(key).map(|state| TaskResult::Probed {
            key: key.clone(),
            state,
        }),
        TweakTask::Reconcile(mode) => Ok(TaskResult::Reconciled(reconciler.run(*mode))),
        TweakTask::Profile(action) => {
            let output = match action {
                ProfileAction::ApplyGamingProfile => profile.apply_gaming_profile(),
                ProfileAction::Rollback => profile.rollback(),
                ProfileAction::Analyze => profile.analyze(),
                ProfileAction::RestorePoint => profile.create_restore_point(),
                ProfileAction::QuickFixes => profile.quick_fixes(),
                ProfileAction::StartupReport => profile.startup_report(),
                ProfileAction::AppReport => profile.app_report(),
                ProfileAction::ResourceReport => profile.resource_report(),
            };
            output.map(|output| TaskResult::Profile {
                action: *action,
                output,
            })
        }
    };

    outcome.unwrap_or_else(|e| {
        tracing::error!("Task {:?} failed: {}", task, e);
        TaskResult::Failed {
            error: e.to_string(),
            task,
        }
    })
}
