// src/main.rs
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use eframe::{egui, App, Frame, NativeOptions};
use egui::{Button, Color32, FontFamily, FontId, RichText};
use egui_dialogs::{DialogDetails, Dialogs, StandardDialog, StandardReply};
use tracing::Level;
use tracing_subscriber::{self};
use winopt::{
    config::{AppConfig, ConfigManager},
    constants::{
        APP_TITLE, DESCRIPTION_FONT_SIZE, LABEL_FONT_SIZE, OUTPUT_PANEL_HEIGHT,
        TWEAK_CONTAINER_HEIGHT, TWEAK_CONTAINER_WIDTH, UI_PADDING, UI_SPACING, WINDOW_HEIGHT,
        WINDOW_WIDTH,
    },
    orchestrator::{ProfileAction, TaskOrchestrator, TaskResult, TweakTask},
    profile::ProfileManager,
    reconcile::{ReconcileMode, ReconcileOutcome},
    state::{TweakBoard, TweakStatus},
    store::ManagedStateStore,
    system::host_system,
    tweaks::{LiveState, ToggleOutcome, TweakCategory, TweakEngine, CATALOG},
    ui::{
        button::{ActionButton, ButtonState, BUTTON_DIMENSIONS},
        switch::ToggleSwitch,
    },
};

/// What the currently open dialog is asking about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialogPurpose {
    Notice,
    ConfirmRiskyTweak { key: &'static str },
}

pub struct MyApp {
    /// View state of every catalog tweak, in catalog order.
    pub board: TweakBoard,

    /// Task orchestrator to manage tweak tasks
    pub orchestrator: TaskOrchestrator,

    pub config: AppConfig,

    /// Set once the first reconcile pass has landed.
    pub initial_states_loaded: bool,
    last_reconcile: Instant,
    profile_in_progress: Option<ProfileAction>,

    pub dialogs: Dialogs<'static>,
    open_dialog: Option<DialogPurpose>,
    restart_notice_pending: bool,
}

impl MyApp {
    fn new(cc: &eframe::CreationContext<'_>) -> Self {
        let app_span = tracing::span!(Level::INFO, "App Initialization");
        let _app_guard = app_span.enter();

        let config = ConfigManager::load().unwrap_or_else(|e| {
            tracing::error!("Failed to load configuration, using defaults: {}", e);
            AppConfig::default()
        });

        let system = host_system();
        let store = Arc::new(ManagedStateStore::new(config.managed_state_path.clone()));
        let engine = Arc::new(TweakEngine::new(Arc::clone(&system), Arc::clone(&store)));
        let profile = Arc::new(ProfileManager::new(
            Arc::clone(&system),
            store,
            config.rollback_state_path.clone(),
        ));
        let orchestrator = TaskOrchestrator::new(engine, profile);

        let mut board = TweakBoard::new(&CATALOG, config.summary_title_limit);
        let repaint = cc.egui_ctx.clone();
        board.subscribe(move |change| {
            tracing::trace!("Board change: {:?}", change);
            repaint.request_repaint();
        });

        let mut dialogs = Dialogs::new();
        let mut open_dialog = None;
        if !system.is_elevated() {
            dialogs.add(DialogDetails::new(
                StandardDialog::info(
                    "Limited mode",
                    "Not running as administrator. Machine-wide tweaks will report \
                     \"Admin required\" and change nothing.",
                )
                .buttons(vec![("OK".into(), StandardReply::Ok)]),
            ));
            open_dialog = Some(DialogPurpose::Notice);
        }

        if let Err(e) = orchestrator.submit_task(TweakTask::Reconcile(ReconcileMode::Background)) {
            tracing::error!("Failed to submit initial reconcile: {:?}", e);
        }

        tracing::info!("{} tweaks loaded", CATALOG.len());

        Self {
            board,
            orchestrator,
            config,
            initial_states_loaded: false,
            last_reconcile: Instant::now(),
            profile_in_progress: None,
            dialogs,
            open_dialog,
            restart_notice_pending: false,
        }
    }

    fn submit(&mut self, task: TweakTask) -> bool {
        match self.orchestrator.submit_task(task) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to submit task: {:?}", e);
                self.board.set_status_line(format!("Failed to start task: {}", e));
                false
            }
        }
    }

    fn request_reconcile(&mut self, mode: ReconcileMode) {
        self.last_reconcile = Instant::now();
        if mode == ReconcileMode::Interactive {
            self.board.set_status_line("Refreshing tweak states...");
        }
        self.submit(TweakTask::Reconcile(mode));
    }

    /// Sends every queued toggle to the orchestrator.
    fn dispatch_apply_requests(&mut self) {
        for request in self.board.take_apply_requests() {
            self.board.set_status(request.key, TweakStatus::Busy);
            let submitted = self.submit(TweakTask::Apply {
                key: request.key.to_string(),
                enabled: request.enabled,
            });
            if !submitted {
                self.board
                    .set_status(request.key, TweakStatus::Failed("Could not start apply".into()));
            }
        }
    }

    /// Drains results from the orchestrator into the board.
    fn update_tweak_states(&mut self) {
        while let Some(result) = self.orchestrator.try_recv_result() {
            match result {
                TaskResult::Applied(report) => {
                    if self.board.complete_apply(&report) {
                        self.restart_notice_pending = true;
                    }
                    if matches!(report.outcome, ToggleOutcome::Failed(_)) {
                        self.submit(TweakTask::Probe { key: report.key });
                    }
                    self.request_reconcile(ReconcileMode::Background);
                }
                TaskResult::Probed { key, state } => {
                    self.board.set_live_state(&key, state);
                }
                TaskResult::Reconciled(ReconcileOutcome::Completed(results)) => {
                    let drifted = self.board.apply_probe_results(&results);
                    if results.mode == ReconcileMode::Interactive {
                        self.board.set_status_line(if drifted.is_empty() {
                            "Tweak states refreshed".to_string()
                        } else {
                            format!("{} tweak(s) drifted", drifted.len())
                        });
                    }
                    if !self.initial_states_loaded {
                        tracing::debug!("All initial state reads completed.");
                        self.initial_states_loaded = true;
                    }
                }
                TaskResult::Reconciled(ReconcileOutcome::Skipped) => {
                    tracing::debug!("Reconcile request dropped; a pass is already running");
                }
                TaskResult::Profile { action, output } => {
                    self.profile_in_progress = None;
                    self.board.set_output(output);
                    self.board.set_status_line(format!("{} finished", action));
                }
                TaskResult::Failed { task, error } => {
                    match &task {
                        TweakTask::Apply { key, .. } => {
                            self.board.set_status(key, TweakStatus::Failed(error.clone()));
                        }
                        TweakTask::Profile(_) => self.profile_in_progress = None,
                        TweakTask::Probe { .. } | TweakTask::Reconcile(_) => {}
                    }
                    self.board.set_output(format!("Task failed: {}", error));
                    self.board.set_status_line("Task failed");
                }
            }
        }
    }

    /// A switch was flipped by the user.
    fn on_user_toggle(&mut self, key: &'static str, enabled: bool) {
        let Some(entry) = self.board.entry(key) else {
            return;
        };
        let definition = entry.definition;

        if enabled && definition.requires_warning {
            if self.open_dialog.is_some() {
                return;
            }
            self.dialogs.add(DialogDetails::new(
                StandardDialog::confirm(
                    definition.title,
                    format!(
                        "{}\n\nThis tweak trades safety or stability for performance. Continue?",
                        definition.description
                    ),
                )
                .buttons(vec![
                    ("Apply".into(), StandardReply::Yes),
                    ("Cancel".into(), StandardReply::Cancel),
                ]),
            ));
            self.open_dialog = Some(DialogPurpose::ConfirmRiskyTweak { key });
            return;
        }

        self.board.request_toggle(key, enabled);
    }

    fn show_restart_notice(&mut self) {
        if !self.restart_notice_pending || self.open_dialog.is_some() {
            return;
        }
        self.restart_notice_pending = false;
        self.dialogs.add(DialogDetails::new(
            StandardDialog::info(
                "Restart required",
                "One or more changes take full effect after Windows restarts.",
            )
            .buttons(vec![("OK".into(), StandardReply::Ok)]),
        ));
        self.open_dialog = Some(DialogPurpose::Notice);
    }

    fn process_dialogs(&mut self, ctx: &egui::Context) {
        if self.dialogs.dialogs().is_empty() {
            return;
        }
        let Some(res) = self.dialogs.show(ctx) else {
            return;
        };

        match (self.open_dialog.take(), res.reply()) {
            (Some(DialogPurpose::ConfirmRiskyTweak { key }), Ok(StandardReply::Yes)) => {
                tracing::debug!("Risky tweak {:?} confirmed", key);
                self.board.request_toggle(key, true);
            }
            (Some(DialogPurpose::ConfirmRiskyTweak { key }), _) => {
                tracing::debug!("Risky tweak {:?} cancelled", key);
            }
            _ => {}
        }
    }

    fn draw_ui(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.columns(3, |columns| {
                for category in TweakCategory::left() {
                    self.draw_category_section(&mut columns[0], category);
                }
                for category in TweakCategory::middle() {
                    self.draw_category_section(&mut columns[1], category);
                }
                for category in TweakCategory::right() {
                    self.draw_category_section(&mut columns[2], category);
                }
            });
        });
    }

    fn draw_category_section(&mut self, ui: &mut egui::Ui, category: TweakCategory) {
        let category_tweaks: Vec<&'static str> = self
            .board
            .entries()
            .filter(|entry| entry.definition.category == category)
            .map(|entry| entry.definition.key)
            .collect();

        if category_tweaks.is_empty() {
            return;
        }

        ui.heading(format!("{}", category));
        ui.separator();

        for key in category_tweaks {
            egui::Frame::none()
                .fill(egui::Color32::TRANSPARENT)
                .stroke(egui::Stroke::NONE)
                .show(ui, |ui| {
                    ui.set_width(TWEAK_CONTAINER_WIDTH);
                    self.draw_tweak_container(ui, key);
                });
        }

        ui.add_space(UI_SPACING);
    }

    fn draw_tweak_container(&mut self, ui: &mut egui::Ui, key: &'static str) {
        let Some(entry) = self.board.entry(key) else {
            return;
        };
        let definition = entry.definition;
        let state = entry.state.clone();

        egui::Grid::new(format!("tweak_grid_{}", key))
            .num_columns(2)
            .striped(false)
            .min_col_width(TWEAK_CONTAINER_WIDTH - 2.0 * TWEAK_CONTAINER_HEIGHT - UI_SPACING * 2.0)
            .spacing([UI_SPACING, 0.0])
            .show(ui, |ui| {
                ui.vertical(|ui| {
                    let title = if definition.requires_warning {
                        RichText::new(format!("{} ⚠", definition.title))
                    } else {
                        RichText::new(definition.title)
                    };
                    ui.collapsing(title, |ui| {
                        ui.label(
                            RichText::new(definition.description)
                                .font(FontId::new(DESCRIPTION_FONT_SIZE, FontFamily::Proportional)),
                        );
                        ui.label(
                            RichText::new(format!("Live state: {}", state.live_state))
                                .font(FontId::proportional(DESCRIPTION_FONT_SIZE)),
                        );
                        if definition.requires_restart {
                            ui.label(
                                RichText::new("Requires restart")
                                    .font(FontId::proportional(DESCRIPTION_FONT_SIZE)),
                            );
                        }
                        if let TweakStatus::Failed(ref err) = state.status {
                            ui.colored_label(Color32::RED, format!("Error: {}", err));
                        }
                        ui.add_space(UI_SPACING);
                    });
                    if state.has_drift {
                        ui.colored_label(Color32::from_rgb(220, 170, 40), "Re-apply available");
                    }
                });

                ui.with_layout(egui::Layout::right_to_left(egui::Align::TOP), |ui| {
                    let mut on = state.toggle_on;
                    let response = ui.add(
                        ToggleSwitch::new(&mut on)
                            .with_live_state(state.live_state)
                            .busy(state.status == TweakStatus::Busy)
                            .with_error(matches!(state.status, TweakStatus::Failed(_))),
                    );
                    if response.changed() {
                        self.on_user_toggle(key, on);
                    }
                    if state.pending_restart {
                        ui.label(RichText::new("↻").font(FontId::proportional(LABEL_FONT_SIZE)));
                    }
                    if state.live_state == LiveState::Unknown && self.initial_states_loaded {
                        ui.label(RichText::new("?").font(FontId::proportional(LABEL_FONT_SIZE)));
                    }
                });

                ui.end_row();
            });
    }

    fn draw_profile_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("profile_bar").show(ctx, |ui| {
            egui::Frame::none()
                .inner_margin(egui::Margin::same(UI_PADDING))
                .show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        for (label, action) in [
                            ("Apply Gaming Profile", ProfileAction::ApplyGamingProfile),
                            ("Rollback Profile", ProfileAction::Rollback),
                            ("Analyze", ProfileAction::Analyze),
                            ("Create Restore Point", ProfileAction::RestorePoint),
                            ("Quick Fixes", ProfileAction::QuickFixes),
                            ("Startup Apps", ProfileAction::StartupReport),
                            ("App Optimizer", ProfileAction::AppReport),
                            ("Resources", ProfileAction::ResourceReport),
                        ] {
                            let state = if self.profile_in_progress == Some(action) {
                                ButtonState::InProgress
                            } else {
                                ButtonState::Default
                            };
                            let clicked = ui.add(ActionButton::new(label, state)).clicked();
                            if clicked && self.profile_in_progress.is_none() {
                                self.board.set_status_line(format!("{}...", action));
                                if self.submit(TweakTask::Profile(action)) {
                                    self.profile_in_progress = Some(action);
                                }
                            }
                        }
                    });
                });
        });
    }

    fn draw_output_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("output_panel")
            .resizable(true)
            .default_height(OUTPUT_PANEL_HEIGHT)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .auto_shrink([false; 2])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        ui.label(RichText::new(self.board.output()).monospace());
                    });
            });
    }

    fn draw_status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar")
            .min_height(TWEAK_CONTAINER_HEIGHT)
            .max_height(TWEAK_CONTAINER_HEIGHT)
            .resizable(false)
            .show(ctx, |ui| {
                egui::Frame::none()
                    .inner_margin(egui::Margin::same(UI_PADDING))
                    .show(ui, |ui| {
                        ui.horizontal(|ui| {
                            ui.label(
                                RichText::new(concat!("v", env!("CARGO_PKG_VERSION")))
                                    .font(FontId::proportional(LABEL_FONT_SIZE)),
                            );
                            ui.separator();

                            let pending_restart_count = self
                                .board
                                .entries()
                                .filter(|entry| entry.state.pending_restart)
                                .count();
                            ui.label(
                                RichText::new(format!(
                                    "{} tweak{} pending restart",
                                    pending_restart_count,
                                    if pending_restart_count != 1 { "s" } else { "" }
                                ))
                                .font(FontId::proportional(LABEL_FONT_SIZE)),
                            );
                            ui.separator();
                            ui.label(
                                RichText::new(self.board.status_line())
                                    .font(FontId::proportional(LABEL_FONT_SIZE)),
                            );

                            ui.with_layout(
                                egui::Layout::right_to_left(egui::Align::Center),
                                |ui| {
                                    let refresh = Button::new("Refresh states")
                                        .min_size(BUTTON_DIMENSIONS);
                                    if ui
                                        .add_enabled(!self.orchestrator.reconcile_in_flight(), refresh)
                                        .clicked()
                                    {
                                        self.request_reconcile(ReconcileMode::Interactive);
                                    }
                                },
                            );
                        });
                    });
            });
    }

    fn schedule_reconcile(&mut self, ctx: &egui::Context) {
        let visible = ctx.input(|i| {
            i.focused && !i.viewport().minimized.unwrap_or(false)
        });
        let interval = self.config.refresh_interval(visible);
        let elapsed = self.last_reconcile.elapsed();

        if elapsed >= interval {
            self.request_reconcile(ReconcileMode::Background);
            ctx.request_repaint_after(interval);
        } else {
            ctx.request_repaint_after(interval - elapsed);
        }
    }

    fn cleanup(&mut self) {
        // The timer request dies with the process, but release it explicitly.
        if let Err(e) = self.orchestrator.engine().system().set_timer_resolution(false) {
            tracing::debug!("Timer resolution release failed: {:?}", e);
        }
    }
}

impl App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.update_tweak_states();
        self.dispatch_apply_requests();
        self.show_restart_notice();

        self.draw_profile_bar(ctx);
        self.draw_status_bar(ctx);
        self.draw_output_panel(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            if !self.initial_states_loaded {
                ui.heading("Reading system state...");
                ui.add(egui::widgets::Spinner::new());
                return;
            }
            egui::ScrollArea::vertical()
                .auto_shrink([false; 2])
                .show(ui, |ui| {
                    self.draw_ui(ui);
                });
        });

        self.process_dialogs(ctx);
        self.dispatch_apply_requests();
        self.schedule_reconcile(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.cleanup();
    }
}

fn main() -> eframe::Result<()> {
    // Initialize logging based on build mode
    #[cfg(debug_assertions)]
    {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        // No-op subscriber so tracing macros produce no output in release.
        use tracing_subscriber::Registry;
        let noop_subscriber = Registry::default();
        if let Err(e) = tracing::subscriber::set_global_default(noop_subscriber) {
            eprintln!("Failed to set global subscriber: {}", e);
        }
    }

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(APP_TITLE)
            .with_inner_size([WINDOW_WIDTH, WINDOW_HEIGHT])
            .with_min_inner_size([WINDOW_WIDTH, WINDOW_HEIGHT / 2.0]),
        ..Default::default()
    };

    let run_span = tracing::span!(Level::INFO, "Run Native");
    run_span.in_scope(|| {
        eframe::run_native(
            APP_TITLE,
            options,
            Box::new(|cc| Ok(Box::new(MyApp::new(cc)))),
        )
    })
}
