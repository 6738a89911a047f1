// src/ui/switch.rs

use egui::{self, Color32, Pos2, Response, Sense, Stroke, Ui, Widget};

use crate::tweaks::LiveState;

const ON_COLOR: Color32 = Color32::from_rgb(0, 200, 0);
const OFF_COLOR: Color32 = Color32::from_rgb(200, 200, 200);
const UNKNOWN_COLOR: Color32 = Color32::from_rgb(220, 170, 40);
const ERROR_COLOR: Color32 = Color32::from_rgb(220, 50, 50);

/// Toggle switch bound to a bool, with a third look for an unknown live
/// state. Clicking flips the bool and marks the response changed.
pub struct ToggleSwitch<'a> {
    on: &'a mut bool,
    live_state: LiveState,
    busy: bool,
    error: bool,
}

impl<'a> ToggleSwitch<'a> {
    pub fn new(on: &'a mut bool) -> Self {
        Self {
            on,
            live_state: LiveState::Unknown,
            busy: false,
            error: false,
        }
    }

    pub fn with_live_state(mut self, live_state: LiveState) -> Self {
        self.live_state = live_state;
        self
    }

    /// A busy switch ignores clicks.
    pub fn busy(mut self, busy: bool) -> Self {
        self.busy = busy;
        self
    }

    pub fn with_error(mut self, error: bool) -> Self {
        self.error = error;
        self
    }
}

impl Widget for ToggleSwitch<'_> {
    fn ui(self, ui: &mut Ui) -> Response {
        let desired_size = ui.spacing().interact_size.y * egui::vec2(2.0, 1.0);
        let sense = if self.busy { Sense::hover() } else { Sense::click() };
        let (rect, mut response) = ui.allocate_exact_size(desired_size, sense);

        if !self.busy && response.clicked() {
            *self.on = !*self.on;
            response.mark_changed();
        }

        let on = *self.on;
        response.widget_info(|| {
            egui::WidgetInfo::selected(egui::WidgetType::Checkbox, ui.is_enabled(), on, "")
        });

        if ui.is_rect_visible(rect) {
            let radius = rect.height() / 2.0;
            let how_on = ui.ctx().animate_bool(response.id, on);

            let track_color = match (self.live_state, on) {
                (LiveState::Unknown, _) => UNKNOWN_COLOR.gamma_multiply(0.6),
                (_, true) => ON_COLOR,
                (_, false) => OFF_COLOR,
            };
            let stroke = if self.error {
                Stroke::new(2.0, ERROR_COLOR)
            } else if self.live_state == LiveState::Unknown {
                Stroke::new(1.0, UNKNOWN_COLOR)
            } else {
                Stroke::NONE
            };

            let painter = ui.painter();
            painter.rect(rect, radius, track_color, stroke);

            let knob_x = egui::lerp((rect.left() + radius)..=(rect.right() - radius), how_on);
            let knob_color = if self.busy {
                Color32::LIGHT_GRAY
            } else {
                Color32::WHITE
            };
            painter.circle_filled(Pos2::new(knob_x, rect.center().y), radius * 0.75, knob_color);
        }

        response
    }
}
