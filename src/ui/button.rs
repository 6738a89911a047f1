// src/ui/button.rs

use egui::{self, Color32, Response, Rounding, Sense, Stroke, Ui, Vec2, Widget};

pub const BUTTON_DIMENSIONS: Vec2 = Vec2::new(150.0, 26.0);

const IN_PROGRESS_TEXT: &str = "Working...";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonState {
    Default,
    InProgress,
}

/// Fixed-size button that turns inert while its task runs.
#[derive(Clone, Debug)]
pub struct ActionButton<'a> {
    label: &'a str,
    state: ButtonState,
    fill: Color32,
    stroke: Stroke,
    rounding: Rounding,
}

impl<'a> ActionButton<'a> {
    pub fn new(label: &'a str, state: ButtonState) -> Self {
        Self {
            label,
            state,
            fill: Color32::from_rgb(100, 150, 250),
            stroke: Stroke::new(1.0, Color32::BLACK),
            rounding: Rounding::same(5.0),
        }
    }
}

impl Widget for ActionButton<'_> {
    fn ui(self, ui: &mut Ui) -> Response {
        let label = match self.state {
            ButtonState::Default => self.label,
            ButtonState::InProgress => IN_PROGRESS_TEXT,
        };
        let is_clickable = self.state == ButtonState::Default;
        let sense = if is_clickable {
            Sense::click()
        } else {
            Sense::hover()
        };

        let (rect, response) = ui.allocate_exact_size(BUTTON_DIMENSIONS, sense);

        response.widget_info(|| {
            egui::WidgetInfo::labeled(egui::WidgetType::Button, ui.is_enabled(), label)
        });

        if ui.is_rect_visible(rect) {
            let visuals = ui.style().interact(&response);
            let fill = if is_clickable {
                self.fill
            } else {
                self.fill.gamma_multiply(0.5)
            };
            ui.painter().rect(rect, self.rounding, fill, self.stroke);

            let galley = ui.fonts(|f| {
                f.layout_no_wrap(label.to_string(), egui::FontId::default(), visuals.text_color())
            });
            let text_pos = rect.center() - galley.size() / 2.0;
            ui.painter().galley(text_pos, galley, visuals.text_color());
        }

        response
    }
}
