// src/constants.rs

pub const APP_TITLE: &str = "WinOpt";

pub const UI_SPACING: f32 = 10.0; // Spacing between UI elements
pub const UI_PADDING: f32 = 3.0; // Padding inside UI elements

// Controls the dimensions of each tweak row.
pub const TWEAK_CONTAINER_HEIGHT: f32 = 30.0;
pub const TWEAK_CONTAINER_WIDTH: f32 = 340.0;

pub const COLUMN_WIDTH: f32 = TWEAK_CONTAINER_WIDTH + UI_SPACING;

pub const WINDOW_WIDTH: f32 = COLUMN_WIDTH * 3.0 + UI_SPACING * 4.0;
pub const WINDOW_HEIGHT: f32 = 900.0;

pub const OUTPUT_PANEL_HEIGHT: f32 = 180.0;

pub const LABEL_FONT_SIZE: f32 = 14.0;
pub const DESCRIPTION_FONT_SIZE: f32 = 12.0;
