// src/ui/mod.rs

pub mod button;
pub mod switch;
