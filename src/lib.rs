// src/lib.rs

pub mod config;
pub mod constants;
pub mod errors;
pub mod orchestrator;
pub mod profile;
pub mod reconcile;
pub mod state;
pub mod store;
pub mod system;
pub mod tweaks;
pub mod ui;
pub mod utils;
