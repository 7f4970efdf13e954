//! Configuration module for the planner.
//!
//! Handles marker naming and planning switches loaded from TOML.

mod settings;

pub use settings::{
    MarkerSettings, MarkerStrategy, PlannerSettings, PlanningSettings, SettingsError,
};
