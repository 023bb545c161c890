//! Configuration module for formql.
//!
//! Handles the settings file and environment variable expansion.

mod settings;

pub use settings::{
    expand_env_vars, CalculationSettings, LogSettings, QuerySettings, ResultSettings,
    SchemaSettings, Settings, SettingsError,
};
