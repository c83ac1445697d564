/// Database configuration and connection management
pub mod database;

/// Application settings from config.toml
pub mod settings;

pub use settings::{BattleSettings, Settings};
