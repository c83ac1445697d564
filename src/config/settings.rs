//! Application settings loaded from config.toml
//!
//! Every field has a default so a missing section (or an empty file) still yields
//! a usable configuration. The `[[balls]]` list seeds the species catalogue on
//! first run.

use crate::core::modifier::{BossEffect, NoModifier, StatModifier};
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level structure of config.toml
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Name shown in battle titles
    pub bot_name: String,
    /// What the collectibles are called in messages
    pub collectible_name: String,
    /// Battle pacing and limits
    pub battle: BattleSettings,
    /// Species seeded into an empty catalogue
    pub balls: Vec<BallConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bot_name: "BallsDex".to_string(),
            collectible_name: "countryball".to_string(),
            battle: BattleSettings::default(),
            balls: Vec::new(),
        }
    }
}

/// Timers and limits of a battle session, in seconds
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BattleSettings {
    /// How often the proposal message is re-rendered
    pub refresh_interval_secs: u64,
    /// Lifetime of the proposal phase
    pub session_timeout_secs: u64,
    /// How long a leader has to pick an action
    pub action_timeout_secs: u64,
    /// Pause before each unit acts and between turns
    pub turn_delay_secs: u64,
    /// Pause around the dice roll
    pub dice_delay_secs: u64,
    /// Largest `amount` accepted by `/battle start`
    pub max_amount: usize,
    /// Boss effect applied to every unit joining a battle
    pub boss_effect: Option<BossEffect>,
}

impl Default for BattleSettings {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 15,
            session_timeout_secs: 15 * 60,
            action_timeout_secs: 10 * 60,
            turn_delay_secs: 5,
            dice_delay_secs: 3,
            max_amount: 30,
            boss_effect: None,
        }
    }
}

impl BattleSettings {
    /// Converts the configured seconds into session timings.
    #[must_use]
    pub const fn timings(&self) -> crate::core::battle::BattleTimings {
        crate::core::battle::BattleTimings {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            session_timeout: Duration::from_secs(self.session_timeout_secs),
            action_timeout: Duration::from_secs(self.action_timeout_secs),
            turn_delay: Duration::from_secs(self.turn_delay_secs),
            dice_delay: Duration::from_secs(self.dice_delay_secs),
        }
    }

    /// Modifier applied when snapshotting units.
    #[must_use]
    pub fn stat_modifier(&self) -> &dyn StatModifier {
        match &self.boss_effect {
            Some(effect) => effect,
            None => &NoModifier,
        }
    }
}

/// One species of the seed catalogue
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BallConfig {
    /// Species name
    pub country: String,
    /// Base health
    pub health: i64,
    /// Base attack
    pub attack: i64,
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load settings from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    parse_settings(&contents)
}

/// Parses settings from TOML text
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from `BALLSDEX_CONFIG`, or ./config.toml. A missing file yields defaults.
pub fn load_default_settings() -> Result<Settings> {
    let path = std::env::var("BALLSDEX_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        tracing::warn!("No configuration file at {path}, using defaults");
        return Ok(Settings::default());
    }
    load_settings(path)
}
