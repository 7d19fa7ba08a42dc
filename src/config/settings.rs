//! Application settings loading from config.toml
//!
//! Every section is optional. A missing file section, or a missing key inside one,
//! falls back to the built-in defaults (a 1500 free-tier cap with warnings at 1000 and
//! 1400, a five second undo window, no tax).

use crate::core::{savings_cap::CapThresholds, undo::DEFAULT_GRACE_PERIOD};
use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::{path::Path, time::Duration};

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_VAR: &str = "IMPULSE_LEDGER_CONFIG";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Free-tier cap and warning thresholds
    pub savings_cap: CapThresholds,
    /// Undo buffer settings
    pub undo: UndoSettings,
    /// Display-only settings
    pub display: DisplaySettings,
    /// Account settings
    pub account: AccountSettings,
}

/// Undo buffer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UndoSettings {
    /// Grace period in milliseconds
    pub grace_period_ms: u64,
}

impl Default for UndoSettings {
    fn default() -> Self {
        Self {
            grace_period_ms: u64::try_from(DEFAULT_GRACE_PERIOD.as_millis()).unwrap_or(5_000),
        }
    }
}

impl UndoSettings {
    /// The grace period as a `Duration`.
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Display-only settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Sales tax rate applied to displayed totals, e.g. `0.08`
    pub tax_rate: Decimal,
}

/// Account settings for hosts without a live entitlement service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AccountSettings {
    /// Whether the account is exempt from the savings cap
    pub premium: bool,
}

/// Parses settings from TOML text and checks the thresholds are ordered.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    let cap = &settings.savings_cap;
    if !(cap.warning_threshold <= cap.urgent_threshold
        && cap.urgent_threshold <= cap.free_tier_cap)
    {
        return Err(Error::Config {
            message: "savings_cap thresholds must satisfy warning <= urgent <= free_tier_cap"
                .to_string(),
        });
    }
    if settings.display.tax_rate.is_sign_negative() {
        return Err(Error::Config {
            message: "display.tax_rate cannot be negative".to_string(),
        });
    }

    Ok(settings)
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - The thresholds are out of order
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_settings(&contents)
}

/// Loads settings from `IMPULSE_LEDGER_CONFIG` or `./config.toml`, using the defaults
/// when the file does not exist.
pub fn load_default_settings() -> Result<Settings> {
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        tracing::info!(%path, "No config file found; using defaults");
        return Ok(Settings::default());
    }
    tracing::debug!(%path, "Loading settings");
    load_settings(path)
}
