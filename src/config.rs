use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

use crate::schedule::{FALLBACK_REFRESH_MINS, FALLBACK_TOLERANCE_MINS};
use crate::settings::{Settings, SettingsOverrides};

pub const DEFAULT_TABLE_PATHS: &str = "updated_prayer_times.json,prayer_times.json,assets/prayer_times.json";
pub const DEFAULT_TIMEZONE: &str = "Asia/Beirut";

#[derive(Debug, Clone)]
pub struct Config {
    // Table read chain, first usable file wins
    pub table_paths: Vec<PathBuf>,

    // Settings blob written by the app (optional)
    pub settings_path: Option<PathBuf>,

    // Individually stored preferences, applied over the blob
    pub overrides: SettingsOverrides,

    // Zone used to read "now" and to place wake-ups
    pub timezone: Tz,

    // Redundant refresh timer
    pub fallback_refresh_mins: u64,
    pub fallback_tolerance_mins: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present, ignore if missing
        Self::from_getter(|key| env::var(key).ok())
    }

    /// Parse config from a custom getter function (for testing)
    pub fn from_getter<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tz_name = get("TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

        Ok(Config {
            table_paths: get("PRAYER_TABLE_PATHS")
                .unwrap_or_else(|| DEFAULT_TABLE_PATHS.to_string())
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from)
                .collect(),

            settings_path: get("SETTINGS_PATH")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),

            overrides: SettingsOverrides::from_getter(&get),

            timezone: tz_name
                .trim()
                .parse::<Tz>()
                .ok()
                .with_context(|| format!("TIMEZONE '{}' is not a known IANA zone", tz_name))?,

            fallback_refresh_mins: get("FALLBACK_REFRESH_MINS")
                .map(|s| s.trim().parse())
                .transpose()
                .context("FALLBACK_REFRESH_MINS must be a whole number of minutes")?
                .unwrap_or(FALLBACK_REFRESH_MINS),
            fallback_tolerance_mins: get("FALLBACK_TOLERANCE_MINS")
                .map(|s| s.trim().parse())
                .transpose()
                .context("FALLBACK_TOLERANCE_MINS must be a whole number of minutes")?
                .unwrap_or(FALLBACK_TOLERANCE_MINS),
        })
    }

    /// Create config from a HashMap (convenience for testing)
    #[cfg(test)]
    pub fn from_map(map: &HashMap<&str, &str>) -> Result<Self> {
        Self::from_getter(|key| map.get(key).map(|v| v.to_string()))
    }

    /// Validate configuration values at startup.
    /// Returns Ok(()) if all validations pass, or Err with details of what failed.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if self.table_paths.is_empty() {
            errors.push("PRAYER_TABLE_PATHS lists no files.".to_string());
        } else if !self.table_paths.iter().any(|p| p.is_file()) {
            errors.push(format!(
                "No prayer table found. Tried: {}",
                self.table_paths
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        if let Some(path) = &self.settings_path {
            if !path.is_file() {
                errors.push(format!("SETTINGS_PATH '{}' does not exist.", path.display()));
            }
        }

        if self.fallback_refresh_mins == 0 {
            errors.push("FALLBACK_REFRESH_MINS must be greater than 0.".to_string());
        } else if self.fallback_tolerance_mins >= self.fallback_refresh_mins {
            errors.push(format!(
                "FALLBACK_TOLERANCE_MINS={} must be below FALLBACK_REFRESH_MINS={}.",
                self.fallback_tolerance_mins, self.fallback_refresh_mins
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )
        }
    }

    pub fn fallback_offset(&self) -> Duration {
        minutes(self.fallback_refresh_mins)
    }

    pub fn fallback_tolerance(&self) -> Duration {
        minutes(self.fallback_tolerance_mins)
    }

    /// Read the settings blob (if any) and apply the per-key overrides.
    /// An unreadable blob is logged and treated as empty.
    pub fn load_settings(&self) -> Settings {
        let blob = match &self.settings_path {
            Some(path) => match fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    warn!("Cannot read settings at {}: {}", path.display(), e);
                    String::new()
                }
            },
            None => String::new(),
        };
        let settings = Settings::from_json(&blob).overlay(&self.overrides);
        debug!("Selected location '{}'", settings.selected_location);
        settings
    }
}

/// Saturates rather than wrapping for absurd minute counts
fn minutes(mins: u64) -> Duration {
    Duration::from_secs(mins.saturating_mul(60))
}
