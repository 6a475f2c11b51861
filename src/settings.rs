/// User display preferences, read from the external settings store
///
/// The store is a JSON blob (possibly double-encoded as a JSON string) plus an
/// optional layer of per-key overrides that win over the blob. Every field may
/// be missing; reading settings never fails.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::prayer::PrayerKey;

pub const DEFAULT_CITY: &str = "beirut";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFormat {
    #[default]
    H12,
    H24,
}

impl TimeFormat {
    /// Anything other than "24h" (case-insensitive) means 12-hour display
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("24h") {
            TimeFormat::H24
        } else {
            TimeFormat::H12
        }
    }
}

impl<'de> Deserialize<'de> for TimeFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(TimeFormat::parse).unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Language {
    #[default]
    Ar,
    En,
}

impl Language {
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("en") {
            Language::En
        } else {
            Language::Ar
        }
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(raw.as_str().map(Language::parse).unwrap_or_default())
    }
}

// Field readers for the blob. A mistyped field falls back to its own default
// and never takes its siblings down with it.

fn location_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw.as_str() {
        Some(city) if !city.trim().is_empty() => city.to_string(),
        _ => {
            debug!("selectedLocation unusable ({}), using {}", raw, DEFAULT_CITY);
            DEFAULT_CITY.to_string()
        }
    })
}

fn lenient_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::String(s) => parse_bool(s),
        Value::Number(n) => n.as_u64().and_then(|n| match n {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }),
        _ => None,
    }
}

fn bool_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(lenient_bool(&Value::deserialize(deserializer)?).unwrap_or(false))
}

fn toggles_or_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BTreeMap<String, bool>, D::Error> {
    let raw = Value::deserialize(deserializer)?;
    let Some(entries) = raw.as_object() else {
        return Ok(BTreeMap::new());
    };
    Ok(entries
        .iter()
        .filter_map(|(key, value)| Some((key.clone(), lenient_bool(value)?)))
        .collect())
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    #[serde(deserialize_with = "location_or_default")]
    pub selected_location: String,
    pub time_format: TimeFormat,
    #[serde(deserialize_with = "bool_or_default")]
    pub use_arabic_numerals: bool,
    #[serde(deserialize_with = "bool_or_default")]
    pub is_dark_mode: bool,
    pub language: Language,
    /// Per-prayer notification toggles keyed by table key ("fajr", "shuruq", ...)
    #[serde(deserialize_with = "toggles_or_empty")]
    pub enabled_prayers: BTreeMap<String, bool>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            selected_location: DEFAULT_CITY.to_string(),
            time_format: TimeFormat::H12,
            use_arabic_numerals: false,
            is_dark_mode: false,
            language: Language::Ar,
            enabled_prayers: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Parse the settings blob. Mistyped fields fall back one by one; only a
    /// blob that is not a JSON object falls back to defaults as a whole.
    pub fn from_json(blob: &str) -> Self {
        let trimmed = blob.trim();
        if trimmed.is_empty() {
            return Self::default();
        }

        // The store sometimes holds the blob as a JSON string of JSON
        let decoded = match serde_json::from_str::<String>(trimmed) {
            Ok(inner) => {
                debug!("Settings blob was string-encoded, unwrapping");
                inner
            }
            Err(_) => trimmed.to_string(),
        };

        match serde_json::from_str::<Settings>(&decoded) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings blob: {}", e);
                Self::default()
            }
        }
    }

    /// Apply the per-key preference layer on top of the blob
    pub fn overlay(mut self, overrides: &SettingsOverrides) -> Self {
        if let Some(location) = &overrides.selected_location {
            self.selected_location = location.clone();
        }
        if let Some(format) = overrides.time_format {
            self.time_format = format;
        }
        if let Some(arabic) = overrides.use_arabic_numerals {
            self.use_arabic_numerals = arabic;
        }
        if let Some(dark) = overrides.is_dark_mode {
            self.is_dark_mode = dark;
        }
        self
    }

    /// Whether notifications are switched on for a prayer
    pub fn is_enabled(&self, key: PrayerKey) -> bool {
        key.table_keys()
            .iter()
            .any(|k| self.enabled_prayers.get(*k).copied().unwrap_or(false))
    }
}

/// Individually stored preferences that take precedence over the blob
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsOverrides {
    pub selected_location: Option<String>,
    pub time_format: Option<TimeFormat>,
    pub use_arabic_numerals: Option<bool>,
    pub is_dark_mode: Option<bool>,
}

impl SettingsOverrides {
    pub fn from_getter<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            selected_location: get("SELECTED_LOCATION").filter(|s| !s.trim().is_empty()),
            time_format: get("TIME_FORMAT")
                .filter(|s| !s.trim().is_empty())
                .map(|s| TimeFormat::parse(&s)),
            use_arabic_numerals: get("USE_AR_NUMS").and_then(|s| parse_bool(&s)),
            is_dark_mode: get("DARK_MODE").and_then(|s| parse_bool(&s)),
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Reading settings is total
        #[test]
        fn from_json_never_panics(blob in ".*") {
            let _ = Settings::from_json(&blob);
        }

        #[test]
        fn time_format_only_24h_is_24h(s in "[a-zA-Z0-9 ]{0,8}") {
            let expected = if s.trim().eq_ignore_ascii_case("24h") { TimeFormat::H24 } else { TimeFormat::H12 };
            prop_assert_eq!(TimeFormat::parse(&s), expected);
        }
    }
}
