//! Adversarial Property-Based Tests for Configuration and Settings Parsing
//!
//! # Attack Plan
//!
//! 1. **Minute Counts**: negative, float, overflow, unicode digits, padding.
//!
//! 2. **Time Zones**: near-miss IANA names, case changes, offsets, empty.
//!
//! 3. **Path Chains**: separators only, whitespace, very long lists.
//!
//! 4. **Settings Blob**: truncated JSON, wrong field types, string-wrapped
//!    blobs, nested string wrapping, arrays, very long values.
//!
//! 5. **Override Values**: unusual booleans, blank strings, mixed case.
//!
//! # Invariants
//!
//! - from_getter never panics on any input
//! - validate() never panics (may return Err)
//! - Settings::from_json is total and never panics
//! - A mistyped field only loses its own value
//! - A blank override never replaces a blob value

use proptest::prelude::*;
use std::collections::HashMap;

use nextprayer::config::Config;
use nextprayer::settings::{Language, Settings, SettingsOverrides, TimeFormat, DEFAULT_CITY};

fn config_from(env: &HashMap<&str, String>) -> anyhow::Result<Config> {
    Config::from_getter(|key| env.get(key).cloned())
}

// ============================================================================
// ADVERSARIAL GENERATORS
// ============================================================================

fn malformed_minutes() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("-1".to_string()),
        Just("-0".to_string()),
        Just("30.5".to_string()),
        Just("1e3".to_string()),
        Just("18446744073709551616".to_string()), // u64::MAX + 1
        Just("".to_string()),
        Just("   ".to_string()),
        Just("thirty".to_string()),
        Just("٣٠".to_string()),   // Arabic-Indic digits
        Just("３０".to_string()), // Fullwidth digits
        Just("30\x00".to_string()),
        Just("+30".to_string()),
        Just(" 30 ".to_string()),
    ]
}

fn hostile_timezone() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("".to_string()),
        Just("asia/beirut".to_string()),
        Just("Asia/Beirut ".to_string()),
        Just("Asia/Beyrouth".to_string()),
        Just("UTC+2".to_string()),
        Just("+02:00".to_string()),
        Just("Asia/Beirut\x00".to_string()),
        Just("../../etc/localtime".to_string()),
        "[A-Za-z/_+-]{0,40}",
    ]
}

fn hostile_blob() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("".to_string()),
        Just("{".to_string()),
        Just("[]".to_string()),
        Just("null".to_string()),
        Just("42".to_string()),
        Just(r#""""#.to_string()),
        Just(r#""{\"selectedLocation\":\"tyre\"}""#.to_string()),
        Just(r#""\"{\\\"selectedLocation\\\":\\\"tyre\\\"}\"""#.to_string()),
        Just(r#"{"selectedLocation":42}"#.to_string()),
        Just(r#"{"timeFormat":null,"language":7}"#.to_string()),
        Just(r#"{"useArabicNumerals":"yes"}"#.to_string()),
        Just(r#"{"enabledPrayers":{"fajr":"on"}}"#.to_string()),
        ".{0,200}",
    ]
}

// ============================================================================
// CONFIG PARSING
// ============================================================================

proptest! {
    #[test]
    fn malformed_minutes_never_panic(refresh in malformed_minutes(), tolerance in malformed_minutes()) {
        let mut env = HashMap::new();
        env.insert("FALLBACK_REFRESH_MINS", refresh);
        env.insert("FALLBACK_TOLERANCE_MINS", tolerance);
        if let Ok(config) = config_from(&env) {
            let _ = config.validate();
        }
    }

    #[test]
    fn hostile_timezone_never_panics(tz in hostile_timezone()) {
        let mut env = HashMap::new();
        env.insert("TIMEZONE", tz);
        let _ = config_from(&env);
    }

    #[test]
    fn arbitrary_path_chain_never_panics(chain in ".{0,500}") {
        let mut env = HashMap::new();
        env.insert("PRAYER_TABLE_PATHS", chain);
        if let Ok(config) = config_from(&env) {
            prop_assert!(config.table_paths.iter().all(|p| !p.as_os_str().is_empty()));
            let _ = config.validate();
        }
    }
}

#[test]
fn separator_only_chain_fails_validation() {
    let mut env = HashMap::new();
    env.insert("PRAYER_TABLE_PATHS", ",,, ,".to_string());
    let config = config_from(&env).expect("chain itself parses");
    assert!(config.table_paths.is_empty());
    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("PRAYER_TABLE_PATHS"), "{}", err);
}

#[test]
fn long_path_chain_keeps_every_entry() {
    let chain: Vec<String> = (0..1000).map(|i| format!("t{}.json", i)).collect();
    let mut env = HashMap::new();
    env.insert("PRAYER_TABLE_PATHS", chain.join(","));
    let config = config_from(&env).unwrap();
    assert_eq!(config.table_paths.len(), 1000);
}

#[test]
fn timezone_names_are_case_sensitive() {
    let mut env = HashMap::new();
    env.insert("TIMEZONE", "asia/beirut".to_string());
    assert!(config_from(&env).is_err());

    env.insert("TIMEZONE", " Asia/Beirut ".to_string());
    assert_eq!(config_from(&env).unwrap().timezone, chrono_tz::Asia::Beirut);
}

// ============================================================================
// SETTINGS BLOB
// ============================================================================

proptest! {
    #[test]
    fn settings_blob_is_total(blob in hostile_blob()) {
        let s = Settings::from_json(&blob);
        prop_assert!(!s.selected_location.trim().is_empty());
    }

    #[test]
    fn long_location_survives(len in 1_000usize..20_000) {
        let city = "x".repeat(len);
        let blob = format!(r#"{{"selectedLocation":"{}"}}"#, city);
        prop_assert_eq!(Settings::from_json(&blob).selected_location.len(), len);
    }

    #[test]
    fn blank_overrides_never_replace_blob(blank in "[ \t]{0,5}") {
        let overrides = SettingsOverrides::from_getter(|_| Some(blank.clone()));
        let s = Settings::from_json(r#"{"selectedLocation":"tyre","timeFormat":"24h"}"#).overlay(&overrides);
        prop_assert_eq!(s.selected_location, "tyre");
        prop_assert_eq!(s.time_format, TimeFormat::H24);
    }

    #[test]
    fn unknown_time_format_is_12h(value in "[a-z0-9]{0,6}") {
        prop_assume!(value != "24h");
        prop_assert_eq!(TimeFormat::parse(&value), TimeFormat::H12);
    }
}

#[test]
fn wrong_typed_sibling_keeps_city() {
    for blob in [
        r#"{"selectedLocation":"tyre","timeFormat":"24h","useArabicNumerals":null}"#,
        r#"{"selectedLocation":"tyre","timeFormat":"24h","isDarkMode":"true"}"#,
        r#"{"selectedLocation":"tyre","timeFormat":"24h","language":7,"enabledPrayers":"all"}"#,
    ] {
        let s = Settings::from_json(blob);
        assert_eq!(s.selected_location, "tyre", "{}", blob);
        assert_eq!(s.time_format, TimeFormat::H24, "{}", blob);
    }
}

#[test]
fn wrong_typed_location_is_default_city() {
    let s = Settings::from_json(r#"{"selectedLocation":42,"language":"en"}"#);
    assert_eq!(s.selected_location, DEFAULT_CITY);
    assert_eq!(s.language, Language::En);
}

#[test]
fn string_wrapped_blob_is_unwrapped() {
    let s = Settings::from_json(r#""{\"selectedLocation\":\"tyre\",\"language\":\"en\"}""#);
    assert_eq!(s.selected_location, "tyre");
    assert_eq!(s.language, Language::En);
}

#[test]
fn unusual_booleans_are_ignored() {
    let overrides = SettingsOverrides::from_getter(|key| match key {
        "USE_AR_NUMS" => Some("maybe".to_string()),
        "DARK_MODE" => Some("TRUE".to_string()),
        _ => None,
    });
    assert_eq!(overrides.use_arabic_numerals, None);
    assert_eq!(overrides.is_dark_mode, Some(true));
}
