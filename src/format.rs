/// Time-of-day parsing and the locale-sensitive strings handed to the display
///
/// Times in the table are `H:MM` or `HH:MM` on a 24-hour clock. Everything here
/// works in seconds since local midnight.

use std::ops::RangeInclusive;
use std::time::Duration;

use crate::error::TimeParseError;
use crate::settings::{Language, Settings, TimeFormat};

pub const SECONDS_PER_DAY: u32 = 24 * 3600;

/// Parse `H:MM` / `HH:MM` into seconds since midnight
pub fn parse_time_of_day(s: &str) -> Result<u32, TimeParseError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(TimeParseError::Blank);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    if parts.len() != 2 {
        return Err(TimeParseError::Arity(trimmed.to_string()));
    }

    let (Some(hour), Some(minute)) = (field(parts[0], 1..=2), field(parts[1], 2..=2)) else {
        return Err(TimeParseError::NotNumeric(trimmed.to_string()));
    };

    if hour > 23 || minute > 59 {
        return Err(TimeParseError::OutOfRange(trimmed.to_string()));
    }

    Ok(hour * 3600 + minute * 60)
}

/// ASCII digits only, no sign, with a digit count in `len`
fn field(s: &str, len: RangeInclusive<usize>) -> Option<u32> {
    if !len.contains(&s.len()) || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Seconds since local midnight for a wall-clock reading
pub fn seconds_of_day(hour: u32, minute: u32, second: u32) -> u32 {
    hour * 3600 + minute * 60 + second
}

/// How a time-of-day is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStyle {
    pub format: TimeFormat,
    pub arabic_numerals: bool,
    pub language: Language,
}

impl From<&Settings> for TimeStyle {
    fn from(settings: &Settings) -> Self {
        Self {
            format: settings.time_format,
            arabic_numerals: settings.use_arabic_numerals,
            language: settings.language,
        }
    }
}

fn am_pm_glyphs(language: Language) -> (&'static str, &'static str) {
    match language {
        Language::Ar => ("ص", "م"),
        Language::En => ("AM", "PM"),
    }
}

/// Render seconds-since-midnight as `HH:MM` or `H:MM <AM/PM>`
pub fn format_time(seconds: u32, style: TimeStyle) -> String {
    let hours = (seconds / 3600) % 24;
    let minutes = (seconds % 3600) / 60;

    let formatted = match style.format {
        TimeFormat::H24 => format!("{:02}:{:02}", hours, minutes),
        TimeFormat::H12 => {
            let (am, pm) = am_pm_glyphs(style.language);
            let (display_hours, marker) = match hours {
                0 => (12, am),
                12 => (12, pm),
                h if h > 12 => (h - 12, pm),
                h => (h, am),
            };
            format!("{}:{:02} {}", display_hours, minutes, marker)
        }
    };

    if style.arabic_numerals {
        to_arabic_numerals(&formatted)
    } else {
        formatted
    }
}

/// Replace every ASCII digit with its Arabic-Indic counterpart (U+0660..U+0669)
pub fn to_arabic_numerals(text: &str) -> String {
    text.chars()
        .map(|c| match c.to_digit(10) {
            Some(d) if c.is_ascii_digit() => char::from_u32(0x0660 + d).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Known cities: (key, Arabic label, English label)
const CITY_LABELS: [(&str, &str, &str); 7] = [
    ("beirut", "بيروت", "Beirut"),
    ("tyre", "صور", "Tyre"),
    ("saida", "صيدا", "Saida"),
    ("tripoli", "طرابلس", "Tripoli"),
    ("baalbek", "بعلبك", "Baalbek"),
    ("hermel", "الهرمل", "Hermel"),
    ("nabatieh-bintjbeil", "النبطية - بنت جبيل", "Nabatieh - Bint Jbeil"),
];

/// Display label for a city key. Unknown keys get their first character capitalized.
pub fn city_label(key: &str, language: Language) -> String {
    let lowered = key.to_lowercase();
    if let Some((_, ar, en)) = CITY_LABELS.iter().find(|(k, _, _)| *k == lowered) {
        return match language {
            Language::Ar => ar.to_string(),
            Language::En => en.to_string(),
        };
    }

    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `HH:MM:SS` countdown; hours are not capped at 24
pub fn format_countdown(millis: u64) -> String {
    let secs = millis / 1000;
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Format duration for logging
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;

    if hours > 0 {
        format!("{}h {}m", hours, mins)
    } else {
        format!("{}m", mins)
    }
}



/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    #[kani::proof]
    fn seconds_of_day_below_one_day() {
        let h: u32 = kani::any();
        let m: u32 = kani::any();
        let s: u32 = kani::any();
        kani::assume(h < 24 && m < 60 && s < 60);
        kani::assert(seconds_of_day(h, m, s) < SECONDS_PER_DAY, "must stay within one day");
    }
}
