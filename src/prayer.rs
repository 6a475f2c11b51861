//! The six daily prayers in their fixed order, with table keys and display names.

use serde::Serialize;

use crate::settings::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrayerKey {
    Fajr,
    Sunrise,
    Dhuhr,
    Asr,
    Maghrib,
    Isha,
}

/// Canonical daily order; position in this array is the prayer's ordinal
pub const PRAYER_ORDER: [PrayerKey; 6] = [
    PrayerKey::Fajr,
    PrayerKey::Sunrise,
    PrayerKey::Dhuhr,
    PrayerKey::Asr,
    PrayerKey::Maghrib,
    PrayerKey::Isha,
];

impl PrayerKey {
    pub fn position(self) -> usize {
        self as usize
    }

    /// Field names this prayer may appear under in the table. The first one is canonical.
    pub fn table_keys(self) -> &'static [&'static str] {
        match self {
            PrayerKey::Fajr => &["fajr"],
            PrayerKey::Sunrise => &["shuruq", "sunrise"],
            PrayerKey::Dhuhr => &["dhuhr"],
            PrayerKey::Asr => &["asr"],
            PrayerKey::Maghrib => &["maghrib"],
            PrayerKey::Isha => &["isha"],
        }
    }

    pub fn from_table_key(key: &str) -> Option<Self> {
        PRAYER_ORDER
            .iter()
            .copied()
            .find(|p| p.table_keys().contains(&key))
    }

    pub fn display_name(self, language: Language) -> &'static str {
        match (language, self) {
            (Language::Ar, PrayerKey::Fajr) => "الصبح",
            (Language::Ar, PrayerKey::Sunrise) => "الشروق",
            (Language::Ar, PrayerKey::Dhuhr) => "الظهر",
            (Language::Ar, PrayerKey::Asr) => "العصر",
            (Language::Ar, PrayerKey::Maghrib) => "المغرب",
            (Language::Ar, PrayerKey::Isha) => "العشاء",
            (Language::En, PrayerKey::Fajr) => "Fajr",
            (Language::En, PrayerKey::Sunrise) => "Shuruq",
            (Language::En, PrayerKey::Dhuhr) => "Dhuhr",
            (Language::En, PrayerKey::Asr) => "Asr",
            (Language::En, PrayerKey::Maghrib) => "Maghrib",
            (Language::En, PrayerKey::Isha) => "Isha",
        }
    }
}

/// Label for fajr once the day has rolled over
pub fn tomorrow_fajr_name(language: Language) -> &'static str {
    match language {
        Language::Ar => "الصبح (غداً)",
        Language::En => "Fajr (tomorrow)",
    }
}

/// Label shown on the placeholder result
pub fn placeholder_name(language: Language) -> &'static str {
    match language {
        Language::Ar => "الفجر",
        Language::En => "Fajr",
    }
}
