/// Per-city prayer-time table and its JSON loader
///
/// The table is a JSON object mapping a city key to an array of daily rows:
///
/// ```json
/// {"last_updated": "2025-09-01",
///  "beirut": [{"date": "1/1/2025", "fajr": "05:30", "shuruq": "6:50", ...}]}
/// ```
///
/// Rows are not assumed to be sorted or contiguous. Non-array members are
/// metadata, rows that are not objects are dropped, and fields that are not
/// strings are treated as absent.

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::TableError;
use crate::format::parse_time_of_day;
use crate::prayer::PrayerKey;

/// Gregorian day/month/year as written in the table (`D/M/YYYY`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl CalendarDate {
    pub fn new(day: u32, month: u32, year: i32) -> Self {
        Self { year, month, day }
    }

    /// Parse `D/M/YYYY`; zero padding is optional. Wrong arity or non-numeric parts yield None.
    pub fn parse(s: &str) -> Option<Self> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        if parts.len() != 3 {
            return None;
        }
        let day = unsigned(parts[0])?;
        let month = unsigned(parts[1])?;
        let year = unsigned(parts[2])?;
        Some(Self::new(day, month, i32::try_from(year).ok()?))
    }

    pub fn to_naive(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }
}

/// Plain ASCII digits; signs and other numerals are rejected
fn unsigned(s: &str) -> Option<u32> {
    let s = s.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

impl From<NaiveDate> for CalendarDate {
    fn from(date: NaiveDate) -> Self {
        Self::new(date.day(), date.month(), date.year())
    }
}

/// One city's prayer times for one calendar day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyRecord {
    /// Date as written in the source, kept for logging
    pub raw_date: String,
    /// None when the date field is missing or malformed
    pub date: Option<CalendarDate>,
    times: BTreeMap<PrayerKey, String>,
    /// Fields the engine does not use (imsak, midnight, day_name, ...)
    extra: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    date: Option<serde_json::Value>,
    #[serde(flatten)]
    fields: BTreeMap<String, serde_json::Value>,
}

impl DailyRecord {
    pub fn new(date: &str) -> Self {
        Self {
            raw_date: date.to_string(),
            date: CalendarDate::parse(date),
            ..Self::default()
        }
    }

    /// Builder used when assembling records by hand
    pub fn with(mut self, key: PrayerKey, time: &str) -> Self {
        self.times.insert(key, time.to_string());
        self
    }

    fn from_json(value: serde_json::Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        let raw: RawRecord = serde_json::from_value(value).ok()?;

        let raw_date = match raw.date {
            Some(serde_json::Value::String(s)) => s,
            _ => String::new(),
        };
        let mut record = Self::new(&raw_date);

        for (field, value) in raw.fields {
            let serde_json::Value::String(text) = value else {
                continue;
            };
            match PrayerKey::from_table_key(&field) {
                // "shuruq" and "sunrise" share a slot; first non-blank value wins
                Some(key) => {
                    let slot = record.times.entry(key).or_default();
                    if slot.trim().is_empty() {
                        *slot = text;
                    }
                }
                None => {
                    record.extra.insert(field, text);
                }
            }
        }

        Some(record)
    }

    /// Non-blank time string for a prayer
    pub fn time(&self, key: PrayerKey) -> Option<&str> {
        self.times
            .get(&key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Seconds since midnight for a prayer; blank or malformed times are None
    pub fn seconds(&self, key: PrayerKey) -> Option<u32> {
        let time = self.time(key)?;
        match parse_time_of_day(time) {
            Ok(secs) => Some(secs),
            Err(e) => {
                debug!("Skipping {:?} on '{}': {}", key, self.raw_date, e);
                None
            }
        }
    }

    pub fn extra(&self, field: &str) -> Option<&str> {
        self.extra.get(field).map(String::as_str)
    }
}

/// City key -> daily rows, plus table metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrayerTable {
    cities: HashMap<String, Vec<DailyRecord>>,
    last_updated: Option<String>,
}

impl PrayerTable {
    pub fn from_json(json: &str) -> Result<Self, TableError> {
        let root: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(members) = root else {
            return Err(TableError::NotAnObject);
        };

        let mut table = PrayerTable::default();
        for (key, value) in members {
            match value {
                serde_json::Value::Array(rows) => {
                    let total = rows.len();
                    let records: Vec<DailyRecord> =
                        rows.into_iter().filter_map(DailyRecord::from_json).collect();
                    if records.len() < total {
                        warn!(
                            "City '{}': dropped {} malformed row(s)",
                            key,
                            total - records.len()
                        );
                    }
                    table.cities.insert(key, records);
                }
                serde_json::Value::String(s) if key == "last_updated" => {
                    table.last_updated = Some(s);
                }
                _ => debug!("Ignoring non-city member '{}'", key),
            }
        }

        Ok(table)
    }

    pub fn insert_city(&mut self, key: &str, records: Vec<DailyRecord>) {
        self.cities.insert(key.to_string(), records);
    }

    /// Rows for a city; absent and empty cities are both None
    pub fn city(&self, key: &str) -> Option<&[DailyRecord]> {
        self.cities
            .get(key)
            .map(Vec::as_slice)
            .filter(|records| !records.is_empty())
    }

    pub fn city_keys(&self) -> impl Iterator<Item = &str> {
        self.cities.keys().map(String::as_str)
    }

    pub fn last_updated(&self) -> Option<&str> {
        self.last_updated.as_deref()
    }
}

/// Read the table from the first usable path (downloaded update, local copy, bundled asset)
pub fn load_table<P: AsRef<Path>>(paths: &[P]) -> Result<PrayerTable, TableError> {
    for path in paths {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(source) => {
                let err = TableError::Io {
                    path: PathBuf::from(path),
                    source,
                };
                debug!("{}", err);
                continue;
            }
        };
        if contents.trim().is_empty() {
            debug!("Prayer table at {} is empty, trying next", path.display());
            continue;
        }

        match PrayerTable::from_json(&contents) {
            Ok(table) => {
                info!(
                    "Loaded prayer table from {} (last updated: {})",
                    path.display(),
                    table.last_updated().unwrap_or("unknown")
                );
                return Ok(table);
            }
            Err(e) => warn!("Unusable prayer table at {}: {}", path.display(), e),
        }
    }

    Err(TableError::Unavailable(paths.len()))
}
