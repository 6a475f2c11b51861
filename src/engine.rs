/// Next-prayer engine
///
/// Given today's position in a city's rows and the local wall-clock time,
/// determines the next prayer, the countdown to it, and the window since the
/// previous prayer. The public entry point, [`resolve_moment`], is total: any
/// missing data or unexpected state yields [`Outcome::Degraded`] carrying a
/// fixed placeholder instead of an error.

use chrono::{NaiveDateTime, Timelike};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::format::{city_label, format_countdown, format_time, seconds_of_day, TimeStyle, SECONDS_PER_DAY};
use crate::prayer::{placeholder_name, tomorrow_fajr_name, PrayerKey, PRAYER_ORDER};
use crate::resolver::{resolve_with_default, MatchKind, Resolution};
use crate::settings::{Language, Settings, DEFAULT_CITY};
use crate::table::{CalendarDate, DailyRecord, PrayerTable};

/// Time shown when nothing better is known; also assumed for a missing tomorrow fajr
pub const PLACEHOLDER_TIME: &str = "05:30";
pub const PLACEHOLDER_SECONDS: u32 = 5 * 3600 + 30 * 60;

/// Result of a total operation: the value is always usable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Outcome<T> {
    Resolved(T),
    /// Fixed low-confidence placeholder
    Degraded(T),
}

impl<T> Outcome<T> {
    pub fn value(&self) -> &T {
        match self {
            Outcome::Resolved(v) | Outcome::Degraded(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Outcome::Resolved(v) | Outcome::Degraded(v) => v,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Outcome::Degraded(_))
    }
}

/// How much the display can trust the moment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    /// Row chosen by day-of-month clamp
    Approximate,
    Low,
}

impl From<MatchKind> for Confidence {
    fn from(kind: MatchKind) -> Self {
        match kind {
            MatchKind::Exact => Confidence::High,
            MatchKind::Clamped => Confidence::Approximate,
            MatchKind::Fallback => Confidence::Low,
        }
    }
}

/// Raw engine decision before localization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextPrayer {
    pub key: PrayerKey,
    /// Time of day of the prayer, seconds since midnight
    pub seconds: u32,
    pub millis_until: u64,
    /// 0 when the previous boundary is unknown
    pub total_window_millis: u64,
    /// True when the next prayer is tomorrow's fajr
    pub rolled_over: bool,
}

/// Everything the display needs without doing date arithmetic of its own
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedMoment {
    pub prayer: PrayerKey,
    pub prayer_name: String,
    pub time: String,
    pub city: String,
    pub millis_until: u64,
    pub total_window_millis: u64,
    pub elapsed_percent: u8,
    pub countdown: String,
    pub rolled_over: bool,
    pub confidence: Confidence,
}

impl ResolvedMoment {
    /// The fixed degraded result
    pub fn placeholder(city: String, language: Language) -> Self {
        Self {
            prayer: PrayerKey::Fajr,
            prayer_name: placeholder_name(language).to_string(),
            time: PLACEHOLDER_TIME.to_string(),
            city,
            millis_until: 0,
            total_window_millis: 0,
            elapsed_percent: 0,
            countdown: format_countdown(0),
            rolled_over: false,
            confidence: Confidence::Low,
        }
    }
}

/// Percent of the way from the previous prayer to the next, in `[0, 100]`
pub fn elapsed_percent(millis_until: u64, total_window_millis: u64) -> u8 {
    if total_window_millis == 0 {
        return 0;
    }
    let done = total_window_millis.saturating_sub(millis_until) as f64;
    let pct = (done * 100.0 / total_window_millis as f64).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Isha, or maghrib when isha is blank
fn night_boundary(record: &DailyRecord) -> Option<u32> {
    record
        .seconds(PrayerKey::Isha)
        .or_else(|| record.seconds(PrayerKey::Maghrib))
}

/// Seconds of the prayer preceding `PRAYER_ORDER[position]`; negative means yesterday
fn previous_boundary(today: &DailyRecord, yesterday: &DailyRecord, position: usize) -> Option<i64> {
    let earlier_today = PRAYER_ORDER[..position]
        .iter()
        .rev()
        .find_map(|key| today.seconds(*key));

    match earlier_today {
        Some(secs) => Some(secs as i64),
        None => night_boundary(yesterday).map(|secs| secs as i64 - SECONDS_PER_DAY as i64),
    }
}

/// Find the next prayer for the row at `today_index`
pub fn find_next(
    records: &[DailyRecord],
    today_index: usize,
    now_seconds: u32,
) -> Result<NextPrayer, EngineError> {
    let len = records.len();
    if len == 0 {
        return Err(EngineError::EmptyCity);
    }
    if today_index >= len {
        return Err(EngineError::IndexOutOfRange { index: today_index, len });
    }

    let today = &records[today_index];
    let yesterday = &records[(today_index + len - 1) % len];
    let tomorrow = &records[(today_index + 1) % len];
    let now = now_seconds as i64;

    for (position, key) in PRAYER_ORDER.iter().enumerate() {
        let Some(secs) = today.seconds(*key) else {
            continue;
        };
        if secs as i64 <= now {
            continue;
        }

        let total_window_millis = match previous_boundary(today, yesterday, position) {
            Some(prev) => ((secs as i64 - prev) * 1000) as u64,
            None => {
                debug!("No previous boundary for {:?}, window unknown", key);
                0
            }
        };

        return Ok(NextPrayer {
            key: *key,
            seconds: secs,
            millis_until: ((secs as i64 - now) * 1000) as u64,
            total_window_millis,
            rolled_over: false,
        });
    }

    let fajr = tomorrow.seconds(PrayerKey::Fajr).unwrap_or_else(|| {
        warn!(
            "Tomorrow's fajr missing on '{}', assuming {}",
            tomorrow.raw_date, PLACEHOLDER_TIME
        );
        PLACEHOLDER_SECONDS
    });
    let seconds_left_today = SECONDS_PER_DAY as i64 - now;
    let millis_until = ((seconds_left_today + fajr as i64) * 1000) as u64;
    let total_window_millis = match night_boundary(today) {
        Some(isha) => (((SECONDS_PER_DAY - isha) + fajr) as u64) * 1000,
        None => 0,
    };

    Ok(NextPrayer {
        key: PrayerKey::Fajr,
        seconds: fajr,
        millis_until,
        total_window_millis,
        rolled_over: true,
    })
}

fn localize(next: NextPrayer, city: &str, kind: MatchKind, settings: &Settings) -> ResolvedMoment {
    let style = TimeStyle::from(settings);
    let prayer_name = if next.rolled_over {
        tomorrow_fajr_name(settings.language)
    } else {
        next.key.display_name(settings.language)
    };

    ResolvedMoment {
        prayer: next.key,
        prayer_name: prayer_name.to_string(),
        time: format_time(next.seconds, style),
        city: city_label(city, settings.language),
        millis_until: next.millis_until,
        total_window_millis: next.total_window_millis,
        elapsed_percent: elapsed_percent(next.millis_until, next.total_window_millis),
        countdown: format_countdown(next.millis_until),
        rolled_over: next.rolled_over,
        confidence: kind.into(),
    }
}

/// Resolve the moment for an already located day
pub fn moment_for(resolution: &Resolution<'_>, now: NaiveDateTime, settings: &Settings) -> Result<ResolvedMoment, EngineError> {
    let now_seconds = seconds_of_day(now.hour(), now.minute(), now.second());
    let next = find_next(resolution.records, resolution.index, now_seconds)?;
    Ok(localize(next, resolution.city, resolution.kind, settings))
}

/// Resolve the next prayer for the selected city at `now` (local wall-clock time).
///
/// `table` is None when the table could not be loaded.
pub fn resolve_moment(table: Option<&PrayerTable>, settings: &Settings, now: NaiveDateTime) -> Outcome<ResolvedMoment> {
    let requested = settings.selected_location.as_str();
    let degraded = |city: &str| {
        Outcome::Degraded(ResolvedMoment::placeholder(
            city_label(city, settings.language),
            settings.language,
        ))
    };

    let Some(table) = table else {
        warn!("Prayer table unavailable, showing placeholder");
        return degraded(requested);
    };

    let today = CalendarDate::from(now.date());
    let Some(resolution) = resolve_with_default(table, requested, today) else {
        warn!("No rows for '{}' or the default city, showing placeholder", requested);
        return degraded(DEFAULT_CITY);
    };

    match moment_for(&resolution, now, settings) {
        Ok(moment) => {
            debug!(
                "Next prayer {:?} at {} in {} ({}% elapsed)",
                moment.prayer, moment.time, moment.countdown, moment.elapsed_percent
            );
            Outcome::Resolved(moment)
        }
        Err(e) => {
            warn!("Engine failure for '{}': {}", resolution.city, e);
            degraded(resolution.city)
        }
    }
}



/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    #[kani::proof]
    fn elapsed_percent_never_exceeds_100() {
        let until: u64 = kani::any();
        let total: u64 = kani::any();
        kani::assume(total < 1 << 40 && until < 1 << 40);
        kani::assert(elapsed_percent(until, total) <= 100, "percent must be <= 100");
    }
}
