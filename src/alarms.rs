/// Upcoming prayer notifications
///
/// Plans one notification per enabled prayer for the next few dated rows of a
/// city. Ids encode the local instant as `YYYYMMDDHHmm`, so re-planning the
/// same period yields the same ids and the scheduler can replace rather than
/// duplicate.

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use tracing::debug;

use crate::prayer::{PrayerKey, PRAYER_ORDER};
use crate::settings::{Language, Settings};
use crate::table::DailyRecord;

pub const DEFAULT_PLAN_DAYS: usize = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAlarm {
    pub id: u64,
    pub prayer: PrayerKey,
    pub at: NaiveDateTime,
    pub title: String,
    pub body: String,
}

/// Numeric id `YYYYMMDDHHmm` for a local instant
pub fn alarm_id(at: &NaiveDateTime) -> u64 {
    let date = at.date();
    date.year().max(0) as u64 * 100_000_000
        + date.month() as u64 * 1_000_000
        + date.day() as u64 * 10_000
        + at.hour() as u64 * 100
        + at.minute() as u64
}

fn notification_text(key: PrayerKey, language: Language) -> (String, String) {
    let name = key.display_name(language);
    match language {
        Language::Ar => ("تذكير الصلاة".to_string(), format!("حان موعد صلاة {}", name)),
        Language::En => ("Prayer Reminder".to_string(), format!("It's time for {} prayer.", name)),
    }
}

/// Alarms for enabled prayers strictly after `now`, over the first `days`
/// rows dated today or later. Undated rows and malformed times are skipped.
pub fn upcoming_alarms(
    records: &[DailyRecord],
    settings: &Settings,
    now: NaiveDateTime,
    days: usize,
) -> Vec<PlannedAlarm> {
    let today = now.date();

    let mut dated: Vec<_> = records
        .iter()
        .filter_map(|r| Some((r.date?.to_naive()?, r)))
        .filter(|(date, _)| *date >= today)
        .collect();
    dated.sort_by_key(|(date, _)| *date);
    dated.dedup_by_key(|(date, _)| *date);

    let mut alarms = Vec::new();
    for (date, record) in dated.into_iter().take(days) {
        for key in PRAYER_ORDER {
            if !settings.is_enabled(key) {
                continue;
            }
            let Some(secs) = record.seconds(key) else {
                continue;
            };
            let Some(time) = NaiveTime::from_num_seconds_from_midnight_opt(secs, 0) else {
                continue;
            };
            let at = date.and_time(time);
            if at <= now {
                continue;
            }
            let (title, body) = notification_text(key, settings.language);
            alarms.push(PlannedAlarm {
                id: alarm_id(&at),
                prayer: key,
                at,
                title,
                body,
            });
        }
    }

    debug!("Planned {} alarm(s) from {}", alarms.len(), now);
    alarms
}
