/// Locate today's row in a city's (possibly sparse, unsorted) daily rows
///
/// Lookup order: exact date match, then clamp-by-day when the first row is in
/// the current month, then index 0 as a low-confidence fallback.

use tracing::{debug, warn};

use crate::error::EngineError;
use crate::settings::DEFAULT_CITY;
use crate::table::{CalendarDate, DailyRecord, PrayerTable};

/// How today's row was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    /// Table assumed dense by day-of-month
    Clamped,
    /// Nothing matched; first row used
    Fallback,
}

/// Today's position in a city's rows
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    pub city: &'a str,
    pub records: &'a [DailyRecord],
    pub index: usize,
    pub kind: MatchKind,
}

impl<'a> Resolution<'a> {
    pub fn today(&self) -> &'a DailyRecord {
        &self.records[self.index]
    }

    /// Previous row in table order, wrapping to the end
    pub fn yesterday(&self) -> &'a DailyRecord {
        let len = self.records.len();
        &self.records[(self.index + len - 1) % len]
    }

    /// Next row in table order, wrapping to the start
    pub fn tomorrow(&self) -> &'a DailyRecord {
        &self.records[(self.index + 1) % self.records.len()]
    }

    pub fn is_low_confidence(&self) -> bool {
        self.kind == MatchKind::Fallback
    }
}

/// Index of today's row. Errors only when there are no rows at all.
pub fn locate_day(records: &[DailyRecord], today: CalendarDate) -> Result<(usize, MatchKind), EngineError> {
    if records.is_empty() {
        return Err(EngineError::EmptyCity);
    }

    if let Some(index) = records.iter().position(|r| r.date == Some(today)) {
        return Ok((index, MatchKind::Exact));
    }

    if let Some(first) = records[0].date {
        if first.month == today.month && first.year == today.year {
            let index = (today.day as usize).saturating_sub(1).min(records.len() - 1);
            debug!(
                "No row dated {}/{}/{}, clamping to index {}",
                today.day, today.month, today.year, index
            );
            return Ok((index, MatchKind::Clamped));
        }
    }

    warn!(
        "No row for {}/{}/{} and first row is another month, using index 0",
        today.day, today.month, today.year
    );
    Ok((0, MatchKind::Fallback))
}

/// Resolve today's row for exactly the given city key
pub fn resolve_today<'a>(
    table: &'a PrayerTable,
    city_key: &'a str,
    today: CalendarDate,
) -> Option<Resolution<'a>> {
    let records = table.city(city_key)?;
    let (index, kind) = locate_day(records, today).ok()?;
    Some(Resolution {
        city: city_key,
        records,
        index,
        kind,
    })
}

/// Resolve today's row, retrying once with the default city when the requested one is missing
pub fn resolve_with_default<'a>(
    table: &'a PrayerTable,
    city_key: &'a str,
    today: CalendarDate,
) -> Option<Resolution<'a>> {
    if let Some(resolution) = resolve_today(table, city_key, today) {
        return Some(resolution);
    }
    if city_key == DEFAULT_CITY {
        return None;
    }
    warn!("City '{}' has no rows, falling back to '{}'", city_key, DEFAULT_CITY);
    resolve_today(table, DEFAULT_CITY, today)
}
