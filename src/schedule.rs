/// Refresh scheduling
/// Computes the instant the display must refresh (the start of the next prayer),
/// the redundant fallback timer, and drives the refresh loop for the binary.

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::PLACEHOLDER_SECONDS;
use crate::format::format_duration;
use crate::prayer::{PrayerKey, PRAYER_ORDER};
use crate::resolver::{resolve_with_default, Resolution};
use crate::table::{CalendarDate, PrayerTable};

pub const FALLBACK_REFRESH_MINS: u64 = 30;
pub const FALLBACK_TOLERANCE_MINS: u64 = 2;

/// Wait used when there is nothing to schedule
pub const IDLE_RETRY: Duration = Duration::from_secs(FALLBACK_REFRESH_MINS * 60);

/// Resolve a local wall-clock reading in `tz`, preferring the earlier instant on DST overlap
fn localize<Tz: TimeZone>(tz: &Tz, date: NaiveDate, seconds: u32) -> Option<DateTime<Tz>> {
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)?;
    let local = date.and_time(time);
    tz.from_local_datetime(&local)
        .earliest()
        // Inside a DST gap: fire an hour later rather than never
        .or_else(|| tz.from_local_datetime(&(local + ChronoDuration::hours(1))).earliest())
}

/// Next wake-up for an already located day: first upcoming prayer today,
/// otherwise tomorrow's fajr on tomorrow's date
pub fn next_wakeup_instant<Tz: TimeZone>(resolution: &Resolution<'_>, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let local = now.naive_local();
    let now_secs = local.time().num_seconds_from_midnight();
    let today = resolution.today();

    for key in PRAYER_ORDER {
        let Some(secs) = today.seconds(key) else {
            continue;
        };
        if secs > now_secs {
            debug!("Next wake-up at {:?} today", key);
            return localize(&now.timezone(), local.date(), secs);
        }
    }

    let tomorrow = resolution.tomorrow();
    let fajr = tomorrow.seconds(PrayerKey::Fajr).unwrap_or_else(|| {
        warn!("Tomorrow's fajr missing on '{}', waking at placeholder time", tomorrow.raw_date);
        PLACEHOLDER_SECONDS
    });
    let tomorrow_date = local.date().succ_opt()?;
    localize(&now.timezone(), tomorrow_date, fajr)
}

/// Next wake-up for the selected city. None means "no schedule": do not register a timer.
pub fn next_wakeup<Tz: TimeZone>(table: Option<&PrayerTable>, city_key: &str, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let table = table?;
    let today = CalendarDate::from(now.naive_local().date());
    let resolution = resolve_with_default(table, city_key, today)?;
    next_wakeup_instant(&resolution, now)
}

/// Timers to register after a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeupPlan<Tz: TimeZone> {
    None,
    Scheduled {
        primary: DateTime<Tz>,
        /// Redundant timer in case the primary is missed
        fallback: Option<DateTime<Tz>>,
    },
}

impl<Tz: TimeZone> WakeupPlan<Tz> {
    /// Earliest registered timer
    pub fn next_trigger(&self) -> Option<DateTime<Tz>> {
        match self {
            WakeupPlan::None => None,
            WakeupPlan::Scheduled { primary, fallback } => match fallback {
                Some(f) if f < primary => Some(f.clone()),
                _ => Some(primary.clone()),
            },
        }
    }
}

/// Pair the primary wake-up with a fallback `offset` from now, unless the
/// fallback would land within `tolerance` of the primary
pub fn plan_refresh<Tz: TimeZone>(
    primary: Option<DateTime<Tz>>,
    now: &DateTime<Tz>,
    offset: Duration,
    tolerance: Duration,
) -> WakeupPlan<Tz> {
    let Some(primary) = primary else {
        return WakeupPlan::None;
    };
    let (Ok(offset), Ok(tolerance)) = (ChronoDuration::from_std(offset), ChronoDuration::from_std(tolerance)) else {
        return WakeupPlan::Scheduled { primary, fallback: None };
    };

    let Some(fallback_at) = now.clone().checked_add_signed(offset) else {
        warn!("Fallback offset is out of range, registering the primary only");
        return WakeupPlan::Scheduled { primary, fallback: None };
    };
    // A tolerance reaching past the calendar range is unbounded on that side
    let below = primary.clone().checked_sub_signed(tolerance).is_some_and(|low| fallback_at < low);
    let above = primary.clone().checked_add_signed(tolerance).is_some_and(|high| fallback_at > high);
    let distinct = below || above;

    WakeupPlan::Scheduled {
        primary,
        fallback: distinct.then_some(fallback_at),
    }
}

/// Time from `now` until `target`, zero if it has passed
pub fn time_until<Tz: TimeZone>(target: &DateTime<Tz>, now: &DateTime<Tz>) -> Duration {
    target
        .clone()
        .signed_duration_since(now.clone())
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Primary and fallback timers with at-most-once firing per registered instant
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RefreshTimers<Tz: TimeZone> {
    primary: Option<DateTime<Tz>>,
    fallback: Option<DateTime<Tz>>,
}

impl<Tz: TimeZone> Default for RefreshTimers<Tz> {
    fn default() -> Self {
        Self {
            primary: None,
            fallback: None,
        }
    }
}

impl<Tz: TimeZone> RefreshTimers<Tz> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace both timers with the ones in `plan`
    pub fn register(&mut self, plan: &WakeupPlan<Tz>) {
        match plan {
            WakeupPlan::None => self.cancel(),
            WakeupPlan::Scheduled { primary, fallback } => {
                self.primary = Some(primary.clone());
                self.fallback = fallback.clone();
            }
        }
    }

    pub fn cancel(&mut self) {
        self.primary = None;
        self.fallback = None;
    }

    pub fn next_deadline(&self) -> Option<DateTime<Tz>> {
        match (&self.primary, &self.fallback) {
            (Some(p), Some(f)) => Some(if f < p { f.clone() } else { p.clone() }),
            (Some(p), None) => Some(p.clone()),
            (None, Some(f)) => Some(f.clone()),
            (None, None) => None,
        }
    }

    /// Consume every timer due at `now`. True if a refresh should run.
    pub fn fire_due(&mut self, now: &DateTime<Tz>) -> bool {
        let mut fired = false;
        if self.primary.as_ref().is_some_and(|p| p <= now) {
            self.primary = None;
            fired = true;
        }
        if self.fallback.as_ref().is_some_and(|f| f <= now) {
            self.fallback = None;
            fired = true;
        }
        fired
    }

    /// Whether a refresh is due at `now`: a due timer was consumed, or
    /// nothing is registered and the idle retry has elapsed
    pub fn poll(&mut self, now: &DateTime<Tz>) -> bool {
        self.fire_due(now) || self.next_deadline().is_none()
    }
}

/// Run the refresh loop until `cancel` fires.
///
/// `refresh` recomputes the display and returns the timers to register next;
/// `clock` reads the current time in the configured zone.
pub async fn run_scheduler<Tz, C, F>(clock: C, cancel: CancellationToken, mut refresh: F)
where
    Tz: TimeZone,
    C: Fn() -> DateTime<Tz>,
    F: FnMut(&DateTime<Tz>) -> WakeupPlan<Tz>,
{
    info!("Refresh scheduler started");

    let mut timers = RefreshTimers::new();
    timers.register(&refresh(&clock()));

    loop {
        let now = clock();
        let wait = match timers.next_deadline() {
            Some(deadline) => time_until(&deadline, &now),
            None => {
                warn!("Nothing scheduled, retrying in {}", format_duration(IDLE_RETRY));
                IDLE_RETRY
            }
        };
        info!("Next refresh in {}", format_duration(wait));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Refresh scheduler cancelled");
                timers.cancel();
                return;
            }
            _ = sleep(wait) => {}
        }

        let now = clock();
        if timers.poll(&now) {
            timers.register(&refresh(&now));
        } else {
            // Woke early (clock adjusted); sleep again toward the same deadline
            debug!("Woke before deadline at {}", now.with_timezone(&Utc));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::DailyRecord;
    use chrono_tz::Asia::Beirut;
    use chrono_tz::Tz;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn beirut(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Tz> {
        Beirut.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn table() -> PrayerTable {
        PrayerTable::from_json(
            r#"{"beirut":[
                {"date":"1/1/2025","fajr":"05:30","shuruq":"06:50","dhuhr":"12:15","asr":"15:30","maghrib":"17:45","isha":"19:00"},
                {"date":"2/1/2025","fajr":"05:31","shuruq":"06:50","dhuhr":"12:15","asr":"15:31","maghrib":"17:46","isha":"19:01"}
            ]}"#,
        )
        .unwrap()
    }

    // === next_wakeup tests ===

    #[test]
    fn test_wakeup_at_next_prayer_today() {
        let t = table();
        let now = beirut(2025, 1, 1, 6, 0, 0);
        let wake = next_wakeup(Some(&t), "beirut", &now).unwrap();
        assert_eq!(wake, beirut(2025, 1, 1, 6, 50, 0));
    }

    #[test]
    fn test_wakeup_rolls_to_tomorrow_date() {
        let t = table();
        let now = beirut(2025, 1, 1, 21, 0, 0);
        let wake = next_wakeup(Some(&t), "beirut", &now).unwrap();
        assert_eq!(wake, beirut(2025, 1, 2, 5, 31, 0));
    }

    #[test]
    fn test_wakeup_rollover_across_month_end() {
        let mut t = PrayerTable::default();
        t.insert_city(
            "beirut",
            vec![
                DailyRecord::new("31/1/2025").with(PrayerKey::Isha, "19:20"),
                DailyRecord::new("1/2/2025").with(PrayerKey::Fajr, "05:25"),
            ],
        );
        let now = beirut(2025, 1, 31, 23, 59, 0);
        let wake = next_wakeup(Some(&t), "beirut", &now).unwrap();
        assert_eq!(wake, beirut(2025, 2, 1, 5, 25, 0));
    }

    #[test]
    fn test_wakeup_missing_table_is_no_schedule() {
        let now = beirut(2025, 1, 1, 6, 0, 0);
        assert!(next_wakeup(None, "beirut", &now).is_none());
        assert!(next_wakeup(Some(&PrayerTable::default()), "beirut", &now).is_none());
    }

    #[test]
    fn test_wakeup_is_strictly_after_now() {
        let t = table();
        let now = beirut(2025, 1, 1, 12, 15, 0);
        let wake = next_wakeup(Some(&t), "beirut", &now).unwrap();
        assert_eq!(wake, beirut(2025, 1, 1, 15, 30, 0));
    }

    #[test]
    fn test_wakeup_uses_default_city() {
        let t = table();
        let now = beirut(2025, 1, 1, 6, 0, 0);
        assert_eq!(
            next_wakeup(Some(&t), "tyre", &now),
            next_wakeup(Some(&t), "beirut", &now)
        );
    }

    // === plan_refresh tests ===

    #[test]
    fn test_fallback_added_when_far_from_primary() {
        let now = beirut(2025, 1, 1, 6, 0, 0);
        let primary = beirut(2025, 1, 1, 12, 15, 0);
        let plan = plan_refresh(Some(primary), &now, Duration::from_secs(1800), Duration::from_secs(120));
        assert_eq!(
            plan,
            WakeupPlan::Scheduled {
                primary,
                fallback: Some(beirut(2025, 1, 1, 6, 30, 0)),
            }
        );
        assert_eq!(plan.next_trigger(), Some(beirut(2025, 1, 1, 6, 30, 0)));
    }

    #[test]
    fn test_fallback_suppressed_near_primary() {
        let now = beirut(2025, 1, 1, 6, 0, 0);
        for primary_min in [28, 30, 32] {
            let primary = beirut(2025, 1, 1, 6, primary_min, 0);
            let plan = plan_refresh(Some(primary), &now, Duration::from_secs(1800), Duration::from_secs(120));
            assert_eq!(plan, WakeupPlan::Scheduled { primary, fallback: None });
        }
    }

    #[test]
    fn test_fallback_kept_just_outside_tolerance() {
        let now = beirut(2025, 1, 1, 6, 0, 0);
        let primary = beirut(2025, 1, 1, 6, 27, 59);
        let plan = plan_refresh(Some(primary), &now, Duration::from_secs(1800), Duration::from_secs(120));
        assert!(matches!(plan, WakeupPlan::Scheduled { fallback: Some(_), .. }));
        assert_eq!(plan.next_trigger(), Some(primary));
    }

    #[test]
    fn test_out_of_range_offsets_drop_the_fallback() {
        let now = beirut(2025, 1, 1, 6, 0, 0);
        let primary = beirut(2025, 1, 1, 7, 0, 0);
        // Representable as a chrono duration but past the end of the calendar
        let huge = Duration::from_secs(100_000 * 365 * 86_400 * 10);
        for (offset, tolerance) in [
            (huge, Duration::from_secs(120)),
            (Duration::from_secs(u64::MAX), Duration::from_secs(120)),
            (Duration::from_secs(30 * 60), huge),
        ] {
            assert_eq!(
                plan_refresh(Some(primary), &now, offset, tolerance),
                WakeupPlan::Scheduled { primary, fallback: None }
            );
        }
    }

    #[test]
    fn test_no_primary_no_plan() {
        let now = beirut(2025, 1, 1, 6, 0, 0);
        let plan = plan_refresh(None, &now, Duration::from_secs(1800), Duration::from_secs(120));
        assert_eq!(plan, WakeupPlan::None);
        assert_eq!(plan.next_trigger(), None);
    }

    // === RefreshTimers tests ===

    #[test]
    fn test_timers_fire_at_most_once() {
        let now = beirut(2025, 1, 1, 6, 0, 0);
        let primary = beirut(2025, 1, 1, 6, 10, 0);
        let mut timers = RefreshTimers::new();
        timers.register(&WakeupPlan::Scheduled { primary, fallback: None });

        assert!(!timers.fire_due(&now));
        assert!(timers.fire_due(&primary));
        assert!(!timers.fire_due(&primary));
        assert!(timers.next_deadline().is_none());
    }

    #[test]
    fn test_poll_fires_due_pair_once_and_idles_when_empty() {
        let primary = beirut(2025, 1, 1, 6, 10, 0);
        let fallback = beirut(2025, 1, 1, 6, 30, 0);
        let mut timers = RefreshTimers::new();
        timers.register(&WakeupPlan::Scheduled { primary, fallback: Some(fallback) });

        assert!(!timers.poll(&beirut(2025, 1, 1, 6, 5, 0)));
        // Both due: one refresh consumes both
        assert!(timers.poll(&beirut(2025, 1, 1, 6, 40, 0)));
        assert_eq!(timers, RefreshTimers::new());
        // Nothing registered: idle retry refreshes
        assert!(timers.poll(&beirut(2025, 1, 1, 6, 40, 0)));
    }

    #[test]
    fn test_timers_register_replaces() {
        let mut timers = RefreshTimers::new();
        let a = beirut(2025, 1, 1, 6, 10, 0);
        let b = beirut(2025, 1, 1, 7, 10, 0);
        timers.register(&WakeupPlan::Scheduled { primary: a, fallback: Some(b) });
        assert_eq!(timers.next_deadline(), Some(a));
        timers.register(&WakeupPlan::Scheduled { primary: b, fallback: None });
        assert_eq!(timers.next_deadline(), Some(b));
        timers.register(&WakeupPlan::None);
        assert_eq!(timers.next_deadline(), None);
    }

    #[test]
    fn test_time_until() {
        let now = beirut(2025, 1, 1, 6, 0, 0);
        assert_eq!(time_until(&beirut(2025, 1, 1, 7, 0, 0), &now), Duration::from_secs(3600));
        assert_eq!(time_until(&beirut(2025, 1, 1, 5, 0, 0), &now), Duration::ZERO);
    }

    // === run_scheduler tests ===

    #[test]
    fn test_scheduler_stops_on_cancel() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio_test::block_on(run_scheduler(
            || beirut(2025, 1, 1, 6, 0, 0),
            cancel,
            |_now| {
                calls.fetch_add(1, Ordering::SeqCst);
                WakeupPlan::None
            },
        ));

        // Initial refresh only
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_scheduler_refreshes_on_due_timer() {
        let calls = AtomicUsize::new(0);
        let cancel = CancellationToken::new();
        let stop = cancel.clone();

        // The clock is frozen at the deadline so the first timer is already due
        let deadline = beirut(2025, 1, 1, 6, 0, 0);
        tokio_test::block_on(run_scheduler(
            || deadline,
            cancel,
            |now| {
                if calls.fetch_add(1, Ordering::SeqCst) == 2 {
                    stop.cancel();
                }
                WakeupPlan::Scheduled { primary: *now, fallback: None }
            },
        ));

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}



/// Kani formal verification proofs
#[cfg(kani)]
mod kani_proofs {
    use super::*;

    #[kani::proof]
    fn time_until_never_negative() {
        let secs: i64 = kani::any();
        kani::assume(secs > -1_000_000 && secs < 1_000_000);
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let target = now + ChronoDuration::seconds(secs);
        let wait = time_until(&target, &now);
        kani::assert(secs > 0 || wait == Duration::ZERO, "past targets wait zero");
    }
}
