use chrono::{
    DateTime, Datelike, Days, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday,
};
use vantry_core::{AppError, AppResult};

use crate::reminder::{ReminderFrequency, ReminderPolicy};

/// Weekday assumed when a weekly policy does not name one.
const DEFAULT_WEEKDAY: Weekday = Weekday::Mon;

/// Day of month assumed when a monthly policy does not name one.
const DEFAULT_DAY_OF_MONTH: u32 = 1;

// A monthly rule on day 29-31 can skip consecutive months, so the fire-time
// scan must look further than one month; a year covers every representable rule.
const MAX_SCAN_DAYS: u64 = 366;

/// Which calendar days a compiled schedule fires on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireRule {
    /// Every day.
    Daily,
    /// One fixed weekday per week.
    Weekly(Weekday),
    /// One fixed day number per month; months without that day are skipped.
    MonthDay(u32),
}

/// Validated recurring-fire specification compiled from a [`ReminderPolicy`].
///
/// All evaluation happens in the single canonical zone the schedule was
/// compiled with, never in host-local time, so concurrently running instances
/// agree on fire times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReminderSchedule {
    zone: FixedOffset,
    time: NaiveTime,
    rule: FireRule,
}

impl ReminderSchedule {
    /// Compiles a raw policy into a fire specification.
    ///
    /// A weekly policy without a weekday fires on Monday; a monthly policy
    /// without a day fires on the 1st. Everything else that is absent or out
    /// of range makes compilation fail with a validation error.
    pub fn compile(policy: &ReminderPolicy, zone: FixedOffset) -> AppResult<Self> {
        let frequency = ReminderFrequency::parse(policy.frequency.trim())?;

        let hour = policy.hour.ok_or_else(|| {
            AppError::Validation("reminder policy has no hour of day".to_owned())
        })?;
        let minute = policy.minute.ok_or_else(|| {
            AppError::Validation("reminder policy has no minute of hour".to_owned())
        })?;
        let time = NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| {
            AppError::Validation(format!(
                "reminder time {hour}:{minute} is out of range (hour 0-23, minute 0-59)"
            ))
        })?;

        let rule = match frequency {
            ReminderFrequency::Daily => FireRule::Daily,
            ReminderFrequency::Weekly => {
                let number = policy.weekday.unwrap_or(weekday_number(DEFAULT_WEEKDAY));
                let weekday = weekday_from_number(number).ok_or_else(|| {
                    AppError::Validation(format!(
                        "reminder weekday {number} is out of range (0-6)"
                    ))
                })?;
                FireRule::Weekly(weekday)
            }
            ReminderFrequency::Monthly => {
                let day = policy.day_of_month.unwrap_or(DEFAULT_DAY_OF_MONTH);
                if !(1..=31).contains(&day) {
                    return Err(AppError::Validation(format!(
                        "reminder day of month {day} is out of range (1-31)"
                    )));
                }
                FireRule::MonthDay(day)
            }
        };

        Ok(Self { zone, time, rule })
    }

    /// Returns the canonical zone this schedule is evaluated in.
    #[must_use]
    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    /// Returns the configured time of day.
    #[must_use]
    pub fn time(&self) -> NaiveTime {
        self.time
    }

    /// Returns the day-selection rule.
    #[must_use]
    pub fn rule(&self) -> FireRule {
        self.rule
    }

    /// Returns the first fire time strictly later than `after`.
    #[must_use]
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.with_timezone(&self.zone).date_naive();

        for offset in 0..=MAX_SCAN_DAYS {
            let date = start.checked_add_days(Days::new(offset))?;
            if !self.rule_matches(date) {
                continue;
            }

            let fire = self.fire_time_on(date)?;
            if fire > after {
                return Some(fire);
            }
        }

        None
    }

    /// Returns whether `now` is a valid fire moment for this schedule.
    ///
    /// True iff the most recent scheduled fire at or before `now` happened no
    /// longer than `tolerance` ago. The tolerance absorbs local trigger
    /// jitter and the latency between a trigger firing and this check
    /// running.
    #[must_use]
    pub fn fires_within(&self, now: DateTime<Utc>, tolerance: Duration) -> bool {
        let start = now.with_timezone(&self.zone).date_naive();

        for offset in 0..=MAX_SCAN_DAYS {
            let Some(date) = start.checked_sub_days(Days::new(offset)) else {
                return false;
            };
            if !self.rule_matches(date) {
                continue;
            }

            let Some(fire) = self.fire_time_on(date) else {
                return false;
            };
            if fire > now {
                // Today's fire is still ahead; the previous matching day
                // carries the most recent one.
                continue;
            }

            return now.signed_duration_since(fire) <= tolerance;
        }

        false
    }

    fn rule_matches(&self, date: NaiveDate) -> bool {
        match self.rule {
            FireRule::Daily => true,
            FireRule::Weekly(weekday) => date.weekday() == weekday,
            FireRule::MonthDay(day) => date.day() == day,
        }
    }

    fn fire_time_on(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        // A fixed offset has no gaps, so the local datetime always resolves.
        self.zone
            .from_local_datetime(&date.and_time(self.time))
            .single()
            .map(|fire| fire.with_timezone(&Utc))
    }
}

fn weekday_from_number(value: u32) -> Option<Weekday> {
    match value {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

fn weekday_number(weekday: Weekday) -> u32 {
    weekday.num_days_from_sunday()
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc, Weekday};
    use proptest::prelude::*;

    use crate::reminder::ReminderPolicy;

    use super::{FireRule, ReminderSchedule};

    fn utc_zone() -> FixedOffset {
        match FixedOffset::east_opt(0) {
            Some(zone) => zone,
            None => panic!("zero offset must be representable"),
        }
    }

    fn at(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        match Utc
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
        {
            Some(value) => value,
            None => panic!("test timestamp must be valid"),
        }
    }

    fn policy(
        frequency: &str,
        hour: Option<u32>,
        minute: Option<u32>,
        weekday: Option<u32>,
        day_of_month: Option<u32>,
    ) -> ReminderPolicy {
        ReminderPolicy {
            frequency: frequency.to_owned(),
            hour,
            minute,
            weekday,
            day_of_month,
        }
    }

    fn compiled(input: &ReminderPolicy) -> ReminderSchedule {
        match ReminderSchedule::compile(input, utc_zone()) {
            Ok(schedule) => schedule,
            Err(error) => panic!("expected policy to compile: {error}"),
        }
    }

    #[test]
    fn daily_policy_compiles() {
        let schedule = compiled(&policy("daily", Some(9), Some(30), None, None));
        assert_eq!(schedule.rule(), FireRule::Daily);
    }

    #[test]
    fn weekly_policy_defaults_to_monday() {
        let schedule = compiled(&policy("weekly", Some(8), Some(0), None, None));
        assert_eq!(schedule.rule(), FireRule::Weekly(Weekday::Mon));
    }

    #[test]
    fn monthly_policy_defaults_to_first_day() {
        let schedule = compiled(&policy("monthly", Some(8), Some(0), None, None));
        assert_eq!(schedule.rule(), FireRule::MonthDay(1));
    }

    #[test]
    fn hour_out_of_range_is_rejected() {
        let result = ReminderSchedule::compile(&policy("daily", Some(25), Some(0), None, None), utc_zone());
        assert!(result.is_err());
    }

    #[test]
    fn minute_out_of_range_is_rejected() {
        let result = ReminderSchedule::compile(&policy("daily", Some(9), Some(60), None, None), utc_zone());
        assert!(result.is_err());
    }

    #[test]
    fn missing_time_is_rejected() {
        let result = ReminderSchedule::compile(&policy("daily", None, Some(0), None, None), utc_zone());
        assert!(result.is_err());
    }

    #[test]
    fn weekday_out_of_range_is_rejected() {
        let result = ReminderSchedule::compile(&policy("weekly", Some(8), Some(0), Some(7), None), utc_zone());
        assert!(result.is_err());
    }

    #[test]
    fn day_of_month_out_of_range_is_rejected() {
        let zone = utc_zone();
        assert!(ReminderSchedule::compile(&policy("monthly", Some(8), Some(0), None, Some(32)), zone).is_err());
        assert!(ReminderSchedule::compile(&policy("monthly", Some(8), Some(0), None, Some(0)), zone).is_err());
    }

    #[test]
    fn unknown_frequency_is_rejected() {
        let result = ReminderSchedule::compile(&policy("yearly", Some(8), Some(0), None, None), utc_zone());
        assert!(result.is_err());
    }

    #[test]
    fn daily_next_fire_lands_same_day_before_time() {
        let schedule = compiled(&policy("daily", Some(9), Some(30), None, None));
        let next = schedule.next_fire_after(at(2026, 1, 5, 8, 0));
        assert_eq!(next, Some(at(2026, 1, 5, 9, 30)));
    }

    #[test]
    fn daily_next_fire_rolls_to_next_day_after_time() {
        let schedule = compiled(&policy("daily", Some(9), Some(30), None, None));
        let next = schedule.next_fire_after(at(2026, 1, 5, 10, 0));
        assert_eq!(next, Some(at(2026, 1, 6, 9, 30)));
    }

    #[test]
    fn weekly_next_fire_lands_on_configured_weekday() {
        // 2026-01-05 is a Monday; from Thursday the next Monday is 2026-01-12.
        let schedule = compiled(&policy("weekly", Some(8), Some(0), Some(1), None));
        let next = schedule.next_fire_after(at(2026, 1, 8, 12, 0));
        assert_eq!(next, Some(at(2026, 1, 12, 8, 0)));
    }

    #[test]
    fn monthly_day_31_skips_short_months() {
        let schedule = compiled(&policy("monthly", Some(6), Some(0), None, Some(31)));
        let next = schedule.next_fire_after(at(2026, 2, 1, 0, 0));
        assert_eq!(next, Some(at(2026, 3, 31, 6, 0)));
    }

    #[test]
    fn weekly_monday_does_not_fire_on_tuesday() {
        let schedule = compiled(&policy("weekly", Some(8), Some(0), Some(1), None));
        // 2026-01-06 is a Tuesday.
        assert!(!schedule.fires_within(at(2026, 1, 6, 8, 0), Duration::minutes(5)));
    }

    #[test]
    fn weekly_monday_fires_within_tolerance_on_monday() {
        let schedule = compiled(&policy("weekly", Some(8), Some(0), Some(1), None));
        assert!(schedule.fires_within(at(2026, 1, 5, 8, 1), Duration::minutes(5)));
    }

    #[test]
    fn fire_outside_tolerance_is_rejected() {
        let schedule = compiled(&policy("daily", Some(8), Some(0), None, None));
        assert!(!schedule.fires_within(at(2026, 1, 5, 8, 6), Duration::minutes(5)));
    }

    #[test]
    fn fire_exactly_at_schedule_time_is_accepted() {
        let schedule = compiled(&policy("daily", Some(8), Some(0), None, None));
        assert!(schedule.fires_within(at(2026, 1, 5, 8, 0), Duration::minutes(5)));
    }

    #[test]
    fn moment_before_todays_fire_falls_back_to_yesterday() {
        let schedule = compiled(&policy("daily", Some(8), Some(0), None, None));
        // 07:59 is ahead of today's fire; yesterday's 08:00 is a day old.
        assert!(!schedule.fires_within(at(2026, 1, 5, 7, 59), Duration::minutes(5)));
    }

    #[test]
    fn canonical_zone_shifts_utc_fire_time() {
        let zone = match FixedOffset::east_opt(8 * 3600) {
            Some(zone) => zone,
            None => panic!("+08:00 must be representable"),
        };
        let input = policy("daily", Some(9), Some(0), None, None);
        let schedule = match ReminderSchedule::compile(&input, zone) {
            Ok(schedule) => schedule,
            Err(error) => panic!("expected policy to compile: {error}"),
        };

        // 09:00 at +08:00 is 01:00 UTC.
        let next = schedule.next_fire_after(at(2026, 1, 5, 0, 0));
        assert_eq!(next, Some(at(2026, 1, 5, 1, 0)));
    }

    proptest! {
        #[test]
        fn compilation_is_deterministic(
            hour in 0u32..24,
            minute in 0u32..60,
            day in 1u32..=31,
        ) {
            let input = policy("monthly", Some(hour), Some(minute), None, Some(day));
            let first = ReminderSchedule::compile(&input, utc_zone());
            let second = ReminderSchedule::compile(&input, utc_zone());
            prop_assert_eq!(first.ok(), second.ok());
        }

        #[test]
        fn out_of_range_hours_never_compile(hour in 24u32..200, minute in 0u32..60) {
            let input = policy("daily", Some(hour), Some(minute), None, None);
            prop_assert!(ReminderSchedule::compile(&input, utc_zone()).is_err());
        }

        #[test]
        fn next_fire_is_strictly_later(hour in 0u32..24, minute in 0u32..60) {
            let input = policy("daily", Some(hour), Some(minute), None, None);
            let after = at(2026, 1, 5, 12, 0);
            let next = ReminderSchedule::compile(&input, utc_zone())
                .ok()
                .and_then(|schedule| schedule.next_fire_after(after));
            prop_assert!(next.is_some_and(|fire| fire > after));
        }
    }
}
