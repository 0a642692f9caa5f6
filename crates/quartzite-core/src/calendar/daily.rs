//! Excludes (or, inverted, includes only) a time-of-day range every day.

use chrono::{DateTime, NaiveTime, Timelike, Utc};

use super::{BaseCalendar, Calendar};

/// `DailyCalendar::new("1:20", "14:50")` excludes every instant whose
/// time-of-day falls in `[01:20, 14:50]`; `invert()` flips that to include
/// only the range instead.
#[derive(Debug, Clone)]
pub struct DailyCalendar {
    range_start: NaiveTime,
    range_end: NaiveTime,
    invert: bool,
    base: Option<BaseCalendar>,
}

fn parse_time(spec: &str) -> NaiveTime {
    let mut parts = spec.splitn(3, ':');
    let hour: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minute: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let second: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    NaiveTime::from_hms_opt(hour, minute, second).unwrap_or(NaiveTime::MIN)
}

impl DailyCalendar {
    /// `start` and `end` are `"H:MM"` or `"H:MM:SS"` strings, inclusive on
    /// both ends, interpreted against each instant's time-of-day component.
    pub fn new(start: &str, end: &str) -> Self {
        Self {
            range_start: parse_time(start),
            range_end: parse_time(end),
            invert: false,
            base: None,
        }
    }

    pub fn invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn with_base(mut self, base: BaseCalendar) -> Self {
        self.base = Some(base);
        self
    }

    fn in_range(&self, time: NaiveTime) -> bool {
        if self.range_start <= self.range_end {
            time >= self.range_start && time <= self.range_end
        } else {
            // Range wraps past midnight.
            time >= self.range_start || time <= self.range_end
        }
    }
}

impl Calendar for DailyCalendar {
    fn time_included_self(&self, instant: DateTime<Utc>) -> bool {
        let in_range = self.in_range(instant.time());
        if self.invert {
            in_range
        } else {
            !in_range
        }
    }

    fn next_included_self(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        if self.time_included_self(after) {
            return after;
        }
        // Excluded: step to the instant just past the excluded range's end.
        let date = after.date_naive();
        let mut candidate = date.and_time(self.range_end).and_utc() + chrono::Duration::seconds(1);
        if candidate <= after {
            candidate += chrono::Duration::days(1);
        }
        candidate
    }

    fn base(&self) -> Option<&dyn Calendar> {
        self.base.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn excludes_given_range_by_default() {
        let cal = DailyCalendar::new("1:20", "14:50");
        assert!(!cal.is_time_included(Utc.with_ymd_and_hms(2024, 1, 1, 1, 21, 0).unwrap()));
        assert!(cal.is_time_included(Utc.with_ymd_and_hms(2024, 1, 1, 14, 51, 0).unwrap()));
    }

    #[test]
    fn invert_includes_only_the_range() {
        let cal = DailyCalendar::new("1:20", "14:50").invert(true);
        assert!(cal.is_time_included(Utc.with_ymd_and_hms(2024, 1, 1, 1, 21, 0).unwrap()));
        assert!(!cal.is_time_included(Utc.with_ymd_and_hms(2024, 1, 1, 14, 51, 0).unwrap()));
    }
}
