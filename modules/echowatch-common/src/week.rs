use chrono::{Datelike, Duration, NaiveDate, Utc};

/// Monday of the week containing `date`. All weekly rollups are keyed
/// on this anchor.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Sunday closing the week that starts at `monday`.
pub fn week_end(monday: NaiveDate) -> NaiveDate {
    monday + Duration::days(6)
}

/// (monday, sunday) of the current week.
pub fn current_week() -> (NaiveDate, NaiveDate) {
    let monday = week_start(Utc::now().date_naive());
    (monday, week_end(monday))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn week_start_is_monday_anchored() {
        // 2026-08-26 is a Wednesday
        assert_eq!(week_start(d(2026, 8, 26)), d(2026, 8, 24));
        // Monday maps to itself
        assert_eq!(week_start(d(2026, 8, 24)), d(2026, 8, 24));
        // Sunday belongs to the preceding Monday
        assert_eq!(week_start(d(2026, 8, 30)), d(2026, 8, 24));
    }

    #[test]
    fn week_end_is_six_days_after_start() {
        assert_eq!(week_end(d(2026, 8, 24)), d(2026, 8, 30));
    }

    #[test]
    fn week_start_crosses_month_boundaries() {
        // 2026-09-01 is a Tuesday; its week starts in August
        assert_eq!(week_start(d(2026, 9, 1)), d(2026, 8, 31));
    }
}
