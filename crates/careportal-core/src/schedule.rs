//! Schedule views over a set of appointments.

use chrono::{Datelike, Days, NaiveDate};

use crate::models::{parse_display_time, Appointment};

/// Appointments on or after `today`, soonest first.
///
/// Times sort by their 12-hour display value; an unparseable time sorts
/// before every parseable one on the same day.
pub fn upcoming(appointments: &[Appointment], today: NaiveDate) -> Vec<Appointment> {
    let mut upcoming: Vec<Appointment> = appointments
        .iter()
        .filter(|a| a.date >= today)
        .cloned()
        .collect();
    upcoming.sort_by_key(|a| (a.date, parse_display_time(&a.time)));
    upcoming
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub in_current_month: bool,
    pub is_today: bool,
    /// Display times of the appointments on this day, earliest first
    pub appointment_times: Vec<String>,
}

/// Month grid: whole Sunday-first weeks covering every day of the month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<[CalendarDay; 7]>,
}

impl CalendarMonth {
    /// `None` for an invalid year/month pair.
    pub fn build(
        year: i32,
        month: u32,
        today: NaiveDate,
        appointments: &[Appointment],
    ) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        let last = next_first.pred_opt()?;

        let leading = first.weekday().num_days_from_sunday();
        let trailing = 6 - last.weekday().num_days_from_sunday();
        let start = first.checked_sub_days(Days::new(leading.into()))?;
        let end = last.checked_add_days(Days::new(trailing.into()))?;

        let mut weeks = Vec::new();
        let mut week: Vec<CalendarDay> = Vec::with_capacity(7);
        let mut day = start;
        while day <= end {
            week.push(CalendarDay {
                date: day,
                in_current_month: day.month() == month && day.year() == year,
                is_today: day == today,
                appointment_times: times_on(appointments, day),
            });
            if week.len() == 7 {
                let full: [CalendarDay; 7] = std::mem::take(&mut week).try_into().ok()?;
                weeks.push(full);
                week.reserve(7);
            }
            day = day.succ_opt()?;
        }

        Some(Self { year, month, weeks })
    }

    pub fn day(&self, date: NaiveDate) -> Option<&CalendarDay> {
        self.weeks.iter().flatten().find(|d| d.date == date)
    }
}

fn times_on(appointments: &[Appointment], date: NaiveDate) -> Vec<String> {
    let mut on_day: Vec<&Appointment> = appointments.iter().filter(|a| a.date == date).collect();
    on_day.sort_by_key(|a| parse_display_time(&a.time));
    on_day.into_iter().map(|a| a.time.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn apt(d: &str, time: &str) -> Appointment {
        Appointment::new("Dr. X".into(), "Cardiology".into(), date(d), time.into())
    }

    #[test]
    fn test_upcoming_filters_and_sorts_by_clock_time() {
        let all = vec![
            apt("2025-06-02", "02:00 PM"),
            apt("2025-05-30", "09:00 AM"),
            apt("2025-06-02", "11:30 AM"),
            apt("2025-06-01", "04:00 PM"),
        ];

        let times: Vec<_> = upcoming(&all, date("2025-06-01"))
            .into_iter()
            .map(|a| format!("{} {}", a.date, a.time))
            .collect();
        assert_eq!(
            times,
            vec![
                "2025-06-01 04:00 PM",
                "2025-06-02 11:30 AM",
                "2025-06-02 02:00 PM",
            ]
        );
    }

    #[test]
    fn test_calendar_grid_shape() {
        // June 2025 starts on a Sunday and ends on a Monday
        let month = CalendarMonth::build(2025, 6, date("2025-06-15"), &[]).unwrap();
        assert_eq!(month.weeks.len(), 5);
        assert_eq!(month.weeks[0][0].date, date("2025-06-01"));
        assert_eq!(month.weeks[4][6].date, date("2025-07-05"));
        assert!(!month.weeks[4][6].in_current_month);
        assert!(month.day(date("2025-06-15")).unwrap().is_today);

        // February 2026 starts on a Sunday and fills exactly four weeks
        let feb = CalendarMonth::build(2026, 2, date("2025-06-15"), &[]).unwrap();
        assert_eq!(feb.weeks.len(), 4);
        assert!(feb.weeks.iter().flatten().all(|d| d.in_current_month));
    }

    #[test]
    fn test_calendar_leading_days_and_times() {
        let appointments = vec![
            apt("2025-05-28", "10:00 AM"),
            apt("2025-05-28", "08:30 AM"),
            apt("2025-05-01", "09:00 AM"),
        ];
        let may = CalendarMonth::build(2025, 5, date("2025-06-01"), &appointments).unwrap();

        // May 1st 2025 is a Thursday
        assert_eq!(may.weeks[0][0].date, date("2025-04-27"));
        assert!(!may.weeks[0][0].in_current_month);
        assert_eq!(may.weeks[0][4].appointment_times, vec!["09:00 AM"]);
        assert_eq!(
            may.day(date("2025-05-28")).unwrap().appointment_times,
            vec!["08:30 AM", "10:00 AM"]
        );
        assert!(may.weeks.iter().flatten().all(|d| !d.is_today));
    }

    #[test]
    fn test_invalid_month() {
        assert!(CalendarMonth::build(2025, 13, date("2025-06-01"), &[]).is_none());
        assert!(CalendarMonth::build(2025, 0, date("2025-06-01"), &[]).is_none());
    }

    #[test]
    fn test_months_at_date_range_edges() {
        let today = date("2025-06-01");
        assert!(CalendarMonth::build(NaiveDate::MAX.year(), 12, today, &[]).is_none());

        let min = NaiveDate::MIN;
        if let Some(grid) = CalendarMonth::build(min.year(), min.month(), today, &[]) {
            assert_eq!(grid.weeks[0][0].date.weekday(), chrono::Weekday::Sun);
        }
    }
}
