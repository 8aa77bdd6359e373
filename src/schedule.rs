use crate::models::{ReportFrequency, ReportSchedule};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};

impl ReportSchedule {
    /// Next time a report is due after `now`, or `None` when disabled.
    pub fn compute_next_report_at(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        if !self.enabled {
            return None;
        }
        let today = now.date();
        let at = |date: NaiveDate| date.and_time(self.report_time);

        let next = match self.frequency {
            ReportFrequency::Daily => {
                let candidate = at(today);
                if candidate <= now {
                    at(today + Duration::days(1))
                } else {
                    candidate
                }
            }
            ReportFrequency::Weekly => {
                let target = self.day_of_week.unwrap_or(today.weekday());
                let candidate = at(next_weekday(today, target));
                if candidate <= now {
                    candidate + Duration::days(7)
                } else {
                    candidate
                }
            }
            ReportFrequency::Monthly => {
                let day = self.day_of_month.unwrap_or(today.day());
                let candidate = at(clamped_day(today.year(), today.month(), day)?);
                if candidate <= now {
                    let (year, month) = if today.month() == 12 {
                        (today.year() + 1, 1)
                    } else {
                        (today.year(), today.month() + 1)
                    };
                    at(clamped_day(year, month, day)?)
                } else {
                    candidate
                }
            }
        };
        Some(next)
    }

    /// Recomputes and stores `next_report_at`.
    pub fn reschedule(&mut self, now: NaiveDateTime) {
        self.next_report_at = self.compute_next_report_at(now);
    }

    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        self.enabled && self.next_report_at.is_some_and(|due| due <= now)
    }
}

/// `date` itself when it already falls on `target`.
fn next_weekday(date: NaiveDate, target: Weekday) -> NaiveDate {
    let ahead = (7 + target.num_days_from_monday() as i64
        - date.weekday().num_days_from_monday() as i64)
        % 7;
    date + Duration::days(ahead)
}

fn clamped_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, last))
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first_of_next - Duration::days(1)).day())
}
