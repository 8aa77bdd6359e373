//! Week-over-week comparison of steps and sleep.
//!
//! The current window is the seven calendar days ending at the latest
//! loaded date; the previous window is the seven days right before it.

use crate::models::HealthRecord;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeSet;

pub const WINDOW_DAYS: i64 = 7;
pub const MIN_DISTINCT_DAYS: usize = 3;
pub const INSUFFICIENT_DATA_MESSAGE: &str = "Not enough data for a weekly comparison yet.";

/// One loaded row as seen by the calculator. Missing values count as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailySample {
    pub date: NaiveDate,
    pub steps: Option<i64>,
    pub sleep_hours: Option<f64>,
}

impl From<&HealthRecord> for DailySample {
    fn from(record: &HealthRecord) -> Self {
        Self {
            date: record.date,
            steps: Some(record.steps),
            sleep_hours: Some(record.sleep_hours),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeeklyInsight {
    /// Nothing loaded.
    Idle,
    InsufficientData,
    Comparison { steps_delta: i64, sleep_delta: f64 },
}

impl WeeklyInsight {
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Idle => None,
            Self::InsufficientData => Some(INSUFFICIENT_DATA_MESSAGE.to_string()),
            Self::Comparison {
                steps_delta,
                sleep_delta,
            } => Some(format!(
                "{} steps/day, sleep {} hrs",
                signed_steps(*steps_delta),
                signed_sleep(*sleep_delta)
            )),
        }
    }
}

#[derive(Debug, Default)]
struct WindowTotals {
    steps: f64,
    sleep: f64,
    rows: usize,
    days: BTreeSet<NaiveDate>,
}

impl WindowTotals {
    fn add(&mut self, sample: &DailySample) {
        self.steps += sample.steps.unwrap_or(0) as f64;
        self.sleep += sample.sleep_hours.unwrap_or(0.0);
        self.rows += 1;
        self.days.insert(sample.date);
    }

    fn is_sufficient(&self) -> bool {
        self.days.len() >= MIN_DISTINCT_DAYS
    }

    fn averages(&self) -> (f64, f64) {
        let rows = self.rows as f64;
        (self.steps / rows, self.sleep / rows)
    }
}

pub fn compare_weeks(samples: &[DailySample]) -> WeeklyInsight {
    let Some(latest) = samples.iter().map(|sample| sample.date).max() else {
        return WeeklyInsight::Idle;
    };

    // Windows are clamped at the earliest representable date.
    let current_start = days_before(latest, WINDOW_DAYS - 1).unwrap_or(NaiveDate::MIN);
    let previous_window = days_before(current_start, 1).map(|previous_end| {
        let previous_start = days_before(current_start, WINDOW_DAYS).unwrap_or(NaiveDate::MIN);
        (previous_start, previous_end)
    });

    let mut current = WindowTotals::default();
    let mut previous = WindowTotals::default();
    for sample in samples {
        if sample.date >= current_start && sample.date <= latest {
            current.add(sample);
        } else if previous_window
            .is_some_and(|(start, end)| sample.date >= start && sample.date <= end)
        {
            previous.add(sample);
        }
    }

    if !current.is_sufficient() || !previous.is_sufficient() {
        return WeeklyInsight::InsufficientData;
    }

    let (current_steps, current_sleep) = current.averages();
    let (previous_steps, previous_sleep) = previous.averages();

    WeeklyInsight::Comparison {
        steps_delta: (current_steps - previous_steps).round() as i64,
        sleep_delta: round_tenths(current_sleep - previous_sleep),
    }
}

/// Insight text for a set of records, or `None` when nothing is loaded.
pub fn weekly_insight(records: &[HealthRecord]) -> Option<String> {
    let samples: Vec<DailySample> = records.iter().map(DailySample::from).collect();
    compare_weeks(&samples).message()
}

fn days_before(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_sub_signed(Duration::days(days))
}

fn round_tenths(value: f64) -> f64 {
    // adding 0.0 folds -0.0 into 0.0
    (value * 10.0).round() / 10.0 + 0.0
}

fn signed_steps(delta: i64) -> String {
    format!("{delta:+}")
}

fn signed_sleep(delta: f64) -> String {
    if delta < 0.0 {
        format!("-{:.1}", delta.abs())
    } else {
        format!("+{:.1}", delta)
    }
}
