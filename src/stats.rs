use crate::models::{ChartData, HealthRecord};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::str::FromStr;

pub const HIGH_HEART_RATE_BPM: i64 = 110;
pub const LOW_SLEEP_HOURS: f64 = 5.0;
pub const DEFAULT_CHART_DAYS: i64 = 30;
pub const MAX_CHART_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub avg_heart_rate: Option<f64>,
    pub avg_sleep: f64,
    pub avg_steps: f64,
    pub total_days: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    HighHeartRate,
    LowSleep,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthAlert {
    pub kind: AlertKind,
    pub message: String,
}

/// Rows shown in the records table, counted back from the latest record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableRange {
    Week,
    #[default]
    Month,
    Quarter,
    All,
}

impl TableRange {
    pub fn days(self) -> Option<i64> {
        match self {
            Self::Week => Some(7),
            Self::Month => Some(30),
            Self::Quarter => Some(90),
            Self::All => None,
        }
    }

    pub fn as_param(self) -> &'static str {
        match self {
            Self::Week => "7",
            Self::Month => "30",
            Self::Quarter => "90",
            Self::All => "all",
        }
    }

    /// Unknown values fall back to the default range.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("7") => Self::Week,
            Some("30") => Self::Month,
            Some("90") => Self::Quarter,
            Some("all") => Self::All,
            _ => Self::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartMetric {
    Steps,
    Sleep,
    HeartRate,
}

impl ChartMetric {
    pub fn as_param(self) -> &'static str {
        match self {
            Self::Steps => "steps",
            Self::Sleep => "sleep",
            Self::HeartRate => "heart_rate",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Steps => "Steps",
            Self::Sleep => "Sleep (hours)",
            Self::HeartRate => "Heart rate (bpm)",
        }
    }

    fn value(self, record: &HealthRecord) -> Option<f64> {
        match self {
            Self::Steps => Some(record.steps as f64),
            Self::Sleep => Some(record.sleep_hours),
            Self::HeartRate => record.heart_rate.map(|bpm| bpm as f64),
        }
    }
}

impl FromStr for ChartMetric {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "steps" => Ok(Self::Steps),
            "sleep" | "sleep_hours" => Ok(Self::Sleep),
            "heart_rate" | "heart" => Ok(Self::HeartRate),
            other => Err(format!("unknown chart '{other}'")),
        }
    }
}

pub fn chart_days(value: Option<&str>) -> i64 {
    value
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .map(|days| days.clamp(1, MAX_CHART_DAYS))
        .unwrap_or(DEFAULT_CHART_DAYS)
}

pub fn summarize(records: &[HealthRecord]) -> Option<Summary> {
    if records.is_empty() {
        return None;
    }

    let total_days = records.len();
    let count = total_days as f64;
    let avg_sleep = records.iter().map(|r| r.sleep_hours).sum::<f64>() / count;
    let avg_steps = records.iter().map(|r| r.steps as f64).sum::<f64>() / count;

    let heart_rates: Vec<f64> = records
        .iter()
        .filter_map(|r| r.heart_rate)
        .map(|bpm| bpm as f64)
        .collect();
    let avg_heart_rate = if heart_rates.is_empty() {
        None
    } else {
        Some(heart_rates.iter().sum::<f64>() / heart_rates.len() as f64)
    };

    Some(Summary {
        avg_heart_rate,
        avg_sleep,
        avg_steps,
        total_days,
    })
}

pub fn is_high_heart_rate(record: &HealthRecord) -> bool {
    record.heart_rate.is_some_and(|bpm| bpm > HIGH_HEART_RATE_BPM)
}

pub fn is_low_sleep(record: &HealthRecord) -> bool {
    record.sleep_hours < LOW_SLEEP_HOURS
}

pub fn alerts_for(record: &HealthRecord) -> Vec<HealthAlert> {
    let mut alerts = Vec::new();
    if let Some(bpm) = record.heart_rate.filter(|_| is_high_heart_rate(record)) {
        alerts.push(HealthAlert {
            kind: AlertKind::HighHeartRate,
            message: format!("High heart rate: {bpm} bpm (normal: ≤{HIGH_HEART_RATE_BPM})"),
        });
    }
    if is_low_sleep(record) {
        alerts.push(HealthAlert {
            kind: AlertKind::LowSleep,
            message: format!(
                "Low sleep: {} hours (normal: ≥{LOW_SLEEP_HOURS:.1})",
                record.sleep_hours
            ),
        });
    }
    alerts
}

pub fn latest(records: &[HealthRecord]) -> Option<&HealthRecord> {
    records.iter().max_by_key(|record| record.date)
}

/// Records dated within the last `days` days ending at the latest record.
pub fn within_days(records: &[HealthRecord], days: i64) -> Vec<HealthRecord> {
    let Some(end) = latest(records).map(|record| record.date) else {
        return Vec::new();
    };
    let start = end
        .checked_sub_signed(Duration::days(days.max(1) - 1))
        .unwrap_or(NaiveDate::MIN);
    records
        .iter()
        .filter(|record| record.date >= start && record.date <= end)
        .cloned()
        .collect()
}

pub fn within_range(records: &[HealthRecord], range: TableRange) -> Vec<HealthRecord> {
    match range.days() {
        Some(days) => within_days(records, days),
        None => records.to_vec(),
    }
}

/// Records whose date falls in `[start, end]`.
pub fn between(records: &[HealthRecord], start: NaiveDate, end: NaiveDate) -> Vec<HealthRecord> {
    records
        .iter()
        .filter(|record| record.date >= start && record.date <= end)
        .cloned()
        .collect()
}

pub fn chart_series(records: &[HealthRecord], metric: ChartMetric, days: i64) -> ChartData {
    let mut window = within_days(records, days);
    window.sort_by_key(|record| record.date);

    let mut dates = Vec::with_capacity(window.len());
    let mut values = Vec::with_capacity(window.len());
    for record in &window {
        if let Some(value) = metric.value(record) {
            dates.push(record.date.format("%Y-%m-%d").to_string());
            values.push(value);
        }
    }

    ChartData { dates, values }
}
