use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;

pub const MIN_HEART_RATE: i64 = 30;
pub const MAX_HEART_RATE: i64 = 220;
pub const MAX_SLEEP_HOURS: f64 = 24.0;
pub const MIN_RECORD_YEAR: i32 = 1900;
pub const MAX_RECORD_YEAR: i32 = 9999;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct HealthRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub steps: i64,
    pub sleep_hours: f64,
    pub heart_rate: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated values for creating or updating a [`HealthRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordInput {
    pub date: NaiveDate,
    pub steps: i64,
    pub sleep_hours: f64,
    pub heart_rate: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("date must be a valid YYYY-MM-DD date")]
    InvalidDate,
    #[error("{0} must be a number")]
    InvalidNumber(&'static str),
    #[error("Steps must be 0 or more.")]
    NegativeSteps,
    #[error("Sleep hours must be between 0 and 24.")]
    SleepOutOfRange,
    #[error("Heart rate must be between 30 and 220 bpm.")]
    HeartRateOutOfRange,
    #[error("{0} is not a valid value for {1}")]
    InvalidChoice(String, &'static str),
}

/// Raw form payload; HTML forms submit every field as text.
#[derive(Debug, Deserialize)]
pub struct RecordForm {
    pub date: String,
    pub steps: String,
    pub sleep_hours: String,
    #[serde(default)]
    pub heart_rate: String,
    #[serde(default)]
    pub notes: String,
}

impl RecordForm {
    pub fn validate(&self) -> Result<RecordInput, ValidationError> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .ok()
            .filter(|date| (MIN_RECORD_YEAR..=MAX_RECORD_YEAR).contains(&date.year()))
            .ok_or(ValidationError::InvalidDate)?;

        let steps: i64 = self
            .steps
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidNumber("steps"))?;
        if steps < 0 {
            return Err(ValidationError::NegativeSteps);
        }

        let sleep_hours: f64 = self
            .sleep_hours
            .trim()
            .parse()
            .map_err(|_| ValidationError::InvalidNumber("sleep_hours"))?;
        if !sleep_hours.is_finite() || !(0.0..=MAX_SLEEP_HOURS).contains(&sleep_hours) {
            return Err(ValidationError::SleepOutOfRange);
        }

        let heart_rate = match self.heart_rate.trim() {
            "" => None,
            raw => {
                let value: i64 = raw
                    .parse()
                    .map_err(|_| ValidationError::InvalidNumber("heart_rate"))?;
                if !(MIN_HEART_RATE..=MAX_HEART_RATE).contains(&value) {
                    return Err(ValidationError::HeartRateOutOfRange);
                }
                Some(value)
            }
        };

        let notes = match self.notes.trim() {
            "" => None,
            text => Some(text.to_string()),
        };

        Ok(RecordInput {
            date,
            steps,
            sleep_hours,
            heart_rate,
            notes,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl ReportFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }
}

impl fmt::Display for ReportFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFrequency {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            other => Err(ValidationError::InvalidChoice(other.to_string(), "frequency")),
        }
    }
}

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

pub fn parse_weekday(value: &str) -> Result<Weekday, ValidationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "monday" => Ok(Weekday::Mon),
        "tuesday" => Ok(Weekday::Tue),
        "wednesday" => Ok(Weekday::Wed),
        "thursday" => Ok(Weekday::Thu),
        "friday" => Ok(Weekday::Fri),
        "saturday" => Ok(Weekday::Sat),
        "sunday" => Ok(Weekday::Sun),
        other => Err(ValidationError::InvalidChoice(other.to_string(), "day_of_week")),
    }
}

/// `local@domain.tld` with no whitespace or control characters.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// When and to whom the periodic health report is sent.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportSchedule {
    pub enabled: bool,
    pub frequency: ReportFrequency,
    pub report_time: NaiveTime,
    pub day_of_week: Option<Weekday>,
    pub day_of_month: Option<u32>,
    pub recipient_email: Option<String>,
    pub range_days: u32,
    pub next_report_at: Option<NaiveDateTime>,
    pub last_report_sent_at: Option<NaiveDateTime>,
}

impl Default for ReportSchedule {
    fn default() -> Self {
        Self {
            enabled: false,
            frequency: ReportFrequency::Daily,
            report_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
            day_of_week: None,
            day_of_month: None,
            recipient_email: None,
            range_days: 30,
            next_report_at: None,
            last_report_sent_at: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScheduleForm {
    #[serde(default)]
    pub enabled: Option<String>,
    pub frequency: String,
    pub report_time: String,
    #[serde(default)]
    pub day_of_week: String,
    #[serde(default)]
    pub day_of_month: String,
    #[serde(default)]
    pub recipient_email: String,
    #[serde(default)]
    pub range_days: String,
}

impl ScheduleForm {
    /// Applies the submitted values to `current`, keeping the send history.
    pub fn apply(&self, current: &ReportSchedule) -> Result<ReportSchedule, ValidationError> {
        let frequency: ReportFrequency = self.frequency.parse()?;

        let raw_time = self.report_time.trim();
        let report_time = NaiveTime::parse_from_str(raw_time, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw_time, "%H:%M:%S"))
            .map_err(|_| ValidationError::InvalidChoice(raw_time.to_string(), "report_time"))?;

        let day_of_week = match self.day_of_week.trim() {
            "" => None,
            raw => Some(parse_weekday(raw)?),
        };

        let day_of_month = match self.day_of_month.trim() {
            "" => None,
            raw => {
                let day: u32 = raw
                    .parse()
                    .map_err(|_| ValidationError::InvalidNumber("day_of_month"))?;
                if !(1..=31).contains(&day) {
                    return Err(ValidationError::InvalidChoice(raw.to_string(), "day_of_month"));
                }
                Some(day)
            }
        };

        let recipient_email = match self.recipient_email.trim() {
            "" => None,
            email if is_valid_email(email) => Some(email.to_string()),
            email => return Err(ValidationError::InvalidChoice(email.to_string(), "recipient_email")),
        };

        let range_days = match self.range_days.trim() {
            "" => current.range_days,
            raw => {
                let days: u32 = raw
                    .parse()
                    .map_err(|_| ValidationError::InvalidNumber("range_days"))?;
                if !(1..=365).contains(&days) {
                    return Err(ValidationError::InvalidChoice(raw.to_string(), "range_days"));
                }
                days
            }
        };

        Ok(ReportSchedule {
            enabled: self.enabled.is_some(),
            frequency,
            report_time,
            day_of_week,
            day_of_month,
            recipient_email,
            range_days,
            next_report_at: current.next_report_at,
            last_report_sent_at: current.last_report_sent_at,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub chart: Option<String>,
    pub range: Option<String>,
    pub table_range: Option<String>,
    pub saved: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChartQuery {
    pub chart: Option<String>,
    pub range: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TableQuery {
    pub table_range: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingsQuery {
    pub saved: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AiInsightForm {
    #[serde(default)]
    pub custom_prompt: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ChartData {
    pub dates: Vec<String>,
    pub values: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChartResponse {
    pub data: ChartData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InsightResponse {
    pub insight: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AiInsightResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl AiInsightResponse {
    pub fn ok(response: String) -> Self {
        Self {
            success: true,
            response: Some(response),
            error: None,
            error_type: None,
        }
    }

    pub fn failed(error: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            success: false,
            response: None,
            error: Some(error.into()),
            error_type: Some(error_type.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(date: &str, steps: &str, sleep: &str, heart_rate: &str) -> RecordForm {
        RecordForm {
            date: date.to_string(),
            steps: steps.to_string(),
            sleep_hours: sleep.to_string(),
            heart_rate: heart_rate.to_string(),
            notes: "  ".to_string(),
        }
    }

    #[test]
    fn record_form_accepts_missing_heart_rate_and_blank_notes() {
        let input = form("2026-01-05", "8000", "7.5", "").validate().unwrap();
        assert_eq!(input.date, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        assert_eq!(input.steps, 8000);
        assert_eq!(input.heart_rate, None);
        assert_eq!(input.notes, None);
    }

    #[test]
    fn record_form_rejects_out_of_range_values() {
        assert_eq!(
            form("2026-01-05", "-1", "7", "").validate(),
            Err(ValidationError::NegativeSteps)
        );
        assert_eq!(
            form("2026-01-05", "10", "24.5", "").validate(),
            Err(ValidationError::SleepOutOfRange)
        );
        assert_eq!(
            form("2026-01-05", "10", "7", "250").validate(),
            Err(ValidationError::HeartRateOutOfRange)
        );
        assert_eq!(
            form("01/05/2026", "10", "7", "").validate(),
            Err(ValidationError::InvalidDate)
        );
    }

    #[test]
    fn record_form_rejects_years_outside_the_calendar_range() {
        assert_eq!(
            form("-262143-01-05", "10", "7", "").validate(),
            Err(ValidationError::InvalidDate)
        );
        assert_eq!(
            form("1899-12-31", "10", "7", "").validate(),
            Err(ValidationError::InvalidDate)
        );
        assert!(form("1900-01-01", "10", "7", "").validate().is_ok());
    }

    #[test]
    fn email_needs_local_part_and_dotted_domain() {
        assert!(is_valid_email("me@example.com"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
        assert!(!is_valid_email("@"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("me@localhost"));
        assert!(!is_valid_email("me@example..com"));
        assert!(!is_valid_email("me@@example.com"));
        assert!(!is_valid_email("me@example.com\r\nBcc: attacker@evil.test"));
    }

    #[test]
    fn schedule_form_rejects_header_injection_in_recipient() {
        let submitted = ScheduleForm {
            enabled: Some("on".to_string()),
            frequency: "daily".to_string(),
            report_time: "08:00".to_string(),
            day_of_week: String::new(),
            day_of_month: String::new(),
            recipient_email: "me@example.com\r\nBcc: attacker@evil.test".to_string(),
            range_days: String::new(),
        };
        assert!(matches!(
            submitted.apply(&ReportSchedule::default()),
            Err(ValidationError::InvalidChoice(_, "recipient_email"))
        ));

        let bare_at = ScheduleForm {
            recipient_email: "@".to_string(),
            ..submitted
        };
        assert!(bare_at.apply(&ReportSchedule::default()).is_err());
    }

    #[test]
    fn schedule_form_keeps_send_history() {
        let current = ReportSchedule {
            last_report_sent_at: NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0),
            ..ReportSchedule::default()
        };
        let submitted = ScheduleForm {
            enabled: Some("on".to_string()),
            frequency: "Weekly".to_string(),
            report_time: "07:30".to_string(),
            day_of_week: "friday".to_string(),
            day_of_month: String::new(),
            recipient_email: "me@example.com".to_string(),
            range_days: "14".to_string(),
        };

        let schedule = submitted.apply(&current).unwrap();
        assert!(schedule.enabled);
        assert_eq!(schedule.frequency, ReportFrequency::Weekly);
        assert_eq!(schedule.day_of_week, Some(Weekday::Fri));
        assert_eq!(schedule.range_days, 14);
        assert_eq!(schedule.last_report_sent_at, current.last_report_sent_at);
    }
}
