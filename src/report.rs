//! Periodic health report: data gathering, rendering and delivery.

use crate::insights::weekly_insight;
use crate::models::{HealthRecord, ReportSchedule};
use crate::stats::{self, Summary};
use crate::storage::{self, DbPool, StoreError};
use crate::ui::escape_html;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, warn};

const RECENT_ROWS: usize = 7;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to deliver report: {0}")]
    Delivery(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportData {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub range_days: u32,
    pub summary: Option<Summary>,
    pub high_hr_days: usize,
    pub low_sleep_days: usize,
    pub alert_days: usize,
    pub latest_record: Option<HealthRecord>,
    /// Newest first.
    pub recent_records: Vec<HealthRecord>,
    pub insight: Option<String>,
    pub exec_summary: String,
}

impl ReportData {
    pub fn date_range(&self) -> String {
        format!(
            "{} - {}",
            self.start_date.format("%b %d, %Y"),
            self.end_date.format("%b %d, %Y")
        )
    }

    pub fn filename(&self) -> String {
        format!("health_report_{}.html", self.end_date.format("%Y%m%d"))
    }

    pub fn subject(&self) -> String {
        format!("Your Health Report ({})", self.date_range())
    }
}

/// Builds the report for the `range_days` days ending at `end_date`.
///
/// Records outside that window are ignored.
pub fn build_report_data(records: &[HealthRecord], end_date: NaiveDate, range_days: u32) -> ReportData {
    let range_days = range_days.max(1);
    let start_date = end_date - Duration::days(i64::from(range_days) - 1);
    let mut window = stats::between(records, start_date, end_date);
    window.sort_by_key(|record| record.date);

    let high_hr_days = window.iter().filter(|r| stats::is_high_heart_rate(r)).count();
    let low_sleep_days = window.iter().filter(|r| stats::is_low_sleep(r)).count();
    let alert_days = window
        .iter()
        .filter(|r| stats::is_high_heart_rate(r) || stats::is_low_sleep(r))
        .count();

    let summary = stats::summarize(&window);
    let exec_summary = match &summary {
        None => format!(
            "No records were logged between {} and {}.",
            start_date.format("%b %d, %Y"),
            end_date.format("%b %d, %Y")
        ),
        Some(summary) => format!(
            "Logged {} of {} days, averaging {:.0} steps and {:.1} hours of sleep per day, with {} alert day{}.",
            summary.total_days,
            range_days,
            summary.avg_steps,
            summary.avg_sleep,
            alert_days,
            if alert_days == 1 { "" } else { "s" }
        ),
    };

    ReportData {
        start_date,
        end_date,
        range_days,
        latest_record: stats::latest(&window).cloned(),
        recent_records: window.iter().rev().take(RECENT_ROWS).cloned().collect(),
        insight: weekly_insight(&window),
        summary,
        high_hr_days,
        low_sleep_days,
        alert_days,
        exec_summary,
    }
}

pub fn render_report_html(data: &ReportData, generated_on: NaiveDateTime) -> String {
    let kpis = match &data.summary {
        Some(summary) => format!(
            r#"<div class="kpi"><span>Avg steps</span><strong>{:.0}</strong></div>
      <div class="kpi"><span>Avg sleep</span><strong>{:.1} h</strong></div>
      <div class="kpi"><span>Avg heart rate</span><strong>{}</strong></div>
      <div class="kpi"><span>Days logged</span><strong>{}</strong></div>"#,
            summary.avg_steps,
            summary.avg_sleep,
            summary
                .avg_heart_rate
                .map(|bpm| format!("{bpm:.0} bpm"))
                .unwrap_or_else(|| "n/a".to_string()),
            summary.total_days
        ),
        None => r#"<p class="empty">No data for this period.</p>"#.to_string(),
    };

    let rows: String = data
        .recent_records
        .iter()
        .map(|record| {
            let flagged = stats::is_high_heart_rate(record) || stats::is_low_sleep(record);
            format!(
                r#"<tr{}><td>{}</td><td>{}</td><td>{:.1}</td><td>{}</td></tr>"#,
                if flagged { r#" class="alert""# } else { "" },
                record.date.format("%Y-%m-%d"),
                record.steps,
                record.sleep_hours,
                record
                    .heart_rate
                    .map(|bpm| bpm.to_string())
                    .unwrap_or_else(|| "-".to_string())
            )
        })
        .collect();

    REPORT_HTML
        .replace("{{DATE_RANGE}}", &escape_html(&data.date_range()))
        .replace("{{GENERATED_ON}}", &generated_on.format("%b %d, %Y %H:%M").to_string())
        .replace("{{EXEC_SUMMARY}}", &escape_html(&data.exec_summary))
        .replace("{{KPIS}}", &kpis)
        .replace("{{HIGH_HR_DAYS}}", &data.high_hr_days.to_string())
        .replace("{{LOW_SLEEP_DAYS}}", &data.low_sleep_days.to_string())
        .replace("{{ALERT_DAYS}}", &data.alert_days.to_string())
        .replace(
            "{{INSIGHT}}",
            &escape_html(data.insight.as_deref().unwrap_or("No records in this period.")),
        )
        .replace("{{ROWS}}", &rows)
}

pub fn email_body(data: &ReportData, generated_on: NaiveDateTime) -> String {
    format!(
        "Hello,\n\nAttached is your health report for {} (last {} days), generated on {}.\n\n{}\n\nThis message was sent automatically by your health tracker.\n",
        data.date_range(),
        data.range_days,
        generated_on.format("%b %d, %Y %H:%M"),
        data.exec_summary
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub attachment: Attachment,
}

impl OutgoingEmail {
    /// Serializes as a multipart/mixed RFC 5322 message.
    pub fn to_message(&self, boundary: &str, sent_at: NaiveDateTime) -> String {
        format!(
            "From: {from}\r\nTo: {to}\r\nSubject: {subject}\r\nDate: {date}\r\nMIME-Version: 1.0\r\nContent-Type: multipart/mixed; boundary=\"{boundary}\"\r\n\r\n--{boundary}\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: 8bit\r\n\r\n{body}\r\n--{boundary}\r\nContent-Type: {content_type}; charset=utf-8; name=\"{filename}\"\r\nContent-Disposition: attachment; filename=\"{filename}\"\r\nContent-Transfer-Encoding: 8bit\r\n\r\n{content}\r\n--{boundary}--\r\n",
            from = header_value(&self.from),
            to = header_value(&self.to),
            subject = header_value(&self.subject),
            date = sent_at.format("%a, %d %b %Y %H:%M:%S +0000"),
            body = self.body,
            content_type = self.attachment.content_type,
            filename = header_value(&self.attachment.filename),
            content = self.attachment.content,
        )
    }
}

/// Control characters are dropped so a value cannot start a new header line.
fn header_value(value: &str) -> String {
    value.chars().filter(|c| !c.is_control()).collect()
}

pub trait Mailer {
    fn send(
        &self,
        email: &OutgoingEmail,
        sent_at: NaiveDateTime,
    ) -> impl std::future::Future<Output = Result<PathBuf, ReportError>> + Send;
}

/// Writes each message as an `.eml` file instead of talking to a mail server.
pub struct OutboxMailer {
    dir: PathBuf,
}

impl OutboxMailer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl Mailer for OutboxMailer {
    async fn send(&self, email: &OutgoingEmail, sent_at: NaiveDateTime) -> Result<PathBuf, ReportError> {
        fs::create_dir_all(&self.dir).await?;
        let stamp = sent_at.format("%Y%m%dT%H%M%S").to_string();
        let recipient: String = email
            .to
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let path = self.dir.join(format!("{stamp}_{recipient}.eml"));
        let boundary = format!("report-{stamp}");
        fs::write(&path, email.to_message(&boundary, sent_at)).await?;
        Ok(path)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub sent: usize,
    pub skipped: usize,
    /// Reports a dry run would have sent.
    pub pending: usize,
}

/// Sends the report if the stored schedule is due at `now`.
pub async fn run_due_reports<M: Mailer>(
    pool: &DbPool,
    mailer: &M,
    from_email: &str,
    now: NaiveDateTime,
    dry_run: bool,
) -> Result<RunSummary, ReportError> {
    let mut summary = RunSummary::default();
    let mut schedule = storage::load_schedule(pool).await?;

    if !schedule.is_due(now) {
        summary.skipped += 1;
        return Ok(summary);
    }

    let Some(recipient) = schedule.recipient_email.clone() else {
        warn!("skipping scheduled report: no recipient email configured");
        summary.skipped += 1;
        return Ok(summary);
    };

    if dry_run {
        info!("[dry run] would send report to {recipient}");
        summary.pending += 1;
        return Ok(summary);
    }

    match deliver(pool, mailer, &schedule, &recipient, from_email, now).await {
        Ok(path) => {
            info!("sent scheduled report to {recipient} ({})", path.display());
            schedule.last_report_sent_at = Some(now);
            schedule.reschedule(now);
            storage::save_schedule(pool, &schedule).await?;
            summary.sent += 1;
        }
        Err(err) => {
            error!("failed to send scheduled report to {recipient}: {err}");
            summary.skipped += 1;
        }
    }

    Ok(summary)
}

async fn deliver<M: Mailer>(
    pool: &DbPool,
    mailer: &M,
    schedule: &ReportSchedule,
    recipient: &str,
    from_email: &str,
    now: NaiveDateTime,
) -> Result<PathBuf, ReportError> {
    let end_date = now.date();
    let start_date = end_date - Duration::days(i64::from(schedule.range_days.max(1)) - 1);
    let records = storage::records_between(pool, start_date, end_date).await?;
    let data = build_report_data(&records, end_date, schedule.range_days);

    let email = OutgoingEmail {
        from: from_email.to_string(),
        to: recipient.to_string(),
        subject: data.subject(),
        body: email_body(&data, now),
        attachment: Attachment {
            filename: data.filename(),
            content_type: "text/html".to_string(),
            content: render_report_html(&data, now),
        },
    };
    mailer.send(&email, now).await
}

const REPORT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <title>Health Report</title>
  <style>
    body { font-family: "Helvetica Neue", Arial, sans-serif; color: #2b2a28; margin: 32px; }
    h1 { margin: 0 0 4px; }
    .meta { color: #6b645d; margin: 0 0 24px; }
    .summary { background: #f8f3e6; border-radius: 12px; padding: 16px; margin-bottom: 24px; }
    .kpis { display: flex; gap: 16px; flex-wrap: wrap; margin-bottom: 24px; }
    .kpi { border: 1px solid #e3ddd3; border-radius: 12px; padding: 12px 16px; min-width: 140px; }
    .kpi span { display: block; font-size: 12px; text-transform: uppercase; color: #8b857d; }
    .kpi strong { font-size: 22px; color: #2f4858; }
    table { border-collapse: collapse; width: 100%; }
    th, td { text-align: left; padding: 8px; border-bottom: 1px solid #eee; }
    tr.alert td { color: #c63b2b; }
  </style>
</head>
<body>
  <h1>Health Report</h1>
  <p class="meta">{{DATE_RANGE}} &middot; generated {{GENERATED_ON}}</p>
  <div class="summary">{{EXEC_SUMMARY}}</div>
  <div class="kpis">
      {{KPIS}}
  </div>
  <h2>Alerts</h2>
  <ul>
    <li>High heart rate days: {{HIGH_HR_DAYS}}</li>
    <li>Low sleep days: {{LOW_SLEEP_DAYS}}</li>
    <li>Days with any alert: {{ALERT_DAYS}}</li>
  </ul>
  <h2>Week over week</h2>
  <p>{{INSIGHT}}</p>
  <h2>Recent records</h2>
  <table>
    <thead><tr><th>Date</th><th>Steps</th><th>Sleep (h)</th><th>Heart rate</th></tr></thead>
    <tbody>{{ROWS}}</tbody>
  </table>
</body>
</html>
"#;
