use crate::models::{weekday_name, HealthRecord, ReportFrequency, ReportSchedule};
use crate::stats::{self, ChartMetric, HealthAlert, Summary, TableRange};
use chrono::{NaiveDate, Weekday};

const CHART_RANGES: [i64; 4] = [7, 30, 90, 365];
const METRICS: [ChartMetric; 3] = [ChartMetric::Steps, ChartMetric::Sleep, ChartMetric::HeartRate];
const TABLE_RANGES: [(TableRange, &str); 4] = [
    (TableRange::Week, "Last 7 days"),
    (TableRange::Month, "Last 30 days"),
    (TableRange::Quarter, "Last 90 days"),
    (TableRange::All, "All records"),
];

/// Escapes text for HTML bodies and attributes. Braces are escaped too so
/// user text can never form a template placeholder.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, active: &str, body: &str) -> String {
    let nav: String = [("/", "Dashboard"), ("/ai-doctor", "AI Doctor"), ("/settings", "Settings")]
        .iter()
        .map(|(href, label)| {
            let class = if *label == active { " class=\"active\"" } else { "" };
            format!(r#"<a href="{href}"{class}>{label}</a>"#)
        })
        .collect();

    LAYOUT_HTML
        .replace("{{TITLE}}", &escape_html(title))
        .replace("{{NAV}}", &nav)
        .replace("{{BODY}}", body)
}

pub struct DashboardView<'a> {
    pub table_records: &'a [HealthRecord],
    pub summary: Option<&'a Summary>,
    pub latest: Option<&'a HealthRecord>,
    pub alerts: &'a [HealthAlert],
    pub insight: Option<&'a str>,
    pub chart: ChartMetric,
    pub chart_days: i64,
    pub table_range: TableRange,
    pub saved: Option<&'a str>,
    pub today: NaiveDate,
}

pub fn render_dashboard(view: &DashboardView<'_>) -> String {
    let flash = match view.saved {
        Some(date) => format!(
            r#"<div class="flash ok">Record for {} saved.</div>"#,
            escape_html(date)
        ),
        None => String::new(),
    };

    let stats_panel = match view.summary {
        Some(summary) => format!(
            r#"<section class="panel">
        <div class="stat"><span class="label">Avg steps</span><span class="value">{:.0}</span></div>
        <div class="stat"><span class="label">Avg sleep</span><span class="value">{:.1} h</span></div>
        <div class="stat"><span class="label">Avg heart rate</span><span class="value">{}</span></div>
        <div class="stat"><span class="label">Days logged</span><span class="value net">{}</span></div>
      </section>"#,
            summary.avg_steps,
            summary.avg_sleep,
            summary
                .avg_heart_rate
                .map(|bpm| format!("{bpm:.0} bpm"))
                .unwrap_or_else(|| "n/a".to_string()),
            summary.total_days
        ),
        None => r#"<section class="empty">No health data found. Please add records to get started.</section>"#
            .to_string(),
    };

    let alerts = render_alerts(view.latest, view.alerts);

    let metric_tabs: String = METRICS
        .iter()
        .map(|metric| {
            let active = *metric == view.chart;
            format!(
                r#"<button class="tab{}" type="button" data-chart="{}" aria-selected="{}">{}</button>"#,
                if active { " active" } else { "" },
                metric.as_param(),
                active,
                metric.label()
            )
        })
        .collect();

    let range_tabs: String = CHART_RANGES
        .iter()
        .map(|days| {
            let active = *days == view.chart_days;
            format!(
                r#"<button class="tab{}" type="button" data-range="{days}" aria-selected="{}">{days}d</button>"#,
                if active { " active" } else { "" },
                active
            )
        })
        .collect();

    let table_options: String = TABLE_RANGES
        .iter()
        .map(|(range, label)| {
            format!(
                r#"<option value="{}"{}>{label}</option>"#,
                range.as_param(),
                if *range == view.table_range { " selected" } else { "" }
            )
        })
        .collect();

    let body = DASHBOARD_HTML
        .replace("{{CHART}}", view.chart.as_param())
        .replace("{{RANGE}}", &view.chart_days.to_string())
        .replace("{{TABLE_RANGE}}", view.table_range.as_param())
        .replace("{{TODAY}}", &view.today.format("%Y-%m-%d").to_string())
        .replace("{{STATS}}", &stats_panel)
        .replace("{{ALERTS}}", &alerts)
        .replace("{{METRIC_TABS}}", &metric_tabs)
        .replace("{{RANGE_TABS}}", &range_tabs)
        .replace("{{TABLE_OPTIONS}}", &table_options)
        .replace(
            "{{RECORDS}}",
            &render_records_fragment(view.table_records, view.insight),
        )
        .replace("{{FLASH}}", &flash);

    page("Health Dashboard", "Dashboard", &body).replace("{{SCRIPT}}", DASHBOARD_JS)
}

fn render_alerts(latest: Option<&HealthRecord>, alerts: &[HealthAlert]) -> String {
    let Some(latest) = latest else {
        return String::new();
    };
    if alerts.is_empty() {
        return format!(
            r#"<div class="flash ok">Latest record ({}) is within normal ranges.</div>"#,
            latest.date.format("%Y-%m-%d")
        );
    }
    let items: String = alerts
        .iter()
        .map(|alert| format!("<li>{}</li>", escape_html(&alert.message)))
        .collect();
    format!(
        r#"<div class="flash error"><strong>Alerts for {}</strong><ul>{items}</ul></div>"#,
        latest.date.format("%Y-%m-%d")
    )
}

/// Records table plus its week-over-week insight; swapped in place by the page script.
pub fn render_records_fragment(records: &[HealthRecord], insight: Option<&str>) -> String {
    let insight = match insight {
        Some(text) => format!(
            r#"<p class="insight" id="weekly-insight">{}</p>"#,
            escape_html(text)
        ),
        None => r#"<p class="insight idle" id="weekly-insight"></p>"#.to_string(),
    };

    if records.is_empty() {
        return format!(r#"{insight}<p class="hint">No records in this range.</p>"#);
    }

    let rows: String = records.iter().map(render_record_row).collect();
    format!(
        r#"{insight}<table class="records">
  <thead><tr><th>Date</th><th>Steps</th><th>Sleep (h)</th><th>Heart rate</th><th>Notes</th><th></th></tr></thead>
  <tbody>{rows}</tbody>
</table>"#
    )
}

fn render_record_row(record: &HealthRecord) -> String {
    let date = record.date.format("%Y-%m-%d").to_string();
    let heart_rate = record
        .heart_rate
        .map(|bpm| bpm.to_string())
        .unwrap_or_else(|| "-".to_string());
    let notes = escape_html(record.notes.as_deref().unwrap_or(""));
    let flagged = stats::is_high_heart_rate(record) || stats::is_low_sleep(record);
    let search = escape_html(&format!(
        "{date} {} {} {heart_rate} {}",
        record.steps,
        record.sleep_hours,
        record.notes.as_deref().unwrap_or("").to_lowercase()
    ));

    format!(
        r#"<tr data-search="{search}"{class}>
    <td>{date}</td><td>{steps}</td><td>{sleep:.1}</td><td>{heart_rate}</td><td>{notes}</td>
    <td class="actions"><a href="/records/{id}/edit">Edit</a>
      <button type="button" class="link danger" data-delete-url="/records/{id}/delete" data-delete-date="{date}">Delete</button></td>
  </tr>"#,
        class = if flagged { r#" class="alert""# } else { "" },
        steps = record.steps,
        sleep = record.sleep_hours,
        id = record.id,
    )
}

fn record_fields(date: &str, steps: &str, sleep: &str, heart_rate: &str, notes: &str) -> String {
    RECORD_FIELDS_HTML
        .replace("{{DATE}}", &escape_html(date))
        .replace("{{STEPS}}", &escape_html(steps))
        .replace("{{SLEEP}}", &escape_html(sleep))
        .replace("{{HEART_RATE}}", &escape_html(heart_rate))
        .replace("{{NOTES}}", &escape_html(notes))
}

pub fn render_edit_page(record: &HealthRecord) -> String {
    let fields = record_fields(
        &record.date.format("%Y-%m-%d").to_string(),
        &record.steps.to_string(),
        &record.sleep_hours.to_string(),
        &record.heart_rate.map(|bpm| bpm.to_string()).unwrap_or_default(),
        record.notes.as_deref().unwrap_or(""),
    );
    let body = format!(
        r#"<header><h1>Edit record</h1><p class="subtitle">{date}</p></header>
    <form class="record-form" method="post" action="/records/{id}/edit">
      {fields}
      <div class="form-actions"><button class="btn-add" type="submit">Save changes</button><a href="/">Cancel</a></div>
    </form>"#,
        date = record.date.format("%Y-%m-%d"),
        id = record.id,
    );
    page("Edit record", "Dashboard", &body).replace("{{SCRIPT}}", "")
}

pub struct AiDoctorView<'a> {
    pub summary: Option<&'a Summary>,
    pub latest: Option<&'a HealthRecord>,
    pub alerts: &'a [HealthAlert],
    pub ai_available: bool,
}

pub fn render_ai_page(view: &AiDoctorView<'_>) -> String {
    let body = match view.summary {
        None => r#"<header><h1>AI Doctor</h1></header>
    <section class="empty">No health data found. Please add records to get AI insights.</section>"#
            .to_string(),
        Some(summary) => {
            let availability = if view.ai_available {
                String::new()
            } else {
                r#"<div class="flash error">AI is not configured on this server.</div>"#.to_string()
            };
            AI_HTML
                .replace("{{AVAILABILITY}}", &availability)
                .replace("{{DISABLED}}", if view.ai_available { "" } else { " disabled" })
                .replace("{{DAYS}}", &summary.total_days.to_string())
                .replace("{{AVG_STEPS}}", &format!("{:.0}", summary.avg_steps))
                .replace("{{AVG_SLEEP}}", &format!("{:.1}", summary.avg_sleep))
                .replace(
                    "{{AVG_HR}}",
                    &summary
                        .avg_heart_rate
                        .map(|bpm| format!("{bpm:.0} bpm"))
                        .unwrap_or_else(|| "n/a".to_string()),
                )
                .replace("{{ALERTS}}", &render_alerts(view.latest, view.alerts))
        }
    };
    page("AI Doctor", "AI Doctor", &body).replace("{{SCRIPT}}", AI_JS)
}

pub fn render_settings_page(schedule: &ReportSchedule, saved: bool) -> String {
    let frequencies: String = [ReportFrequency::Daily, ReportFrequency::Weekly, ReportFrequency::Monthly]
        .iter()
        .map(|frequency| {
            format!(
                r#"<option value="{value}"{selected}>{value}</option>"#,
                value = frequency.as_str(),
                selected = if *frequency == schedule.frequency { " selected" } else { "" }
            )
        })
        .collect();

    let weekdays: String = std::iter::once(r#"<option value="">(same weekday as today)</option>"#.to_string())
        .chain(
            [
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ]
            .iter()
            .map(|day| {
                format!(
                    r#"<option value="{value}"{selected}>{value}</option>"#,
                    value = weekday_name(*day),
                    selected = if schedule.day_of_week == Some(*day) { " selected" } else { "" }
                )
            }),
        )
        .collect();

    let status = match (schedule.enabled, schedule.next_report_at) {
        (true, Some(next)) => format!("Next report: {}", next.format("%Y-%m-%d %H:%M")),
        (true, None) => "Enabled, not yet scheduled.".to_string(),
        (false, _) => "Scheduled reports are off.".to_string(),
    };
    let last_sent = schedule
        .last_report_sent_at
        .map(|sent| format!(" Last sent {}.", sent.format("%Y-%m-%d %H:%M")))
        .unwrap_or_default();

    let body = SETTINGS_HTML
        .replace(
            "{{FLASH}}",
            if saved { r#"<div class="flash ok">Report schedule saved.</div>"# } else { "" },
        )
        .replace("{{STATUS}}", &format!("{status}{last_sent}"))
        .replace("{{CHECKED}}", if schedule.enabled { " checked" } else { "" })
        .replace("{{FREQUENCIES}}", &frequencies)
        .replace("{{TIME}}", &schedule.report_time.format("%H:%M").to_string())
        .replace("{{WEEKDAYS}}", &weekdays)
        .replace(
            "{{DAY_OF_MONTH}}",
            &schedule.day_of_month.map(|d| d.to_string()).unwrap_or_default(),
        )
        .replace("{{RANGE_DAYS}}", &schedule.range_days.to_string())
        .replace(
            "{{RECIPIENT}}",
            &escape_html(schedule.recipient_email.as_deref().unwrap_or("")),
        );
    page("Settings", "Settings", &body).replace("{{SCRIPT}}", "")
}

const LAYOUT_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <style>
    @import url('https://fonts.googleapis.com/css2?family=Space+Grotesk:wght@400;500;600&family=Fraunces:wght@600&display=swap');

    :root {
      --bg-1: #eef6f1;
      --bg-2: #bfe3d0;
      --ink: #24302b;
      --accent: #e0604a;
      --accent-2: #22577a;
      --card: rgba(255, 255, 255, 0.9);
      --shadow: 0 24px 60px rgba(34, 87, 122, 0.16);
    }

    * { box-sizing: border-box; }

    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at top, var(--bg-2), transparent 60%),
        linear-gradient(135deg, var(--bg-1), #e3f1ea 60%, #f5faf7 100%);
      color: var(--ink);
      font-family: "Space Grotesk", "Trebuchet MS", sans-serif;
      padding: 24px 18px 48px;
    }

    nav { display: flex; gap: 18px; justify-content: center; margin-bottom: 20px; }
    nav a { color: var(--accent-2); text-decoration: none; font-weight: 600; }
    nav a.active { border-bottom: 2px solid var(--accent); }

    .app {
      width: min(980px, 100%);
      margin: 0 auto;
      background: var(--card);
      border-radius: 28px;
      box-shadow: var(--shadow);
      padding: 36px;
      display: grid;
      gap: 28px;
    }

    h1 { font-family: "Fraunces", "Georgia", serif; font-size: clamp(2rem, 4vw, 2.6rem); margin: 0; }
    h2 { margin: 0; font-size: 1.3rem; }
    .subtitle { margin: 0; color: #5f6b65; }

    .panel { display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 16px; }
    .stat { background: white; border-radius: 18px; padding: 18px; border: 1px solid rgba(34, 87, 122, 0.08); display: grid; gap: 8px; }
    .stat .label { font-size: 0.85rem; text-transform: uppercase; letter-spacing: 0.12em; color: #7d8a84; }
    .stat .value { font-size: 1.6rem; font-weight: 600; color: var(--accent-2); }
    .stat .value.net { color: var(--accent); }

    .flash { border-radius: 14px; padding: 12px 16px; }
    .flash.ok { background: #e3f4ea; color: #2d7a4b; }
    .flash.error { background: #fbe7e3; color: #c63b2b; }
    .flash ul { margin: 6px 0 0; padding-left: 18px; }
    .empty { padding: 24px; text-align: center; color: #5f6b65; }

    .tabs { display: flex; gap: 6px; padding: 6px; background: rgba(34, 87, 122, 0.08); border-radius: 999px; flex-wrap: wrap; }
    .tab { background: transparent; border: none; border-radius: 999px; padding: 8px 14px; font-weight: 600; color: #66736d; cursor: pointer; }
    .tab.active { background: white; color: var(--accent-2); box-shadow: 0 8px 16px rgba(34, 87, 122, 0.12); }

    .chart-header { display: flex; flex-wrap: wrap; align-items: center; justify-content: space-between; gap: 16px; }
    .chart-card { position: relative; background: white; border-radius: 20px; padding: 16px; border: 1px solid rgba(34, 87, 122, 0.08); }
    #chart { width: 100%; height: 260px; display: block; }
    .chart-line { fill: none; stroke: var(--accent); stroke-width: 3; }
    .chart-point { fill: white; stroke: var(--accent); stroke-width: 2; }
    .chart-grid { stroke: rgba(34, 87, 122, 0.12); }
    .chart-label { fill: #74817b; font-size: 11px; }
    .overlay { position: absolute; inset: 0; display: grid; place-items: center; background: rgba(255, 255, 255, 0.7); border-radius: 20px; }
    .hidden { display: none !important; }

    .records-toolbar { display: flex; flex-wrap: wrap; gap: 12px; justify-content: space-between; align-items: center; }
    #records-container { max-height: 420px; overflow-y: auto; }
    table.records { width: 100%; border-collapse: collapse; }
    table.records th, table.records td { text-align: left; padding: 8px; border-bottom: 1px solid #eef1ef; }
    table.records tr.alert td { color: #c63b2b; }
    .insight { font-weight: 600; color: var(--accent-2); }
    .actions { display: flex; gap: 10px; align-items: center; }

    input, select, textarea { font: inherit; padding: 8px 10px; border-radius: 10px; border: 1px solid #cfd8d3; }
    .record-form { display: grid; grid-template-columns: repeat(auto-fit, minmax(160px, 1fr)); gap: 12px; align-items: end; }
    .record-form label { display: grid; gap: 4px; font-size: 0.9rem; }
    .form-actions { display: flex; gap: 12px; align-items: center; }

    button { font: inherit; cursor: pointer; }
    .btn-add { border: none; border-radius: 999px; padding: 12px 20px; font-weight: 600; background: var(--accent); color: white; }
    .link { background: none; border: none; color: var(--accent-2); padding: 0; }
    .link.danger { color: #c63b2b; }

    .modal { position: fixed; inset: 0; background: rgba(36, 48, 43, 0.45); display: grid; place-items: center; }
    .modal .dialog { background: white; border-radius: 18px; padding: 24px; width: min(420px, 90vw); display: grid; gap: 16px; }

    .ai-response { white-space: pre-wrap; background: white; border-radius: 18px; padding: 18px; border: 1px solid rgba(34, 87, 122, 0.08); }
    .hint { margin: 0; color: #6a7570; font-size: 0.9rem; }
  </style>
</head>
<body>
  <nav>{{NAV}}</nav>
  <main class="app">
    {{BODY}}
  </main>
  {{SCRIPT}}
</body>
</html>
"##;

const RECORD_FIELDS_HTML: &str = r##"<label>Date<input type="date" name="date" value="{{DATE}}" required /></label>
      <label>Steps<input type="number" name="steps" min="0" value="{{STEPS}}" required /></label>
      <label>Sleep (hours)<input type="number" name="sleep_hours" min="0" max="24" step="0.1" value="{{SLEEP}}" required /></label>
      <label>Heart rate (bpm)<input type="number" name="heart_rate" min="30" max="220" value="{{HEART_RATE}}" /></label>
      <label>Notes<input type="text" name="notes" value="{{NOTES}}" /></label>"##;

const DASHBOARD_HTML: &str = r##"<div id="dashboard" data-chart="{{CHART}}" data-range="{{RANGE}}" data-table-range="{{TABLE_RANGE}}">
    <header>
      <h1>Health Dashboard</h1>
      <p class="subtitle">Daily steps, sleep and heart rate at a glance.</p>
    </header>

    {{FLASH}}
    {{ALERTS}}
    {{STATS}}

    <section class="chart-area">
      <div class="chart-header">
        <h2 id="chart-title">Trends</h2>
        <div class="tabs" role="tablist">{{METRIC_TABS}}</div>
        <div class="tabs" role="tablist">{{RANGE_TABS}}</div>
      </div>
      <div class="chart-card">
        <svg id="chart" viewBox="0 0 600 260" aria-label="Metric chart" role="img"></svg>
        <div id="chart-overlay" class="overlay hidden">Loading...</div>
      </div>
      <div id="chart-error" class="flash error hidden">Could not load chart data.</div>
    </section>

    <section>
      <h2>Log today</h2>
      <form class="record-form" method="post" action="/records">
        <label>Date<input type="date" name="date" value="{{TODAY}}" required /></label>
        <label>Steps<input type="number" name="steps" min="0" required /></label>
        <label>Sleep (hours)<input type="number" name="sleep_hours" min="0" max="24" step="0.1" required /></label>
        <label>Heart rate (bpm)<input type="number" name="heart_rate" min="30" max="220" /></label>
        <label>Notes<input type="text" name="notes" /></label>
        <button class="btn-add" type="submit">Save record</button>
      </form>
    </section>

    <section class="records-area">
      <div class="records-toolbar">
        <h2>Records</h2>
        <input id="records-search" type="search" placeholder="Search records" />
        <select id="table-range">{{TABLE_OPTIONS}}</select>
      </div>
      <div id="records-error" class="flash error hidden">Could not refresh records.</div>
      <div id="records-container">{{RECORDS}}</div>
    </section>
  </div>

  <div id="delete-modal" class="modal hidden" role="dialog" aria-modal="true">
    <form class="dialog" id="delete-form" method="post">
      <h2>Delete record</h2>
      <p>Delete the record for <strong id="delete-date"></strong>? This cannot be undone.</p>
      <div class="form-actions">
        <button class="btn-add" type="submit">Delete</button>
        <button class="link" type="button" id="delete-cancel">Cancel</button>
      </div>
    </form>
  </div>"##;

const DASHBOARD_JS: &str = r##"<script>
    const chartLabels = { steps: 'Steps', sleep: 'Sleep (hours)', heart_rate: 'Heart rate (bpm)' };

    const createState = (root) => ({
      chart: root.dataset.chart,
      range: Number(root.dataset.range),
      tableRange: root.dataset.tableRange,
      search: ''
    });

    const elements = () => ({
      chart: document.getElementById('chart'),
      chartTitle: document.getElementById('chart-title'),
      overlay: document.getElementById('chart-overlay'),
      chartError: document.getElementById('chart-error'),
      records: document.getElementById('records-container'),
      recordsError: document.getElementById('records-error'),
      search: document.getElementById('records-search'),
      tableRange: document.getElementById('table-range'),
      modal: document.getElementById('delete-modal'),
      deleteForm: document.getElementById('delete-form'),
      deleteDate: document.getElementById('delete-date'),
      deleteCancel: document.getElementById('delete-cancel')
    });

    const formatAxisValue = (value) => {
      const rounded = Math.round(value * 10) / 10;
      return Number.isInteger(rounded) ? rounded.toString() : rounded.toFixed(1);
    };

    const renderLineChart = (svg, dates, values) => {
      if (!values.length) {
        svg.innerHTML = '<text class="chart-label" x="50%" y="50%" text-anchor="middle">No data in this range</text>';
        return;
      }

      const width = 600;
      const height = 260;
      const paddingX = 48;
      const paddingY = 34;
      const top = 24;

      let min = Math.min(...values, 0);
      let max = Math.max(...values);
      if (min === max) {
        max += 1;
      }

      const range = max - min;
      const xStep = values.length > 1 ? (width - paddingX * 2) / (values.length - 1) : 0;
      const scaleY = (height - top - paddingY) / range;
      const x = (index) => paddingX + index * xStep;
      const y = (value) => height - paddingY - (value - min) * scaleY;

      const path = values
        .map((value, index) => `${index === 0 ? 'M' : 'L'} ${x(index).toFixed(2)} ${y(value).toFixed(2)}`)
        .join(' ');

      let grid = '';
      for (let i = 0; i <= 4; i += 1) {
        const value = min + (range * i) / 4;
        grid += `<line class="chart-grid" x1="${paddingX}" y1="${y(value)}" x2="${width - paddingX}" y2="${y(value)}" />`;
        grid += `<text class="chart-label" x="${paddingX - 8}" y="${y(value) + 4}" text-anchor="end">${formatAxisValue(value)}</text>`;
      }

      const labelEvery = Math.max(1, Math.ceil(dates.length / 8));
      const labels = dates
        .map((date, index) => (index % labelEvery === 0
          ? `<text class="chart-label" x="${x(index)}" y="${height - paddingY + 18}" text-anchor="middle">${date.slice(5)}</text>`
          : ''))
        .join('');
      const points = values
        .map((value, index) => `<circle class="chart-point" cx="${x(index)}" cy="${y(value)}" r="3" />`)
        .join('');

      svg.innerHTML = `${grid}<path class="chart-line" d="${path}" />${points}${labels}`;
    };

    const syncUrl = (state) => {
      const params = new URLSearchParams(window.location.search);
      params.set('chart', state.chart);
      params.set('range', String(state.range));
      params.set('table_range', state.tableRange);
      params.delete('saved');
      window.history.replaceState(null, '', `${window.location.pathname}?${params}`);
    };

    const markActive = (selector, attribute, value) => {
      document.querySelectorAll(selector).forEach((button) => {
        const active = button.dataset[attribute] === String(value);
        button.classList.toggle('active', active);
        button.setAttribute('aria-selected', String(active));
      });
    };

    const refreshChart = async (state, el) => {
      el.overlay.classList.remove('hidden');
      el.chartError.classList.add('hidden');
      try {
        const res = await fetch(`/api/chart?chart=${encodeURIComponent(state.chart)}&range=${state.range}`);
        if (!res.ok) {
          throw new Error(await res.text());
        }
        const payload = await res.json();
        el.chartTitle.textContent = chartLabels[state.chart] || 'Trends';
        renderLineChart(el.chart, payload.data.dates, payload.data.values);
        syncUrl(state);
      } catch (err) {
        el.chartError.classList.remove('hidden');
      } finally {
        el.overlay.classList.add('hidden');
      }
    };

    const applySearch = (state, el) => {
      const needle = state.search.trim().toLowerCase();
      el.records.querySelectorAll('tbody tr').forEach((row) => {
        const haystack = row.dataset.search || '';
        row.classList.toggle('hidden', needle !== '' && !haystack.includes(needle));
      });
    };

    const refreshRecords = async (state, el) => {
      const scrollTop = el.records.scrollTop;
      const pageScroll = window.scrollY;
      el.recordsError.classList.add('hidden');
      try {
        const res = await fetch(`/partials/records?table_range=${encodeURIComponent(state.tableRange)}`);
        if (!res.ok) {
          throw new Error(await res.text());
        }
        el.records.innerHTML = await res.text();
        el.search.value = state.search;
        applySearch(state, el);
        el.records.scrollTop = scrollTop;
        window.scrollTo(0, pageScroll);
        syncUrl(state);
      } catch (err) {
        el.recordsError.classList.remove('hidden');
      }
    };

    const openDeleteModal = (el, url, date) => {
      el.deleteForm.setAttribute('action', url);
      el.deleteDate.textContent = date;
      el.modal.classList.remove('hidden');
    };

    const closeDeleteModal = (el) => {
      el.modal.classList.add('hidden');
      el.deleteForm.removeAttribute('action');
    };

    const dispatch = (state, el, event) => {
      switch (event.type) {
        case 'chart':
          state.chart = event.value;
          markActive('[data-chart]', 'chart', state.chart);
          return refreshChart(state, el);
        case 'range':
          state.range = Number(event.value);
          markActive('[data-range]', 'range', state.range);
          return refreshChart(state, el);
        case 'table-range':
          state.tableRange = event.value;
          return refreshRecords(state, el);
        case 'search':
          state.search = event.value;
          return applySearch(state, el);
        case 'delete':
          return openDeleteModal(el, event.url, event.date);
        case 'cancel-delete':
          return closeDeleteModal(el);
        default:
          return undefined;
      }
    };

    const init = (root) => {
      const state = createState(root);
      const el = elements();

      root.addEventListener('click', (event) => {
        const chartButton = event.target.closest('[data-chart]');
        if (chartButton && chartButton !== root) {
          dispatch(state, el, { type: 'chart', value: chartButton.dataset.chart });
          return;
        }
        const rangeButton = event.target.closest('[data-range]');
        if (rangeButton && rangeButton !== root) {
          dispatch(state, el, { type: 'range', value: rangeButton.dataset.range });
          return;
        }
        const deleteButton = event.target.closest('[data-delete-url]');
        if (deleteButton) {
          dispatch(state, el, {
            type: 'delete',
            url: deleteButton.dataset.deleteUrl,
            date: deleteButton.dataset.deleteDate
          });
        }
      });
      el.tableRange.addEventListener('change', () => dispatch(state, el, { type: 'table-range', value: el.tableRange.value }));
      el.search.addEventListener('input', () => dispatch(state, el, { type: 'search', value: el.search.value }));
      el.deleteCancel.addEventListener('click', () => dispatch(state, el, { type: 'cancel-delete' }));

      refreshChart(state, el);
      return state;
    };

    init(document.getElementById('dashboard'));
  </script>"##;

const AI_HTML: &str = r##"<header>
      <h1>AI Doctor</h1>
      <p class="subtitle">Insights on your last {{DAYS}} days of data.</p>
    </header>
    {{AVAILABILITY}}
    {{ALERTS}}
    <section class="panel">
      <div class="stat"><span class="label">Avg steps</span><span class="value">{{AVG_STEPS}}</span></div>
      <div class="stat"><span class="label">Avg sleep</span><span class="value">{{AVG_SLEEP}} h</span></div>
      <div class="stat"><span class="label">Avg heart rate</span><span class="value">{{AVG_HR}}</span></div>
    </section>
    <form id="ai-form" class="record-form">
      <label>Question (optional)<textarea name="custom_prompt" rows="3" placeholder="Ask something specific, or leave blank for a full review"></textarea></label>
      <button class="btn-add" type="submit"{{DISABLED}}>Get insights</button>
    </form>
    <div id="ai-status" class="hint"></div>
    <div id="ai-response" class="ai-response hidden"></div>"##;

const AI_JS: &str = r##"<script>
    const form = document.getElementById('ai-form');
    const statusEl = document.getElementById('ai-status');
    const responseEl = document.getElementById('ai-response');

    if (form) {
      form.addEventListener('submit', async (event) => {
        event.preventDefault();
        statusEl.textContent = 'Asking the AI doctor...';
        responseEl.classList.add('hidden');
        try {
          const res = await fetch('/api/ai/insights', {
            method: 'POST',
            headers: { 'content-type': 'application/x-www-form-urlencoded' },
            body: new URLSearchParams(new FormData(form))
          });
          const payload = await res.json();
          if (!payload.success) {
            throw new Error(payload.error || 'AI service did not return a response.');
          }
          responseEl.textContent = payload.response;
          responseEl.classList.remove('hidden');
          statusEl.textContent = '';
        } catch (err) {
          statusEl.textContent = err.message;
        }
      });
    }
  </script>"##;

const SETTINGS_HTML: &str = r##"<header>
      <h1>Settings</h1>
      <p class="subtitle">{{STATUS}}</p>
    </header>
    {{FLASH}}
    <form class="record-form" method="post" action="/settings">
      <label><span>Email scheduled reports</span><input type="checkbox" name="enabled"{{CHECKED}} /></label>
      <label>Frequency<select name="frequency">{{FREQUENCIES}}</select></label>
      <label>Time of day<input type="time" name="report_time" value="{{TIME}}" required /></label>
      <label>Day of week (weekly)<select name="day_of_week">{{WEEKDAYS}}</select></label>
      <label>Day of month (monthly)<input type="number" name="day_of_month" min="1" max="31" value="{{DAY_OF_MONTH}}" /></label>
      <label>Days covered<input type="number" name="range_days" min="1" max="365" value="{{RANGE_DAYS}}" /></label>
      <label>Recipient email<input type="email" name="recipient_email" value="{{RECIPIENT}}" /></label>
      <button class="btn-add" type="submit">Save schedule</button>
    </form>
    <p class="hint">Reports are sent by the send_reports job; run it from cron or with --loop.</p>"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::record;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn escape_html_neutralises_markup_and_placeholders() {
        assert_eq!(
            escape_html(r#"<b>"hi"</b> & {{BODY}}"#),
            "&lt;b&gt;&quot;hi&quot;&lt;/b&gt; &amp; &#123;&#123;BODY&#125;&#125;"
        );
    }

    #[test]
    fn records_fragment_lists_rows_with_delete_targets() {
        let mut noted = record(7, day(2), 4000, 4.5, Some(72));
        noted.notes = Some("<script>".to_string());
        let records = vec![record(8, day(3), 9000, 7.5, None), noted];

        let html = render_records_fragment(&records, Some("+300 steps/day, sleep +1.3 hrs"));
        assert!(html.contains("+300 steps/day, sleep +1.3 hrs"));
        assert!(html.contains(r#"data-delete-url="/records/7/delete" data-delete-date="2026-01-02""#));
        assert!(html.contains(r#"href="/records/8/edit""#));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains(r#"class="alert""#));
    }

    #[test]
    fn empty_fragment_keeps_idle_insight_slot() {
        let html = render_records_fragment(&[], None);
        assert!(html.contains(r#"id="weekly-insight""#));
        assert!(html.contains("No records in this range."));
    }

    #[test]
    fn dashboard_renders_without_leftover_placeholders() {
        let records = vec![record(1, day(3), 9000, 7.5, Some(120))];
        let summary = stats::summarize(&records).unwrap();
        let alerts = stats::alerts_for(&records[0]);
        let html = render_dashboard(&DashboardView {
            table_records: &records,
            summary: Some(&summary),
            latest: records.first(),
            alerts: &alerts,
            insight: Some("Not enough data for a weekly comparison yet."),
            chart: ChartMetric::Sleep,
            chart_days: 30,
            table_range: TableRange::Month,
            saved: Some("2026-01-03"),
            today: day(3),
        });

        assert!(!html.contains("{{"));
        assert!(html.contains(r#"data-chart="sleep""#));
        assert!(html.contains("Record for 2026-01-03 saved."));
        assert!(html.contains("High heart rate: 120 bpm"));
    }

    #[test]
    fn settings_page_reflects_schedule() {
        let schedule = ReportSchedule {
            enabled: true,
            frequency: ReportFrequency::Weekly,
            day_of_week: Some(Weekday::Fri),
            recipient_email: Some("me@example.com".to_string()),
            next_report_at: day(9).and_hms_opt(8, 0, 0),
            ..ReportSchedule::default()
        };
        let html = render_settings_page(&schedule, true);
        assert!(html.contains(r#"<option value="weekly" selected>"#));
        assert!(html.contains(r#"<option value="friday" selected>"#));
        assert!(html.contains("Next report: 2026-01-09 08:00"));
        assert!(html.contains("Report schedule saved."));
        assert!(!html.contains("{{"));
    }
}
