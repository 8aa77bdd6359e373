use crate::ai::{self, AiError};
use crate::errors::AppError;
use crate::insights::weekly_insight;
use crate::models::{
    AiInsightForm, AiInsightResponse, ChartQuery, ChartResponse, DashboardQuery, HealthRecord,
    InsightResponse, RecordForm, ScheduleForm, SettingsQuery, TableQuery,
};
use crate::state::AppState;
use crate::stats::{self, ChartMetric, TableRange};
use crate::storage;
use crate::ui::{self, AiDoctorView, DashboardView};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, Redirect},
    Form, Json,
};
use chrono::Local;
use tracing::{info, warn};

/// Days of history summarised for the AI doctor.
const AI_WINDOW_DAYS: i64 = 30;

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Html<String>, AppError> {
    let records = storage::list_records(&state.db).await?;

    let chart = query
        .chart
        .as_deref()
        .and_then(|raw| raw.parse::<ChartMetric>().ok())
        .unwrap_or(ChartMetric::Steps);
    let chart_days = stats::chart_days(query.range.as_deref());
    let table_range = TableRange::from_param(query.table_range.as_deref());

    let table_records = stats::within_range(&records, table_range);
    let insight = weekly_insight(&table_records);
    let summary = stats::summarize(&records);
    let latest = stats::latest(&records);
    let alerts = latest.map(stats::alerts_for).unwrap_or_default();

    Ok(Html(ui::render_dashboard(&DashboardView {
        table_records: &table_records,
        summary: summary.as_ref(),
        latest,
        alerts: &alerts,
        insight: insight.as_deref(),
        chart,
        chart_days,
        table_range,
        saved: query.saved.as_deref(),
        today: Local::now().date_naive(),
    })))
}

pub async fn create_record(
    State(state): State<AppState>,
    Form(form): Form<RecordForm>,
) -> Result<Redirect, AppError> {
    let input = form.validate()?;
    let record = storage::upsert_record(&state.db, &input).await?;
    Ok(Redirect::to(&format!(
        "/?saved={}",
        record.date.format("%Y-%m-%d")
    )))
}

pub async fn edit_record_page(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Html<String>, AppError> {
    let id = parse_id(&id)?;
    let record = storage::get_record(&state.db, id).await?;
    Ok(Html(ui::render_edit_page(&record)))
}

pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<RecordForm>,
) -> Result<Redirect, AppError> {
    let id = parse_id(&id)?;
    let input = form.validate()?;
    storage::update_record(&state.db, id, &input).await?;
    Ok(Redirect::to("/"))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Redirect, AppError> {
    let id = parse_id(&id)?;
    storage::delete_record(&state.db, id).await?;
    Ok(Redirect::to("/"))
}

pub async fn records_partial(
    State(state): State<AppState>,
    Query(query): Query<TableQuery>,
) -> Result<Html<String>, AppError> {
    let records = table_records(&state, query.table_range.as_deref()).await?;
    let insight = weekly_insight(&records);
    Ok(Html(ui::render_records_fragment(&records, insight.as_deref())))
}

pub async fn get_chart(
    State(state): State<AppState>,
    Query(query): Query<ChartQuery>,
) -> Result<Json<ChartResponse>, AppError> {
    let metric = query
        .chart
        .as_deref()
        .unwrap_or("steps")
        .parse::<ChartMetric>()
        .map_err(AppError::bad_request)?;
    let days = stats::chart_days(query.range.as_deref());

    let records = storage::list_records(&state.db).await?;
    Ok(Json(ChartResponse {
        data: stats::chart_series(&records, metric, days),
    }))
}

pub async fn get_insight(
    State(state): State<AppState>,
    Query(query): Query<TableQuery>,
) -> Result<Json<InsightResponse>, AppError> {
    let records = table_records(&state, query.table_range.as_deref()).await?;
    Ok(Json(InsightResponse {
        insight: weekly_insight(&records),
    }))
}

pub async fn list_records(State(state): State<AppState>) -> Result<Json<Vec<HealthRecord>>, AppError> {
    Ok(Json(storage::list_records(&state.db).await?))
}

pub async fn ai_doctor(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let records = storage::list_records(&state.db).await?;
    let window = stats::within_days(&records, AI_WINDOW_DAYS);
    let summary = stats::summarize(&window);
    let latest = stats::latest(&window);
    let alerts = latest.map(stats::alerts_for).unwrap_or_default();

    Ok(Html(ui::render_ai_page(&AiDoctorView {
        summary: summary.as_ref(),
        latest,
        alerts: &alerts,
        ai_available: state.ai.is_some(),
    })))
}

pub async fn ai_insights(
    State(state): State<AppState>,
    Form(form): Form<AiInsightForm>,
) -> Result<(StatusCode, Json<AiInsightResponse>), AppError> {
    let records = storage::list_records(&state.db).await?;
    let window = stats::within_days(&records, AI_WINDOW_DAYS);
    if window.is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(AiInsightResponse::failed(
                "No health data found. Please add records to get AI insights.",
                "no_data",
            )),
        ));
    }

    let Some(client) = state.ai.as_ref() else {
        let err = AiError::MissingApiKey;
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(AiInsightResponse::failed(err.to_string(), err.error_type())),
        ));
    };

    let summary = ai::health_summary(&window);
    match client.insights(Some(&form.custom_prompt), &summary).await {
        Ok(text) => Ok((
            StatusCode::OK,
            Json(AiInsightResponse::ok(ai::clean_ai_response(&text))),
        )),
        Err(err) => {
            warn!(error_type = err.error_type(), "AI insights failed: {err}");
            Ok((
                StatusCode::BAD_GATEWAY,
                Json(AiInsightResponse::failed(err.to_string(), err.error_type())),
            ))
        }
    }
}

pub async fn settings_page(
    State(state): State<AppState>,
    Query(query): Query<SettingsQuery>,
) -> Result<Html<String>, AppError> {
    let schedule = storage::load_schedule(&state.db).await?;
    Ok(Html(ui::render_settings_page(&schedule, query.saved.is_some())))
}

pub async fn save_settings(
    State(state): State<AppState>,
    Form(form): Form<ScheduleForm>,
) -> Result<Redirect, AppError> {
    let current = storage::load_schedule(&state.db).await?;
    let mut schedule = form.apply(&current)?;
    schedule.reschedule(Local::now().naive_local());
    storage::save_schedule(&state.db, &schedule).await?;
    info!(
        enabled = schedule.enabled,
        frequency = %schedule.frequency,
        "report schedule saved"
    );
    Ok(Redirect::to("/settings?saved=1"))
}

async fn table_records(state: &AppState, range: Option<&str>) -> Result<Vec<HealthRecord>, AppError> {
    let records = storage::list_records(&state.db).await?;
    Ok(stats::within_range(&records, TableRange::from_param(range)))
}

fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::bad_request(format!("invalid record id '{raw}'")))
}
