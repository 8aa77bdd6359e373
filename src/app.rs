use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/healthz", get(handlers::healthz))
        .route("/records", post(handlers::create_record))
        .route(
            "/records/:id/edit",
            get(handlers::edit_record_page).post(handlers::update_record),
        )
        .route("/records/:id/delete", post(handlers::delete_record))
        .route("/partials/records", get(handlers::records_partial))
        .route("/api/chart", get(handlers::get_chart))
        .route("/api/insight", get(handlers::get_insight))
        .route("/api/records", get(handlers::list_records))
        .route("/ai-doctor", get(handlers::ai_doctor))
        .route("/api/ai/insights", post(handlers::ai_insights))
        .route("/settings", get(handlers::settings_page).post(handlers::save_settings))
        .with_state(state)
}
