pub mod ai;
pub mod app;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod insights;
pub mod models;
pub mod report;
pub mod schedule;
pub mod stats;
pub mod storage;
pub mod ui;
pub mod state;

#[cfg(test)]
mod test_utils;

pub use app::router;
pub use config::Config;
pub use state::AppState;
