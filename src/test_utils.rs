//! Shared fixtures for unit tests: an in-memory database and record builders.

use crate::models::{HealthRecord, RecordInput};
use crate::storage;
use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;

/// In-memory SQLite with migrations applied.
///
/// A single connection keeps every query on the same in-memory database.
pub async fn setup_test_db() -> SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    storage::migrate(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}

pub fn record(
    id: i64,
    date: NaiveDate,
    steps: i64,
    sleep_hours: f64,
    heart_rate: Option<i64>,
) -> HealthRecord {
    let now = Utc::now();
    HealthRecord {
        id,
        date,
        steps,
        sleep_hours,
        heart_rate,
        notes: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn input(date: NaiveDate, steps: i64, sleep_hours: f64, heart_rate: Option<i64>) -> RecordInput {
    RecordInput {
        date,
        steps,
        sleep_hours,
        heart_rate,
        notes: None,
    }
}

/// Logs `count` consecutive days ending at `end`, returning the stored rows.
pub async fn seed_days(pool: &SqlitePool, end: NaiveDate, count: i64) -> Vec<HealthRecord> {
    let mut seeded = Vec::new();
    for offset in 0..count {
        let date = end - chrono::Duration::days(offset);
        let saved = storage::upsert_record(
            pool,
            &input(date, 6000 + offset * 100, 7.0, Some(60 + offset)),
        )
        .await
        .expect("Failed to seed record");
        seeded.push(saved);
    }
    seeded
}
