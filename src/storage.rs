use crate::models::{
    parse_weekday, weekday_name, HealthRecord, RecordInput, ReportFrequency, ReportSchedule,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

pub type DbPool = SqlitePool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("a record for {0} already exists")]
    DateConflict(NaiveDate),
    #[error("stored value is invalid: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("failed to prepare database directory: {0}")]
    Io(#[from] std::io::Error),
}

const RECORD_COLUMNS: &str =
    "id, date, steps, sleep_hours, heart_rate, notes, created_at, updated_at";

/// Filesystem location of a `sqlite:` URL, or `None` for in-memory databases.
pub fn database_file(database_url: &str) -> Option<PathBuf> {
    let rest = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Some(PathBuf::from(path))
}

/// Opens the pool and applies migrations, creating the database's parent
/// directory first when the URL points at a file.
pub async fn connect(database_url: &str) -> Result<DbPool, StoreError> {
    if let Some(parent) = database_file(database_url)
        .as_deref()
        .and_then(|path| path.parent())
        .filter(|parent| !parent.as_os_str().is_empty())
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;
    migrate(&pool).await?;
    info!("database ready at {database_url}");
    Ok(pool)
}

pub async fn migrate(pool: &DbPool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// All records, newest first.
pub async fn list_records(pool: &DbPool) -> Result<Vec<HealthRecord>, StoreError> {
    let records = sqlx::query_as::<_, HealthRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM health_records ORDER BY date DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(records)
}

pub async fn records_between(
    pool: &DbPool,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<HealthRecord>, StoreError> {
    let records = sqlx::query_as::<_, HealthRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM health_records WHERE date >= ?1 AND date <= ?2 ORDER BY date ASC"
    ))
    .bind(start)
    .bind(end)
    .fetch_all(pool)
    .await?;
    Ok(records)
}

pub async fn get_record(pool: &DbPool, id: i64) -> Result<HealthRecord, StoreError> {
    sqlx::query_as::<_, HealthRecord>(&format!(
        "SELECT {RECORD_COLUMNS} FROM health_records WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound)
}

/// Inserts a record, or updates the existing record for the same date.
pub async fn upsert_record(pool: &DbPool, input: &RecordInput) -> Result<HealthRecord, StoreError> {
    let now = Utc::now();
    let record = sqlx::query_as::<_, HealthRecord>(&format!(
        r#"
        INSERT INTO health_records (date, steps, sleep_hours, heart_rate, notes, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
        ON CONFLICT(date) DO UPDATE SET
          steps = excluded.steps,
          sleep_hours = excluded.sleep_hours,
          heart_rate = excluded.heart_rate,
          notes = excluded.notes,
          updated_at = excluded.updated_at
        RETURNING {RECORD_COLUMNS}
        "#
    ))
    .bind(input.date)
    .bind(input.steps)
    .bind(input.sleep_hours)
    .bind(input.heart_rate)
    .bind(input.notes.as_deref())
    .bind(now)
    .fetch_one(pool)
    .await?;

    info!("saved record for {}", record.date);
    Ok(record)
}

pub async fn update_record(
    pool: &DbPool,
    id: i64,
    input: &RecordInput,
) -> Result<HealthRecord, StoreError> {
    let record = sqlx::query_as::<_, HealthRecord>(&format!(
        r#"
        UPDATE health_records
        SET date = ?1, steps = ?2, sleep_hours = ?3, heart_rate = ?4, notes = ?5, updated_at = ?6
        WHERE id = ?7
        RETURNING {RECORD_COLUMNS}
        "#
    ))
    .bind(input.date)
    .bind(input.steps)
    .bind(input.sleep_hours)
    .bind(input.heart_rate)
    .bind(input.notes.as_deref())
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(|err| date_conflict_or(err, input.date))?
    .ok_or(StoreError::NotFound)?;

    info!("updated record {id} ({})", record.date);
    Ok(record)
}

/// The unique index on `date` is the source of truth for clashes.
fn date_conflict_or(err: sqlx::Error, date: NaiveDate) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::DateConflict(date);
        }
    }
    StoreError::Database(err)
}

pub async fn delete_record(pool: &DbPool, id: i64) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM health_records WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound);
    }
    info!("deleted record {id}");
    Ok(())
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    enabled: bool,
    frequency: String,
    report_time: NaiveTime,
    day_of_week: Option<String>,
    day_of_month: Option<i64>,
    recipient_email: Option<String>,
    range_days: i64,
    next_report_at: Option<NaiveDateTime>,
    last_report_sent_at: Option<NaiveDateTime>,
}

impl TryFrom<ScheduleRow> for ReportSchedule {
    type Error = StoreError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        let corrupt = |err: crate::models::ValidationError| StoreError::Corrupt(err.to_string());
        let frequency: ReportFrequency = row.frequency.parse().map_err(corrupt)?;
        let day_of_week = row
            .day_of_week
            .as_deref()
            .map(parse_weekday)
            .transpose()
            .map_err(corrupt)?;
        let day_of_month = row
            .day_of_month
            .map(u32::try_from)
            .transpose()
            .map_err(|err| StoreError::Corrupt(err.to_string()))?;
        let range_days =
            u32::try_from(row.range_days).map_err(|err| StoreError::Corrupt(err.to_string()))?;

        Ok(ReportSchedule {
            enabled: row.enabled,
            frequency,
            report_time: row.report_time,
            day_of_week,
            day_of_month,
            recipient_email: row.recipient_email,
            range_days,
            next_report_at: row.next_report_at,
            last_report_sent_at: row.last_report_sent_at,
        })
    }
}

/// The stored schedule, or the defaults when none has been saved yet.
pub async fn load_schedule(pool: &DbPool) -> Result<ReportSchedule, StoreError> {
    let row = sqlx::query_as::<_, ScheduleRow>(
        r#"
        SELECT enabled, frequency, report_time, day_of_week, day_of_month,
               recipient_email, range_days, next_report_at, last_report_sent_at
        FROM report_schedule WHERE id = 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => row.try_into(),
        None => Ok(ReportSchedule::default()),
    }
}

pub async fn save_schedule(pool: &DbPool, schedule: &ReportSchedule) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO report_schedule (
          id, enabled, frequency, report_time, day_of_week, day_of_month,
          recipient_email, range_days, next_report_at, last_report_sent_at, updated_at
        )
        VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(id) DO UPDATE SET
          enabled = excluded.enabled,
          frequency = excluded.frequency,
          report_time = excluded.report_time,
          day_of_week = excluded.day_of_week,
          day_of_month = excluded.day_of_month,
          recipient_email = excluded.recipient_email,
          range_days = excluded.range_days,
          next_report_at = excluded.next_report_at,
          last_report_sent_at = excluded.last_report_sent_at,
          updated_at = excluded.updated_at
        "#,
    )
    .bind(schedule.enabled)
    .bind(schedule.frequency.as_str())
    .bind(schedule.report_time)
    .bind(schedule.day_of_week.map(weekday_name))
    .bind(schedule.day_of_month.map(i64::from))
    .bind(schedule.recipient_email.as_deref())
    .bind(i64::from(schedule.range_days))
    .bind(schedule.next_report_at)
    .bind(schedule.last_report_sent_at)
    .bind(Utc::now())
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{input, seed_days, setup_test_db};
    use chrono::Weekday;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, d).unwrap()
    }

    #[test]
    fn database_file_handles_urls() {
        assert_eq!(
            database_file("sqlite://data/health.db?mode=rwc"),
            Some(PathBuf::from("data/health.db"))
        );
        assert_eq!(database_file("sqlite::memory:"), None);
        assert_eq!(database_file("postgres://localhost/db"), None);
    }

    #[tokio::test]
    async fn connect_creates_missing_database_directory() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("nested").join("data").join("health.db");
        let url = format!("sqlite://{}?mode=rwc", file.display());

        let pool = connect(&url).await.unwrap();
        assert!(file.exists());
        assert!(list_records(&pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_updates_existing_date_in_place() {
        let pool = setup_test_db().await;

        let first = upsert_record(&pool, &input(day(5), 1000, 6.0, None)).await.unwrap();
        let second = upsert_record(&pool, &input(day(5), 2000, 7.5, Some(70)))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.steps, 2000);
        assert_eq!(second.heart_rate, Some(70));
        assert_eq!(list_records(&pool).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_range_query_is_inclusive() {
        let pool = setup_test_db().await;
        seed_days(&pool, day(10), 5).await;

        let all = list_records(&pool).await.unwrap();
        assert_eq!(all.first().map(|r| r.date), Some(day(10)));
        assert_eq!(all.last().map(|r| r.date), Some(day(6)));

        let window = records_between(&pool, day(7), day(9)).await.unwrap();
        let dates: Vec<NaiveDate> = window.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(7), day(8), day(9)]);
    }

    #[tokio::test]
    async fn update_rejects_date_owned_by_another_record() {
        let pool = setup_test_db().await;
        let seeded = seed_days(&pool, day(10), 2).await;
        let (newest, older) = (&seeded[0], &seeded[1]);

        let err = update_record(&pool, older.id, &input(newest.date, 1, 1.0, None))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DateConflict(date) if date == newest.date));

        let moved = update_record(&pool, older.id, &input(day(1), 1, 1.0, None))
            .await
            .unwrap();
        assert_eq!(moved.date, day(1));
        assert_eq!(moved.created_at, older.created_at);

        let missing = update_record(&pool, 9999, &input(day(2), 1, 1.0, None))
            .await
            .unwrap_err();
        assert!(matches!(missing, StoreError::NotFound));
    }

    #[tokio::test]
    async fn delete_missing_record_is_not_found() {
        let pool = setup_test_db().await;
        let seeded = seed_days(&pool, day(10), 1).await;

        delete_record(&pool, seeded[0].id).await.unwrap();
        assert!(matches!(
            delete_record(&pool, seeded[0].id).await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(get_record(&pool, 999).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn schedule_defaults_then_round_trips() {
        let pool = setup_test_db().await;
        assert_eq!(load_schedule(&pool).await.unwrap(), ReportSchedule::default());

        let schedule = ReportSchedule {
            enabled: true,
            frequency: ReportFrequency::Weekly,
            report_time: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            day_of_week: Some(Weekday::Fri),
            day_of_month: None,
            recipient_email: Some("me@example.com".to_string()),
            range_days: 14,
            next_report_at: day(9).and_hms_opt(7, 30, 0),
            last_report_sent_at: None,
        };
        save_schedule(&pool, &schedule).await.unwrap();
        assert_eq!(load_schedule(&pool).await.unwrap(), schedule);
    }
}
