// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SQLite store for canonical activities.
//!
//! Provides typed operations for:
//! - Activities (upserted by provider + provider activity ID)
//! - Streams (replaced wholesale on every save)
//! - Stream entries (one row per sample)

use crate::db::tables::{ACTIVITIES, STREAMS, STREAM_ENTRIES};
use crate::error::AppError;
use crate::models::{Activity, ActivitySummary, Provider, Stream, StreamEntry, StreamFlags, StreamType};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::time::Duration;

// SQLite caps bound parameters per statement; 4 per entry row.
const ENTRY_BATCH_SIZE: usize = 200;
const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite database client.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Connect to the database, creating the file if needed.
    ///
    /// In-memory URLs get a single connection that is never reaped, so every
    /// query sees the same database for the life of the pool.
    pub async fn connect(url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| AppError::Database(format!("Invalid database URL {}: {}", url, e)))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = pool_options(url)
            .connect_with(options)
            .await
            .map_err(|e| AppError::Database(format!("Failed to open {}: {}", url, e)))?;

        tracing::info!(url, "Connected to SQLite");

        Ok(Self { pool })
    }

    /// Connect and create the schema.
    pub async fn open(url: &str) -> Result<Self, AppError> {
        let db = Self::connect(url).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Create tables if they do not exist.
    pub async fn migrate(&self) -> Result<(), AppError> {
        let statements = [
            format!(
                "CREATE TABLE IF NOT EXISTS {ACTIVITIES} (
                    id INTEGER PRIMARY KEY,
                    provider TEXT NOT NULL,
                    provider_activity_id INTEGER NOT NULL,
                    distance REAL NOT NULL,
                    moving_time INTEGER NOT NULL,
                    duration INTEGER NOT NULL,
                    revision INTEGER NOT NULL DEFAULT 1,
                    updated_at TEXT NOT NULL,
                    UNIQUE (provider, provider_activity_id)
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {STREAMS} (
                    id INTEGER PRIMARY KEY,
                    activity_id INTEGER NOT NULL REFERENCES {ACTIVITIES}(id) ON DELETE CASCADE,
                    stream_type TEXT NOT NULL,
                    UNIQUE (activity_id, stream_type)
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {STREAM_ENTRIES} (
                    id INTEGER PRIMARY KEY,
                    stream_id INTEGER NOT NULL REFERENCES {STREAMS}(id) ON DELETE CASCADE,
                    idx INTEGER NOT NULL,
                    stream_type TEXT NOT NULL,
                    value REAL,
                    UNIQUE (stream_id, idx)
                )"
            ),
        ];

        for sql in &statements {
            sqlx::query(sql).execute(&self.pool).await?;
        }

        tracing::debug!("Schema ready");
        Ok(())
    }

    // ─── Activities ──────────────────────────────────────────────────────────

    /// Store an activity with its full stream tree.
    ///
    /// Re-saving the same (provider, provider activity ID) updates the row in
    /// place and replaces all of its streams. Returns the activity with store
    /// IDs filled in.
    pub async fn save_activity(&self, activity: &Activity) -> Result<Activity, AppError> {
        Ok(self.upsert_activity(activity).await?.0)
    }

    /// Like `save_activity`, also returning the row revision (1 on first save).
    pub async fn upsert_activity(&self, activity: &Activity) -> Result<(Activity, i64), AppError> {
        let provider_activity_id = provider_id_to_i64(activity.provider_activity_id)?;

        let mut tx = self.pool.begin().await?;

        let (id, revision): (i64, i64) = sqlx::query_as(&format!(
            "INSERT INTO {ACTIVITIES}
                (provider, provider_activity_id, distance, moving_time, duration, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT (provider, provider_activity_id) DO UPDATE SET
                distance = excluded.distance,
                moving_time = excluded.moving_time,
                duration = excluded.duration,
                revision = revision + 1,
                updated_at = excluded.updated_at
             RETURNING id, revision"
        ))
        .bind(activity.provider.as_str())
        .bind(provider_activity_id)
        .bind(activity.distance)
        .bind(i64::from(activity.moving_time))
        .bind(i64::from(activity.duration))
        .bind(chrono::Utc::now().to_rfc3339())
        .fetch_one(&mut *tx)
        .await?;

        let removed = replace_streams(&mut tx, id).await?;

        let mut saved = activity.clone();
        saved.id = Some(id);
        for stream in &mut saved.streams {
            let stream_id = insert_stream(&mut tx, id, stream).await?;
            stream.id = Some(stream_id);
            stream.activity_id = Some(id);
        }

        tx.commit().await?;

        tracing::debug!(
            provider = %activity.provider,
            activity_id = activity.provider_activity_id,
            id,
            revision,
            streams = saved.streams.len(),
            removed,
            "Saved activity"
        );

        Ok((saved, revision))
    }

    /// Load an activity with its streams (insertion order) and entries (by index).
    pub async fn get_activity(
        &self,
        provider: Provider,
        provider_activity_id: u64,
    ) -> Result<Option<Activity>, AppError> {
        let provider_activity_id = provider_id_to_i64(provider_activity_id)?;

        let row = sqlx::query(&format!(
            "SELECT id, provider, provider_activity_id, distance, moving_time, duration
             FROM {ACTIVITIES}
             WHERE provider = ? AND provider_activity_id = ?"
        ))
        .bind(provider.as_str())
        .bind(provider_activity_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut activity = row_to_activity(&row)?;
        let id = row.try_get::<i64, _>("id")?;

        let stream_rows = sqlx::query(&format!(
            "SELECT id, stream_type FROM {STREAMS} WHERE activity_id = ? ORDER BY id"
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        for stream_row in stream_rows {
            let stream_id: i64 = stream_row.try_get("id")?;
            let stream_type = parse_stream_type(&stream_row.try_get::<String, _>("stream_type")?)?;

            let entry_rows = sqlx::query(&format!(
                "SELECT idx, value FROM {STREAM_ENTRIES} WHERE stream_id = ? ORDER BY idx"
            ))
            .bind(stream_id)
            .fetch_all(&self.pool)
            .await?;

            let entries = entry_rows
                .iter()
                .map(|r| {
                    Ok(StreamEntry {
                        index: u32::try_from(r.try_get::<i64, _>("idx")?).map_err(|_| {
                            AppError::Database(format!("Negative index in stream {}", stream_id))
                        })?,
                        stream_type,
                        value: r.try_get("value")?,
                    })
                })
                .collect::<Result<Vec<_>, AppError>>()?;

            activity.streams.push(Stream {
                id: Some(stream_id),
                activity_id: Some(id),
                stream_type,
                entries,
            });
        }

        Ok(Some(activity))
    }

    /// Most recently stored activities first, with stream flags derived from
    /// the stored stream types.
    pub async fn list_activities(&self, limit: u32) -> Result<Vec<ActivitySummary>, AppError> {
        let rows = sqlx::query(&format!(
            "SELECT a.id, a.provider, a.provider_activity_id, a.distance, a.moving_time,
                    a.duration, GROUP_CONCAT(s.stream_type) AS stream_types
             FROM {ACTIVITIES} a
             LEFT JOIN {STREAMS} s ON s.activity_id = a.id
             GROUP BY a.id
             ORDER BY a.updated_at DESC, a.id DESC
             LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let activity = row_to_activity(row)?;
                let types = row
                    .try_get::<Option<String>, _>("stream_types")?
                    .unwrap_or_default();
                let types = types
                    .split(',')
                    .filter(|t| !t.is_empty())
                    .map(parse_stream_type)
                    .collect::<Result<Vec<_>, _>>()?;

                Ok(ActivitySummary {
                    flags: StreamFlags::from_types(types),
                    ..activity.summary()
                })
            })
            .collect()
    }

    /// Delete an activity with its streams and entries.
    ///
    /// Returns whether anything was deleted.
    pub async fn delete_activity(
        &self,
        provider: Provider,
        provider_activity_id: u64,
    ) -> Result<bool, AppError> {
        let provider_activity_id = provider_id_to_i64(provider_activity_id)?;
        let mut tx = self.pool.begin().await?;

        let id: Option<i64> = sqlx::query_scalar(&format!(
            "SELECT id FROM {ACTIVITIES} WHERE provider = ? AND provider_activity_id = ?"
        ))
        .bind(provider.as_str())
        .bind(provider_activity_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = id else {
            return Ok(false);
        };

        // Children first so the result holds even with foreign keys disabled
        replace_streams(&mut tx, id).await?;
        sqlx::query(&format!("DELETE FROM {ACTIVITIES} WHERE id = ?"))
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(%provider, activity_id = provider_activity_id, "Deleted activity");
        Ok(true)
    }

    /// Row count of a table (for diagnostics and tests).
    pub async fn count_rows(&self, table: &str) -> Result<i64, AppError> {
        if ![ACTIVITIES, STREAMS, STREAM_ENTRIES].contains(&table) {
            return Err(AppError::BadRequest(format!("Unknown table: {}", table)));
        }
        let count = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Delete every stream (and its entries) of an activity.
///
/// Returns the number of streams removed.
async fn replace_streams(tx: &mut Transaction<'_, Sqlite>, activity_id: i64) -> Result<u64, AppError> {
    sqlx::query(&format!(
        "DELETE FROM {STREAM_ENTRIES}
         WHERE stream_id IN (SELECT id FROM {STREAMS} WHERE activity_id = ?)"
    ))
    .bind(activity_id)
    .execute(&mut **tx)
    .await?;

    let result = sqlx::query(&format!("DELETE FROM {STREAMS} WHERE activity_id = ?"))
        .bind(activity_id)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected())
}

async fn insert_stream(
    tx: &mut Transaction<'_, Sqlite>,
    activity_id: i64,
    stream: &Stream,
) -> Result<i64, AppError> {
    let stream_id: i64 = sqlx::query_scalar(&format!(
        "INSERT INTO {STREAMS} (activity_id, stream_type) VALUES (?, ?) RETURNING id"
    ))
    .bind(activity_id)
    .bind(stream.stream_type.as_str())
    .fetch_one(&mut **tx)
    .await?;

    for chunk in stream.entries.chunks(ENTRY_BATCH_SIZE) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "INSERT INTO {STREAM_ENTRIES} (stream_id, idx, stream_type, value) "
        ));
        builder.push_values(chunk, |mut b, entry| {
            b.push_bind(stream_id)
                .push_bind(i64::from(entry.index))
                .push_bind(entry.stream_type.as_str())
                .push_bind(entry.value);
        });
        builder.build().execute(&mut **tx).await?;
    }

    Ok(stream_id)
}

fn row_to_activity(row: &SqliteRow) -> Result<Activity, AppError> {
    let provider: String = row.try_get("provider")?;
    let provider = Provider::from_str(&provider)
        .map_err(|e| AppError::Database(format!("Stored row has {}", e)))?;

    let provider_activity_id = u64::try_from(row.try_get::<i64, _>("provider_activity_id")?)
        .map_err(|_| AppError::Database("Stored provider activity ID is negative".to_string()))?;

    let mut activity = Activity::new(
        provider,
        provider_activity_id,
        row.try_get("distance")?,
        row.try_get("moving_time")?,
        row.try_get("duration")?,
    );
    activity.id = Some(row.try_get("id")?);
    Ok(activity)
}

fn parse_stream_type(raw: &str) -> Result<StreamType, AppError> {
    StreamType::from_str(raw).map_err(|e| AppError::Database(format!("Stored row has {}", e)))
}

fn provider_id_to_i64(id: u64) -> Result<i64, AppError> {
    i64::try_from(id).map_err(|_| {
        AppError::BadRequest(format!("Provider activity ID {} does not fit in storage", id))
    })
}

fn pool_options(url: &str) -> SqlitePoolOptions {
    if is_memory_url(url) {
        // Dropping the only connection drops the database
        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(MAX_CONNECTIONS)
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_db() -> SqliteDb {
        SqliteDb::open("sqlite::memory:").await.unwrap()
    }

    fn activity_with(streams: Vec<Stream>) -> Activity {
        let mut activity = Activity::new(Provider::Strava, 123, 5000.0, 1500, 1600);
        activity.attach_streams(streams);
        activity
    }

    #[tokio::test]
    async fn test_save_assigns_ids() {
        let db = test_db().await;
        let activity = activity_with(vec![Stream::from_samples(
            StreamType::Heartrate,
            [Some(120.0), None, Some(125.0)],
        ).unwrap()]);

        let saved = db.save_activity(&activity).await.unwrap();

        let id = saved.id.unwrap();
        assert_eq!(saved.streams[0].activity_id, Some(id));
        assert!(saved.streams[0].id.is_some());
    }

    #[tokio::test]
    async fn test_get_round_trips_entries_in_index_order() {
        let db = test_db().await;
        let samples: Vec<Option<f64>> = (0..450).map(|i| Some(f64::from(i))).collect();
        let activity = activity_with(vec![
            Stream::from_samples(StreamType::Time, samples.clone()).unwrap(),
            Stream::from_samples(StreamType::Heartrate, [Some(90.0), None]).unwrap(),
        ]);
        db.save_activity(&activity).await.unwrap();

        let loaded = db.get_activity(Provider::Strava, 123).await.unwrap().unwrap();

        assert_eq!(loaded.streams.len(), 2);
        assert_eq!(loaded.streams[0].stream_type, StreamType::Time);
        assert_eq!(loaded.streams[0].values().collect::<Vec<_>>(), samples);
        assert_eq!(
            loaded.streams[1].values().collect::<Vec<_>>(),
            vec![Some(90.0), None]
        );
        assert_eq!(loaded.moving_time, 1500);
    }

    #[tokio::test]
    async fn test_revision_counts_saves() {
        let db = test_db().await;
        let activity = activity_with(Vec::new());

        assert_eq!(db.upsert_activity(&activity).await.unwrap().1, 1);
        assert_eq!(db.upsert_activity(&activity).await.unwrap().1, 2);
        assert_eq!(db.count_rows(ACTIVITIES).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_missing_activity() {
        let db = test_db().await;
        assert!(db.get_activity(Provider::Strava, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_provider_id_rejected() {
        let db = test_db().await;
        let activity = Activity::new(Provider::Strava, u64::MAX, 0.0, 0, 0);
        let err = db.save_activity(&activity).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_delete_missing_returns_false() {
        let db = test_db().await;
        assert!(!db.delete_activity(Provider::Strava, 9).await.unwrap());
    }

    #[tokio::test]
    async fn test_count_rows_rejects_unknown_table() {
        let db = test_db().await;
        assert_eq!(db.count_rows(ACTIVITIES).await.unwrap(), 0);
        assert!(db.count_rows("sqlite_master").await.is_err());
    }

    #[test]
    fn test_memory_pool_keeps_its_connection() {
        let options = pool_options("sqlite::memory:");
        assert_eq!(options.get_max_connections(), 1);
        assert_eq!(options.get_min_connections(), 1);
        assert_eq!(options.get_idle_timeout(), None);
        assert_eq!(options.get_max_lifetime(), None);

        let options = pool_options("sqlite:stride.db");
        assert_eq!(options.get_max_connections(), MAX_CONNECTIONS);
    }

    #[test]
    fn test_memory_url_detection() {
        assert!(is_memory_url("sqlite::memory:"));
        assert!(is_memory_url("sqlite:file:test?mode=memory&cache=shared"));
        assert!(!is_memory_url("sqlite:stride.db"));
    }
}
