use crate::calendar::schema::ensure_schema;
use crate::calendar::store::CalendarStore;
use crate::calendar::types::Event;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use sqlx::{
    FromRow,
    migrate::MigrateDatabase,
    sqlite::{Sqlite, SqlitePool},
};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct EventRow {
    id: String,
    summary: String,
    start_at: String,
    end_at: String,
    description: Option<String>,
    location: Option<String>,
}

impl EventRow {
    fn into_event(self) -> Result<Event, StoreError> {
        let start = DateTime::parse_from_rfc3339(&self.start_at)
            .map_err(|e| StoreError::Read(format!("bad start_at on {}: {}", self.id, e)))?;
        let end = DateTime::parse_from_rfc3339(&self.end_at)
            .map_err(|e| StoreError::Read(format!("bad end_at on {}: {}", self.id, e)))?;

        Ok(Event {
            summary: self.summary,
            start,
            end,
            event_id: Some(self.id),
            description: self.description,
            location: self.location,
        })
    }
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `url` and prepares the schema.
    pub async fn open(url: &str) -> Result<Self, StoreError> {
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            info!(url, "creating calendar database");
            Sqlite::create_database(url).await?;
        }

        let pool = SqlitePool::connect(url).await?;
        Self::from_pool(pool).await
    }

    /// Private in-memory database on a single pinned connection.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CalendarStore for SqliteStore {
    async fn events_in_range(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<Event>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, summary, start_at, end_at, description, location
            FROM events
            WHERE start_ts < ? AND end_ts > ?
            ORDER BY start_ts ASC
            "#,
        )
        .bind(end.timestamp())
        .bind(start.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Read(e.to_string()))?;

        rows.into_iter().map(EventRow::into_event).collect()
    }

    async fn create_event(&self, event: Event) -> Result<Event, StoreError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO events (id, summary, start_at, end_at, start_ts, end_ts, description, location)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&event.summary)
        .bind(event.start.to_rfc3339())
        .bind(event.end.to_rfc3339())
        .bind(event.start.timestamp())
        .bind(event.end.timestamp())
        .bind(&event.description)
        .bind(&event.location)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Write(e.to_string()))?;

        debug!(%id, summary = %event.summary, "stored event");
        Ok(event.with_event_id(id))
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), StoreError> {
        let rows_affected = sqlx::query("DELETE FROM events WHERE id = ?")
            .bind(event_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }

    async fn delete_by_summary_and_time(
        &self,
        summary: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<(), StoreError> {
        let rows_affected = sqlx::query(
            r#"
            DELETE FROM events WHERE id = (
                SELECT id FROM events
                WHERE summary = ? AND start_ts = ? AND end_ts = ?
                LIMIT 1
            )
            "#,
        )
        .bind(summary)
        .bind(start.timestamp())
        .bind(end.timestamp())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows_affected == 0 {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }
}
