use crate::error::StoreError;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Creates the events table and brings older databases up to date.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    debug!("checking calendar schema");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            summary TEXT NOT NULL,
            start_at TEXT NOT NULL,
            end_at TEXT NOT NULL,
            start_ts INTEGER NOT NULL,
            end_ts INTEGER NOT NULL,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )
    "#,
    )
    .execute(pool)
    .await?;

    // Added after the first release; older files lack them.
    if !column_exists(pool, "events", "description").await? {
        sqlx::query("ALTER TABLE events ADD COLUMN description TEXT")
            .execute(pool)
            .await?;
        info!("added description column to events");
    }

    if !column_exists(pool, "events", "location").await? {
        sqlx::query("ALTER TABLE events ADD COLUMN location TEXT")
            .execute(pool)
            .await?;
        info!("added location column to events");
    }

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_events_span ON events(start_ts, end_ts)")
        .execute(pool)
        .await?;

    debug!("calendar schema ready");
    Ok(())
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool, StoreError> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM pragma_table_info('{}') WHERE name = ?",
        table
    ))
    .bind(column)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upgrades_legacy_table() {
        let pool = memory_pool().await;
        sqlx::query(
            "CREATE TABLE events (id TEXT PRIMARY KEY, summary TEXT NOT NULL, start_at TEXT NOT NULL, \
             end_at TEXT NOT NULL, start_ts INTEGER NOT NULL, end_ts INTEGER NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();
        assert!(!column_exists(&pool, "events", "location").await.unwrap());

        ensure_schema(&pool).await.unwrap();
        assert!(column_exists(&pool, "events", "description").await.unwrap());
        assert!(column_exists(&pool, "events", "location").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_idempotent() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();
        ensure_schema(&pool).await.unwrap();
        assert!(column_exists(&pool, "events", "summary").await.unwrap());
    }
}
