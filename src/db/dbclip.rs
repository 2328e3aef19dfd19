use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Error as SqlxError;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use super::store::{ClipStore, StoreError, StoredClip};

// Global database instance
static DB: OnceCell<Arc<DbClip>> = OnceCell::const_new();

/// Initialize the global database connection
///
/// # Arguments
/// * `database_url` - PostgreSQL connection string
/// * `ttl` - fixed clip lifetime, counted from row creation
pub async fn init_db(database_url: &str, ttl: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let db = DbClip::new(database_url, ttl).await?;
    db.ensure_schema().await?;
    DB.set(Arc::new(db))
        .map_err(|_| "Database already initialized")?;
    Ok(())
}

/// Get the global database instance
pub fn get_db() -> Option<Arc<DbClip>> {
    DB.get().cloned()
}

/// Clip row from the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClipRow {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub creator_secret_hash: String,
    pub size_bytes: i64,
}

impl From<ClipRow> for StoredClip {
    fn from(row: ClipRow) -> Self {
        StoredClip {
            id: row.id,
            content: row.content,
            created_at: row.created_at,
            last_updated: row.last_updated,
            creator_secret_hash: row.creator_secret_hash,
            size_bytes: row.size_bytes,
        }
    }
}

/// Database connection pool
pub struct DbClip {
    pool: PgPool,
    ttl: ChronoDuration,
}

impl DbClip {
    /// Create a new database connection pool
    pub async fn new(database_url: &str, ttl: Duration) -> Result<Self, SqlxError> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await?;

        info!("Database connection pool created successfully");

        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(900));
        Ok(Self { pool, ttl })
    }

    /// Create the clips table if it does not exist yet
    pub async fn ensure_schema(&self) -> Result<(), SqlxError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clips (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL DEFAULT '',
                created_at TIMESTAMPTZ NOT NULL,
                last_updated TIMESTAMPTZ NOT NULL,
                creator_secret_hash TEXT NOT NULL,
                size_bytes BIGINT NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS clips_created_at_idx ON clips (created_at)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Oldest creation time a row may have and still be live
    fn cutoff(&self) -> DateTime<Utc> {
        Utc::now() - self.ttl
    }
}

#[async_trait]
impl ClipStore for DbClip {
    async fn insert_clip(&self, clip: &StoredClip) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO clips (id, content, created_at, last_updated, creator_secret_hash, size_bytes)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&clip.id)
        .bind(&clip.content)
        .bind(clip.created_at)
        .bind(clip.last_updated)
        .bind(&clip.creator_secret_hash)
        .bind(clip.size_bytes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load_clip(&self, id: &str) -> Result<Option<StoredClip>, StoreError> {
        let row = sqlx::query_as::<_, ClipRow>(
            r#"
            SELECT id, content, created_at, last_updated, creator_secret_hash, size_bytes
            FROM clips
            WHERE id = $1 AND created_at > $2
            "#,
        )
        .bind(id)
        .bind(self.cutoff())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(StoredClip::from))
    }

    async fn clip_exists(&self, id: &str) -> Result<bool, StoreError> {
        let row: Option<(i32,)> = sqlx::query_as(
            // Occupancy check does not filter on expiry: a not-yet-swept
            // expired row still occupies the identifier.
            "SELECT 1 FROM clips WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn update_content(
        &self,
        id: &str,
        content: &str,
        last_updated: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE clips
            SET content = $2, last_updated = $3, size_bytes = $4
            WHERE id = $1 AND created_at > $5
            "#,
        )
        .bind(id)
        .bind(content)
        .bind(last_updated)
        .bind(content.len() as i64)
        .bind(self.cutoff())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM clips WHERE created_at <= $1")
            .bind(self.cutoff())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
