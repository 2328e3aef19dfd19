use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A clip as the durable store sees it
#[derive(Debug, Clone)]
pub struct StoredClip {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub creator_secret_hash: String,
    pub size_bytes: i64,
}

#[derive(Debug)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError(e.to_string())
    }
}

/// The narrow interface the sync core uses to reach the durable store.
///
/// Expiry is the store's concern: a row whose lifetime has elapsed behaves
/// exactly like a row that never existed, on every method.
#[async_trait]
pub trait ClipStore: Send + Sync {
    async fn insert_clip(&self, clip: &StoredClip) -> Result<(), StoreError>;

    async fn load_clip(&self, id: &str) -> Result<Option<StoredClip>, StoreError>;

    async fn clip_exists(&self, id: &str) -> Result<bool, StoreError>;

    /// Overwrite content, last-updated timestamp and derived size.
    ///
    /// Returns `false` when the row is missing or already expired. The
    /// write is discarded in that case; expired rows are never resurrected.
    async fn update_content(
        &self,
        id: &str,
        content: &str,
        last_updated: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Remove rows whose lifetime has elapsed. Returns how many were swept.
    async fn delete_expired(&self) -> Result<u64, StoreError>;
}
