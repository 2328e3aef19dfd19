use rand::rngs::OsRng;
use rand::Rng;
use tracing::warn;

use crate::db::store::ClipStore;
use crate::models::SyncError;

/// Occupancy checks against the 4-digit space before widening
const NARROW_ATTEMPTS: usize = 50;

/// Clipboard identifiers are 4 or 5 ASCII digits.
///
/// Checked before any store lookup; malformed input never reaches the
/// database.
pub fn is_valid_identifier(id: &str) -> bool {
    (4..=5).contains(&id.len()) && id.bytes().all(|b| b.is_ascii_digit())
}

/// Allocate a free clipboard identifier.
///
/// Draws from the 4-digit space first, falling back to a single 5-digit
/// draw when the narrow space keeps colliding. The identifier is the only
/// read credential, so candidates come from the OS random source.
pub async fn allocate(store: &dyn ClipStore) -> Result<String, SyncError> {
    for _ in 0..NARROW_ATTEMPTS {
        let candidate = OsRng.gen_range(1000..10000).to_string();
        if !store.clip_exists(&candidate).await? {
            return Ok(candidate);
        }
    }

    warn!("4-digit identifier space congested, falling back to 5 digits");
    let fallback = OsRng.gen_range(10000..100000).to_string();
    if !store.clip_exists(&fallback).await? {
        return Ok(fallback);
    }

    Err(SyncError::AllocationExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memstore::{seeded_clip, MemStore};
    use crate::db::store::{StoreError, StoredClip};
    use async_trait::async_trait;

    #[test]
    fn identifier_format_is_strict() {
        assert!(is_valid_identifier("4821"));
        assert!(is_valid_identifier("48215"));
        assert!(!is_valid_identifier("482"));
        assert!(!is_valid_identifier("482156"));
        assert!(!is_valid_identifier("48a1"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("4821'; DROP TABLE clips;--"));
    }

    #[tokio::test]
    async fn allocates_from_narrow_space_when_free() {
        let store = MemStore::new();
        let id = allocate(&store).await.unwrap();
        assert_eq!(id.len(), 4);
        assert!(is_valid_identifier(&id));
    }

    #[tokio::test]
    async fn falls_back_to_wide_space_when_narrow_is_full() {
        let store = MemStore::new();
        for n in 1000..10000 {
            store.seed(seeded_clip(&n.to_string(), "", "hash"));
        }
        let id = allocate(&store).await.unwrap();
        assert_eq!(id.len(), 5);
    }

    struct FullStore;

    #[async_trait]
    impl ClipStore for FullStore {
        async fn insert_clip(&self, _clip: &StoredClip) -> Result<(), StoreError> {
            Ok(())
        }
        async fn load_clip(&self, _id: &str) -> Result<Option<StoredClip>, StoreError> {
            Ok(None)
        }
        async fn clip_exists(&self, _id: &str) -> Result<bool, StoreError> {
            Ok(true)
        }
        async fn update_content(
            &self,
            _id: &str,
            _content: &str,
            _last_updated: chrono::DateTime<chrono::Utc>,
        ) -> Result<bool, StoreError> {
            Ok(false)
        }
        async fn delete_expired(&self) -> Result<u64, StoreError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn errors_when_both_spaces_collide() {
        let result = allocate(&FullStore).await;
        assert!(matches!(result, Err(SyncError::AllocationExhausted)));
    }
}
