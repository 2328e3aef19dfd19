//! In-memory `ClipStore` used by the sync core tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::store::{ClipStore, StoreError, StoredClip};

#[derive(Default)]
pub struct MemStore {
    clips: Mutex<HashMap<String, StoredClip>>,
    /// Every accepted update, in order: (id, content)
    writes: Mutex<Vec<(String, String)>>,
    fail_writes: AtomicBool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, clip: StoredClip) {
        self.clips.lock().unwrap().insert(clip.id.clone(), clip);
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().unwrap().clone()
    }

    pub fn content_of(&self, id: &str) -> Option<String> {
        self.clips.lock().unwrap().get(id).map(|c| c.content.clone())
    }

    /// Simulate the store's TTL deleting a row out from under a live room
    pub fn expire(&self, id: &str) {
        self.clips.lock().unwrap().remove(id);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClipStore for MemStore {
    async fn insert_clip(&self, clip: &StoredClip) -> Result<(), StoreError> {
        self.clips
            .lock()
            .unwrap()
            .insert(clip.id.clone(), clip.clone());
        Ok(())
    }

    async fn load_clip(&self, id: &str) -> Result<Option<StoredClip>, StoreError> {
        Ok(self.clips.lock().unwrap().get(id).cloned())
    }

    async fn clip_exists(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.clips.lock().unwrap().contains_key(id))
    }

    async fn update_content(
        &self,
        id: &str,
        content: &str,
        last_updated: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError("simulated write failure".to_string()));
        }
        let mut clips = self.clips.lock().unwrap();
        match clips.get_mut(id) {
            Some(clip) => {
                clip.content = content.to_string();
                clip.last_updated = last_updated;
                clip.size_bytes = content.len() as i64;
                self.writes
                    .lock()
                    .unwrap()
                    .push((id.to_string(), content.to_string()));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        Ok(0)
    }
}

pub fn seeded_clip(id: &str, content: &str, secret_hash: &str) -> StoredClip {
    let now = Utc::now();
    StoredClip {
        id: id.to_string(),
        content: content.to_string(),
        created_at: now,
        last_updated: now,
        creator_secret_hash: secret_hash.to_string(),
        size_bytes: content.len() as i64,
    }
}
