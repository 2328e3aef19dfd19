use chrono::{DateTime, Utc};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::store::ClipStore;
use crate::models::{RoomDataMessage, ServerEditMessage, ServerMessage, SyncError};
use crate::services::{id_service, secret_service};

/// Live state of one clip while at least one session is connected.
///
/// All mutation goes through the state mutex; nothing outside this module
/// holds a mutable reference. The creator hash is fixed at load time so
/// re-joins never hit the store while the room is active.
pub struct RoomHandle {
    identifier: String,
    creator_hash: String,
    tx: broadcast::Sender<ServerMessage>,
    state: Mutex<RoomState>,
}

impl RoomHandle {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }
}

struct RoomState {
    content: String,
    last_updated: DateTime<Utc>,
    /// Bumped on every accepted edit; lets a finished flush tell whether a
    /// newer edit superseded the snapshot it wrote.
    version: u64,
    /// Room content is ahead of the durable store
    dirty: bool,
    sessions: HashSet<Uuid>,
    /// At most one pending flush per room, replaced-not-stacked
    pending_flush: Option<JoinHandle<()>>,
}

/// Everything a freshly joined session needs
pub struct JoinedRoom {
    pub room: Arc<RoomHandle>,
    pub is_creator: bool,
    pub snapshot: RoomDataMessage,
    pub rx: broadcast::Receiver<ServerMessage>,
}

#[derive(Debug, Default)]
pub struct RegistryStats {
    pub n_rooms: u32,
    pub n_sessions: u32,
    pub n_dirty_rooms: u32,
    pub n_pending_flushes: u32,
}

/// Authoritative map of active rooms.
///
/// The map mutex guards membership only and is touched by join and
/// teardown; per-room state is serialized by the room's own mutex. Lock
/// order is always map before room.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Arc<RoomHandle>>>,
    store: Arc<dyn ClipStore>,
    debounce: Duration,
    max_bytes: usize,
}

impl RoomRegistry {
    pub fn new(store: Arc<dyn ClipStore>, debounce: Duration, max_bytes: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            store,
            debounce,
            max_bytes,
        }
    }

    pub fn store(&self) -> &Arc<dyn ClipStore> {
        &self.store
    }

    /// Join a session to the room for `identifier`.
    ///
    /// Creates the room from the durable store on first join, reuses live
    /// state afterwards. The content snapshot and the broadcast
    /// subscription are taken under the same room lock, so the joiner
    /// either sees an edit in its snapshot or receives it as a broadcast,
    /// never neither.
    pub async fn join(
        &self,
        identifier: &str,
        creator_secret: Option<&str>,
        session_id: Uuid,
    ) -> Result<JoinedRoom, SyncError> {
        if !id_service::is_valid_identifier(identifier) {
            return Err(SyncError::InvalidIdentifier);
        }

        let mut loaded = None;
        'retry: loop {
            // Try the active room first; load from the store only when
            // absent. A load that loses the insert race is discarded in
            // favor of the room that won.
            let room = loop {
                {
                    let mut rooms = self.rooms.lock().await;
                    match rooms.entry(identifier.to_string()) {
                        Entry::Occupied(entry) => break entry.get().clone(),
                        Entry::Vacant(entry) => {
                            if let Some(clip) = loaded.take() {
                                break entry.insert(Self::new_room(clip)).clone();
                            }
                        }
                    }
                }

                let clip = self
                    .store
                    .load_clip(identifier)
                    .await?
                    .ok_or(SyncError::NotFound)?;
                loaded = Some(clip);
            };

            // Verified outside any lock: the hash is deliberately expensive.
            // An absent secret means viewer, never an error.
            let is_creator = match creator_secret {
                Some(secret) => secret_service::verify_secret(secret, &room.creator_hash),
                None => false,
            };

            // Membership is inserted under the map lock; a room that was
            // torn down while the secret was being verified is resolved
            // again instead of being joined as an orphan
            let rooms = self.rooms.lock().await;
            if !rooms
                .get(identifier)
                .is_some_and(|mapped| Arc::ptr_eq(mapped, &room))
            {
                continue 'retry;
            }
            let mut state = room.state.lock().await;
            state.sessions.insert(session_id);
            // Snapshot and subscription happen under the same lock as the
            // insert: the joiner sees an edit either here or as a broadcast
            let rx = room.tx.subscribe();
            let snapshot = RoomDataMessage {
                identifier: identifier.to_string(),
                content: state.content.clone(),
                is_creator,
                last_updated: state.last_updated,
            };
            drop(state);
            drop(rooms);

            debug!(
                "Session {} joined room {} as {}",
                session_id,
                identifier,
                if is_creator { "creator" } else { "viewer" }
            );

            return Ok(JoinedRoom {
                room,
                is_creator,
                snapshot,
                rx,
            });
        }
    }

    fn new_room(clip: crate::db::store::StoredClip) -> Arc<RoomHandle> {
        let (tx, _rx) = broadcast::channel::<ServerMessage>(100);
        Arc::new(RoomHandle {
            identifier: clip.id,
            creator_hash: clip.creator_secret_hash,
            tx,
            state: Mutex::new(RoomState {
                content: clip.content,
                last_updated: clip.last_updated,
                version: 0,
                dirty: false,
                sessions: HashSet::new(),
                pending_flush: None,
            }),
        })
    }

    /// Accept or reject an edit from a joined session.
    ///
    /// On acceptance the full content replaces the room content, a
    /// server-stamped `server-edit` goes to every subscriber including the
    /// editor, and the room's flush timer is rescheduled.
    pub async fn edit(
        &self,
        room: &Arc<RoomHandle>,
        is_creator: bool,
        identifier: &str,
        full_text: &str,
    ) -> Result<(), SyncError> {
        // A session replaying edits into a room it names but never joined
        // (or already left) is rejected before any authority check
        if identifier != room.identifier {
            return Err(SyncError::NotInRoom);
        }
        if !is_creator {
            return Err(SyncError::Unauthorized);
        }
        // The HTTP boundary enforces the same ceiling; the socket path
        // bypasses that layer, so it is checked again here
        if full_text.len() > self.max_bytes {
            return Err(SyncError::PayloadTooLarge);
        }

        self.apply_edit(room, full_text).await;
        Ok(())
    }

    /// Route an HTTP edit through the live room, if one exists.
    ///
    /// Returns `Ok(None)` when the room is absent; the caller then writes
    /// straight to the store. Keeping both write paths on the same room
    /// state is what stops them diverging.
    pub async fn edit_via_room(
        &self,
        identifier: &str,
        creator_secret: &str,
        full_text: &str,
    ) -> Result<Option<DateTime<Utc>>, SyncError> {
        let room = { self.rooms.lock().await.get(identifier).cloned() };
        let Some(room) = room else {
            return Ok(None);
        };
        if !secret_service::verify_secret(creator_secret, &room.creator_hash) {
            return Err(SyncError::Unauthorized);
        }
        if full_text.len() > self.max_bytes {
            return Err(SyncError::PayloadTooLarge);
        }
        Ok(Some(self.apply_edit(&room, full_text).await))
    }

    /// Current content of a live room, if any. Used by HTTP reads so they
    /// observe pending edits instead of the stale stored value.
    pub async fn room_snapshot(&self, identifier: &str) -> Option<(String, DateTime<Utc>)> {
        let room = { self.rooms.lock().await.get(identifier).cloned() }?;
        let state = room.state.lock().await;
        Some((state.content.clone(), state.last_updated))
    }

    async fn apply_edit(&self, room: &Arc<RoomHandle>, full_text: &str) -> DateTime<Utc> {
        let now = Utc::now();
        let mut state = room.state.lock().await;
        state.content = full_text.to_string();
        state.last_updated = now;
        state.version += 1;
        state.dirty = true;

        // Client timestamps are informational only; subscribers get the
        // server-assigned order
        let _ = room.tx.send(ServerMessage::ServerEdit(ServerEditMessage {
            identifier: room.identifier.clone(),
            full_text: full_text.to_string(),
            server_timestamp: now.timestamp_millis(),
        }));

        self.schedule_flush(room, &mut state);
        now
    }

    /// Replace the room's pending flush with a fresh debounce timer.
    /// Called with the room state locked.
    fn schedule_flush(&self, room: &Arc<RoomHandle>, state: &mut RoomState) {
        if let Some(handle) = state.pending_flush.take() {
            handle.abort();
        }
        let room = room.clone();
        let store = self.store.clone();
        let debounce = self.debounce;
        state.pending_flush = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            flush_room(&room, store.as_ref()).await;
        }));
    }

    /// Remove a session from its room.
    ///
    /// A departing creator with unpersisted content forces a synchronous
    /// write before teardown can proceed, and so does the last session of a
    /// dirty room: data loss is bounded to a crash racing this write, never
    /// to a debounce window outliving the room.
    pub async fn leave(&self, room: &Arc<RoomHandle>, session_id: Uuid, is_creator: bool) {
        let (need_flush, now_empty) = {
            let mut state = room.state.lock().await;
            state.sessions.remove(&session_id);
            let now_empty = state.sessions.is_empty();
            let need_flush = state.dirty && (is_creator || now_empty);
            if need_flush {
                if let Some(handle) = state.pending_flush.take() {
                    handle.abort();
                }
            }
            (need_flush, now_empty)
        };

        if need_flush {
            flush_room(room, self.store.as_ref()).await;
        }

        if now_empty {
            let mut rooms = self.rooms.lock().await;
            let mut state = room.state.lock().await;
            // A session may have joined between dropping the room lock and
            // reacquiring it here; only tear down a room that is still
            // empty and still the mapped instance
            if state.sessions.is_empty() {
                if let Some(handle) = state.pending_flush.take() {
                    handle.abort();
                }
                if rooms
                    .get(room.identifier())
                    .is_some_and(|mapped| Arc::ptr_eq(mapped, room))
                {
                    rooms.remove(room.identifier());
                    info!("Room {} destroyed, last session left", room.identifier());
                }
            }
        }
    }

    pub async fn stats(&self) -> RegistryStats {
        let rooms: Vec<Arc<RoomHandle>> = self.rooms.lock().await.values().cloned().collect();
        let mut stats = RegistryStats {
            n_rooms: rooms.len() as u32,
            ..Default::default()
        };
        for room in rooms {
            let state = room.state.lock().await;
            stats.n_sessions += state.sessions.len() as u32;
            if state.dirty {
                stats.n_dirty_rooms += 1;
            }
            if state.pending_flush.is_some() {
                stats.n_pending_flushes += 1;
            }
        }
        stats
    }
}

/// Write the room's content through the store adapter.
///
/// Failures leave the room dirty; the next edit's reschedule or a forced
/// flush retries them. A write that matches no row means the clip expired
/// under a live room; the write is dropped and the row is not resurrected.
async fn flush_room(room: &Arc<RoomHandle>, store: &dyn ClipStore) {
    let (content, last_updated, version) = {
        let state = room.state.lock().await;
        if !state.dirty {
            return;
        }
        (state.content.clone(), state.last_updated, state.version)
    };

    match store
        .update_content(&room.identifier, &content, last_updated)
        .await
    {
        Ok(true) => {
            debug!("Persisted clip {} ({} bytes)", room.identifier, content.len());
            let mut state = room.state.lock().await;
            if state.version == version {
                state.dirty = false;
                state.pending_flush = None;
            }
        }
        Ok(false) => {
            warn!(
                "Clip {} expired while its room was live; dropping the write",
                room.identifier
            );
            let mut state = room.state.lock().await;
            if state.version == version {
                state.dirty = false;
                state.pending_flush = None;
            }
        }
        Err(e) => {
            error!("Failed to persist clip {}: {}", room.identifier, e);
            let mut state = room.state.lock().await;
            if state.version == version {
                state.pending_flush = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memstore::{seeded_clip, MemStore};

    const CLIP_ID: &str = "4821";
    const MAX_BYTES: usize = 100 * 1024;

    struct Fixture {
        registry: RoomRegistry,
        store: Arc<MemStore>,
        secret: String,
    }

    fn fixture_with_content(content: &str) -> Fixture {
        let secret = secret_service::issue_secret();
        let hash = secret_service::hash_secret(&secret).unwrap();
        let store = Arc::new(MemStore::new());
        store.seed(seeded_clip(CLIP_ID, content, &hash));
        let registry = RoomRegistry::new(
            store.clone(),
            Duration::from_millis(1500),
            MAX_BYTES,
        );
        Fixture {
            registry,
            store,
            secret,
        }
    }

    fn fixture() -> Fixture {
        fixture_with_content("hello")
    }

    async fn settle() {
        // Let spawned flush tasks run to completion under the paused clock
        tokio::time::sleep(Duration::from_millis(2000)).await;
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn edit_burst_coalesces_into_one_write() {
        let f = fixture();
        let creator = Uuid::new_v4();
        let joined = f
            .registry
            .join(CLIP_ID, Some(&f.secret), creator)
            .await
            .unwrap();
        assert!(joined.is_creator);

        for text in ["hello w", "hello wor", "hello world"] {
            f.registry
                .edit(&joined.room, true, CLIP_ID, text)
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        settle().await;

        assert_eq!(
            f.store.writes(),
            vec![(CLIP_ID.to_string(), "hello world".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn creator_disconnect_flushes_before_teardown() {
        let f = fixture();
        let creator = Uuid::new_v4();
        let joined = f
            .registry
            .join(CLIP_ID, Some(&f.secret), creator)
            .await
            .unwrap();

        f.registry
            .edit(&joined.room, true, CLIP_ID, "edited")
            .await
            .unwrap();
        // Leave immediately, well inside the debounce window
        f.registry.leave(&joined.room, creator, true).await;

        assert_eq!(
            f.store.writes(),
            vec![(CLIP_ID.to_string(), "edited".to_string())]
        );
        assert_eq!(f.registry.stats().await.n_rooms, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn viewer_edit_is_rejected_without_broadcast_or_write() {
        let f = fixture();
        let creator = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let joined_creator = f
            .registry
            .join(CLIP_ID, Some(&f.secret), creator)
            .await
            .unwrap();
        let mut joined_viewer = f.registry.join(CLIP_ID, None, viewer).await.unwrap();
        assert!(!joined_viewer.is_creator);

        let result = f
            .registry
            .edit(&joined_viewer.room, joined_viewer.is_creator, CLIP_ID, "hijacked")
            .await;
        assert!(matches!(result, Err(SyncError::Unauthorized)));

        settle().await;
        assert!(f.store.writes().is_empty());
        assert!(joined_viewer.rx.try_recv().is_err());
        let (content, _) = f.registry.room_snapshot(CLIP_ID).await.unwrap();
        assert_eq!(content, "hello");
        drop(joined_creator);
    }

    #[tokio::test(start_paused = true)]
    async fn wrong_secret_joins_as_viewer() {
        let f = fixture();
        let session = Uuid::new_v4();
        let wrong = secret_service::issue_secret();
        let joined = f.registry.join(CLIP_ID, Some(&wrong), session).await.unwrap();
        assert!(!joined.is_creator);

        let result = f
            .registry
            .edit(&joined.room, joined.is_creator, CLIP_ID, "nope")
            .await;
        assert!(matches!(result, Err(SyncError::Unauthorized)));
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_carries_exact_content_to_all_members() {
        let f = fixture();
        let creator = Uuid::new_v4();
        let viewer = Uuid::new_v4();
        let mut joined_creator = f
            .registry
            .join(CLIP_ID, Some(&f.secret), creator)
            .await
            .unwrap();
        let mut joined_viewer = f.registry.join(CLIP_ID, None, viewer).await.unwrap();

        f.registry
            .edit(&joined_creator.room, true, CLIP_ID, "hello world")
            .await
            .unwrap();

        for rx in [&mut joined_creator.rx, &mut joined_viewer.rx] {
            match rx.recv().await.unwrap() {
                ServerMessage::ServerEdit(edit) => {
                    assert_eq!(edit.identifier, CLIP_ID);
                    assert_eq!(edit.full_text, "hello world");
                }
                other => panic!("unexpected broadcast: {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_joins_observe_identical_content() {
        let f = fixture();
        let (a, b) = tokio::join!(
            f.registry.join(CLIP_ID, None, Uuid::new_v4()),
            f.registry.join(CLIP_ID, None, Uuid::new_v4()),
        );
        let a = a.unwrap();
        let b = b.unwrap();
        assert_eq!(a.snapshot.content, b.snapshot.content);
        assert!(Arc::ptr_eq(&a.room, &b.room));
        assert_eq!(f.registry.stats().await.n_rooms, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_joiner_sees_live_content_before_persistence() {
        let f = fixture();
        let creator = Uuid::new_v4();
        let joined = f
            .registry
            .join(CLIP_ID, Some(&f.secret), creator)
            .await
            .unwrap();

        for text in ["hello world", "hello world!", "hello world!!"] {
            f.registry.edit(&joined.room, true, CLIP_ID, text).await.unwrap();
        }

        // Joins before the debounce window elapses
        let viewer = f.registry.join(CLIP_ID, None, Uuid::new_v4()).await.unwrap();
        assert_eq!(viewer.snapshot.content, "hello world!!");
        assert_eq!(f.store.content_of(CLIP_ID).unwrap(), "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn edit_naming_another_room_is_rejected() {
        let f = fixture();
        let joined = f
            .registry
            .join(CLIP_ID, Some(&f.secret), Uuid::new_v4())
            .await
            .unwrap();
        let result = f.registry.edit(&joined.room, true, "9999", "sneaky").await;
        assert!(matches!(result, Err(SyncError::NotInRoom)));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_payload_is_rejected() {
        let f = fixture();
        let joined = f
            .registry
            .join(CLIP_ID, Some(&f.secret), Uuid::new_v4())
            .await
            .unwrap();
        let oversized = "a".repeat(MAX_BYTES + 1);
        let result = f.registry.edit(&joined.room, true, CLIP_ID, &oversized).await;
        assert!(matches!(result, Err(SyncError::PayloadTooLarge)));
        settle().await;
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn join_unknown_identifier_is_not_found() {
        let f = fixture();
        let result = f.registry.join("9999", None, Uuid::new_v4()).await;
        assert!(matches!(result, Err(SyncError::NotFound)));
        let result = f.registry.join("not-an-id", None, Uuid::new_v4()).await;
        assert!(matches!(result, Err(SyncError::InvalidIdentifier)));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_is_retried_on_next_edit() {
        let f = fixture();
        let creator = Uuid::new_v4();
        let joined = f
            .registry
            .join(CLIP_ID, Some(&f.secret), creator)
            .await
            .unwrap();

        f.store.set_fail_writes(true);
        f.registry.edit(&joined.room, true, CLIP_ID, "first").await.unwrap();
        settle().await;
        assert!(f.store.writes().is_empty());

        f.store.set_fail_writes(false);
        f.registry.edit(&joined.room, true, CLIP_ID, "second").await.unwrap();
        settle().await;
        assert_eq!(
            f.store.writes(),
            vec![(CLIP_ID.to_string(), "second".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn expired_row_is_not_resurrected() {
        let f = fixture();
        let creator = Uuid::new_v4();
        let joined = f
            .registry
            .join(CLIP_ID, Some(&f.secret), creator)
            .await
            .unwrap();

        f.registry.edit(&joined.room, true, CLIP_ID, "late edit").await.unwrap();
        f.store.expire(CLIP_ID);
        settle().await;

        assert!(f.store.writes().is_empty());
        assert!(f.store.content_of(CLIP_ID).is_none());
        // The live room keeps serving connected sessions from memory
        let (content, _) = f.registry.room_snapshot(CLIP_ID).await.unwrap();
        assert_eq!(content, "late edit");
    }

    #[tokio::test(start_paused = true)]
    async fn last_viewer_leaving_tears_the_room_down() {
        let f = fixture();
        let viewer = Uuid::new_v4();
        let joined = f.registry.join(CLIP_ID, None, viewer).await.unwrap();
        assert_eq!(f.registry.stats().await.n_rooms, 1);

        f.registry.leave(&joined.room, viewer, false).await;
        assert_eq!(f.registry.stats().await.n_rooms, 0);
        // Nothing was dirty, nothing was written
        assert!(f.store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn http_edit_flows_through_the_live_room() {
        let f = fixture();
        let viewer = Uuid::new_v4();
        let mut joined = f.registry.join(CLIP_ID, None, viewer).await.unwrap();

        let updated = f
            .registry
            .edit_via_room(CLIP_ID, &f.secret, "via http")
            .await
            .unwrap();
        assert!(updated.is_some());

        match joined.rx.recv().await.unwrap() {
            ServerMessage::ServerEdit(edit) => assert_eq!(edit.full_text, "via http"),
            other => panic!("unexpected broadcast: {:?}", other),
        }

        let absent = f
            .registry
            .edit_via_room("7777", &f.secret, "no room")
            .await
            .unwrap();
        assert!(absent.is_none());
    }
}
