//! Room HTTP API and the session's joined-room registry.
//!
//! ## Session keys
//! - `joinedRooms`: rooms this session has visited, in visit order, no
//!   duplicates. Reconciled against `GET /rooms` every time a room view opens.
//! - `hasJoinedRooms`: rooms for which the local user's own join notice has
//!   already been shown.

use std::future::Future;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ChatError, Result};
use crate::storage::{read_json, write_json, SharedStorage, GREETED_ROOMS_KEY, JOINED_ROOMS_KEY};
use crate::Navigation;

// ---------------------------------------------------------------------------
// HTTP API
// ---------------------------------------------------------------------------

/// The server's room endpoints.
pub trait RoomApi {
    /// `POST /rooms`, returning the new room id.
    fn create_room(&self) -> impl Future<Output = Result<String>> + Send;

    /// `GET /rooms`, returning the ids of all active rooms.
    fn list_rooms(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    /// `GET /rooms/{id}`. `Ok(false)` for any non-success status; `Err` only
    /// when the server could not be reached.
    fn room_exists(&self, room_id: &str) -> impl Future<Output = Result<bool>> + Send;
}

#[derive(Debug, Deserialize)]
struct CreateRoomResponse {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct ListRoomsResponse {
    #[serde(default)]
    rooms: Vec<String>,
}

/// [`RoomApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRoomApi {
    base: Url,
    client: reqwest::Client,
}

impl HttpRoomApi {
    /// `base_url` must be an `http` or `https` URL. With no
    /// `request_timeout`, a request that never completes never resolves.
    pub fn new(base_url: &str, request_timeout: Option<Duration>) -> Result<Self> {
        let base = parse_server_url(base_url)?;
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ChatError::network(base.as_str(), e))?;
        Ok(Self { base, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

/// Parse and check a server base URL.
pub fn parse_server_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ChatError::Validation(format!("server url '{raw}': {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ChatError::Validation(format!(
            "server url '{raw}' must use http or https, not {other}"
        ))),
    }
}

impl RoomApi for HttpRoomApi {
    async fn create_room(&self) -> Result<String> {
        let url = self.endpoint(&["rooms"]);
        let resp = self
            .client
            .post(url.clone())
            .send()
            .await
            .map_err(|e| ChatError::network(url.as_str(), e))?;

        if !resp.status().is_success() {
            return Err(ChatError::network(url.as_str(), format!("HTTP {}", resp.status())));
        }

        let body: CreateRoomResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::network(url.as_str(), e))?;
        info!(room = %body.room_id, "room created");
        Ok(body.room_id)
    }

    async fn list_rooms(&self) -> Result<Vec<String>> {
        let url = self.endpoint(&["rooms"]);
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ChatError::network(url.as_str(), e))?;

        if !resp.status().is_success() {
            return Err(ChatError::network(url.as_str(), format!("HTTP {}", resp.status())));
        }

        let body: ListRoomsResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::network(url.as_str(), e))?;
        Ok(body.rooms)
    }

    async fn room_exists(&self, room_id: &str) -> Result<bool> {
        let url = self.endpoint(&["rooms", room_id]);
        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ChatError::network(url.as_str(), e))?;
        let status = resp.status();
        debug!(room = room_id, %status, "room probe");
        Ok(status.is_success())
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Result of removing a room from the joined list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The room being viewed was removed; go here instead.
    Navigate(Navigation),
    /// Another room was removed; these remain.
    Remaining(Vec<String>),
}

/// The session's joined-room list, reconciled against the server.
pub struct RoomRegistry<A> {
    api: A,
    storage: SharedStorage,
}

impl<A: RoomApi> RoomRegistry<A> {
    pub fn new(api: A, storage: SharedStorage) -> Self {
        Self { api, storage }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Rooms currently remembered for this session.
    pub fn joined_rooms(&self) -> Vec<String> {
        read_json(self.storage.as_ref(), JOINED_ROOMS_KEY)
    }

    /// Reconcile the remembered rooms with the server's active rooms.
    ///
    /// Keeps only remembered rooms the server still lists and makes sure
    /// `current_room` is present; the result is persisted. When the server
    /// cannot be asked, the remembered list plus `current_room` is returned
    /// as is and nothing is written.
    pub async fn synchronize(&self, current_room: &str) -> Vec<String> {
        let local = self.joined_rooms();
        match self.api.list_rooms().await {
            Ok(active) => {
                let mut synced: Vec<String> = Vec::with_capacity(local.len() + 1);
                for room in local {
                    if active.contains(&room) && !synced.contains(&room) {
                        synced.push(room);
                    }
                }
                if !synced.iter().any(|r| r == current_room) {
                    synced.push(current_room.to_string());
                }
                write_json(self.storage.as_ref(), JOINED_ROOMS_KEY, &synced);
                synced
            }
            Err(e) => {
                warn!(error = %e, "room sync failed, using remembered rooms");
                let mut rooms: Vec<String> = Vec::with_capacity(local.len() + 1);
                for room in local {
                    if !rooms.contains(&room) {
                        rooms.push(room);
                    }
                }
                if !rooms.iter().any(|r| r == current_room) {
                    rooms.push(current_room.to_string());
                }
                rooms
            }
        }
    }

    /// Forget `room_id` from `shown`, the list on screen, and persist the
    /// rest. Leaving the room being viewed moves to the first remaining room,
    /// or to the landing page when none remain.
    ///
    /// `shown` rather than the stored list is filtered: after an offline sync
    /// the current room is on screen but not yet stored.
    pub fn leave(&self, shown: &[String], room_id: &str, current_room: &str) -> LeaveOutcome {
        let rooms: Vec<String> = shown.iter().filter(|r| r.as_str() != room_id).cloned().collect();
        write_json(self.storage.as_ref(), JOINED_ROOMS_KEY, &rooms);
        GreetedRooms::new(self.storage.clone()).forget(room_id);
        info!(room = room_id, "room removed from session");

        if room_id != current_room {
            return LeaveOutcome::Remaining(rooms);
        }
        match rooms.into_iter().next() {
            Some(next) => LeaveOutcome::Navigate(Navigation::Room(next)),
            None => LeaveOutcome::Navigate(Navigation::Landing),
        }
    }

    pub async fn room_exists(&self, room_id: &str) -> Result<bool> {
        self.api.room_exists(room_id).await
    }

    pub async fn create(&self) -> Result<String> {
        self.api.create_room().await
    }
}

/// Rooms where the local user's own join notice was already shown.
#[derive(Clone)]
pub struct GreetedRooms {
    storage: SharedStorage,
}

impl GreetedRooms {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Record `room_id` and report whether this is the first time.
    pub fn first_greeting(&self, room_id: &str) -> bool {
        let mut rooms: Vec<String> = read_json(self.storage.as_ref(), GREETED_ROOMS_KEY);
        if rooms.iter().any(|r| r == room_id) {
            return false;
        }
        rooms.push(room_id.to_string());
        write_json(self.storage.as_ref(), GREETED_ROOMS_KEY, &rooms);
        true
    }

    pub fn forget(&self, room_id: &str) {
        let mut rooms: Vec<String> = read_json(self.storage.as_ref(), GREETED_ROOMS_KEY);
        rooms.retain(|r| r != room_id);
        write_json(self.storage.as_ref(), GREETED_ROOMS_KEY, &rooms);
    }
}

// ---------------------------------------------------------------------------
// In-memory API for unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Shared handle so tests can flip state after handing the API over.
    #[derive(Clone, Default)]
    pub(crate) struct FakeRoomApi {
        pub(crate) rooms: Arc<Mutex<Vec<String>>>,
        pub(crate) offline: Arc<AtomicBool>,
        pub(crate) created: Arc<AtomicUsize>,
    }

    impl FakeRoomApi {
        pub(crate) fn with_rooms(rooms: &[&str]) -> Self {
            let api = Self::default();
            api.rooms
                .lock()
                .unwrap()
                .extend(rooms.iter().map(|r| r.to_string()));
            api
        }

        pub(crate) fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn check(&self) -> Result<()> {
            if self.offline.load(Ordering::SeqCst) {
                Err(ChatError::network("fake://rooms", "connection refused"))
            } else {
                Ok(())
            }
        }
    }

    impl RoomApi for FakeRoomApi {
        async fn create_room(&self) -> Result<String> {
            self.check()?;
            let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            let id = format!("new{n}");
            self.rooms.lock().unwrap().push(id.clone());
            Ok(id)
        }

        async fn list_rooms(&self) -> Result<Vec<String>> {
            self.check()?;
            Ok(self.rooms.lock().unwrap().clone())
        }

        async fn room_exists(&self, room_id: &str) -> Result<bool> {
            self.check()?;
            Ok(self.rooms.lock().unwrap().iter().any(|r| r == room_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeRoomApi;
    use super::*;
    use crate::storage::{MemoryStorage, SessionStorage};
    use rstest::rstest;
    use std::sync::Arc;

    fn registry(server: &[&str], local: &[&str]) -> (RoomRegistry<FakeRoomApi>, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        write_json(storage.as_ref(), JOINED_ROOMS_KEY, &local);
        (
            RoomRegistry::new(FakeRoomApi::with_rooms(server), storage.clone()),
            storage,
        )
    }

    #[tokio::test]
    async fn test_sync_keeps_current_room_server_does_not_list() {
        let (reg, _) = registry(&["a"], &["a", "b"]);
        assert_eq!(reg.synchronize("b").await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_sync_drops_rooms_gone_from_server() {
        let (reg, _) = registry(&["a", "c"], &["a", "b", "c"]);
        assert_eq!(reg.synchronize("c").await, vec!["a", "c"]);
        assert_eq!(reg.joined_rooms(), vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_sync_appends_new_current_room() {
        let (reg, _) = registry(&["a", "z"], &["a"]);
        assert_eq!(reg.synchronize("z").await, vec!["a", "z"]);
    }

    #[tokio::test]
    async fn test_sync_removes_duplicates() {
        let (reg, _) = registry(&["a", "b"], &["a", "b", "a"]);
        assert_eq!(reg.synchronize("b").await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_sync_result_subset_of_server_or_current() {
        let server = ["a", "c", "e"];
        let (reg, _) = registry(&server, &["a", "b", "c", "d"]);
        let synced = reg.synchronize("q").await;
        for room in &synced {
            assert!(server.contains(&room.as_str()) || room == "q");
        }
    }

    #[tokio::test]
    async fn test_sync_offline_falls_back_without_writing() {
        let (reg, storage) = registry(&["a"], &["x", "y"]);
        reg.api().set_offline(true);
        assert_eq!(reg.synchronize("z").await, vec!["x", "y", "z"]);
        let stored: Vec<String> = read_json(storage.as_ref(), JOINED_ROOMS_KEY);
        assert_eq!(stored, vec!["x", "y"]);
    }

    #[tokio::test]
    async fn test_sync_corrupt_local_list_is_empty() {
        let (reg, storage) = registry(&["a"], &[]);
        storage.set_item(JOINED_ROOMS_KEY, "oops");
        assert_eq!(reg.synchronize("a").await, vec!["a"]);
    }

    #[rstest]
    #[case(&["a", "b"], "b", LeaveOutcome::Navigate(Navigation::Room("a".into())))]
    #[case(&["a"], "a", LeaveOutcome::Navigate(Navigation::Landing))]
    #[case(&["a", "b", "c"], "c", LeaveOutcome::Navigate(Navigation::Room("a".into())))]
    fn test_leave_current_room(
        #[case] joined: &[&str],
        #[case] leaving: &str,
        #[case] expected: LeaveOutcome,
    ) {
        let (reg, _) = registry(&[], joined);
        assert_eq!(reg.leave(&reg.joined_rooms(), leaving, leaving), expected);
        assert!(!reg.joined_rooms().iter().any(|r| r == leaving));
    }

    #[test]
    fn test_leave_other_room_stays() {
        let (reg, _) = registry(&[], &["a", "b", "c"]);
        assert_eq!(
            reg.leave(&reg.joined_rooms(), "b", "a"),
            LeaveOutcome::Remaining(vec!["a".into(), "c".into()])
        );
    }

    #[tokio::test]
    async fn test_leave_after_offline_sync_keeps_current_room() {
        let (reg, storage) = registry(&[], &["a", "b"]);
        reg.api().set_offline(true);
        let shown = reg.synchronize("c").await;
        assert_eq!(
            reg.leave(&shown, "b", "c"),
            LeaveOutcome::Remaining(vec!["a".into(), "c".into()])
        );
        let stored: Vec<String> = read_json(storage.as_ref(), JOINED_ROOMS_KEY);
        assert_eq!(stored, vec!["a", "c"]);
    }

    #[test]
    fn test_leave_forgets_greeting() {
        let (reg, storage) = registry(&[], &["a", "b"]);
        let greeted = GreetedRooms::new(storage.clone());
        assert!(greeted.first_greeting("b"));
        reg.leave(&reg.joined_rooms(), "b", "a");
        assert!(greeted.first_greeting("b"));
    }

    #[test]
    fn test_first_greeting_only_once() {
        let storage = MemoryStorage::shared();
        let greeted = GreetedRooms::new(storage);
        assert!(greeted.first_greeting("a"));
        assert!(!greeted.first_greeting("a"));
        assert!(greeted.first_greeting("b"));
    }

    #[tokio::test]
    async fn test_room_exists_and_create() {
        let (reg, _) = registry(&["a"], &[]);
        assert!(reg.room_exists("a").await.unwrap());
        assert!(!reg.room_exists("b").await.unwrap());
        let id = reg.create().await.unwrap();
        assert!(reg.room_exists(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_room_exists_offline_is_network_error() {
        let (reg, _) = registry(&["a"], &[]);
        reg.api().set_offline(true);
        assert!(reg.room_exists("a").await.unwrap_err().is_network());
        assert!(reg.create().await.unwrap_err().is_network());
    }

    #[rstest]
    #[case("http://127.0.0.1:8000")]
    #[case("https://chat.example.com/base/")]
    fn test_parse_server_url_accepts_http(#[case] raw: &str) {
        assert!(parse_server_url(raw).is_ok());
    }

    #[rstest]
    #[case("ftp://example.com")]
    #[case("not a url")]
    fn test_parse_server_url_rejects(#[case] raw: &str) {
        assert!(matches!(parse_server_url(raw), Err(ChatError::Validation(_))));
    }

    #[test]
    fn test_endpoint_encodes_room_segment() {
        let api = HttpRoomApi::new("http://localhost:8000", None).unwrap();
        assert_eq!(api.endpoint(&["rooms"]).as_str(), "http://localhost:8000/rooms");
        assert_eq!(
            api.endpoint(&["rooms", "a b"]).as_str(),
            "http://localhost:8000/rooms/a%20b"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = HttpRoomApi::new("http://localhost:8000/chat/", None).unwrap();
        assert_eq!(api.endpoint(&["rooms"]).as_str(), "http://localhost:8000/chat/rooms");
    }
}
