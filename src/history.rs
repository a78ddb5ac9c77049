//! Per-room message history kept for the session.

use std::collections::BTreeMap;

use crate::message::ChatEvent;
use crate::storage::{read_json, write_json, SharedStorage, HISTORIES_KEY};

type Histories = BTreeMap<String, Vec<ChatEvent>>;

/// Append-only record of what was shown in each room.
#[derive(Clone)]
pub struct MessageLog {
    storage: SharedStorage,
}

impl MessageLog {
    pub fn new(storage: SharedStorage) -> Self {
        Self { storage }
    }

    /// Add `record` to the end of `room_id`'s history.
    pub fn append(&self, room_id: &str, record: &ChatEvent) {
        let mut all = self.load();
        all.entry(room_id.to_string()).or_default().push(record.clone());
        write_json(self.storage.as_ref(), HISTORIES_KEY, &all);
    }

    /// Full history of `room_id`, oldest first. Empty when unknown or when
    /// the stored blob is unreadable.
    pub fn list(&self, room_id: &str) -> Vec<ChatEvent> {
        self.load().remove(room_id).unwrap_or_default()
    }

    fn load(&self) -> Histories {
        read_json(self.storage.as_ref(), HISTORIES_KEY)
    }
}
