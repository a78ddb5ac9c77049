//! Session-scoped key/value storage.
//!
//! Every value is a string; structured values are stored JSON-encoded under
//! the keys below. A session lasts as long as the client process unless a
//! [`FileStorage`] is used to carry it across restarts.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{ChatError, Result};

pub const USERNAME_KEY: &str = "username";
pub const JOINED_ROOMS_KEY: &str = "joinedRooms";
pub const GREETED_ROOMS_KEY: &str = "hasJoinedRooms";
pub const HISTORIES_KEY: &str = "chatHistories";

/// String key/value store shared by the view controllers.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

pub type SharedStorage = Arc<dyn SessionStorage>;

/// In-process storage; dropped with the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedStorage {
        Arc::new(Self::new())
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().ok()?.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        if let Ok(mut items) = self.items.lock() {
            items.insert(key.to_string(), value.to_string());
        }
    }

    fn remove_item(&self, key: &str) {
        if let Ok(mut items) = self.items.lock() {
            items.remove(key);
        }
    }
}

/// Storage mirrored to a JSON file after every write.
///
/// Reads are served from memory. Write failures are logged and the in-memory
/// copy stays authoritative for the rest of the session.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open `path`, loading any existing session. A file that is not a JSON
    /// object of strings starts an empty session.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let items = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(items) => items,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "session file unreadable, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(ChatError::Io(e)),
        };
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    /// End the session: forget everything and delete the file.
    pub fn clear(&self) -> Result<()> {
        if let Ok(mut items) = self.items.lock() {
            items.clear();
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ChatError::Io(e)),
        }
    }

    fn flush(&self, items: &BTreeMap<String, String>) {
        let text = match serde_json::to_string_pretty(items) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "could not encode session");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, text) {
            warn!(path = %self.path.display(), error = %e, "could not write session file");
        }
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().ok()?.get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        if let Ok(mut items) = self.items.lock() {
            items.insert(key.to_string(), value.to_string());
            self.flush(&items);
        }
    }

    fn remove_item(&self, key: &str) {
        if let Ok(mut items) = self.items.lock() {
            if items.remove(key).is_some() {
                self.flush(&items);
            }
        }
    }
}

/// Decode the JSON value under `key`.
///
/// Absent keys and JSON `null` give `T::default()`. Anything that fails to
/// decode is reported as [`ChatError::MalformedState`] in the log and also
/// yields the default, so callers never see corrupt state.
pub fn read_json<T>(storage: &dyn SessionStorage, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(raw) = storage.get_item(key) else {
        return T::default();
    };
    match serde_json::from_str::<Option<T>>(&raw) {
        Ok(value) => value.unwrap_or_default(),
        Err(e) => {
            let err = ChatError::MalformedState {
                key: key.to_string(),
                detail: e.to_string(),
            };
            warn!(%err, "repairing session value to default");
            T::default()
        }
    }
}

/// Encode `value` as JSON and store it under `key`.
pub fn write_json<T: Serialize + ?Sized>(storage: &dyn SessionStorage, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(text) => storage.set_item(key, &text),
        Err(e) => warn!(key, error = %e, "could not encode session value"),
    }
}
