use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};
use crate::typing::DEFAULT_TYPING_TIMEOUT;

pub const CONFIG_PATH: &str = "roomchat.toml";
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub client: Client,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Server {
    pub url: String,
    /// Unset means HTTP requests may wait forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            request_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Client {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub typing_timeout_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_file: Option<PathBuf>,
}

impl Default for Client {
    fn default() -> Self {
        Self {
            username: None,
            typing_timeout_ms: DEFAULT_TYPING_TIMEOUT.as_millis() as u64,
            session_file: None,
        }
    }
}

impl Config {
    /// Read `path`. A missing file gives the defaults; a file that does not
    /// parse is an error.
    pub fn load(path: &Path) -> Result<Config> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => return Err(ChatError::Io(e)),
        };
        toml::from_str(&text).map_err(|e| ChatError::Config {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self).map_err(|e| ChatError::Config {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.server.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.client.typing_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.server.url, DEFAULT_SERVER_URL);
        assert_eq!(cfg.typing_timeout(), Duration::from_millis(2000));
        assert_eq!(cfg.request_timeout(), None);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roomchat.toml");
        std::fs::write(&path, "[client]\nusername = \"alice\"\n").unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.client.username.as_deref(), Some("alice"));
        assert_eq!(cfg.server.url, DEFAULT_SERVER_URL);
        assert_eq!(cfg.client.typing_timeout_ms, 2000);
    }

    #[test]
    fn test_full_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roomchat.toml");
        std::fs::write(
            &path,
            r#"
[server]
url = "https://chat.example.com"
request_timeout_ms = 5000

[client]
typing_timeout_ms = 500
session_file = "/tmp/session.json"
"#,
        )
        .unwrap();
        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.server.url, "https://chat.example.com");
        assert_eq!(cfg.request_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.typing_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.client.session_file, Some(PathBuf::from("/tmp/session.json")));
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roomchat.toml");
        std::fs::write(&path, "[server\nurl = ").unwrap();
        assert!(matches!(Config::load(&path), Err(ChatError::Config { .. })));
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roomchat.toml");
        let mut cfg = Config::default();
        cfg.client.username = Some("bob".into());
        cfg.write_to_file(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), cfg);
    }
}
