//! Crate-level error type.

use std::path::PathBuf;

/// Errors produced by the chat client.
///
/// Network and validation errors are turned into alerts by the view
/// controllers. `MalformedState` is only ever logged: the storage helpers
/// repair corrupt session values to their defaults before anyone sees them.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Transport failure or a non-success HTTP status.
    #[error("network error talking to {url}: {detail}")]
    Network { url: String, detail: String },

    /// A required input was empty.
    #[error("invalid input: {0}")]
    Validation(String),

    /// A session value could not be decoded.
    #[error("malformed session value '{key}': {detail}")]
    MalformedState { key: String, detail: String },

    /// The configuration file exists but could not be parsed.
    #[error("bad config file {path}: {detail}")]
    Config { path: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChatError {
    pub(crate) fn network(url: impl Into<String>, detail: impl ToString) -> Self {
        ChatError::Network {
            url: url.into(),
            detail: detail.to_string(),
        }
    }

    /// True for transport failures and non-success statuses.
    pub fn is_network(&self) -> bool {
        matches!(self, ChatError::Network { .. })
    }
}

pub type Result<T, E = ChatError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_display_includes_url() {
        let err = ChatError::network("http://x/rooms", "HTTP 500");
        assert_eq!(err.to_string(), "network error talking to http://x/rooms: HTTP 500");
        assert!(err.is_network());
    }

    #[test]
    fn test_validation_is_not_network() {
        let err = ChatError::Validation("username".into());
        assert!(!err.is_network());
        assert_eq!(err.to_string(), "invalid input: username");
    }

    #[test]
    fn test_io_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ChatError = io.into();
        assert!(matches!(err, ChatError::Io(_)));
    }
}
