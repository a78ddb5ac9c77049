use serde::{Deserialize, Serialize};

/// A chat frame as it travels over the socket and sits in session history.
///
/// The wire form is `{"type": ..., "user": ..., "message": ...}`; typing
/// frames carry no message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    Chat {
        user: String,
        #[serde(default)]
        message: String,
    },
    UserJoined {
        user: String,
        #[serde(default)]
        message: String,
    },
    UserLeft {
        user: String,
        #[serde(default)]
        message: String,
    },
    Typing {
        user: String,
    },
}

impl ChatEvent {
    pub fn chat(user: impl Into<String>, message: impl Into<String>) -> Self {
        ChatEvent::Chat {
            user: user.into(),
            message: message.into(),
        }
    }

    pub fn typing(user: impl Into<String>) -> Self {
        ChatEvent::Typing { user: user.into() }
    }

    pub fn user(&self) -> &str {
        match self {
            ChatEvent::Chat { user, .. }
            | ChatEvent::UserJoined { user, .. }
            | ChatEvent::UserLeft { user, .. }
            | ChatEvent::Typing { user } => user,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            ChatEvent::Chat { .. } => EventKind::Chat,
            ChatEvent::UserJoined { .. } => EventKind::UserJoined,
            ChatEvent::UserLeft { .. } => EventKind::UserLeft,
            ChatEvent::Typing { .. } => EventKind::Typing,
        }
    }

    /// Typing notices are transient and never stored.
    pub fn is_persistable(&self) -> bool {
        !matches!(self, ChatEvent::Typing { .. })
    }
}

/// Subscription key for [`crate::channel::RealtimeChannel::on`].
///
/// The first four mirror the frame `type` values; `Close` and `Error` are
/// synthetic and fire on transport lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Chat,
    UserJoined,
    UserLeft,
    Typing,
    Close,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Chat,
        EventKind::UserJoined,
        EventKind::UserLeft,
        EventKind::Typing,
        EventKind::Close,
        EventKind::Error,
    ];

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Chat => "chat",
            EventKind::UserJoined => "user_joined",
            EventKind::UserLeft => "user_left",
            EventKind::Typing => "typing",
            EventKind::Close => "close",
            EventKind::Error => "error",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a channel listener receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Message(ChatEvent),
    Closed,
    Error(String),
}

impl ChannelEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChannelEvent::Message(event) => event.kind(),
            ChannelEvent::Closed => EventKind::Close,
            ChannelEvent::Error(_) => EventKind::Error,
        }
    }
}
