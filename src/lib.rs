pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod history;
pub mod landing;
pub mod message;
pub mod room_view;
pub mod rooms;
pub mod storage;
pub mod terminal;
pub mod typing;
pub mod view;

pub use error::{ChatError, Result};
pub use message::{ChannelEvent, ChatEvent, EventKind};

/// Where the client goes next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    /// The name / room code prompts.
    Landing,
    /// The chat view of a room.
    Room(String),
    /// Input closed; stop the client.
    Exit,
}
