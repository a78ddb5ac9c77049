//! What the controllers draw, independent of the output device.

use crate::message::ChatEvent;

/// One line of the message area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// Join/leave notices and connection status.
    System(String),
    /// A chat message from the local user.
    Sent(String),
    /// A chat message from someone else.
    Received { user: String, text: String },
}

impl Line {
    /// How `event` shows up for `local_user`; typing notices have no line.
    pub fn from_event(event: &ChatEvent, local_user: &str) -> Option<Line> {
        match event {
            ChatEvent::UserJoined { message, .. } | ChatEvent::UserLeft { message, .. } => {
                Some(Line::System(message.clone()))
            }
            ChatEvent::Chat { user, message } if user == local_user => {
                Some(Line::Sent(message.clone()))
            }
            ChatEvent::Chat { user, message } => Some(Line::Received {
                user: user.clone(),
                text: message.clone(),
            }),
            ChatEvent::Typing { .. } => None,
        }
    }

    /// Plain-text form: received lines get a `user: ` prefix.
    pub fn text(&self) -> String {
        match self {
            Line::System(text) | Line::Sent(text) => text.clone(),
            Line::Received { user, text } => format!("{user}: {text}"),
        }
    }
}

/// Output surface for the landing and room views.
pub trait View {
    /// Redraw the joined-room list, marking `current`.
    fn render_rooms(&mut self, rooms: &[String], current: &str);

    fn render_line(&mut self, line: &Line);

    /// Show or hide the typing notice.
    fn set_typing(&mut self, text: Option<&str>);

    /// A message the user has to see before doing anything else.
    fn alert(&mut self, message: &str);

    /// Non-blocking hint, such as command help.
    fn notice(&mut self, message: &str);
}

/// Everything a [`View`] was asked to show, in order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordingView {
    pub rooms: Vec<(Vec<String>, String)>,
    pub lines: Vec<Line>,
    pub typing: Option<String>,
    pub alerts: Vec<String>,
    pub notices: Vec<String>,
}

impl View for RecordingView {
    fn render_rooms(&mut self, rooms: &[String], current: &str) {
        self.rooms.push((rooms.to_vec(), current.to_string()));
    }

    fn render_line(&mut self, line: &Line) {
        self.lines.push(line.clone());
    }

    fn set_typing(&mut self, text: Option<&str>) {
        self.typing = text.map(str::to_string);
    }

    fn alert(&mut self, message: &str) {
        self.alerts.push(message.to_string());
    }

    fn notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_own_chat_is_sent() {
        let line = Line::from_event(&ChatEvent::chat("alice", "hi"), "alice").unwrap();
        assert_eq!(line, Line::Sent("hi".into()));
        assert_eq!(line.text(), "hi");
    }

    #[test]
    fn test_other_chat_is_prefixed() {
        let line = Line::from_event(&ChatEvent::chat("bob", "hi"), "alice").unwrap();
        assert_eq!(line.text(), "bob: hi");
    }

    #[test]
    fn test_join_and_leave_are_system() {
        let joined = ChatEvent::UserJoined {
            user: "bob".into(),
            message: "bob entrou na sala.".into(),
        };
        let left = ChatEvent::UserLeft {
            user: "bob".into(),
            message: "bob saiu da sala.".into(),
        };
        assert_eq!(
            Line::from_event(&joined, "alice"),
            Some(Line::System("bob entrou na sala.".into()))
        );
        assert_eq!(
            Line::from_event(&left, "bob"),
            Some(Line::System("bob saiu da sala.".into()))
        );
    }

    #[test]
    fn test_typing_has_no_line() {
        assert_eq!(Line::from_event(&ChatEvent::typing("bob"), "alice"), None);
    }
}
