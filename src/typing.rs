use std::time::Duration;

use tokio::time::Instant;

/// Default time a typing notice stays visible after the last event.
pub const DEFAULT_TYPING_TIMEOUT: Duration = Duration::from_millis(2000);

/// Debounced "someone is typing" state.
///
/// Each typing event pushes the clear deadline out again; the owner sleeps
/// until [`TypingIndicator::deadline`] and then calls
/// [`TypingIndicator::expire`].
#[derive(Debug, Clone)]
pub struct TypingIndicator {
    timeout: Duration,
    text: Option<String>,
    deadline: Option<Instant>,
}

impl TypingIndicator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            text: None,
            deadline: None,
        }
    }

    /// Show `user` as typing and restart the clear timer from `now`.
    pub fn show(&mut self, user: &str, now: Instant) -> &str {
        self.deadline = Some(now + self.timeout);
        self.text.insert(typing_text(user))
    }

    /// Hide the notice and cancel the timer.
    pub fn clear(&mut self) {
        self.text = None;
        self.deadline = None;
    }

    /// Clear if the deadline has passed. Returns true when something was
    /// cleared.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.clear();
                true
            }
            _ => false,
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_TYPING_TIMEOUT)
    }
}

pub fn typing_text(user: &str) -> String {
    format!("{user} está a digitar...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_show_sets_text() {
        let mut t = TypingIndicator::default();
        let now = Instant::now();
        assert_eq!(t.show("bob", now), "bob está a digitar...");
        assert_eq!(t.text(), Some("bob está a digitar..."));
        assert_eq!(t.deadline(), Some(now + Duration::from_millis(2000)));
    }

    #[test]
    fn test_expires_after_timeout() {
        let mut t = TypingIndicator::default();
        let now = Instant::now();
        t.show("bob", now);
        assert!(!t.expire(now + Duration::from_millis(1999)));
        assert!(t.text().is_some());
        assert!(t.expire(now + Duration::from_millis(2000)));
        assert_eq!(t.text(), None);
        assert_eq!(t.deadline(), None);
    }

    #[test]
    fn test_new_event_resets_timer() {
        let mut t = TypingIndicator::default();
        let start = Instant::now();
        t.show("bob", start);
        t.show("bob", start + Duration::from_millis(1500));
        assert!(!t.expire(start + Duration::from_millis(2500)));
        assert!(t.expire(start + Duration::from_millis(3500)));
    }

    #[test]
    fn test_clear_cancels_deadline() {
        let mut t = TypingIndicator::new(Duration::from_millis(10));
        let now = Instant::now();
        t.show("bob", now);
        t.clear();
        assert!(!t.expire(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_expire_without_show_is_noop() {
        let mut t = TypingIndicator::default();
        assert!(!t.expire(Instant::now()));
    }
}
