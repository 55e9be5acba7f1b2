//! Typing indicators.
//!
//! Senders emit a `typing` event on every keystroke. A receiver shows the
//! indicator for a (chat, user) pair until `timeout` has passed since the
//! last event for that pair.

use std::time::{Duration, Instant};

use devconnect_shared::constants::TYPING_TIMEOUT;
use devconnect_shared::{ChatId, TransportEvent, UserId};

#[derive(Debug, Clone)]
struct Typist {
    chat_id: ChatId,
    user_id: UserId,
    last_seen: Instant,
}

#[derive(Debug, Clone)]
pub struct TypingIndicator {
    timeout: Duration,
    // Kept in arrival order so labels list the earliest typist first.
    typists: Vec<Typist>,
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new(TYPING_TIMEOUT)
    }
}

impl TypingIndicator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            typists: Vec::new(),
        }
    }

    /// Feed a transport event. Own events and non-typing events are ignored.
    pub fn on_event(&mut self, event: &TransportEvent, me: UserId, now: Instant) -> bool {
        match event {
            TransportEvent::Typing { chat_id, user_id } if *user_id != me => {
                self.on_typing(*chat_id, *user_id, now);
                true
            }
            _ => false,
        }
    }

    fn on_typing(&mut self, chat_id: ChatId, user_id: UserId, now: Instant) {
        self.prune(now);
        match self
            .typists
            .iter_mut()
            .find(|t| t.chat_id == chat_id && t.user_id == user_id)
        {
            Some(typist) => typist.last_seen = now,
            None => self.typists.push(Typist {
                chat_id,
                user_id,
                last_seen: now,
            }),
        }
    }

    /// Stop showing `user_id`, e.g. once their message arrived.
    pub fn clear(&mut self, chat_id: ChatId, user_id: UserId) -> bool {
        let before = self.typists.len();
        self.typists
            .retain(|t| !(t.chat_id == chat_id && t.user_id == user_id));
        self.typists.len() != before
    }

    pub fn clear_chat(&mut self, chat_id: ChatId) {
        self.typists.retain(|t| t.chat_id != chat_id);
    }

    /// Drop entries older than the timeout.
    fn prune(&mut self, now: Instant) {
        let timeout = self.timeout;
        self.typists
            .retain(|t| now.saturating_duration_since(t.last_seen) < timeout);
    }

    pub fn typing_users(&self, chat_id: ChatId, now: Instant) -> Vec<UserId> {
        self.typists
            .iter()
            .filter(|t| t.chat_id == chat_id)
            .filter(|t| now.saturating_duration_since(t.last_seen) < self.timeout)
            .map(|t| t.user_id)
            .collect()
    }

    /// Earliest deadline at which an indicator of `chat_id` expires.
    pub fn next_expiry(&self, chat_id: ChatId) -> Option<Instant> {
        self.typists
            .iter()
            .filter(|t| t.chat_id == chat_id)
            .map(|t| t.last_seen + self.timeout)
            .min()
    }
}

/// "Ada is typing...", "Ada and Linus are typing...", "3 people are typing...".
pub fn typing_label<S: AsRef<str>>(names: &[S]) -> Option<String> {
    match names {
        [] => None,
        [one] => Some(format!("{} is typing...", one.as_ref())),
        [first, second] => Some(format!(
            "{} and {} are typing...",
            first.as_ref(),
            second.as_ref()
        )),
        many => Some(format!("{} people are typing...", many.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_after_timeout() {
        let mut typing = TypingIndicator::default();
        let chat = ChatId::new();
        let user = UserId::new();
        let start = Instant::now();

        typing.on_typing(chat, user, start);
        assert_eq!(typing.typing_users(chat, start + Duration::from_secs(2)), vec![user]);

        // A later keystroke pushes the deadline out.
        typing.on_typing(chat, user, start + Duration::from_secs(2));
        assert_eq!(typing.typing_users(chat, start + Duration::from_secs(4)), vec![user]);
        assert!(typing.typing_users(chat, start + Duration::from_secs(5)).is_empty());
    }

    #[test]
    fn test_own_events_ignored() {
        let mut typing = TypingIndicator::default();
        let me = UserId::new();
        let chat = ChatId::new();
        let now = Instant::now();
        let event = TransportEvent::Typing {
            chat_id: chat,
            user_id: me,
        };
        assert!(!typing.on_event(&event, me, now));
        assert!(typing.typing_users(chat, now).is_empty());
    }

    #[test]
    fn test_pairs_are_independent() {
        let mut typing = TypingIndicator::new(Duration::from_secs(1));
        let chat = ChatId::new();
        let other_chat = ChatId::new();
        let a = UserId::new();
        let b = UserId::new();
        let now = Instant::now();

        typing.on_typing(chat, a, now);
        typing.on_typing(other_chat, b, now);
        assert_eq!(typing.typing_users(chat, now), vec![a]);
        assert!(typing.clear(chat, a));
        assert!(typing.typing_users(chat, now).is_empty());
        assert_eq!(typing.typing_users(other_chat, now), vec![b]);
    }

    #[test]
    fn test_labels() {
        assert_eq!(typing_label::<&str>(&[]), None);
        assert_eq!(typing_label(&["Ada"]).unwrap(), "Ada is typing...");
        assert_eq!(typing_label(&["Ada", "Linus"]).unwrap(), "Ada and Linus are typing...");
        assert_eq!(typing_label(&["a", "b", "c"]).unwrap(), "3 people are typing...");
    }
}
