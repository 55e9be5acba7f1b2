//! The ordered message list of one open chat.
//!
//! Rows come from three places: the initial fetch, live events (realtime
//! feed and transport) and optimistic sends. Every merge is keyed by message
//! id, so the same message delivered twice still occupies one row.

use chrono::{DateTime, Utc};

use devconnect_shared::{DeliveryStatus, Message, MessageId, OutgoingMessage, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntry {
    pub message: Message,
    /// Client-local delivery state. `None` for other users' messages.
    pub status: Option<DeliveryStatus>,
    /// Original payload of an optimistic row, kept for retry.
    pub(crate) outgoing: Option<OutgoingMessage>,
}

impl TimelineEntry {
    pub fn id(&self) -> MessageId {
        self.message.id
    }

    /// True while the row carries a temporary client-side id.
    pub fn is_pending(&self) -> bool {
        self.outgoing.is_some()
    }
}

#[derive(Debug, Default)]
pub struct Timeline {
    entries: Vec<TimelineEntry>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents with a fetched history. Own messages start as
    /// `Read`, others carry no status.
    pub fn load(&mut self, mut messages: Vec<Message>, me: UserId) {
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        messages.dedup_by_key(|m| m.id);
        self.entries = messages
            .into_iter()
            .map(|message| TimelineEntry {
                status: (message.sender_id == me).then_some(DeliveryStatus::Read),
                message,
                outgoing: None,
            })
            .collect();
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        &self.entries
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter().map(|e| &e.message)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: MessageId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: MessageId) -> Option<&TimelineEntry> {
        self.position(id).map(|i| &self.entries[i])
    }

    fn position(&self, id: MessageId) -> Option<usize> {
        self.entries.iter().position(|e| e.message.id == id)
    }

    fn insert_sorted(&mut self, entry: TimelineEntry) {
        let at = entry.message.created_at;
        let idx = self.entries.partition_point(|e| e.message.created_at <= at);
        self.entries.insert(idx, entry);
    }

    /// Add a message unless a row with the same id exists.
    /// Returns whether the list changed.
    pub fn merge(&mut self, message: Message, status: Option<DeliveryStatus>) -> bool {
        if self.contains(message.id) {
            return false;
        }
        self.insert_sorted(TimelineEntry {
            message,
            status,
            outgoing: None,
        });
        true
    }

    /// Append an optimistic row in the `Sending` state.
    pub fn push_pending(
        &mut self,
        temp_id: MessageId,
        sender: UserId,
        outgoing: OutgoingMessage,
        created_at: DateTime<Utc>,
    ) {
        let message = Message {
            id: temp_id,
            chat_id: outgoing.chat_id,
            sender_id: sender,
            body: outgoing.body.clone(),
            is_deleted: false,
            is_read: false,
            created_at,
        };
        self.insert_sorted(TimelineEntry {
            message,
            status: Some(DeliveryStatus::Sending),
            outgoing: Some(outgoing),
        });
    }

    /// Swap the optimistic row for the stored one at `Sent`. If the stored
    /// row already arrived through a live event, only the temporary row goes.
    pub fn confirm(&mut self, temp_id: MessageId, stored: Message) {
        if let Some(idx) = self.position(temp_id) {
            self.entries.remove(idx);
        }
        match self.position(stored.id) {
            Some(idx) => {
                let entry = &mut self.entries[idx];
                let current = entry.status.unwrap_or(DeliveryStatus::Sending);
                if current.advances_to(DeliveryStatus::Sent) {
                    entry.status = Some(DeliveryStatus::Sent);
                }
            }
            None => {
                self.insert_sorted(TimelineEntry {
                    message: stored,
                    status: Some(DeliveryStatus::Sent),
                    outgoing: None,
                });
            }
        }
    }

    /// Flag a pending row as failed. Returns false if it is not pending.
    pub fn fail(&mut self, temp_id: MessageId) -> bool {
        match self.position(temp_id) {
            Some(idx) if self.entries[idx].is_pending() => {
                self.entries[idx].status = Some(DeliveryStatus::Failed);
                true
            }
            _ => false,
        }
    }

    /// Remove a failed row and hand back its original payload.
    pub fn take_failed(&mut self, temp_id: MessageId) -> Option<OutgoingMessage> {
        let idx = self.position(temp_id)?;
        if self.entries[idx].status != Some(DeliveryStatus::Failed) {
            return None;
        }
        self.entries.remove(idx).outgoing
    }

    pub fn remove(&mut self, id: MessageId) -> Option<TimelineEntry> {
        let idx = self.position(id)?;
        Some(self.entries.remove(idx))
    }

    /// Mirror a recall. Returns whether the row changed.
    pub fn mark_deleted(&mut self, id: MessageId) -> bool {
        match self.position(id) {
            Some(idx) if !self.entries[idx].message.is_deleted => {
                self.entries[idx].message.is_deleted = true;
                true
            }
            _ => false,
        }
    }

    /// Apply an updated copy of a stored row, keeping the local status.
    pub fn replace(&mut self, message: Message) -> bool {
        match self.position(message.id) {
            Some(idx) if self.entries[idx].message != message => {
                self.entries[idx].message = message;
                true
            }
            _ => false,
        }
    }

    /// Move an own message's status forward; regressions are ignored.
    pub fn advance_status(&mut self, id: MessageId, status: DeliveryStatus) -> bool {
        let Some(idx) = self.position(id) else {
            return false;
        };
        let entry = &mut self.entries[idx];
        if entry.is_pending() {
            return false;
        }
        match entry.status {
            Some(current) if current.advances_to(status) => {
                entry.status = Some(status);
                true
            }
            _ => false,
        }
    }

    /// Flag every unread message from someone else as read.
    /// Returns the ids that flipped.
    pub fn mark_others_read(&mut self, me: UserId) -> Vec<MessageId> {
        self.entries
            .iter_mut()
            .filter(|e| e.message.sender_id != me && !e.message.is_read && !e.is_pending())
            .map(|e| {
                e.message.is_read = true;
                e.message.id
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use devconnect_shared::{ChatId, MessageBody};

    use super::*;

    fn message(chat: ChatId, sender: UserId, text: &str, at: DateTime<Utc>) -> Message {
        Message {
            id: MessageId::new(),
            chat_id: chat,
            sender_id: sender,
            body: MessageBody::text(text),
            is_deleted: false,
            is_read: false,
            created_at: at,
        }
    }

    #[test]
    fn merge_is_idempotent() {
        let chat = ChatId::new();
        let other = UserId::new();
        let mut timeline = Timeline::new();
        let msg = message(chat, other, "hi", Utc::now());

        assert!(timeline.merge(msg.clone(), None));
        for _ in 0..5 {
            assert!(!timeline.merge(msg.clone(), None));
        }
        assert_eq!(timeline.len(), 1);
    }

    #[test]
    fn merge_keeps_created_at_order() {
        let chat = ChatId::new();
        let user = UserId::new();
        let base = Utc::now();
        let mut timeline = Timeline::new();

        let late = message(chat, user, "late", base + Duration::seconds(10));
        let early = message(chat, user, "early", base);
        let middle = message(chat, user, "middle", base + Duration::seconds(5));
        timeline.merge(late.clone(), None);
        timeline.merge(early.clone(), None);
        timeline.merge(middle.clone(), None);

        let ids: Vec<_> = timeline.messages().map(|m| m.id).collect();
        assert_eq!(ids, vec![early.id, middle.id, late.id]);
    }

    #[test]
    fn load_marks_own_messages_read() {
        let chat = ChatId::new();
        let me = UserId::new();
        let other = UserId::new();
        let now = Utc::now();
        let mut timeline = Timeline::new();
        timeline.load(
            vec![message(chat, other, "b", now + Duration::seconds(1)), message(chat, me, "a", now)],
            me,
        );

        assert_eq!(timeline.entries()[0].status, Some(DeliveryStatus::Read));
        assert_eq!(timeline.entries()[1].status, None);
    }

    #[test]
    fn confirm_replaces_pending_row() {
        let chat = ChatId::new();
        let me = UserId::new();
        let mut timeline = Timeline::new();
        let temp = MessageId::new();
        let outgoing = OutgoingMessage {
            chat_id: chat,
            body: MessageBody::text("hello"),
        };
        timeline.push_pending(temp, me, outgoing, Utc::now());
        assert_eq!(timeline.entries()[0].status, Some(DeliveryStatus::Sending));

        let stored = message(chat, me, "hello", Utc::now());
        // The live copy raced ahead of the insert response.
        timeline.merge(stored.clone(), Some(DeliveryStatus::Sent));
        timeline.confirm(temp, stored.clone());

        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline.entries()[0].id(), stored.id);
        assert_eq!(timeline.entries()[0].status, Some(DeliveryStatus::Sent));
        assert!(!timeline.contains(temp));
    }

    #[test]
    fn failed_rows_can_be_taken_once() {
        let chat = ChatId::new();
        let me = UserId::new();
        let mut timeline = Timeline::new();
        let temp = MessageId::new();
        let outgoing = OutgoingMessage {
            chat_id: chat,
            body: MessageBody::code("fn main() {}", Some("rust")),
        };
        timeline.push_pending(temp, me, outgoing.clone(), Utc::now());

        assert!(timeline.take_failed(temp).is_none());
        assert!(timeline.fail(temp));
        assert_eq!(timeline.take_failed(temp), Some(outgoing));
        assert!(timeline.is_empty());
    }

    #[test]
    fn status_never_regresses() {
        let chat = ChatId::new();
        let me = UserId::new();
        let mut timeline = Timeline::new();
        let msg = message(chat, me, "x", Utc::now());
        timeline.merge(msg.clone(), Some(DeliveryStatus::Sent));

        assert!(timeline.advance_status(msg.id, DeliveryStatus::Read));
        assert!(!timeline.advance_status(msg.id, DeliveryStatus::Delivered));
        assert_eq!(timeline.get(msg.id).unwrap().status, Some(DeliveryStatus::Read));
    }

    #[test]
    fn mark_others_read_skips_own() {
        let chat = ChatId::new();
        let me = UserId::new();
        let other = UserId::new();
        let mut timeline = Timeline::new();
        let theirs = message(chat, other, "1", Utc::now());
        timeline.merge(theirs.clone(), None);
        timeline.merge(message(chat, me, "2", Utc::now()), Some(DeliveryStatus::Sent));

        assert_eq!(timeline.mark_others_read(me), vec![theirs.id]);
        assert!(timeline.mark_others_read(me).is_empty());
    }
}
