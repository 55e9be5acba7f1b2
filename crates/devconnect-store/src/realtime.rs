//! Realtime change feed.
//!
//! Writes performed through the backend publish a [`RowChange`] on a
//! broadcast channel. Clients subscribe with a table plus an optional
//! `chat_id` filter and only see matching rows. Dropping the subscription
//! detaches it.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};

use devconnect_shared::{Chat, ChatId, ChatMember, Message};

/// Capacity of the broadcast ring; slower subscribers skip ahead.
const FEED_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Chats,
    ChatMembers,
    Messages,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
}

/// New state of the changed row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "table", content = "row", rename_all = "snake_case")]
pub enum Record {
    Chat(Chat),
    ChatMember(ChatMember),
    Message(Message),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Self::Chat(_) => Table::Chats,
            Self::ChatMember(_) => Table::ChatMembers,
            Self::Message(_) => Table::Messages,
        }
    }

    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Chat(chat) => chat.id,
            Self::ChatMember(member) => member.chat_id,
            Self::Message(message) => message.chat_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RowChange {
    pub kind: ChangeKind,
    pub record: Record,
}

/// Which rows a subscription receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: Table,
    pub chat_id: Option<ChatId>,
}

impl ChangeFilter {
    /// Every change to `table`.
    pub fn table(table: Table) -> Self {
        Self {
            table,
            chat_id: None,
        }
    }

    /// Message inserts/updates of one chat.
    pub fn messages_in(chat_id: ChatId) -> Self {
        Self {
            table: Table::Messages,
            chat_id: Some(chat_id),
        }
    }

    pub fn matches(&self, change: &RowChange) -> bool {
        change.record.table() == self.table
            && self
                .chat_id
                .map_or(true, |id| change.record.chat_id() == id)
    }
}

#[derive(Debug, Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<RowChange>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Publish a change to every live subscription. Returns how many
    /// subscriptions were reached (before filtering).
    pub fn publish(&self, kind: ChangeKind, record: Record) -> usize {
        let change = RowChange { kind, record };
        debug!(
            table = ?change.record.table(),
            kind = ?change.kind,
            chat = %change.record.chat_id(),
            "publishing change"
        );
        // No subscribers is not an error for a change feed.
        self.tx.send(change).unwrap_or(0)
    }

    pub fn subscribe(&self, filter: ChangeFilter) -> RealtimeSubscription {
        RealtimeSubscription {
            rx: self.tx.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A filtered view of the change feed.
#[derive(Debug)]
pub struct RealtimeSubscription {
    rx: broadcast::Receiver<RowChange>,
    filter: ChangeFilter,
}

impl RealtimeSubscription {
    pub fn filter(&self) -> ChangeFilter {
        self.filter
    }

    /// Wait for the next matching change. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<RowChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) if self.filter.matches(&change) => return Some(change),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "realtime subscription lagged, changes dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching change that is already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<RowChange> {
        loop {
            match self.rx.try_recv() {
                Ok(change) if self.filter.matches(&change) => return Some(change),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "realtime subscription lagged, changes dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
