use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::models::Message;
use crate::types::{ChatId, MessageId, UserId};

/// Per-message delivery state as seen by the sender's view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Delivered,
    Read,
    /// Local only: the insert was rejected and the row awaits a retry.
    Failed,
}

impl DeliveryStatus {
    fn rank(self) -> u8 {
        match self {
            Self::Failed => 0,
            Self::Sending => 1,
            Self::Sent => 2,
            Self::Delivered => 3,
            Self::Read => 4,
        }
    }

    /// Whether a remote report of `next` should replace `self`.
    /// Statuses only move forward.
    pub fn advances_to(self, next: DeliveryStatus) -> bool {
        next.rank() > self.rank()
    }
}

/// Named events carried by the push channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    Typing,
    NewMessage,
    MessageStatus,
    MessageRecalled,
    UserOnline,
    UserOffline,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Typing => "typing",
            Self::NewMessage => "newMessage",
            Self::MessageStatus => "messageStatus",
            Self::MessageRecalled => "messageRecalled",
            Self::UserOnline => "userOnline",
            Self::UserOffline => "userOffline",
        }
    }

    pub const CHAT: [EventKind; 4] = [
        Self::Typing,
        Self::NewMessage,
        Self::MessageStatus,
        Self::MessageRecalled,
    ];

    pub const PRESENCE: [EventKind; 2] = [Self::UserOnline, Self::UserOffline];
}

/// All events exchanged over the push channel.
///
/// On the wire each event is a JSON object `{"event": <name>, "data": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum TransportEvent {
    #[serde(rename_all = "camelCase")]
    Typing { chat_id: ChatId, user_id: UserId },

    NewMessage(Message),

    #[serde(rename_all = "camelCase")]
    MessageStatus {
        chat_id: ChatId,
        message_id: MessageId,
        status: DeliveryStatus,
    },

    #[serde(rename_all = "camelCase")]
    MessageRecalled {
        chat_id: ChatId,
        message_id: MessageId,
    },

    #[serde(rename_all = "camelCase")]
    UserOnline { user_id: UserId },

    #[serde(rename_all = "camelCase")]
    UserOffline { user_id: UserId },
}

impl TransportEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Typing { .. } => EventKind::Typing,
            Self::NewMessage(_) => EventKind::NewMessage,
            Self::MessageStatus { .. } => EventKind::MessageStatus,
            Self::MessageRecalled { .. } => EventKind::MessageRecalled,
            Self::UserOnline { .. } => EventKind::UserOnline,
            Self::UserOffline { .. } => EventKind::UserOffline,
        }
    }

    /// The chat an event refers to, if any. Presence events are global.
    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::Typing { chat_id, .. }
            | Self::MessageStatus { chat_id, .. }
            | Self::MessageRecalled { chat_id, .. } => Some(*chat_id),
            Self::NewMessage(message) => Some(message.chat_id),
            Self::UserOnline { .. } | Self::UserOffline { .. } => None,
        }
    }

    /// The user an event claims to originate from. Status and recall
    /// events carry none and are checked against the store by receivers.
    pub fn actor(&self) -> Option<UserId> {
        match self {
            Self::Typing { user_id, .. }
            | Self::UserOnline { user_id }
            | Self::UserOffline { user_id } => Some(*user_id),
            Self::NewMessage(message) => Some(message.sender_id),
            Self::MessageStatus { .. } | Self::MessageRecalled { .. } => None,
        }
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(data)?)
    }
}
