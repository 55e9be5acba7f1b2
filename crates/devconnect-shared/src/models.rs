//! Domain models exchanged between the backend, the transport and the
//! view-models.
//!
//! Every struct derives `Serialize` and `Deserialize` so the same value can
//! travel over the realtime feed and the push channel unchanged.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::types::{ChatId, ChatKind, MessageId, UserId};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Public profile of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// A conversation, either direct (exactly two members) or a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub kind: ChatKind,
    /// Only groups carry a name.
    pub name: Option<String>,
    pub creator_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Bumped whenever a message is posted.
    pub updated_at: DateTime<Utc>,
}

/// Membership row. `last_read_at` is the unread-count boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMember {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Stored `type` column of a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Code,
    Image,
    File,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
            Self::Image => "image",
            Self::File => "file",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ProtocolError> {
        match s {
            "text" => Ok(Self::Text),
            "code" => Ok(Self::Code),
            "image" => Ok(Self::Image),
            "file" => Ok(Self::File),
            other => Err(ProtocolError::UnknownMessageType(other.to_string())),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded object referenced by an image or file message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    /// Public URL returned by object storage.
    pub url: String,
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

/// Message payload, one variant per message type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageBody {
    Text {
        content: String,
    },
    Code {
        content: String,
        language: Option<String>,
    },
    Image {
        caption: String,
        attachment: Attachment,
    },
    File {
        attachment: Attachment,
    },
}

/// Flat column view of a [`MessageBody`], matching the `messages` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyColumns {
    pub kind: MessageKind,
    pub content: String,
    pub language: Option<String>,
    pub file_url: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

impl MessageBody {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    pub fn code(content: impl Into<String>, language: Option<&str>) -> Self {
        Self::Code {
            content: content.into(),
            language: language.map(str::to_string),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Text { .. } => MessageKind::Text,
            Self::Code { .. } => MessageKind::Code,
            Self::Image { .. } => MessageKind::Image,
            Self::File { .. } => MessageKind::File,
        }
    }

    /// Searchable text of the message (caption or file name for attachments).
    pub fn content(&self) -> &str {
        match self {
            Self::Text { content } | Self::Code { content, .. } => content,
            Self::Image { caption, .. } => caption,
            Self::File { attachment } => &attachment.name,
        }
    }

    pub fn attachment(&self) -> Option<&Attachment> {
        match self {
            Self::Image { attachment, .. } | Self::File { attachment } => Some(attachment),
            Self::Text { .. } | Self::Code { .. } => None,
        }
    }

    pub fn to_columns(&self) -> BodyColumns {
        let attachment = self.attachment();
        BodyColumns {
            kind: self.kind(),
            content: self.content().to_string(),
            language: match self {
                Self::Code { language, .. } => language.clone(),
                _ => None,
            },
            file_url: attachment.map(|a| a.url.clone()),
            file_name: attachment.map(|a| a.name.clone()),
            file_size: attachment.map(|a| a.size),
        }
    }

    /// Rebuild a body from its stored columns, rejecting rows whose
    /// attachment columns are missing for an attachment type.
    pub fn from_columns(columns: BodyColumns) -> Result<Self, ProtocolError> {
        let BodyColumns {
            kind,
            content,
            language,
            file_url,
            file_name,
            file_size,
        } = columns;

        let attachment = |kind: &'static str| -> Result<Attachment, ProtocolError> {
            let url = file_url.clone().ok_or_else(|| ProtocolError::MalformedBody {
                kind,
                reason: "missing file_url".to_string(),
            })?;
            Ok(Attachment {
                name: file_name.clone().unwrap_or_else(|| content.clone()),
                size: file_size.unwrap_or(0),
                url,
            })
        };

        Ok(match kind {
            MessageKind::Text => Self::Text { content },
            MessageKind::Code => Self::Code { content, language },
            MessageKind::Image => Self::Image {
                attachment: attachment("image")?,
                caption: content,
            },
            MessageKind::File => Self::File {
                attachment: attachment("file")?,
            },
        })
    }
}

/// A persisted chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub chat_id: ChatId,
    pub sender_id: UserId,
    pub body: MessageBody,
    /// Recalled by the sender; the body must not be shown.
    pub is_deleted: bool,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        self.body.kind()
    }
}

/// The payload of a send, kept so a failed send can be retried verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: ChatId,
    pub body: MessageBody,
}
