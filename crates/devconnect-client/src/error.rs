use thiserror::Error;

use devconnect_net::TransportError;
use devconnect_shared::{ChatId, MessageId};
use devconnect_store::StoreError;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The chat does not exist or the current user is not a member.
    #[error("Access denied to chat {0}")]
    AccessDenied(ChatId),

    #[error("Only the sender can modify message {0}")]
    NotSender(MessageId),

    #[error("Message {0} is not in this chat")]
    MessageNotFound(MessageId),

    /// Retry was requested for a row that is not in the failed state.
    #[error("Message {0} cannot be retried")]
    NotRetryable(MessageId),

    #[error("Attachment too large: {size} bytes (max {max})")]
    AttachmentTooLarge { size: usize, max: usize },

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ClientError>;
