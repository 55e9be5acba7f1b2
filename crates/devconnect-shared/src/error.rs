use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("Malformed {kind} message: {reason}")]
    MalformedBody { kind: &'static str, reason: String },
}
