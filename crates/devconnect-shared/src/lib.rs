// Types shared by the store, transport, relay and client crates.

pub mod constants;
pub mod error;
pub mod models;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use models::*;
pub use protocol::{DeliveryStatus, EventKind, TransportEvent};
pub use types::{ChatId, ChatKind, MessageId, UserId};
