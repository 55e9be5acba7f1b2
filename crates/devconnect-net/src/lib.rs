// Push channel between clients: typing, message status, recall and presence
// events. In-process hub for tests and embedding, WebSocket client for the relay.

pub mod error;
pub mod memory;
pub mod transport;
pub mod ws;

pub use error::TransportError;
pub use memory::{MemoryHub, MemoryTransport};
pub use transport::{Listener, ListenerId, ListenerRegistry, Transport};
pub use ws::{relay_url, WsTransport};
