//! # devconnect-client
//!
//! View-models of the DevConnect chat: the open conversation ([`ChatBox`]),
//! the chat list ([`ChatSidebar`]), typing and presence tracking, attachment
//! uploads and the per-type message renderers.
//!
//! Nothing here reaches for ambient state. Every view-model is built from a
//! [`ChatContext`] carrying the session, the backend, the push transport and
//! the UI event sink.

pub mod attachments;
pub mod chat_box;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod presence;
pub mod render;
pub mod session;
pub mod sidebar;
pub mod typing;

#[cfg(test)]
mod testing;

use tracing_subscriber::{fmt, EnvFilter};

pub use attachments::AttachmentUploader;
pub use chat_box::{ChatBox, SendOutcome};
pub use config::ClientConfig;
pub use context::ChatContext;
pub use error::{ClientError, Result};
pub use events::{ToastLevel, UiEvent, UiSink};
pub use presence::{spawn_heartbeat, PresenceTracker};
pub use session::Session;
pub use sidebar::{ChatFilter, ChatSidebar, SidebarEntry};
pub use typing::TypingIndicator;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("devconnect_client=debug,devconnect_net=debug,devconnect_store=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();

    tracing::info!("DevConnect chat client v{}", env!("CARGO_PKG_VERSION"));
}
