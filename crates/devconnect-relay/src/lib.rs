//! # devconnect-relay
//!
//! WebSocket relay for the DevConnect push channel. Clients connect to
//! `/ws?user=<uuid>`; every event frame is fanned out to the other
//! connections, and the relay announces `userOnline` / `userOffline` as
//! users come and go.

pub mod api;
pub mod config;
pub mod error;
pub mod hub;
pub mod rate_limit;

pub use api::{build_router, serve, serve_on, AppState};
pub use config::RelayConfig;
pub use error::RelayError;
pub use hub::{ConnectionId, RelayHub};
