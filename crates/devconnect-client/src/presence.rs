//! Online status of other users.
//!
//! The relay pushes `userOnline` when a user's first connection opens and
//! `userOffline` when the last one closes. Clients additionally re-announce
//! themselves every half TTL ([`spawn_heartbeat`]); an entry that is not
//! refreshed within the TTL is considered offline, which covers relays that
//! lost the disconnect.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use devconnect_net::{Transport, TransportError};
use devconnect_shared::constants::PRESENCE_TTL;
use devconnect_shared::{TransportEvent, UserId};

#[derive(Debug, Clone)]
pub struct PresenceTracker {
    ttl: Duration,
    last_seen: HashMap<UserId, Instant>,
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(PRESENCE_TTL)
    }
}

impl PresenceTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last_seen: HashMap::new(),
        }
    }

    /// Feed a transport event. Returns true if it was a presence event.
    pub fn apply(&mut self, event: &TransportEvent, now: Instant) -> bool {
        match event {
            TransportEvent::UserOnline { user_id } => {
                self.last_seen.insert(*user_id, now);
                true
            }
            TransportEvent::UserOffline { user_id } => {
                self.last_seen.remove(user_id);
                true
            }
            _ => false,
        }
    }

    pub fn is_online(&self, user: UserId, now: Instant) -> bool {
        self.last_seen
            .get(&user)
            .is_some_and(|seen| now.saturating_duration_since(*seen) < self.ttl)
    }

    pub fn online_users(&self, now: Instant) -> Vec<UserId> {
        let mut users: Vec<_> = self
            .last_seen
            .keys()
            .copied()
            .filter(|u| self.is_online(*u, now))
            .collect();
        users.sort();
        users
    }

    pub fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.last_seen
            .retain(|_, seen| now.saturating_duration_since(*seen) < ttl);
    }
}

/// Announce `user` as online every `ttl / 2` until the transport closes.
pub fn spawn_heartbeat(
    transport: Arc<dyn Transport>,
    user: UserId,
    ttl: Duration,
) -> JoinHandle<()> {
    let period = (ttl / 2).max(Duration::from_millis(100));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            match transport.emit(TransportEvent::UserOnline { user_id: user }).await {
                Ok(()) => debug!(user = %user.short(), "presence heartbeat"),
                Err(TransportError::Closed) => {
                    debug!("transport closed, stopping heartbeat");
                    break;
                }
                Err(e) => warn!(error = %e, "presence heartbeat failed"),
            }
        }
    })
}
