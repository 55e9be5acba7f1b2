//! Connection registry and fan-out.
//!
//! Every inbound frame from one connection is forwarded to every other
//! connection, provided any user it names is the connection's own. The hub also owns presence: a user is online while at least
//! one of their connections is open.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use devconnect_shared::{TransportEvent, UserId};

use crate::error::RelayError;

/// Outbound queue depth per connection; frames beyond it are dropped.
const OUTBOUND_QUEUE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

struct Connection {
    user: UserId,
    tx: mpsc::Sender<String>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    connections: HashMap<ConnectionId, Connection>,
}

impl HubState {
    fn user_connections(&self, user: UserId) -> usize {
        self.connections.values().filter(|c| c.user == user).count()
    }

    fn online_users(&self) -> HashSet<UserId> {
        self.connections.values().map(|c| c.user).collect()
    }

    /// Queue `frame` on every connection except `skip`. Returns the number
    /// of connections reached.
    fn fan_out(&self, skip: Option<ConnectionId>, frame: &str) -> usize {
        let mut reached = 0;
        for (id, conn) in &self.connections {
            if Some(*id) == skip {
                continue;
            }
            match conn.tx.try_send(frame.to_string()) {
                Ok(()) => reached += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(conn = id.0, "Outbound queue full, dropping frame");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
        reached
    }
}

#[derive(Clone)]
pub struct RelayHub {
    state: Arc<Mutex<HubState>>,
    max_connections: usize,
}

impl RelayHub {
    pub fn new(max_connections: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState::default())),
            max_connections,
        }
    }

    pub async fn has_capacity(&self) -> bool {
        self.max_connections == 0 || self.state.lock().await.connections.len() < self.max_connections
    }

    /// Register a connection for `user`.
    ///
    /// The new connection is told who is already online. If this is the
    /// user's first connection, everyone else is told the user came online.
    pub async fn register(
        &self,
        user: UserId,
    ) -> Result<(ConnectionId, mpsc::Receiver<String>), RelayError> {
        let mut state = self.state.lock().await;
        if self.max_connections != 0 && state.connections.len() >= self.max_connections {
            return Err(RelayError::TooManyConnections {
                max: self.max_connections,
            });
        }

        let id = ConnectionId(state.next_id);
        state.next_id += 1;
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);

        for online in state.online_users() {
            if let Some(frame) = encode(&TransportEvent::UserOnline { user_id: online }) {
                let _ = tx.try_send(frame);
            }
        }

        let first = state.user_connections(user) == 0;
        state.connections.insert(id, Connection { user, tx });

        if first {
            if let Some(frame) = encode(&TransportEvent::UserOnline { user_id: user }) {
                state.fan_out(Some(id), &frame);
            }
        }

        info!(conn = id.0, user = %user.short(), total = state.connections.len(), "Connection registered");
        Ok((id, rx))
    }

    /// Drop a connection. Announces `userOffline` when it was the user's last.
    pub async fn unregister(&self, id: ConnectionId) {
        let mut state = self.state.lock().await;
        let Some(conn) = state.connections.remove(&id) else {
            return;
        };

        if state.user_connections(conn.user) == 0 {
            if let Some(frame) = encode(&TransportEvent::UserOffline { user_id: conn.user }) {
                state.fan_out(None, &frame);
            }
        }

        info!(conn = id.0, user = %conn.user.short(), total = state.connections.len(), "Connection closed");
    }

    /// Forward an inbound frame from `from` to every other connection.
    /// Frames that are not a valid event, or that claim to come from a
    /// user other than the connection's, are dropped.
    pub async fn relay(&self, from: ConnectionId, frame: &str) -> usize {
        let event = match TransportEvent::from_json(frame) {
            Ok(event) => event,
            Err(e) => {
                debug!(conn = from.0, error = %e, "Dropping malformed frame");
                return 0;
            }
        };

        let state = self.state.lock().await;
        let Some(conn) = state.connections.get(&from) else {
            return 0;
        };
        if let Some(actor) = event.actor() {
            if actor != conn.user {
                warn!(
                    conn = from.0,
                    user = %conn.user.short(),
                    claimed = %actor.short(),
                    event = event.kind().as_str(),
                    "Dropping frame sent on behalf of another user"
                );
                return 0;
            }
        }

        let reached = state.fan_out(Some(from), frame);
        debug!(conn = from.0, event = event.kind().as_str(), reached, "Relayed frame");
        reached
    }

    pub async fn connection_count(&self) -> usize {
        self.state.lock().await.connections.len()
    }

    pub async fn online_users(&self) -> HashSet<UserId> {
        self.state.lock().await.online_users()
    }
}

fn encode(event: &TransportEvent) -> Option<String> {
    match event.to_json() {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!(error = %e, "Failed to encode event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use devconnect_shared::{ChatId, EventKind};

    use super::*;

    fn decode(frame: String) -> TransportEvent {
        TransportEvent::from_json(&frame).unwrap()
    }

    #[tokio::test]
    async fn test_fan_out_skips_sender() {
        let hub = RelayHub::new(0);
        let alice = UserId::new();
        let bob = UserId::new();
        let (a, mut rx_a) = hub.register(alice).await.unwrap();
        let (_b, mut rx_b) = hub.register(bob).await.unwrap();

        // Alice hears about Bob coming online.
        assert_eq!(decode(rx_a.recv().await.unwrap()), TransportEvent::UserOnline { user_id: bob });
        // Bob is told Alice is already online.
        assert_eq!(decode(rx_b.recv().await.unwrap()), TransportEvent::UserOnline { user_id: alice });

        let typing = TransportEvent::Typing {
            chat_id: ChatId::new(),
            user_id: alice,
        };
        assert_eq!(hub.relay(a, &typing.to_json().unwrap()).await, 1);
        assert_eq!(decode(rx_b.recv().await.unwrap()), typing);
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_frame_dropped() {
        let hub = RelayHub::new(0);
        let (a, _rx_a) = hub.register(UserId::new()).await.unwrap();
        let (_b, _rx_b) = hub.register(UserId::new()).await.unwrap();
        assert_eq!(hub.relay(a, "{\"event\":\"nope\"}").await, 0);
    }

    #[tokio::test]
    async fn test_frames_for_other_users_dropped() {
        let hub = RelayHub::new(0);
        let alice = UserId::new();
        let bob = UserId::new();
        let (a, mut rx_a) = hub.register(alice).await.unwrap();
        let (b, mut rx_b) = hub.register(bob).await.unwrap();
        rx_a.recv().await.unwrap();
        rx_b.recv().await.unwrap();

        let chat_id = ChatId::new();
        let forged_typing = TransportEvent::Typing { chat_id, user_id: alice };
        assert_eq!(hub.relay(b, &forged_typing.to_json().unwrap()).await, 0);
        let forged_offline = TransportEvent::UserOffline { user_id: alice };
        assert_eq!(hub.relay(b, &forged_offline.to_json().unwrap()).await, 0);
        assert!(rx_a.try_recv().is_err());

        // Events with no claimed user still pass.
        let recall = TransportEvent::MessageRecalled {
            chat_id,
            message_id: devconnect_shared::MessageId::new(),
        };
        assert_eq!(hub.relay(b, &recall.to_json().unwrap()).await, 1);
        assert_eq!(decode(rx_a.recv().await.unwrap()), recall);
    }

    #[tokio::test]
    async fn test_offline_only_after_last_connection() {
        let hub = RelayHub::new(0);
        let alice = UserId::new();
        let watcher = UserId::new();
        let (_w, mut rx_w) = hub.register(watcher).await.unwrap();

        let (first, _rx1) = hub.register(alice).await.unwrap();
        let (second, _rx2) = hub.register(alice).await.unwrap();
        assert_eq!(decode(rx_w.recv().await.unwrap()).kind(), EventKind::UserOnline);
        assert!(rx_w.try_recv().is_err());

        hub.unregister(first).await;
        assert!(rx_w.try_recv().is_err());
        assert!(hub.online_users().await.contains(&alice));

        hub.unregister(second).await;
        assert_eq!(
            decode(rx_w.recv().await.unwrap()),
            TransportEvent::UserOffline { user_id: alice }
        );
        assert!(!hub.online_users().await.contains(&alice));
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let hub = RelayHub::new(1);
        let _first = hub.register(UserId::new()).await.unwrap();
        assert!(!hub.has_capacity().await);
        assert!(matches!(
            hub.register(UserId::new()).await,
            Err(RelayError::TooManyConnections { max: 1 })
        ));
    }
}
