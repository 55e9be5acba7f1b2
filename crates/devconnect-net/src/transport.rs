use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use devconnect_shared::{EventKind, TransportEvent};

use crate::error::TransportError;

/// Handle identifying a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Named-event push channel.
///
/// `on` registers interest in a set of event kinds; the returned
/// [`Listener`] yields matching events until it is dropped or removed with
/// `off`. Every `on` must be paired with an `off` (or a drop) when the
/// owning view goes away.
#[async_trait]
pub trait Transport: Send + Sync {
    fn on(&self, kinds: &[EventKind]) -> Listener;

    /// Remove a listener. Returns false if it was already gone.
    fn off(&self, id: ListenerId) -> bool;

    /// Send an event to the other participants.
    async fn emit(&self, event: TransportEvent) -> Result<(), TransportError>;
}

/// Receiving half of a registration.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    rx: mpsc::UnboundedReceiver<TransportEvent>,
}

impl Listener {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next event. `None` once the listener was removed or the
    /// transport shut down.
    pub async fn recv(&mut self) -> Option<TransportEvent> {
        self.rx.recv().await
    }

    /// Next queued event, without waiting.
    pub fn try_recv(&mut self) -> Option<TransportEvent> {
        self.rx.try_recv().ok()
    }
}

struct Registration {
    kinds: Vec<EventKind>,
    tx: mpsc::UnboundedSender<TransportEvent>,
}

/// Listener bookkeeping shared by the transport implementations.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<ListenerId, Registration>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ListenerId, Registration>> {
        // The map stays consistent even if a holder panicked.
        match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn register(&self, kinds: &[EventKind]) -> Listener {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().insert(
            id,
            Registration {
                kinds: kinds.to_vec(),
                tx,
            },
        );
        trace!(%id, ?kinds, "listener registered");
        Listener { id, rx }
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Deliver `event` to every listener interested in its kind.
    /// Listeners whose receiver was dropped are pruned. Returns the number
    /// of listeners reached.
    pub fn dispatch(&self, event: &TransportEvent) -> usize {
        let kind = event.kind();
        let mut listeners = self.lock();
        let mut delivered = 0;
        listeners.retain(|_, reg| {
            if !reg.kinds.contains(&kind) {
                return !reg.tx.is_closed();
            }
            if reg.tx.send(event.clone()).is_ok() {
                delivered += 1;
                true
            } else {
                false
            }
        });
        delivered
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every registration; pending `recv` calls return `None`.
    pub fn clear(&self) {
        self.lock().clear();
    }
}
