//! In-process transport.
//!
//! A [`MemoryHub`] plays the relay: every [`MemoryTransport`] endpoint it
//! hands out sees the events emitted by the other endpoints, never its own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use devconnect_shared::{EventKind, TransportEvent};

use crate::error::TransportError;
use crate::transport::{Listener, ListenerId, ListenerRegistry, Transport};

#[derive(Default)]
struct HubInner {
    next_endpoint: AtomicU64,
    endpoints: Mutex<HashMap<u64, Arc<ListenerRegistry>>>,
}

impl HubInner {
    fn endpoints(&self) -> MutexGuard<'_, HashMap<u64, Arc<ListenerRegistry>>> {
        match self.endpoints.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<HubInner>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new endpoint.
    pub fn endpoint(&self) -> MemoryTransport {
        let id = self.inner.next_endpoint.fetch_add(1, Ordering::Relaxed);
        let registry = Arc::new(ListenerRegistry::new());
        self.inner.endpoints().insert(id, registry.clone());
        MemoryTransport {
            id,
            hub: self.inner.clone(),
            registry,
        }
    }

    pub fn endpoint_count(&self) -> usize {
        self.inner.endpoints().len()
    }

    /// Deliver an event to every endpoint, as a server-originated push.
    pub fn broadcast(&self, event: &TransportEvent) -> usize {
        let targets: Vec<_> = self.inner.endpoints().values().cloned().collect();
        targets.iter().map(|r| r.dispatch(event)).sum()
    }
}

pub struct MemoryTransport {
    id: u64,
    hub: Arc<HubInner>,
    registry: Arc<ListenerRegistry>,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn on(&self, kinds: &[EventKind]) -> Listener {
        self.registry.register(kinds)
    }

    fn off(&self, id: ListenerId) -> bool {
        self.registry.remove(id)
    }

    async fn emit(&self, event: TransportEvent) -> Result<(), TransportError> {
        let targets: Vec<_> = self
            .hub
            .endpoints()
            .iter()
            .filter(|(id, _)| **id != self.id)
            .map(|(_, registry)| registry.clone())
            .collect();

        let delivered: usize = targets.iter().map(|r| r.dispatch(&event)).sum();
        debug!(endpoint = self.id, event = event.kind().as_str(), delivered, "emitted");
        Ok(())
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        self.hub.endpoints().remove(&self.id);
        self.registry.clear();
    }
}
