//! Shared fixtures for the view-model unit tests.

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::mpsc;

use devconnect_net::MemoryHub;
use devconnect_shared::UserId;
use devconnect_store::{BucketStore, ChatBackend, Database, LocalBackend};

use crate::config::ClientConfig;
use crate::context::ChatContext;
use crate::events::UiEvent;
use crate::session::Session;

/// One in-memory backend and transport hub shared by several users.
pub(crate) struct Fixture {
    pub backend: Arc<LocalBackend>,
    pub hub: MemoryHub,
    _dir: TempDir,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let buckets = BucketStore::new(dir.path().join("storage"), "http://cdn.local", 1024)
            .await
            .unwrap();
        Self {
            backend: Arc::new(LocalBackend::new(Database::open_in_memory().unwrap(), buckets)),
            hub: MemoryHub::new(),
            _dir: dir,
        }
    }

    pub async fn user(&self, name: &str) -> (ChatContext, mpsc::UnboundedReceiver<UiEvent>) {
        let session = Session::new(UserId::new(), name);
        self.backend.upsert_profile(&session.to_profile()).await.unwrap();
        let (ui, rx) = mpsc::unbounded_channel();
        let ctx = ChatContext::new(
            session,
            self.backend.clone(),
            Arc::new(self.hub.endpoint()),
            ui,
            ClientConfig::default(),
        );
        (ctx, rx)
    }
}
