use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use devconnect_net::{MemoryHub, Transport, WsTransport};
use devconnect_store::{BucketStore, ChatBackend, Database, LocalBackend};

use crate::config::ClientConfig;
use crate::error::Result;
use crate::events::{UiEvent, UiSink};
use crate::session::Session;

/// Dependencies shared by every view-model of one signed-in user.
#[derive(Clone)]
pub struct ChatContext {
    pub session: Session,
    pub backend: Arc<dyn ChatBackend>,
    pub transport: Arc<dyn Transport>,
    pub ui: UiSink,
    pub config: Arc<ClientConfig>,
}

impl ChatContext {
    pub fn new(
        session: Session,
        backend: Arc<dyn ChatBackend>,
        transport: Arc<dyn Transport>,
        ui: UiSink,
        config: ClientConfig,
    ) -> Self {
        Self {
            session,
            backend,
            transport,
            ui,
            config: Arc::new(config),
        }
    }

    /// Open the local backend described by `config`, register the session's
    /// profile and connect the push transport. Returns the context together
    /// with the receiving end of its UI event stream.
    pub async fn connect(
        config: ClientConfig,
        session: Session,
    ) -> Result<(Self, mpsc::UnboundedReceiver<UiEvent>)> {
        let db = match &config.db_path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        let buckets = BucketStore::new(
            config.storage_path.clone(),
            config.public_url.clone(),
            config.max_upload_bytes,
        )
        .await?;
        let backend = LocalBackend::new(db, buckets);
        backend.upsert_profile(&session.to_profile()).await?;

        let transport: Arc<dyn Transport> = match &config.relay_url {
            Some(url) => Arc::new(WsTransport::connect(url, session.user_id).await?),
            None => {
                info!("No relay configured, using in-process transport");
                Arc::new(MemoryHub::new().endpoint())
            }
        };

        let (ui, ui_rx) = mpsc::unbounded_channel();
        info!(user = %session.user_id.short(), "Chat context ready");
        Ok((
            Self::new(session, Arc::new(backend), transport, ui, config),
            ui_rx,
        ))
    }

    pub fn me(&self) -> devconnect_shared::UserId {
        self.session.user_id
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use devconnect_shared::UserId;

    #[tokio::test]
    async fn test_connect_registers_profile() {
        let dir = TempDir::new().unwrap();
        let config = ClientConfig {
            db_path: Some(dir.path().join("chat.db")),
            storage_path: dir.path().join("storage"),
            ..ClientConfig::default()
        };
        let session = Session::new(UserId::new(), "Ada");

        let (ctx, _ui) = ChatContext::connect(config, session.clone()).await.unwrap();
        let profile = ctx.backend.get_profile(session.user_id).await.unwrap();
        assert_eq!(profile.display_name, "Ada");
        assert_eq!(ctx.me(), session.user_id);
    }
}
