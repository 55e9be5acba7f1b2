use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use devconnect_shared::constants::{BUCKET_CHAT_FILES, BUCKET_CHAT_IMAGES};
use devconnect_shared::{Attachment, MessageBody};
use devconnect_store::{ChatBackend, StoreError};

use crate::error::{ClientError, Result};
use crate::events::{toast_error, UiSink};

/// Uploads attachment bytes and builds the message body referencing them.
///
/// Failures are reported once as an error toast and never retried.
#[derive(Clone)]
pub struct AttachmentUploader {
    backend: Arc<dyn ChatBackend>,
    ui: UiSink,
    max_upload_bytes: usize,
}

/// Bucket an upload of `mime_type` is stored in.
pub fn bucket_for(mime_type: &str) -> &'static str {
    if mime_type.trim().to_ascii_lowercase().starts_with("image/") {
        BUCKET_CHAT_IMAGES
    } else {
        BUCKET_CHAT_FILES
    }
}

impl AttachmentUploader {
    pub fn new(backend: Arc<dyn ChatBackend>, ui: UiSink, max_upload_bytes: usize) -> Self {
        Self {
            backend,
            ui,
            max_upload_bytes,
        }
    }

    /// Upload `data` and return an image or file body pointing at it.
    pub async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        data: Bytes,
        caption: &str,
    ) -> Result<MessageBody> {
        let size = data.len();
        if size > self.max_upload_bytes {
            toast_error(
                &self.ui,
                format!("{file_name} is too large to upload"),
            );
            return Err(ClientError::AttachmentTooLarge {
                size,
                max: self.max_upload_bytes,
            });
        }

        let bucket = bucket_for(mime_type);
        let stored = match self.backend.upload(bucket, file_name, data).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(bucket, file = file_name, error = %e, "Attachment upload failed");
                let message = match &e {
                    StoreError::ObjectTooLarge { .. } => format!("{file_name} is too large to upload"),
                    _ => format!("Failed to upload {file_name}"),
                };
                toast_error(&self.ui, message);
                return Err(e.into());
            }
        };

        info!(bucket, path = %stored.path, size = stored.size, "Attachment uploaded");

        let attachment = Attachment {
            url: stored.public_url,
            name: file_name.to_string(),
            size: stored.size,
        };
        Ok(if bucket == BUCKET_CHAT_IMAGES {
            MessageBody::Image {
                caption: caption.to_string(),
                attachment,
            }
        } else {
            MessageBody::File { attachment }
        })
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    use devconnect_store::{BucketStore, Database, LocalBackend};

    use super::*;
    use crate::events::{ToastLevel, UiEvent};

    async fn uploader(
        server_max: usize,
        client_max: usize,
    ) -> (AttachmentUploader, mpsc::UnboundedReceiver<UiEvent>, TempDir) {
        let dir = TempDir::new().unwrap();
        let buckets = BucketStore::new(dir.path().to_path_buf(), "http://cdn.local", server_max)
            .await
            .unwrap();
        let backend = Arc::new(LocalBackend::new(Database::open_in_memory().unwrap(), buckets));
        let (ui, rx) = mpsc::unbounded_channel();
        (AttachmentUploader::new(backend, ui, client_max), rx, dir)
    }

    #[test]
    fn test_bucket_routing() {
        assert_eq!(bucket_for("image/png"), "chat-images");
        assert_eq!(bucket_for("IMAGE/JPEG"), "chat-images");
        assert_eq!(bucket_for("application/pdf"), "chat-files");
        assert_eq!(bucket_for(""), "chat-files");
    }

    #[tokio::test]
    async fn test_image_upload_builds_body() {
        let (uploader, _rx, _dir) = uploader(1024, 1024).await;
        let body = uploader
            .upload("cat.png", "image/png", Bytes::from_static(b"png"), "my cat")
            .await
            .unwrap();

        match body {
            MessageBody::Image { caption, attachment } => {
                assert_eq!(caption, "my cat");
                assert!(attachment.url.starts_with("http://cdn.local/chat-images/"));
                assert_eq!(attachment.size, 3);
            }
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_side_limit() {
        let (uploader, mut rx, _dir) = uploader(1024, 4).await;
        let err = uploader
            .upload("big.zip", "application/zip", Bytes::from_static(b"12345"), "")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::AttachmentTooLarge { size: 5, max: 4 }));
        assert!(matches!(
            rx.try_recv().unwrap(),
            UiEvent::Toast { level: ToastLevel::Error, .. }
        ));
    }

    #[tokio::test]
    async fn test_server_rejection_toasts() {
        let (uploader, mut rx, _dir) = uploader(4, 1024).await;
        let err = uploader
            .upload("big.bin", "application/octet-stream", Bytes::from_static(b"12345"), "")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::Store(StoreError::ObjectTooLarge { .. })));
        assert!(matches!(rx.try_recv().unwrap(), UiEvent::Toast { .. }));
        assert!(rx.try_recv().is_err());
    }
}
