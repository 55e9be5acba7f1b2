use std::time::Duration;

/// Application name
pub const APP_NAME: &str = "DevConnect";

/// Consecutive messages by the same sender within this window share one header
pub const GROUPING_WINDOW_SECS: i64 = 5 * 60;

/// A typing indicator clears this long after the last `typing` event
pub const TYPING_TIMEOUT: Duration = Duration::from_secs(3);

/// Scroll distance from the bottom (px) still counted as "at the bottom"
pub const SCROLL_BOTTOM_THRESHOLD_PX: f64 = 20.0;

/// Sidebar preview length in characters
pub const PREVIEW_MAX_CHARS: usize = 30;

/// Presence entries expire when not refreshed within this window
pub const PRESENCE_TTL: Duration = Duration::from_secs(60);

/// Maximum attachment size accepted by the client (10 MiB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Object storage buckets
pub const BUCKET_CHAT_IMAGES: &str = "chat-images";
pub const BUCKET_CHAT_FILES: &str = "chat-files";

/// Default relay HTTP port
pub const DEFAULT_RELAY_PORT: u16 = 8090;

/// Placeholders shown instead of recalled content
pub const DELETED_MESSAGE_TEXT: &str = "This message was deleted";
pub const DELETED_IMAGE_TEXT: &str = "This image was deleted";
pub const DELETED_FILE_TEXT: &str = "This file was deleted";
