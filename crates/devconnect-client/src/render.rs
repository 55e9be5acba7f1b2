//! Per-type message rendering.
//!
//! [`render`] turns a stored message into what a bubble displays. A recalled
//! message renders as a placeholder matching its type and never exposes
//! the original content or attachment URL.

use devconnect_shared::constants::{DELETED_FILE_TEXT, DELETED_IMAGE_TEXT, DELETED_MESSAGE_TEXT};
use devconnect_shared::{Message, MessageBody, MessageKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedBody {
    Deleted { placeholder: &'static str },
    Text { content: String },
    Code { content: String, language: String },
    Image { url: String, caption: Option<String>, name: String },
    File { url: String, name: String, size: String },
}

impl RenderedBody {
    /// Plain text a screen reader or test would read out.
    pub fn visible_text(&self) -> String {
        match self {
            Self::Deleted { placeholder } => placeholder.to_string(),
            Self::Text { content } | Self::Code { content, .. } => content.clone(),
            Self::Image { caption, name, .. } => caption.clone().unwrap_or_else(|| name.clone()),
            Self::File { name, size, .. } => format!("{name} ({size})"),
        }
    }
}

pub fn deleted_placeholder(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Text | MessageKind::Code => DELETED_MESSAGE_TEXT,
        MessageKind::Image => DELETED_IMAGE_TEXT,
        MessageKind::File => DELETED_FILE_TEXT,
    }
}

pub fn render(message: &Message) -> RenderedBody {
    if message.is_deleted {
        return RenderedBody::Deleted {
            placeholder: deleted_placeholder(message.kind()),
        };
    }

    match &message.body {
        MessageBody::Text { content } => RenderedBody::Text {
            content: content.clone(),
        },
        MessageBody::Code { content, language } => RenderedBody::Code {
            content: content.clone(),
            language: language
                .as_deref()
                .filter(|l| !l.is_empty())
                .unwrap_or("plaintext")
                .to_string(),
        },
        MessageBody::Image {
            caption,
            attachment,
        } => RenderedBody::Image {
            url: attachment.url.clone(),
            caption: Some(caption.trim())
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            name: attachment.name.clone(),
        },
        MessageBody::File { attachment } => RenderedBody::File {
            url: attachment.url.clone(),
            name: attachment.name.clone(),
            size: format_file_size(attachment.size),
        },
    }
}

/// Human-readable size: bytes, KB or MB with one decimal.
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;

    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

#[cfg(test)]
mod tests {
    use devconnect_shared::{Attachment, ChatId, MessageId, UserId};

    use super::*;

    fn message(body: MessageBody, is_deleted: bool) -> Message {
        Message {
            id: MessageId::new(),
            chat_id: ChatId::new(),
            sender_id: UserId::new(),
            body,
            is_deleted,
            is_read: false,
            created_at: chrono::Utc::now(),
        }
    }

    fn attachment() -> Attachment {
        Attachment {
            url: "http://localhost/storage/chat-files/abc/secret.pdf".to_string(),
            name: "secret.pdf".to_string(),
            size: 2_621_440,
        }
    }

    #[test]
    fn deleted_messages_hide_content() {
        let cases = [
            (MessageBody::text("password123"), DELETED_MESSAGE_TEXT),
            (MessageBody::code("let key = 42;", Some("rust")), DELETED_MESSAGE_TEXT),
            (
                MessageBody::Image {
                    caption: "holiday".to_string(),
                    attachment: attachment(),
                },
                DELETED_IMAGE_TEXT,
            ),
            (MessageBody::File { attachment: attachment() }, DELETED_FILE_TEXT),
        ];

        for (body, placeholder) in cases {
            let rendered = render(&message(body, true));
            assert_eq!(rendered, RenderedBody::Deleted { placeholder });
            let text = rendered.visible_text();
            assert!(!text.contains("password") && !text.contains("secret") && !text.contains("http"));
        }
    }

    #[test]
    fn file_bubble_shows_size() {
        let rendered = render(&message(MessageBody::File { attachment: attachment() }, false));
        assert_eq!(rendered.visible_text(), "secret.pdf (2.5 MB)");
    }

    #[test]
    fn code_defaults_language() {
        let rendered = render(&message(MessageBody::code("x", None), false));
        assert!(matches!(rendered, RenderedBody::Code { ref language, .. } if language == "plaintext"));
    }

    #[test]
    fn sizes() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10.0 MB");
    }
}
