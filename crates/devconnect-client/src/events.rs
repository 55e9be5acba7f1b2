use serde::Serialize;
use tokio::sync::mpsc;

use devconnect_shared::ChatId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Error,
}

/// Notifications the view-models push to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UiEvent {
    Toast { level: ToastLevel, message: String },
    /// Leave the chat view; the chat is gone or not accessible.
    Redirect { chat_id: ChatId, reason: String },
    /// "N new messages" banner state of an open chat.
    UnreadBanner { chat_id: ChatId, count: u32, visible: bool },
}

pub type UiSink = mpsc::UnboundedSender<UiEvent>;

pub fn emit_event(sink: &UiSink, event: UiEvent) {
    if let Err(e) = sink.send(event) {
        tracing::error!(event = ?e.0, "Failed to emit UI event");
    }
}

pub fn toast_error(sink: &UiSink, message: impl Into<String>) {
    emit_event(
        sink,
        UiEvent::Toast {
            level: ToastLevel::Error,
            message: message.into(),
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_tagged() {
        let chat_id = ChatId::new();
        let json = serde_json::to_value(UiEvent::UnreadBanner {
            chat_id,
            count: 3,
            visible: true,
        })
        .unwrap();
        assert_eq!(json["kind"], "unread_banner");
        assert_eq!(json["count"], 3);
        assert_eq!(json["chat_id"], chat_id.to_string());

        let json = serde_json::to_value(UiEvent::Toast {
            level: ToastLevel::Error,
            message: "Failed to send message".to_string(),
        })
        .unwrap();
        assert_eq!(json["kind"], "toast");
        assert_eq!(json["level"], "error");
    }

    #[test]
    fn closed_sink_is_not_fatal() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        toast_error(&tx, "nobody listening");
    }
}
