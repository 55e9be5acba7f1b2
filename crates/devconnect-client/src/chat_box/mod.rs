//! View-model of one open conversation.
//!
//! A [`ChatBox`] owns the message list of a single chat and reconciles it
//! against three sources: the backend's realtime feed, the push transport
//! and its own optimistic sends. Live events are queued in channels and
//! only merged when the owner calls [`ChatBox::sync`] or
//! [`ChatBox::next_event`], so all mutation happens through `&mut self`.
//!
//! Dropping the box detaches its realtime subscription and transport
//! listener; responses that arrive afterwards have nothing to update.

pub mod layout;
pub mod scroll;
pub mod timeline;

use std::collections::HashMap;
use std::time::Instant;

use bytes::Bytes;
use chrono::FixedOffset;
use tracing::{debug, error, info, warn};

use devconnect_net::Listener;
use devconnect_shared::{
    Chat, ChatId, DeliveryStatus, EventKind, Message, MessageBody, MessageId, OutgoingMessage,
    TransportEvent, UserId,
};
use devconnect_store::{
    now, ChangeFilter, ChangeKind, RealtimeSubscription, Record, RowChange, StoreError,
};

use crate::attachments::AttachmentUploader;
use crate::context::ChatContext;
use crate::error::{ClientError, Result};
use crate::events::{emit_event, toast_error, UiEvent};
use crate::render::{render, RenderedBody};
use crate::typing::{typing_label, TypingIndicator};

pub use layout::{annotate, RowLayout};
pub use scroll::{IncomingAction, ReadTracker};
pub use timeline::{Timeline, TimelineEntry};

/// Result of a send attempt. Failures leave a `Failed` row that can be
/// retried or discarded by its temporary id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent(MessageId),
    Failed(MessageId),
}

enum Incoming {
    Change(RowChange),
    Event(TransportEvent),
}

pub struct ChatBox {
    ctx: ChatContext,
    chat: Chat,
    names: HashMap<UserId, String>,
    timeline: Timeline,
    read: ReadTracker,
    typing: TypingIndicator,
    uploader: AttachmentUploader,
    feed: RealtimeSubscription,
    listener: Listener,
}

impl ChatBox {
    /// Open `chat_id` for the session user.
    ///
    /// Non-members and unknown chats get a [`UiEvent::Redirect`] and
    /// [`ClientError::AccessDenied`]. Opening marks the chat read.
    pub async fn open(ctx: ChatContext, chat_id: ChatId) -> Result<Self> {
        let me = ctx.me();
        let chat = match ctx.backend.get_chat(chat_id, me).await {
            Ok(chat) => chat,
            Err(StoreError::Forbidden(_)) | Err(StoreError::NotFound) => {
                warn!(chat = %chat_id, user = %me.short(), "Chat not accessible");
                emit_event(
                    &ctx.ui,
                    UiEvent::Redirect {
                        chat_id,
                        reason: "You do not have access to this chat".to_string(),
                    },
                );
                return Err(ClientError::AccessDenied(chat_id));
            }
            Err(e) => {
                toast_error(&ctx.ui, "Failed to load chat");
                return Err(e.into());
            }
        };

        let member_ids: Vec<UserId> = ctx
            .backend
            .chat_members(chat_id)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect();
        let names = ctx
            .backend
            .list_profiles(&member_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p.display_name))
            .collect();

        // Subscribe before fetching so rows written in between are not lost;
        // duplicates are absorbed by the id merge.
        let feed = ctx.backend.subscribe(ChangeFilter::messages_in(chat_id));
        let listener = ctx.transport.on(&EventKind::CHAT);

        let messages = match ctx.backend.fetch_messages(chat_id, me).await {
            Ok(messages) => messages,
            Err(e) => {
                ctx.transport.off(listener.id());
                toast_error(&ctx.ui, "Failed to load messages");
                return Err(e.into());
            }
        };

        let mut timeline = Timeline::new();
        timeline.load(messages, me);
        info!(chat = %chat_id, messages = timeline.len(), "Chat opened");

        let uploader = AttachmentUploader::new(
            ctx.backend.clone(),
            ctx.ui.clone(),
            ctx.config.max_upload_bytes,
        );
        let typing = TypingIndicator::new(ctx.config.typing_timeout);

        let mut chat_box = Self {
            ctx,
            chat,
            names,
            timeline,
            read: ReadTracker::default(),
            typing,
            uploader,
            feed,
            listener,
        };
        chat_box.mark_read().await?;
        Ok(chat_box)
    }

    fn me(&self) -> UserId {
        self.ctx.session.user_id
    }

    pub fn chat(&self) -> &Chat {
        &self.chat
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat.id
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn entries(&self) -> &[TimelineEntry] {
        self.timeline.entries()
    }

    pub fn unread_count(&self) -> u32 {
        self.read.unread()
    }

    pub fn banner_visible(&self) -> bool {
        self.read.banner_visible()
    }

    /// Row layout for the current list, dates taken in `offset`.
    pub fn layout(&self, offset: FixedOffset) -> Vec<RowLayout> {
        annotate(self.timeline.messages(), offset)
    }

    pub fn rendered(&self) -> Vec<RenderedBody> {
        self.timeline.messages().map(render).collect()
    }

    pub fn display_name(&self, user: UserId) -> &str {
        self.names.get(&user).map(String::as_str).unwrap_or("Someone")
    }

    // -- sending --

    /// Append an optimistic row and return its temporary id.
    pub fn begin_send(&mut self, body: MessageBody) -> Result<MessageId> {
        let empty = match &body {
            MessageBody::Text { content } | MessageBody::Code { content, .. } => {
                content.trim().is_empty()
            }
            MessageBody::Image { .. } | MessageBody::File { .. } => false,
        };
        if empty {
            return Err(ClientError::Invalid("message is empty".to_string()));
        }

        let temp_id = MessageId::new();
        let outgoing = OutgoingMessage {
            chat_id: self.chat.id,
            body,
        };
        self.timeline.push_pending(temp_id, self.me(), outgoing, now());
        debug!(chat = %self.chat.id, temp = %temp_id, "Optimistic row added");
        Ok(temp_id)
    }

    /// Persist a pending row. On success the row is replaced by the stored
    /// message at `Sent` and mirrored on the transport; on failure it stays
    /// as `Failed` and an error toast is raised.
    pub async fn complete_send(&mut self, temp_id: MessageId) -> Result<SendOutcome> {
        let outgoing = self
            .timeline
            .get(temp_id)
            .and_then(|e| e.outgoing.clone())
            .ok_or(ClientError::MessageNotFound(temp_id))?;

        match self.ctx.backend.insert_message(self.me(), &outgoing).await {
            Ok(stored) => {
                let id = stored.id;
                self.timeline.confirm(temp_id, stored.clone());
                info!(chat = %self.chat.id, msg = %id, "Message sent");
                self.broadcast(TransportEvent::NewMessage(stored)).await;
                Ok(SendOutcome::Sent(id))
            }
            Err(e) => {
                warn!(chat = %self.chat.id, temp = %temp_id, error = %e, "Send failed");
                self.timeline.fail(temp_id);
                toast_error(&self.ctx.ui, "Failed to send message");
                Ok(SendOutcome::Failed(temp_id))
            }
        }
    }

    pub async fn send(&mut self, body: MessageBody) -> Result<SendOutcome> {
        let temp_id = self.begin_send(body)?;
        self.complete_send(temp_id).await
    }

    pub async fn send_text(&mut self, text: &str) -> Result<SendOutcome> {
        self.send(MessageBody::text(text)).await
    }

    pub async fn send_code(&mut self, code: &str, language: Option<&str>) -> Result<SendOutcome> {
        self.send(MessageBody::code(code, language)).await
    }

    /// Upload an attachment, then send it like any other message. A failed
    /// upload adds no row.
    pub async fn send_attachment(
        &mut self,
        file_name: &str,
        mime_type: &str,
        data: Bytes,
        caption: &str,
    ) -> Result<SendOutcome> {
        let body = self
            .uploader
            .upload(file_name, mime_type, data, caption)
            .await?;
        self.send(body).await
    }

    /// Drop a failed row and send its original payload again.
    pub async fn retry(&mut self, temp_id: MessageId) -> Result<SendOutcome> {
        let outgoing = self
            .timeline
            .take_failed(temp_id)
            .ok_or(ClientError::NotRetryable(temp_id))?;
        debug!(temp = %temp_id, "Retrying send");
        self.send(outgoing.body).await
    }

    /// Remove a failed row without resending.
    pub fn discard(&mut self, temp_id: MessageId) -> bool {
        self.timeline.take_failed(temp_id).is_some()
    }

    // -- recall / delete --

    fn own_sent_message(&self, id: MessageId) -> Result<&TimelineEntry> {
        let entry = self
            .timeline
            .get(id)
            .ok_or(ClientError::MessageNotFound(id))?;
        if entry.message.sender_id != self.me() {
            return Err(ClientError::NotSender(id));
        }
        if entry.is_pending() {
            return Err(ClientError::Invalid(format!("message {id} was not sent")));
        }
        Ok(entry)
    }

    /// Soft-delete an own message for every viewer.
    pub async fn recall(&mut self, id: MessageId) -> Result<()> {
        self.own_sent_message(id)?;

        match self.ctx.backend.recall_message(id, self.me()).await {
            Ok(_) => {}
            Err(StoreError::Forbidden(_)) => return Err(ClientError::NotSender(id)),
            Err(e) => {
                toast_error(&self.ctx.ui, "Failed to recall message");
                return Err(e.into());
            }
        }

        self.timeline.mark_deleted(id);
        self.broadcast(TransportEvent::MessageRecalled {
            chat_id: self.chat.id,
            message_id: id,
        })
        .await;
        Ok(())
    }

    /// Remove an own message from the store and this list. Other viewers
    /// are not notified.
    pub async fn delete(&mut self, id: MessageId) -> Result<()> {
        self.own_sent_message(id)?;

        match self.ctx.backend.delete_message(id, self.me()).await {
            Ok(()) => {}
            Err(StoreError::Forbidden(_)) => return Err(ClientError::NotSender(id)),
            Err(e) => {
                toast_error(&self.ctx.ui, "Failed to delete message");
                return Err(e.into());
            }
        }

        self.timeline.remove(id);
        Ok(())
    }

    // -- read state --

    /// Move the read boundary to now, flag others' messages read, clear the
    /// banner and tell the senders.
    pub async fn mark_read(&mut self) -> Result<()> {
        let me = self.me();
        if let Err(e) = self.ctx.backend.mark_read(self.chat.id, me, now()).await {
            toast_error(&self.ctx.ui, "Failed to mark messages as read");
            return Err(e.into());
        }

        let flipped = self.timeline.mark_others_read(me);
        let had_banner = self.read.banner_visible() || self.read.unread() > 0;
        self.read.reset();
        if had_banner {
            emit_event(
                &self.ctx.ui,
                UiEvent::UnreadBanner {
                    chat_id: self.chat.id,
                    count: 0,
                    visible: false,
                },
            );
        }

        for message_id in flipped {
            self.broadcast(TransportEvent::MessageStatus {
                chat_id: self.chat.id,
                message_id,
                status: DeliveryStatus::Read,
            })
            .await;
        }
        Ok(())
    }

    /// Report the list's distance from the bottom in pixels.
    pub async fn on_scroll(&mut self, distance_from_bottom: f64) -> Result<()> {
        if self.read.on_scroll(distance_from_bottom) {
            self.mark_read().await?;
        }
        Ok(())
    }

    pub async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.read.scroll_to_bottom();
        self.mark_read().await
    }

    // -- typing --

    /// Composer keystroke. Non-empty input announces typing.
    pub async fn on_composer_input(&mut self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        self.broadcast(TransportEvent::Typing {
            chat_id: self.chat.id,
            user_id: self.me(),
        })
        .await;
    }

    pub fn typing_users(&self, at: Instant) -> Vec<UserId> {
        self.typing.typing_users(self.chat.id, at)
    }

    /// When the typing line next needs re-rendering, if anyone is shown.
    pub fn typing_expiry(&self) -> Option<Instant> {
        self.typing.next_expiry(self.chat.id)
    }

    pub fn typing_label(&self, at: Instant) -> Option<String> {
        let names: Vec<&str> = self
            .typing_users(at)
            .into_iter()
            .map(|u| self.display_name(u))
            .collect();
        typing_label(&names)
    }

    // -- live events --

    /// Merge every queued event. Returns how many changed the view.
    pub async fn sync(&mut self) -> usize {
        let mut changed = 0;
        loop {
            let incoming = match self.feed.try_recv() {
                Some(change) => Incoming::Change(change),
                None => match self.listener.try_recv() {
                    Some(event) => Incoming::Event(event),
                    None => break,
                },
            };
            if self.apply(incoming).await {
                changed += 1;
            }
        }
        changed
    }

    /// Wait for the next live event and merge it. Returns whether it changed
    /// the view, or `None` once both sources are closed.
    pub async fn next_event(&mut self) -> Option<bool> {
        let incoming = tokio::select! {
            Some(change) = self.feed.recv() => Incoming::Change(change),
            Some(event) = self.listener.recv() => Incoming::Event(event),
            else => return None,
        };
        Some(self.apply(incoming).await)
    }

    async fn apply(&mut self, incoming: Incoming) -> bool {
        match incoming {
            Incoming::Change(change) => self.apply_change(change).await,
            Incoming::Event(event) => self.apply_event(event).await,
        }
    }

    async fn apply_change(&mut self, change: RowChange) -> bool {
        let Record::Message(message) = change.record else {
            return false;
        };
        if message.chat_id != self.chat.id {
            return false;
        }
        match change.kind {
            ChangeKind::Insert => self.on_new_message(message).await,
            ChangeKind::Update => self.timeline.replace(message),
        }
    }

    async fn apply_event(&mut self, event: TransportEvent) -> bool {
        if event.chat_id() != Some(self.chat.id) {
            return false;
        }
        let me = self.me();
        match event {
            TransportEvent::NewMessage(message) => {
                if self.timeline.get(message.id).is_some() {
                    return false;
                }
                match self.stored_copy(message.id).await {
                    Some(stored) => self.on_new_message(stored).await,
                    None => false,
                }
            }
            TransportEvent::MessageStatus {
                message_id, status, ..
            } => match self.timeline.get(message_id) {
                Some(entry) if entry.message.sender_id == me => {
                    self.timeline.advance_status(message_id, status)
                }
                _ => false,
            },
            TransportEvent::MessageRecalled { message_id, .. } => {
                if self.timeline.get(message_id).is_none() {
                    return false;
                }
                match self.stored_copy(message_id).await {
                    Some(stored) if stored.is_deleted => self.timeline.mark_deleted(message_id),
                    _ => {
                        warn!(chat = %self.chat.id, msg = %message_id, "Ignoring unconfirmed recall");
                        false
                    }
                }
            }
            typing @ TransportEvent::Typing { .. } => {
                self.typing.on_event(&typing, me, Instant::now())
            }
            TransportEvent::UserOnline { .. } | TransportEvent::UserOffline { .. } => false,
        }
    }

    /// Transport payloads are unauthenticated; only the store copy of a
    /// message in this chat is trusted.
    async fn stored_copy(&self, id: MessageId) -> Option<Message> {
        match self.ctx.backend.get_message(id, self.me()).await {
            Ok(stored) if stored.chat_id == self.chat.id => Some(stored),
            Ok(_) => None,
            Err(e) => {
                debug!(chat = %self.chat.id, msg = %id, error = %e, "Dropping unconfirmed event");
                None
            }
        }
    }

    async fn on_new_message(&mut self, message: Message) -> bool {
        let own = message.sender_id == self.me();
        let sender = message.sender_id;
        let message_id = message.id;

        let status = own.then_some(DeliveryStatus::Sent);
        if !self.timeline.merge(message, status) {
            return false;
        }
        if own {
            return true;
        }

        debug!(chat = %self.chat.id, msg = %message_id, "Incoming message");
        self.typing.clear(self.chat.id, sender);
        self.broadcast(TransportEvent::MessageStatus {
            chat_id: self.chat.id,
            message_id,
            status: DeliveryStatus::Delivered,
        })
        .await;

        match self.read.on_incoming() {
            IncomingAction::MarkRead => {
                if let Err(e) = self.mark_read().await {
                    warn!(chat = %self.chat.id, error = %e, "Auto mark-read failed");
                }
            }
            IncomingAction::ShowBanner { count } => emit_event(
                &self.ctx.ui,
                UiEvent::UnreadBanner {
                    chat_id: self.chat.id,
                    count,
                    visible: true,
                },
            ),
        }
        true
    }

    async fn broadcast(&self, event: TransportEvent) {
        let kind = event.kind();
        if let Err(e) = self.ctx.transport.emit(event).await {
            error!(chat = %self.chat.id, event = kind.as_str(), error = %e, "Failed to emit event");
        }
    }
}

impl Drop for ChatBox {
    fn drop(&mut self) {
        self.ctx.transport.off(self.listener.id());
        self.typing.clear_chat(self.chat.id);
        debug!(chat = %self.chat.id, "Chat closed");
    }
}

#[cfg(test)]
mod tests {
    use devconnect_store::{ChatBackend, NewChat};

    use super::*;
    use crate::events::ToastLevel;
    use crate::testing::Fixture;

    async fn group(fx: &Fixture, a: &ChatContext, b: &ChatContext) -> ChatId {
        fx.backend
            .create_chat(NewChat::group(a.me(), Some("devs".into()), vec![b.me()]))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn send_failure_then_retry() {
        let fx = Fixture::new().await;
        let (alice, mut ui) = fx.user("Alice").await;
        let (bob, _) = fx.user("Bob").await;
        let chat = group(&fx, &alice, &bob).await;
        let mut chat_box = ChatBox::open(alice.clone(), chat).await.unwrap();

        // Membership revoked behind the open view: the insert is rejected.
        fx.backend.leave_chat(chat, alice.me()).await.unwrap();
        let outcome = chat_box.send_text("are you there?").await.unwrap();
        let SendOutcome::Failed(temp) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(chat_box.entries()[0].status, Some(DeliveryStatus::Failed));
        assert!(matches!(
            ui.try_recv().unwrap(),
            UiEvent::Toast { level: ToastLevel::Error, .. }
        ));

        fx.backend.add_member(chat, alice.me()).await.unwrap();
        let SendOutcome::Sent(id) = chat_box.retry(temp).await.unwrap() else {
            panic!("retry should succeed");
        };
        assert_eq!(chat_box.entries().len(), 1);
        assert_eq!(chat_box.entries()[0].id(), id);
        assert_eq!(chat_box.entries()[0].message.body, MessageBody::text("are you there?"));
        assert!(matches!(chat_box.retry(id).await, Err(ClientError::NotRetryable(_))));
    }

    #[tokio::test]
    async fn discard_removes_failed_row() {
        let fx = Fixture::new().await;
        let (alice, _ui) = fx.user("Alice").await;
        let (bob, _) = fx.user("Bob").await;
        let chat = group(&fx, &alice, &bob).await;
        let mut chat_box = ChatBox::open(alice.clone(), chat).await.unwrap();

        fx.backend.leave_chat(chat, alice.me()).await.unwrap();
        let SendOutcome::Failed(temp) = chat_box.send_text("lost").await.unwrap() else {
            panic!("expected failure");
        };
        assert!(chat_box.discard(temp));
        assert!(chat_box.entries().is_empty());
    }

    #[tokio::test]
    async fn non_member_is_redirected() {
        let fx = Fixture::new().await;
        let (alice, _) = fx.user("Alice").await;
        let (bob, _) = fx.user("Bob").await;
        let (mallory, mut ui) = fx.user("Mallory").await;
        let chat = group(&fx, &alice, &bob).await;

        let result = ChatBox::open(mallory, chat).await;
        assert!(matches!(result, Err(ClientError::AccessDenied(id)) if id == chat));
        assert!(matches!(ui.try_recv().unwrap(), UiEvent::Redirect { chat_id, .. } if chat_id == chat));
    }

    #[tokio::test]
    async fn only_sender_can_recall_or_delete() {
        let fx = Fixture::new().await;
        let (alice, _) = fx.user("Alice").await;
        let (bob, _) = fx.user("Bob").await;
        let chat = group(&fx, &alice, &bob).await;
        let mut alice_box = ChatBox::open(alice.clone(), chat).await.unwrap();
        let mut bob_box = ChatBox::open(bob.clone(), chat).await.unwrap();

        let SendOutcome::Sent(id) = alice_box.send_text("mine").await.unwrap() else {
            panic!("send failed");
        };
        bob_box.sync().await;

        assert!(matches!(bob_box.recall(id).await, Err(ClientError::NotSender(_))));
        assert!(matches!(bob_box.delete(id).await, Err(ClientError::NotSender(_))));

        alice_box.delete(id).await.unwrap();
        assert!(alice_box.entries().is_empty());
        // Hard delete is not broadcast: Bob still renders the row.
        bob_box.sync().await;
        assert_eq!(bob_box.entries().len(), 1);
    }

    #[tokio::test]
    async fn recall_needs_the_stored_row_deleted() {
        let fx = Fixture::new().await;
        let (alice, _) = fx.user("Alice").await;
        let (bob, _) = fx.user("Bob").await;
        let chat = group(&fx, &alice, &bob).await;
        let mut alice_box = ChatBox::open(alice.clone(), chat).await.unwrap();

        let SendOutcome::Sent(id) = alice_box.send_text("mine").await.unwrap() else {
            panic!("send failed");
        };
        alice_box.sync().await;

        // Bob cannot recall, but can still push the event by hand.
        bob.transport
            .emit(TransportEvent::MessageRecalled {
                chat_id: chat,
                message_id: id,
            })
            .await
            .unwrap();
        alice_box.sync().await;

        assert!(!alice_box.timeline().get(id).unwrap().message.is_deleted);
        assert!(!fx.backend.get_message(id, alice.me()).await.unwrap().is_deleted);
    }

    #[tokio::test]
    async fn pushed_message_must_exist_in_store() {
        let fx = Fixture::new().await;
        let (alice, _) = fx.user("Alice").await;
        let (bob, _) = fx.user("Bob").await;
        let chat = group(&fx, &alice, &bob).await;
        let mut alice_box = ChatBox::open(alice.clone(), chat).await.unwrap();

        let forged = Message {
            id: MessageId::new(),
            chat_id: chat,
            sender_id: alice.me(),
            body: MessageBody::text("I owe Bob 100 euros"),
            is_deleted: false,
            is_read: false,
            created_at: now(),
        };
        bob.transport
            .emit(TransportEvent::NewMessage(forged))
            .await
            .unwrap();
        alice_box.sync().await;
        assert!(alice_box.entries().is_empty());

        // A real message pushed the same way is merged from the store copy.
        let outgoing = OutgoingMessage {
            chat_id: chat,
            body: MessageBody::text("real"),
        };
        let stored = fx.backend.insert_message(bob.me(), &outgoing).await.unwrap();
        let mut tampered = stored.clone();
        tampered.body = MessageBody::text("tampered");
        bob.transport
            .emit(TransportEvent::NewMessage(tampered))
            .await
            .unwrap();
        alice_box.sync().await;
        assert_eq!(alice_box.entries().len(), 1);
        assert_eq!(alice_box.entries()[0].message.body, MessageBody::text("real"));
    }

    #[tokio::test]
    async fn typing_is_shown_to_others() {
        let fx = Fixture::new().await;
        let (alice, _) = fx.user("Alice").await;
        let (bob, _) = fx.user("Bob").await;
        let chat = group(&fx, &alice, &bob).await;
        let mut alice_box = ChatBox::open(alice.clone(), chat).await.unwrap();
        let mut bob_box = ChatBox::open(bob.clone(), chat).await.unwrap();

        alice_box.on_composer_input("").await;
        alice_box.on_composer_input("h").await;
        bob_box.sync().await;
        alice_box.sync().await;

        let now = Instant::now();
        assert_eq!(bob_box.typing_label(now).as_deref(), Some("Alice is typing..."));
        assert_eq!(alice_box.typing_label(now), None);
        assert_eq!(alice_box.typing_expiry(), None);

        let expiry = bob_box.typing_expiry().unwrap();
        assert!(expiry <= now + alice.config.typing_timeout);
        assert_eq!(bob_box.typing_label(expiry), None);
    }

    #[tokio::test]
    async fn statuses_follow_delivery_and_read() {
        let fx = Fixture::new().await;
        let (alice, _) = fx.user("Alice").await;
        let (bob, _) = fx.user("Bob").await;
        let chat = group(&fx, &alice, &bob).await;
        let mut alice_box = ChatBox::open(alice.clone(), chat).await.unwrap();
        let mut bob_box = ChatBox::open(bob.clone(), chat).await.unwrap();

        let SendOutcome::Sent(id) = alice_box.send_text("ping").await.unwrap() else {
            panic!("send failed");
        };
        // Bob is at the bottom: delivered, then read.
        bob_box.sync().await;
        alice_box.sync().await;

        assert_eq!(alice_box.timeline().get(id).unwrap().status, Some(DeliveryStatus::Read));
        assert_eq!(fx.backend.unread_count(chat, bob.me()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dropping_detaches_listener() {
        let fx = Fixture::new().await;
        let (alice, _) = fx.user("Alice").await;
        let (bob, _) = fx.user("Bob").await;
        let chat = group(&fx, &alice, &bob).await;

        let chat_box = ChatBox::open(alice.clone(), chat).await.unwrap();
        let subscribers = fx.backend.realtime().subscriber_count();
        drop(chat_box);
        assert_eq!(fx.backend.realtime().subscriber_count(), subscribers - 1);
    }
}
