//! The backend contract consumed by the chat view-models.
//!
//! [`ChatBackend`] is the query / storage / realtime surface of the hosted
//! platform. [`LocalBackend`] implements it over a [`Database`], a
//! [`BucketStore`] and a [`RealtimeHub`], enforcing the row-level rules the
//! platform would enforce server-side:
//!
//! - chat reads and message inserts require membership
//! - recall and hard delete are sender-only
//! - a direct chat has exactly two members, and one chat per pair
//!
//! Message inserts bump the chat's `updated_at` and publish an `INSERT`,
//! recalls and read-marks publish an `UPDATE`. Hard deletes publish nothing.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use devconnect_shared::{
    Chat, ChatId, ChatKind, ChatMember, Message, MessageId, OutgoingMessage, Profile, UserId,
};

use crate::buckets::{BucketStore, StoredObject};
use crate::chats::direct_pair;
use crate::database::{now, Database};
use crate::error::{Result, StoreError};
use crate::realtime::{ChangeFilter, ChangeKind, RealtimeHub, RealtimeSubscription, Record};

/// Parameters of a chat creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChat {
    pub kind: ChatKind,
    pub name: Option<String>,
    pub creator_id: UserId,
    /// Members besides the creator.
    pub members: Vec<UserId>,
}

impl NewChat {
    pub fn direct(creator_id: UserId, other: UserId) -> Self {
        Self {
            kind: ChatKind::Direct,
            name: None,
            creator_id,
            members: vec![other],
        }
    }

    pub fn group(creator_id: UserId, name: Option<String>, members: Vec<UserId>) -> Self {
        Self {
            kind: ChatKind::Group,
            name,
            creator_id,
            members,
        }
    }

    /// Creator first, then the other members, without duplicates.
    fn all_members(&self) -> Vec<UserId> {
        let mut all = vec![self.creator_id];
        for member in &self.members {
            if !all.contains(member) {
                all.push(*member);
            }
        }
        all
    }
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    // -- profiles --

    async fn get_profile(&self, id: UserId) -> Result<Profile>;

    async fn list_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>>;

    async fn upsert_profile(&self, profile: &Profile) -> Result<()>;

    // -- chats --

    /// Chats `user` belongs to, most recently active first.
    async fn list_chats(&self, user: UserId) -> Result<Vec<Chat>>;

    async fn chat_ids_for_user(&self, user: UserId) -> Result<Vec<ChatId>>;

    /// Fetch a chat on behalf of `requester`; non-members get `Forbidden`.
    async fn get_chat(&self, chat: ChatId, requester: UserId) -> Result<Chat>;

    async fn chat_members(&self, chat: ChatId) -> Result<Vec<ChatMember>>;

    async fn find_direct_chat(&self, a: UserId, b: UserId) -> Result<Option<Chat>>;

    /// Create a chat. For a direct chat whose pair already has one, the
    /// existing chat is returned instead.
    async fn create_chat(&self, new_chat: NewChat) -> Result<Chat>;

    /// Add `user` to a group chat. Returns false if already a member.
    async fn add_member(&self, chat: ChatId, user: UserId) -> Result<bool>;

    async fn leave_chat(&self, chat: ChatId, user: UserId) -> Result<bool>;

    // -- messages --

    /// Every message of `chat`, oldest first.
    async fn fetch_messages(&self, chat: ChatId, requester: UserId) -> Result<Vec<Message>>;

    async fn last_message(&self, chat: ChatId) -> Result<Option<Message>>;

    /// A single stored message, readable by members of its chat.
    async fn get_message(&self, id: MessageId, requester: UserId) -> Result<Message>;

    /// Persist a message; the store assigns `id` and `created_at`.
    async fn insert_message(&self, sender: UserId, outgoing: &OutgoingMessage) -> Result<Message>;

    /// Soft-delete a message. Sender only.
    async fn recall_message(&self, id: MessageId, requester: UserId) -> Result<Message>;

    /// Remove a message row. Sender only.
    async fn delete_message(&self, id: MessageId, requester: UserId) -> Result<()>;

    /// Move the reader's boundary to `at` and flag others' messages read.
    async fn mark_read(&self, chat: ChatId, reader: UserId, at: DateTime<Utc>) -> Result<usize>;

    async fn unread_count(&self, chat: ChatId, user: UserId) -> Result<u64>;

    // -- storage --

    async fn upload(&self, bucket: &str, file_name: &str, data: Bytes) -> Result<StoredObject>;

    // -- realtime --

    fn subscribe(&self, filter: ChangeFilter) -> RealtimeSubscription;
}

/// [`ChatBackend`] backed by the local SQLite store.
#[derive(Clone)]
pub struct LocalBackend {
    db: Arc<Mutex<Database>>,
    buckets: BucketStore,
    realtime: RealtimeHub,
}

impl LocalBackend {
    pub fn new(db: Database, buckets: BucketStore) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            buckets,
            realtime: RealtimeHub::new(),
        }
    }

    pub fn realtime(&self) -> &RealtimeHub {
        &self.realtime
    }

    pub fn buckets(&self) -> &BucketStore {
        &self.buckets
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn require_member(db: &Database, chat: ChatId, user: UserId) -> Result<()> {
        if db.is_member(chat, user)? {
            Ok(())
        } else {
            Err(StoreError::Forbidden(format!(
                "user {} is not a member of chat {chat}",
                user.short()
            )))
        }
    }

    fn require_sender(message: &Message, requester: UserId) -> Result<()> {
        if message.sender_id == requester {
            Ok(())
        } else {
            Err(StoreError::Forbidden(format!(
                "only the sender may modify message {}",
                message.id
            )))
        }
    }

    /// Insert the chat and its members inside one transaction.
    /// Returns the chat plus whether it was newly created.
    fn create_chat_locked(db: &Database, new_chat: &NewChat) -> Result<(Chat, Vec<ChatMember>, bool)> {
        let members = new_chat.all_members();

        let pair = match new_chat.kind {
            ChatKind::Direct => {
                if members.len() != 2 {
                    return Err(StoreError::Invalid(format!(
                        "a direct chat needs exactly two members, got {}",
                        members.len()
                    )));
                }
                Some(direct_pair(members[0], members[1]))
            }
            ChatKind::Group => None,
        };

        let tx = db.conn().unchecked_transaction()?;

        if new_chat.kind == ChatKind::Direct {
            if let Some(existing) = db.find_direct_chat(members[0], members[1])? {
                return Ok((existing, Vec::new(), false));
            }
        }

        let at = now();
        let chat = Chat {
            id: ChatId::new(),
            kind: new_chat.kind,
            name: match new_chat.kind {
                ChatKind::Group => new_chat
                    .name
                    .as_ref()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
                ChatKind::Direct => None,
            },
            creator_id: new_chat.creator_id,
            created_at: at,
            updated_at: at,
        };

        match db.create_chat(&chat, pair.as_deref()) {
            Ok(()) => {}
            Err(StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                // Another writer created the pair between lookup and insert.
                let pair = pair.unwrap_or_default();
                return Ok((db.get_chat_by_pair(&pair)?, Vec::new(), false));
            }
            Err(e) => return Err(e),
        }

        let mut rows = Vec::with_capacity(members.len());
        for user in members {
            db.add_member(chat.id, user, at)?;
            rows.push(ChatMember {
                chat_id: chat.id,
                user_id: user,
                joined_at: at,
                last_read_at: None,
            });
        }

        tx.commit()?;
        Ok((chat, rows, true))
    }
}

#[async_trait]
impl ChatBackend for LocalBackend {
    async fn get_profile(&self, id: UserId) -> Result<Profile> {
        self.db()?.get_profile(id)
    }

    async fn list_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>> {
        self.db()?.list_profiles(ids)
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.db()?.upsert_profile(profile)
    }

    async fn list_chats(&self, user: UserId) -> Result<Vec<Chat>> {
        self.db()?.list_chats_for_user(user)
    }

    async fn chat_ids_for_user(&self, user: UserId) -> Result<Vec<ChatId>> {
        self.db()?.chat_ids_for_user(user)
    }

    async fn get_chat(&self, chat: ChatId, requester: UserId) -> Result<Chat> {
        let db = self.db()?;
        let found = db.get_chat(chat)?;
        Self::require_member(&db, chat, requester)?;
        Ok(found)
    }

    async fn chat_members(&self, chat: ChatId) -> Result<Vec<ChatMember>> {
        self.db()?.list_members(chat)
    }

    async fn find_direct_chat(&self, a: UserId, b: UserId) -> Result<Option<Chat>> {
        self.db()?.find_direct_chat(a, b)
    }

    async fn create_chat(&self, new_chat: NewChat) -> Result<Chat> {
        let (chat, members, created) = {
            let db = self.db()?;
            Self::create_chat_locked(&db, &new_chat)?
        };

        if created {
            info!(chat = %chat.id, kind = %chat.kind, members = members.len(), "chat created");
            self.realtime
                .publish(ChangeKind::Insert, Record::Chat(chat.clone()));
            for member in members {
                self.realtime
                    .publish(ChangeKind::Insert, Record::ChatMember(member));
            }
        } else {
            debug!(chat = %chat.id, "reusing existing direct chat");
        }
        Ok(chat)
    }

    async fn add_member(&self, chat: ChatId, user: UserId) -> Result<bool> {
        let member = {
            let db = self.db()?;
            let found = db.get_chat(chat)?;
            if db.is_member(chat, user)? {
                return Ok(false);
            }
            if found.kind == ChatKind::Direct {
                return Err(StoreError::Invalid(
                    "members cannot be added to a direct chat".to_string(),
                ));
            }
            db.add_member(chat, user, now())?;
            db.get_member(chat, user)?
        };

        info!(chat = %chat, user = %user.short(), "member added");
        self.realtime
            .publish(ChangeKind::Insert, Record::ChatMember(member));
        Ok(true)
    }

    async fn leave_chat(&self, chat: ChatId, user: UserId) -> Result<bool> {
        let left = self.db()?.remove_member(chat, user)?;
        if left {
            info!(chat = %chat, user = %user.short(), "member left");
        }
        Ok(left)
    }

    async fn fetch_messages(&self, chat: ChatId, requester: UserId) -> Result<Vec<Message>> {
        let db = self.db()?;
        Self::require_member(&db, chat, requester)?;
        db.get_messages_for_chat(chat)
    }

    async fn last_message(&self, chat: ChatId) -> Result<Option<Message>> {
        self.db()?.last_message(chat)
    }

    async fn get_message(&self, id: MessageId, requester: UserId) -> Result<Message> {
        let db = self.db()?;
        let message = db.get_message_by_id(id)?;
        Self::require_member(&db, message.chat_id, requester)?;
        Ok(message)
    }

    async fn insert_message(&self, sender: UserId, outgoing: &OutgoingMessage) -> Result<Message> {
        let message = {
            let db = self.db()?;
            Self::require_member(&db, outgoing.chat_id, sender)?;

            let message = Message {
                id: MessageId::new(),
                chat_id: outgoing.chat_id,
                sender_id: sender,
                body: outgoing.body.clone(),
                is_deleted: false,
                is_read: false,
                created_at: now(),
            };
            db.insert_message(&message)?;
            db.touch_chat(message.chat_id, message.created_at)?;
            message
        };

        debug!(msg = %message.id, chat = %message.chat_id, kind = %message.kind(), "message stored");
        self.realtime
            .publish(ChangeKind::Insert, Record::Message(message.clone()));
        Ok(message)
    }

    async fn recall_message(&self, id: MessageId, requester: UserId) -> Result<Message> {
        let recalled = {
            let db = self.db()?;
            let message = db.get_message_by_id(id)?;
            Self::require_sender(&message, requester)?;
            db.recall_message(id)?;
            db.get_message_by_id(id)?
        };

        info!(msg = %id, chat = %recalled.chat_id, "message recalled");
        self.realtime
            .publish(ChangeKind::Update, Record::Message(recalled.clone()));
        Ok(recalled)
    }

    async fn delete_message(&self, id: MessageId, requester: UserId) -> Result<()> {
        let db = self.db()?;
        let message = db.get_message_by_id(id)?;
        Self::require_sender(&message, requester)?;
        db.delete_message(id)?;
        info!(msg = %id, chat = %message.chat_id, "message deleted");
        Ok(())
    }

    async fn mark_read(&self, chat: ChatId, reader: UserId, at: DateTime<Utc>) -> Result<usize> {
        let (flipped, member) = {
            let db = self.db()?;
            if !db.set_last_read(chat, reader, at)? {
                return Err(StoreError::Forbidden(format!(
                    "user {} is not a member of chat {chat}",
                    reader.short()
                )));
            }
            let flipped = db.mark_chat_read(chat, reader)?;
            (flipped, db.get_member(chat, reader)?)
        };

        self.realtime
            .publish(ChangeKind::Update, Record::ChatMember(member));
        Ok(flipped)
    }

    async fn unread_count(&self, chat: ChatId, user: UserId) -> Result<u64> {
        self.db()?.count_unread(chat, user)
    }

    async fn upload(&self, bucket: &str, file_name: &str, data: Bytes) -> Result<StoredObject> {
        self.buckets.upload(bucket, file_name, &data).await
    }

    fn subscribe(&self, filter: ChangeFilter) -> RealtimeSubscription {
        self.realtime.subscribe(filter)
    }
}
