//! Chat list view-model.
//!
//! [`ChatSidebar`] holds one [`SidebarEntry`] per chat the session user
//! belongs to and keeps previews, unread counts and ordering current from
//! the realtime feed. Pin, mute and archive are local to this instance and
//! reset on reload.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use devconnect_net::Listener;
use devconnect_shared::constants::PREVIEW_MAX_CHARS;
use devconnect_shared::{
    Chat, ChatId, ChatKind, EventKind, Message, MessageBody, TransportEvent, UserId,
};
use devconnect_store::{
    ChangeFilter, ChangeKind, NewChat, RealtimeSubscription, Record, RowChange, Table,
};

use crate::context::ChatContext;
use crate::error::{ClientError, Result};
use crate::events::toast_error;
use crate::presence::PresenceTracker;
use crate::render::deleted_placeholder;

const UNKNOWN_USER: &str = "Unknown user";
const UNNAMED_GROUP: &str = "Group chat";
const NO_MESSAGES: &str = "No messages yet";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChatFilter {
    #[default]
    All,
    Unread,
    Direct,
    Group,
}

impl ChatFilter {
    pub fn matches(&self, entry: &SidebarEntry) -> bool {
        match self {
            Self::All => true,
            Self::Unread => entry.unread > 0,
            Self::Direct => entry.chat.kind == ChatKind::Direct,
            Self::Group => entry.chat.kind == ChatKind::Group,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarEntry {
    pub chat: Chat,
    pub display_name: String,
    pub preview: String,
    pub last_message: Option<Message>,
    pub unread: u64,
    /// The other member of a direct chat.
    pub counterpart: Option<UserId>,
    pub member_ids: Vec<UserId>,
    pub pinned: bool,
    pub muted: bool,
    pub archived: bool,
}

impl SidebarEntry {
    fn matches_search(&self, needle: &str) -> bool {
        if self.display_name.to_lowercase().contains(needle)
            || self.preview.to_lowercase().contains(needle)
        {
            return true;
        }
        self.last_message
            .as_ref()
            .filter(|m| !m.is_deleted)
            .is_some_and(|m| m.body.content().to_lowercase().contains(needle))
    }

    /// Replace the preview unless `message` is older than the one shown.
    /// Updates to the shown message always apply.
    fn set_last_message(&mut self, message: Message) -> bool {
        let newer = match &self.last_message {
            Some(current) if current.id == message.id => current != &message,
            Some(current) => message.created_at >= current.created_at,
            None => true,
        };
        if !newer {
            return false;
        }
        self.preview = preview(Some(&message));
        if message.created_at > self.chat.updated_at {
            self.chat.updated_at = message.created_at;
        }
        self.last_message = Some(message);
        true
    }
}

/// Name shown for a chat: the other member of a direct chat; for a group
/// its name, else the other members' names in alphabetical order.
pub fn chat_display_name(
    chat: &Chat,
    member_ids: &[UserId],
    me: UserId,
    names: &HashMap<UserId, String>,
) -> String {
    let mut others: Vec<&str> = member_ids
        .iter()
        .filter(|id| **id != me)
        .map(|id| names.get(id).map(String::as_str).unwrap_or(UNKNOWN_USER))
        .collect();

    match chat.kind {
        ChatKind::Direct => others.first().copied().unwrap_or(UNKNOWN_USER).to_string(),
        ChatKind::Group => match chat.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ if !others.is_empty() => {
                others.sort_unstable();
                others.join(", ")
            }
            _ => UNNAMED_GROUP.to_string(),
        },
    }
}

/// One-line summary of the last message.
pub fn preview(last: Option<&Message>) -> String {
    let Some(message) = last else {
        return NO_MESSAGES.to_string();
    };
    if message.is_deleted {
        return deleted_placeholder(message.kind()).to_string();
    }
    match &message.body {
        MessageBody::Text { content } => truncate(content.trim(), PREVIEW_MAX_CHARS),
        MessageBody::Code { .. } => "[Code]".to_string(),
        MessageBody::Image { .. } => "[Image]".to_string(),
        MessageBody::File { attachment } => format!("[File] {}", attachment.name),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub struct ChatSidebar {
    ctx: ChatContext,
    entries: HashMap<ChatId, SidebarEntry>,
    names: HashMap<UserId, String>,
    presence: PresenceTracker,
    messages: RealtimeSubscription,
    memberships: RealtimeSubscription,
    listener: Listener,
    filter: ChatFilter,
    search: String,
    show_archived: bool,
}

impl ChatSidebar {
    pub async fn load(ctx: ChatContext) -> Result<Self> {
        let messages = ctx.backend.subscribe(ChangeFilter::table(Table::Messages));
        let memberships = ctx.backend.subscribe(ChangeFilter::table(Table::ChatMembers));
        let listener = ctx.transport.on(&EventKind::PRESENCE);
        let presence = PresenceTracker::new(ctx.config.presence_ttl);

        let mut sidebar = Self {
            ctx,
            entries: HashMap::new(),
            names: HashMap::new(),
            presence,
            messages,
            memberships,
            listener,
            filter: ChatFilter::All,
            search: String::new(),
            show_archived: false,
        };
        sidebar.refresh().await?;
        Ok(sidebar)
    }

    fn me(&self) -> UserId {
        self.ctx.session.user_id
    }

    /// Rebuild every entry from the backend, keeping local flags.
    pub async fn refresh(&mut self) -> Result<()> {
        let chats = match self.ctx.backend.list_chats(self.me()).await {
            Ok(chats) => chats,
            Err(e) => {
                toast_error(&self.ctx.ui, "Failed to load chats");
                return Err(e.into());
            }
        };

        let mut entries = HashMap::with_capacity(chats.len());
        for chat in chats {
            let id = chat.id;
            let mut entry = self.build_entry(chat).await?;
            if let Some(old) = self.entries.get(&id) {
                entry.pinned = old.pinned;
                entry.muted = old.muted;
                entry.archived = old.archived;
            }
            entries.insert(id, entry);
        }
        self.entries = entries;
        info!(chats = self.entries.len(), "Chat list loaded");
        Ok(())
    }

    async fn build_entry(&mut self, chat: Chat) -> Result<SidebarEntry> {
        let me = self.me();
        let backend = self.ctx.backend.clone();

        let member_ids: Vec<UserId> = backend
            .chat_members(chat.id)
            .await?
            .into_iter()
            .map(|m| m.user_id)
            .collect();

        let missing: Vec<UserId> = member_ids
            .iter()
            .copied()
            .filter(|id| !self.names.contains_key(id))
            .collect();
        if !missing.is_empty() {
            for profile in backend.list_profiles(&missing).await? {
                self.names.insert(profile.id, profile.display_name);
            }
        }

        let last_message = backend.last_message(chat.id).await?;
        let unread = backend.unread_count(chat.id, me).await?;
        let counterpart = match chat.kind {
            ChatKind::Direct => member_ids.iter().copied().find(|id| *id != me),
            ChatKind::Group => None,
        };

        Ok(SidebarEntry {
            display_name: chat_display_name(&chat, &member_ids, me, &self.names),
            preview: preview(last_message.as_ref()),
            last_message,
            unread,
            counterpart,
            member_ids,
            chat,
            pinned: false,
            muted: false,
            archived: false,
        })
    }

    /// Reload one chat's entry, adding it if new.
    async fn reload_entry(&mut self, chat_id: ChatId) -> Result<()> {
        let chat = self.ctx.backend.get_chat(chat_id, self.me()).await?;
        let mut entry = self.build_entry(chat).await?;
        if let Some(old) = self.entries.get(&chat_id) {
            entry.pinned = old.pinned;
            entry.muted = old.muted;
            entry.archived = old.archived;
        }
        self.entries.insert(chat_id, entry);
        Ok(())
    }

    // -- queries --

    pub fn entry(&self, chat_id: ChatId) -> Option<&SidebarEntry> {
        self.entries.get(&chat_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries passing the filter, search and archive rules, pinned first
    /// then most recently active.
    pub fn visible(&self) -> Vec<&SidebarEntry> {
        let needle = self.search.trim().to_lowercase();
        let mut rows: Vec<&SidebarEntry> = self
            .entries
            .values()
            .filter(|e| self.show_archived || !e.archived)
            .filter(|e| self.filter.matches(e))
            .filter(|e| needle.is_empty() || e.matches_search(&needle))
            .collect();
        rows.sort_by_key(|e| (Reverse(e.pinned), Reverse(e.chat.updated_at), e.chat.id));
        rows
    }

    /// Unread messages across chats that are not muted.
    pub fn total_unread(&self) -> u64 {
        self.entries
            .values()
            .filter(|e| !e.muted)
            .map(|e| e.unread)
            .sum()
    }

    /// Whether the counterpart of a direct chat is online.
    pub fn is_online(&self, chat_id: ChatId, now: Instant) -> bool {
        self.entries
            .get(&chat_id)
            .and_then(|e| e.counterpart)
            .is_some_and(|user| self.presence.is_online(user, now))
    }

    /// Users currently seen online, sorted.
    pub fn online_users(&self, now: Instant) -> Vec<UserId> {
        self.presence.online_users(now)
    }

    pub fn filter(&self) -> ChatFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: ChatFilter) {
        self.filter = filter;
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
    }

    pub fn set_show_archived(&mut self, show: bool) {
        self.show_archived = show;
    }

    // -- local flags --

    fn toggle<F>(&mut self, chat_id: ChatId, flag: F) -> Option<bool>
    where
        F: FnOnce(&mut SidebarEntry) -> &mut bool,
    {
        let entry = self.entries.get_mut(&chat_id)?;
        let value = flag(entry);
        *value = !*value;
        Some(*value)
    }

    pub fn toggle_pin(&mut self, chat_id: ChatId) -> Option<bool> {
        self.toggle(chat_id, |e| &mut e.pinned)
    }

    pub fn toggle_mute(&mut self, chat_id: ChatId) -> Option<bool> {
        self.toggle(chat_id, |e| &mut e.muted)
    }

    pub fn toggle_archive(&mut self, chat_id: ChatId) -> Option<bool> {
        self.toggle(chat_id, |e| &mut e.archived)
    }

    // -- creation --

    /// Open the direct chat with `target`, creating it only if the pair has
    /// none yet.
    pub async fn start_direct_chat(&mut self, target: UserId) -> Result<ChatId> {
        let me = self.me();
        if target == me {
            return Err(ClientError::Invalid(
                "cannot start a direct chat with yourself".to_string(),
            ));
        }

        let backend = self.ctx.backend.clone();
        let existing = match backend.find_direct_chat(me, target).await {
            Ok(existing) => existing,
            Err(e) => {
                toast_error(&self.ctx.ui, "Failed to start chat");
                return Err(e.into());
            }
        };
        let chat = match existing {
            Some(chat) => {
                debug!(chat = %chat.id, "Reusing direct chat");
                chat
            }
            // A concurrent creation by the other side is resolved by the
            // store's unique pair index.
            None => match backend.create_chat(NewChat::direct(me, target)).await {
                Ok(chat) => chat,
                Err(e) => {
                    toast_error(&self.ctx.ui, "Failed to start chat");
                    return Err(e.into());
                }
            },
        };

        self.reload_entry(chat.id).await?;
        Ok(chat.id)
    }

    pub async fn create_group_chat(
        &mut self,
        name: &str,
        members: Vec<UserId>,
    ) -> Result<ChatId> {
        let me = self.me();
        if !members.iter().any(|m| *m != me) {
            return Err(ClientError::Invalid(
                "a group needs at least one other member".to_string(),
            ));
        }
        let name = Some(name.trim().to_string()).filter(|n| !n.is_empty());

        let chat = match self
            .ctx
            .backend
            .create_chat(NewChat::group(me, name, members))
            .await
        {
            Ok(chat) => chat,
            Err(e) => {
                toast_error(&self.ctx.ui, "Failed to create group");
                return Err(e.into());
            }
        };
        info!(chat = %chat.id, "Group chat created");

        self.reload_entry(chat.id).await?;
        Ok(chat.id)
    }

    // -- live events --

    /// Merge every queued change and presence event. Returns how many
    /// changed the list.
    pub async fn sync(&mut self) -> usize {
        let mut changed = 0;
        while let Some(change) = self.messages.try_recv() {
            changed += usize::from(self.apply_change(change).await);
        }
        while let Some(change) = self.memberships.try_recv() {
            changed += usize::from(self.apply_change(change).await);
        }
        while let Some(event) = self.listener.try_recv() {
            changed += usize::from(self.apply_event(&event));
        }
        self.presence.prune(Instant::now());
        changed
    }

    /// Wait for the next live event and merge it. `None` once every source
    /// is closed.
    pub async fn next_event(&mut self) -> Option<bool> {
        tokio::select! {
            Some(change) = self.messages.recv() => Some(self.apply_change(change).await),
            Some(change) = self.memberships.recv() => Some(self.apply_change(change).await),
            Some(event) = self.listener.recv() => Some(self.apply_event(&event)),
            else => None,
        }
    }

    fn apply_event(&mut self, event: &TransportEvent) -> bool {
        let now = Instant::now();
        self.presence.prune(now);
        self.presence.apply(event, now)
    }

    async fn apply_change(&mut self, change: RowChange) -> bool {
        let me = self.me();
        match (change.kind, change.record) {
            (ChangeKind::Insert, Record::Message(message)) => {
                let chat = message.chat_id;
                let from_other = message.sender_id != me;
                let Some(entry) = self.entries.get_mut(&chat) else {
                    return false;
                };
                let moved = entry.set_last_message(message);
                // The store count already includes rows a reload picked up.
                let recounted = from_other && self.recount_unread(chat).await;
                moved || recounted
            }
            (ChangeKind::Update, Record::Message(message)) => {
                let Some(entry) = self.entries.get_mut(&message.chat_id) else {
                    return false;
                };
                if entry.last_message.as_ref().map(|m| m.id) != Some(message.id) {
                    return false;
                }
                entry.set_last_message(message)
            }
            (ChangeKind::Insert, Record::ChatMember(member)) => {
                if member.user_id != me && !self.entries.contains_key(&member.chat_id) {
                    return false;
                }
                match self.reload_entry(member.chat_id).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(chat = %member.chat_id, error = %e, "Failed to load chat");
                        false
                    }
                }
            }
            (ChangeKind::Update, Record::ChatMember(member)) if member.user_id == me => {
                self.recount_unread(member.chat_id).await
            }
            _ => false,
        }
    }

    /// Reload the unread count of `chat` from the store. Returns whether it
    /// changed; on failure the old count is kept.
    async fn recount_unread(&mut self, chat: ChatId) -> bool {
        let me = self.me();
        let unread = match self.ctx.backend.unread_count(chat, me).await {
            Ok(unread) => unread,
            Err(e) => {
                warn!(chat = %chat, error = %e, "Failed to refresh unread count");
                return false;
            }
        };
        let Some(entry) = self.entries.get_mut(&chat) else {
            return false;
        };
        let changed = entry.unread != unread;
        entry.unread = unread;
        changed
    }
}

impl Drop for ChatSidebar {
    fn drop(&mut self) {
        self.ctx.transport.off(self.listener.id());
    }
}
