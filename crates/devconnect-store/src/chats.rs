//! CRUD operations for [`Chat`] records.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use devconnect_shared::{Chat, ChatId, ChatKind, UserId};

use crate::database::{conversion_err, not_found, parse_ts, parse_uuid, ts, Database};
use crate::error::Result;

const CHAT_COLUMNS: &str = "c.id, c.kind, c.name, c.creator_id, c.created_at, c.updated_at";

/// Order-independent key of a direct chat between `a` and `b`.
pub fn direct_pair(a: UserId, b: UserId) -> String {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    format!("{low}:{high}")
}

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new chat. Direct chats carry their member pair so the
    /// unique index rejects a second chat for the same two users.
    pub fn create_chat(&self, chat: &Chat, pair: Option<&str>) -> Result<()> {
        self.conn().execute(
            "INSERT INTO chats (id, kind, name, creator_id, created_at, updated_at, direct_pair)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                chat.id.to_string(),
                chat.kind.as_str(),
                chat.name,
                chat.creator_id.to_string(),
                ts(&chat.created_at),
                ts(&chat.updated_at),
                pair,
            ],
        )?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single chat by id.
    pub fn get_chat(&self, id: ChatId) -> Result<Chat> {
        self.conn()
            .query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats c WHERE c.id = ?1"),
                params![id.to_string()],
                row_to_chat,
            )
            .map_err(not_found)
    }

    /// Chats `user` belongs to, most recently active first.
    pub fn list_chats_for_user(&self, user: UserId) -> Result<Vec<Chat>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {CHAT_COLUMNS}
             FROM chats c
             JOIN chat_members m ON m.chat_id = c.id
             WHERE m.user_id = ?1
             ORDER BY c.updated_at DESC"
        ))?;

        let rows = stmt.query_map(params![user.to_string()], row_to_chat)?;

        let mut chats = Vec::new();
        for row in rows {
            chats.push(row?);
        }
        Ok(chats)
    }

    /// Ids of every chat `user` belongs to.
    pub fn chat_ids_for_user(&self, user: UserId) -> Result<Vec<ChatId>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT chat_id FROM chat_members WHERE user_id = ?1")?;
        let rows = stmt.query_map(params![user.to_string()], |row| {
            let id: String = row.get(0)?;
            parse_uuid::<ChatId>(0, &id)
        })?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    /// The oldest direct chat whose members include both `a` and `b`.
    ///
    /// Matches on membership rather than `direct_pair`, so rows created
    /// before the pair column existed are found too.
    pub fn find_direct_chat(&self, a: UserId, b: UserId) -> Result<Option<Chat>> {
        let chat = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {CHAT_COLUMNS}
                     FROM chats c
                     JOIN chat_members ma ON ma.chat_id = c.id AND ma.user_id = ?1
                     JOIN chat_members mb ON mb.chat_id = c.id AND mb.user_id = ?2
                     WHERE c.kind = 'direct'
                     ORDER BY c.created_at ASC
                     LIMIT 1"
                ),
                params![a.to_string(), b.to_string()],
                row_to_chat,
            )
            .optional()?;
        Ok(chat)
    }

    /// Look a direct chat up by its stored pair key.
    pub fn get_chat_by_pair(&self, pair: &str) -> Result<Chat> {
        self.conn()
            .query_row(
                &format!("SELECT {CHAT_COLUMNS} FROM chats c WHERE c.direct_pair = ?1"),
                params![pair],
                row_to_chat,
            )
            .map_err(not_found)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Bump `updated_at`, used whenever a message is posted.
    pub fn touch_chat(&self, id: ChatId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE chats SET updated_at = ?1 WHERE id = ?2 AND updated_at < ?1",
            params![ts(&at), id.to_string()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a chat; members and messages cascade.
    pub fn delete_chat(&self, id: ChatId) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM chats WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to a [`Chat`].
fn row_to_chat(row: &rusqlite::Row<'_>) -> rusqlite::Result<Chat> {
    let id_str: String = row.get(0)?;
    let kind_str: String = row.get(1)?;
    let name: Option<String> = row.get(2)?;
    let creator_str: String = row.get(3)?;
    let created_str: String = row.get(4)?;
    let updated_str: String = row.get(5)?;

    let kind = ChatKind::parse(&kind_str).ok_or_else(|| {
        conversion_err(
            1,
            std::io::Error::new(std::io::ErrorKind::InvalidData, format!("chat kind {kind_str}")),
        )
    })?;

    Ok(Chat {
        id: parse_uuid(0, &id_str)?,
        kind,
        name,
        creator_id: parse_uuid(3, &creator_str)?,
        created_at: parse_ts(4, &created_str)?,
        updated_at: parse_ts(5, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::now;
    use crate::error::StoreError;

    fn chat(kind: ChatKind, creator: UserId) -> Chat {
        let at = now();
        Chat {
            id: ChatId::new(),
            kind,
            name: (kind == ChatKind::Group).then(|| "rustaceans".to_string()),
            creator_id: creator,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn direct_pair_is_order_independent() {
        let a = UserId::new();
        let b = UserId::new();
        assert_eq!(direct_pair(a, b), direct_pair(b, a));
    }

    #[test]
    fn create_and_get() {
        let db = Database::open_in_memory().unwrap();
        let group = chat(ChatKind::Group, UserId::new());
        db.create_chat(&group, None).unwrap();
        assert_eq!(db.get_chat(group.id).unwrap(), group);
        assert!(matches!(db.get_chat(ChatId::new()), Err(StoreError::NotFound)));
    }

    #[test]
    fn second_direct_chat_for_pair_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let a = UserId::new();
        let b = UserId::new();
        let pair = direct_pair(a, b);

        db.create_chat(&chat(ChatKind::Direct, a), Some(&pair)).unwrap();
        assert!(db.create_chat(&chat(ChatKind::Direct, b), Some(&pair)).is_err());
        assert_eq!(db.get_chat_by_pair(&pair).unwrap().creator_id, a);
    }

    #[test]
    fn touch_only_moves_forward() {
        let db = Database::open_in_memory().unwrap();
        let group = chat(ChatKind::Group, UserId::new());
        db.create_chat(&group, None).unwrap();

        let later = group.updated_at + chrono::Duration::seconds(10);
        assert!(db.touch_chat(group.id, later).unwrap());
        assert!(!db.touch_chat(group.id, group.updated_at).unwrap());
        assert_eq!(db.get_chat(group.id).unwrap().updated_at, later);
    }
}
