//! Chat membership rows. Membership gates every chat read and write.

use chrono::{DateTime, Utc};
use rusqlite::params;

use devconnect_shared::{ChatId, ChatMember, UserId};

use crate::database::{not_found, parse_ts, parse_uuid, ts, Database};
use crate::error::Result;

impl Database {
    /// Add `user` to `chat`. Adding an existing member is a no-op.
    pub fn add_member(&self, chat: ChatId, user: UserId, joined_at: DateTime<Utc>) -> Result<()> {
        self.conn().execute(
            "INSERT OR IGNORE INTO chat_members (chat_id, user_id, joined_at, last_read_at)
             VALUES (?1, ?2, ?3, NULL)",
            params![chat.to_string(), user.to_string(), ts(&joined_at)],
        )?;
        Ok(())
    }

    pub fn remove_member(&self, chat: ChatId, user: UserId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM chat_members WHERE chat_id = ?1 AND user_id = ?2",
            params![chat.to_string(), user.to_string()],
        )?;
        Ok(affected > 0)
    }

    pub fn is_member(&self, chat: ChatId, user: UserId) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM chat_members WHERE chat_id = ?1 AND user_id = ?2",
            params![chat.to_string(), user.to_string()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn get_member(&self, chat: ChatId, user: UserId) -> Result<ChatMember> {
        self.conn()
            .query_row(
                "SELECT chat_id, user_id, joined_at, last_read_at
                 FROM chat_members WHERE chat_id = ?1 AND user_id = ?2",
                params![chat.to_string(), user.to_string()],
                row_to_member,
            )
            .map_err(not_found)
    }

    /// Members of `chat` in join order.
    pub fn list_members(&self, chat: ChatId) -> Result<Vec<ChatMember>> {
        let mut stmt = self.conn().prepare(
            "SELECT chat_id, user_id, joined_at, last_read_at
             FROM chat_members WHERE chat_id = ?1
             ORDER BY joined_at ASC, user_id ASC",
        )?;
        let rows = stmt.query_map(params![chat.to_string()], row_to_member)?;

        let mut members = Vec::new();
        for row in rows {
            members.push(row?);
        }
        Ok(members)
    }

    /// Move the unread boundary of `user` in `chat` to `at`.
    pub fn set_last_read(&self, chat: ChatId, user: UserId, at: DateTime<Utc>) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE chat_members SET last_read_at = ?1 WHERE chat_id = ?2 AND user_id = ?3",
            params![ts(&at), chat.to_string(), user.to_string()],
        )?;
        Ok(affected > 0)
    }
}

fn row_to_member(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatMember> {
    let chat_str: String = row.get(0)?;
    let user_str: String = row.get(1)?;
    let joined_str: String = row.get(2)?;
    let last_read_str: Option<String> = row.get(3)?;

    Ok(ChatMember {
        chat_id: parse_uuid(0, &chat_str)?,
        user_id: parse_uuid(1, &user_str)?,
        joined_at: parse_ts(2, &joined_str)?,
        last_read_at: last_read_str.map(|s| parse_ts(3, &s)).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use devconnect_shared::{Chat, ChatKind};

    use super::*;
    use crate::database::now;

    fn setup() -> (Database, ChatId) {
        let db = Database::open_in_memory().unwrap();
        let at = now();
        let chat = Chat {
            id: ChatId::new(),
            kind: ChatKind::Group,
            name: Some("team".to_string()),
            creator_id: UserId::new(),
            created_at: at,
            updated_at: at,
        };
        db.create_chat(&chat, None).unwrap();
        (db, chat.id)
    }

    #[test]
    fn membership_round_trip() {
        let (db, chat) = setup();
        let user = UserId::new();

        assert!(!db.is_member(chat, user).unwrap());
        db.add_member(chat, user, now()).unwrap();
        db.add_member(chat, user, now()).unwrap();
        assert!(db.is_member(chat, user).unwrap());
        assert_eq!(db.list_members(chat).unwrap().len(), 1);

        assert!(db.remove_member(chat, user).unwrap());
        assert!(!db.is_member(chat, user).unwrap());
    }

    #[test]
    fn last_read_is_recorded() {
        let (db, chat) = setup();
        let user = UserId::new();
        db.add_member(chat, user, now()).unwrap();
        assert!(db.get_member(chat, user).unwrap().last_read_at.is_none());

        let at = now();
        assert!(db.set_last_read(chat, user, at).unwrap());
        assert_eq!(db.get_member(chat, user).unwrap().last_read_at, Some(at));
    }
}
