use rusqlite::{params, OptionalExtension};

use devconnect_shared::{BodyColumns, ChatId, Message, MessageBody, MessageId, MessageKind, UserId};

use crate::database::{conversion_err, not_found, parse_ts, parse_uuid, ts, Database};
use crate::error::Result;

const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, content, type, language, file_url, \
                               file_name, file_size, is_deleted, is_read, created_at";

impl Database {
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        let columns = message.body.to_columns();
        self.conn().execute(
            "INSERT INTO messages (id, chat_id, sender_id, content, type, language, file_url,
                                   file_name, file_size, is_deleted, is_read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                message.id.to_string(),
                message.chat_id.to_string(),
                message.sender_id.to_string(),
                columns.content,
                columns.kind.as_str(),
                columns.language,
                columns.file_url,
                columns.file_name,
                columns.file_size.map(|s| s as i64),
                message.is_deleted as i32,
                message.is_read as i32,
                ts(&message.created_at),
            ],
        )?;
        Ok(())
    }

    /// Every message of a chat, oldest first.
    pub fn get_messages_for_chat(&self, chat: ChatId) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {MESSAGE_COLUMNS}
             FROM messages
             WHERE chat_id = ?1
             ORDER BY created_at ASC, id ASC"
        ))?;

        let rows = stmt.query_map(params![chat.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    pub fn get_message_by_id(&self, id: MessageId) -> Result<Message> {
        self.conn()
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .map_err(not_found)
    }

    /// Newest message of a chat, if any.
    pub fn last_message(&self, chat: ChatId) -> Result<Option<Message>> {
        let message = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages
                     WHERE chat_id = ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1"
                ),
                params![chat.to_string()],
                row_to_message,
            )
            .optional()?;
        Ok(message)
    }

    /// Soft delete: the row stays, `is_deleted` hides its body.
    pub fn recall_message(&self, id: MessageId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET is_deleted = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    pub fn delete_message(&self, id: MessageId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM messages WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Mark every unread message in `chat` not sent by `reader` as read.
    /// Returns the number of rows flipped.
    pub fn mark_chat_read(&self, chat: ChatId, reader: UserId) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE messages SET is_read = 1
             WHERE chat_id = ?1 AND sender_id != ?2 AND is_read = 0",
            params![chat.to_string(), reader.to_string()],
        )?;
        Ok(affected)
    }

    /// Messages from other senders newer than the member's `last_read_at`.
    /// A member who never read the chat has every such message unread.
    pub fn count_unread(&self, chat: ChatId, user: UserId) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM messages m
             WHERE m.chat_id = ?1
               AND m.sender_id != ?2
               AND m.created_at > COALESCE(
                   (SELECT last_read_at FROM chat_members
                    WHERE chat_id = ?1 AND user_id = ?2),
                   '')",
            params![chat.to_string(), user.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let chat_str: String = row.get(1)?;
    let sender_str: String = row.get(2)?;
    let content: String = row.get(3)?;
    let kind_str: String = row.get(4)?;
    let language: Option<String> = row.get(5)?;
    let file_url: Option<String> = row.get(6)?;
    let file_name: Option<String> = row.get(7)?;
    let file_size: Option<i64> = row.get(8)?;
    let is_deleted: i32 = row.get(9)?;
    let is_read: i32 = row.get(10)?;
    let created_str: String = row.get(11)?;

    let kind = MessageKind::parse(&kind_str).map_err(|e| conversion_err(4, e))?;
    let body = MessageBody::from_columns(BodyColumns {
        kind,
        content,
        language,
        file_url,
        file_name,
        file_size: file_size.map(|s| s.max(0) as u64),
    })
    .map_err(|e| conversion_err(3, e))?;

    Ok(Message {
        id: parse_uuid(0, &id_str)?,
        chat_id: parse_uuid(1, &chat_str)?,
        sender_id: parse_uuid(2, &sender_str)?,
        body,
        is_deleted: is_deleted != 0,
        is_read: is_read != 0,
        created_at: parse_ts(11, &created_str)?,
    })
}
