//! v001 -- Initial schema creation.
//!
//! Creates the four chat tables: `profiles`, `chats`, `chat_members` and
//! `messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID
    display_name TEXT NOT NULL,
    avatar_url   TEXT,
    created_at   TEXT NOT NULL                -- RFC-3339, UTC, micros
);

-- ----------------------------------------------------------------
-- Chats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chats (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID
    kind       TEXT NOT NULL,                 -- 'direct' | 'group'
    name       TEXT,                          -- groups only
    creator_id TEXT NOT NULL,                 -- FK -> profiles(id)
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chats_updated ON chats(updated_at DESC);

-- ----------------------------------------------------------------
-- Chat members
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_members (
    chat_id      TEXT NOT NULL,               -- FK -> chats(id)
    user_id      TEXT NOT NULL,               -- FK -> profiles(id)
    joined_at    TEXT NOT NULL,
    last_read_at TEXT,                        -- unread boundary

    PRIMARY KEY (chat_id, user_id),
    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chat_members_user ON chat_members(user_id);

-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID
    chat_id    TEXT NOT NULL,                 -- FK -> chats(id)
    sender_id  TEXT NOT NULL,                 -- FK -> profiles(id)
    content    TEXT NOT NULL,
    type       TEXT NOT NULL,                 -- 'text' | 'code' | 'image' | 'file'
    language   TEXT,
    file_url   TEXT,
    file_name  TEXT,
    file_size  INTEGER,
    is_deleted INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    created_at TEXT NOT NULL,

    FOREIGN KEY (chat_id) REFERENCES chats(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_chat_ts
    ON messages(chat_id, created_at ASC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
