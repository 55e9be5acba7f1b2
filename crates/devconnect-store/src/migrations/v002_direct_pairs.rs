//! v002 -- One direct chat per unordered member pair, plus read receipts.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Sorted "low:high" user pair; NULL for groups
ALTER TABLE chats ADD COLUMN direct_pair TEXT;

CREATE UNIQUE INDEX IF NOT EXISTS idx_chats_direct_pair
    ON chats(direct_pair) WHERE direct_pair IS NOT NULL;

ALTER TABLE messages ADD COLUMN is_read INTEGER NOT NULL DEFAULT 0;
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
