//! CRUD operations for [`Profile`] records.

use rusqlite::params;

use devconnect_shared::{Profile, UserId};

use crate::database::{not_found, parse_ts, parse_uuid, ts, Database};
use crate::error::Result;

impl Database {
    /// Insert a profile or update its display fields.
    pub fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.conn().execute(
            "INSERT INTO profiles (id, display_name, avatar_url, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                avatar_url = excluded.avatar_url",
            params![
                profile.id.to_string(),
                profile.display_name,
                profile.avatar_url,
                ts(&profile.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn get_profile(&self, id: UserId) -> Result<Profile> {
        self.conn()
            .query_row(
                "SELECT id, display_name, avatar_url, created_at
                 FROM profiles WHERE id = ?1",
                params![id.to_string()],
                row_to_profile,
            )
            .map_err(not_found)
    }

    /// Fetch the profiles that exist among `ids`; unknown ids are skipped.
    pub fn list_profiles(&self, ids: &[UserId]) -> Result<Vec<Profile>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, display_name, avatar_url, created_at
             FROM profiles WHERE id = ?1",
        )?;

        let mut profiles = Vec::with_capacity(ids.len());
        for id in ids {
            let mut rows = stmt.query_map(params![id.to_string()], row_to_profile)?;
            if let Some(row) = rows.next() {
                profiles.push(row?);
            }
        }
        Ok(profiles)
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    let id_str: String = row.get(0)?;
    let display_name: String = row.get(1)?;
    let avatar_url: Option<String> = row.get(2)?;
    let created_str: String = row.get(3)?;

    Ok(Profile {
        id: parse_uuid(0, &id_str)?,
        display_name,
        avatar_url,
        created_at: parse_ts(3, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::now;
    use crate::error::StoreError;

    fn profile(name: &str) -> Profile {
        Profile {
            id: UserId::new(),
            display_name: name.to_string(),
            avatar_url: None,
            created_at: now(),
        }
    }

    #[test]
    fn upsert_updates_display_name() {
        let db = Database::open_in_memory().unwrap();
        let mut alice = profile("Alice");
        db.upsert_profile(&alice).unwrap();

        alice.display_name = "Alice L.".to_string();
        alice.avatar_url = Some("http://cdn/alice.png".to_string());
        db.upsert_profile(&alice).unwrap();

        let stored = db.get_profile(alice.id).unwrap();
        assert_eq!(stored.display_name, "Alice L.");
        assert_eq!(stored.avatar_url.as_deref(), Some("http://cdn/alice.png"));
    }

    #[test]
    fn list_skips_unknown() {
        let db = Database::open_in_memory().unwrap();
        let bob = profile("Bob");
        db.upsert_profile(&bob).unwrap();

        let listed = db.list_profiles(&[bob.id, UserId::new()]).unwrap();
        assert_eq!(listed, vec![bob]);
        assert!(matches!(db.get_profile(UserId::new()), Err(StoreError::NotFound)));
    }
}
