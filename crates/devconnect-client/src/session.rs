use devconnect_shared::{Profile, UserId};

/// The signed-in user, as supplied by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

impl Session {
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            avatar_url: None,
        }
    }

    pub fn to_profile(&self) -> Profile {
        Profile {
            id: self.user_id,
            display_name: self.display_name.clone(),
            avatar_url: self.avatar_url.clone(),
            created_at: devconnect_store::now(),
        }
    }
}

impl From<&Profile> for Session {
    fn from(profile: &Profile) -> Self {
        Self {
            user_id: profile.id,
            display_name: profile.display_name.clone(),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}
