use std::collections::HashMap;

use plaza_core::participant::Profile;

/// External profile-lookup collaborator: resolves a verified user id to a
/// display profile.
pub trait ProfileDirectory: Send + Sync {
    fn profile(&self, user_id: &str) -> Option<Profile>;
}

/// In-process profile directory. In permissive mode, unknown users get a
/// profile derived from their id, which keeps a fresh deployment usable
/// before an account service is wired in.
pub struct StaticProfiles {
    entries: HashMap<String, Profile>,
    allow_unknown: bool,
}

impl StaticProfiles {
    pub fn permissive() -> Self {
        Self {
            entries: HashMap::new(),
            allow_unknown: true,
        }
    }

    /// Unknown users are refused, which refuses their join.
    pub fn strict() -> Self {
        Self {
            entries: HashMap::new(),
            allow_unknown: false,
        }
    }

    pub fn insert(&mut self, user_id: impl Into<String>, profile: Profile) {
        self.entries.insert(user_id.into(), profile);
    }
}

impl ProfileDirectory for StaticProfiles {
    fn profile(&self, user_id: &str) -> Option<Profile> {
        if let Some(profile) = self.entries.get(user_id) {
            return Some(profile.clone());
        }
        self.allow_unknown.then(|| Profile {
            username: user_id.to_string(),
            avatar: None,
        })
    }
}
