//! Per-user presence with multi-session support.
//!
//! Presence is per-**user**, not per-connection: `user:joined` fires when a
//! user's first session appears, `user:left` when their last one closes.

use dashmap::DashMap;

use crate::auth::Identity;

struct OnlineUser {
    username: String,
    session_count: usize,
}

pub struct PresenceRegistry {
    inner: DashMap<i64, OnlineUser>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// Register a session coming online. Returns true when this is the
    /// user's first live session (the caller broadcasts `user:joined`).
    pub fn set_online(&self, identity: &Identity) -> bool {
        let mut entry = self
            .inner
            .entry(identity.user_id)
            .or_insert_with(|| OnlineUser {
                username: identity.username.clone(),
                session_count: 0,
            });
        entry.session_count += 1;
        entry.session_count == 1
    }

    /// Register a session going away. Returns the username when this was the
    /// user's last session (the caller broadcasts `user:left`).
    pub fn remove_session(&self, user_id: i64) -> Option<String> {
        let username = {
            let mut entry = self.inner.get_mut(&user_id)?;
            entry.session_count = entry.session_count.saturating_sub(1);
            if entry.session_count > 0 {
                return None;
            }
            entry.username.clone()
        };
        self.inner.remove(&user_id);
        Some(username)
    }

    pub fn is_online(&self, user_id: i64) -> bool {
        self.inner.contains_key(&user_id)
    }

    pub fn online_count(&self) -> usize {
        self.inner.len()
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(user_id: i64, username: &str) -> Identity {
        Identity {
            user_id,
            username: username.to_string(),
        }
    }

    #[test]
    fn first_session_reports_joined() {
        let presence = PresenceRegistry::new();
        assert!(presence.set_online(&identity(1, "alice")));
        assert!(presence.is_online(1));
    }

    #[test]
    fn second_session_is_silent() {
        let presence = PresenceRegistry::new();
        assert!(presence.set_online(&identity(1, "alice")));
        assert!(!presence.set_online(&identity(1, "alice")));
    }

    #[test]
    fn offline_only_after_last_session() {
        let presence = PresenceRegistry::new();
        presence.set_online(&identity(1, "alice"));
        presence.set_online(&identity(1, "alice"));

        assert_eq!(presence.remove_session(1), None);
        assert!(presence.is_online(1));

        assert_eq!(presence.remove_session(1), Some("alice".to_string()));
        assert!(!presence.is_online(1));
    }

    #[test]
    fn remove_unknown_user_is_noop() {
        let presence = PresenceRegistry::new();
        assert_eq!(presence.remove_session(99), None);
    }
}
