//! In-memory credential store
//!
//! A [`CredentialStore`] implementation backed by `RwLock`-guarded maps,
//! suitable for tests and single-instance deployments. Multi-instance
//! deployments should implement the trait over a shared document store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use unichat_core::{
    CredentialStore, Result, SessionPatch, SessionRecord, UserPatch, UserRecord,
};
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    sessions: HashMap<String, SessionRecord>,
}

/// In-memory credential store
#[derive(Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Inner>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total stored session records, across all users
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_email_or_username(&self, needle: &str) -> Result<Option<UserRecord>> {
        let needle = needle.to_lowercase();
        let inner = self.inner.read().await;

        let matches = |u: &&UserRecord| {
            u.username.to_lowercase() == needle || u.email.to_lowercase() == needle
        };

        // Prefer an active record; a deactivated namesake may coexist
        let user = inner
            .users
            .values()
            .filter(matches)
            .find(|u| u.is_active)
            .or_else(|| inner.users.values().find(matches))
            .cloned();

        Ok(user)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<UserRecord>> {
        Ok(self.inner.read().await.users.get(id).cloned())
    }

    async fn insert_user(&self, mut user: UserRecord) -> Result<String> {
        if user.id.is_empty() {
            user.id = Uuid::new_v4().to_string();
        }
        let id = user.id.clone();
        self.inner.write().await.users.insert(id.clone(), user);
        Ok(id)
    }

    async fn update_user(&self, id: &str, patch: UserPatch) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(user) = inner.users.get_mut(id) else {
            return Ok(false);
        };

        if let Some(last_login) = patch.last_login {
            user.last_login = Some(last_login);
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        if let Some(is_active) = patch.is_active {
            user.is_active = is_active;
        }

        Ok(true)
    }

    async fn find_sessions_by_user(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<SessionRecord> = inner
            .sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();

        // Newest first
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    async fn delete_sessions(&self, ids: &[String]) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, s| !ids.contains(&s.id));
        Ok((before - inner.sessions.len()) as u64)
    }

    async fn insert_session(&self, session: SessionRecord) -> Result<()> {
        self.inner
            .write()
            .await
            .sessions
            .insert(session.token.clone(), session);
        Ok(())
    }

    async fn find_session(&self, token: &str) -> Result<Option<SessionRecord>> {
        Ok(self.inner.read().await.sessions.get(token).cloned())
    }

    async fn update_session(&self, token: &str, patch: SessionPatch) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let Some(session) = inner.sessions.get_mut(token) else {
            return Ok(false);
        };

        let mut changed = false;
        if let Some(is_active) = patch.is_active {
            if session.is_active != is_active {
                session.is_active = is_active;
                changed = true;
            }
        }
        if let Some(logout_at) = patch.logout_at {
            if changed {
                session.logout_at = Some(logout_at);
            }
        }

        Ok(changed)
    }

    async fn delete_expired_sessions(&self, before: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let count = inner.sessions.len();
        inner.sessions.retain(|_, s| s.expires_at > before);
        Ok((count - inner.sessions.len()) as u64)
    }
}
