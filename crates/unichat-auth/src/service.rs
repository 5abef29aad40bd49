//! Authentication service layer
//!
//! Business logic for user registration, login, token issuance and
//! verification, logout, and session housekeeping. Persistence goes through
//! the [`CredentialStore`] collaborator; this layer never touches a concrete
//! database.

use crate::jwt::{decode_token, encode_token, Claims, TokenError};
use crate::password::{hash_password, verify_password};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use unichat_core::{
    AuthConfig, AuthenticatedUser, CoreError, CredentialStore, KycProfile, SessionRecord,
    UserRecord,
};
use uuid::Uuid;

/// Authentication errors
///
/// `InvalidCredentials` deliberately covers both unknown-user and
/// wrong-password: the caller-facing message must not allow account
/// enumeration. The distinction is logged internally.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("An account with this email already exists")]
    DuplicateUser,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired token")]
    TokenInvalid(#[from] TokenError),

    #[error("User not found")]
    NotFound,

    #[error("Registration data is incomplete")]
    IncompleteProfile,

    #[error("Failed to hash password: {0}")]
    Hashing(String),

    #[error("Storage unavailable: {0}")]
    Storage(String),
}

impl From<CoreError> for AuthError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound(_) => AuthError::NotFound,
            other => AuthError::Storage(other.to_string()),
        }
    }
}

/// Authentication service
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    config: AuthConfig,
}

impl AuthService {
    /// Create a new authentication service over a credential store
    pub fn new(store: Arc<dyn CredentialStore>, config: AuthConfig) -> Self {
        Self { store, config }
    }

    /// The credential store this service persists through
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// Register a new user from completed KYC data
    ///
    /// Rejects with [`AuthError::DuplicateUser`] when an active account
    /// already holds the email. A second call after a successful first one
    /// is therefore rejected, which is the desired behavior.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Id of the newly created user
    pub async fn register_user(
        &self,
        profile: &KycProfile,
        session_id: &str,
    ) -> Result<String, AuthError> {
        let email = profile
            .email
            .as_deref()
            .ok_or(AuthError::IncompleteProfile)?;
        let password = profile
            .password
            .as_deref()
            .ok_or(AuthError::IncompleteProfile)?;
        let name = profile.name.as_deref().ok_or(AuthError::IncompleteProfile)?;
        let mobile = profile
            .mobile
            .as_deref()
            .ok_or(AuthError::IncompleteProfile)?;
        let faculty = profile
            .faculty
            .as_deref()
            .ok_or(AuthError::IncompleteProfile)?;

        let email = email.trim().to_lowercase();

        if let Some(existing) = self.store.find_user_by_email_or_username(&email).await? {
            if existing.is_active {
                tracing::info!(email = %email, "registration rejected, account exists");
                return Err(AuthError::DuplicateUser);
            }
        }

        let password_hash =
            hash_password(password).map_err(|e| AuthError::Hashing(e.to_string()))?;

        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            // Email doubles as the login name
            username: email.clone(),
            email,
            password_hash,
            name: name.trim().to_string(),
            mobile: mobile.trim().to_string(),
            faculty: faculty.trim().to_string(),
            role: "user".to_string(),
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
            session_id: session_id.to_string(),
        };

        let user_id = self.store.insert_user(user).await?;
        tracing::info!(user_id = %user_id, "registered new user");

        Ok(user_id)
    }

    /// Authenticate with username or email plus password
    ///
    /// On success updates the last-login timestamp, issues a token, and
    /// returns the sanitized user view with the token attached.
    pub async fn authenticate(
        &self,
        username_or_email: &str,
        password: &str,
        session_id: &str,
    ) -> Result<(String, AuthenticatedUser), AuthError> {
        let needle = username_or_email.trim().to_lowercase();

        let user = match self.store.find_user_by_email_or_username(&needle).await? {
            Some(user) if user.is_active => user,
            Some(_) => {
                tracing::debug!(login = %needle, "login rejected, account deactivated");
                return Err(AuthError::InvalidCredentials);
            }
            None => {
                tracing::debug!(login = %needle, "login rejected, no such account");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !verify_password(password, &user.password_hash) {
            tracing::debug!(user_id = %user.id, "login rejected, password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        // Last-login failure is not fatal to the login itself
        if let Err(e) = self
            .store
            .update_user(
                &user.id,
                unichat_core::UserPatch {
                    last_login: Some(now),
                    ..Default::default()
                },
            )
            .await
        {
            tracing::warn!(user_id = %user.id, "failed to update last login: {e}");
        }

        let token = self.issue_token(&user, session_id).await?;

        let mut view = user.to_view();
        view.session_id = session_id.to_string();
        view.token = Some(token.clone());

        tracing::info!(user_id = %user.id, "user authenticated");
        Ok((token, view))
    }

    /// Issue a signed token and persist its session record
    ///
    /// Old session records beyond the configured retention are pruned
    /// before the insert, so `retention + 1` records survive in total
    /// including the new one.
    pub async fn issue_token(
        &self,
        user: &UserRecord,
        session_id: &str,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims::for_user(user, session_id, now, self.config.token_ttl_hours);
        let token = encode_token(&self.config.jwt_secret, &claims)?;

        // Prune before insert: keep only the newest `session_retention`
        // of the existing records.
        let existing = self.store.find_sessions_by_user(&user.id).await?;
        let stale: Vec<String> = existing
            .iter()
            .skip(self.config.session_retention)
            .map(|s| s.id.clone())
            .collect();
        if !stale.is_empty() {
            let deleted = self.store.delete_sessions(&stale).await?;
            tracing::debug!(user_id = %user.id, deleted, "pruned old sessions");
        }

        self.store
            .insert_session(SessionRecord {
                id: Uuid::new_v4().to_string(),
                user_id: user.id.clone(),
                token: token.clone(),
                session_id: session_id.to_string(),
                created_at: now,
                expires_at: claims.expires_at(),
                is_active: true,
                logout_at: None,
            })
            .await?;

        tracing::debug!(user_id = %user.id, "issued token");
        Ok(token)
    }

    /// Verify a token and return the current user view
    ///
    /// Checks, in order: signature and expiry of the token itself, a live
    /// session record for the exact token string (a structurally valid but
    /// revoked or pruned token fails here), and finally that the user is
    /// still active. The returned view carries the session id embedded in
    /// the token payload.
    pub async fn verify_token(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = decode_token(&self.config.jwt_secret, token).map_err(|e| {
            tracing::debug!("token rejected: {e}");
            AuthError::TokenInvalid(e)
        })?;

        let now = Utc::now();
        let session = self
            .store
            .find_session(token)
            .await?
            .filter(|s| s.is_live(now))
            .ok_or_else(|| {
                tracing::debug!(user_id = %claims.user_id, "token rejected, no live session");
                AuthError::TokenInvalid(TokenError::Revoked)
            })?;

        let user = self
            .store
            .find_user_by_id(&session.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| {
                tracing::debug!(user_id = %session.user_id, "token rejected, user inactive");
                AuthError::TokenInvalid(TokenError::Revoked)
            })?;

        let mut view = user.to_view();
        view.session_id = claims.session_id;
        view.token = Some(token.to_string());
        Ok(view)
    }

    /// Deactivate the session for a token
    ///
    /// Returns whether a record was actually changed.
    pub async fn logout(&self, token: &str) -> Result<bool, AuthError> {
        let changed = self
            .store
            .update_session(
                token,
                unichat_core::SessionPatch {
                    is_active: Some(false),
                    logout_at: Some(Utc::now()),
                },
            )
            .await?;

        tracing::info!(changed, "logout");
        Ok(changed)
    }

    /// Get the sanitized view of an active user by id
    pub async fn get_user_by_id(&self, id: &str) -> Result<AuthenticatedUser, AuthError> {
        let user = self
            .store
            .find_user_by_id(id)
            .await?
            .filter(|u| u.is_active)
            .ok_or(AuthError::NotFound)?;

        Ok(user.to_view())
    }

    /// Bulk-delete session records whose expiry has passed
    ///
    /// Called on a schedule by an external sweep, not self-scheduling.
    pub async fn prune_expired_sessions(&self) -> Result<u64, AuthError> {
        let deleted = self.store.delete_expired_sessions(Utc::now()).await?;
        tracing::info!(deleted, "pruned expired sessions");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCredentialStore;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryCredentialStore::new()),
            AuthConfig::default(),
        )
    }

    fn profile(email: &str) -> KycProfile {
        KycProfile {
            name: Some("Jane Doe".to_string()),
            email: Some(email.to_string()),
            mobile: Some("+201234567890".to_string()),
            faculty: Some("Engineering".to_string()),
            password: Some("Passw0rd".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_then_duplicate_rejected() {
        let svc = service();

        let id = svc
            .register_user(&profile("jane@example.com"), "conv-1")
            .await
            .unwrap();
        assert!(!id.is_empty());

        // Identical resubmission is a duplicate, not a second account
        let err = svc
            .register_user(&profile("jane@example.com"), "conv-1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUser));
    }

    #[tokio::test]
    async fn test_authenticate_and_verify_round_trip() {
        let svc = service();
        svc.register_user(&profile("jane@example.com"), "conv-1")
            .await
            .unwrap();

        let (token, view) = svc
            .authenticate("Jane@Example.com", "Passw0rd", "conv-2")
            .await
            .unwrap();
        assert_eq!(view.email, "jane@example.com");
        assert_eq!(view.role, "user");

        let verified = svc.verify_token(&token).await.unwrap();
        assert_eq!(verified.user_id, view.user_id);
        assert_eq!(verified.email, "jane@example.com");
        assert_eq!(verified.session_id, "conv-2");
    }

    #[tokio::test]
    async fn test_bad_password_and_unknown_user_are_indistinguishable() {
        let svc = service();
        svc.register_user(&profile("jane@example.com"), "conv-1")
            .await
            .unwrap();

        let wrong_password = svc
            .authenticate("jane@example.com", "wrong-pass1", "conv")
            .await
            .unwrap_err();
        let unknown_user = svc
            .authenticate("nobody@example.com", "Passw0rd", "conv")
            .await
            .unwrap_err();

        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
    }

    #[tokio::test]
    async fn test_logout_invalidates_token() {
        let svc = service();
        svc.register_user(&profile("jane@example.com"), "conv-1")
            .await
            .unwrap();
        let (token, _) = svc
            .authenticate("jane@example.com", "Passw0rd", "conv-1")
            .await
            .unwrap();

        assert!(svc.verify_token(&token).await.is_ok());
        assert!(svc.logout(&token).await.unwrap());
        assert!(svc.verify_token(&token).await.is_err());

        // Second logout changes nothing
        assert!(!svc.logout(&token).await.unwrap());
    }

    #[tokio::test]
    async fn test_session_retention_after_many_logins() {
        let svc = service();
        svc.register_user(&profile("jane@example.com"), "conv-1")
            .await
            .unwrap();

        for i in 0..8 {
            svc.authenticate("jane@example.com", "Passw0rd", &format!("conv-{i}"))
                .await
                .unwrap();
        }

        let user = svc
            .store()
            .find_user_by_email_or_username("jane@example.com")
            .await
            .unwrap()
            .unwrap();
        let sessions = svc.store().find_sessions_by_user(&user.id).await.unwrap();

        // retention old records + the newest = 5 survivors
        assert_eq!(
            sessions.len(),
            AuthConfig::default().session_retention + 1
        );
    }

    #[tokio::test]
    async fn test_verify_rejects_foreign_token() {
        let svc = service();
        let err = svc.verify_token("garbage-token").await.unwrap_err();
        assert!(matches!(err, AuthError::TokenInvalid(_)));
    }
}
