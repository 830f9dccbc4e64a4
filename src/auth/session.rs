/// Session lifecycle
///
/// `SessionManager` owns the flows that create, rotate and end refresh
/// sessions. Handlers call into it and translate the outcome into HTTP.

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::jwt::{issue_token_pair, validate_refresh_token, IssuedTokens};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::refresh_token::{session_for, session_matches};
use crate::configuration::{JwtSettings, PasswordSettings, SessionSettings};
use crate::error::{AppError, AuthError, DatabaseError, ValidationError};
use crate::store::{Identity, IdentityRepository, SessionStore};

/// Login input as received; every field may be missing
#[derive(Debug, Default, Clone)]
pub struct Credentials {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub user: Identity,
    pub tokens: IssuedTokens,
}

pub struct SessionManager {
    identities: Arc<dyn IdentityRepository>,
    sessions: Arc<dyn SessionStore>,
    jwt: JwtSettings,
    policy: SessionSettings,
    hash_cost: u32,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Non-blank secret, returned exactly as given
fn secret(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

impl SessionManager {
    pub fn new(
        identities: Arc<dyn IdentityRepository>,
        sessions: Arc<dyn SessionStore>,
        jwt: JwtSettings,
        policy: SessionSettings,
        password: &PasswordSettings,
    ) -> Self {
        Self {
            identities,
            sessions,
            jwt,
            policy,
            hash_cost: password.hash_cost,
        }
    }

    pub fn identities(&self) -> &Arc<dyn IdentityRepository> {
        &self.identities
    }

    pub fn jwt_settings(&self) -> &JwtSettings {
        &self.jwt
    }

    pub fn hash_cost(&self) -> u32 {
        self.hash_cost
    }

    /// Verify credentials and open a new session
    ///
    /// # Errors
    /// - `Validation` when neither username nor email is given, or the password is missing
    /// - `Database(NotFound)` when no identity matches
    /// - `Auth(InvalidCredentials)` on a wrong password
    /// - `Issuance` / storage errors, with nothing persisted
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginOutcome, AppError> {
        let username = present(credentials.username.as_deref()).map(str::to_lowercase);
        let email = present(credentials.email.as_deref());

        if username.is_none() && email.is_none() {
            return Err(ValidationError::EmptyField("username or email".to_string()).into());
        }
        let password = secret(credentials.password.as_deref())
            .ok_or_else(|| ValidationError::EmptyField("password".to_string()))?;

        let user = self
            .identities
            .find_by_login(username.as_deref(), email)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("user does not exist".to_string()))?;

        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials.into());
        }

        let tokens = issue_token_pair(&user, &self.jwt)?;
        self.sessions
            .insert(session_for(user.id, &tokens), self.policy.max_sessions)
            .await?;

        tracing::info!(user_id = %user.id, session_id = %tokens.session_id, "Session opened");

        Ok(LoginOutcome { user, tokens })
    }

    /// Exchange a refresh token for a new pair, retiring the presented one.
    ///
    /// Every rejection leaves the stored sessions exactly as they were.
    pub async fn refresh(&self, candidate: Option<&str>) -> Result<IssuedTokens, AppError> {
        // Received
        let token = candidate
            .filter(|t| !t.trim().is_empty())
            .ok_or(AuthError::MissingRefreshToken)?;

        // Signature, issuer and expiry
        let claims = validate_refresh_token(token, &self.jwt)?;
        let session_id = claims.session_id().ok_or(AuthError::TokenInvalid)?;

        // Identity named by the token
        let user_id = claims.user_id().ok_or(AuthError::UnknownSubject)?;
        let identity = self
            .identities
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UnknownSubject)?;

        // Replay check: must be the token currently stored for this session
        let current = self
            .sessions
            .find(user_id, session_id)
            .await?
            .filter(|session| session_matches(session, token))
            .ok_or(AuthError::TokenReused)?;

        // Issue, then swap atomically; a lost race counts as a replay
        let tokens = issue_token_pair(&identity, &self.jwt)?;
        let rotated = self
            .sessions
            .rotate(&current, session_for(identity.id, &tokens))
            .await?;
        if !rotated {
            tracing::warn!(user_id = %user_id, session_id = %session_id, "Concurrent refresh lost the rotation");
            return Err(AuthError::TokenReused.into());
        }

        tracing::info!(
            user_id = %user_id,
            previous_session = %session_id,
            session_id = %tokens.session_id,
            "Session rotated"
        );

        Ok(tokens)
    }

    /// End every session of an identity. Clearing nothing is still success.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        let removed = self.sessions.clear(user_id).await?;
        tracing::info!(user_id = %user_id, removed, "Sessions revoked on logout");
        Ok(())
    }

    /// Replace the password hash; returns whether sessions were revoked
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: Option<&str>,
        new_password: Option<&str>,
    ) -> Result<bool, AppError> {
        let old_password = secret(old_password)
            .ok_or_else(|| ValidationError::EmptyField("oldPassword".to_string()))?;
        let new_password = secret(new_password)
            .ok_or_else(|| ValidationError::EmptyField("newPassword".to_string()))?;

        let identity = self.current_user(user_id).await?;
        if !verify_password(old_password, &identity.password_hash) {
            return Err(AuthError::InvalidCredentials.into());
        }

        let password_hash = hash_password(new_password, self.hash_cost)?;
        self.identities
            .update_password_hash(user_id, &password_hash)
            .await?;

        if self.policy.revoke_on_password_change {
            let removed = self.sessions.clear(user_id).await?;
            tracing::info!(user_id = %user_id, removed, "Sessions revoked after password change");
            return Ok(true);
        }

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(false)
    }

    pub async fn current_user(&self, user_id: Uuid) -> Result<Identity, AppError> {
        self.identities
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("user does not exist".to_string()).into())
    }
}
