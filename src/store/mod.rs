/// Persistence seams
///
/// The session core only talks to storage through these two traits. The
/// Postgres implementations back the running service; the in-memory ones
/// back the tests.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;

pub use memory::{InMemoryIdentityRepository, InMemorySessionStore};
pub use postgres::{PgIdentityRepository, PgSessionStore};

/// A user identity record
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Identity {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to create an identity
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
}

/// Identity as returned to clients. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub created_at: String,
}

impl From<&Identity> for PublicUser {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id.to_string(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            full_name: identity.full_name.clone(),
            created_at: identity.created_at.to_rfc3339(),
        }
    }
}

/// One active refresh session
///
/// `id` is the `jti` claim of the refresh token currently bound to the
/// session; `token_hash` is the SHA-256 digest of that token.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait IdentityRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError>;

    /// Look up by username or email; either may be absent but not both.
    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Identity>, AppError>;

    /// Fails with `DatabaseError::UniqueConstraintViolation` when the username or email is taken.
    async fn create(&self, new_identity: NewIdentity) -> Result<Identity, AppError>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find(&self, user_id: Uuid, session_id: Uuid)
        -> Result<Option<SessionRecord>, AppError>;

    /// All sessions of an identity, newest first
    async fn list(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AppError>;

    /// Store a new session and evict the oldest ones so at most `max_sessions` remain.
    async fn insert(&self, record: SessionRecord, max_sessions: usize) -> Result<(), AppError>;

    /// Swap `current` for `replacement` only if `current` is still stored unchanged.
    ///
    /// Returns `false` when the session was already rotated, cleared or evicted.
    async fn rotate(
        &self,
        current: &SessionRecord,
        replacement: SessionRecord,
    ) -> Result<bool, AppError>;

    /// Remove every session of an identity. Returns how many were removed.
    async fn clear(&self, user_id: Uuid) -> Result<u64, AppError>;
}
