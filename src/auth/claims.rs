/// JWT Claims structures
///
/// Access tokens carry the identity's public fields; refresh tokens carry only
/// the subject and the session id (`jti`) they are bound to.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccessClaims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub username: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
}

impl AccessClaims {
    pub fn new(
        user_id: Uuid,
        username: String,
        email: String,
        expiry_seconds: i64,
        issuer: String,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            username,
            email,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    /// Subject as a UUID, if it parses
    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }
}

/// Claims for refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RefreshClaims {
    pub sub: String,
    /// Session id; keys the stored session row
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl RefreshClaims {
    pub fn new(user_id: Uuid, session_id: Uuid, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            jti: session_id.to_string(),
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.sub).ok()
    }

    pub fn session_id(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.jti).ok()
    }
}
