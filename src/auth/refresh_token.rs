/// Refresh Token Session Binding
///
/// A refresh token is persisted only as the SHA-256 digest of its full string,
/// in the session row keyed by the token's `jti`. Digest equality stands in for
/// byte equality of the token, so the plaintext never has to be stored.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::jwt::IssuedTokens;
use crate::store::SessionRecord;

/// Hash a refresh token using SHA-256
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the session row that records a freshly issued refresh token
pub fn session_for(user_id: Uuid, tokens: &IssuedTokens) -> SessionRecord {
    SessionRecord {
        id: tokens.session_id,
        user_id,
        token_hash: hash_token(&tokens.refresh_token),
        issued_at: tokens.issued_at,
        expires_at: tokens.refresh_expires_at,
    }
}

/// Whether `token` is exactly the refresh token recorded in `session`
pub fn session_matches(session: &SessionRecord, token: &str) -> bool {
    session.token_hash == hash_token(token)
}
