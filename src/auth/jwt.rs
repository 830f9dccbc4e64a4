/// JWT Token Generation and Validation
///
/// Access and refresh tokens are HS256 JWTs signed with separate keys.
/// Minting is pure: nothing here touches storage.

use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::store::Identity;

/// Output of one issuance: the token pair plus what the session row needs
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    /// `jti` of the refresh token
    pub session_id: Uuid,
    pub issued_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

fn sign<T: Serialize>(claims: &T, secret: &str, kind: &str) -> Result<String, AppError> {
    if secret.is_empty() {
        return Err(AppError::Issuance(format!("{} signing key is empty", kind)));
    }

    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Issuance(format!("{} token generation failed: {}", kind, e)))
}

fn verify<T: DeserializeOwned>(token: &str, secret: &str, issuer: &str) -> Result<T, AppError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[issuer]);
    // Expired means expired: no grace period past `exp`
    validation.leeway = 0;

    decode::<T>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!("JWT validation error: {}", e);
        AppError::Auth(AuthError::TokenInvalid)
    })
}

/// Generate a new access token for an identity
///
/// # Errors
/// Returns `AppError::Issuance` if the access key is missing or signing fails
pub fn generate_access_token(identity: &Identity, config: &JwtSettings) -> Result<String, AppError> {
    let claims = AccessClaims::new(
        identity.id,
        identity.username.clone(),
        identity.email.clone(),
        config.access_token_expiry,
        config.issuer.clone(),
    );

    sign(&claims, &config.access_secret, "access")
}

/// Generate a refresh token bound to `session_id`
pub fn generate_refresh_token(
    user_id: Uuid,
    session_id: Uuid,
    config: &JwtSettings,
) -> Result<(String, RefreshClaims), AppError> {
    let claims = RefreshClaims::new(
        user_id,
        session_id,
        config.refresh_token_expiry,
        config.issuer.clone(),
    );

    let token = sign(&claims, &config.refresh_secret, "refresh")?;
    Ok((token, claims))
}

/// Mint a fresh access/refresh pair with a new session id
pub fn issue_token_pair(identity: &Identity, config: &JwtSettings) -> Result<IssuedTokens, AppError> {
    let access_token = generate_access_token(identity, config)?;
    let session_id = Uuid::new_v4();
    let (refresh_token, claims) = generate_refresh_token(identity.id, session_id, config)?;

    let issued_at = DateTime::<Utc>::from_timestamp(claims.iat, 0)
        .ok_or_else(|| AppError::Issuance("issued-at out of range".to_string()))?;
    let refresh_expires_at = DateTime::<Utc>::from_timestamp(claims.exp, 0)
        .ok_or_else(|| AppError::Issuance("refresh expiry out of range".to_string()))?;

    Ok(IssuedTokens {
        access_token,
        refresh_token,
        session_id,
        issued_at,
        refresh_expires_at,
    })
}

/// Validate an access token: signature, expiry and issuer. No state is consulted.
pub fn validate_access_token(token: &str, config: &JwtSettings) -> Result<AccessClaims, AppError> {
    verify(token, &config.access_secret, &config.issuer)
}

/// Validate a refresh token's signature, expiry and issuer.
///
/// This alone does not make a refresh token usable; it must also match the
/// stored session (see `SessionManager::refresh`).
pub fn validate_refresh_token(token: &str, config: &JwtSettings) -> Result<RefreshClaims, AppError> {
    verify(token, &config.refresh_secret, &config.issuer)
}
