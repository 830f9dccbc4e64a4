//! Session lifecycle tests against SessionManager with in-memory stores

use std::sync::Arc;

use async_trait::async_trait;
use userhub::auth::{
    generate_refresh_token, hash_password, hash_token, Credentials, IssuedTokens, SessionManager,
    MIN_HASH_COST,
};
use userhub::configuration::{JwtSettings, PasswordSettings, SessionSettings};
use userhub::error::{AppError, AuthError, DatabaseError};
use userhub::store::{
    Identity, IdentityRepository, InMemoryIdentityRepository, InMemorySessionStore, NewIdentity,
    SessionRecord, SessionStore,
};
use uuid::Uuid;

const PASSWORD: &str = "SecurePass123";

fn jwt_settings() -> JwtSettings {
    JwtSettings {
        access_secret: "lifecycle-access-secret-at-least-32-chars".to_string(),
        refresh_secret: "lifecycle-refresh-secret-at-least-32-chars".to_string(),
        access_token_expiry: 900,
        refresh_token_expiry: 864000,
        issuer: "test".to_string(),
    }
}

fn manager_with(sessions: Arc<dyn SessionStore>, policy: SessionSettings) -> SessionManager {
    SessionManager::new(
        Arc::new(InMemoryIdentityRepository::new()),
        sessions,
        jwt_settings(),
        policy,
        &PasswordSettings { hash_cost: MIN_HASH_COST },
    )
}

async fn seed(manager: &SessionManager) -> Identity {
    manager
        .identities()
        .create(NewIdentity {
            username: "john".to_string(),
            email: "john@example.com".to_string(),
            full_name: "John Doe".to_string(),
            password_hash: hash_password(PASSWORD, MIN_HASH_COST).unwrap(),
        })
        .await
        .unwrap()
}

async fn login(manager: &SessionManager) -> IssuedTokens {
    manager
        .login(&Credentials {
            email: Some("john@example.com".to_string()),
            password: Some(PASSWORD.to_string()),
            ..Credentials::default()
        })
        .await
        .expect("login failed")
        .tokens
}

fn auth_kind(result: Result<IssuedTokens, AppError>) -> Option<AuthError> {
    result.err().and_then(|e| e.auth_kind().cloned())
}

/// Delegates to an in-memory store but fails every rotation
struct FailingRotateStore {
    inner: InMemorySessionStore,
}

#[async_trait]
impl SessionStore for FailingRotateStore {
    async fn find(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<SessionRecord>, AppError> {
        self.inner.find(user_id, session_id).await
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AppError> {
        self.inner.list(user_id).await
    }

    async fn insert(&self, record: SessionRecord, max_sessions: usize) -> Result<(), AppError> {
        self.inner.insert(record, max_sessions).await
    }

    async fn rotate(
        &self,
        _current: &SessionRecord,
        _replacement: SessionRecord,
    ) -> Result<bool, AppError> {
        Err(DatabaseError::ConnectionPool("connection reset".to_string()).into())
    }

    async fn clear(&self, user_id: Uuid) -> Result<u64, AppError> {
        self.inner.clear(user_id).await
    }
}

#[tokio::test]
async fn login_binds_single_session_to_refresh_token() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let manager = manager_with(sessions.clone(), SessionSettings::default());
    let user = seed(&manager).await;

    let first = login(&manager).await;
    let second = login(&manager).await;

    let stored = sessions.list(user.id).await.unwrap();
    assert_eq!(stored.len(), 1, "A new login replaces the previous session");
    assert_eq!(stored[0].id, second.session_id);
    assert_eq!(stored[0].token_hash, hash_token(&second.refresh_token));

    let err = auth_kind(manager.refresh(Some(&first.refresh_token)).await);
    assert_eq!(err, Some(AuthError::TokenReused));
}

#[tokio::test]
async fn rotation_chain_rejects_every_retired_token() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let manager = manager_with(sessions.clone(), SessionSettings::default());
    let user = seed(&manager).await;

    let r1 = login(&manager).await.refresh_token;
    let r2 = manager.refresh(Some(&r1)).await.unwrap().refresh_token;

    assert_eq!(
        auth_kind(manager.refresh(Some(&r1)).await),
        Some(AuthError::TokenReused)
    );

    let third = manager.refresh(Some(&r2)).await.unwrap();
    let stored = sessions.list(user.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].token_hash, hash_token(&third.refresh_token));

    manager.logout(user.id).await.unwrap();
    assert_eq!(
        auth_kind(manager.refresh(Some(&third.refresh_token)).await),
        Some(AuthError::TokenReused)
    );
}

#[tokio::test]
async fn concurrent_refresh_with_same_token_succeeds_once() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let manager = manager_with(sessions.clone(), SessionSettings::default());
    let user = seed(&manager).await;
    let refresh_token = login(&manager).await.refresh_token;

    let (a, b) = tokio::join!(
        manager.refresh(Some(&refresh_token)),
        manager.refresh(Some(&refresh_token))
    );

    let winners: Vec<_> = [a, b].into_iter().filter_map(Result::ok).collect();
    assert_eq!(winners.len(), 1, "Exactly one refresh may win");

    let stored = sessions.list(user.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].token_hash, hash_token(&winners[0].refresh_token));
}

#[tokio::test]
async fn failed_rotation_returns_no_tokens_and_keeps_session() {
    let store = Arc::new(FailingRotateStore {
        inner: InMemorySessionStore::new(),
    });
    let manager = manager_with(store.clone(), SessionSettings::default());
    let user = seed(&manager).await;
    let tokens = login(&manager).await;

    let result = manager.refresh(Some(&tokens.refresh_token)).await;
    assert!(matches!(result, Err(AppError::Database(_))));

    let stored = store.list(user.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].token_hash, hash_token(&tokens.refresh_token));
}

#[tokio::test]
async fn refresh_rejects_token_signed_with_other_secret() {
    let manager = manager_with(Arc::new(InMemorySessionStore::new()), SessionSettings::default());
    seed(&manager).await;

    let foreign = SessionManager::new(
        Arc::new(InMemoryIdentityRepository::new()),
        Arc::new(InMemorySessionStore::new()),
        JwtSettings {
            refresh_secret: "some-other-refresh-secret-at-least-32-chars".to_string(),
            ..jwt_settings()
        },
        SessionSettings::default(),
        &PasswordSettings { hash_cost: MIN_HASH_COST },
    );
    seed(&foreign).await;
    let forged = login(&foreign).await.refresh_token;

    assert_eq!(
        auth_kind(manager.refresh(Some(&forged)).await),
        Some(AuthError::TokenInvalid)
    );
}

#[tokio::test]
async fn logout_is_idempotent() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let manager = manager_with(sessions.clone(), SessionSettings::default());
    let user = seed(&manager).await;
    login(&manager).await;

    manager.logout(user.id).await.unwrap();
    manager.logout(user.id).await.unwrap();
    manager.logout(Uuid::new_v4()).await.unwrap();

    assert!(sessions.list(user.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn password_change_keeps_sessions_when_policy_allows() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let policy = SessionSettings {
        revoke_on_password_change: false,
        ..SessionSettings::default()
    };
    let manager = manager_with(sessions.clone(), policy);
    let user = seed(&manager).await;
    let tokens = login(&manager).await;

    let revoked = manager
        .change_password(user.id, Some(PASSWORD), Some("NewSecure456"))
        .await
        .unwrap();

    assert!(!revoked);
    assert_eq!(sessions.list(user.id).await.unwrap().len(), 1);
    assert!(manager.refresh(Some(&tokens.refresh_token)).await.is_ok());
}

#[tokio::test]
async fn password_change_revokes_sessions_by_default() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let manager = manager_with(sessions.clone(), SessionSettings::default());
    let user = seed(&manager).await;
    let tokens = login(&manager).await;

    let revoked = manager
        .change_password(user.id, Some(PASSWORD), Some("NewSecure456"))
        .await
        .unwrap();

    assert!(revoked);
    assert!(sessions.list(user.id).await.unwrap().is_empty());
    assert_eq!(
        auth_kind(manager.refresh(Some(&tokens.refresh_token)).await),
        Some(AuthError::TokenReused)
    );
}

#[tokio::test]
async fn multi_session_policy_keeps_newest_sessions() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let policy = SessionSettings {
        max_sessions: 2,
        ..SessionSettings::default()
    };
    let manager = manager_with(sessions.clone(), policy);
    let user = seed(&manager).await;

    let first = login(&manager).await;
    let second = login(&manager).await;
    let third = login(&manager).await;

    let stored = sessions.list(user.id).await.unwrap();
    let ids: Vec<Uuid> = stored.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![third.session_id, second.session_id]);

    assert_eq!(
        auth_kind(manager.refresh(Some(&first.refresh_token)).await),
        Some(AuthError::TokenReused)
    );
    assert!(manager.refresh(Some(&second.refresh_token)).await.is_ok());
    assert!(manager.refresh(Some(&third.refresh_token)).await.is_ok());
}

#[tokio::test]
async fn refresh_rejects_token_expired_moments_ago() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let manager = manager_with(sessions.clone(), SessionSettings::default());
    let user = seed(&manager).await;

    let expired_config = JwtSettings {
        refresh_token_expiry: -30,
        ..jwt_settings()
    };
    let session_id = Uuid::new_v4();
    let (token, claims) = generate_refresh_token(user.id, session_id, &expired_config).unwrap();
    let record = SessionRecord {
        id: session_id,
        user_id: user.id,
        token_hash: hash_token(&token),
        issued_at: chrono::Utc::now(),
        expires_at: chrono::DateTime::<chrono::Utc>::from_timestamp(claims.exp, 0).unwrap(),
    };
    sessions.insert(record.clone(), 1).await.unwrap();

    assert_eq!(
        auth_kind(manager.refresh(Some(&token)).await),
        Some(AuthError::TokenInvalid)
    );
    assert_eq!(sessions.list(user.id).await.unwrap(), vec![record]);
}

#[tokio::test]
async fn refresh_compares_the_token_byte_for_byte() {
    let sessions = Arc::new(InMemorySessionStore::new());
    let manager = manager_with(sessions.clone(), SessionSettings::default());
    let user = seed(&manager).await;
    let tokens = login(&manager).await;

    let padded = format!(" {} ", tokens.refresh_token);
    assert!(manager.refresh(Some(&padded)).await.is_err());

    let stored = sessions.list(user.id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].token_hash, hash_token(&tokens.refresh_token));
    assert!(manager.refresh(Some(&tokens.refresh_token)).await.is_ok());
}

#[tokio::test]
async fn login_checks_the_exact_password() {
    let manager = manager_with(Arc::new(InMemorySessionStore::new()), SessionSettings::default());
    seed(&manager).await;

    let padded = manager
        .login(&Credentials {
            email: Some("john@example.com".to_string()),
            password: Some(format!("  {}  ", PASSWORD)),
            ..Credentials::default()
        })
        .await;

    assert_eq!(
        padded.err().and_then(|e| e.auth_kind().cloned()),
        Some(AuthError::InvalidCredentials)
    );
}
