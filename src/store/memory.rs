use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{Identity, IdentityRepository, NewIdentity, SessionRecord, SessionStore};
use crate::error::{AppError, DatabaseError};

/// Identity records held in process memory
#[derive(Default)]
pub struct InMemoryIdentityRepository {
    users: Mutex<HashMap<Uuid, Identity>>,
}

impl InMemoryIdentityRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityRepository for InMemoryIdentityRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        Ok(self.users.lock().await.get(&id).cloned())
    }

    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Identity>, AppError> {
        let users = self.users.lock().await;
        let found = users.values().find(|user| {
            username.map_or(false, |name| user.username == name)
                || email.map_or(false, |address| user.email == address)
        });
        Ok(found.cloned())
    }

    async fn create(&self, new_identity: NewIdentity) -> Result<Identity, AppError> {
        let mut users = self.users.lock().await;
        let taken = users.values().any(|user| {
            user.username == new_identity.username || user.email == new_identity.email
        });
        if taken {
            return Err(AppError::Database(DatabaseError::UniqueConstraintViolation(
                "username or email already registered".to_string(),
            )));
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            username: new_identity.username,
            email: new_identity.email,
            full_name: new_identity.full_name,
            password_hash: new_identity.password_hash,
            created_at: Utc::now(),
        };
        users.insert(identity.id, identity.clone());
        Ok(identity)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let mut users = self.users.lock().await;
        let user = users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::NotFound("user does not exist".to_string()))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }
}

/// Refresh sessions held in process memory, newest first per identity
///
/// One lock guards the whole table, so `rotate` is a true compare-and-swap.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Vec<SessionRecord>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn find(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<SessionRecord>, AppError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .get(&user_id)
            .and_then(|records| records.iter().find(|r| r.id == session_id))
            .cloned())
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AppError> {
        let sessions = self.sessions.lock().await;
        Ok(sessions.get(&user_id).cloned().unwrap_or_default())
    }

    async fn insert(&self, record: SessionRecord, max_sessions: usize) -> Result<(), AppError> {
        let mut sessions = self.sessions.lock().await;
        let records = sessions.entry(record.user_id).or_default();
        records.insert(0, record);
        records.truncate(max_sessions.max(1));
        Ok(())
    }

    async fn rotate(
        &self,
        current: &SessionRecord,
        replacement: SessionRecord,
    ) -> Result<bool, AppError> {
        let mut sessions = self.sessions.lock().await;
        let Some(records) = sessions.get_mut(&current.user_id) else {
            return Ok(false);
        };
        let position = records
            .iter()
            .position(|r| r.id == current.id && r.token_hash == current.token_hash);

        match position {
            Some(index) => {
                records.remove(index);
                records.insert(0, replacement);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut sessions = self.sessions.lock().await;
        Ok(sessions
            .remove(&user_id)
            .map(|records| records.len() as u64)
            .unwrap_or(0))
    }
}
