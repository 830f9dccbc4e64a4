use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Identity, IdentityRepository, NewIdentity, SessionRecord, SessionStore};
use crate::error::{AppError, DatabaseError};

/// `users` table access
#[derive(Clone)]
pub struct PgIdentityRepository {
    pool: PgPool,
}

impl PgIdentityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityRepository for PgIdentityRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Identity>, AppError> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, username, email, full_name, password_hash, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn find_by_login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Identity>, AppError> {
        // A NULL parameter never compares equal, so an absent field matches nothing
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            SELECT id, username, email, full_name, password_hash, created_at
            FROM users
            WHERE username = $1 OR email = $2
            LIMIT 1
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn create(&self, new_identity: NewIdentity) -> Result<Identity, AppError> {
        let identity = sqlx::query_as::<_, Identity>(
            r#"
            INSERT INTO users (id, username, email, full_name, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, now())
            RETURNING id, username, email, full_name, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_identity.username)
        .bind(&new_identity.email)
        .bind(&new_identity.full_name)
        .bind(&new_identity.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(identity)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("user does not exist".to_string()).into());
        }
        Ok(())
    }
}

/// `refresh_sessions` table access
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn find(
        &self,
        user_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<SessionRecord>, AppError> {
        let record = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, user_id, token_hash, issued_at, expires_at
            FROM refresh_sessions
            WHERE user_id = $1 AND id = $2
            "#,
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<SessionRecord>, AppError> {
        let records = sqlx::query_as::<_, SessionRecord>(
            r#"
            SELECT id, user_id, token_hash, issued_at, expires_at
            FROM refresh_sessions
            WHERE user_id = $1
            ORDER BY seq DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn insert(&self, record: SessionRecord, max_sessions: usize) -> Result<(), AppError> {
        let keep_others = max_sessions.max(1) as i64 - 1;
        let mut tx = self.pool.begin().await?;

        // Serialise logins of one identity so each eviction sees the others' rows
        sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(record.user_id)
            .fetch_optional(&mut tx)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("user does not exist".to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO refresh_sessions (id, user_id, token_hash, issued_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.token_hash)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .execute(&mut tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM refresh_sessions
            WHERE user_id = $1
              AND id <> $2
              AND id NOT IN (
                  SELECT id FROM refresh_sessions
                  WHERE user_id = $1 AND id <> $2
                  ORDER BY seq DESC
                  LIMIT $3
              )
            "#,
        )
        .bind(record.user_id)
        .bind(record.id)
        .bind(keep_others)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn rotate(
        &self,
        current: &SessionRecord,
        replacement: SessionRecord,
    ) -> Result<bool, AppError> {
        // Single conditional UPDATE: the comparison and the write cannot interleave
        let result = sqlx::query(
            r#"
            UPDATE refresh_sessions
            SET id = $4, token_hash = $5, issued_at = $6, expires_at = $7,
                seq = nextval(pg_get_serial_sequence('refresh_sessions', 'seq'))
            WHERE user_id = $1 AND id = $2 AND token_hash = $3
            "#,
        )
        .bind(current.user_id)
        .bind(current.id)
        .bind(&current.token_hash)
        .bind(replacement.id)
        .bind(&replacement.token_hash)
        .bind(replacement.issued_at)
        .bind(replacement.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn clear(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM refresh_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        tracing::info!(user_id = %user_id, removed = result.rows_affected(), "Refresh sessions cleared");
        Ok(result.rows_affected())
    }
}
