//! In-memory implementations of the credential store and the refresh
//! token registry.
//!
//! Each table sits behind a single `parking_lot::Mutex`. Every operation
//! that checks and mutates a key does both inside one critical section,
//! and no guard is ever held across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tessera_core::error::{TesseraError, TesseraResult};
use tessera_core::models::refresh_token::{CreateRefreshToken, RefreshTokenRecord};
use tessera_core::models::user::{CreateUser, DEFAULT_ROLE, User};
use tessera_core::repository::{RefreshTokenRepository, UserRepository};
use uuid::Uuid;

#[derive(Debug, Default)]
struct UserTable {
    by_id: HashMap<Uuid, User>,
    id_by_email: HashMap<String, Uuid>,
}

/// Process-local credential store.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserRepository {
    table: Arc<Mutex<UserTable>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.table.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl UserRepository for MemoryUserRepository {
    async fn create(&self, input: CreateUser) -> TesseraResult<User> {
        let mut table = self.table.lock();
        if table.id_by_email.contains_key(&input.email) {
            return Err(TesseraError::AlreadyExists {
                entity: "user".into(),
            });
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: input.email,
            password_hash: input.password_hash,
            first_name: input.first_name,
            last_name: input.last_name,
            role: DEFAULT_ROLE.to_string(),
            created_at: now,
            updated_at: now,
        };
        table.id_by_email.insert(user.email.clone(), user.id);
        table.by_id.insert(user.id, user.clone());

        Ok(user)
    }

    async fn get_by_id(&self, id: Uuid) -> TesseraResult<User> {
        self.table
            .lock()
            .by_id
            .get(&id)
            .cloned()
            .ok_or_else(|| TesseraError::not_found("user", id.to_string()))
    }

    async fn get_by_email(&self, email: &str) -> TesseraResult<User> {
        let table = self.table.lock();
        table
            .id_by_email
            .get(email)
            .and_then(|id| table.by_id.get(id))
            .cloned()
            .ok_or_else(|| TesseraError::not_found("user", format!("email={email}")))
    }

    async fn delete(&self, id: Uuid) -> TesseraResult<()> {
        let mut table = self.table.lock();
        let user = table
            .by_id
            .remove(&id)
            .ok_or_else(|| TesseraError::not_found("user", id.to_string()))?;
        table.id_by_email.remove(&user.email);
        Ok(())
    }
}

/// Process-local refresh token registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryRefreshTokenRepository {
    tokens: Arc<Mutex<HashMap<String, RefreshTokenRecord>>>,
}

impl MemoryRefreshTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.tokens.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RefreshTokenRepository for MemoryRefreshTokenRepository {
    async fn register(&self, input: CreateRefreshToken) -> TesseraResult<RefreshTokenRecord> {
        let mut tokens = self.tokens.lock();
        if tokens.contains_key(&input.token_hash) {
            return Err(TesseraError::AlreadyExists {
                entity: "refresh_token".into(),
            });
        }

        let record = RefreshTokenRecord {
            token_hash: input.token_hash,
            user_id: input.user_id,
            expires_at: input.expires_at,
            created_at: Utc::now(),
        };
        tokens.insert(record.token_hash.clone(), record.clone());
        Ok(record)
    }

    async fn redeem(&self, token_hash: &str) -> TesseraResult<RefreshTokenRecord> {
        self.tokens
            .lock()
            .remove(token_hash)
            .ok_or_else(|| TesseraError::not_found("refresh_token", token_hash))
    }

    async fn revoke(&self, token_hash: &str) -> TesseraResult<()> {
        self.tokens.lock().remove(token_hash);
        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> TesseraResult<u64> {
        let mut tokens = self.tokens.lock();
        let before = tokens.len();
        tokens.retain(|_, record| record.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }

    async fn purge_expired(&self) -> TesseraResult<u64> {
        let mut tokens = self.tokens.lock();
        let before = tokens.len();
        tokens.retain(|_, record| !record.is_expired());
        Ok((before - tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(email: &str) -> CreateUser {
        CreateUser {
            email: email.into(),
            password_hash: "hash".into(),
            first_name: String::new(),
            last_name: String::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let repo = MemoryUserRepository::new();
        repo.create(new_user("a@x.com")).await.unwrap();

        let err = repo.create(new_user("a@x.com")).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn delete_frees_the_email() {
        let repo = MemoryUserRepository::new();
        let user = repo.create(new_user("a@x.com")).await.unwrap();
        repo.delete(user.id).await.unwrap();

        assert!(repo.get_by_email("a@x.com").await.unwrap_err().is_not_found());
        repo.create(new_user("a@x.com")).await.unwrap();
    }

    #[tokio::test]
    async fn redeem_removes_the_record() {
        let repo = MemoryRefreshTokenRepository::new();
        let user_id = Uuid::new_v4();
        repo.register(CreateRefreshToken {
            token_hash: "h1".into(),
            user_id,
            expires_at: Utc::now() + Duration::hours(1),
        })
        .await
        .unwrap();

        let record = repo.redeem("h1").await.unwrap();
        assert_eq!(record.user_id, user_id);
        assert!(repo.redeem("h1").await.unwrap_err().is_not_found());
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn purge_keeps_live_tokens() {
        let repo = MemoryRefreshTokenRepository::new();
        let user_id = Uuid::new_v4();
        for (hash, offset) in [("old", -1), ("new", 1)] {
            repo.register(CreateRefreshToken {
                token_hash: hash.into(),
                user_id,
                expires_at: Utc::now() + Duration::hours(offset),
            })
            .await
            .unwrap();
        }

        assert_eq!(repo.purge_expired().await.unwrap(), 1);
        assert!(repo.redeem("new").await.is_ok());
    }
}
