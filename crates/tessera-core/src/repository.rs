//! Repository trait definitions for data access abstraction.
//!
//! Both write paths that guard an invariant are single atomic store
//! operations: [`UserRepository::create`] fails with
//! [`TesseraError::AlreadyExists`] on a duplicate email, and
//! [`RefreshTokenRepository::redeem`] removes and returns a record in
//! one step. Callers must never compose them from a read plus a write.
//!
//! [`TesseraError::AlreadyExists`]: crate::error::TesseraError::AlreadyExists

use uuid::Uuid;

use crate::error::TesseraResult;
use crate::models::{
    refresh_token::{CreateRefreshToken, RefreshTokenRecord},
    user::{CreateUser, User},
};

// ---------------------------------------------------------------------------
// Credential store
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Insert a new user. A duplicate email yields `AlreadyExists`.
    fn create(&self, input: CreateUser) -> impl Future<Output = TesseraResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TesseraResult<User>> + Send;
    /// Look up by normalized email.
    fn get_by_email(&self, email: &str) -> impl Future<Output = TesseraResult<User>> + Send;
    /// Hard delete. Refresh tokens owned by the user must not survive it.
    fn delete(&self, id: Uuid) -> impl Future<Output = TesseraResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Refresh token registry
// ---------------------------------------------------------------------------

pub trait RefreshTokenRepository: Send + Sync {
    /// Record a newly issued refresh token as redeemable.
    fn register(
        &self,
        input: CreateRefreshToken,
    ) -> impl Future<Output = TesseraResult<RefreshTokenRecord>> + Send;
    /// Atomically remove and return the record. At most one caller ever
    /// observes `Ok` for a given hash; every other caller gets `NotFound`.
    fn redeem(
        &self,
        token_hash: &str,
    ) -> impl Future<Output = TesseraResult<RefreshTokenRecord>> + Send;
    /// Idempotent removal.
    fn revoke(&self, token_hash: &str) -> impl Future<Output = TesseraResult<()>> + Send;
    /// Remove every token owned by the user; returns how many were removed.
    fn revoke_all(&self, user_id: Uuid) -> impl Future<Output = TesseraResult<u64>> + Send;
    /// Drop records whose expiry has passed.
    fn purge_expired(&self) -> impl Future<Output = TesseraResult<u64>> + Send;
}
