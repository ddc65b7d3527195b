//! SurrealDB implementation of [`RefreshTokenRepository`].
//!
//! Redemption is a single `DELETE ... RETURN BEFORE` statement. The
//! record is gone by the time the caller sees it, and a concurrent
//! redeemer of the same token finds nothing to return.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tessera_core::error::TesseraResult;
use tessera_core::models::refresh_token::{CreateRefreshToken, RefreshTokenRecord};
use tessera_core::repository::RefreshTokenRepository;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, is_write_conflict};

#[derive(Debug, SurrealValue)]
struct RefreshTokenRow {
    user_id: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

fn row_to_record(row: RefreshTokenRow, token_hash: &str) -> Result<RefreshTokenRecord, DbError> {
    let user_id = Uuid::parse_str(&row.user_id)
        .map_err(|e| DbError::Query(format!("invalid user UUID: {e}")))?;
    Ok(RefreshTokenRecord {
        token_hash: token_hash.to_string(),
        user_id,
        expires_at: row.expires_at,
        created_at: row.created_at,
    })
}

/// SurrealDB implementation of the refresh token registry.
#[derive(Clone)]
pub struct SurrealRefreshTokenRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealRefreshTokenRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn delete_where(&self, query: &'static str, user_id: Option<Uuid>) -> Result<u64, DbError> {
        let mut builder = self.db.query(query);
        if let Some(user_id) = user_id {
            builder = builder.bind(("user_id", user_id.to_string()));
        }

        let result = builder.await?;
        let mut result = result
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        let rows: Vec<RefreshTokenRow> = result.take(0)?;
        Ok(rows.len() as u64)
    }
}

impl<C: Connection> RefreshTokenRepository for SurrealRefreshTokenRepository<C> {
    async fn register(&self, input: CreateRefreshToken) -> TesseraResult<RefreshTokenRecord> {
        let result = self
            .db
            .query(
                "CREATE type::record('refresh_token', $id) SET \
                 user_id = $user_id, \
                 expires_at = $expires_at",
            )
            .bind(("id", input.token_hash.clone()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("expires_at", input.expires_at))
            .await
            .map_err(|e| DbError::from_statement("refresh_token", e))?;

        let mut result = result
            .check()
            .map_err(|e| DbError::from_statement("refresh_token", e))?;

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(|| DbError::NotFound {
            entity: "refresh_token".into(),
            id: input.token_hash.clone(),
        })?;

        row_to_record(row, &input.token_hash).map_err(Into::into)
    }

    async fn redeem(&self, token_hash: &str) -> TesseraResult<RefreshTokenRecord> {
        let not_found = || DbError::NotFound {
            entity: "refresh_token".into(),
            id: token_hash.to_string(),
        };

        let checked = self
            .db
            .query("DELETE type::record('refresh_token', $id) RETURN BEFORE")
            .bind(("id", token_hash.to_string()))
            .await
            .and_then(|response| response.check());

        let mut result = match checked {
            Ok(result) => result,
            // A concurrent redemption committed first; the token is gone.
            Err(e) if is_write_conflict(&e.to_string()) => {
                debug!("refresh token redemption lost a write conflict");
                return Err(not_found().into());
            }
            Err(e) => return Err(DbError::Query(e.to_string()).into()),
        };

        let rows: Vec<RefreshTokenRow> = result.take(0).map_err(DbError::from)?;
        let row = rows.into_iter().next().ok_or_else(not_found)?;

        row_to_record(row, token_hash).map_err(Into::into)
    }

    async fn revoke(&self, token_hash: &str) -> TesseraResult<()> {
        self.db
            .query("DELETE type::record('refresh_token', $id)")
            .bind(("id", token_hash.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::Query(e.to_string()))?;

        Ok(())
    }

    async fn revoke_all(&self, user_id: Uuid) -> TesseraResult<u64> {
        let removed = self
            .delete_where(
                "DELETE refresh_token WHERE user_id = $user_id RETURN BEFORE",
                Some(user_id),
            )
            .await?;
        Ok(removed)
    }

    async fn purge_expired(&self) -> TesseraResult<u64> {
        let removed = self
            .delete_where(
                "DELETE refresh_token WHERE expires_at <= time::now() RETURN BEFORE",
                None,
            )
            .await?;
        Ok(removed)
    }
}
