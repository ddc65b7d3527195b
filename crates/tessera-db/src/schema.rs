//! Schema definitions and migration runner for SurrealDB.
//!
//! All table definitions use SCHEMAFULL mode. UUIDs are stored as
//! strings; refresh tokens are keyed by the hex digest of the token.

use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use tracing::info;

use crate::error::DbError;

/// Ledger of applied schema versions.
const LEDGER_DDL: &str = "\
DEFINE TABLE IF NOT EXISTS _schema_version SCHEMAFULL;
DEFINE FIELD IF NOT EXISTS version ON TABLE _schema_version TYPE int;
DEFINE FIELD IF NOT EXISTS name ON TABLE _schema_version TYPE string;
DEFINE FIELD IF NOT EXISTS applied_at ON TABLE _schema_version TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX IF NOT EXISTS idx_schema_version ON TABLE _schema_version \
    COLUMNS version UNIQUE;
";

#[derive(Debug, SurrealValue)]
struct AppliedVersion {
    version: u32,
}

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

/// Ascending by version.
static MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "identity_and_sessions",
    sql: SCHEMA_V1,
}];

// -----------------------------------------------------------------------
// Schema v1
// -----------------------------------------------------------------------

const SCHEMA_V1: &str = "\
-- =======================================================================
-- Users. Emails are normalized before they reach the store, so the
-- unique index enforces case-insensitive uniqueness.
-- =======================================================================
DEFINE TABLE user SCHEMAFULL;
DEFINE FIELD email ON TABLE user TYPE string;
DEFINE FIELD password_hash ON TABLE user TYPE string;
DEFINE FIELD first_name ON TABLE user TYPE string DEFAULT '';
DEFINE FIELD last_name ON TABLE user TYPE string DEFAULT '';
DEFINE FIELD role ON TABLE user TYPE string DEFAULT 'user';
DEFINE FIELD created_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE FIELD updated_at ON TABLE user TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_user_email ON TABLE user COLUMNS email UNIQUE;

-- =======================================================================
-- Refresh tokens (record id = SHA-256 hex of the signed token)
-- =======================================================================
DEFINE TABLE refresh_token SCHEMAFULL;
DEFINE FIELD user_id ON TABLE refresh_token TYPE string;
DEFINE FIELD expires_at ON TABLE refresh_token TYPE datetime;
DEFINE FIELD created_at ON TABLE refresh_token TYPE datetime \
    DEFAULT time::now();
DEFINE INDEX idx_refresh_token_user ON TABLE refresh_token \
    COLUMNS user_id;
DEFINE INDEX idx_refresh_token_expiry ON TABLE refresh_token \
    COLUMNS expires_at;

-- Deleting a user takes its refresh tokens with it.
DEFINE EVENT user_delete_cascade ON TABLE user \
    WHEN $event = 'DELETE' \
    THEN (DELETE refresh_token WHERE user_id = meta::id($before.id));
";

// -----------------------------------------------------------------------
// Runner
// -----------------------------------------------------------------------

/// Bring the database up to the latest schema version.
///
/// Safe to call on every start: versions already recorded in the
/// `_schema_version` ledger are skipped.
pub async fn run_migrations<C: Connection>(db: &Surreal<C>) -> Result<(), DbError> {
    db.query(LEDGER_DDL)
        .await?
        .check()
        .map_err(|e| DbError::Migration(format!("ledger setup failed: {e}")))?;

    let applied = applied_version(db).await?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        apply(db, migration).await?;
    }

    Ok(())
}

async fn applied_version<C: Connection>(db: &Surreal<C>) -> Result<u32, DbError> {
    let mut response = db
        .query("SELECT version FROM _schema_version ORDER BY version DESC LIMIT 1")
        .await?;
    let rows: Vec<AppliedVersion> = response.take(0)?;
    Ok(rows.first().map_or(0, |row| row.version))
}

async fn apply<C: Connection>(db: &Surreal<C>, migration: &Migration) -> Result<(), DbError> {
    let failed = |stage: &str, e: surrealdb::Error| {
        DbError::Migration(format!(
            "v{} ({}) {stage}: {e}",
            migration.version, migration.name
        ))
    };

    info!(version = migration.version, name = migration.name, "Applying schema migration");

    db.query(migration.sql)
        .await?
        .check()
        .map_err(|e| failed("failed", e))?;

    db.query("CREATE _schema_version SET version = $version, name = $name")
        .bind(("version", migration.version))
        .bind(("name", migration.name))
        .await?
        .check()
        .map_err(|e| failed("could not be recorded", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_v1_declares_unique_email() {
        assert!(SCHEMA_V1.contains("idx_user_email ON TABLE user COLUMNS email UNIQUE"));
    }

    #[test]
    fn versions_ascend_from_one() {
        assert_eq!(MIGRATIONS.first().map(|m| m.version), Some(1));
        assert!(MIGRATIONS.windows(2).all(|w| w[0].version < w[1].version));
    }

    #[test]
    fn deleting_a_user_cascades_to_its_tokens() {
        assert!(SCHEMA_V1.contains("DEFINE EVENT user_delete_cascade ON TABLE user"));
    }
}
