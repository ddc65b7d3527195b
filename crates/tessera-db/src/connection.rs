//! SurrealDB connection management.

use surrealdb::Surreal;
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use tracing::info;

/// Where and how to reach SurrealDB.
///
/// The engine is picked from the URL scheme (`ws://`, `http://`, `mem://`).
/// Credentials are optional; without them no sign-in is attempted.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000".into(),
            namespace: "tessera".into(),
            database: "main".into(),
            username: None,
            password: None,
        }
    }
}

impl DbConfig {
    fn root_credentials(&self) -> Option<Root> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Some(Root {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        }
    }
}

/// Owns the SurrealDB client shared by the repositories.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Any>,
}

impl DbManager {
    /// Open the connection and select the configured namespace and
    /// database.
    pub async fn connect(config: &DbConfig) -> Result<Self, surrealdb::Error> {
        let db = any::connect(config.url.as_str()).await?;

        let authenticated = match config.root_credentials() {
            Some(root) => {
                db.signin(root).await?;
                true
            }
            None => false,
        };

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            authenticated,
            "SurrealDB connection ready"
        );
        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }
}
