use async_trait::async_trait;
use chrono::Utc;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::str::FromStr;
use tracing::{debug, info};

use super::SessionStore;
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::model::Session;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed session store. One row per session, the session itself is a
/// JSON document with a version column checked on every write.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct SessionRow {
    user_id: String,
    version: i64,
    document: String,
}

impl SqliteSessionStore {
    /// Create a new SQLite session store
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Create an in-memory store, used by tests and the demo binary
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, session: &mut Session) -> StorageResult<()> {
        session.version = 0;
        session.touch();
        let document = serde_json::to_string(session)?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, user_id, module, version, document, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session.id)
        .bind(&session.user_id)
        .bind(session.module.to_string())
        .bind(session.version as i64)
        .bind(&document)
        .bind(session.started_at.to_rfc3339())
        .bind(session.last_updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(session_id = %session.id, "Session created");
        Ok(())
    }

    async fn load(&self, session_id: &str, user_id: &str) -> StorageResult<Session> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT user_id, version, document
            FROM sessions
            WHERE id = ?
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or_else(|| StorageError::SessionNotFound {
            session_id: session_id.to_string(),
        })?;

        if row.user_id != user_id {
            return Err(StorageError::Unauthorized {
                session_id: session_id.to_string(),
            });
        }

        let mut session: Session = serde_json::from_str(&row.document)?;
        session.version = row.version as u64;

        Ok(session)
    }

    async fn persist(&self, session: &mut Session) -> StorageResult<()> {
        let expected = session.version;
        session.version = expected + 1;
        session.last_updated_at = Utc::now();
        let document = serde_json::to_string(session)?;

        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET version = ?, document = ?, updated_at = ?
            WHERE id = ? AND version = ?
            "#,
        )
        .bind(session.version as i64)
        .bind(&document)
        .bind(session.last_updated_at.to_rfc3339())
        .bind(&session.id)
        .bind(expected as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            session.version = expected;

            let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM sessions WHERE id = ?")
                .bind(&session.id)
                .fetch_optional(&self.pool)
                .await?;

            return Err(if exists.is_some() {
                StorageError::VersionConflict {
                    session_id: session.id.clone(),
                    expected,
                }
            } else {
                StorageError::SessionNotFound {
                    session_id: session.id.clone(),
                }
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, SessionModule};

    #[tokio::test]
    async fn test_create_and_load_roundtrip() {
        let store = SqliteSessionStore::in_memory().await.unwrap();
        let mut session = Session::new("user-1", SessionModule::Reading, Difficulty::Intermediate);
        let id = session.id.clone();

        store.create(&mut session).await.unwrap();

        let loaded = store.load(&id, "user-1").await.unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.module, SessionModule::Reading);
        assert_eq!(loaded.version, 0);
    }

    #[tokio::test]
    async fn test_load_unknown_session() {
        let store = SqliteSessionStore::in_memory().await.unwrap();
        let result = store.load("missing", "user-1").await;
        assert!(matches!(result, Err(StorageError::SessionNotFound { .. })));
    }

    #[tokio::test]
    async fn test_load_wrong_user() {
        let store = SqliteSessionStore::in_memory().await.unwrap();
        let mut session = Session::new("user-1", SessionModule::Writing, Difficulty::Beginner);
        let id = session.id.clone();
        store.create(&mut session).await.unwrap();

        let result = store.load(&id, "user-2").await;
        assert!(matches!(result, Err(StorageError::Unauthorized { .. })));
    }

    #[tokio::test]
    async fn test_persist_bumps_version() {
        let store = SqliteSessionStore::in_memory().await.unwrap();
        let mut session = Session::new("user-1", SessionModule::Listening, Difficulty::Advanced);
        let id = session.id.clone();
        store.create(&mut session).await.unwrap();

        store.persist(&mut session).await.unwrap();
        assert_eq!(session.version, 1);

        let loaded = store.load(&id, "user-1").await.unwrap();
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_on_disk_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("sessions.db"),
            max_connections: 2,
        };

        let mut session = Session::new("user-1", SessionModule::Reading, Difficulty::Beginner);
        let id = session.id.clone();
        {
            let store = SqliteSessionStore::new(&config).await.unwrap();
            store.create(&mut session).await.unwrap();
            store.persist(&mut session).await.unwrap();
        }

        let store = SqliteSessionStore::new(&config).await.unwrap();
        let loaded = store.load(&id, "user-1").await.unwrap();
        assert_eq!(loaded.version, 1);
    }

    #[tokio::test]
    async fn test_persist_detects_stale_version() {
        let store = SqliteSessionStore::in_memory().await.unwrap();
        let mut session = Session::new("user-1", SessionModule::Listening, Difficulty::Advanced);
        let id = session.id.clone();
        store.create(&mut session).await.unwrap();

        let mut stale = store.load(&id, "user-1").await.unwrap();
        store.persist(&mut session).await.unwrap();

        let result = store.persist(&mut stale).await;
        assert!(matches!(result, Err(StorageError::VersionConflict { .. })));
    }
}
