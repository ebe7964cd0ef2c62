mod sqlite;

pub use sqlite::SqliteSessionStore;

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::model::Session;

/// Durable session document store.
///
/// Sessions are stored as whole documents with read-modify-write semantics.
/// `persist` performs an optimistic version check: the write succeeds only if
/// the stored version still matches the session's version, then bumps it.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, session: &mut Session) -> StorageResult<()>;
    async fn load(&self, session_id: &str, user_id: &str) -> StorageResult<Session>;
    async fn persist(&self, session: &mut Session) -> StorageResult<()>;
}
