use abgleich_core::SyncSession;
use abgleich_sync::{SessionStore, StoreError};

use crate::db::{save_session, DbPool};

/// `SessionStore` over the SQLite journal, the handle the orchestrator is
/// wired with in the application.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: DbPool,
}

impl SqliteSessionStore {
    pub fn new(pool: DbPool) -> Self {
        SqliteSessionStore { pool }
    }
}

impl SessionStore for SqliteSessionStore {
    async fn save(&self, session: &SyncSession) -> Result<(), StoreError> {
        save_session(&self.pool, session)
            .await
            .map_err(|e| StoreError(e.to_string()))
    }
}
