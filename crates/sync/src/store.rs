use abgleich_core::SyncSession;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Session store failure: {0}")]
pub struct StoreError(pub String);

/// Persistence seam for sync sessions. The orchestrator records every
/// status transition through this handle; a store failure is logged and
/// never aborts the sync itself.
#[allow(async_fn_in_trait)]
pub trait SessionStore: Send + Sync {
    async fn save(&self, session: &SyncSession) -> Result<(), StoreError>;
}

/// Keeps every saved snapshot in memory — the test double, and good enough
/// for ephemeral runs that do not want a database.
#[derive(Default)]
pub struct MemorySessionStore {
    snapshots: std::sync::Mutex<Vec<SyncSession>>,
}

impl MemorySessionStore {
    pub fn snapshots(&self) -> Vec<SyncSession> {
        self.snapshots.lock().unwrap().clone()
    }
}

impl SessionStore for MemorySessionStore {
    async fn save(&self, session: &SyncSession) -> Result<(), StoreError> {
        self.snapshots.lock().unwrap().push(session.clone());
        Ok(())
    }
}
