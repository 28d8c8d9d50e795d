use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncSessionId(pub String);

impl fmt::Display for SyncSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of one sync run. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    AwaitingBankAuth,
    AwaitingUserConfirmation,
    FetchingTransactions,
    ReviewingTransactions,
    Importing,
    Completed,
    Failed { reason: String },
}

impl SyncStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncStatus::Completed | SyncStatus::Failed { .. })
    }

    /// Stable, matchable code for persistence and log lines.
    pub fn code(&self) -> &'static str {
        match self {
            SyncStatus::AwaitingBankAuth => "awaiting-bank-auth",
            SyncStatus::AwaitingUserConfirmation => "awaiting-user-confirmation",
            SyncStatus::FetchingTransactions => "fetching-transactions",
            SyncStatus::ReviewingTransactions => "reviewing-transactions",
            SyncStatus::Importing => "importing",
            SyncStatus::Completed => "completed",
            SyncStatus::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Failed { reason } => write!(f, "failed: {reason}"),
            other => write!(f, "{}", other.code()),
        }
    }
}

/// One sync run. Created when a sync starts, persisted at every status
/// transition, terminal at `Completed` or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSession {
    pub id: SyncSessionId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: SyncStatus,
    pub transaction_count: usize,
    pub imported_count: usize,
    pub skipped_count: usize,
}

impl SyncSession {
    pub fn new(id: SyncSessionId, started_at: DateTime<Utc>) -> Self {
        SyncSession {
            id,
            started_at,
            completed_at: None,
            status: SyncStatus::AwaitingBankAuth,
            transaction_count: 0,
            imported_count: 0,
            skipped_count: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}
