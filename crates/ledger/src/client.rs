use abgleich_core::SyncTransaction;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Ledger request failed ({status}): {message}")]
    Network { status: u16, message: String },
    #[error("Ledger rejected the token")]
    Unauthorized,
    #[error("Invalid response from ledger: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// An already-imported ledger entry, reduced to what duplicate detection
/// needs. The memo carries the originating bank reference when the entry
/// was created by this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: String,
    pub date: NaiveDate,
    pub amount_cents: i64,
    pub payee: Option<String>,
    pub memo: String,
    /// Import identifier assigned at a previous import attempt, if any.
    pub import_id: Option<String>,
}

/// Per-batch report from the ledger's deterministic import-id dedup scheme.
#[derive(Debug, Clone, Default)]
pub struct ImportOutcome {
    pub created: usize,
    /// Import ids the ledger recognized and refused as already present.
    pub duplicate_import_ids: Vec<String>,
}

/// Operations the sync core consumes from the budgeting ledger.
#[allow(async_fn_in_trait)]
pub trait LedgerApi: Send + Sync {
    async fn get_categories(&self, budget_id: &str) -> Result<Vec<Category>, LedgerError>;

    /// Recent entries of one account, used only for duplicate detection.
    async fn get_recent_entries(
        &self,
        budget_id: &str,
        account_id: &str,
        since_days: u32,
    ) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// Submit one import batch. With `force_new_import_id` the submission
    /// carries freshly salted import ids, deliberately bypassing the
    /// ledger's dedup guard for transactions the user confirmed are not
    /// duplicates.
    async fn submit_transactions(
        &self,
        budget_id: &str,
        account_id: &str,
        transactions: &[SyncTransaction],
        force_new_import_id: bool,
    ) -> Result<ImportOutcome, LedgerError>;
}
