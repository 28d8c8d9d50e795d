use std::sync::Mutex;

use abgleich_core::SyncTransaction;

use crate::client::{Category, ImportOutcome, LedgerApi, LedgerEntry, LedgerError};
use crate::import_id::import_id;

/// In-memory ledger for tests. Seed `entries` with what the ledger already
/// holds and `duplicate_import_ids` with the import ids its dedup guard
/// should refuse; every submission is recorded for inspection.
#[derive(Default)]
pub struct MockLedgerClient {
    pub categories: Vec<Category>,
    pub entries: Vec<LedgerEntry>,
    pub entries_error: Option<LedgerError>,
    pub submit_error: Option<LedgerError>,
    pub duplicate_import_ids: Vec<String>,
    /// Recorded submissions: (bank transaction ids, force flag).
    pub submissions: Mutex<Vec<(Vec<String>, bool)>>,
}

impl LedgerApi for MockLedgerClient {
    async fn get_categories(&self, _budget_id: &str) -> Result<Vec<Category>, LedgerError> {
        Ok(self.categories.clone())
    }

    async fn get_recent_entries(
        &self,
        _budget_id: &str,
        _account_id: &str,
        _since_days: u32,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        match &self.entries_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.entries.clone()),
        }
    }

    async fn submit_transactions(
        &self,
        _budget_id: &str,
        _account_id: &str,
        transactions: &[SyncTransaction],
        force_new_import_id: bool,
    ) -> Result<ImportOutcome, LedgerError> {
        if let Some(e) = &self.submit_error {
            return Err(e.clone());
        }

        self.submissions.lock().unwrap().push((
            transactions.iter().map(|t| t.bank.id.clone()).collect(),
            force_new_import_id,
        ));

        // Forced submissions carry salted ids the guard cannot recognize.
        let duplicates: Vec<String> = if force_new_import_id {
            Vec::new()
        } else {
            transactions
                .iter()
                .map(|t| import_id(&t.bank.id))
                .filter(|iid| self.duplicate_import_ids.contains(iid))
                .collect()
        };

        Ok(ImportOutcome {
            created: transactions.len() - duplicates.len(),
            duplicate_import_ids: duplicates,
        })
    }
}
