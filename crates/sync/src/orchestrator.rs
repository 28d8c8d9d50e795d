use abgleich_bank::{AuthError, AuthSessionManager, BankApi, Challenge, Credentials};
use abgleich_core::{
    CategorySplit, ImportAttempt, ReviewStatus, Rule, SyncSession, SyncSessionId, SyncStatus,
    SyncTransaction,
};
use abgleich_ledger::{import_id, LedgerApi};
use abgleich_rules::{classify_transactions, RuleError};
use chrono::Utc;
use thiserror::Error;

use crate::dedup::{DedupConfig, DuplicateDetector};
use crate::store::SessionStore;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No active sync session")]
    SessionNotFound,
    #[error("A sync session is already active")]
    SyncAlreadyActive,
    #[error("Bank credentials are not configured")]
    CredentialsNotConfigured,
    #[error("Bank authentication failed: {0}")]
    BankAuthFailed(AuthError),
    #[error("Confirmation timed out: the bank challenge expired")]
    ConfirmationTimeout,
    #[error("Transaction fetch failed: {0}")]
    TransactionFetchFailed(String),
    #[error("{} classification rule(s) failed to compile", .0.len())]
    InvalidRules(Vec<RuleError>),
    #[error("Ledger import failed for {count} transaction(s): {message}")]
    LedgerImportFailed { count: usize, message: String },
    #[error("Invalid session state: expected {expected}, actual {actual}")]
    InvalidSessionState {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),
    #[error("Transaction {0} is already imported")]
    TransactionImported(String),
    #[error("Split amounts sum to {actual} cents but the transaction amount is {expected} cents")]
    SplitMismatch { expected: i64, actual: i64 },
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub bank_account_id: String,
    pub budget_id: String,
    pub ledger_account_id: String,
    /// How many days of bank history one sync run covers.
    pub lookback_days: u32,
    pub dedup: DedupConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct ImportSummary {
    pub submitted: usize,
    pub created: usize,
    pub flagged_duplicates: usize,
}

/// Owns the sync-session lifecycle: sequences bank authentication,
/// transaction retrieval, classification, duplicate marking, the manual
/// review mutations and the final import call. Exactly one sync may be
/// active at a time; the orchestrator is the only writer of the session
/// and the transaction set.
pub struct SyncOrchestrator<B: BankApi, L: LedgerApi, S: SessionStore> {
    auth: AuthSessionManager<B>,
    ledger: L,
    store: S,
    config: SyncConfig,
    credentials: Option<Credentials>,
    rules: Vec<Rule>,
    session: Option<SyncSession>,
    transactions: Vec<SyncTransaction>,
}

impl<B: BankApi, L: LedgerApi, S: SessionStore> SyncOrchestrator<B, L, S> {
    pub fn new(bank: B, ledger: L, store: S, config: SyncConfig) -> Self {
        SyncOrchestrator {
            auth: AuthSessionManager::new(bank),
            ledger,
            store,
            config,
            credentials: None,
            rules: Vec::new(),
            session: None,
            transactions: Vec::new(),
        }
    }

    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.credentials = Some(credentials);
    }

    pub fn session(&self) -> Option<&SyncSession> {
        self.session.as_ref()
    }

    pub fn transactions(&self) -> &[SyncTransaction] {
        &self.transactions
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    async fn persist(&self, session: &SyncSession) {
        if let Err(e) = self.store.save(session).await {
            tracing::warn!(error = %e, "failed to persist sync session");
        }
    }

    async fn transition(&mut self, status: SyncStatus) {
        let snapshot = match self.session.as_mut() {
            Some(session) => {
                tracing::info!(from = session.status.code(), to = status.code(), "sync status transition");
                session.status = status;
                if session.status.is_terminal() {
                    session.completed_at = Some(Utc::now());
                }
                session.clone()
            }
            None => return,
        };
        self.persist(&snapshot).await;
    }

    async fn fail(&mut self, reason: String) {
        self.transition(SyncStatus::Failed { reason }).await;
    }

    fn status_code(&self) -> &'static str {
        self.session
            .as_ref()
            .map(|s| s.status.code())
            .unwrap_or("no-session")
    }

    /// Start a new sync run. Rules must arrive pre-sorted by priority (the
    /// rule store loads them that way). Rejected while another run is
    /// active, and immediately when no bank credentials are configured.
    /// Returns the challenge the user must confirm out-of-band.
    pub async fn start_sync(&mut self, rules: Vec<Rule>) -> Result<Challenge, SyncError> {
        if self.session.as_ref().is_some_and(|s| s.is_active()) {
            return Err(SyncError::SyncAlreadyActive);
        }
        let credentials = self
            .credentials
            .clone()
            .ok_or(SyncError::CredentialsNotConfigured)?;

        let session = SyncSession::new(SyncSessionId(uuid::Uuid::new_v4().to_string()), Utc::now());
        tracing::info!(session_id = %session.id, "starting sync");
        self.persist(&session).await;
        self.session = Some(session);
        self.rules = rules;
        self.transactions.clear();

        match self.auth.start_auth(&credentials).await {
            Ok(challenge) => {
                self.transition(SyncStatus::AwaitingUserConfirmation).await;
                Ok(challenge)
            }
            Err(e) => {
                let err = SyncError::BankAuthFailed(e);
                self.fail(err.to_string()).await;
                Err(err)
            }
        }
    }

    /// Resume after the user confirmed the bank challenge: activate the
    /// session, fetch the lookback window, classify, mark duplicates
    /// (best-effort — a ledger outage only disables dedup), auto-skip
    /// confirmed duplicates and hand the set over for review.
    pub async fn confirm_and_fetch(&mut self) -> Result<(), SyncError> {
        let actual = self.status_code();
        if actual != SyncStatus::AwaitingUserConfirmation.code() {
            return Err(SyncError::InvalidSessionState {
                expected: "awaiting-user-confirmation",
                actual,
            });
        }

        if let Err(e) = self.auth.confirm_challenge().await {
            let err = match e {
                AuthError::ChallengeExpired => SyncError::ConfirmationTimeout,
                other => SyncError::BankAuthFailed(other),
            };
            self.fail(err.to_string()).await;
            return Err(err);
        }

        self.transition(SyncStatus::FetchingTransactions).await;

        let tokens = match self.auth.tokens().cloned() {
            Some(tokens) => tokens,
            None => {
                let err = SyncError::BankAuthFailed(AuthError::SessionExpired);
                self.fail(err.to_string()).await;
                return Err(err);
            }
        };

        let bank_txs = match self
            .auth
            .client()
            .list_transactions(&tokens, &self.config.bank_account_id, self.config.lookback_days)
            .await
        {
            Ok(txs) => txs,
            Err(e) => {
                let err = SyncError::TransactionFetchFailed(e.to_string());
                self.fail(err.to_string()).await;
                return Err(err);
            }
        };
        tracing::info!(count = bank_txs.len(), "fetched bank transactions");

        let classified = match classify_transactions(&self.rules, bank_txs) {
            Ok(txs) => txs,
            Err(errors) => {
                let err = SyncError::InvalidRules(errors);
                self.fail(err.to_string()).await;
                return Err(err);
            }
        };

        let entries = match self
            .ledger
            .get_recent_entries(
                &self.config.budget_id,
                &self.config.ledger_account_id,
                self.config.lookback_days,
            )
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(error = %e, "ledger entries unavailable, skipping duplicate detection");
                Vec::new()
            }
        };

        let detector = DuplicateDetector::new(self.config.dedup);
        let mut transactions = detector.mark_duplicates(&entries, classified);
        for tx in &mut transactions {
            if tx.duplicate.is_confirmed() {
                tx.status = ReviewStatus::Skipped;
            }
        }

        self.transactions = transactions;
        self.update_counts();
        self.transition(SyncStatus::ReviewingTransactions).await;
        Ok(())
    }

    fn require_reviewing(&self) -> Result<(), SyncError> {
        let actual = self.status_code();
        if actual == SyncStatus::ReviewingTransactions.code() {
            Ok(())
        } else {
            Err(SyncError::InvalidSessionState {
                expected: "reviewing-transactions",
                actual,
            })
        }
    }

    fn tx_mut(&mut self, tx_id: &str) -> Result<&mut SyncTransaction, SyncError> {
        self.transactions
            .iter_mut()
            .find(|t| t.bank.id == tx_id)
            .ok_or_else(|| SyncError::TransactionNotFound(tx_id.to_string()))
    }

    pub fn categorize(
        &mut self,
        tx_id: &str,
        category_id: &str,
        category_name: &str,
    ) -> Result<(), SyncError> {
        self.require_reviewing()?;
        let tx = self.tx_mut(tx_id)?;
        if tx.status == ReviewStatus::Imported {
            return Err(SyncError::TransactionImported(tx_id.to_string()));
        }
        tx.category_id = Some(category_id.to_string());
        tx.category_name = Some(category_name.to_string());
        tx.status = ReviewStatus::ManuallyCategorized;
        Ok(())
    }

    /// Bulk categorize. Validates every id up front so a bad one cannot
    /// leave the batch half-applied.
    pub fn categorize_many(
        &mut self,
        tx_ids: &[String],
        category_id: &str,
        category_name: &str,
    ) -> Result<usize, SyncError> {
        self.require_reviewing()?;
        for id in tx_ids {
            let tx = self
                .transactions
                .iter()
                .find(|t| t.bank.id == *id)
                .ok_or_else(|| SyncError::TransactionNotFound(id.clone()))?;
            if tx.status == ReviewStatus::Imported {
                return Err(SyncError::TransactionImported(id.clone()));
            }
        }
        for id in tx_ids {
            self.categorize(id, category_id, category_name)?;
        }
        Ok(tx_ids.len())
    }

    pub fn skip(&mut self, tx_id: &str) -> Result<(), SyncError> {
        self.require_reviewing()?;
        let tx = self.tx_mut(tx_id)?;
        if tx.status == ReviewStatus::Imported {
            return Err(SyncError::TransactionImported(tx_id.to_string()));
        }
        tx.status = ReviewStatus::Skipped;
        Ok(())
    }

    /// Un-skip restores manually-categorized status when a category is
    /// already set, else pending. No-op on transactions that are not
    /// skipped.
    pub fn unskip(&mut self, tx_id: &str) -> Result<(), SyncError> {
        self.require_reviewing()?;
        let tx = self.tx_mut(tx_id)?;
        if tx.status == ReviewStatus::Skipped {
            tx.status = if tx.category_id.is_some() {
                ReviewStatus::ManuallyCategorized
            } else {
                ReviewStatus::Pending
            };
        }
        Ok(())
    }

    pub fn set_split(&mut self, tx_id: &str, splits: Vec<CategorySplit>) -> Result<(), SyncError> {
        self.require_reviewing()?;
        let tx = self.tx_mut(tx_id)?;
        if tx.status == ReviewStatus::Imported {
            return Err(SyncError::TransactionImported(tx_id.to_string()));
        }
        let total: i64 = splits.iter().map(|s| s.amount_cents).sum();
        if splits.is_empty() || total != tx.bank.amount_cents {
            return Err(SyncError::SplitMismatch {
                expected: tx.bank.amount_cents,
                actual: total,
            });
        }
        tx.splits = Some(splits);
        tx.status = ReviewStatus::ManuallyCategorized;
        Ok(())
    }

    pub fn clear_split(&mut self, tx_id: &str) -> Result<(), SyncError> {
        self.require_reviewing()?;
        let tx = self.tx_mut(tx_id)?;
        tx.splits = None;
        Ok(())
    }

    /// Submit every transaction that is not skipped or already imported.
    /// A category is optional — uncategorized rows surface as uncategorized
    /// in the ledger.
    pub async fn import(&mut self) -> Result<ImportSummary, SyncError> {
        self.import_batch(false).await
    }

    /// Identical flow, but the ledger client generates freshly salted
    /// import ids — deliberately bypassing the ledger's dedup guard for
    /// transactions the user confirmed are not duplicates.
    pub async fn force_import(&mut self) -> Result<ImportSummary, SyncError> {
        self.import_batch(true).await
    }

    async fn import_batch(&mut self, force: bool) -> Result<ImportSummary, SyncError> {
        self.require_reviewing()?;
        self.transition(SyncStatus::Importing).await;

        let eligible: Vec<SyncTransaction> = self
            .transactions
            .iter()
            .filter(|t| !matches!(t.status, ReviewStatus::Skipped | ReviewStatus::Imported))
            .cloned()
            .collect();

        if eligible.is_empty() {
            self.update_counts();
            self.transition(SyncStatus::Completed).await;
            return Ok(ImportSummary { submitted: 0, created: 0, flagged_duplicates: 0 });
        }

        let outcome = match self
            .ledger
            .submit_transactions(
                &self.config.budget_id,
                &self.config.ledger_account_id,
                &eligible,
                force,
            )
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                // Review state is intact; the user decides whether to retry.
                let err = SyncError::LedgerImportFailed {
                    count: eligible.len(),
                    message: e.to_string(),
                };
                self.transition(SyncStatus::ReviewingTransactions).await;
                return Err(err);
            }
        };

        let mut flagged = 0usize;
        for tx in self
            .transactions
            .iter_mut()
            .filter(|t| !matches!(t.status, ReviewStatus::Skipped | ReviewStatus::Imported))
        {
            if !force && outcome.duplicate_import_ids.contains(&import_id(&tx.bank.id)) {
                // Left in its prior status so the user may force-import or
                // discard it.
                tx.import_attempt = ImportAttempt::FlaggedDuplicate;
                flagged += 1;
            } else {
                tx.import_attempt = ImportAttempt::Created;
                tx.status = ReviewStatus::Imported;
            }
        }

        self.update_counts();
        if flagged == 0 {
            self.transition(SyncStatus::Completed).await;
        } else {
            tracing::info!(flagged, "ledger flagged duplicates, staying in review");
            self.transition(SyncStatus::ReviewingTransactions).await;
        }

        Ok(ImportSummary {
            submitted: eligible.len(),
            created: outcome.created,
            flagged_duplicates: flagged,
        })
    }

    fn update_counts(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.transaction_count = self.transactions.len();
            session.imported_count = self
                .transactions
                .iter()
                .filter(|t| t.status == ReviewStatus::Imported)
                .count();
            session.skipped_count = self
                .transactions
                .iter()
                .filter(|t| t.status == ReviewStatus::Skipped)
                .count();
        }
    }

    /// Cooperative cancellation from any state: clears the bank session and
    /// abandons in-flight work. Nothing is committed externally before the
    /// final import call, so no compensating calls are needed.
    pub async fn cancel(&mut self) {
        self.auth.clear();
        if self.session.as_ref().is_some_and(|s| s.is_active()) {
            self.fail("cancelled".to_string()).await;
        }
        self.transactions.clear();
    }
}
