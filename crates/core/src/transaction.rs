use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::duplicate::{DuplicateStatus, MatchDetail};
use super::rule::RuleId;

/// An immutable fact retrieved from the bank. The raw payload is retained
/// verbatim for diagnostics only and never interpreted after parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankTransaction {
    /// Opaque bank-assigned transaction id.
    pub id: String,
    pub booking_date: NaiveDate,
    pub amount_cents: i64,
    pub currency: String,
    pub payee: Option<String>,
    pub memo: String,
    /// Bank-side reference string, the primary dedup key.
    pub reference: String,
    pub raw: serde_json::Value,
}

/// Review state of a transaction within one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewStatus {
    Pending,
    AutoCategorized,
    ManuallyCategorized,
    NeedsAttention,
    Skipped,
    Imported,
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewStatus::Pending => write!(f, "pending"),
            ReviewStatus::AutoCategorized => write!(f, "auto-categorized"),
            ReviewStatus::ManuallyCategorized => write!(f, "manually-categorized"),
            ReviewStatus::NeedsAttention => write!(f, "needs-attention"),
            ReviewStatus::Skipped => write!(f, "skipped"),
            ReviewStatus::Imported => write!(f, "imported"),
        }
    }
}

/// Outcome of the most recent import submission for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ImportAttempt {
    #[default]
    NotSubmitted,
    Created,
    /// The ledger recognized the import id and refused the row.
    FlaggedDuplicate,
}

/// One slice of a split transaction. All splits of a transaction must sum
/// to the transaction amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySplit {
    pub category_id: String,
    pub category_name: String,
    pub amount_cents: i64,
    pub memo: Option<String>,
}

/// Informational link attached during classification (e.g. the marketplace
/// order behind an opaque processor charge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub label: String,
    pub url: String,
}

/// A `BankTransaction` enriched with mutable review state. Created once per
/// sync run, mutated by the orchestrator's review operations, terminal once
/// marked `Imported`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncTransaction {
    pub bank: BankTransaction,
    pub status: ReviewStatus,
    pub category_id: Option<String>,
    pub category_name: Option<String>,
    pub matched_rule_id: Option<RuleId>,
    pub payee_override: Option<String>,
    pub links: Vec<ExternalLink>,
    pub note: Option<String>,
    pub duplicate: DuplicateStatus,
    pub import_attempt: ImportAttempt,
    pub splits: Option<Vec<CategorySplit>>,
}

impl SyncTransaction {
    pub fn from_bank(bank: BankTransaction) -> Self {
        let detail = MatchDetail::new(bank.reference.clone());
        SyncTransaction {
            bank,
            status: ReviewStatus::Pending,
            category_id: None,
            category_name: None,
            matched_rule_id: None,
            payee_override: None,
            links: Vec::new(),
            note: None,
            duplicate: DuplicateStatus::NotDuplicate(detail),
            import_attempt: ImportAttempt::default(),
            splits: None,
        }
    }

    /// Payee as it should be shown and submitted: the override if a rule or
    /// the user supplied one, otherwise the bank's payee.
    pub fn effective_payee(&self) -> Option<&str> {
        self.payee_override
            .as_deref()
            .or(self.bank.payee.as_deref())
    }

    pub fn splits_total_cents(&self) -> Option<i64> {
        self.splits
            .as_ref()
            .map(|splits| splits.iter().map(|s| s.amount_cents).sum())
    }
}
