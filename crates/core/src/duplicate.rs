use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The closest fuzzy candidate found in the ledger, kept for diagnostics
/// even when it did not clear the match thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzyCandidate {
    pub date: NaiveDate,
    pub amount_cents: i64,
    pub payee: String,
}

/// Diagnostic record explaining how a duplicate verdict was reached.
/// Populated for every `DuplicateStatus` variant so UI and logs can answer
/// "why was this transaction flagged (or not)" without a second lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDetail {
    /// The incoming transaction's bank reference.
    pub reference: String,
    pub reference_match: bool,
    pub import_id_match: bool,
    pub closest_fuzzy: Option<FuzzyCandidate>,
}

impl MatchDetail {
    pub fn new(reference: impl Into<String>) -> Self {
        MatchDetail {
            reference: reference.into(),
            reference_match: false,
            import_id_match: false,
            closest_fuzzy: None,
        }
    }
}

/// Duplicate verdict for one incoming transaction against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicateStatus {
    NotDuplicate(MatchDetail),
    PossibleDuplicate { reason: String, detail: MatchDetail },
    ConfirmedDuplicate { matched_reference: String, detail: MatchDetail },
}

impl DuplicateStatus {
    pub fn detail(&self) -> &MatchDetail {
        match self {
            DuplicateStatus::NotDuplicate(detail) => detail,
            DuplicateStatus::PossibleDuplicate { detail, .. } => detail,
            DuplicateStatus::ConfirmedDuplicate { detail, .. } => detail,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, DuplicateStatus::ConfirmedDuplicate { .. })
    }
}
