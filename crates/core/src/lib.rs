pub mod duplicate;
pub mod rule;
pub mod session;
pub mod transaction;

pub use duplicate::{DuplicateStatus, FuzzyCandidate, MatchDetail};
pub use rule::{MatchField, PatternKind, Rule, RuleId};
pub use session::{SyncSession, SyncSessionId, SyncStatus};
pub use transaction::{
    BankTransaction, CategorySplit, ExternalLink, ImportAttempt, ReviewStatus, SyncTransaction,
};
