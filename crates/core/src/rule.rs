use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(pub i64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a rule's pattern text is interpreted when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PatternKind {
    /// The whole target field must equal the pattern text.
    Exact,
    /// The pattern text may occur anywhere in the target field.
    #[default]
    Substring,
    /// The pattern text is a full regular expression, used unmodified.
    FullRegex,
}

impl std::str::FromStr for PatternKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(PatternKind::Exact),
            "substring" | "contains" => Ok(PatternKind::Substring),
            "regex" => Ok(PatternKind::FullRegex),
            other => Err(format!("Unknown pattern kind: '{other}'")),
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternKind::Exact => write!(f, "exact"),
            PatternKind::Substring => write!(f, "substring"),
            PatternKind::FullRegex => write!(f, "regex"),
        }
    }
}

/// Which transaction field the rule is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MatchField {
    Payee,
    Memo,
    /// Payee and memo joined by a single space.
    #[default]
    Combined,
}

impl std::str::FromStr for MatchField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "payee" => Ok(MatchField::Payee),
            "memo" => Ok(MatchField::Memo),
            "combined" => Ok(MatchField::Combined),
            other => Err(format!("Unknown match field: '{other}'")),
        }
    }
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchField::Payee => write!(f, "payee"),
            MatchField::Memo => write!(f, "memo"),
            MatchField::Combined => write!(f, "combined"),
        }
    }
}

/// A user-authored classification directive. Rules are created and edited by
/// the rule-management surface and consumed read-only by the classifier,
/// which expects them pre-sorted by `priority` (lower sorts first).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub id: RuleId,
    pub name: String,
    pub pattern: String,
    pub kind: PatternKind,
    pub field: MatchField,
    pub category_id: String,
    /// Cached display name of the destination category.
    pub category_name: String,
    pub payee_override: Option<String>,
    pub priority: i32,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
