use abgleich_core::Rule;
use thiserror::Error;

use crate::compile::{compile_all, RuleError};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Malformed rule list: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("{} rule(s) failed to compile", .0.len())]
    Invalid(Vec<RuleError>),
}

/// Serialize the ruleset for backup or transfer. The wire format is a plain
/// JSON list of rules.
pub fn export_rules(rules: &[Rule]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(rules)
}

/// Parse a serialized rule list and revalidate that every rule compiles
/// before anything is persisted — all-or-nothing, matching `compile_all`.
pub fn import_rules(json: &str) -> Result<Vec<Rule>, ImportError> {
    let rules: Vec<Rule> = serde_json::from_str(json)?;
    compile_all(&rules).map_err(ImportError::Invalid)?;
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, extract_match_text};
    use abgleich_core::{BankTransaction, MatchField, PatternKind, RuleId};
    use chrono::{NaiveDate, Utc};

    fn make_rule(id: i64, pattern: &str, kind: PatternKind, priority: i32) -> Rule {
        Rule {
            id: RuleId(id),
            name: format!("rule-{id}"),
            pattern: pattern.to_string(),
            kind,
            field: MatchField::Combined,
            category_id: format!("cat-{id}"),
            category_name: format!("Category {id}"),
            payee_override: None,
            priority,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn make_tx(payee: &str, memo: &str) -> BankTransaction {
        BankTransaction {
            id: "tx".to_string(),
            booking_date: NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
            amount_cents: -500,
            currency: "EUR".to_string(),
            payee: Some(payee.to_string()),
            memo: memo.to_string(),
            reference: "R".to_string(),
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn round_trip_preserves_classification_behavior() {
        let rules = vec![
            make_rule(1, "REWE", PatternKind::Exact, 1),
            make_rule(2, "rewe", PatternKind::Substring, 2),
            make_rule(3, r"dm[- ]drogerie", PatternKind::FullRegex, 3),
        ];

        let json = export_rules(&rules).unwrap();
        let imported = import_rules(&json).unwrap();

        let before = compile_all(&rules).unwrap();
        let after = compile_all(&imported).unwrap();

        let probes = [
            make_tx("REWE", ""),
            make_tx("REWE Getränke 24", "Einkauf"),
            make_tx("DM-DROGERIE MARKT", "Danke"),
            make_tx("EDEKA", "Einkauf"),
        ];
        for probe in &probes {
            let a = classify(&before, probe).map(|c| c.rule.category_id.clone());
            let b = classify(&after, probe).map(|c| c.rule.category_id.clone());
            assert_eq!(a, b, "divergence on {:?}", extract_match_text(probe, MatchField::Combined));
        }
    }

    #[test]
    fn import_rejects_rule_sets_with_broken_patterns() {
        let rules = vec![
            make_rule(1, "REWE", PatternKind::Substring, 1),
            make_rule(2, r"([broken", PatternKind::FullRegex, 2),
        ];
        let json = export_rules(&rules).unwrap();
        match import_rules(&json) {
            Err(ImportError::Invalid(errs)) => assert_eq!(errs.len(), 1),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn import_rejects_malformed_json() {
        assert!(matches!(import_rules("not json"), Err(ImportError::Malformed(_))));
    }
}
