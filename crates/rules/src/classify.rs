use abgleich_core::{BankTransaction, MatchField, ReviewStatus, Rule, SyncTransaction};

use crate::compile::{compile_all, CompiledRule, RuleError};
use crate::special::detect_special_links;

/// The text a rule is matched against, per its target field.
pub fn extract_match_text(tx: &BankTransaction, field: MatchField) -> String {
    match field {
        MatchField::Payee => tx.payee.clone().unwrap_or_default(),
        MatchField::Memo => tx.memo.clone(),
        MatchField::Combined => {
            format!("{} {}", tx.payee.as_deref().unwrap_or(""), tx.memo)
        }
    }
}

/// First enabled rule whose matcher hits, scanning in the order supplied.
/// The classifier never re-sorts — rules arrive pre-sorted by priority, so
/// first match wins deterministically.
pub fn classify<'a>(
    rules: &'a [CompiledRule],
    tx: &BankTransaction,
) -> Option<&'a CompiledRule> {
    rules
        .iter()
        .filter(|cr| cr.rule.enabled)
        .find(|cr| cr.is_match(&extract_match_text(tx, cr.rule.field)))
}

/// Compile the ruleset (aborting on any compile error) and turn every bank
/// transaction into a `SyncTransaction` with its initial review status.
///
/// A special-pattern link always demotes a confident rule match to
/// `NeedsAttention`: a match on a marketplace or processor payee is not
/// enough, since the true counterparty is hidden behind the processor.
pub fn classify_transactions(
    rules: &[Rule],
    transactions: Vec<BankTransaction>,
) -> Result<Vec<SyncTransaction>, Vec<RuleError>> {
    let compiled = compile_all(rules)?;

    Ok(transactions
        .into_iter()
        .map(|bank| {
            let links = detect_special_links(&bank);
            let matched = classify(&compiled, &bank);

            let mut tx = SyncTransaction::from_bank(bank);
            if let Some(cr) = matched {
                tx.category_id = Some(cr.rule.category_id.clone());
                tx.category_name = Some(cr.rule.category_name.clone());
                tx.matched_rule_id = Some(cr.rule.id);
                tx.payee_override = cr.rule.payee_override.clone();
            }
            tx.status = match (matched.is_some(), links.is_empty()) {
                (true, true) => ReviewStatus::AutoCategorized,
                (false, true) => ReviewStatus::Pending,
                (_, false) => ReviewStatus::NeedsAttention,
            };
            tx.links = links;
            tx
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use abgleich_core::{PatternKind, RuleId};
    use chrono::{NaiveDate, Utc};

    fn make_rule(
        id: i64,
        pattern: &str,
        kind: PatternKind,
        field: MatchField,
        category: &str,
        priority: i32,
    ) -> Rule {
        Rule {
            id: RuleId(id),
            name: category.to_string(),
            pattern: pattern.to_string(),
            kind,
            field,
            category_id: format!("cat-{id}"),
            category_name: category.to_string(),
            payee_override: None,
            priority,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn make_tx(payee: Option<&str>, memo: &str) -> BankTransaction {
        BankTransaction {
            id: "tx-1".to_string(),
            booking_date: NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
            amount_cents: -2450,
            currency: "EUR".to_string(),
            payee: payee.map(str::to_string),
            memo: memo.to_string(),
            reference: "REF-9".to_string(),
            raw: serde_json::Value::Null,
        }
    }

    #[test]
    fn extract_match_text_per_field() {
        let tx = make_tx(Some("REWE"), "Einkauf Danke");
        assert_eq!(extract_match_text(&tx, MatchField::Payee), "REWE");
        assert_eq!(extract_match_text(&tx, MatchField::Memo), "Einkauf Danke");
        assert_eq!(extract_match_text(&tx, MatchField::Combined), "REWE Einkauf Danke");

        let no_payee = make_tx(None, "Einkauf");
        assert_eq!(extract_match_text(&no_payee, MatchField::Payee), "");
        assert_eq!(extract_match_text(&no_payee, MatchField::Combined), " Einkauf");
    }

    #[test]
    fn first_match_wins_in_supplied_order() {
        let rules = vec![
            make_rule(1, "REWE", PatternKind::Substring, MatchField::Memo, "Groceries", 1),
            make_rule(2, "REWE", PatternKind::Substring, MatchField::Memo, "Beverages", 2),
        ];
        let compiled = compile_all(&rules).unwrap();
        let hit = classify(&compiled, &make_tx(None, "REWE Markt")).unwrap();
        assert_eq!(hit.rule.id, RuleId(1));
    }

    #[test]
    fn disabled_rules_are_skipped() {
        let mut first = make_rule(1, "REWE", PatternKind::Substring, MatchField::Memo, "Groceries", 1);
        first.enabled = false;
        let rules = vec![
            first,
            make_rule(2, "REWE", PatternKind::Substring, MatchField::Memo, "Beverages", 2),
        ];
        let compiled = compile_all(&rules).unwrap();
        let hit = classify(&compiled, &make_tx(None, "REWE Markt")).unwrap();
        assert_eq!(hit.rule.id, RuleId(2));
    }

    #[test]
    fn exact_loses_to_substring_on_longer_memo() {
        // Priority 1 is exact "REWE", priority 2 is substring "REWE".
        let rules = vec![
            make_rule(1, "REWE", PatternKind::Exact, MatchField::Memo, "Groceries", 1),
            make_rule(2, "REWE", PatternKind::Substring, MatchField::Memo, "Beverages", 2),
        ];
        let compiled = compile_all(&rules).unwrap();

        // Memo is not exactly "REWE", so the exact rule fails and the
        // substring rule categorizes to Beverages.
        let hit = classify(&compiled, &make_tx(None, "REWE Getränke 24")).unwrap();
        assert_eq!(hit.rule.category_name, "Beverages");

        // Memo exactly "REWE" → the priority-1 exact rule wins.
        let hit = classify(&compiled, &make_tx(None, "REWE")).unwrap();
        assert_eq!(hit.rule.category_name, "Groceries");
    }

    #[test]
    fn status_table_rule_only_is_auto_categorized() {
        let rules = vec![make_rule(1, "REWE", PatternKind::Substring, MatchField::Combined, "Groceries", 1)];
        let txs = classify_transactions(&rules, vec![make_tx(Some("REWE"), "Einkauf")]).unwrap();
        assert_eq!(txs[0].status, ReviewStatus::AutoCategorized);
        assert_eq!(txs[0].category_name.as_deref(), Some("Groceries"));
        assert_eq!(txs[0].matched_rule_id, Some(RuleId(1)));
    }

    #[test]
    fn status_table_no_rule_no_link_is_pending() {
        let txs = classify_transactions(&[], vec![make_tx(Some("EDEKA"), "Einkauf")]).unwrap();
        assert_eq!(txs[0].status, ReviewStatus::Pending);
        assert!(txs[0].category_id.is_none());
    }

    #[test]
    fn marketplace_link_overrides_rule_match() {
        // Even with a confident category rule, an Amazon payee needs the
        // user's attention — and carries the order-specific link.
        let rules = vec![make_rule(1, "amazon", PatternKind::Substring, MatchField::Combined, "Shopping", 1)];
        let txs = classify_transactions(
            &rules,
            vec![make_tx(Some("AMAZON PAYMENTS EU"), "303-1234567-1234567 Bestellung")],
        )
        .unwrap();
        assert_eq!(txs[0].status, ReviewStatus::NeedsAttention);
        assert_eq!(txs[0].category_name.as_deref(), Some("Shopping"));
        assert_eq!(txs[0].links.len(), 1);
        assert!(txs[0].links[0].url.contains("303-1234567-1234567"));
    }

    #[test]
    fn link_without_rule_is_needs_attention() {
        let txs = classify_transactions(&[], vec![make_tx(Some("PAYPAL *STEAM"), "Zahlung")]).unwrap();
        assert_eq!(txs[0].status, ReviewStatus::NeedsAttention);
        assert!(txs[0].category_id.is_none());
        assert_eq!(txs[0].links.len(), 1);
    }

    #[test]
    fn compile_error_aborts_classification() {
        let rules = vec![make_rule(1, r"([broken", PatternKind::FullRegex, MatchField::Memo, "X", 1)];
        let errs = classify_transactions(&rules, vec![make_tx(None, "REWE")]).unwrap_err();
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn rule_payee_override_is_copied() {
        let mut rule = make_rule(1, "REWE", PatternKind::Substring, MatchField::Combined, "Groceries", 1);
        rule.payee_override = Some("REWE Markt".to_string());
        let txs = classify_transactions(&[rule], vec![make_tx(Some("REWE SAGT DANKE 44021"), "Einkauf")]).unwrap();
        assert_eq!(txs[0].payee_override.as_deref(), Some("REWE Markt"));
        assert_eq!(txs[0].effective_payee(), Some("REWE Markt"));
    }
}
