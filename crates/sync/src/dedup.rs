use abgleich_core::{DuplicateStatus, FuzzyCandidate, MatchDetail, SyncTransaction};
use abgleich_ledger::{import_id, LedgerEntry};

/// Tolerances for the fuzzy strategy. Fixed policy: amounts must be
/// exactly equal; only the date window is tunable.
#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    pub day_tolerance: i64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        DedupConfig { day_tolerance: 1 }
    }
}

/// Compares incoming transactions against already-imported ledger entries.
/// Three independent strategies, in priority order: reference (the ledger
/// memo contains the literal bank reference) > import-id (the entry carries
/// the deterministic id of a previous import of this transaction) > fuzzy
/// (date within tolerance, amount exactly equal, payee containment either
/// direction — ledger payee fields are often truncated).
pub struct DuplicateDetector {
    config: DedupConfig,
}

impl DuplicateDetector {
    pub fn new(config: DedupConfig) -> Self {
        DuplicateDetector { config }
    }

    /// Enrich every transaction with a duplicate verdict. Pure with respect
    /// to review state: only `duplicate` changes — what to do about a
    /// confirmed duplicate is the orchestrator's decision. Each verdict is
    /// a function of the transaction and the entry set alone, so the result
    /// does not depend on processing order.
    pub fn mark_duplicates(
        &self,
        entries: &[LedgerEntry],
        mut transactions: Vec<SyncTransaction>,
    ) -> Vec<SyncTransaction> {
        for tx in &mut transactions {
            tx.duplicate = self.check(entries, tx);
        }
        transactions
    }

    fn check(&self, entries: &[LedgerEntry], tx: &SyncTransaction) -> DuplicateStatus {
        let reference = &tx.bank.reference;
        let derived_import_id = import_id(&tx.bank.id);

        let reference_hit = entries
            .iter()
            .find(|e| !reference.is_empty() && e.memo.contains(reference.as_str()));
        let import_hit = entries
            .iter()
            .find(|e| e.import_id.as_deref() == Some(derived_import_id.as_str()));
        let fuzzy_hit = self.closest_fuzzy(entries, tx);

        let mut detail = MatchDetail::new(reference.clone());
        detail.reference_match = reference_hit.is_some();
        detail.import_id_match = import_hit.is_some();
        detail.closest_fuzzy = fuzzy_hit.map(|e| FuzzyCandidate {
            date: e.date,
            amount_cents: e.amount_cents,
            payee: e.payee.clone().unwrap_or_default(),
        });

        if reference_hit.is_some() || import_hit.is_some() {
            return DuplicateStatus::ConfirmedDuplicate {
                matched_reference: reference.clone(),
                detail,
            };
        }

        if let Some(entry) = fuzzy_hit {
            let reason = format!(
                "Similar ledger entry: {} on {} ({} cents)",
                entry.payee.as_deref().unwrap_or("(no payee)"),
                entry.date,
                entry.amount_cents,
            );
            return DuplicateStatus::PossibleDuplicate { reason, detail };
        }

        DuplicateStatus::NotDuplicate(detail)
    }

    /// Closest entry clearing all three fuzzy gates, by date distance.
    fn closest_fuzzy<'a>(
        &self,
        entries: &'a [LedgerEntry],
        tx: &SyncTransaction,
    ) -> Option<&'a LedgerEntry> {
        let tx_payee = tx.bank.payee.as_deref().unwrap_or("").to_lowercase();
        if tx_payee.is_empty() {
            return None;
        }

        entries
            .iter()
            .filter(|e| e.amount_cents == tx.bank.amount_cents)
            .filter(|e| {
                (e.date - tx.bank.booking_date).num_days().abs() <= self.config.day_tolerance
            })
            .filter(|e| {
                let entry_payee = e.payee.as_deref().unwrap_or("").to_lowercase();
                !entry_payee.is_empty()
                    && (entry_payee.contains(&tx_payee) || tx_payee.contains(&entry_payee))
            })
            .min_by_key(|e| (e.date - tx.bank.booking_date).num_days().abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abgleich_core::BankTransaction;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn tx(id: &str, reference: &str, d: NaiveDate, amount: i64, payee: Option<&str>) -> SyncTransaction {
        SyncTransaction::from_bank(BankTransaction {
            id: id.to_string(),
            booking_date: d,
            amount_cents: amount,
            currency: "EUR".to_string(),
            payee: payee.map(str::to_string),
            memo: "Einkauf".to_string(),
            reference: reference.to_string(),
            raw: serde_json::Value::Null,
        })
    }

    fn entry(id: &str, d: NaiveDate, amount: i64, payee: Option<&str>, memo: &str) -> LedgerEntry {
        LedgerEntry {
            id: id.to_string(),
            date: d,
            amount_cents: amount,
            payee: payee.map(str::to_string),
            memo: memo.to_string(),
            import_id: None,
        }
    }

    #[test]
    fn reference_in_memo_confirms_regardless_of_amount_and_date() {
        let entries = vec![entry("e1", date(2024, 11, 1), -9999, Some("Cafe"), "Lunch, Ref: TX-998")];
        let txs = vec![tx("t1", "TX-998", date(2025, 5, 8), -1850, Some("REWE"))];

        let marked = DuplicateDetector::new(DedupConfig::default()).mark_duplicates(&entries, txs);
        match &marked[0].duplicate {
            DuplicateStatus::ConfirmedDuplicate { matched_reference, detail } => {
                assert_eq!(matched_reference, "TX-998");
                assert!(detail.reference_match);
                assert!(!detail.import_id_match);
            }
            other => panic!("expected confirmed duplicate, got {other:?}"),
        }
    }

    #[test]
    fn import_id_match_confirms() {
        let mut e = entry("e1", date(2025, 5, 8), -1850, Some("REWE"), "unrelated memo");
        e.import_id = Some(import_id("t1"));
        let txs = vec![tx("t1", "OTHER-REF", date(2025, 5, 8), -1850, Some("REWE"))];

        let marked = DuplicateDetector::new(DedupConfig::default()).mark_duplicates(&[e], txs);
        assert!(marked[0].duplicate.is_confirmed());
        assert!(marked[0].duplicate.detail().import_id_match);
    }

    #[test]
    fn fuzzy_only_match_is_possible_with_reason() {
        let entries = vec![entry("e1", date(2025, 5, 9), -1850, Some("REWE"), "Groceries")];
        let txs = vec![tx("t1", "TX-1", date(2025, 5, 8), -1850, Some("REWE SAGT DANKE"))];

        let marked = DuplicateDetector::new(DedupConfig::default()).mark_duplicates(&entries, txs);
        match &marked[0].duplicate {
            DuplicateStatus::PossibleDuplicate { reason, detail } => {
                assert!(reason.contains("REWE"), "reason was: {reason}");
                assert!(detail.closest_fuzzy.is_some());
            }
            other => panic!("expected possible duplicate, got {other:?}"),
        }
    }

    #[test]
    fn fuzzy_requires_exact_amount() {
        let entries = vec![entry("e1", date(2025, 5, 8), -1851, Some("REWE"), "x")];
        let txs = vec![tx("t1", "TX-1", date(2025, 5, 8), -1850, Some("REWE"))];
        let marked = DuplicateDetector::new(DedupConfig::default()).mark_duplicates(&entries, txs);
        assert!(matches!(marked[0].duplicate, DuplicateStatus::NotDuplicate(_)));
    }

    #[test]
    fn fuzzy_respects_the_day_tolerance() {
        let entries = vec![entry("e1", date(2025, 5, 10), -1850, Some("REWE"), "x")];
        let txs = vec![tx("t1", "TX-1", date(2025, 5, 8), -1850, Some("REWE"))];

        let default_window = DuplicateDetector::new(DedupConfig::default());
        let marked = default_window.mark_duplicates(&entries.clone(), txs.clone());
        assert!(matches!(marked[0].duplicate, DuplicateStatus::NotDuplicate(_)));

        let widened = DuplicateDetector::new(DedupConfig { day_tolerance: 3 });
        let marked = widened.mark_duplicates(&entries, txs);
        assert!(matches!(marked[0].duplicate, DuplicateStatus::PossibleDuplicate { .. }));
    }

    #[test]
    fn fuzzy_payee_containment_handles_truncation() {
        // The ledger truncated the payee; containment still matches.
        let entries = vec![entry("e1", date(2025, 5, 8), -1850, Some("rewe"), "x")];
        let txs = vec![tx("t1", "TX-1", date(2025, 5, 8), -1850, Some("REWE SAGT DANKE 44021"))];
        let marked = DuplicateDetector::new(DedupConfig::default()).mark_duplicates(&entries, txs);
        assert!(matches!(marked[0].duplicate, DuplicateStatus::PossibleDuplicate { .. }));
    }

    #[test]
    fn missing_payee_never_fuzzy_matches() {
        let entries = vec![entry("e1", date(2025, 5, 8), -1850, None, "x")];
        let txs = vec![
            tx("t1", "TX-1", date(2025, 5, 8), -1850, None),
            tx("t2", "TX-2", date(2025, 5, 8), -1850, Some("REWE")),
        ];
        let marked = DuplicateDetector::new(DedupConfig::default()).mark_duplicates(&entries, txs);
        assert!(matches!(marked[0].duplicate, DuplicateStatus::NotDuplicate(_)));
        assert!(matches!(marked[1].duplicate, DuplicateStatus::NotDuplicate(_)));
    }

    #[test]
    fn detail_is_populated_even_without_any_match() {
        let txs = vec![tx("t1", "TX-1", date(2025, 5, 8), -1850, Some("REWE"))];
        let marked = DuplicateDetector::new(DedupConfig::default()).mark_duplicates(&[], txs);
        let detail = marked[0].duplicate.detail();
        assert_eq!(detail.reference, "TX-1");
        assert!(!detail.reference_match);
        assert!(!detail.import_id_match);
        assert!(detail.closest_fuzzy.is_none());
    }

    #[test]
    fn reference_outranks_fuzzy_and_keeps_the_fuzzy_diagnostic() {
        let entries = vec![
            entry("e1", date(2025, 5, 8), -1850, Some("REWE"), "Groceries"),
            entry("e2", date(2024, 1, 1), 1, None, "Ref: TX-1"),
        ];
        let txs = vec![tx("t1", "TX-1", date(2025, 5, 8), -1850, Some("REWE"))];
        let marked = DuplicateDetector::new(DedupConfig::default()).mark_duplicates(&entries, txs);
        assert!(marked[0].duplicate.is_confirmed());
        // The closest fuzzy candidate is still recorded for diagnostics.
        assert!(marked[0].duplicate.detail().closest_fuzzy.is_some());
    }

    #[test]
    fn verdicts_do_not_depend_on_transaction_order() {
        let entries = vec![
            entry("e1", date(2025, 5, 8), -1850, Some("REWE"), "Lunch, Ref: TX-A"),
            entry("e2", date(2025, 5, 9), -300, Some("Bäcker"), "Brot"),
        ];
        let a = tx("t1", "TX-A", date(2025, 5, 8), -1850, Some("REWE"));
        let b = tx("t2", "TX-B", date(2025, 5, 9), -300, Some("Bäckerei Schmidt"));
        let c = tx("t3", "TX-C", date(2025, 5, 10), -4200, Some("Tankstelle"));

        let detector = DuplicateDetector::new(DedupConfig::default());
        let forward = detector.mark_duplicates(&entries, vec![a.clone(), b.clone(), c.clone()]);
        let backward = detector.mark_duplicates(&entries, vec![c, b, a]);

        for tx in &forward {
            let other = backward
                .iter()
                .find(|o| o.bank.id == tx.bank.id)
                .unwrap();
            assert_eq!(tx.duplicate, other.duplicate, "divergence for {}", tx.bank.id);
        }
    }
}
