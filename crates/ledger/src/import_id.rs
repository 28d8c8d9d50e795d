use sha2::{Digest, Sha256};

pub const IMPORT_ID_PREFIX: &str = "abgl:";

fn hex_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Deterministic import id for a bank transaction. The same bank
/// transaction always derives the same id, which is how the ledger rejects
/// re-submission across runs.
pub fn import_id(bank_tx_id: &str) -> String {
    format!("{IMPORT_ID_PREFIX}{}", &hex_digest(bank_tx_id)[..32])
}

/// Salted variant for forced re-imports: a fresh uuid goes into the hash,
/// so the ledger's dedup guard cannot recognize the transaction.
pub fn forced_import_id(bank_tx_id: &str) -> String {
    let salt = uuid::Uuid::new_v4().simple().to_string();
    format!("{IMPORT_ID_PREFIX}{}", &hex_digest(&format!("{bank_tx_id}:{salt}"))[..32])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_id_is_deterministic() {
        assert_eq!(import_id("tx-1"), import_id("tx-1"));
        assert_ne!(import_id("tx-1"), import_id("tx-2"));
    }

    #[test]
    fn import_id_shape() {
        let id = import_id("tx-1");
        assert!(id.starts_with(IMPORT_ID_PREFIX));
        assert_eq!(id.len(), IMPORT_ID_PREFIX.len() + 32);
    }

    #[test]
    fn forced_import_id_is_unique_per_call() {
        assert_ne!(forced_import_id("tx-1"), forced_import_id("tx-1"));
        assert_ne!(forced_import_id("tx-1"), import_id("tx-1"));
    }
}
