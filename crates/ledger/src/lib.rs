pub mod client;
pub mod http;
pub mod import_id;
pub mod mock;

pub use client::{Category, ImportOutcome, LedgerApi, LedgerEntry, LedgerError};
pub use http::HttpLedgerClient;
pub use import_id::{forced_import_id, import_id, IMPORT_ID_PREFIX};
pub use mock::MockLedgerClient;
