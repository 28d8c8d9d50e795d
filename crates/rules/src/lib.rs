pub mod classify;
pub mod compile;
pub mod export;
pub mod special;

pub use classify::{classify, classify_transactions, extract_match_text};
pub use compile::{compile, compile_all, CompiledRule, RuleError};
pub use export::{export_rules, import_rules, ImportError};
pub use special::detect_special_links;
