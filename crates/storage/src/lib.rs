pub mod db;
pub mod session_store;

pub use db::{
    create_db, delete_rule, get_recent_sessions, insert_rule, load_rules, reorder_rules,
    replace_rules, save_session, update_rule, DbPool, NewRule, StorageError,
};
pub use session_store::SqliteSessionStore;
