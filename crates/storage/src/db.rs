use std::path::Path;
use std::str::FromStr;

use abgleich_core::{
    MatchField, PatternKind, Rule, RuleId, SyncSession, SyncSessionId, SyncStatus,
};
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub async fn create_db(path: &Path) -> Result<DbPool, StorageError> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            pattern TEXT NOT NULL,
            kind TEXT NOT NULL,
            field TEXT NOT NULL,
            category_id TEXT NOT NULL,
            category_name TEXT NOT NULL,
            payee_override TEXT,
            priority INTEGER NOT NULL,
            enabled INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sync_sessions (
            id TEXT PRIMARY KEY,
            started_at TEXT NOT NULL,
            completed_at TEXT,
            status TEXT NOT NULL,
            failure_reason TEXT,
            transaction_count INTEGER NOT NULL DEFAULT 0,
            imported_count INTEGER NOT NULL DEFAULT 0,
            skipped_count INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

// ── Rules ────────────────────────────────────────────────────────────────────

/// Draft of a rule before the database assigns its id.
#[derive(Debug, Clone)]
pub struct NewRule {
    pub name: String,
    pub pattern: String,
    pub kind: PatternKind,
    pub field: MatchField,
    pub category_id: String,
    pub category_name: String,
    pub payee_override: Option<String>,
    pub priority: i32,
    pub enabled: bool,
}

fn parse_timestamp(s: &str, what: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt(format!("{what}: {e}")))
}

type RuleRow = (
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    i32,
    i64,
    String,
    String,
);

fn rule_from_row(r: RuleRow) -> Result<Rule, StorageError> {
    Ok(Rule {
        id: RuleId(r.0),
        name: r.1,
        pattern: r.2,
        kind: PatternKind::from_str(&r.3).map_err(StorageError::Corrupt)?,
        field: MatchField::from_str(&r.4).map_err(StorageError::Corrupt)?,
        category_id: r.5,
        category_name: r.6,
        payee_override: r.7,
        priority: r.8,
        enabled: r.9 != 0,
        created_at: parse_timestamp(&r.10, "rule created_at")?,
        updated_at: parse_timestamp(&r.11, "rule updated_at")?,
    })
}

/// All rules — enabled and disabled — pre-sorted by priority. This is the
/// order the classifier consumes; it never re-sorts.
pub async fn load_rules(pool: &DbPool) -> Result<Vec<Rule>, StorageError> {
    let rows = sqlx::query_as::<_, RuleRow>(
        "SELECT id, name, pattern, kind, field, category_id, category_name, payee_override, priority, enabled, created_at, updated_at FROM rules ORDER BY priority, id",
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(rule_from_row).collect()
}

pub async fn insert_rule(pool: &DbPool, rule: &NewRule) -> Result<RuleId, StorageError> {
    let now = Utc::now().to_rfc3339();
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO rules (name, pattern, kind, field, category_id, category_name, payee_override, priority, enabled, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(&rule.name)
    .bind(&rule.pattern)
    .bind(rule.kind.to_string())
    .bind(rule.field.to_string())
    .bind(&rule.category_id)
    .bind(&rule.category_name)
    .bind(&rule.payee_override)
    .bind(rule.priority)
    .bind(i64::from(rule.enabled))
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await?;

    Ok(RuleId(row.0))
}

pub async fn update_rule(pool: &DbPool, rule: &Rule) -> Result<(), StorageError> {
    sqlx::query(
        "UPDATE rules SET name = ?, pattern = ?, kind = ?, field = ?, category_id = ?, category_name = ?, payee_override = ?, priority = ?, enabled = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&rule.name)
    .bind(&rule.pattern)
    .bind(rule.kind.to_string())
    .bind(rule.field.to_string())
    .bind(&rule.category_id)
    .bind(&rule.category_name)
    .bind(&rule.payee_override)
    .bind(rule.priority)
    .bind(i64::from(rule.enabled))
    .bind(Utc::now().to_rfc3339())
    .bind(rule.id.0)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_rule(pool: &DbPool, id: RuleId) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM rules WHERE id = ?")
        .bind(id.0)
        .execute(pool)
        .await?;
    Ok(())
}

/// Rewrite priorities to match the given id order (1, 2, 3, …).
pub async fn reorder_rules(pool: &DbPool, order: &[RuleId]) -> Result<(), StorageError> {
    for (position, id) in order.iter().enumerate() {
        sqlx::query("UPDATE rules SET priority = ?, updated_at = ? WHERE id = ?")
            .bind(position as i32 + 1)
            .bind(Utc::now().to_rfc3339())
            .bind(id.0)
            .execute(pool)
            .await?;
    }
    Ok(())
}

/// Replace the whole ruleset in one transaction — the persistence half of
/// rule import. The caller validates that every rule compiles first.
pub async fn replace_rules(pool: &DbPool, rules: &[Rule]) -> Result<(), StorageError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM rules").execute(&mut *tx).await?;
    for rule in rules {
        sqlx::query(
            "INSERT INTO rules (name, pattern, kind, field, category_id, category_name, payee_override, priority, enabled, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&rule.name)
        .bind(&rule.pattern)
        .bind(rule.kind.to_string())
        .bind(rule.field.to_string())
        .bind(&rule.category_id)
        .bind(&rule.category_name)
        .bind(&rule.payee_override)
        .bind(rule.priority)
        .bind(i64::from(rule.enabled))
        .bind(rule.created_at.to_rfc3339())
        .bind(rule.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

// ── Sync sessions ────────────────────────────────────────────────────────────

fn status_from_row(code: &str, reason: Option<String>) -> SyncStatus {
    match code {
        "awaiting-bank-auth" => SyncStatus::AwaitingBankAuth,
        "awaiting-user-confirmation" => SyncStatus::AwaitingUserConfirmation,
        "fetching-transactions" => SyncStatus::FetchingTransactions,
        "reviewing-transactions" => SyncStatus::ReviewingTransactions,
        "importing" => SyncStatus::Importing,
        "completed" => SyncStatus::Completed,
        "failed" => SyncStatus::Failed { reason: reason.unwrap_or_default() },
        other => SyncStatus::Failed { reason: format!("unknown status '{other}'") },
    }
}

/// Upsert one session snapshot — called at every status transition.
pub async fn save_session(pool: &DbPool, session: &SyncSession) -> Result<(), StorageError> {
    let failure_reason = match &session.status {
        SyncStatus::Failed { reason } => Some(reason.clone()),
        _ => None,
    };

    sqlx::query(
        r#"
        INSERT INTO sync_sessions (id, started_at, completed_at, status, failure_reason, transaction_count, imported_count, skipped_count)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            completed_at = excluded.completed_at,
            status = excluded.status,
            failure_reason = excluded.failure_reason,
            transaction_count = excluded.transaction_count,
            imported_count = excluded.imported_count,
            skipped_count = excluded.skipped_count
        "#,
    )
    .bind(&session.id.0)
    .bind(session.started_at.to_rfc3339())
    .bind(session.completed_at.map(|d| d.to_rfc3339()))
    .bind(session.status.code())
    .bind(failure_reason)
    .bind(session.transaction_count as i64)
    .bind(session.imported_count as i64)
    .bind(session.skipped_count as i64)
    .execute(pool)
    .await?;
    Ok(())
}

type SessionRow = (
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    i64,
    i64,
    i64,
);

fn session_from_row(r: SessionRow) -> Result<SyncSession, StorageError> {
    Ok(SyncSession {
        id: SyncSessionId(r.0),
        started_at: parse_timestamp(&r.1, "session started_at")?,
        completed_at: r.2.as_deref().map(|s| parse_timestamp(s, "session completed_at")).transpose()?,
        status: status_from_row(&r.3, r.4),
        transaction_count: r.5 as usize,
        imported_count: r.6 as usize,
        skipped_count: r.7 as usize,
    })
}

/// Most recent sessions first.
pub async fn get_recent_sessions(pool: &DbPool, limit: u32) -> Result<Vec<SyncSession>, StorageError> {
    let rows = sqlx::query_as::<_, SessionRow>(
        "SELECT id, started_at, completed_at, status, failure_reason, transaction_count, imported_count, skipped_count FROM sync_sessions ORDER BY started_at DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(session_from_row).collect()
}
