use std::io::Write as _;
use std::path::Path;

use abgleich_bank::HttpBankClient;
use abgleich_core::{DuplicateStatus, SyncTransaction};
use abgleich_ledger::HttpLedgerClient;
use abgleich_storage::{DbPool, SqliteSessionStore};
use abgleich_sync::SyncOrchestrator;
use anyhow::Context;

use crate::config::AppConfig;

pub async fn run_sync(config: &AppConfig, pool: &DbPool) -> anyhow::Result<()> {
    let rules = abgleich_storage::load_rules(pool).await?;
    tracing::info!(count = rules.len(), "loaded classification rules");

    let bank = HttpBankClient::new(config.bank.base_url.as_str());
    let ledger = HttpLedgerClient::new(config.ledger.base_url.as_str(), config.ledger.token.as_str());
    let store = SqliteSessionStore::new(pool.clone());
    let mut orchestrator = SyncOrchestrator::new(bank, ledger, store, config.sync_config());
    orchestrator.set_credentials(config.credentials()?);

    let challenge = orchestrator.start_sync(rules).await?;
    println!("Bank challenge issued ({}).", challenge.kind);
    println!("Confirm it in your banking app, then press Enter to continue.");
    wait_for_enter()?;

    orchestrator.confirm_and_fetch().await?;
    print_review(orchestrator.transactions());

    if !prompt_yes("Import now?")? {
        orchestrator.cancel().await;
        println!("Sync cancelled.");
        return Ok(());
    }

    let summary = orchestrator.import().await?;
    println!(
        "Imported {} of {} submitted transaction(s).",
        summary.created, summary.submitted
    );

    if summary.flagged_duplicates > 0 {
        println!(
            "{} transaction(s) were flagged as already present by the ledger.",
            summary.flagged_duplicates
        );
        if prompt_yes("Force-import the flagged transactions?")? {
            let forced = orchestrator.force_import().await?;
            println!("Force-imported {} transaction(s).", forced.created);
        }
    }

    if let Some(session) = orchestrator.session() {
        println!("Session {}: {}", session.id, session.status);
    }
    Ok(())
}

fn print_review(transactions: &[SyncTransaction]) {
    println!(
        "{:<14} {:<10} {:>10}  {:<24} {:<18} {}",
        "ID", "DATE", "AMOUNT", "PAYEE", "CATEGORY", "STATUS"
    );
    for tx in transactions {
        println!(
            "{:<14} {:<10} {:>10}  {:<24} {:<18} {}",
            truncate(&tx.bank.id, 14),
            tx.bank.booking_date,
            format!("{:.2}", tx.bank.amount_cents as f64 / 100.0),
            truncate(tx.effective_payee().unwrap_or("-"), 24),
            truncate(tx.category_name.as_deref().unwrap_or("-"), 18),
            tx.status,
        );
        for link in &tx.links {
            println!("    -> {}: {}", link.label, link.url);
        }
        if let DuplicateStatus::PossibleDuplicate { reason, .. } = &tx.duplicate {
            println!("    ?  {reason}");
        }
    }
}

pub async fn list_rules(pool: &DbPool) -> anyhow::Result<()> {
    let rules = abgleich_storage::load_rules(pool).await?;
    if rules.is_empty() {
        println!("No rules configured.");
        return Ok(());
    }
    println!(
        "{:<5} {:<5} {:<20} {:<10} {:<9} {:<24} {}",
        "PRI", "ID", "NAME", "KIND", "FIELD", "PATTERN", "CATEGORY"
    );
    for rule in rules {
        println!(
            "{:<5} {:<5} {:<20} {:<10} {:<9} {:<24} {}{}",
            rule.priority,
            rule.id,
            truncate(&rule.name, 20),
            rule.kind,
            rule.field,
            truncate(&rule.pattern, 24),
            rule.category_name,
            if rule.enabled { "" } else { " (disabled)" },
        );
    }
    Ok(())
}

pub async fn export_rules(pool: &DbPool) -> anyhow::Result<()> {
    let rules = abgleich_storage::load_rules(pool).await?;
    println!("{}", abgleich_rules::export_rules(&rules)?);
    Ok(())
}

pub async fn import_rules(pool: &DbPool, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;

    let rules = match abgleich_rules::import_rules(&raw) {
        Ok(rules) => rules,
        Err(abgleich_rules::ImportError::Invalid(errors)) => {
            for e in &errors {
                eprintln!("  - {e}");
            }
            anyhow::bail!("{} rule(s) failed to compile; nothing was imported", errors.len());
        }
        Err(e) => return Err(e.into()),
    };

    abgleich_storage::replace_rules(pool, &rules).await?;
    println!("Imported {} rule(s).", rules.len());
    Ok(())
}

pub async fn history(pool: &DbPool) -> anyhow::Result<()> {
    let sessions = abgleich_storage::get_recent_sessions(pool, 10).await?;
    if sessions.is_empty() {
        println!("No sync sessions recorded.");
        return Ok(());
    }
    println!(
        "{:<38} {:<22} {:>5} {:>9} {:>8}  {}",
        "SESSION", "STARTED", "TXS", "IMPORTED", "SKIPPED", "STATUS"
    );
    for session in sessions {
        println!(
            "{:<38} {:<22} {:>5} {:>9} {:>8}  {}",
            session.id,
            session.started_at.format("%Y-%m-%d %H:%M:%S"),
            session.transaction_count,
            session.imported_count,
            session.skipped_count,
            session.status,
        );
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}

fn wait_for_enter() -> anyhow::Result<()> {
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(())
}

fn prompt_yes(question: &str) -> anyhow::Result<bool> {
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}
