use std::path::{Path, PathBuf};

use abgleich_bank::Credentials;
use abgleich_sync::{DedupConfig, SyncConfig};
use anyhow::Context;
use serde::Deserialize;

fn default_lookback_days() -> u32 {
    30
}

fn default_day_tolerance() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct BankSection {
    pub base_url: String,
    pub account_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub username: Option<String>,
    /// May be omitted and supplied via `ABGLEICH_PIN` instead.
    pub pin: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LedgerSection {
    pub base_url: String,
    pub token: String,
    pub budget_id: String,
    pub account_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SyncSection {
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
    #[serde(default = "default_day_tolerance")]
    pub dedup_day_tolerance: i64,
}

impl Default for SyncSection {
    fn default() -> Self {
        SyncSection {
            lookback_days: default_lookback_days(),
            dedup_day_tolerance: default_day_tolerance(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    pub bank: BankSection,
    pub ledger: LedgerSection,
    #[serde(default)]
    pub sync: SyncSection,
}

impl AppConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Default location: `<platform config dir>/abgleich/config.toml`.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("de", "abgleich", "abgleich")
            .context("could not determine the config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn data_dir() -> anyhow::Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("de", "abgleich", "abgleich")
            .context("could not determine the data directory")?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Bank credentials, with the PIN falling back to the environment so it
    /// does not have to live in the config file.
    pub fn credentials(&self) -> anyhow::Result<Credentials> {
        let username = self
            .bank
            .username
            .clone()
            .or_else(|| std::env::var("ABGLEICH_USER").ok())
            .context("bank username missing (config [bank].username or ABGLEICH_USER)")?;
        let pin = self
            .bank
            .pin
            .clone()
            .or_else(|| std::env::var("ABGLEICH_PIN").ok())
            .context("bank PIN missing (config [bank].pin or ABGLEICH_PIN)")?;
        Ok(Credentials {
            username,
            pin,
            client_id: self.bank.client_id.clone(),
            client_secret: self.bank.client_secret.clone(),
        })
    }

    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig {
            bank_account_id: self.bank.account_id.clone(),
            budget_id: self.ledger.budget_id.clone(),
            ledger_account_id: self.ledger.account_id.clone(),
            lookback_days: self.sync.lookback_days,
            dedup: DedupConfig { day_tolerance: self.sync.dedup_day_tolerance },
        }
    }
}
