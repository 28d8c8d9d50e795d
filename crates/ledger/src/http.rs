use abgleich_core::SyncTransaction;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::client::{Category, ImportOutcome, LedgerApi, LedgerEntry, LedgerError};
use crate::import_id::{forced_import_id, import_id};

/// `LedgerApi` over the budgeting ledger's REST interface (bearer-token
/// auth, `data` envelope, amounts in milliunits).
pub struct HttpLedgerClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpLedgerClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        HttpLedgerClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct CategoriesData {
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct TransactionsData {
    transactions: Vec<EntryDto>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EntryDto {
    id: String,
    date: String,
    /// Milliunits: one thousandth of the currency unit.
    amount: i64,
    payee_name: Option<String>,
    memo: Option<String>,
    import_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SaveData {
    #[serde(default)]
    transaction_ids: Vec<String>,
    #[serde(default)]
    duplicate_import_ids: Vec<String>,
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        LedgerError::Network {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            message: e.to_string(),
        }
    }
}

async fn check(resp: reqwest::Response) -> Result<reqwest::Response, LedgerError> {
    match resp.status().as_u16() {
        s if (200..300).contains(&s) => Ok(resp),
        401 | 403 => Err(LedgerError::Unauthorized),
        s => Err(LedgerError::Network {
            status: s,
            message: resp.text().await.unwrap_or_default(),
        }),
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, LedgerError> {
    serde_json::from_value(value).map_err(|e| LedgerError::InvalidResponse(e.to_string()))
}

pub(crate) fn entry_from_wire(dto: EntryDto) -> Result<LedgerEntry, LedgerError> {
    let date = NaiveDate::parse_from_str(&dto.date, "%Y-%m-%d")
        .map_err(|e| LedgerError::InvalidResponse(format!("entry {}: bad date: {e}", dto.id)))?;
    Ok(LedgerEntry {
        id: dto.id,
        date,
        amount_cents: dto.amount / 10,
        payee: dto.payee_name.filter(|s| !s.is_empty()),
        memo: dto.memo.unwrap_or_default(),
        import_id: dto.import_id,
    })
}

/// Memo as submitted to the ledger: the bank memo with the originating
/// reference embedded, which is what the reference dedup strategy later
/// finds on re-sync.
pub(crate) fn submitted_memo(tx: &SyncTransaction) -> String {
    if tx.bank.memo.is_empty() {
        format!("Ref: {}", tx.bank.reference)
    } else {
        format!("{} (Ref: {})", tx.bank.memo, tx.bank.reference)
    }
}

/// One transaction of the submit payload. Splits become sub-transactions;
/// an uncategorized transaction submits without a category and surfaces as
/// uncategorized in the ledger.
pub(crate) fn save_transaction_payload(
    tx: &SyncTransaction,
    account_id: &str,
    force_new_import_id: bool,
) -> serde_json::Value {
    let iid = if force_new_import_id {
        forced_import_id(&tx.bank.id)
    } else {
        import_id(&tx.bank.id)
    };

    let mut payload = serde_json::json!({
        "account_id": account_id,
        "date": tx.bank.booking_date.format("%Y-%m-%d").to_string(),
        "amount": tx.bank.amount_cents * 10,
        "payee_name": tx.effective_payee(),
        "memo": submitted_memo(tx),
        "import_id": iid,
        "cleared": "cleared",
    });

    if let Some(splits) = &tx.splits {
        payload["subtransactions"] = splits
            .iter()
            .map(|s| {
                serde_json::json!({
                    "category_id": s.category_id,
                    "amount": s.amount_cents * 10,
                    "memo": s.memo,
                })
            })
            .collect();
    } else if let Some(category_id) = &tx.category_id {
        payload["category_id"] = serde_json::json!(category_id);
    }

    payload
}

impl LedgerApi for HttpLedgerClient {
    async fn get_categories(&self, budget_id: &str) -> Result<Vec<Category>, LedgerError> {
        let resp = self
            .http
            .get(self.url(&format!("/budgets/{budget_id}/categories")))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = check(resp).await?;
        let body: Envelope<CategoriesData> = decode(resp.json().await?)?;
        Ok(body.data.categories)
    }

    async fn get_recent_entries(
        &self,
        budget_id: &str,
        account_id: &str,
        since_days: u32,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let since = chrono::Utc::now().date_naive() - chrono::Days::new(u64::from(since_days));
        let resp = self
            .http
            .get(self.url(&format!(
                "/budgets/{budget_id}/accounts/{account_id}/transactions"
            )))
            .query(&[("since_date", since.format("%Y-%m-%d").to_string())])
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = check(resp).await?;
        let body: Envelope<TransactionsData> = decode(resp.json().await?)?;
        body.data.transactions.into_iter().map(entry_from_wire).collect()
    }

    async fn submit_transactions(
        &self,
        budget_id: &str,
        account_id: &str,
        transactions: &[SyncTransaction],
        force_new_import_id: bool,
    ) -> Result<ImportOutcome, LedgerError> {
        let payload = serde_json::json!({
            "transactions": transactions
                .iter()
                .map(|tx| save_transaction_payload(tx, account_id, force_new_import_id))
                .collect::<Vec<_>>(),
        });

        tracing::info!(
            count = transactions.len(),
            force = force_new_import_id,
            "submitting import batch"
        );

        let resp = self
            .http
            .post(self.url(&format!("/budgets/{budget_id}/transactions")))
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await?;
        let resp = check(resp).await?;
        let body: Envelope<SaveData> = decode(resp.json().await?)?;

        Ok(ImportOutcome {
            created: body.data.transaction_ids.len(),
            duplicate_import_ids: body.data.duplicate_import_ids,
        })
    }
}
