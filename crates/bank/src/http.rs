use abgleich_core::BankTransaction;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::client::{AuthError, BankApi, Challenge, Credentials, TokenPair};

const PAGE_SIZE: usize = 50;

/// Header carrying the confirmed-challenge identifier on activation.
const CHALLENGE_HEADER: &str = "x-once-authentication-info";
/// Fixed sentinel confirming the one-time-passcode step completed
/// out-of-band (the bank validates the push confirmation server-side).
const OTP_SENTINEL: &str = "000000";
const OTP_HEADER: &str = "x-once-authentication";

/// `BankApi` over the bank's REST protocol. Thin by design: each trait
/// operation is one round-trip (plus pagination for listings); all protocol
/// sequencing lives in `AuthSessionManager`.
pub struct HttpBankClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBankClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpBankClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Request-correlation header value, stamped fresh on every call.
    fn request_info(&self) -> String {
        serde_json::json!({
            "clientRequestId": {
                "sessionId": uuid::Uuid::new_v4().simple().to_string(),
                "requestId": &uuid::Uuid::new_v4().simple().to_string()[..9],
            }
        })
        .to_string()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    identifier: String,
}

#[derive(Debug, Deserialize)]
struct ChallengeInfo {
    id: String,
    #[serde(rename = "typ")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct TransactionPage {
    values: Vec<serde_json::Value>,
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        AuthError::Network {
            status: e.status().map(|s| s.as_u16()).unwrap_or(0),
            message: e.to_string(),
        }
    }
}

async fn network_error(resp: reqwest::Response) -> AuthError {
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    AuthError::Network { status, message }
}

fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T, AuthError> {
    serde_json::from_value(value).map_err(|e| AuthError::InvalidResponse(e.to_string()))
}

/// Map one wire transaction record into the domain type. The full record is
/// retained as the diagnostic payload.
pub(crate) fn parse_transaction(value: &serde_json::Value) -> Result<BankTransaction, AuthError> {
    let id = value
        .get("transactionId")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AuthError::InvalidResponse("transaction without transactionId".to_string()))?
        .to_string();

    let booking_date = value
        .get("bookingDate")
        .and_then(|v| v.as_str())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        .ok_or_else(|| AuthError::InvalidResponse(format!("transaction {id} without bookingDate")))?;

    let amount_value = value
        .pointer("/amount/value")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AuthError::InvalidResponse(format!("transaction {id} without amount")))?;
    let amount_cents = Decimal::from_str(amount_value)
        .ok()
        .and_then(|d| (d * Decimal::from(100)).to_i64())
        .ok_or_else(|| AuthError::InvalidResponse(format!("unparseable amount '{amount_value}'")))?;

    let currency = value
        .pointer("/amount/unit")
        .and_then(|v| v.as_str())
        .unwrap_or("EUR")
        .to_string();

    let payee = value
        .get("counterpartName")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let memo = value
        .get("remittanceInfo")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .trim()
        .to_string();

    // The end-to-end reference is the dedup key; fall back to the bank's
    // transaction id when a booking carries none.
    let reference = value
        .get("endToEndReference")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(&id)
        .to_string();

    Ok(BankTransaction {
        id,
        booking_date,
        amount_cents,
        currency,
        payee,
        memo,
        reference,
        raw: value.clone(),
    })
}

impl BankApi for HttpBankClient {
    async fn obtain_initial_token(&self, credentials: &Credentials) -> Result<TokenPair, AuthError> {
        let resp = self
            .http
            .post(self.url("/oauth/token"))
            .form(&[
                ("grant_type", "password"),
                ("username", credentials.username.as_str()),
                ("password", credentials.pin.as_str()),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
            ])
            .send()
            .await?;

        match resp.status().as_u16() {
            200 => {
                let body: TokenResponse = decode(resp.json().await?)?;
                Ok(TokenPair {
                    access_token: body.access_token,
                    refresh_token: body.refresh_token,
                })
            }
            400 | 401 => Err(AuthError::InvalidCredentials),
            _ => Err(network_error(resp).await),
        }
    }

    async fn get_session_id(&self, tokens: &TokenPair) -> Result<String, AuthError> {
        let resp = self
            .http
            .get(self.url("/session/clients/user/v1/sessions"))
            .bearer_auth(&tokens.access_token)
            .header("x-http-request-info", self.request_info())
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(network_error(resp).await);
        }
        let sessions: Vec<SessionResponse> = decode(resp.json().await?)?;
        sessions
            .into_iter()
            .next()
            .map(|s| s.identifier)
            .ok_or_else(|| AuthError::InvalidResponse("bank returned no session".to_string()))
    }

    async fn request_challenge(
        &self,
        tokens: &TokenPair,
        session_id: &str,
    ) -> Result<Challenge, AuthError> {
        let resp = self
            .http
            .post(self.url(&format!("/session/clients/user/v1/sessions/{session_id}/validate")))
            .bearer_auth(&tokens.access_token)
            .header("x-http-request-info", self.request_info())
            .json(&serde_json::json!({ "identifier": session_id, "sessionTanActive": true }))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(network_error(resp).await);
        }

        // The challenge rides in a response header, not the body.
        let info = resp
            .headers()
            .get(CHALLENGE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AuthError::InvalidResponse("validation response without challenge".to_string()))?;
        let challenge: ChallengeInfo = serde_json::from_str(info)
            .map_err(|e| AuthError::InvalidResponse(format!("malformed challenge header: {e}")))?;

        Ok(Challenge { id: challenge.id, kind: challenge.kind })
    }

    async fn activate_session(
        &self,
        tokens: &TokenPair,
        session_id: &str,
        challenge_id: &str,
    ) -> Result<(), AuthError> {
        let resp = self
            .http
            .patch(self.url(&format!("/session/clients/user/v1/sessions/{session_id}")))
            .bearer_auth(&tokens.access_token)
            .header("x-http-request-info", self.request_info())
            .header(CHALLENGE_HEADER, serde_json::json!({ "id": challenge_id }).to_string())
            .header(OTP_HEADER, OTP_SENTINEL)
            .json(&serde_json::json!({ "identifier": session_id, "sessionTanActive": true }))
            .send()
            .await?;

        match resp.status().as_u16() {
            200 | 201 => Ok(()),
            403 => Err(AuthError::ChallengeRejected),
            408 => Err(AuthError::ChallengeExpired),
            _ => Err(AuthError::AuthenticationFailed(network_error(resp).await.to_string())),
        }
    }

    async fn upgrade_token(&self, tokens: &TokenPair) -> Result<TokenPair, AuthError> {
        let resp = self
            .http
            .post(self.url("/oauth/token"))
            .form(&[
                ("grant_type", "extended_scope"),
                ("token", tokens.access_token.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(network_error(resp).await);
        }
        let body: TokenResponse = decode(resp.json().await?)?;
        Ok(TokenPair {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
        })
    }

    async fn list_transactions(
        &self,
        tokens: &TokenPair,
        account_id: &str,
        since_days: u32,
    ) -> Result<Vec<BankTransaction>, AuthError> {
        let since = chrono::Utc::now().date_naive() - chrono::Days::new(u64::from(since_days));
        let mut transactions = Vec::new();
        let mut first = 0usize;

        loop {
            let resp = self
                .http
                .get(self.url(&format!("/banking/v1/accounts/{account_id}/transactions")))
                .query(&[
                    ("paging-first", first.to_string()),
                    ("paging-count", PAGE_SIZE.to_string()),
                ])
                .bearer_auth(&tokens.access_token)
                .header("x-http-request-info", self.request_info())
                .send()
                .await?;
            if !resp.status().is_success() {
                return Err(network_error(resp).await);
            }

            let page: TransactionPage = decode(resp.json().await?)?;
            let count = page.values.len();
            let mut left_window = false;

            for value in &page.values {
                let tx = parse_transaction(value)?;
                if tx.booking_date < since {
                    left_window = true;
                    continue;
                }
                transactions.push(tx);
            }

            tracing::debug!(page_start = first, page_len = count, "fetched transaction page");

            // A short page means the listing is exhausted; a booking older
            // than the window means the rest of the (date-ordered) listing
            // is out of range.
            if count < PAGE_SIZE || left_window {
                break;
            }
            first += count;
        }

        Ok(transactions)
    }
}
