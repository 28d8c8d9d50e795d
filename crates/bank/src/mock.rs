use abgleich_core::BankTransaction;

use crate::client::{AuthError, BankApi, Challenge, Credentials, TokenPair};

/// Scriptable in-memory bank — lets the auth and sync state machines be
/// exercised without a network or a real banking backend. Each `*_error`
/// field, when set, makes the corresponding protocol step fail with that
/// error; everything else succeeds with canned data.
#[derive(Default)]
pub struct MockBankClient {
    pub transactions: Vec<BankTransaction>,
    pub token_error: Option<AuthError>,
    pub challenge_error: Option<AuthError>,
    pub activation_error: Option<AuthError>,
    pub upgrade_error: Option<AuthError>,
    pub list_error: Option<AuthError>,
}

impl BankApi for MockBankClient {
    async fn obtain_initial_token(&self, _credentials: &Credentials) -> Result<TokenPair, AuthError> {
        match &self.token_error {
            Some(e) => Err(e.clone()),
            None => Ok(TokenPair {
                access_token: "initial-access".to_string(),
                refresh_token: "initial-refresh".to_string(),
            }),
        }
    }

    async fn get_session_id(&self, _tokens: &TokenPair) -> Result<String, AuthError> {
        Ok("mock-bank-session".to_string())
    }

    async fn request_challenge(
        &self,
        _tokens: &TokenPair,
        _session_id: &str,
    ) -> Result<Challenge, AuthError> {
        match &self.challenge_error {
            Some(e) => Err(e.clone()),
            None => Ok(Challenge {
                id: "mock-challenge-1".to_string(),
                kind: "P_TAN_PUSH".to_string(),
            }),
        }
    }

    async fn activate_session(
        &self,
        _tokens: &TokenPair,
        _session_id: &str,
        _challenge_id: &str,
    ) -> Result<(), AuthError> {
        match &self.activation_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn upgrade_token(&self, _tokens: &TokenPair) -> Result<TokenPair, AuthError> {
        match &self.upgrade_error {
            Some(e) => Err(e.clone()),
            None => Ok(TokenPair {
                access_token: "upgraded-access".to_string(),
                refresh_token: "upgraded-refresh".to_string(),
            }),
        }
    }

    async fn list_transactions(
        &self,
        _tokens: &TokenPair,
        _account_id: &str,
        _since_days: u32,
    ) -> Result<Vec<BankTransaction>, AuthError> {
        match &self.list_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.transactions.clone()),
        }
    }
}
