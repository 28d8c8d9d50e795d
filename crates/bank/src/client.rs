use abgleich_core::BankTransaction;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Challenge expired before it was confirmed")]
    ChallengeExpired,
    #[error("Challenge was rejected")]
    ChallengeRejected,
    #[error("Bank session expired")]
    SessionExpired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Network error ({status}): {message}")]
    Network { status: u16, message: String },
    #[error("Invalid response from bank: {0}")]
    InvalidResponse(String),
}

/// Bank login material. Deliberately not `Debug` so credentials cannot leak
/// through error formatting or log lines.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub pin: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// A bank-issued token representing a pending human confirmation step
/// (e.g. a push notification the user must approve on their phone).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    /// Bank-side challenge type, e.g. `P_TAN_PUSH`.
    pub kind: String,
}

/// Operations the sync core consumes from the bank. Implementations map
/// their wire protocol into these calls; `HttpBankClient` is the real one,
/// `MockBankClient` scripts outcomes for tests.
#[allow(async_fn_in_trait)]
pub trait BankApi: Send + Sync {
    /// Password-grant token request, the first step of every session.
    async fn obtain_initial_token(&self, credentials: &Credentials) -> Result<TokenPair, AuthError>;

    /// Retrieve the bank-side session identifier for the token's session.
    async fn get_session_id(&self, tokens: &TokenPair) -> Result<String, AuthError>;

    /// Ask the bank to push a confirmation challenge for this session.
    async fn request_challenge(
        &self,
        tokens: &TokenPair,
        session_id: &str,
    ) -> Result<Challenge, AuthError>;

    /// Activate the session after the user confirmed the challenge
    /// out-of-band. Implementations must map HTTP 403 to
    /// [`AuthError::ChallengeRejected`] and HTTP 408 to
    /// [`AuthError::ChallengeExpired`].
    async fn activate_session(
        &self,
        tokens: &TokenPair,
        session_id: &str,
        challenge_id: &str,
    ) -> Result<(), AuthError>;

    /// Exchange the base token for one with extended data-access scope.
    async fn upgrade_token(&self, tokens: &TokenPair) -> Result<TokenPair, AuthError>;

    /// List transactions of the last `since_days` days, following
    /// pagination until a page is short or entries fall outside the window.
    async fn list_transactions(
        &self,
        tokens: &TokenPair,
        account_id: &str,
        since_days: u32,
    ) -> Result<Vec<BankTransaction>, AuthError>;
}
