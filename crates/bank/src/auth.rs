use serde::{Deserialize, Serialize};

use crate::client::{AuthError, BankApi, Challenge, Credentials, TokenPair};

/// The single process-wide bank session. Mutated in place as the protocol
/// advances; discarded on clear, cancel, or any terminal failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Client-generated request-correlation pair, stamped at auth start.
    pub request_id: String,
    pub session_id: String,
    pub tokens: TokenPair,
    /// Identifier the bank assigned to this session.
    pub bank_session_id: String,
    pub pending_challenge: Option<Challenge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NoSession,
    ChallengeIssued,
    Authenticated,
}

/// Drives the bank's multi-step authentication protocol and holds the one
/// active session. The two entry points (`start_auth`, `confirm_challenge`)
/// bracket the indefinite out-of-band confirmation wait — no thread blocks
/// in between, and the intermediate session survives until the resume.
///
/// No step is ever retried internally; every failure is reported to the
/// orchestrator, which decides whether to restart the flow.
pub struct AuthSessionManager<C: BankApi> {
    client: C,
    session: Option<AuthSession>,
}

impl<C: BankApi> AuthSessionManager<C> {
    pub fn new(client: C) -> Self {
        AuthSessionManager { client, session: None }
    }

    /// The underlying bank client, for the data calls that follow
    /// authentication (transaction listing).
    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn state(&self) -> AuthState {
        match &self.session {
            None => AuthState::NoSession,
            Some(s) if s.pending_challenge.is_some() => AuthState::ChallengeIssued,
            Some(_) => AuthState::Authenticated,
        }
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn tokens(&self) -> Option<&TokenPair> {
        self.session.as_ref().map(|s| &s.tokens)
    }

    /// Run the strict start sequence: password-grant token, bank session
    /// identifier, push challenge. Any step failing aborts the whole
    /// operation and stores nothing — a session is only ever persisted
    /// complete, with its challenge pending.
    pub async fn start_auth(&mut self, credentials: &Credentials) -> Result<Challenge, AuthError> {
        self.session = None;

        let tokens = self.client.obtain_initial_token(credentials).await?;
        let bank_session_id = self.client.get_session_id(&tokens).await?;
        let challenge = self.client.request_challenge(&tokens, &bank_session_id).await?;

        self.session = Some(AuthSession {
            request_id: uuid::Uuid::new_v4().simple().to_string(),
            session_id: uuid::Uuid::new_v4().simple().to_string(),
            tokens,
            bank_session_id,
            pending_challenge: Some(challenge.clone()),
        });

        tracing::info!(challenge_id = %challenge.id, kind = %challenge.kind, "bank challenge issued");
        Ok(challenge)
    }

    /// Resume after the user confirmed the challenge out-of-band: activate
    /// the session (the challenge id travels in a dedicated header, with
    /// the fixed one-time-passcode sentinel), then upgrade the token scope.
    ///
    /// Failure mapping is terminal for the session: HTTP 403 on activation
    /// surfaces as [`AuthError::ChallengeRejected`], HTTP 408 as
    /// [`AuthError::ChallengeExpired`] (restart from `start_auth`), anything
    /// else as a generic authentication failure. The session is discarded
    /// in every failure case.
    pub async fn confirm_challenge(&mut self) -> Result<(), AuthError> {
        let (tokens, bank_session_id, challenge) = match &self.session {
            Some(s) => match &s.pending_challenge {
                Some(c) => (s.tokens.clone(), s.bank_session_id.clone(), c.clone()),
                None => return Err(AuthError::SessionExpired),
            },
            None => return Err(AuthError::SessionExpired),
        };

        if let Err(e) = self
            .client
            .activate_session(&tokens, &bank_session_id, &challenge.id)
            .await
        {
            tracing::warn!(error = %e, "session activation failed");
            self.session = None;
            return Err(e);
        }

        match self.client.upgrade_token(&tokens).await {
            Ok(upgraded) => {
                // Only now is the session authenticated; keep it, drop the
                // pending challenge.
                if let Some(session) = self.session.as_mut() {
                    session.tokens = upgraded;
                    session.pending_challenge = None;
                }
                tracing::info!("bank session authenticated");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "token upgrade failed");
                self.session = None;
                Err(e)
            }
        }
    }

    /// Discard the session unconditionally (logout/cancel). Idempotent.
    pub fn clear(&mut self) {
        self.session = None;
    }
}
