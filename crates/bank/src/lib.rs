pub mod auth;
pub mod client;
pub mod http;
pub mod mock;

pub use auth::{AuthSession, AuthSessionManager, AuthState};
pub use client::{AuthError, BankApi, Challenge, Credentials, TokenPair};
pub use http::HttpBankClient;
pub use mock::MockBankClient;
