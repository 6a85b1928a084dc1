//! The federated (OAuth-chained) identity provider.
//!
//! Signing in walks five dependent exchanges: OAuth code exchange, device-cloud
//! user ticket, security token, game-service token with entitlement check, and
//! the game profile. [`FederatedAuthenticator`] drives the sequence over a
//! [`FederatedTransport`] and reports failures as an [`AuthFailure`] tagged with
//! the [`AuthStage`] that failed.

use std::{error::Error as StdError, fmt};
use thiserror::Error;

mod authenticator;
pub mod http;
pub mod transport;

pub use authenticator::FederatedAuthenticator;
pub use http::HttpFederatedTransport;
pub use transport::{FederatedTransport, GameToken, OAuthTokens, SecurityToken, UserToken};

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// The stage of the federated flow at which an attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthStage {
    /// Transport failure at any hop, including timeout and cancellation.
    Request,
    /// The identity provider rejected the authorization grant or refresh token.
    OAuthExchange,
    /// The device-cloud service rejected the OAuth access token.
    DeviceCloudTicket,
    /// The security token service rejected the device-cloud ticket.
    SecurityTokenExchange,
    /// The game service rejected the security token.
    GameEntitlementExchange,
    /// The game profile could not be fetched.
    ProfileFetch,
    /// The account is flagged as underage by the identity provider.
    Underage,
    /// No device-cloud account is linked to the identity.
    NoLinkedGameAccount,
    /// The account does not own the game.
    NoGameOwnership,
}

impl AuthStage {
    /// Returns `true` for account-state failures the user must fix outside the app.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AuthStage::Underage | AuthStage::NoLinkedGameAccount | AuthStage::NoGameOwnership
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AuthStage::Request => "request",
            AuthStage::OAuthExchange => "oauth exchange",
            AuthStage::DeviceCloudTicket => "device-cloud ticket",
            AuthStage::SecurityTokenExchange => "security token exchange",
            AuthStage::GameEntitlementExchange => "game entitlement exchange",
            AuthStage::ProfileFetch => "profile fetch",
            AuthStage::Underage => "underage",
            AuthStage::NoLinkedGameAccount => "no linked game account",
            AuthStage::NoGameOwnership => "no game ownership",
        }
    }
}

impl fmt::Display for AuthStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure of one federated authentication attempt.
#[derive(Debug, Error)]
#[error("{stage} failed: {message}")]
pub struct AuthFailure {
    stage: AuthStage,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl AuthFailure {
    pub fn new(stage: AuthStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the lower-level cause.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn stage(&self) -> AuthStage {
        self.stage
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// See [`AuthStage::is_terminal`].
    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Transient failures may be retried with a fresh grant.
    pub fn is_retryable(&self) -> bool {
        !self.is_terminal()
    }

    /// Classifies a transport-level error raised while running `step`.
    pub(crate) fn classify(step: AuthStage, error: ExchangeError) -> Self {
        let (stage, message) = match &error {
            ExchangeError::Transport(_) => (AuthStage::Request, format!("{step} request failed")),
            ExchangeError::NoAccount => (
                AuthStage::NoLinkedGameAccount,
                "no device-cloud account is linked to this identity".to_string(),
            ),
            ExchangeError::Underage => (
                AuthStage::Underage,
                "the account is underage and must be added to a family group".to_string(),
            ),
            ExchangeError::NotEntitled => (
                AuthStage::NoGameOwnership,
                "the account does not own the game".to_string(),
            ),
            ExchangeError::Rejected { .. }
            | ExchangeError::NotFound
            | ExchangeError::Malformed(_) => (step, error.to_string()),
        };
        Self::new(stage, message).with_source(error)
    }
}

/// Errors reported by a [`FederatedTransport`] before stage classification.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The request could not be sent or the response could not be read.
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),
    /// The service answered with a non-success status.
    #[error("Rejected with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    /// The service reports that no device-cloud account exists for the identity.
    #[error("No linked account")]
    NoAccount,
    /// The service reports that the account is underage.
    #[error("Account is underage")]
    Underage,
    /// The account holds no entitlement for the game.
    #[error("Account is not entitled to the game")]
    NotEntitled,
    /// The requested resource does not exist.
    #[error("Not found")]
    NotFound,
    /// The response could not be understood.
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl ExchangeError {
    pub fn transport<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        ExchangeError::Transport(Box::new(error))
    }
}
