//! The network capability the federated flow runs over.

use super::ExchangeError;
use crate::session::GameProfile;
use futures::future::BoxFuture;

/// Tokens returned by the OAuth token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: Option<u64>,
}

/// Device-cloud user token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserToken {
    pub token: String,
    pub user_hash: String,
}

/// Security token scoped to the game service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityToken {
    pub token: String,
    pub user_hash: String,
}

/// Game-service access token for an entitled account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameToken {
    pub access_token: String,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: Option<u64>,
}

/// One method per exchange of the federated flow.
///
/// Implementations report raw outcomes as [`ExchangeError`]; classifying them into
/// an [`AuthFailure`](super::AuthFailure) is left to the authenticator, which knows
/// which step is running. Account-state signals must be reported as
/// [`ExchangeError::NoAccount`], [`ExchangeError::Underage`] and
/// [`ExchangeError::NotEntitled`] so the caller can offer the right remedy.
pub trait FederatedTransport: Send + Sync {
    /// Exchanges an authorization code for OAuth tokens.
    fn exchange_code<'a>(&'a self, code: &'a str)
    -> BoxFuture<'a, Result<OAuthTokens, ExchangeError>>;

    /// Exchanges an OAuth refresh token for new OAuth tokens.
    fn refresh_tokens<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<OAuthTokens, ExchangeError>>;

    /// Obtains a device-cloud user token for an OAuth access token.
    fn device_cloud_ticket<'a>(
        &'a self,
        oauth_access_token: &'a str,
    ) -> BoxFuture<'a, Result<UserToken, ExchangeError>>;

    /// Exchanges a device-cloud user token for a security token.
    fn security_token<'a>(
        &'a self,
        user_token: &'a UserToken,
    ) -> BoxFuture<'a, Result<SecurityToken, ExchangeError>>;

    /// Exchanges a security token for a game-service token, verifying entitlement.
    fn game_entitlement<'a>(
        &'a self,
        security_token: &'a SecurityToken,
    ) -> BoxFuture<'a, Result<GameToken, ExchangeError>>;

    /// Fetches the game profile for a game-service token.
    fn profile<'a>(
        &'a self,
        game_token: &'a GameToken,
    ) -> BoxFuture<'a, Result<GameProfile, ExchangeError>>;
}
