//! Provider configuration.
//!
//! Endpoint URLs default to the public services; they are overridable for testing
//! against local fakes and for alternative deployments.

use std::time::Duration;

/// Default OAuth authorization endpoint.
pub const DEFAULT_AUTHORIZE_URL: &str =
    "https://login.microsoftonline.com/consumers/oauth2/v2.0/authorize";
/// Default OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/token";
/// Default OAuth scope.
pub const DEFAULT_SCOPE: &str = "XboxLive.signin offline_access";
/// Default device-cloud user authentication endpoint.
pub const DEFAULT_DEVICE_CLOUD_URL: &str = "https://user.auth.xboxlive.com/user/authenticate";
/// Default security token endpoint.
pub const DEFAULT_SECURITY_TOKEN_URL: &str = "https://xsts.auth.xboxlive.com/xsts/authorize";
/// Default relying party the security token is scoped to.
pub const DEFAULT_RELYING_PARTY: &str = "rp://api.minecraftservices.com/";
/// Default game-service login endpoint.
pub const DEFAULT_GAME_LOGIN_URL: &str =
    "https://api.minecraftservices.com/authentication/login_with_xbox";
/// Default entitlement listing endpoint.
pub const DEFAULT_ENTITLEMENTS_URL: &str = "https://api.minecraftservices.com/entitlements/mcstore";
/// Default game profile endpoint.
pub const DEFAULT_PROFILE_URL: &str = "https://api.minecraftservices.com/minecraft/profile";
/// Default legacy authentication server.
pub const DEFAULT_LEGACY_AUTH_URL: &str = "https://authserver.mojang.com";

const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for the [`FederatedAuthenticator`](crate::FederatedAuthenticator) and its
/// HTTP transport.
#[derive(Clone, Debug, bon::Builder)]
#[builder(on(String, into))]
pub struct FederatedAuthOptions {
    /// OAuth client id registered with the identity provider.
    pub client_id: String,

    /// Redirect URI registered for `client_id`.
    pub redirect_uri: String,

    #[builder(default = DEFAULT_SCOPE.to_string())]
    pub scope: String,

    #[builder(default = DEFAULT_AUTHORIZE_URL.to_string())]
    pub authorize_url: String,

    #[builder(default = DEFAULT_TOKEN_URL.to_string())]
    pub token_url: String,

    #[builder(default = DEFAULT_DEVICE_CLOUD_URL.to_string())]
    pub device_cloud_url: String,

    #[builder(default = DEFAULT_SECURITY_TOKEN_URL.to_string())]
    pub security_token_url: String,

    #[builder(default = DEFAULT_RELYING_PARTY.to_string())]
    pub relying_party: String,

    #[builder(default = DEFAULT_GAME_LOGIN_URL.to_string())]
    pub game_login_url: String,

    #[builder(default = DEFAULT_ENTITLEMENTS_URL.to_string())]
    pub entitlements_url: String,

    #[builder(default = DEFAULT_PROFILE_URL.to_string())]
    pub profile_url: String,

    /// Upper bound for each individual exchange. If not provided, 30 seconds will be used.
    pub step_timeout: Option<Duration>,
}

impl FederatedAuthOptions {
    /// Returns the effective per-step timeout.
    pub fn step_timeout(&self) -> Duration {
        self.step_timeout.unwrap_or(DEFAULT_STEP_TIMEOUT)
    }
}

/// Options for the [`LegacyAuthenticator`](crate::LegacyAuthenticator) HTTP transport.
#[derive(Clone, Debug, bon::Builder)]
#[builder(on(String, into))]
pub struct LegacyAuthOptions {
    /// Base URL of the legacy authentication server.
    #[builder(default = DEFAULT_LEGACY_AUTH_URL.to_string())]
    pub base_url: String,

    /// Game agent name sent with authenticate requests.
    #[builder(default = "Minecraft".to_string())]
    pub agent_name: String,

    #[builder(default = 1)]
    pub agent_version: u32,

    /// Request timeout. If not provided, 30 seconds will be used.
    pub timeout: Option<Duration>,
}

impl LegacyAuthOptions {
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_STEP_TIMEOUT)
    }
}

impl Default for LegacyAuthOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}
