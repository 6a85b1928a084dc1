//! Authenticated account sessions for both identity providers.
//!
//! A [`ProviderSession`] is either a [`LegacySession`] issued by the single-step
//! token provider, or a [`FederatedSession`] derived from the OAuth exchange chain.
//! Usernames are unique within each provider namespace, and the two namespaces are
//! never merged into each other.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How long before expiry a federated session is considered due for refresh.
pub const REFRESH_LEAD_SECS: i64 = 5 * 60;

/// The identity provider a session belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProviderKind {
    /// The single-step token provider.
    Legacy,
    /// The OAuth provider chained through device-cloud and game services.
    Federated,
}

/// The user-visible game profile attached to an account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GameProfile {
    /// Unique profile id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// A session issued by the legacy provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySession {
    /// Account login name, unique within the legacy namespace.
    pub username: String,
    /// Opaque access token.
    pub access_token: String,
    /// The client token the access token was issued against.
    pub client_token: String,
    /// The selected game profile.
    pub profile: GameProfile,
    /// Account properties such as skin or cape metadata. Survive re-authentication.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub user_properties: BTreeMap<String, String>,
    /// Unix seconds of the last successful authenticate or refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refreshed: Option<i64>,
}

/// A session derived from the federated OAuth exchange chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedSession {
    /// The game profile name, unique within the federated namespace.
    pub username: String,
    /// Game-service access token produced by the last exchange.
    pub access_token: String,
    /// OAuth refresh token used to re-run the chain without user interaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix seconds at which `access_token` expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// The game profile fetched at the end of the chain.
    pub profile: GameProfile,
    /// Device-cloud user hash.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_hash: Option<String>,
    /// Unix seconds of the last successful authenticate or refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_refreshed: Option<i64>,
}

impl FederatedSession {
    /// Returns `true` if the session holds a refresh token.
    pub fn is_refreshable(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Returns `true` if the access token is expired or expires within
    /// [`REFRESH_LEAD_SECS`] of `now_unix`. Sessions without a known expiry never
    /// report as stale.
    pub fn needs_refresh(&self, now_unix: i64) -> bool {
        self.expires_at
            .is_some_and(|expiry| expiry.saturating_sub(REFRESH_LEAD_SECS) <= now_unix)
    }
}

/// A saved session of either provider kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProviderSession {
    Legacy(LegacySession),
    Federated(FederatedSession),
}

impl ProviderSession {
    /// The provider namespace this session lives in.
    pub fn kind(&self) -> ProviderKind {
        match self {
            ProviderSession::Legacy(_) => ProviderKind::Legacy,
            ProviderSession::Federated(_) => ProviderKind::Federated,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            ProviderSession::Legacy(session) => &session.username,
            ProviderSession::Federated(session) => &session.username,
        }
    }

    pub fn display_name(&self) -> &str {
        &self.profile().name
    }

    pub fn profile(&self) -> &GameProfile {
        match self {
            ProviderSession::Legacy(session) => &session.profile,
            ProviderSession::Federated(session) => &session.profile,
        }
    }

    pub fn access_token(&self) -> &str {
        match self {
            ProviderSession::Legacy(session) => &session.access_token,
            ProviderSession::Federated(session) => &session.access_token,
        }
    }

    /// Legacy sessions carry properties that are merged on re-authentication.
    pub fn is_mergeable(&self) -> bool {
        matches!(self, ProviderSession::Legacy(_))
    }

    /// Federated sessions can be re-derived from a stored refresh token.
    pub fn is_refreshable(&self) -> bool {
        match self {
            ProviderSession::Legacy(_) => false,
            ProviderSession::Federated(session) => session.is_refreshable(),
        }
    }
}

impl From<LegacySession> for ProviderSession {
    fn from(session: LegacySession) -> Self {
        ProviderSession::Legacy(session)
    }
}

impl From<FederatedSession> for ProviderSession {
    fn from(session: FederatedSession) -> Self {
        ProviderSession::Federated(session)
    }
}

/// Combines a freshly issued legacy session with the previously saved one.
///
/// Properties present on `new` win; properties only present on `old` are kept.
/// Every other field comes from `new`, except `last_refreshed`, which falls back to
/// `old` when `new` does not carry one.
pub fn merge(new: LegacySession, old: &LegacySession) -> LegacySession {
    let mut user_properties = old.user_properties.clone();
    user_properties.extend(new.user_properties);
    LegacySession {
        user_properties,
        last_refreshed: new.last_refreshed.or(old.last_refreshed),
        ..new
    }
}
