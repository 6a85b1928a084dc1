//! Request and response bodies exchanged with the upstream identity services.
//!
//! These mirror the public JSON schemas closely enough for the HTTP transports;
//! unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Security token error code: no device-cloud account exists for the identity.
pub const XERR_NO_ACCOUNT: u64 = 2_148_916_233;
/// Security token error code: the account is a child account outside a family group.
pub const XERR_UNDERAGE: u64 = 2_148_916_238;

/// Successful response of the OAuth token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Error response of the OAuth token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Device-cloud user authentication request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserAuthRequest<'a> {
    pub properties: UserAuthProperties<'a>,
    pub relying_party: &'a str,
    pub token_type: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserAuthProperties<'a> {
    pub auth_method: &'a str,
    pub site_name: &'a str,
    pub rps_ticket: String,
}

/// Security token authorization request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityTokenRequest<'a> {
    pub properties: SecurityTokenProperties<'a>,
    pub relying_party: &'a str,
    pub token_type: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SecurityTokenProperties<'a> {
    pub sandbox_id: &'a str,
    pub user_tokens: [&'a str; 1],
}

/// Response shared by the device-cloud and security token endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceCloudTokenResponse {
    pub token: String,
    pub display_claims: DisplayClaims,
}

impl DeviceCloudTokenResponse {
    /// Returns the first user hash claim, if any.
    pub fn user_hash(&self) -> Option<&str> {
        self.display_claims
            .xui
            .first()
            .map(|claim| claim.uhs.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DisplayClaims {
    #[serde(default)]
    pub xui: Vec<UserClaim>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserClaim {
    pub uhs: String,
}

/// Error response of the device-cloud and security token endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCloudErrorResponse {
    #[serde(rename = "XErr", default)]
    pub xerr: Option<u64>,
    #[serde(rename = "Message", default)]
    pub message: Option<String>,
}

/// Game-service login request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameLoginRequest {
    pub identity_token: String,
}

/// Game-service login response.
#[derive(Debug, Clone, Deserialize)]
pub struct GameLoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Entitlement listing.
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementsResponse {
    #[serde(default)]
    pub items: Vec<EntitlementItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementItem {
    pub name: String,
}

/// Game profile response.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileResponse {
    pub id: String,
    pub name: String,
}

/// Legacy authenticate request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyAuthenticateRequest<'a> {
    pub agent: LegacyAgent<'a>,
    pub username: &'a str,
    pub password: &'a str,
    pub client_token: &'a str,
    pub request_user: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegacyAgent<'a> {
    pub name: &'a str,
    pub version: u32,
}

/// Legacy refresh request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRefreshRequest<'a> {
    pub access_token: &'a str,
    pub client_token: &'a str,
    pub request_user: bool,
}

/// Legacy invalidate request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyInvalidateRequest<'a> {
    pub access_token: &'a str,
    pub client_token: &'a str,
}

/// Response of the legacy authenticate and refresh endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyAuthResponse {
    pub access_token: String,
    pub client_token: String,
    #[serde(default)]
    pub selected_profile: Option<ProfileResponse>,
    #[serde(default)]
    pub user: Option<LegacyUser>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyUser {
    pub id: String,
    #[serde(default)]
    pub properties: Vec<LegacyUserProperty>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyUserProperty {
    pub name: String,
    pub value: String,
}

/// Error response of the legacy endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_message: Option<String>,
}
