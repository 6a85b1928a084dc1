//! [`FederatedTransport`] over HTTPS using `reqwest`.

use super::{
    ExchangeError,
    transport::{FederatedTransport, GameToken, OAuthTokens, SecurityToken, UserToken},
};
use crate::{
    api::{
        DeviceCloudErrorResponse, DeviceCloudTokenResponse, EntitlementsResponse,
        GameLoginRequest, GameLoginResponse, OAuthErrorResponse, OAuthTokenResponse,
        ProfileResponse, SecurityTokenProperties, SecurityTokenRequest, UserAuthProperties,
        UserAuthRequest, XERR_NO_ACCOUNT, XERR_UNDERAGE,
    },
    option::FederatedAuthOptions,
    session::GameProfile,
};
use futures::future::BoxFuture;
use reqwest::{StatusCode, header::ACCEPT};
use serde::de::DeserializeOwned;

const DEVICE_CLOUD_RELYING_PARTY: &str = "http://auth.xboxlive.com";
const DEVICE_CLOUD_SITE_NAME: &str = "user.auth.xboxlive.com";
const SANDBOX_ID: &str = "RETAIL";
const TOKEN_TYPE: &str = "JWT";
const ERROR_SNIPPET_CHARS: usize = 240;

/// The default HTTPS transport for the federated flow.
#[derive(Debug, Clone)]
pub struct HttpFederatedTransport {
    client: reqwest::Client,
    options: FederatedAuthOptions,
}

impl HttpFederatedTransport {
    /// Creates a transport using an existing client.
    pub fn new(client: reqwest::Client, options: FederatedAuthOptions) -> Self {
        Self { client, options }
    }

    /// Creates a transport with a client whose request timeout matches the step timeout.
    pub fn with_options(options: FederatedAuthOptions) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(options.step_timeout())
            .build()?;
        Ok(Self::new(client, options))
    }

    async fn request_tokens(&self, form: &[(&str, &str)]) -> Result<OAuthTokens, ExchangeError> {
        let response = self
            .client
            .post(&self.options.token_url)
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(ExchangeError::transport)?;
        let body: OAuthTokenResponse = read_json(response).await?;
        Ok(OAuthTokens {
            access_token: body.access_token,
            refresh_token: body.refresh_token.filter(|t| !t.is_empty()),
            expires_in: body.expires_in,
        })
    }

    async fn post_device_cloud<B>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<DeviceCloudTokenResponse, ExchangeError>
    where
        B: serde::Serialize + ?Sized,
    {
        let response = self
            .client
            .post(url)
            .header(ACCEPT, "application/json")
            .header("x-xbl-contract-version", "1")
            .json(body)
            .send()
            .await
            .map_err(ExchangeError::transport)?;
        read_json(response).await
    }

    async fn get_bearer<T: DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> Result<T, ExchangeError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(ExchangeError::transport)?;
        read_json(response).await
    }
}

impl FederatedTransport for HttpFederatedTransport {
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
    ) -> BoxFuture<'a, Result<OAuthTokens, ExchangeError>> {
        Box::pin(async move {
            self.request_tokens(&[
                ("client_id", self.options.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code.trim()),
                ("redirect_uri", self.options.redirect_uri.as_str()),
                ("scope", self.options.scope.as_str()),
            ])
            .await
        })
    }

    fn refresh_tokens<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<OAuthTokens, ExchangeError>> {
        Box::pin(async move {
            self.request_tokens(&[
                ("client_id", self.options.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.trim()),
                ("redirect_uri", self.options.redirect_uri.as_str()),
                ("scope", self.options.scope.as_str()),
            ])
            .await
        })
    }

    fn device_cloud_ticket<'a>(
        &'a self,
        oauth_access_token: &'a str,
    ) -> BoxFuture<'a, Result<UserToken, ExchangeError>> {
        Box::pin(async move {
            let request = UserAuthRequest {
                properties: UserAuthProperties {
                    auth_method: "RPS",
                    site_name: DEVICE_CLOUD_SITE_NAME,
                    rps_ticket: format!("d={oauth_access_token}"),
                },
                relying_party: DEVICE_CLOUD_RELYING_PARTY,
                token_type: TOKEN_TYPE,
            };
            let response = self
                .post_device_cloud(&self.options.device_cloud_url, &request)
                .await?;
            let user_hash = response
                .user_hash()
                .ok_or_else(|| ExchangeError::Malformed("missing user hash claim".to_string()))?
                .to_string();
            Ok(UserToken {
                token: response.token,
                user_hash,
            })
        })
    }

    fn security_token<'a>(
        &'a self,
        user_token: &'a UserToken,
    ) -> BoxFuture<'a, Result<SecurityToken, ExchangeError>> {
        Box::pin(async move {
            let request = SecurityTokenRequest {
                properties: SecurityTokenProperties {
                    sandbox_id: SANDBOX_ID,
                    user_tokens: [user_token.token.as_str()],
                },
                relying_party: &self.options.relying_party,
                token_type: TOKEN_TYPE,
            };
            let response = self
                .post_device_cloud(&self.options.security_token_url, &request)
                .await?;
            let user_hash = response
                .user_hash()
                .unwrap_or(user_token.user_hash.as_str())
                .to_string();
            Ok(SecurityToken {
                token: response.token,
                user_hash,
            })
        })
    }

    fn game_entitlement<'a>(
        &'a self,
        security_token: &'a SecurityToken,
    ) -> BoxFuture<'a, Result<GameToken, ExchangeError>> {
        Box::pin(async move {
            let request = GameLoginRequest {
                identity_token: format!(
                    "XBL3.0 x={};{}",
                    security_token.user_hash, security_token.token
                ),
            };
            let response = self
                .client
                .post(&self.options.game_login_url)
                .header(ACCEPT, "application/json")
                .json(&request)
                .send()
                .await
                .map_err(ExchangeError::transport)?;
            let login: GameLoginResponse = read_json(response).await?;

            let entitlements: EntitlementsResponse = self
                .get_bearer(&self.options.entitlements_url, &login.access_token)
                .await?;
            if entitlements.items.is_empty() {
                return Err(ExchangeError::NotEntitled);
            }

            Ok(GameToken {
                access_token: login.access_token,
                expires_in: login.expires_in,
            })
        })
    }

    fn profile<'a>(
        &'a self,
        game_token: &'a GameToken,
    ) -> BoxFuture<'a, Result<GameProfile, ExchangeError>> {
        Box::pin(async move {
            let profile: ProfileResponse = self
                .get_bearer(&self.options.profile_url, &game_token.access_token)
                .await?;
            Ok(GameProfile {
                id: profile.id,
                name: profile.name,
            })
        })
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ExchangeError> {
    let status = response.status();
    let body = response.text().await.map_err(ExchangeError::transport)?;
    if !status.is_success() {
        return Err(rejection(status, &body));
    }
    serde_json::from_str(&body).map_err(|e| ExchangeError::Malformed(e.to_string()))
}

/// Maps a non-success response onto the account-state signals where the body
/// carries one, and onto [`ExchangeError::Rejected`] otherwise.
fn rejection(status: StatusCode, body: &str) -> ExchangeError {
    if let Ok(error) = serde_json::from_str::<DeviceCloudErrorResponse>(body) {
        match error.xerr {
            Some(XERR_NO_ACCOUNT) => return ExchangeError::NoAccount,
            Some(XERR_UNDERAGE) => return ExchangeError::Underage,
            _ => (),
        }
    }

    if status == StatusCode::NOT_FOUND {
        return ExchangeError::NotFound;
    }

    let detail = match serde_json::from_str::<OAuthErrorResponse>(body) {
        Ok(OAuthErrorResponse {
            error,
            error_description: Some(description),
        }) => format!("{error}: {description}"),
        Ok(OAuthErrorResponse { error, .. }) => error,
        Err(_) => body.trim().chars().take(ERROR_SNIPPET_CHARS).collect(),
    };
    ExchangeError::Rejected {
        status: status.as_u16(),
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xerr_codes_map_to_account_signals() {
        let body = r#"{"Identity":"0","XErr":2148916233,"Message":""}"#;
        assert!(matches!(
            rejection(StatusCode::UNAUTHORIZED, body),
            ExchangeError::NoAccount
        ));

        let body = r#"{"Identity":"0","XErr":2148916238,"Message":""}"#;
        assert!(matches!(
            rejection(StatusCode::UNAUTHORIZED, body),
            ExchangeError::Underage
        ));
    }

    #[test]
    fn unknown_xerr_is_a_rejection() {
        let body = r#"{"Identity":"0","XErr":2148916235,"Message":"region"}"#;
        match rejection(StatusCode::UNAUTHORIZED, body) {
            ExchangeError::Rejected { status, .. } => assert_eq!(status, 401),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn oauth_error_details_are_kept() {
        let body = r#"{"error":"invalid_grant","error_description":"code expired"}"#;
        match rejection(StatusCode::BAD_REQUEST, body) {
            ExchangeError::Rejected { status, detail } => {
                assert_eq!(status, 400);
                assert_eq!(detail, "invalid_grant: code expired");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_resource_is_not_found() {
        let body = r#"{"path":"/minecraft/profile","error":"NOT_FOUND"}"#;
        assert!(matches!(
            rejection(StatusCode::NOT_FOUND, body),
            ExchangeError::NotFound
        ));
    }

    #[test]
    fn plain_text_bodies_are_truncated() {
        let body = "x".repeat(1000);
        match rejection(StatusCode::INTERNAL_SERVER_ERROR, &body) {
            ExchangeError::Rejected { detail, .. } => {
                assert_eq!(detail.len(), ERROR_SNIPPET_CHARS)
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    mod served {
        use crate::{
            federated::{AuthStage, FederatedAuthenticator},
            option::FederatedAuthOptions,
        };
        use parking_lot::Mutex;
        use serde_json::Value;
        use std::{collections::HashMap, sync::Arc, time::Duration};
        use tokio::{
            io::{AsyncReadExt, AsyncWriteExt},
            net::{TcpListener, TcpStream},
        };

        const TOKEN: &str = r#"{"access_token":"oauth-access","refresh_token":"oauth-refresh","expires_in":3600}"#;
        const USER_TOKEN: &str =
            r#"{"Token":"user-token","DisplayClaims":{"xui":[{"uhs":"hash"}]}}"#;
        const SECURITY_TOKEN: &str =
            r#"{"Token":"xsts-token","DisplayClaims":{"xui":[{"uhs":"hash"}]}}"#;
        const LOGIN: &str = r#"{"username":"id","access_token":"game-token","expires_in":86400}"#;
        const PROFILE: &str = r#"{"id":"069a79f444e94726a5befca90e38aaf5","name":"Notch"}"#;

        type Requests = Arc<Mutex<Vec<(String, Value)>>>;

        /// Answers each request with the canned body routed by its path, recording
        /// the path and JSON body of everything it receives.
        async fn serve(routes: Vec<(&'static str, &'static str)>) -> (String, Requests) {
            let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
            let base = format!("http://{}", listener.local_addr().expect("local addr"));
            let routes: Arc<HashMap<&str, &str>> = Arc::new(routes.into_iter().collect());
            let requests = Requests::default();
            let seen = requests.clone();

            tokio::spawn(async move {
                while let Ok((mut socket, _)) = listener.accept().await {
                    let routes = routes.clone();
                    let seen = seen.clone();
                    tokio::spawn(async move {
                        let Some((path, body)) = read_request(&mut socket).await else {
                            return;
                        };
                        let (status, reply) = match routes.get(path.as_str()) {
                            Some(reply) => ("200 OK", *reply),
                            None => ("404 Not Found", "{}"),
                        };
                        let body = serde_json::from_str(&body).unwrap_or(Value::String(body));
                        seen.lock().push((path, body));
                        let response = format!(
                            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{reply}",
                            reply.len()
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
            });

            (base, requests)
        }

        async fn read_request(socket: &mut TcpStream) -> Option<(String, String)> {
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];
            let header_end = loop {
                let n = socket.read(&mut chunk).await.ok()?;
                if n == 0 {
                    return None;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
            let path = head.split_whitespace().nth(1)?.to_string();
            let length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while buf.len() < header_end + length {
                let n = socket.read(&mut chunk).await.ok()?;
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }

            let body = String::from_utf8_lossy(&buf[header_end..]).into_owned();
            Some((path, body))
        }

        fn authenticator(base: &str) -> FederatedAuthenticator {
            let options = FederatedAuthOptions::builder()
                .client_id("client-id")
                .redirect_uri("http://localhost:8000/callback")
                .token_url(format!("{base}/token"))
                .device_cloud_url(format!("{base}/user/authenticate"))
                .security_token_url(format!("{base}/xsts/authorize"))
                .game_login_url(format!("{base}/login"))
                .entitlements_url(format!("{base}/entitlements"))
                .profile_url(format!("{base}/profile"))
                .step_timeout(Duration::from_secs(5))
                .build();
            FederatedAuthenticator::with_http(options).expect("http client")
        }

        fn body_of(requests: &Requests, path: &str) -> Option<Value> {
            requests
                .lock()
                .iter()
                .find(|(seen, _)| seen == path)
                .map(|(_, body)| body.clone())
        }

        #[tokio::test]
        async fn empty_entitlement_listing_is_no_game_ownership() {
            let (base, requests) = serve(vec![
                ("/token", TOKEN),
                ("/user/authenticate", USER_TOKEN),
                ("/xsts/authorize", SECURITY_TOKEN),
                ("/login", LOGIN),
                ("/entitlements", r#"{"items":[]}"#),
                ("/profile", PROFILE),
            ])
            .await;

            let failure = authenticator(&base)
                .authenticate("code-1")
                .await
                .expect_err("not entitled");

            assert_eq!(failure.stage(), AuthStage::NoGameOwnership);
            assert!(body_of(&requests, "/profile").is_none());

            let user_auth = body_of(&requests, "/user/authenticate").expect("device-cloud call");
            assert_eq!(user_auth["Properties"]["RpsTicket"], "d=oauth-access");
            let security = body_of(&requests, "/xsts/authorize").expect("security token call");
            assert_eq!(security["Properties"]["UserTokens"][0], "user-token");
            let login = body_of(&requests, "/login").expect("login call");
            assert_eq!(login["identityToken"], "XBL3.0 x=hash;xsts-token");
        }

        #[tokio::test]
        async fn missing_user_hash_claim_is_device_cloud_ticket() {
            let (base, requests) = serve(vec![
                ("/token", TOKEN),
                (
                    "/user/authenticate",
                    r#"{"Token":"user-token","DisplayClaims":{"xui":[]}}"#,
                ),
                ("/xsts/authorize", SECURITY_TOKEN),
            ])
            .await;

            let failure = authenticator(&base)
                .authenticate("code-1")
                .await
                .expect_err("malformed claims");

            assert_eq!(failure.stage(), AuthStage::DeviceCloudTicket);
            assert!(body_of(&requests, "/xsts/authorize").is_none());
        }

        #[tokio::test]
        async fn entitled_account_completes_the_chain() {
            let (base, requests) = serve(vec![
                ("/token", TOKEN),
                ("/user/authenticate", USER_TOKEN),
                ("/xsts/authorize", SECURITY_TOKEN),
                ("/login", LOGIN),
                (
                    "/entitlements",
                    r#"{"items":[{"name":"product_minecraft"},{"name":"game_minecraft"}]}"#,
                ),
                ("/profile", PROFILE),
            ])
            .await;

            let session = authenticator(&base)
                .authenticate("code-1")
                .await
                .expect("session");

            assert_eq!(session.username, "Notch");
            assert_eq!(session.access_token, "game-token");
            assert_eq!(session.refresh_token.as_deref(), Some("oauth-refresh"));
            assert_eq!(session.user_hash.as_deref(), Some("hash"));
            let token = body_of(&requests, "/token").expect("token call");
            assert!(token.as_str().is_some_and(|form| form.contains("code=code-1")));
        }
    }
}
