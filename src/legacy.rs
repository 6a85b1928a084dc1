//! The legacy identity provider: a single request turns a username and password
//! into a [`LegacySession`].

use crate::{
    api::LegacyAuthResponse,
    option::LegacyAuthOptions,
    session::{self, GameProfile, LegacySession},
    util::time::now_unix_seconds,
};
use futures::future::BoxFuture;
use std::{error::Error as StdError, fmt, future::Future, sync::Arc, time::Duration};
use thiserror::Error;
#[cfg(feature = "tracing")]
use tracing::warn;

pub mod http;

pub use http::HttpLegacyTransport;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum LegacyAuthError {
    /// The request could not be sent, timed out, or the response could not be read.
    #[error("Request error: {0}")]
    Request(#[source] BoxError),
    /// The server refused the username and password.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Rejected with status {status}: {detail}")]
    Rejected { status: u16, detail: String },
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl LegacyAuthError {
    pub fn request<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        LegacyAuthError::Request(Box::new(error))
    }
}

/// The network capability the legacy provider runs over.
pub trait LegacyTransport: Send + Sync {
    fn authenticate<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
        client_token: &'a str,
    ) -> BoxFuture<'a, Result<LegacyAuthResponse, LegacyAuthError>>;

    fn refresh<'a>(
        &'a self,
        access_token: &'a str,
        client_token: &'a str,
    ) -> BoxFuture<'a, Result<LegacyAuthResponse, LegacyAuthError>>;

    fn invalidate<'a>(
        &'a self,
        access_token: &'a str,
        client_token: &'a str,
    ) -> BoxFuture<'a, Result<(), LegacyAuthError>>;
}

/// Signs accounts in against the legacy provider.
#[derive(Clone)]
pub struct LegacyAuthenticator {
    transport: Arc<dyn LegacyTransport>,
    timeout: Duration,
}

impl fmt::Debug for LegacyAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LegacyAuthenticator")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl LegacyAuthenticator {
    pub fn new<T>(transport: T, options: &LegacyAuthOptions) -> Self
    where
        T: LegacyTransport + 'static,
    {
        Self {
            transport: Arc::new(transport),
            timeout: options.timeout(),
        }
    }

    /// Creates an authenticator over the default HTTPS transport.
    pub fn with_http(options: LegacyAuthOptions) -> Result<Self, reqwest::Error> {
        let authenticator_options = options.clone();
        let transport = HttpLegacyTransport::with_options(options)?;
        Ok(Self::new(transport, &authenticator_options))
    }

    /// Authenticates `username` with `password`, binding the session to `client_token`.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        client_token: &str,
    ) -> Result<LegacySession, LegacyAuthError> {
        let response = self
            .bounded(self.transport.authenticate(username, password, client_token))
            .await
            .inspect_err(|_e| {
                #[cfg(feature = "tracing")]
                warn!(username, "legacy authentication failed: {}", _e);
            })?;
        session_from_response(username, response)
    }

    /// Refreshes the access token of `session`.
    ///
    /// User properties known to `session` but absent from the response are kept.
    pub async fn refresh(&self, session: &LegacySession) -> Result<LegacySession, LegacyAuthError> {
        let response = self
            .bounded(
                self.transport
                    .refresh(&session.access_token, &session.client_token),
            )
            .await
            .inspect_err(|_e| {
                #[cfg(feature = "tracing")]
                warn!(username = %session.username, "legacy refresh failed: {}", _e);
            })?;
        let refreshed = session_from_response(&session.username, response)?;
        Ok(session::merge(refreshed, session))
    }

    /// Invalidates the access token of `session` on the server.
    pub async fn invalidate(&self, session: &LegacySession) -> Result<(), LegacyAuthError> {
        self.bounded(
            self.transport
                .invalidate(&session.access_token, &session.client_token),
        )
        .await
    }

    async fn bounded<T>(
        &self,
        request: impl Future<Output = Result<T, LegacyAuthError>>,
    ) -> Result<T, LegacyAuthError> {
        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(elapsed) => Err(LegacyAuthError::request(elapsed)),
        }
    }
}

fn session_from_response(
    username: &str,
    response: LegacyAuthResponse,
) -> Result<LegacySession, LegacyAuthError> {
    let profile = response
        .selected_profile
        .ok_or_else(|| LegacyAuthError::Malformed("response has no selected profile".to_string()))?;
    let user_properties = response
        .user
        .map(|user| {
            user.properties
                .into_iter()
                .map(|property| (property.name, property.value))
                .collect()
        })
        .unwrap_or_default();

    Ok(LegacySession {
        username: username.to_string(),
        access_token: response.access_token,
        client_token: response.client_token,
        profile: GameProfile {
            id: profile.id,
            name: profile.name,
        },
        user_properties,
        last_refreshed: Some(now_unix_seconds()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{LegacyUser, LegacyUserProperty, ProfileResponse};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct MockTransport {
        calls: Mutex<Vec<String>>,
        properties: Vec<(&'static str, &'static str)>,
        without_profile: bool,
        hang: bool,
    }

    impl MockTransport {
        fn respond(&self, call: String) -> BoxFuture<'_, Result<LegacyAuthResponse, LegacyAuthError>> {
            self.calls.lock().push(call);
            let hang = self.hang;
            let response = LegacyAuthResponse {
                access_token: format!("access-{}", self.calls.lock().len()),
                client_token: "client".to_string(),
                selected_profile: (!self.without_profile).then(|| ProfileResponse {
                    id: "profile-id".to_string(),
                    name: "Steve".to_string(),
                }),
                user: Some(LegacyUser {
                    id: "user-id".to_string(),
                    properties: self
                        .properties
                        .iter()
                        .map(|(name, value)| LegacyUserProperty {
                            name: name.to_string(),
                            value: value.to_string(),
                        })
                        .collect(),
                }),
            };
            Box::pin(async move {
                if hang {
                    futures::future::pending::<()>().await;
                }
                Ok(response)
            })
        }
    }

    impl LegacyTransport for Arc<MockTransport> {
        fn authenticate<'a>(
            &'a self,
            username: &'a str,
            password: &'a str,
            _client_token: &'a str,
        ) -> BoxFuture<'a, Result<LegacyAuthResponse, LegacyAuthError>> {
            if password != "hunter2" {
                return Box::pin(async {
                    Err(LegacyAuthError::InvalidCredentials(
                        "Invalid credentials. Invalid username or password.".to_string(),
                    ))
                });
            }
            self.respond(format!("authenticate:{username}"))
        }

        fn refresh<'a>(
            &'a self,
            access_token: &'a str,
            _client_token: &'a str,
        ) -> BoxFuture<'a, Result<LegacyAuthResponse, LegacyAuthError>> {
            self.respond(format!("refresh:{access_token}"))
        }

        fn invalidate<'a>(
            &'a self,
            access_token: &'a str,
            _client_token: &'a str,
        ) -> BoxFuture<'a, Result<(), LegacyAuthError>> {
            self.calls.lock().push(format!("invalidate:{access_token}"));
            Box::pin(async { Ok(()) })
        }
    }

    fn authenticator(transport: MockTransport) -> (LegacyAuthenticator, Arc<MockTransport>) {
        let transport = Arc::new(transport);
        let options = LegacyAuthOptions::builder()
            .timeout(Duration::from_millis(100))
            .build();
        (LegacyAuthenticator::new(transport.clone(), &options), transport)
    }

    #[tokio::test]
    async fn authenticate_builds_session() {
        let (auth, _) = authenticator(MockTransport {
            properties: vec![("preferredLanguage", "en")],
            ..MockTransport::default()
        });

        let session = auth
            .authenticate("steve@example.com", "hunter2", "client")
            .await
            .expect("session");

        assert_eq!(session.username, "steve@example.com");
        assert_eq!(session.profile.name, "Steve");
        assert_eq!(session.client_token, "client");
        assert_eq!(
            session.user_properties.get("preferredLanguage").map(String::as_str),
            Some("en")
        );
        assert!(session.last_refreshed.is_some());
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let (auth, _) = authenticator(MockTransport::default());
        let error = auth
            .authenticate("steve@example.com", "wrong", "client")
            .await
            .expect_err("must fail");
        assert!(matches!(error, LegacyAuthError::InvalidCredentials(_)));
    }

    #[tokio::test]
    async fn missing_profile_is_malformed() {
        let (auth, _) = authenticator(MockTransport {
            without_profile: true,
            ..MockTransport::default()
        });
        let error = auth
            .authenticate("steve@example.com", "hunter2", "client")
            .await
            .expect_err("must fail");
        assert!(matches!(error, LegacyAuthError::Malformed(_)));
    }

    #[tokio::test]
    async fn refresh_keeps_known_properties() {
        let (auth, transport) = authenticator(MockTransport {
            properties: vec![("twitch_access_token", "new")],
            ..MockTransport::default()
        });
        let mut session = crate::session::tests::legacy("steve@example.com", &[("cape", "red")]);
        session.user_properties.insert("twitch_access_token".into(), "old".into());

        let refreshed = auth.refresh(&session).await.expect("refreshed");

        assert_eq!(transport.calls.lock()[0], format!("refresh:{}", session.access_token));
        assert_eq!(refreshed.username, session.username);
        assert_eq!(refreshed.user_properties.get("cape").map(String::as_str), Some("red"));
        assert_eq!(
            refreshed.user_properties.get("twitch_access_token").map(String::as_str),
            Some("new")
        );
    }

    #[tokio::test]
    async fn invalidate_sends_access_token() {
        let (auth, transport) = authenticator(MockTransport::default());
        let session = crate::session::tests::legacy("alex", &[]);
        auth.invalidate(&session).await.expect("invalidated");
        assert_eq!(
            *transport.calls.lock(),
            [format!("invalidate:{}", session.access_token)]
        );
    }

    #[tokio::test]
    async fn slow_server_times_out_as_request_error() {
        let (auth, _) = authenticator(MockTransport {
            hang: true,
            ..MockTransport::default()
        });
        let error = auth
            .authenticate("steve@example.com", "hunter2", "client")
            .await
            .expect_err("must time out");
        assert!(matches!(error, LegacyAuthError::Request(_)));
    }
}
