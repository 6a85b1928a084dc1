use super::{
    AuthFailure, AuthStage, ExchangeError,
    http::HttpFederatedTransport,
    transport::{FederatedTransport, OAuthTokens},
};
use crate::{
    option::FederatedAuthOptions,
    session::FederatedSession,
    util::{cancel::CancelSignal, time::now_unix_seconds},
};
use futures::future::BoxFuture;
use std::{fmt, sync::Arc, time::Duration};
#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};
use url::Url;

/// Drives the federated sign-in sequence.
///
/// Every call to [`authenticate`](Self::authenticate) or [`refresh`](Self::refresh)
/// runs its exchanges strictly in order and stops at the first failure. Nothing is
/// retried here; callers decide whether a failure is worth another attempt through
/// [`AuthFailure::is_retryable`].
#[derive(Clone)]
pub struct FederatedAuthenticator {
    transport: Arc<dyn FederatedTransport>,
    options: FederatedAuthOptions,
}

impl fmt::Debug for FederatedAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FederatedAuthenticator")
            .field("options", &self.options)
            .finish()
    }
}

impl FederatedAuthenticator {
    /// Creates an authenticator over the given transport.
    pub fn new<T>(transport: T, options: FederatedAuthOptions) -> Self
    where
        T: FederatedTransport + 'static,
    {
        Self {
            transport: Arc::new(transport),
            options,
        }
    }

    /// Creates an authenticator over the default HTTPS transport.
    pub fn with_http(options: FederatedAuthOptions) -> Result<Self, reqwest::Error> {
        let transport = HttpFederatedTransport::with_options(options.clone())?;
        Ok(Self::new(transport, options))
    }

    pub fn options(&self) -> &FederatedAuthOptions {
        &self.options
    }

    /// Builds the URL the user visits to grant an authorization code.
    pub fn authorize_url(&self, state: Option<&str>) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&self.options.authorize_url)?;
        {
            let mut query_pairs = url.query_pairs_mut();
            query_pairs
                .append_pair("client_id", &self.options.client_id)
                .append_pair("response_type", "code")
                .append_pair("redirect_uri", &self.options.redirect_uri)
                .append_pair("scope", &self.options.scope)
                .append_pair("prompt", "select_account");
            if let Some(state) = state {
                query_pairs.append_pair("state", state);
            }
        }
        Ok(url)
    }

    /// Extracts the authorization code from the URL the provider redirected to.
    ///
    /// A redirect carrying an `error` parameter, or none at all, is reported as an
    /// [`AuthStage::OAuthExchange`] failure.
    pub fn parse_redirect(redirect: &str) -> Result<String, AuthFailure> {
        let url = Url::parse(redirect).map_err(|e| {
            AuthFailure::new(AuthStage::OAuthExchange, "invalid redirect URL").with_source(e)
        })?;

        let mut code = None;
        let mut error = None;
        let mut description = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => code = Some(value.into_owned()),
                "error" => error = Some(value.into_owned()),
                "error_description" => description = Some(value.into_owned()),
                _ => (),
            }
        }

        if let Some(error) = error {
            let message = match description {
                Some(description) => format!("{error}: {description}"),
                None => error,
            };
            return Err(AuthFailure::new(AuthStage::OAuthExchange, message));
        }

        code.filter(|c| !c.is_empty()).ok_or_else(|| {
            AuthFailure::new(
                AuthStage::OAuthExchange,
                "redirect is missing the authorization code",
            )
        })
    }

    /// Turns an authorization code into a [`FederatedSession`].
    pub async fn authenticate(&self, code: &str) -> Result<FederatedSession, AuthFailure> {
        self.authenticate_with_cancel(code, CancelSignal::never())
            .await
    }

    /// Like [`authenticate`](Self::authenticate), aborting with
    /// [`AuthStage::Request`] as soon as `cancel` fires.
    pub async fn authenticate_with_cancel(
        &self,
        code: &str,
        cancel: CancelSignal,
    ) -> Result<FederatedSession, AuthFailure> {
        let result = async {
            if code.trim().is_empty() {
                return Err(AuthFailure::new(
                    AuthStage::OAuthExchange,
                    "authorization code is empty",
                ));
            }
            let mut attempt = Attempt::new(self.options.step_timeout(), cancel);
            let tokens = attempt
                .run(AuthStage::OAuthExchange, self.transport.exchange_code(code))
                .await?;
            self.finish_chain(&mut attempt, tokens, None).await
        }
        .await;
        observe(result)
    }

    /// Re-derives a session from its stored OAuth refresh token.
    pub async fn refresh(&self, session: &FederatedSession) -> Result<FederatedSession, AuthFailure> {
        self.refresh_with_cancel(session, CancelSignal::never())
            .await
    }

    /// Like [`refresh`](Self::refresh), aborting with [`AuthStage::Request`] as
    /// soon as `cancel` fires.
    pub async fn refresh_with_cancel(
        &self,
        session: &FederatedSession,
        cancel: CancelSignal,
    ) -> Result<FederatedSession, AuthFailure> {
        let result = async {
            let refresh_token = session
                .refresh_token
                .as_deref()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| {
                    AuthFailure::new(AuthStage::OAuthExchange, "session has no refresh token")
                })?;
            let mut attempt = Attempt::new(self.options.step_timeout(), cancel);
            let tokens = attempt
                .run(
                    AuthStage::OAuthExchange,
                    self.transport.refresh_tokens(refresh_token),
                )
                .await?;
            self.finish_chain(&mut attempt, tokens, Some(refresh_token))
                .await
        }
        .await;
        observe(result)
    }

    /// Runs the exchanges that follow the OAuth step.
    async fn finish_chain(
        &self,
        attempt: &mut Attempt,
        tokens: OAuthTokens,
        previous_refresh_token: Option<&str>,
    ) -> Result<FederatedSession, AuthFailure> {
        let user_token = attempt
            .run(
                AuthStage::DeviceCloudTicket,
                self.transport.device_cloud_ticket(&tokens.access_token),
            )
            .await?;
        let security_token = attempt
            .run(
                AuthStage::SecurityTokenExchange,
                self.transport.security_token(&user_token),
            )
            .await?;
        let game_token = attempt
            .run(
                AuthStage::GameEntitlementExchange,
                self.transport.game_entitlement(&security_token),
            )
            .await?;
        let profile = attempt
            .run(AuthStage::ProfileFetch, self.transport.profile(&game_token))
            .await?;

        let now = now_unix_seconds();
        let expires_at = game_token
            .expires_in
            .map(|secs| now.saturating_add(i64::try_from(secs).unwrap_or(i64::MAX)));
        let refresh_token = tokens
            .refresh_token
            .or_else(|| previous_refresh_token.map(str::to_string));

        Ok(FederatedSession {
            username: profile.name.clone(),
            access_token: game_token.access_token,
            refresh_token,
            expires_at,
            profile,
            user_hash: Some(security_token.user_hash),
            last_refreshed: Some(now),
        })
    }
}

fn observe(
    result: Result<FederatedSession, AuthFailure>,
) -> Result<FederatedSession, AuthFailure> {
    match &result {
        Ok(_session) => {
            #[cfg(feature = "tracing")]
            info!(username = %_session.username, "federated authentication succeeded");
        }
        Err(_failure) => {
            #[cfg(feature = "tracing")]
            warn!(
                stage = %_failure.stage(),
                "federated authentication failed: {}",
                _failure.message()
            );
        }
    }
    result
}

/// Per-attempt timeout and cancellation state shared by every step.
struct Attempt {
    timeout: Duration,
    cancel: CancelSignal,
}

impl Attempt {
    fn new(timeout: Duration, cancel: CancelSignal) -> Self {
        Self { timeout, cancel }
    }

    async fn run<T>(
        &mut self,
        stage: AuthStage,
        step: BoxFuture<'_, Result<T, ExchangeError>>,
    ) -> Result<T, AuthFailure> {
        #[cfg(feature = "tracing")]
        debug!(%stage, "starting exchange");

        let timeout = self.timeout;
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(AuthFailure::new(
                    AuthStage::Request,
                    format!("cancelled during {stage}"),
                ));
            }
            outcome = tokio::time::timeout(timeout, step) => outcome,
        };

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(error)) => Err(AuthFailure::classify(stage, error)),
            Err(elapsed) => Err(AuthFailure::new(
                AuthStage::Request,
                format!("{stage} timed out after {}ms", timeout.as_millis()),
            )
            .with_source(elapsed)),
        }
    }
}
